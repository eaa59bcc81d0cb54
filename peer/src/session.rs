//! Host-authoritative state synchronization.
//!
//! Every node owns one [`SessionContext`]. Network callbacks never touch it
//! directly: the transport queues [`SessionEvent`]s and the tick loop drains
//! them through [`SessionContext::handle_event`] before calling
//! [`SessionContext::tick`], so all mutation happens on the tick boundary.
//!
//! Clients send their raw input every tick and display whatever snapshot they
//! received last. The host simulates everybody and broadcasts the full world
//! map. Snapshots are applied unconditionally: the last one received wins even
//! when it was sent earlier than the one it replaces.

use crate::membership::{MembershipTracker, Role, RoleTransition};
use log::{debug, info};
use shared::{ChannelMessage, Color, InputState, MovementSettings, PeerId, PlayerState, WorldStateMap};
use std::collections::HashMap;

/// Inputs to the session, produced by the transport between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    Message { from: PeerId, message: ChannelMessage },
}

/// Authoritative simulation state only the host keeps.
///
/// Latest inputs live apart from the replicated player map so they can never
/// leak into a broadcast.
#[derive(Debug, Clone, Default)]
struct HostSimulation {
    players: WorldStateMap,
    latest_inputs: HashMap<PeerId, InputState>,
}

impl HostSimulation {
    fn seeded_from(world: &WorldStateMap, membership: &MembershipTracker) -> Self {
        let players = world
            .iter()
            .filter(|(id, _)| membership.is_member(id))
            .map(|(id, state)| (id.clone(), *state))
            .collect();

        Self {
            players,
            latest_inputs: HashMap::new(),
        }
    }

    fn record_input(&mut self, peer: PeerId, input: InputState) {
        self.latest_inputs.insert(peer, input);
    }

    fn remove(&mut self, peer: &PeerId) {
        self.players.remove(peer);
        self.latest_inputs.remove(peer);
    }

    fn advance(
        &mut self,
        local: &PeerId,
        local_color: Color,
        local_input: &InputState,
        peers: &[PeerId],
        settings: &MovementSettings,
    ) {
        let own = self
            .players
            .get(local)
            .map(|state| state.position)
            .unwrap_or_else(shared::Position::spawn);
        self.players.insert(
            local.clone(),
            PlayerState::new(settings.step(own, local_input), local_color),
        );

        for peer in peers {
            match self.players.get_mut(peer) {
                Some(state) => {
                    let input = self.latest_inputs.get(peer).copied().unwrap_or_default();
                    state.position = settings.step(state.position, &input);
                }
                None => {
                    debug!("Spawning player for {}", peer);
                    self.players.insert(peer.clone(), PlayerState::spawn_default());
                }
            }
        }
    }
}

/// Everything one node knows about the shared session.
#[derive(Debug)]
pub struct SessionContext {
    room_id: String,
    membership: MembershipTracker,
    color: Color,
    settings: MovementSettings,
    tick: u64,
    simulation: Option<HostSimulation>,
    world: WorldStateMap,
    last_received_tick: Option<u64>,
}

impl SessionContext {
    /// Starts a session as the only member, and therefore as host.
    pub fn new(
        room_id: impl Into<String>,
        local: PeerId,
        color: Color,
        settings: MovementSettings,
    ) -> Self {
        let mut world = WorldStateMap::new();
        world.insert(local.clone(), PlayerState::new(shared::Position::spawn(), color));

        let simulation = HostSimulation {
            players: world.clone(),
            latest_inputs: HashMap::new(),
        };

        Self {
            room_id: room_id.into(),
            membership: MembershipTracker::new(local),
            color,
            settings,
            tick: 0,
            simulation: Some(simulation),
            world,
            last_received_tick: None,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PeerJoined(id) => {
                if let Some(transition) = self.membership.peer_joined(id) {
                    self.apply_transition(transition);
                }
            }
            SessionEvent::PeerLeft(id) => {
                let transition = self.membership.peer_left(&id);
                if let Some(simulation) = self.simulation.as_mut() {
                    simulation.remove(&id);
                }
                self.world.remove(&id);
                if let Some(transition) = transition {
                    self.apply_transition(transition);
                }
            }
            SessionEvent::Message { from, message } => self.handle_message(from, message),
        }
    }

    fn handle_message(&mut self, from: PeerId, message: ChannelMessage) {
        match (message, self.simulation.as_mut()) {
            (ChannelMessage::Input(input), Some(simulation)) => {
                if self.membership.is_member(&from) && from != *self.membership.local_id() {
                    simulation.record_input(from, input);
                } else {
                    debug!("Ignoring input from non-member {}", from);
                }
            }
            (ChannelMessage::Input(_), None) => {
                debug!("Ignoring input from {} while client", from);
            }
            (ChannelMessage::WorldState { tick, players }, None) => {
                if !self.membership.is_member(&from) {
                    debug!("Ignoring world state from departed peer {}", from);
                    return;
                }
                self.world = players;
                self.last_received_tick = Some(tick);
            }
            (ChannelMessage::WorldState { .. }, Some(_)) => {
                debug!("Ignoring world state from {} while host", from);
            }
        }
    }

    fn apply_transition(&mut self, transition: RoleTransition) {
        match transition.to {
            Role::Host => {
                info!(
                    "Taking over as host with {} known players",
                    self.world.len()
                );
                self.simulation = Some(HostSimulation::seeded_from(&self.world, &self.membership));
            }
            Role::Client => {
                info!("Handing host role to {}", self.membership.host_id());
                self.simulation = None;
            }
        }
    }

    /// Runs one tick and returns the message to broadcast.
    ///
    /// Hosts return the new world snapshot, clients return their input.
    pub fn tick(&mut self, local_input: InputState) -> ChannelMessage {
        self.tick += 1;

        let Some(simulation) = self.simulation.as_mut() else {
            return ChannelMessage::Input(local_input);
        };

        let peers: Vec<PeerId> = self.membership.peers().cloned().collect();
        simulation.advance(
            self.membership.local_id(),
            self.color,
            &local_input,
            &peers,
            &self.settings,
        );

        self.world = simulation.players.clone();
        ChannelMessage::WorldState {
            tick: self.tick,
            players: self.world.clone(),
        }
    }

    /// The world as this node currently sees it.
    pub fn world(&self) -> &WorldStateMap {
        &self.world
    }

    pub fn local_state(&self) -> Option<&PlayerState> {
        self.world.get(self.membership.local_id())
    }

    pub fn role(&self) -> Role {
        self.membership.role()
    }

    pub fn is_host(&self) -> bool {
        self.membership.is_host()
    }

    pub fn local_id(&self) -> &PeerId {
        self.membership.local_id()
    }

    pub fn host_id(&self) -> &PeerId {
        self.membership.host_id()
    }

    pub fn peer_count(&self) -> usize {
        self.membership.peer_count()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Host tick of the snapshot applied last, if any was received.
    pub fn last_received_tick(&self) -> Option<u64> {
        self.last_received_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{height, Position, AVATAR_RADIUS, MOVE_SPEED};

    const WHITE: Color = Color::DEFAULT;

    fn session(local: &str) -> SessionContext {
        SessionContext::new(
            "room",
            PeerId::from(local),
            Color::from_rgb(0xff0000),
            MovementSettings::default(),
        )
    }

    fn forward() -> InputState {
        InputState {
            forward: true,
            ..InputState::default()
        }
    }

    fn input_from(from: &str, input: InputState) -> SessionEvent {
        SessionEvent::Message {
            from: PeerId::from(from),
            message: ChannelMessage::Input(input),
        }
    }

    fn snapshot(from: &str, tick: u64, players: WorldStateMap) -> SessionEvent {
        SessionEvent::Message {
            from: PeerId::from(from),
            message: ChannelMessage::WorldState { tick, players },
        }
    }

    fn world_of(message: ChannelMessage) -> WorldStateMap {
        match message {
            ChannelMessage::WorldState { players, .. } => players,
            other => panic!("Expected world state, got {:?}", other),
        }
    }

    fn world_with(entries: &[(&str, f32, f32)]) -> WorldStateMap {
        entries
            .iter()
            .map(|(id, x, z)| {
                (
                    PeerId::from(*id),
                    PlayerState::new(Position::on_terrain(*x, *z), WHITE),
                )
            })
            .collect()
    }

    #[test]
    fn test_new_session_is_host_with_own_player() {
        let session = session("a");
        assert!(session.is_host());
        assert_eq!(session.world().len(), 1);
        assert_eq!(session.local_state().unwrap().position, Position::spawn());
        assert_eq!(session.room_id(), "room");
    }

    #[test]
    fn test_host_moves_itself_from_local_input() {
        let mut session = session("a");
        let world = world_of(session.tick(forward()));

        let own = world[&PeerId::from("a")];
        assert_eq!(own.position.x, 0.0);
        assert_eq!(own.position.z, -MOVE_SPEED);
        assert_eq!(
            own.position.y,
            height(0.0, -MOVE_SPEED) + AVATAR_RADIUS
        );
        assert_eq!(own.color, Color::from_rgb(0xff0000));
    }

    #[test]
    fn test_host_spawns_new_peer_then_simulates_its_input() {
        let mut session = session("a");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("b")));

        let first = world_of(session.tick(InputState::default()));
        assert_eq!(first[&PeerId::from("b")], PlayerState::spawn_default());

        session.handle_event(input_from("b", forward()));
        let second = world_of(session.tick(InputState::default()));
        assert_eq!(second[&PeerId::from("b")].position.z, -MOVE_SPEED);

        // Held input keeps applying until a new snapshot of it arrives.
        let third = world_of(session.tick(InputState::default()));
        assert!(third[&PeerId::from("b")].position.z < second[&PeerId::from("b")].position.z);
    }

    #[test]
    fn test_peer_without_input_stays_put() {
        let mut session = session("a");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("b")));
        session.tick(InputState::default());
        let world = world_of(session.tick(InputState::default()));
        assert_eq!(world[&PeerId::from("b")].position, Position::spawn());
    }

    #[test]
    fn test_client_sends_input_and_does_not_simulate() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        assert_eq!(session.role(), Role::Client);

        let before = session.world().clone();
        let outgoing = session.tick(forward());

        assert_eq!(outgoing, ChannelMessage::Input(forward()));
        assert_eq!(session.world(), &before);
    }

    #[test]
    fn test_client_ignores_input_messages() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        session.handle_event(input_from("a", forward()));
        assert_eq!(session.tick(InputState::default()), ChannelMessage::Input(InputState::default()));
    }

    #[test]
    fn test_host_ignores_world_state_messages() {
        let mut session = session("a");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("b")));
        session.handle_event(snapshot("b", 9, world_with(&[("a", 50.0, 50.0)])));

        assert_eq!(session.last_received_tick(), None);
        assert_eq!(session.local_state().unwrap().position, Position::spawn());
    }

    #[test]
    fn test_host_ignores_input_from_strangers() {
        let mut session = session("a");
        session.handle_event(input_from("ghost", forward()));
        let world = world_of(session.tick(InputState::default()));
        assert!(!world.contains_key(&PeerId::from("ghost")));
    }

    #[test]
    fn test_client_replaces_world_wholesale() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));

        session.handle_event(snapshot("a", 1, world_with(&[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)])));
        assert_eq!(session.world().len(), 3);

        let replacement = world_with(&[("a", 5.0, 5.0), ("b", 6.0, 6.0)]);
        session.handle_event(snapshot("a", 2, replacement.clone()));
        assert_eq!(session.world(), &replacement);
        assert_eq!(session.last_received_tick(), Some(2));
    }

    #[test]
    fn test_applying_same_snapshot_twice_is_idempotent() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));

        let world = world_with(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]);
        session.handle_event(snapshot("a", 4, world.clone()));
        let after_first = session.world().clone();
        session.handle_event(snapshot("a", 4, world));
        assert_eq!(session.world(), &after_first);
    }

    #[test]
    fn test_reordered_snapshots_last_received_wins() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));

        let m1 = world_with(&[("a", 1.0, 0.0), ("b", 1.0, 0.0)]);
        let m2 = world_with(&[("a", 2.0, 0.0), ("b", 2.0, 0.0)]);

        session.handle_event(snapshot("a", 2, m2));
        session.handle_event(snapshot("a", 1, m1.clone()));

        assert_eq!(session.world(), &m1);
        assert_eq!(session.last_received_tick(), Some(1));
    }

    #[test]
    fn test_departed_peer_is_purged_before_next_tick() {
        let mut session = session("a");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("b")));
        session.handle_event(input_from("b", forward()));
        session.tick(InputState::default());
        assert!(session.world().contains_key(&PeerId::from("b")));

        session.handle_event(SessionEvent::PeerLeft(PeerId::from("b")));
        assert!(!session.world().contains_key(&PeerId::from("b")));

        let world = world_of(session.tick(InputState::default()));
        assert!(!world.contains_key(&PeerId::from("b")));
    }

    #[test]
    fn test_client_purges_departed_peer_from_view() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("c")));
        session.handle_event(snapshot("a", 1, world_with(&[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)])));

        session.handle_event(SessionEvent::PeerLeft(PeerId::from("c")));
        assert!(!session.world().contains_key(&PeerId::from("c")));
        assert_eq!(session.role(), Role::Client);
    }

    #[test]
    fn test_late_snapshot_from_departed_host_is_dropped() {
        let mut session = session("c");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("b")));
        session.handle_event(snapshot("a", 1, world_with(&[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)])));

        session.handle_event(SessionEvent::PeerLeft(PeerId::from("a")));
        assert_eq!(session.host_id().as_str(), "b");

        // Still in flight when the departure was processed.
        session.handle_event(snapshot("a", 2, world_with(&[("a", 1.5, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)])));
        assert!(!session.world().contains_key(&PeerId::from("a")));
        assert_eq!(session.last_received_tick(), Some(1));
    }

    #[test]
    fn test_promoted_client_inherits_last_world() {
        let mut session = session("b");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("c")));
        session.handle_event(snapshot("a", 7, world_with(&[("a", 1.0, 1.0), ("b", 20.0, -20.0), ("c", -30.0, 30.0)])));

        session.handle_event(SessionEvent::PeerLeft(PeerId::from("a")));
        assert!(session.is_host());

        let world = world_of(session.tick(InputState::default()));
        assert_eq!(world.len(), 2);
        assert_eq!(world[&PeerId::from("b")].position, Position::on_terrain(20.0, -20.0));
        assert_eq!(world[&PeerId::from("b")].color, Color::from_rgb(0xff0000));
        assert_eq!(world[&PeerId::from("c")].position, Position::on_terrain(-30.0, 30.0));
        assert_eq!(world[&PeerId::from("c")].color, WHITE);
    }

    #[test]
    fn test_demoted_host_waits_for_new_host() {
        let mut session = session("m");
        session.handle_event(SessionEvent::PeerJoined(PeerId::from("z")));
        session.handle_event(input_from("z", forward()));
        session.tick(InputState::default());

        session.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        assert_eq!(session.role(), Role::Client);
        assert_eq!(session.host_id().as_str(), "a");

        let before = session.world().clone();
        assert_eq!(session.tick(forward()), ChannelMessage::Input(forward()));
        assert_eq!(session.world(), &before);

        // Promotion again reseeds from whatever the interim host sent.
        session.handle_event(snapshot("a", 3, world_with(&[("a", 0.0, 0.0), ("m", 9.0, 9.0), ("z", 8.0, 8.0)])));
        session.handle_event(SessionEvent::PeerLeft(PeerId::from("a")));
        let world = world_of(session.tick(InputState::default()));
        assert_eq!(world[&PeerId::from("m")].position, Position::on_terrain(9.0, 9.0));
        // Recorded inputs do not survive a demotion.
        assert_eq!(world[&PeerId::from("z")].position, Position::on_terrain(8.0, 8.0));
    }

    #[test]
    fn test_tick_counter_advances_for_both_roles() {
        let mut host = session("a");
        host.tick(InputState::default());
        match host.tick(InputState::default()) {
            ChannelMessage::WorldState { tick, .. } => assert_eq!(tick, 2),
            other => panic!("Expected world state, got {:?}", other),
        }

        let mut client = session("b");
        client.handle_event(SessionEvent::PeerJoined(PeerId::from("a")));
        client.tick(InputState::default());
        assert_eq!(client.current_tick(), 1);
    }
}
