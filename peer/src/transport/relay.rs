//! UDP client for the room relay.

use super::{EventReceiver, RoomTransport, TransportError};
use crate::session::SessionEvent;
use log::{debug, error, info, warn};
use shared::{decode, encode, ChannelMessage, Packet, PeerId, PROTOCOL_VERSION};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

pub const MAX_DATAGRAM_SIZE: usize = 2048;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(3);
const JOIN_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const MAX_CONSECUTIVE_RECV_ERRORS: u32 = 50;

/// Errors after which the relay counts as gone for good.
///
/// On a connected UDP socket an ICMP port-unreachable from the relay host
/// surfaces as one of these on the next receive.
fn is_connection_lost(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

/// Membership and delivery packets become session events; anything else is relay housekeeping.
fn packet_to_event(packet: Packet) -> Option<SessionEvent> {
    match packet {
        Packet::PeerJoined { peer_id } => Some(SessionEvent::PeerJoined(peer_id)),
        Packet::PeerLeft { peer_id } => Some(SessionEvent::PeerLeft(peer_id)),
        Packet::Deliver { from, message } => Some(SessionEvent::Message { from, message }),
        _ => None,
    }
}

/// Room membership through a relay server.
pub struct RelayTransport {
    local_addr: SocketAddr,
    outgoing: mpsc::UnboundedSender<Packet>,
    left: AtomicBool,
    sender_task: Option<JoinHandle<()>>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl RelayTransport {
    /// Joins `room_id` on the relay at `relay_addr`.
    ///
    /// Fails if the relay rejects the request or does not answer within
    /// `join_timeout`. Peers already in the room are reported as `PeerJoined`
    /// events at the front of the returned queue.
    pub async fn join(
        relay_addr: SocketAddr,
        room_id: &str,
        peer_id: &PeerId,
        join_timeout: Duration,
    ) -> Result<(Self, EventReceiver), TransportError> {
        let bind_addr = if relay_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        socket.connect(relay_addr).await?;
        let local_addr = socket.local_addr()?;

        let join = encode(&Packet::Join {
            version: PROTOCOL_VERSION,
            room_id: room_id.to_string(),
            peer_id: peer_id.clone(),
        })?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let peers = timeout(
            join_timeout,
            Self::await_joined(&socket, &join, &event_tx),
        )
        .await
        .map_err(|_| TransportError::JoinTimeout)??;

        info!(
            "Joined room {} via {} with {} peers present",
            room_id,
            relay_addr,
            peers.len()
        );

        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let sender_task = Self::spawn_sender(Arc::clone(&socket), outgoing_rx);
        let background_tasks = vec![
            Self::spawn_receiver(Arc::clone(&socket), event_tx),
            Self::spawn_heartbeat(outgoing.clone()),
        ];

        let transport = Self {
            local_addr,
            outgoing,
            left: AtomicBool::new(false),
            sender_task: Some(sender_task),
            background_tasks,
        };
        Ok((transport, event_rx))
    }

    /// Sends the join request until the relay answers, queueing peer events
    /// that race ahead of the answer behind the initial roster.
    async fn await_joined(
        socket: &UdpSocket,
        join: &[u8],
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Vec<PeerId>, TransportError> {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let mut early_events = Vec::new();
        let mut retry = interval(JOIN_RETRY_INTERVAL);

        loop {
            tokio::select! {
                _ = retry.tick() => {
                    socket.send(join).await?;
                }
                result = socket.recv(&mut buffer) => {
                    let len = result?;
                    match decode(&buffer[..len]) {
                        Ok(Packet::Joined { peers }) => {
                            for peer in &peers {
                                let _ = events.send(SessionEvent::PeerJoined(peer.clone()));
                            }
                            for event in early_events {
                                let _ = events.send(event);
                            }
                            return Ok(peers);
                        }
                        Ok(Packet::Rejected { reason }) => return Err(TransportError::Rejected(reason)),
                        Ok(packet) => early_events.extend(packet_to_event(packet)),
                        Err(e) => warn!("Failed to decode packet from relay: {}", e),
                    }
                }
            }
        }
    }

    fn spawn_receiver(
        socket: Arc<UdpSocket>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
            let mut consecutive_errors = 0;

            loop {
                match socket.recv(&mut buffer).await {
                    Ok(len) => match decode(&buffer[..len]) {
                        Ok(packet) => {
                            consecutive_errors = 0;
                            if let Some(event) = packet_to_event(packet) {
                                if events.send(event).is_err() {
                                    debug!("Event queue closed, stopping receiver");
                                    break;
                                }
                            }
                        }
                        Err(e) => warn!("Failed to decode packet from relay: {}", e),
                    },
                    Err(e) if is_connection_lost(&e) => {
                        error!("Relay unreachable, closing event queue: {}", e);
                        break;
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        error!("Error receiving packet: {}", e);
                        if consecutive_errors >= MAX_CONSECUTIVE_RECV_ERRORS {
                            error!("Giving up after {} receive errors in a row", consecutive_errors);
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    fn spawn_sender(
        socket: Arc<UdpSocket>,
        mut outgoing: mpsc::UnboundedReceiver<Packet>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(packet) = outgoing.recv().await {
                let is_leave = matches!(packet, Packet::Leave);
                match encode(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send(&data).await {
                            error!("Failed to send packet to relay: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to encode packet: {}", e),
                }
                if is_leave {
                    break;
                }
            }
        })
    }

    fn spawn_heartbeat(outgoing: mpsc::UnboundedSender<Packet>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                if outgoing.send(Packet::Heartbeat).is_err() {
                    break;
                }
            }
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Leaves the room and waits until the leave notice went out.
    pub async fn close(mut self) {
        self.leave();
        if let Some(sender) = self.sender_task.take() {
            if timeout(Duration::from_secs(1), sender).await.is_err() {
                warn!("Timed out flushing leave notice");
            }
        }
    }
}

impl RoomTransport for RelayTransport {
    fn broadcast(&self, message: &ChannelMessage) -> Result<(), TransportError> {
        if self.left.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        self.outgoing
            .send(Packet::Publish {
                message: message.clone(),
            })
            .map_err(|_| TransportError::Closed)
    }

    fn leave(&self) {
        if self.left.swap(true, Ordering::Relaxed) {
            return;
        }
        let _ = self.outgoing.send(Packet::Leave);
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.leave();
        for task in &self.background_tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::InputState;

    #[test]
    fn test_membership_packets_become_events() {
        let peer = PeerId::from("p");
        assert_eq!(
            packet_to_event(Packet::PeerJoined {
                peer_id: peer.clone()
            }),
            Some(SessionEvent::PeerJoined(peer.clone()))
        );
        assert_eq!(
            packet_to_event(Packet::PeerLeft {
                peer_id: peer.clone()
            }),
            Some(SessionEvent::PeerLeft(peer.clone()))
        );
    }

    #[test]
    fn test_deliver_becomes_message() {
        let message = ChannelMessage::Input(InputState::default());
        let event = packet_to_event(Packet::Deliver {
            from: PeerId::from("p"),
            message: message.clone(),
        });
        assert_eq!(
            event,
            Some(SessionEvent::Message {
                from: PeerId::from("p"),
                message
            })
        );
    }

    #[test]
    fn test_housekeeping_packets_are_dropped() {
        assert_eq!(packet_to_event(Packet::Heartbeat), None);
        assert_eq!(packet_to_event(Packet::Joined { peers: vec![] }), None);
        assert_eq!(
            packet_to_event(Packet::Rejected {
                reason: "full".to_string()
            }),
            None
        );
    }

    #[test]
    fn test_connection_lost_errors() {
        assert!(is_connection_lost(&io::Error::from(io::ErrorKind::ConnectionRefused)));
        assert!(is_connection_lost(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_connection_lost(&io::Error::from(io::ErrorKind::Interrupted)));
    }

    #[tokio::test]
    async fn test_event_queue_closes_when_relay_dies() {
        let relay = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay_addr = relay.local_addr().unwrap();

        // Answer the first join, then disappear.
        let fake_relay = tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
            let (_, peer_addr) = relay.recv_from(&mut buffer).await.unwrap();
            let joined = encode(&Packet::Joined { peers: vec![] }).unwrap();
            relay.send_to(&joined, peer_addr).await.unwrap();
        });

        let (transport, mut events) = RelayTransport::join(
            relay_addr,
            "room",
            &PeerId::from("p"),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        fake_relay.await.unwrap();

        // Heartbeats now hit a closed port; the receiver must give up.
        let closed = timeout(Duration::from_secs(4), async {
            while events.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "event queue stayed open after the relay went away");
        drop(transport);
    }

    #[tokio::test]
    async fn test_join_times_out_without_relay() {
        // Nothing listens on this socket, so the join can never be answered.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let result = RelayTransport::join(
            addr,
            "room",
            &PeerId::from("p"),
            Duration::from_millis(200),
        )
        .await;
        assert!(matches!(result, Err(TransportError::JoinTimeout)));
    }
}
