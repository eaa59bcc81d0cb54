//! Fixed-rate tick loop tying the session to a transport, an input source and a world sink.

use crate::input::InputSource;
use crate::session::SessionContext;
use crate::transport::{EventReceiver, RoomTransport};
use crate::view::WorldSink;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};

pub struct Node<T, I, S> {
    session: SessionContext,
    transport: T,
    events: EventReceiver,
    input: I,
    sink: S,
    tick_duration: Duration,
    last_peer_count: Option<usize>,
}

impl<T, I, S> Node<T, I, S>
where
    T: RoomTransport,
    I: InputSource,
    S: WorldSink,
{
    pub fn new(
        session: SessionContext,
        transport: T,
        events: EventReceiver,
        input: I,
        sink: S,
        tick_duration: Duration,
    ) -> Self {
        Self {
            session,
            transport,
            events,
            input,
            sink,
            tick_duration,
            last_peer_count: None,
        }
    }

    /// Applies every queued event, then runs one tick.
    ///
    /// Returns `false` once the transport has closed the event queue.
    pub fn step(&mut self) -> bool {
        let mut open = true;
        loop {
            match self.events.try_recv() {
                Ok(event) => self.session.handle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    open = false;
                    break;
                }
            }
        }

        let input = self.input.sample();
        let outgoing = self.session.tick(input);
        if let Err(e) = self.transport.broadcast(&outgoing) {
            warn!("Failed to broadcast on {:?} channel: {}", outgoing.channel(), e);
        }

        self.sink.present(self.session.local_id(), self.session.world());
        self.report_status();
        open
    }

    fn report_status(&mut self) {
        let peer_count = self.session.peer_count();
        if self.last_peer_count == Some(peer_count) {
            return;
        }
        self.last_peer_count = Some(peer_count);
        info!(
            "Friends: {} (acting as {}, host {})",
            peer_count,
            self.session.role(),
            self.session.host_id()
        );
    }

    /// Ticks at the configured rate until the event queue closes.
    pub async fn run(&mut self) {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Node {} running in room {}",
            self.session.local_id(),
            self.session.room_id()
        );

        loop {
            ticker.tick().await;
            if !self.step() {
                info!("Transport closed, stopping tick loop");
                break;
            }

            let tick = self.session.current_tick();
            if tick % 600 == 0 {
                debug!(
                    "Tick {}: {} players in view, last snapshot {:?}",
                    tick,
                    self.session.world().len(),
                    self.session.last_received_tick()
                );
            }
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stops the node, handing back the transport so it can be closed cleanly.
    pub fn into_transport(self) -> T {
        self.transport
    }
}
