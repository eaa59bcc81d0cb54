//! Relay network layer handling UDP communications and room fan-out

use crate::config::RelayConfig;
use crate::room_manager::{Member, RoomManager};
use log::{debug, error, info, warn};
use shared::{decode, encode, ChannelMessage, Packet, PeerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const MAX_DATAGRAM_SIZE: usize = 2048;
const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// Messages sent from network tasks to the main relay loop
#[derive(Debug)]
pub enum RelayMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    PeerTimeout { member: Member },
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Same packet to several peers, encoded once
    SendToMany {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Room relay: forwards channel traffic between peers sharing a room id
pub struct Server {
    socket: Arc<UdpSocket>,
    rooms: Arc<RwLock<RoomManager>>,
    peer_timeout: Duration,
    timeout_check_interval: Duration,

    // Communication channels
    relay_tx: mpsc::UnboundedSender<RelayMessage>,
    relay_rx: mpsc::UnboundedReceiver<RelayMessage>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    pub async fn new(config: &RelayConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr()).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let capacity = config.room_capacity();
        if capacity != config.max_peers_per_room {
            warn!(
                "Room size {} out of range, using {}",
                config.max_peers_per_room, capacity
            );
        }

        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            rooms: Arc::new(RwLock::new(RoomManager::new(capacity))),
            peer_timeout: config.peer_timeout,
            timeout_check_interval: config.timeout_check_interval,
            relay_tx,
            relay_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    /// Address the relay actually bound to, useful when configured with port 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let relay_tx = self.relay_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                relay_tx.send(RelayMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(_) => warn!("Failed to deserialize packet from {}", addr),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let (packet, addrs) = match message {
                    OutboundMessage::SendPacket { packet, addr } => (packet, vec![addr]),
                    OutboundMessage::SendToMany { packet, addrs } => (packet, addrs),
                };

                let data = match encode(&packet) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to encode packet: {}", e);
                        continue;
                    }
                };

                for addr in addrs {
                    if let Err(e) = socket.send_to(&data, addr).await {
                        error!("Failed to send packet to {}: {}", addr, e);
                    }
                }
            }
        });
    }

    /// Spawns task that evicts silent peers
    fn spawn_timeout_checker(&self) {
        let rooms = Arc::clone(&self.rooms);
        let relay_tx = self.relay_tx.clone();
        let peer_timeout = self.peer_timeout;
        let check_interval = self.timeout_check_interval;

        tokio::spawn(async move {
            let mut interval = interval(check_interval);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut rooms_guard = rooms.write().await;
                    rooms_guard.check_timeouts(peer_timeout)
                };

                for member in timed_out {
                    if let Err(e) = relay_tx.send(RelayMessage::PeerTimeout { member }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_to_many(&self, packet: Packet, addrs: Vec<SocketAddr>) {
        if addrs.is_empty() {
            return;
        }
        if let Err(e) = self
            .outbound_tx
            .send(OutboundMessage::SendToMany { packet, addrs })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Sends `packet` to every member of `room_id` except `exclude`
    async fn send_to_room(&self, room_id: &str, exclude: Option<SocketAddr>, packet: Packet) {
        let addrs: Vec<SocketAddr> = {
            let rooms = self.rooms.read().await;
            rooms
                .room_members(room_id, exclude)
                .into_iter()
                .map(|member| member.addr)
                .collect()
        };
        self.send_to_many(packet, addrs);
    }

    async fn announce_departure(&self, member: &Member) {
        let packet = Packet::PeerLeft {
            peer_id: member.peer_id.clone(),
        };
        self.send_to_room(&member.room_id, None, packet).await;
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let known = self.rooms.write().await.touch(&addr);

        match packet {
            Packet::Join {
                version,
                room_id,
                peer_id,
            } => self.handle_join(addr, version, room_id, peer_id).await,

            Packet::Publish { message } => self.handle_publish(addr, message).await,

            Packet::Heartbeat => {
                if !known {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::Leave => {
                let member = self.rooms.write().await.leave(&addr);
                if let Some(member) = member {
                    self.announce_departure(&member).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from peer at {}", addr);
            }
        }
    }

    async fn handle_join(
        &mut self,
        addr: SocketAddr,
        version: u32,
        room_id: String,
        peer_id: PeerId,
    ) {
        if version != PROTOCOL_VERSION {
            info!(
                "Rejecting {} from {}: protocol version {} (expected {})",
                peer_id, addr, version, PROTOCOL_VERSION
            );
            let reason = "Protocol version mismatch".to_string();
            self.send_packet(Packet::Rejected { reason }, addr);
            return;
        }

        // Join requests are retried until answered, so a repeat from the same
        // member only needs the answer again.
        let existing = self.rooms.read().await.get(&addr).cloned();
        if let Some(existing) = existing {
            if existing.room_id == room_id && existing.peer_id == peer_id {
                let peers = self.peer_ids_in(&room_id, Some(addr)).await;
                self.send_packet(Packet::Joined { peers }, addr);
                return;
            }

            info!("Replacing {} at {} with a new join", existing.peer_id, addr);
            self.rooms.write().await.leave(&addr);
            self.announce_departure(&existing).await;
        }

        let result = self
            .rooms
            .write()
            .await
            .join(addr, &room_id, peer_id.clone());

        match result {
            Ok(peers) => {
                self.send_packet(Packet::Joined { peers }, addr);
                self.send_to_room(&room_id, Some(addr), Packet::PeerJoined { peer_id })
                    .await;
            }
            Err(e) => {
                info!("Rejecting {} from {}: {}", peer_id, addr, e);
                self.send_packet(
                    Packet::Rejected {
                        reason: e.to_string(),
                    },
                    addr,
                );
            }
        }
    }

    async fn handle_publish(&self, addr: SocketAddr, message: ChannelMessage) {
        let sender = self.rooms.read().await.get(&addr).cloned();
        let Some(sender) = sender else {
            debug!("Dropping {:?} message from non-member {}", message.channel(), addr);
            return;
        };

        let packet = Packet::Deliver {
            from: sender.peer_id,
            message,
        };
        self.send_to_room(&sender.room_id, Some(addr), packet).await;
    }

    async fn peer_ids_in(&self, room_id: &str, exclude: Option<SocketAddr>) -> Vec<PeerId> {
        let rooms = self.rooms.read().await;
        rooms
            .room_members(room_id, exclude)
            .into_iter()
            .map(|member| member.peer_id)
            .collect()
    }

    /// Main relay loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut stats_interval = interval(STATS_INTERVAL);

        info!("Relay started successfully");

        loop {
            tokio::select! {
                message = self.relay_rx.recv() => {
                    match message {
                        Some(RelayMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(RelayMessage::PeerTimeout { member }) => {
                            self.announce_departure(&member).await;
                        }
                        None => {
                            info!("Relay shutting down");
                            break;
                        }
                    }
                }

                _ = stats_interval.tick() => {
                    let rooms = self.rooms.read().await;
                    if !rooms.is_empty() {
                        debug!("{} peers in {} rooms", rooms.len(), rooms.room_count());
                    }
                }
            }
        }

        Ok(())
    }
}
