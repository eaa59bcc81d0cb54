//! # Dune Sandbox Peer Library
//!
//! Everything a single participant runs to take part in a shared sandbox
//! session. There is no dedicated game server: one of the peers is elected
//! host, simulates every avatar and broadcasts the resulting world, while all
//! other peers only send their held directions and display what they receive.
//!
//! ## Host Election
//!
//! The host is the member with the lexicographically smallest peer id. Each
//! node derives its own role from its current view of the room, so nodes with
//! the same view always agree. When the host leaves, the next-smallest peer
//! takes over and keeps simulating from the last snapshot it received, so
//! avatars do not jump back to the origin.
//!
//! ## Tick Model
//!
//! Network activity never mutates state directly. Transports push
//! [`session::SessionEvent`]s into a queue which the tick loop drains at the
//! start of every tick:
//!
//! - **Host tick**: step own avatar from local input, step every peer from its
//!   most recent input, broadcast the full world map.
//! - **Client tick**: broadcast the current input; the displayed world is
//!   whatever snapshot arrived last.
//!
//! Snapshots are complete, so a lost one is repaired by the next. Nothing
//! guards against reordering: a late, older snapshot replaces a newer one
//! until the following tick overwrites it again.
//!
//! ## Module Organization
//!
//! - `membership`: peer set and role derivation
//! - `session`: the synchronization protocol and per-node state
//! - `bootstrap`: room id resolution from share links or room files
//! - `transport`: room transports (UDP relay client, in-memory hub)
//! - `node`: the fixed-rate tick loop
//! - `input` / `view`: local input producers and world consumers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use peer::bootstrap::{resolve_room_id, ShareLink};
//! use peer::input::WanderInput;
//! use peer::node::Node;
//! use peer::session::SessionContext;
//! use peer::transport::RelayTransport;
//! use peer::view::LogSink;
//! use peer::NodeConfig;
//! use shared::{Color, PeerId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let room_id = resolve_room_id(&mut ShareLink::new("dune://sandbox"))?;
//!     let peer_id = PeerId::generate();
//!
//!     let (transport, events) = RelayTransport::join(
//!         "127.0.0.1:9000".parse()?,
//!         &room_id,
//!         &peer_id,
//!         config.join_timeout,
//!     )
//!     .await?;
//!
//!     let session = SessionContext::new(room_id, peer_id, Color::DEFAULT, config.movement);
//!     let mut node = Node::new(
//!         session,
//!         transport,
//!         events,
//!         WanderInput::new(7),
//!         LogSink::new(config.status_every_ticks),
//!         config.tick_duration(),
//!     );
//!     node.run().await;
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod input;
pub mod membership;
pub mod node;
pub mod session;
pub mod transport;
pub mod view;

pub use config::NodeConfig;
pub use membership::{MembershipTracker, Role};
pub use session::{SessionContext, SessionEvent};
