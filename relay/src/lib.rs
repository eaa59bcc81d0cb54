//! # Room Relay Library
//!
//! A small UDP relay that lets peers meet by room id. Peers never talk to each
//! other directly; every datagram goes through the relay, which knows nothing
//! about the world being simulated. It only tracks who is in which room.
//!
//! ## Responsibilities
//!
//! ### Membership
//! - `Join` registers the sender's address under a room and peer id
//! - The joiner is told who is already present, everyone else hears `PeerJoined`
//! - `Leave`, or silence longer than the peer timeout, produces `PeerLeft`
//!
//! ### Fan-out
//! A `Publish` from one member is forwarded to every other member of the same
//! room as `Deliver`, tagged with the sender's peer id. Delivery is best-effort;
//! nothing is retried or reordered.
//!
//! ## Module Organization
//!
//! - `config`: bind address, room capacity and timeouts
//! - `room_manager`: address-indexed membership bookkeeping
//! - `network`: socket tasks and the main relay loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use relay::config::RelayConfig;
//! use relay::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig {
//!         port: 9000,
//!         ..RelayConfig::default()
//!     };
//!     let mut server = Server::new(&config).await?;
//!
//!     // Runs the receiver, sender and timeout tasks plus the fan-out loop
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod network;
pub mod room_manager;
