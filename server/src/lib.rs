//! # Arena Server Library
//!
//! The authoritative half of the arena synchronization core. The server keeps
//! the canonical enemy roster, tracks who is connected and where they last
//! said they were, and fans every state change out to all sessions over
//! newline-delimited text streams.
//!
//! ## Core Responsibilities
//!
//! ### Session Tracking
//! Every accepted TCP connection becomes a session with a monotonically
//! assigned id. The registry stores each session's outbound channel and its
//! last reported position, and removes both exactly once when the stream ends.
//!
//! ### Enemy Authority
//! Enemies exist only on the server. A fixed-rate movement tick steers each
//! one toward the nearest player and pushes the full roster every tick, a
//! separate timer spawns new enemies on the arena edges, and hit reports from
//! clients are applied atomically per enemy.
//!
//! ### Relay
//! Position and shot reports are forwarded to every other session. Positions
//! are believed as reported by default; the trust decision lives behind
//! [`policy::PositionPolicy`] so it can be tightened without touching the relay.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Each connection runs in its own task which both reads inbound lines and
//! drains the session's outbound channel. Broadcasting only ever queues onto
//! channels, so a slow or broken peer never stalls anyone else.
//!
//! ### Independent Timers
//! The movement tick and the spawn timer are separate tasks that live as long
//! as the server does, not as long as any connection.
//!
//! ### Per-Collection Locking
//! Sessions, positions and enemies are separately locked. No operation needs
//! all three at once; single-enemy mutations are atomic under the enemy lock.
//!
//! ## Module Organization
//!
//! - `registry`: sessions, positions, fan-out
//! - `game`: enemy roster, movement and spawn schedulers, hit application
//! - `network`: listener, per-session handler, [`network::start_hosting`]
//! - `policy`: position acceptance rules
//! - `config`: runtime tunables
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::start_hosting;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = start_hosting(7777).await?;
//!     println!("hosting on {}", handle.local_addr());
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod network;
pub mod policy;
pub mod registry;
