//! # Arena Client Library
//!
//! The client half of the arena synchronization core. It moves the local
//! player immediately on input, mirrors whatever the server says about
//! enemies and other players, and keeps the game playable when no server can
//! be reached.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Movement intent is applied to the local player at once and never rolled
//! back. The server is told where the player is at a fixed rate that is
//! independent of the step rate, which bounds bandwidth without making the
//! player feel laggy.
//!
//! ### Mirrored Authority
//! Enemies belong to the server. The client keeps a mirror that only changes
//! when a server message arrives; when a local bullet touches a mirrored
//! enemy the client reports the hit and waits to hear the outcome.
//!
//! ### Offline Fallback
//! Without a connection the agent runs its own small simulation with its own
//! roster. The fallback roster and the server mirror are separate fields and
//! are never merged.
//!
//! ## Module Organization
//!
//! ### Agent Module (`agent`)
//! The [`agent::SyncAgent`] step loop, mode selection and the render snapshot.
//!
//! ### Game Module (`game`)
//! Local player movement, contact damage, knockback and bullets.
//!
//! ### Network Module (`network`)
//! TCP link to the server with background reader and writer tasks.
//!
//! ### Offline Module (`offline`)
//! The fallback enemy roster and its spawn clock.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::agent::SyncAgent;
//! use client::game::Intent;
//! use shared::Vec2;
//!
//! # async fn run() {
//! let mut agent = SyncAgent::new();
//!
//! // Falls back to offline play if the server is unreachable
//! let _ = agent.join_as_client("127.0.0.1", 7777).await;
//!
//! loop {
//!     agent.step(0.016, Intent::new(Vec2::new(1.0, 0.0), false));
//!     let frame = agent.snapshot();
//!     if !frame.local_player.alive {
//!         agent.respawn();
//!     }
//! #   break;
//! }
//! # }
//! ```

pub mod agent;
pub mod game;
pub mod network;
pub mod offline;
