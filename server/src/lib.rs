//! # Arena Server Library
//!
//! Authoritative simulation for a top-down multiplayer arena shooter. Every
//! lobby runs its own fixed-tick world: clients send held input, the server
//! moves bodies, resolves combat and objectives, and broadcasts a snapshot of
//! the lobby each tick.
//!
//! ## Tick Pipeline
//!
//! One lobby tick runs, in order:
//! 1. Respawns, zombie waves and juggernaut upkeep (`mode`)
//! 2. Movement, dash, grapple and wall collision (`physics`)
//! 3. Firing, parries, sentries, projectiles and zombie contact (`combat`)
//! 4. Kill credit, death bookkeeping and objectives (`mode`)
//! 5. Round timer and phase transitions (`mode`)
//!
//! Combat and objectives only run while a round is active; the round-end and
//! vote phases still move players so the arena stays responsive.
//!
//! ## Module Organization
//!
//! - `config`: kits, maps and timing knobs
//! - `entity`: players, NPCs and projectiles owned by a lobby
//! - `spawn`: free-space spawn point search
//! - `physics`: per-tick movement and wall resolution
//! - `combat`: damage, deaths and weapon behaviour
//! - `mode`: game-mode rules and the round state machine
//! - `lobby`: one independent world and its public operations
//! - `client_manager`: address and sequence bookkeeping for connections
//! - `network`: UDP transport and the main server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerSettings;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerSettings::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod entity;
pub mod lobby;
pub mod mode;
pub mod network;
pub mod physics;
pub mod spawn;
