//! Minecraft server tracker engine.
//!
//! Polls a configured set of Java and Bedrock servers on a fixed cadence,
//! keeps bounded player-count histories at two resolutions, derives records,
//! peaks and protocol compatibility from them, and streams per-cycle diffs
//! to WebSocket subscribers. Raw samples optionally persist to SQLite so a
//! restart replays the graph window seamlessly.

pub mod app;
pub mod config;
pub mod orchestrator;
pub mod ping;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod time;
pub mod updates;
pub mod util;
pub mod ws;
