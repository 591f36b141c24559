//! RateDesk Node
//!
//! Hosts the rate service in-process: a simulated provider, an in-memory
//! TTL store with a background reaper, and optional rate streams.

pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::{Node, NodeState};
