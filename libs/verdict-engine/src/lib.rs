pub mod aggregator;
pub mod client;
pub mod config;
pub mod expander;
pub mod instrument;
pub mod judge0;
pub mod orchestrator;
pub mod reconciler;
pub mod region;
pub mod session;
pub mod snapshot;
