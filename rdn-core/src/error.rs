//! Error kinds for the resource-demand network.
//!
//! Type/binding/unsupported-task errors are ordinary `Result`s: fatal to the
//! calling operation, not to the network. Scheduling errors abort a
//! `ResourceDemandNetwork::schedule()` pass. Invariant violations indicate a
//! bug and are raised via `panic!` at their call sites instead of going
//! through this enum.

#[derive(Debug, thiserror::Error)]
pub enum RdnError {
    #[error("type error: {0}")]
    Type(String),
    #[error("binding error: {0}")]
    Binding(String),
    #[error("resource {resource} has no process supporting the requested task")]
    UnsupportedTask { resource: u64 },
    #[error("scheduling error: {0}")]
    Scheduling(String),
}
