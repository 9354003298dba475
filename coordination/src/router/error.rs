//! Structured error types for agent selection.

/// Errors from the router.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The capability registry has no agents. A startup misconfiguration,
    /// never a per-request condition.
    #[error("Capability registry is empty; no agent can be selected")]
    EmptyRegistry,
}

/// Result type alias for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;
