//! Decides, per request, whether traffic goes to the sorry-page service.

/// Predicate consulted on every request. Returning `true` diverts the request
/// to the redirect target; `false` hands it to the downstream service.
///
/// Implementations must be cheap and non-blocking: the check runs inline on
/// the actix worker before any I/O.
pub trait LivenessCheck: Send + Sync {
    fn sorrypage_enabled(&self) -> bool;
}

/// Mirrors the configured `enabled` flag for the lifetime of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticFlag(pub bool);

impl LivenessCheck for StaticFlag {
    fn sorrypage_enabled(&self) -> bool {
        self.0
    }
}

impl<F> LivenessCheck for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn sorrypage_enabled(&self) -> bool {
        self()
    }
}
