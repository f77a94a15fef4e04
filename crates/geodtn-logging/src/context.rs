//! Host context injection for simulation logging
//!
//! Thread-local storage for the host currently being updated, so that every
//! log entry emitted while a host runs can be attributed to it.

use std::cell::RefCell;

use geodtn_core::{HostId, SimTime};

/// Host context data stored in thread-local storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostContextData {
    /// The host being updated
    pub host: HostId,
    /// Simulated time of the update, when known
    pub sim_time: Option<SimTime>,
}

thread_local! {
    static HOST_CONTEXT: RefCell<Option<HostContextData>> = const { RefCell::new(None) };
}

/// RAII guard for host context
///
/// When this guard is created, it sets the host context for the current
/// thread. When it's dropped, it restores the previous context (if any).
///
/// # Example
///
/// ```ignore
/// use geodtn_logging::context::HostContextGuard;
///
/// let _guard = HostContextGuard::new(HostId(3));
///
/// // Spans opened in this scope carry host = "h3"
/// tracing::info!("Updating host");
/// ```
pub struct HostContextGuard {
    previous: Option<HostContextData>,
}

impl HostContextGuard {
    /// Set the host for all log entries in the current scope
    pub fn new(host: HostId) -> Self {
        Self::install(HostContextData {
            host,
            sim_time: None,
        })
    }

    /// Set the host and the simulated time of the current update
    pub fn at(host: HostId, now: SimTime) -> Self {
        Self::install(HostContextData {
            host,
            sim_time: Some(now),
        })
    }

    fn install(data: HostContextData) -> Self {
        let previous = HOST_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// Get the current host context (if any)
    pub fn current() -> Option<HostContextData> {
        HOST_CONTEXT.with(|ctx| *ctx.borrow())
    }

    /// Get the current host (if set)
    pub fn current_host() -> Option<HostId> {
        Self::current().map(|ctx| ctx.host)
    }
}

impl Drop for HostContextGuard {
    fn drop(&mut self) {
        HOST_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Convenience macro to create a host context scope
///
/// # Example
///
/// ```ignore
/// with_host_context!(HostId(0), {
///     tracing::info!("Processing message");
/// });
/// ```
#[macro_export]
macro_rules! with_host_context {
    ($host:expr, $body:block) => {{
        let _guard = $crate::context::HostContextGuard::new($host);
        $body
    }};
}
