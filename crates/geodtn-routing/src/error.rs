//! Routing error types

use thiserror::Error;

use geodtn_core::{ConfigError, HostId, MessageId};

use crate::link::LinkId;

/// Protocol invariant violations
///
/// These mean a strategy or driver did something impossible. The run
/// cannot continue meaningfully once one is returned.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Unknown host {0}")]
    UnknownHost(HostId),

    #[error("Unknown link {0}")]
    UnknownLink(LinkId),

    #[error("Host {host} is not an endpoint of link {link}")]
    NotAnEndpoint { host: HostId, link: LinkId },

    #[error("No incoming transfer of {id} from {from} at {host}")]
    MissingIncoming {
        host: HostId,
        id: MessageId,
        from: HostId,
    },

    #[error("Message {id} is not buffered at {host}")]
    MissingMessage { host: HostId, id: MessageId },

    #[error("Link {0} has nothing in flight")]
    NothingInFlight(LinkId),

    #[error("Link {0} is already carrying a message")]
    LinkBusy(LinkId),

    #[error("Misconfigured: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons a host refuses to create a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("Message of {size} bytes can never fit a {capacity} byte buffer")]
    TooLarge { size: u64, capacity: u64 },

    #[error("Message {0} already exists at its origin")]
    Duplicate(MessageId),

    #[error("Unknown host {0}")]
    UnknownHost(HostId),
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
