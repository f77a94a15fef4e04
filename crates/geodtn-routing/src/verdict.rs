//! Admission verdicts

/// Receiver's answer to a transfer offer
///
/// None of these abort the simulation; callers branch on them and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiveVerdict {
    /// Transfer may start
    Accepted,
    /// Receiver is busy with another transfer; try again later
    TryLaterBusy,
    /// Receiver already has, delivered or blacklisted the message
    DeniedOld,
    /// Eviction cannot free enough space
    DeniedNoSpace,
    /// Message expired and the receiver is not a final recipient
    DeniedTtl,
    /// Receiver's energy is depleted
    DeniedLowResources,
    /// Accept policy vetoed the transfer
    DeniedPolicy,
}

impl ReceiveVerdict {
    /// Legacy numeric code: 0 accepted, positive retry-later, negative denied
    pub fn code(&self) -> i32 {
        match self {
            ReceiveVerdict::Accepted => 0,
            ReceiveVerdict::TryLaterBusy => 1,
            ReceiveVerdict::DeniedOld => -1,
            ReceiveVerdict::DeniedNoSpace => -2,
            ReceiveVerdict::DeniedTtl => -3,
            ReceiveVerdict::DeniedLowResources => -4,
            ReceiveVerdict::DeniedPolicy => -5,
        }
    }

    pub fn is_accepted(&self) -> bool {
        *self == ReceiveVerdict::Accepted
    }

    /// Whether offering other messages over the same link is pointless for now
    pub fn is_retry_later(&self) -> bool {
        self.code() > 0
    }

    pub fn is_denied(&self) -> bool {
        self.code() < 0
    }
}

impl std::fmt::Display for ReceiveVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReceiveVerdict::Accepted => "accepted",
            ReceiveVerdict::TryLaterBusy => "busy",
            ReceiveVerdict::DeniedOld => "denied: old",
            ReceiveVerdict::DeniedNoSpace => "denied: no space",
            ReceiveVerdict::DeniedTtl => "denied: ttl",
            ReceiveVerdict::DeniedLowResources => "denied: low resources",
            ReceiveVerdict::DeniedPolicy => "denied: policy",
        };
        write!(f, "{}", s)
    }
}
