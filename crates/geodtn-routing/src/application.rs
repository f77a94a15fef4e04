//! Application hooks on message arrival

use geodtn_core::{HostId, Message, SimTime};

/// Host-side application that sees messages as they arrive
///
/// An application may pass a message on unchanged, return a modified
/// message (for example with a new destination), or return `None` to drop
/// it. A dropped id is blacklisted at that host.
pub trait Application: std::fmt::Debug {
    /// Messages carrying this application id are routed here; `None` sees all
    fn app_id(&self) -> Option<&str> {
        None
    }

    fn handle(&mut self, message: Message, host: HostId, now: SimTime) -> Option<Message>;

    /// Called once per host update
    fn update(&mut self, _host: HostId, _now: SimTime) {}

    /// Whether this application wants to see `message`
    fn wants(&self, message: &Message) -> bool {
        match self.app_id() {
            None => true,
            Some(id) => message.app_id.as_deref() == Some(id),
        }
    }
}
