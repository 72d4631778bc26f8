//! Client Session: one WebSocket bridged to the Hub and the game service by
//! two duties, inbound and outbound, around a bounded mailbox.

mod connection;
mod dispatch;
pub mod mailbox;

pub use connection::run_connection;
pub use dispatch::ConnectionContext;
pub use mailbox::{DEFAULT_MAILBOX_CAPACITY, DeliveryError, Mailbox, MailboxReceiver};

use std::time::Duration;

pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);
/// Must stay below the pong wait so an idle peer is probed before it times out.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(54);
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mailbox_capacity: usize,
    /// Longest silence tolerated from the peer before the session ends.
    pub pong_wait: Duration,
    /// Idle period after which the outbound duty sends a ping.
    pub ping_period: Duration,
    /// Longest a single write burst may take.
    pub write_wait: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: DEFAULT_PING_PERIOD,
            write_wait: DEFAULT_WRITE_WAIT,
        }
    }
}
