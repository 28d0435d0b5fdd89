use embassy_time::Duration;

/// Receive ring storage size. One slot is reserved to tell full from empty.
pub const RX_BUFFER_SIZE: usize = 128;

/// Transmit ring storage size.
pub const TX_BUFFER_SIZE: usize = 64;

/// Longest response line any reader path will deliver. Longer lines are
/// consumed in full but truncated to this many content bytes.
pub const MAX_LINE_LEN: usize = 64;

/// Depth of the new-message notification queue.
pub const NEW_MSG_DEPTH: usize = 4;

/// Protocol timing for [`crate::AtSession`].
///
/// A response wait sleeps `poll_interval` between polls and gives up after
/// `poll_budget` sleeps, so the timeout is `poll_interval * poll_budget`.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub poll_interval: Duration,
    pub poll_budget: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            poll_budget: 20,
        }
    }
}
