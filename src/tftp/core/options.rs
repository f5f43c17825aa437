use std::time::Duration;

/// Retries used when none (or zero) are configured
pub const DEFAULT_RETRIES: u8 = 10;
/// Ack timeout used when none (or zero) is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Local retransmission settings for one transfer
///
/// These never go on the wire. Each worker receives its own copy at spawn
/// time and never sees server state afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Send attempts allowed per block before the transfer is abandoned
    pub retries: u8,
    /// How long to wait for an acknowledgement after each send
    pub timeout: Duration,
}

impl TransferOptions {
    pub fn new(retries: u8, timeout: Duration) -> Self {
        Self { retries, timeout }
    }

    /// Replaces zero values with the defaults.
    pub fn normalized(self) -> Self {
        Self {
            retries: if self.retries == 0 {
                DEFAULT_RETRIES
            } else {
                self.retries
            },
            timeout: if self.timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                self.timeout
            },
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, DEFAULT_TIMEOUT)
    }
}
