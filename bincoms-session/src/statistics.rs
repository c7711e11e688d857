//! Session statistics collection

/// Session counters
///
/// Updated by the session on every exchange. Callers can query them at any
/// time to see how healthy the link is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatistics {
    /// Request frames written
    pub requests_sent: u64,
    /// Responses read with an OK status
    pub responses_received: u64,
    /// Responses carrying a non-OK status
    pub device_errors: u64,
    /// Framing errors and payload/layout mismatches
    pub link_errors: u64,
    /// Times pending input was drained before a request
    pub resyncs: u64,
    /// Handshake attempts that had to be repeated
    pub handshake_retries: u64,
    /// Capture records collected, sentinels excluded
    pub records_received: u64,
}

impl SessionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters to zero
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_requests_sent(&mut self) {
        self.requests_sent += 1;
    }

    pub fn increment_responses_received(&mut self) {
        self.responses_received += 1;
    }

    pub fn increment_device_errors(&mut self) {
        self.device_errors += 1;
    }

    pub fn increment_link_errors(&mut self) {
        self.link_errors += 1;
    }

    pub fn increment_resyncs(&mut self) {
        self.resyncs += 1;
    }

    pub fn increment_handshake_retries(&mut self) {
        self.handshake_retries += 1;
    }

    pub fn add_records_received(&mut self, count: u64) {
        self.records_received += count;
    }

    /// Percentage of requests that ended in a link error
    ///
    /// Returns 0.0 if nothing was sent yet.
    pub fn error_rate(&self) -> f64 {
        if self.requests_sent == 0 {
            0.0
        } else {
            (self.link_errors as f64 / self.requests_sent as f64) * 100.0
        }
    }
}
