//! Run configuration shared by both roles.
//!
//! Every option has a default matching the field-tested values of the link:
//! 462 MHz carrier, 200 kHz bandwidth, 100 packets of 200 bytes, up to 500
//! attempts per packet, 240 ms ack timeout polled in 1 ms quanta, and an
//! 80 ms settle delay before every transmission.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::slave::Termination;
use crate::transport::TxConfig;
use std::fmt;
use std::time::Duration;

/// Largest number of packets a run can address with a 16-bit id.
pub const MAX_NUM_PACKETS: u32 = 1 << 16;

/// Largest DATA payload.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Which end of the link this process is. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    /// Traffic generator
    Master,
    /// Responder
    Slave,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Slave => f.write_str("slave"),
        }
    }
}

/// Complete configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    // === Role ===
    pub role: SessionRole,

    // === RF (reporting / transport only) ===
    /// Carrier frequency [Hz]
    pub carrier_frequency: f64,

    /// Channel bandwidth [Hz]; also the denominator of spectral efficiency
    pub bandwidth: f64,

    // === Run length ===
    /// Number of DATA packets in the run
    pub num_packets: u32,

    // === Master only ===
    /// Transmission attempts per packet before the run aborts
    pub max_attempts: u32,

    /// DATA payload length in bytes
    pub payload_length: usize,

    /// Modulation / FEC / CRC forwarded to the transport
    pub tx: TxConfig,

    // === Timing ===
    /// Total time to wait for an ACK after each transmission
    pub ack_timeout: Duration,

    /// Length of a single receive poll
    pub poll_quantum: Duration,

    /// Pause before every physical transmission
    pub settle_delay: Duration,

    // === Behavior ===
    /// How the slave decides the run is over
    pub termination: Termination,

    /// Per-packet reporting (does not affect protocol decisions)
    pub verbose: bool,

    /// Seed for frame fill / payload randomness (`None` = caller picks)
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: SessionRole::Slave,
            carrier_frequency: 462e6,
            bandwidth: 200e3,
            num_packets: 100,
            max_attempts: 500,
            payload_length: 200,
            tx: TxConfig::default(),
            ack_timeout: Duration::from_millis(240),
            poll_quantum: Duration::from_millis(1),
            settle_delay: Duration::from_millis(80),
            termination: Termination::FinalId,
            verbose: true,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Default configuration for the master role.
    pub fn master() -> Self {
        Self {
            role: SessionRole::Master,
            ..Default::default()
        }
    }

    /// Default configuration for the slave role.
    pub fn slave() -> Self {
        Self {
            role: SessionRole::Slave,
            ..Default::default()
        }
    }

    pub fn with_num_packets(mut self, num_packets: u32) -> Self {
        self.num_packets = num_packets;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_payload_length(mut self, payload_length: usize) -> Self {
        self.payload_length = payload_length;
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn with_carrier_frequency(mut self, frequency: f64) -> Self {
        self.carrier_frequency = frequency;
        self
    }

    pub fn with_tx(mut self, tx: TxConfig) -> Self {
        self.tx = tx;
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn with_poll_quantum(mut self, poll_quantum: Duration) -> Self {
        self.poll_quantum = poll_quantum;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Retry parameters for the master's transmit path.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            ack_timeout: self.ack_timeout,
            poll_quantum: self.poll_quantum,
            settle_delay: self.settle_delay,
        }
    }

    /// Check option ranges.
    ///
    /// # Errors
    /// `Error::Config` naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if self.num_packets == 0 || self.num_packets > MAX_NUM_PACKETS {
            return Err(Error::Config(format!(
                "num_packets must be in 1..={}, got {}",
                MAX_NUM_PACKETS, self.num_packets
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        if self.payload_length == 0 || self.payload_length > MAX_PAYLOAD_LEN {
            return Err(Error::Config(format!(
                "payload_length must be in 1..={}, got {}",
                MAX_PAYLOAD_LEN, self.payload_length
            )));
        }
        if self.poll_quantum.is_zero() {
            return Err(Error::Config("poll_quantum must be non-zero".to_string()));
        }
        if self.ack_timeout.is_zero() {
            return Err(Error::Config("ack_timeout must be non-zero".to_string()));
        }
        if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
            return Err(Error::Config(format!(
                "bandwidth must be positive, got {}",
                self.bandwidth
            )));
        }
        Ok(())
    }

    /// Check the DATA payload against what the transport can carry.
    ///
    /// # Errors
    /// `Error::Config` if `payload_length` exceeds `max`.
    pub fn check_payload_fits(&self, max: usize) -> Result<()> {
        if self.payload_length > max {
            return Err(Error::Config(format!(
                "payload_length {} exceeds the transport limit of {} bytes",
                self.payload_length, max
            )));
        }
        Ok(())
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        println!("Role: {}", self.role);
        println!("Carrier frequency: {:.4} MHz", self.carrier_frequency * 1e-6);
        println!("Bandwidth: {:.1} kHz", self.bandwidth * 1e-3);
        println!("Packets: {}", self.num_packets);
        if self.role == SessionRole::Master {
            println!("Payload length: {} bytes", self.payload_length);
            println!("Max attempts: {}", self.max_attempts);
            println!("Transmit: {}", self.tx);
        }
        println!("Ack timeout: {} ms", self.ack_timeout.as_millis());
        println!("Poll quantum: {} ms", self.poll_quantum.as_millis());
        println!("Settle delay: {} ms", self.settle_delay.as_millis());
        println!("Termination: {}", self.termination);
        if let Some(seed) = self.seed {
            println!("Seed: {}", seed);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::master();
        assert_eq!(config.role, SessionRole::Master);
        assert_eq!(config.num_packets, 100);
        assert_eq!(config.max_attempts, 500);
        assert_eq!(config.payload_length, 200);
        assert_eq!(config.ack_timeout, Duration::from_millis(240));
        assert_eq!(config.poll_quantum, Duration::from_millis(1));
        assert_eq!(config.settle_delay, Duration::from_millis(80));
        assert_eq!(config.termination, Termination::FinalId);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_packets() {
        let config = SessionConfig::slave().with_num_packets(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_too_many_packets() {
        let ok = SessionConfig::master().with_num_packets(MAX_NUM_PACKETS);
        assert!(ok.validate().is_ok());

        let too_many = SessionConfig::master().with_num_packets(MAX_NUM_PACKETS + 1);
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = SessionConfig::master().with_max_attempts(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_payload_and_timing() {
        assert!(SessionConfig::master().with_payload_length(0).validate().is_err());
        assert!(SessionConfig::master()
            .with_poll_quantum(Duration::ZERO)
            .validate()
            .is_err());
        assert!(SessionConfig::master().with_bandwidth(0.0).validate().is_err());
    }

    #[test]
    fn test_rejects_zero_ack_timeout() {
        let config = SessionConfig::master().with_ack_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_payload_limit() {
        let config = SessionConfig::master().with_payload_length(1000);
        assert!(config.check_payload_fits(1000).is_ok());
        assert!(matches!(config.check_payload_fits(999), Err(Error::Config(_))));
    }

    #[test]
    fn test_retry_policy_mirrors_config() {
        let config = SessionConfig::master()
            .with_max_attempts(3)
            .with_ack_timeout(Duration::from_millis(10));
        let policy = config.retry_policy();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.ack_timeout, Duration::from_millis(10));
        assert_eq!(policy.settle_delay, config.settle_delay);
    }
}
