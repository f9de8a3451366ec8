//! Run statistics and reporting.
//!
//! This module provides the observable results of a session:
//! - Goodput (payload bytes acknowledged by the master / accepted by the slave)
//! - Wall-clock duration, data rate, spectral efficiency
//! - Frame-level counters (retransmissions, corruption, foreign traffic)
//!
//! # Design
//!
//! Statistics are plain fields owned by the single active session and
//! updated explicitly at each step. Derived rates are computed once, when the
//! report is read, and never fail: a zero-length run reports a zero rate.

use crate::config::SessionRole;
use crate::error::{Error, Result};
use crate::framing::Verdict;
use crate::packet::{LinkStats, PacketId};
use std::time::{Duration, Instant};

/// Timing and goodput for one run.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Payload bytes successfully delivered
    pub bytes_transferred: u64,

    /// Set immediately before reception is activated
    pub start_time: Option<Instant>,

    /// Set immediately after the session loop exits
    pub end_time: Option<Instant>,

    /// Configured channel bandwidth [Hz]
    pub bandwidth_hz: f64,
}

impl RunStatistics {
    pub fn new(bandwidth_hz: f64) -> Self {
        Self {
            bytes_transferred: 0,
            start_time: None,
            end_time: None,
            bandwidth_hz,
        }
    }

    /// Record the start of the run.
    pub fn start(&mut self, now: Instant) {
        self.start_time = Some(now);
        self.end_time = None;
    }

    /// Record the end of the run.
    pub fn finish(&mut self, now: Instant) {
        self.end_time = Some(now);
    }

    /// Add delivered payload bytes.
    pub fn add_bytes(&mut self, len: usize) {
        self.bytes_transferred += len as u64;
    }

    /// Elapsed run time; zero unless both ends were recorded.
    pub fn elapsed(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Achieved data rate: `8 * bytes / seconds`. Zero for a zero-length run.
    pub fn data_rate_bps(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= f64::EPSILON {
            0.0
        } else {
            8.0 * self.bytes_transferred as f64 / secs
        }
    }

    /// Data rate divided by channel bandwidth [b/s/Hz].
    pub fn spectral_efficiency(&self) -> f64 {
        if self.bandwidth_hz <= 0.0 {
            0.0
        } else {
            self.data_rate_bps() / self.bandwidth_hz
        }
    }
}

/// Frame-level counters. Reporting only; never drive protocol decisions.
#[derive(Debug, Clone, Default)]
pub struct LinkCounters {
    /// Physical transmissions of DATA / END frames (master) or ACKs (slave)
    pub transmissions: u64,

    /// Transmissions beyond the first attempt for a packet
    pub retransmissions: u64,

    /// Ack windows that elapsed without a matching ACK
    pub ack_timeouts: u64,

    /// Frames whose header failed the integrity check
    pub header_errors: u64,

    /// Correctly typed frames whose payload failed the integrity check
    pub payload_errors: u64,

    /// Valid frames for a packet id other than the outstanding one
    pub id_mismatches: u64,

    /// Valid frames of the wrong type (own transmissions, other traffic)
    pub foreign_frames: u64,

    /// Frames classified as accepted
    pub frames_accepted: u64,

    /// ACK frames sent (slave)
    pub acks_sent: u64,

    rssi_sum: f64,
    evm_sum: f64,
}

impl LinkCounters {
    /// Count one classified frame.
    pub fn record(&mut self, verdict: Verdict, link_stats: &LinkStats) {
        match verdict {
            Verdict::Accepted => {
                self.frames_accepted += 1;
                self.rssi_sum += f64::from(link_stats.rssi);
                self.evm_sum += f64::from(link_stats.evm);
            }
            Verdict::HeaderError => self.header_errors += 1,
            Verdict::TypeMismatch => self.foreign_frames += 1,
            Verdict::PayloadError => self.payload_errors += 1,
            Verdict::IdMismatch => self.id_mismatches += 1,
        }
    }

    /// Mean RSSI of accepted frames [dB].
    pub fn mean_rssi(&self) -> f64 {
        if self.frames_accepted == 0 {
            0.0
        } else {
            self.rssi_sum / self.frames_accepted as f64
        }
    }

    /// Mean EVM of accepted frames [dB].
    pub fn mean_evm(&self) -> f64 {
        if self.frames_accepted == 0 {
            0.0
        } else {
            self.evm_sum / self.frames_accepted as f64
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All packets delivered (master) or final packet seen (slave)
    Completed,
    /// Master exhausted its attempts on `packet_id`
    Aborted { packet_id: PacketId, attempts: u32 },
}

/// Everything a session hands back to the reporting layer.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub role: SessionRole,
    pub outcome: RunOutcome,
    pub stats: RunStatistics,
    pub counters: LinkCounters,

    /// Distinct DATA packets acknowledged (master) or accepted (slave)
    pub packets_delivered: u32,
}

impl RunReport {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted { .. })
    }

    /// Fallible view of the outcome.
    ///
    /// # Errors
    /// `Error::RetriesExhausted` if the master aborted.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            RunOutcome::Completed => Ok(self),
            RunOutcome::Aborted {
                packet_id,
                attempts,
            } => Err(Error::RetriesExhausted {
                packet_id,
                attempts,
            }),
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== {} summary ===", self.role);
        match self.outcome {
            RunOutcome::Completed => println!("Result: completed"),
            RunOutcome::Aborted {
                packet_id,
                attempts,
            } => println!(
                "Result: ABORTED (packet {} unacknowledged after {} attempts)",
                packet_id, attempts
            ),
        }
        println!("    execution time      : {:12.8} s", self.stats.elapsed().as_secs_f64());
        println!("    bytes transferred   : {:12}", self.stats.bytes_transferred);
        println!("    packets delivered   : {:12}", self.packets_delivered);
        println!("    data rate           : {:12.8} kbps", self.stats.data_rate_bps() * 1e-3);
        println!("    spectral efficiency : {:12.8} b/s/Hz", self.stats.spectral_efficiency());
        println!();

        let c = &self.counters;
        println!("=== Link ===");
        println!("Transmissions: {} ({} retransmissions)", c.transmissions, c.retransmissions);
        println!("Ack timeouts: {}", c.ack_timeouts);
        println!("Header errors: {}", c.header_errors);
        println!("Payload errors: {}", c.payload_errors);
        println!("Unexpected ids: {}", c.id_mismatches);
        println!("Foreign frames: {}", c.foreign_frames);
        println!("Acks sent: {}", c.acks_sent);
        if c.frames_accepted > 0 {
            println!("Mean rssi: {:5.1} dB, mean evm: {:5.1} dB", c.mean_rssi(), c.mean_evm());
        }
        println!();
    }

    /// Export as `key=value` lines (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "role={}\n\
             aborted={}\n\
             elapsed_ms={}\n\
             bytes_transferred={}\n\
             packets_delivered={}\n\
             data_rate_bps={:.4}\n\
             spectral_efficiency={:.6}\n\
             transmissions={}\n\
             retransmissions={}\n\
             ack_timeouts={}\n\
             header_errors={}\n\
             payload_errors={}\n\
             id_mismatches={}\n\
             foreign_frames={}\n\
             acks_sent={}\n",
            self.role,
            self.is_aborted(),
            self.stats.elapsed().as_millis(),
            self.stats.bytes_transferred,
            self.packets_delivered,
            self.stats.data_rate_bps(),
            self.stats.spectral_efficiency(),
            self.counters.transmissions,
            self.counters.retransmissions,
            self.counters.ack_timeouts,
            self.counters.header_errors,
            self.counters.payload_errors,
            self.counters.id_mismatches,
            self.counters.foreign_frames,
            self.counters.acks_sent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_rate() {
        let mut stats = RunStatistics::new(200e3);
        let t0 = Instant::now();
        stats.start(t0);
        stats.add_bytes(1000);
        stats.add_bytes(1500);
        stats.finish(t0 + Duration::from_secs(2));

        assert_eq!(stats.bytes_transferred, 2500);
        assert_eq!(stats.data_rate_bps(), 10_000.0);
        assert_eq!(stats.spectral_efficiency(), 0.05);
    }

    #[test]
    fn test_zero_elapsed_reports_zero_rate() {
        let mut stats = RunStatistics::new(200e3);
        let t0 = Instant::now();
        stats.start(t0);
        stats.add_bytes(100);
        stats.finish(t0);

        assert_eq!(stats.elapsed(), Duration::ZERO);
        assert_eq!(stats.data_rate_bps(), 0.0);
        assert_eq!(stats.spectral_efficiency(), 0.0);
    }

    #[test]
    fn test_unfinished_run_has_no_elapsed() {
        let mut stats = RunStatistics::new(1.0);
        stats.start(Instant::now());
        assert_eq!(stats.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_counters_record() {
        let mut counters = LinkCounters::default();
        let good = LinkStats { rssi: -40.0, evm: -20.0 };
        let better = LinkStats { rssi: -30.0, evm: -30.0 };

        counters.record(Verdict::Accepted, &good);
        counters.record(Verdict::Accepted, &better);
        counters.record(Verdict::HeaderError, &good);
        counters.record(Verdict::TypeMismatch, &good);
        counters.record(Verdict::IdMismatch, &good);
        counters.record(Verdict::PayloadError, &good);

        assert_eq!(counters.frames_accepted, 2);
        assert_eq!(counters.header_errors, 1);
        assert_eq!(counters.foreign_frames, 1);
        assert_eq!(counters.id_mismatches, 1);
        assert_eq!(counters.payload_errors, 1);
        assert_eq!(counters.mean_rssi(), -35.0);
        assert_eq!(counters.mean_evm(), -25.0);
    }

    #[test]
    fn test_into_result() {
        let report = RunReport {
            role: SessionRole::Master,
            outcome: RunOutcome::Aborted {
                packet_id: 3,
                attempts: 500,
            },
            stats: RunStatistics::new(200e3),
            counters: LinkCounters::default(),
            packets_delivered: 3,
        };
        assert!(report.is_aborted());
        assert!(matches!(
            report.into_result(),
            Err(Error::RetriesExhausted {
                packet_id: 3,
                attempts: 500
            })
        ));
    }

    #[test]
    fn test_export_text() {
        let mut stats = RunStatistics::new(200e3);
        stats.add_bytes(600);
        let report = RunReport {
            role: SessionRole::Slave,
            outcome: RunOutcome::Completed,
            stats,
            counters: LinkCounters::default(),
            packets_delivered: 3,
        };

        let text = report.export_text();
        assert!(text.contains("role=slave"));
        assert!(text.contains("aborted=false"));
        assert!(text.contains("bytes_transferred=600"));
        assert!(text.contains("packets_delivered=3"));
    }
}
