//! Command-line configuration for the ping-arq binary.
//!
//! Every option has a default, so each subcommand runs with zero arguments.
//! The resolved configuration (including the random seed) can be printed so
//! runs are reproducible.

use clap::{Args, Parser, Subcommand};
use ping_arq_core::network::SimConfig;
use ping_arq_core::transport::{CrcScheme, FecScheme, Modulation, TxConfig};
use ping_arq_core::{SessionConfig, Termination};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "ping-arq")]
#[command(about = "Stop-and-wait ping for verifying a lossy half-duplex packet link", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate traffic and measure goodput (UDP link)
    Master {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        tx: TxArgs,

        /// Local address to bind
        #[arg(long, default_value = "0.0.0.0:5301")]
        bind: SocketAddr,

        /// Address of the slave
        #[arg(long, default_value = "127.0.0.1:5300")]
        peer: SocketAddr,
    },

    /// Acknowledge traffic from a master (UDP link)
    Slave {
        #[command(flatten)]
        run: RunArgs,

        /// Local address to bind
        #[arg(long, default_value = "0.0.0.0:5300")]
        bind: SocketAddr,

        /// Address of the master
        #[arg(long, default_value = "127.0.0.1:5301")]
        peer: SocketAddr,
    },

    /// Run master and slave in-process over a simulated channel
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        tx: TxArgs,

        #[command(flatten)]
        sim: SimArgs,
    },
}

impl Command {
    pub fn run_args(&self) -> &RunArgs {
        match self {
            Self::Master { run, .. } | Self::Slave { run, .. } | Self::Simulate { run, .. } => run,
        }
    }
}

/// Options shared by both roles.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Carrier frequency [Hz]
    #[arg(short = 'f', long, default_value_t = 462e6)]
    pub frequency: f64,

    /// Channel bandwidth [Hz]
    #[arg(short = 'b', long, default_value_t = 200e3)]
    pub bandwidth: f64,

    /// Number of packets in the run
    #[arg(short = 'N', long, default_value_t = 100)]
    pub num_packets: u32,

    /// Total wait for an ACK after each transmission [ms]
    #[arg(long, default_value_t = 240)]
    pub ack_timeout_ms: u64,

    /// Length of one receive poll [ms]
    #[arg(long, default_value_t = 1)]
    pub poll_ms: u64,

    /// Pause before every transmission [ms]
    #[arg(long, default_value_t = 80)]
    pub settle_ms: u64,

    /// How the slave detects the end of the run (final-id, end-of-run, legacy)
    #[arg(long, default_value_t = Termination::FinalId)]
    pub termination: Termination,

    /// Print progress codes instead of per-packet lines
    #[arg(short, long)]
    pub quiet: bool,

    /// Random seed for frame contents (default: from the clock)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the resolved configuration before running
    #[arg(long)]
    pub print_config: bool,

    /// Also print the report as key=value lines
    #[arg(long)]
    pub export: bool,
}

/// Master-only transmit options.
#[derive(Args, Debug, Clone)]
pub struct TxArgs {
    /// Attempts per packet before the run aborts
    #[arg(short = 'a', long, default_value_t = 500)]
    pub max_attempts: u32,

    /// DATA payload length [bytes]
    #[arg(short = 'n', long, default_value_t = 200)]
    pub payload_len: usize,

    /// Modulation scheme
    #[arg(short = 'm', long, default_value_t = Modulation::Qpsk)]
    pub modulation: Modulation,

    /// Inner FEC scheme
    #[arg(short = 'c', long, default_value_t = FecScheme::None)]
    pub inner_fec: FecScheme,

    /// Outer FEC scheme
    #[arg(short = 'k', long, default_value_t = FecScheme::Hamming74)]
    pub outer_fec: FecScheme,

    /// Integrity check
    #[arg(long, default_value_t = CrcScheme::Crc32)]
    pub crc: CrcScheme,
}

impl TxArgs {
    pub fn tx_config(&self) -> TxConfig {
        TxConfig {
            modulation: self.modulation,
            inner_fec: self.inner_fec,
            outer_fec: self.outer_fec,
            crc: self.crc,
        }
    }
}

/// Channel impairments for `simulate`.
#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// Frame loss probability [0.0, 1.0]
    #[arg(long, default_value_t = 0.05)]
    pub loss: f64,

    /// Header corruption probability
    #[arg(long, default_value_t = 0.02)]
    pub header_errors: f64,

    /// Payload corruption probability
    #[arg(long, default_value_t = 0.05)]
    pub payload_errors: f64,

    /// One-way latency [ms]
    #[arg(long, default_value_t = 2)]
    pub latency_ms: u64,

    /// Latency jitter, uniform ± [ms]
    #[arg(long, default_value_t = 1)]
    pub jitter_ms: u64,

    /// Stations do not hear their own transmissions
    #[arg(long)]
    pub no_echo: bool,
}

impl SimArgs {
    pub fn sim_config(&self, seed: u64) -> SimConfig {
        let mut config = SimConfig::default_with_seed(seed)
            .with_loss_rate(self.loss)
            .with_corruption(self.header_errors, self.payload_errors)
            .with_latency(
                Duration::from_millis(self.latency_ms),
                Duration::from_millis(self.jitter_ms),
            );
        config.self_observation = !self.no_echo;
        config
    }

    pub fn print(&self) {
        println!("=== Channel Simulation ===");
        println!("Latency: {} ms ±{} ms", self.latency_ms, self.jitter_ms);
        println!("Loss rate: {:.2}%", self.loss * 100.0);
        println!("Header errors: {:.2}%", self.header_errors * 100.0);
        println!("Payload errors: {:.2}%", self.payload_errors * 100.0);
        println!("Self-observation: {}", !self.no_echo);
        println!();
    }
}

/// Explicit seed, or one derived from the wall clock.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    })
}

/// Build the session configuration for one role.
pub fn session_config(
    base: SessionConfig,
    run: &RunArgs,
    tx: Option<&TxArgs>,
    seed: u64,
) -> SessionConfig {
    let mut config = base
        .with_carrier_frequency(run.frequency)
        .with_bandwidth(run.bandwidth)
        .with_num_packets(run.num_packets)
        .with_ack_timeout(Duration::from_millis(run.ack_timeout_ms))
        .with_poll_quantum(Duration::from_millis(run.poll_ms))
        .with_settle_delay(Duration::from_millis(run.settle_ms))
        .with_termination(run.termination)
        .with_verbose(!run.quiet)
        .with_seed(seed);

    if let Some(tx) = tx {
        config = config
            .with_max_attempts(tx.max_attempts)
            .with_payload_length(tx.payload_len)
            .with_tx(tx.tx_config());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use ping_arq_core::SessionRole;

    #[test]
    fn test_defaults_match_session_defaults() {
        let cli = Cli::parse_from(["ping-arq", "master"]);
        let Command::Master { run, tx, .. } = &cli.command else {
            panic!("expected master");
        };

        let config = session_config(SessionConfig::master(), run, Some(tx), 1);
        let defaults = SessionConfig::master();

        assert_eq!(config.role, SessionRole::Master);
        assert_eq!(config.num_packets, defaults.num_packets);
        assert_eq!(config.max_attempts, defaults.max_attempts);
        assert_eq!(config.payload_length, defaults.payload_length);
        assert_eq!(config.ack_timeout, defaults.ack_timeout);
        assert_eq!(config.settle_delay, defaults.settle_delay);
        assert_eq!(config.tx, TxConfig::default());
        assert_eq!(config.termination, Termination::FinalId);
        assert!(config.verbose);
    }

    #[test]
    fn test_parse_master_options() {
        let cli = Cli::parse_from([
            "ping-arq", "master", "-N", "10", "-a", "3", "-n", "64", "-m", "qam16", "-k", "none",
            "--termination", "end-of-run", "--quiet", "--seed", "42",
        ]);
        let Command::Master { run, tx, .. } = &cli.command else {
            panic!("expected master");
        };

        let seed = resolve_seed(run.seed);
        let config = session_config(SessionConfig::master(), run, Some(tx), seed);

        assert_eq!(seed, 42);
        assert_eq!(config.num_packets, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.payload_length, 64);
        assert_eq!(config.tx.modulation, Modulation::Qam16);
        assert_eq!(config.tx.outer_fec, FecScheme::None);
        assert_eq!(config.termination, Termination::EndOfRun);
        assert!(!config.verbose);
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        assert!(Cli::try_parse_from(["ping-arq", "master", "-m", "qam1024"]).is_err());
    }

    #[test]
    fn test_crc_has_no_short_flag() {
        assert!(Cli::try_parse_from(["ping-arq", "master", "-v", "crc16"]).is_err());

        let cli = Cli::parse_from(["ping-arq", "master", "--crc", "crc16"]);
        let Command::Master { tx, .. } = &cli.command else {
            panic!("expected master");
        };
        assert_eq!(tx.crc, CrcScheme::Crc16);
    }

    #[test]
    fn test_sim_config() {
        let cli = Cli::parse_from(["ping-arq", "simulate", "--loss", "0.2", "--no-echo"]);
        let Command::Simulate { sim, .. } = &cli.command else {
            panic!("expected simulate");
        };

        let config = sim.sim_config(5);
        assert_eq!(config.loss_rate, 0.2);
        assert!(!config.self_observation);
        assert_eq!(config.seed, 5);
    }
}
