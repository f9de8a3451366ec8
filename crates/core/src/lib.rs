//! ping-arq-core: stop-and-wait ARQ ping over a lossy half-duplex link
//!
//! This library provides the protocol core of a link reliability tester:
//! - A master sends numbered DATA frames one at a time and retransmits each
//!   until the matching ACK arrives or its attempt budget runs out
//! - A slave accepts valid DATA frames and answers each with a correlated ACK
//! - Both sides measure goodput, data rate and spectral efficiency
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `packet`: 8-byte header layout and frame types
//! - `framing`: Frame construction (seeded) and classification
//! - `transport`: The physical link boundary (`PacketTransport`)
//! - `retry`: Send / await-ack / retry state machine
//! - `master` / `slave`: The two session roles
//! - `metrics`: Run statistics and link counters
//! - `events`: Progress events for reporting layers
//! - `config`: Run options and their defaults
//! - `env`: Clock abstraction (real or virtual time)
//! - `network`: Seeded shared-channel simulator
//! - `udp`: Datagram transport with CRC integrity verdicts
//!
//! # Design Principles
//!
//! - **No exceptional control flow**: timeouts, corruption and foreign traffic
//!   are verdicts and counters, never errors
//! - **One frame in flight**: the master never advances past an unacknowledged id
//! - **Deterministic**: Seeded randomness and an injectable clock make runs
//!   reproducible
//! - **Observable**: Counters and events for understanding link behavior

pub mod config;
pub mod env;
pub mod error;
pub mod events;
pub mod framing;
pub mod master;
pub mod metrics;
pub mod network;
pub mod packet;
pub mod retry;
pub mod slave;
pub mod transport;
pub mod udp;

// Re-export commonly used types
pub use config::{SessionConfig, SessionRole};
pub use error::{Error, Result};
pub use master::MasterSession;
pub use metrics::{RunOutcome, RunReport};
pub use slave::{SlaveSession, Termination};
pub use transport::{PacketTransport, TxConfig};
