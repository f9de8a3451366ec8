//! Boundary to the physical packet link.
//!
//! The ARQ sessions never touch a radio, socket, or simulator directly. They
//! drive a [`PacketTransport`]:
//!
//! - `start()` / `stop()` switch continuous background reception on and off.
//!   Sessions call each exactly once around their loop.
//! - `send()` puts one frame on the air. Lost airtime (e.g. hardware
//!   underflow) is not reported; the missing ACK is the only symptom.
//! - `receive(quantum)` blocks for at most `quantum` and returns at most one
//!   candidate frame together with the transport's integrity verdicts.
//!
//! The modulation / FEC / CRC selection in [`TxConfig`] is forwarded to the
//! transport untouched.

use crate::error::TransportError;
use crate::packet::{HeaderBytes, ReceivedFrame};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A half-duplex, lossy, frame-oriented link.
pub trait PacketTransport {
    /// Activate continuous reception.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Deactivate continuous reception.
    fn stop(&mut self) -> Result<(), TransportError>;

    /// Transmit one frame.
    fn send(
        &mut self,
        header: &HeaderBytes,
        payload: &[u8],
        tx: &TxConfig,
    ) -> Result<(), TransportError>;

    /// Wait up to `quantum` for one frame.
    fn receive(&mut self, quantum: Duration) -> Result<Option<ReceivedFrame>, TransportError>;

    /// Largest payload one frame can carry.
    fn max_payload(&self) -> usize {
        u16::MAX as usize
    }
}

impl<T: PacketTransport + ?Sized> PacketTransport for Box<T> {
    fn start(&mut self) -> Result<(), TransportError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        (**self).stop()
    }

    fn send(
        &mut self,
        header: &HeaderBytes,
        payload: &[u8],
        tx: &TxConfig,
    ) -> Result<(), TransportError> {
        (**self).send(header, payload, tx)
    }

    fn receive(&mut self, quantum: Duration) -> Result<Option<ReceivedFrame>, TransportError> {
        (**self).receive(quantum)
    }

    fn max_payload(&self) -> usize {
        (**self).max_payload()
    }
}

/// Generates `FromStr`/`Display` for a scheme enum from a name table.
macro_rules! scheme_names {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// All recognised names, in declaration order.
            pub const NAMES: &'static [&'static str] = &[$($name),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}' (expected one of: {})",
                        $what,
                        other,
                        Self::NAMES.join(", ")
                    )),
                }
            }
        }
    };
}

/// Linear modulation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modulation {
    Bpsk,
    Qpsk,
    Psk8,
    Qam16,
    Qam32,
    Qam64,
    Ask4,
}

scheme_names!(Modulation, "modulation scheme", {
    Bpsk => "bpsk",
    Qpsk => "qpsk",
    Psk8 => "psk8",
    Qam16 => "qam16",
    Qam32 => "qam32",
    Qam64 => "qam64",
    Ask4 => "ask4",
});

/// Forward-error-correction scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FecScheme {
    None,
    Rep3,
    Rep5,
    Hamming74,
    Hamming84,
    Hamming128,
    ConvV27,
    ConvV29,
}

scheme_names!(FecScheme, "fec scheme", {
    None => "none",
    Rep3 => "rep3",
    Rep5 => "rep5",
    Hamming74 => "h74",
    Hamming84 => "h84",
    Hamming128 => "h128",
    ConvV27 => "v27",
    ConvV29 => "v29",
});

/// Data validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrcScheme {
    None,
    Checksum,
    Crc8,
    Crc16,
    Crc24,
    Crc32,
}

scheme_names!(CrcScheme, "crc scheme", {
    None => "none",
    Checksum => "checksum",
    Crc8 => "crc8",
    Crc16 => "crc16",
    Crc24 => "crc24",
    Crc32 => "crc32",
});

/// Physical-layer transmit parameters, forwarded opaquely to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfig {
    pub modulation: Modulation,
    pub inner_fec: FecScheme,
    pub outer_fec: FecScheme,
    pub crc: CrcScheme,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            modulation: Modulation::Qpsk,
            inner_fec: FecScheme::None,
            outer_fec: FecScheme::Hamming74,
            crc: CrcScheme::Crc32,
        }
    }
}

impl TxConfig {
    /// Fixed parameters the slave uses for its acknowledgments.
    pub fn acknowledgment() -> Self {
        Self {
            modulation: Modulation::Qpsk,
            crc: CrcScheme::Crc32,
            ..Self::default()
        }
    }
}

impl fmt::Display for TxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fec={}/{} check={}",
            self.modulation, self.inner_fec, self.outer_fec, self.crc
        )
    }
}
