//! Datagram transport for running master and slave as separate processes.
//!
//! # Wire Format
//!
//! ```text
//! ┌────────────┬───────────────┬──────────────┬──────────────┬────────────────┐
//! │ header (8) │ hdr CRC32 (4) │ pay len (2)  │ payload (N)  │ pay CRC32 (4)  │
//! └────────────┴───────────────┴──────────────┴──────────────┴────────────────┘
//! ```
//!
//! All multi-byte integers are big-endian. The header CRC covers the header
//! and the length field; the payload CRC covers the payload. The CRCs stand
//! in for the radio's own integrity checks and produce the `header_valid` /
//! `payload_valid` verdicts. A datagram too short to hold the fixed section
//! is reported as a header-invalid frame, never as an error.
//!
//! Like lost airtime on a radio, a failed `send_to` is logged and counted
//! but not returned: the missing ACK is the only symptom the sessions see.

use crate::error::{FrameError, TransportError};
use crate::packet::{HeaderBytes, LinkStats, ReceivedFrame, HEADER_LEN};
use crate::transport::{PacketTransport, TxConfig};
use log::{debug, trace, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

const CRC_LEN: usize = 4;
const LEN_FIELD: usize = 2;

/// Bytes before the payload.
pub const FIXED_PREFIX: usize = HEADER_LEN + CRC_LEN + LEN_FIELD;

/// Smallest valid datagram (empty payload).
pub const MIN_DATAGRAM: usize = FIXED_PREFIX + CRC_LEN;

/// Largest datagram the transport will receive.
pub const MAX_DATAGRAM: usize = MIN_DATAGRAM + u16::MAX as usize;

/// Largest UDP payload over IPv4 (65535 - 8 byte UDP - 20 byte IP header).
const MAX_UDP_PAYLOAD: usize = 65_507;

/// Largest frame payload that fits one datagram.
pub const MAX_FRAME_PAYLOAD: usize = MAX_UDP_PAYLOAD - MIN_DATAGRAM;

/// Serialize one frame.
///
/// # Errors
/// `FrameError::PayloadTooLong` if the payload does not fit the length field.
pub fn encode_datagram(header: &HeaderBytes, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLong {
        len: payload.len(),
        max: u16::MAX as usize,
    })?;
    let len_bytes = len.to_be_bytes();

    let mut header_crc = crc32fast::Hasher::new();
    header_crc.update(header);
    header_crc.update(&len_bytes);

    let mut datagram = Vec::with_capacity(MIN_DATAGRAM + payload.len());
    datagram.extend_from_slice(header);
    datagram.extend_from_slice(&header_crc.finalize().to_be_bytes());
    datagram.extend_from_slice(&len_bytes);
    datagram.extend_from_slice(payload);
    datagram.extend_from_slice(&crc32fast::hash(payload).to_be_bytes());

    Ok(datagram)
}

/// Parse one datagram, turning integrity failures into verdicts.
pub fn decode_datagram(datagram: &[u8]) -> ReceivedFrame {
    match split_datagram(datagram) {
        Ok(frame) => frame,
        Err(err) => {
            debug!("malformed datagram: {}", err);
            let mut header = [0u8; HEADER_LEN];
            let n = datagram.len().min(HEADER_LEN);
            header[..n].copy_from_slice(&datagram[..n]);
            ReceivedFrame {
                header,
                header_valid: false,
                payload: Vec::new(),
                payload_valid: false,
                link_stats: LinkStats::default(),
            }
        }
    }
}

fn split_datagram(datagram: &[u8]) -> Result<ReceivedFrame, FrameError> {
    if datagram.len() < MIN_DATAGRAM {
        return Err(FrameError::FrameTooShort {
            required: MIN_DATAGRAM,
            actual: datagram.len(),
        });
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&datagram[..HEADER_LEN]);
    let header_crc = read_u32(&datagram[HEADER_LEN..HEADER_LEN + CRC_LEN]);
    let len_bytes = &datagram[HEADER_LEN + CRC_LEN..FIXED_PREFIX];

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header);
    hasher.update(len_bytes);
    let header_valid = hasher.finalize() == header_crc;

    let declared = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    let actual = datagram.len() - MIN_DATAGRAM;

    let (payload, payload_valid) = if header_valid && declared != actual {
        debug!(
            "{}",
            FrameError::PayloadLengthMismatch {
                expected: declared,
                actual
            }
        );
        (datagram[FIXED_PREFIX..datagram.len() - CRC_LEN].to_vec(), false)
    } else {
        let payload = &datagram[FIXED_PREFIX..datagram.len() - CRC_LEN];
        let payload_crc = read_u32(&datagram[datagram.len() - CRC_LEN..]);
        (payload.to_vec(), crc32fast::hash(payload) == payload_crc)
    };

    Ok(ReceivedFrame {
        header,
        header_valid,
        payload,
        payload_valid,
        link_stats: LinkStats::default(),
    })
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// [`PacketTransport`] over a connectionless UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    started: bool,
    send_failures: u64,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind locally and address every send to `peer`.
    ///
    /// # Errors
    /// Socket bind failure.
    pub fn bind(local: impl ToSocketAddrs, peer: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local)?;
        Ok(Self {
            socket,
            peer,
            started: false,
            send_failures: 0,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Frames that never left the socket.
    pub fn send_failures(&self) -> u64 {
        self.send_failures
    }

    fn drop_frame(&mut self, reason: impl std::fmt::Display) {
        self.send_failures += 1;
        warn!("udp tx to {} dropped: {}", self.peer, reason);
    }
}

impl PacketTransport for UdpTransport {
    fn start(&mut self) -> Result<(), TransportError> {
        self.started = true;
        debug!("udp transport listening on {:?}", self.socket.local_addr().ok());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.started = false;
        Ok(())
    }

    fn send(
        &mut self,
        header: &HeaderBytes,
        payload: &[u8],
        tx: &TxConfig,
    ) -> Result<(), TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }

        let datagram = match encode_datagram(header, payload) {
            Ok(datagram) => datagram,
            Err(err) => {
                self.drop_frame(err);
                return Ok(());
            }
        };
        trace!("udp tx {} bytes to {} ({})", datagram.len(), self.peer, tx);
        if let Err(err) = self.socket.send_to(&datagram, self.peer) {
            self.drop_frame(err);
        }
        Ok(())
    }

    fn receive(&mut self, quantum: Duration) -> Result<Option<ReceivedFrame>, TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }

        // A zero read timeout is rejected by the OS.
        let timeout = quantum.max(Duration::from_micros(1));
        self.socket.set_read_timeout(Some(timeout))?;

        match self.socket.recv_from(&mut self.buf) {
            Ok((n, from)) => {
                trace!("udp rx {} bytes from {}", n, from);
                Ok(Some(decode_datagram(&self.buf[..n])))
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(None)
            }
            // ICMP port unreachable from an earlier send: the peer is not up yet.
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                ) =>
            {
                debug!("udp rx: {}", err);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn max_payload(&self) -> usize {
        MAX_FRAME_PAYLOAD
    }
}
