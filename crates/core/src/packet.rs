//! Frame header format and received-frame representation.
//!
//! Every frame on the link is an 8-byte header followed by a variable-length
//! payload. Integrity of both parts is judged by the transport (checksum),
//! never by this crate; the verdicts arrive as booleans on [`ReceivedFrame`].
//!
//! # Header Format
//!
//! ```text
//! +-------------------+
//! | id (2 bytes)      |  u16 big-endian packet identifier
//! +-------------------+
//! | type (1)          |  59 = DATA, 77 = ACK, 91 = END
//! +-------------------+
//! | fill (5)          |  random, never interpreted
//! +-------------------+
//! ```
//!
//! # Payload
//!
//! DATA frames carry `payload_length` bytes of random content. ACK and END
//! frames carry a fixed [`CONTROL_PAYLOAD_LEN`]-byte random payload whose only
//! purpose is to give the receiver something to checksum.

/// Size of the frame header in bytes
pub const HEADER_LEN: usize = 8;

/// Number of random fill bytes at the end of the header
pub const FILL_LEN: usize = 5;

/// Payload length of ACK and END frames
pub const CONTROL_PAYLOAD_LEN: usize = 10;

/// Raw header bytes as handed to and from the transport.
pub type HeaderBytes = [u8; HEADER_LEN];

/// 16-bit packet identifier. DATA ids run 0, 1, 2, ... per run.
pub type PacketId = u16;

/// Frame type carried in header byte 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Application payload from master to slave
    Data = 59,
    /// Acknowledgment from slave to master
    Ack = 77,
    /// Explicit end-of-run marker (only sent in end-of-run termination mode)
    End = 91,
}

impl PacketType {
    /// Map a wire byte to a packet type. Unknown bytes are foreign traffic.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            59 => Some(Self::Data),
            77 => Some(Self::Ack),
            91 => Some(Self::End),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::End => "END",
        };
        f.write_str(name)
    }
}

/// Parsed view of an 8-byte frame header.
///
/// The type byte is kept raw so that headers with unknown types can still be
/// inspected (and discarded as foreign traffic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Packet identifier
    pub id: PacketId,

    /// Raw type byte; see [`PacketType::from_u8`]
    pub type_byte: u8,

    /// Unstructured fill
    pub fill: [u8; FILL_LEN],
}

impl Header {
    /// Create a header of a known type.
    pub fn new(id: PacketId, packet_type: PacketType, fill: [u8; FILL_LEN]) -> Self {
        Self {
            id,
            type_byte: packet_type.as_u8(),
            fill,
        }
    }

    /// Serialize into the 8-byte wire layout.
    pub fn to_bytes(&self) -> HeaderBytes {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..2].copy_from_slice(&self.id.to_be_bytes());
        bytes[2] = self.type_byte;
        bytes[3..].copy_from_slice(&self.fill);
        bytes
    }

    /// Parse the 8-byte wire layout. Cannot fail: every byte pattern is a
    /// syntactically valid header, validity is the transport's verdict.
    pub fn from_bytes(bytes: &HeaderBytes) -> Self {
        let mut fill = [0u8; FILL_LEN];
        fill.copy_from_slice(&bytes[3..]);
        Self {
            id: u16::from_be_bytes([bytes[0], bytes[1]]),
            type_byte: bytes[2],
            fill,
        }
    }

    /// Decoded packet type, `None` for unknown type bytes.
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.type_byte)
    }
}

/// Link-quality measurements reported by the receiver.
///
/// Carried through for reporting only; never influences protocol decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkStats {
    /// Received signal strength [dB]
    pub rssi: f32,

    /// Error vector magnitude [dB]
    pub evm: f32,
}

/// A frame ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl OutboundFrame {
    pub fn id(&self) -> PacketId {
        self.header.id
    }

    pub fn header_bytes(&self) -> HeaderBytes {
        self.header.to_bytes()
    }
}

/// One candidate frame returned by a transport poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFrame {
    /// Raw header bytes (meaningless if `header_valid` is false)
    pub header: HeaderBytes,

    /// Transport's header integrity verdict
    pub header_valid: bool,

    /// Payload bytes as received
    pub payload: Vec<u8>,

    /// Transport's payload integrity verdict
    pub payload_valid: bool,

    /// Signal measurements for this frame
    pub link_stats: LinkStats,
}

impl ReceivedFrame {
    /// Parsed header view.
    pub fn parsed_header(&self) -> Header {
        Header::from_bytes(&self.header)
    }

    /// Packet id from header bytes 0..2 (big-endian).
    pub fn id(&self) -> PacketId {
        u16::from_be_bytes([self.header[0], self.header[1]])
    }

    /// Decoded packet type, `None` for unknown type bytes.
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.header[2])
    }

    /// Payload length as received.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Build a frame with both integrity checks passing.
    ///
    /// Convenience for transports and tests that deliver frames untouched.
    pub fn intact(header: HeaderBytes, payload: Vec<u8>) -> Self {
        Self {
            header,
            header_valid: true,
            payload,
            payload_valid: true,
            link_stats: LinkStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = Header::new(0x0102, PacketType::Data, [9, 8, 7, 6, 5]);
        let bytes = header.to_bytes();

        assert_eq!(bytes, [0x01, 0x02, 59, 9, 8, 7, 6, 5]);
        assert_eq!(Header::from_bytes(&bytes), header);
    }

    #[test]
    fn test_id_is_big_endian() {
        let bytes = Header::new(5, PacketType::Ack, [0; FILL_LEN]).to_bytes();
        assert_eq!(&bytes[0..2], &[0x00, 0x05]);

        let frame = ReceivedFrame::intact(bytes, vec![0; CONTROL_PAYLOAD_LEN]);
        assert_eq!(frame.id(), 5);
        assert_eq!(frame.packet_type(), Some(PacketType::Ack));
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(PacketType::Data.as_u8(), 59);
        assert_eq!(PacketType::Ack.as_u8(), 77);
        assert_eq!(PacketType::from_u8(91), Some(PacketType::End));
        assert_eq!(PacketType::from_u8(0), None);
        assert_eq!(PacketType::from_u8(78), None);
    }

    #[test]
    fn test_unknown_type_header_still_parses() {
        let bytes = [0xFF, 0xFF, 0x13, 0, 0, 0, 0, 0];
        let header = Header::from_bytes(&bytes);

        assert_eq!(header.id, u16::MAX);
        assert_eq!(header.packet_type(), None);
    }
}
