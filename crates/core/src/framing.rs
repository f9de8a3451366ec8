//! Frame construction and classification.
//!
//! [`FrameCodec`] builds outbound DATA / ACK / END frames. Header fill bytes
//! and payload content are random; only length and integrity matter to the
//! protocol. The randomness source is injected so runs are reproducible from
//! a seed.
//!
//! [`classify`] is the single decision function both roles use on an inbound
//! frame. Checks run in a fixed order:
//!
//! ```text
//! header valid? ──no──▶ HeaderError
//!      │yes
//! type == expected? ──no──▶ TypeMismatch   (own transmission / foreign)
//!      │yes
//! payload valid? ──no──▶ PayloadError
//!      │yes
//! id == expected? ──no──▶ IdMismatch       (only when an id is expected)
//!      │yes
//!   Accepted
//! ```

use crate::packet::{
    Header, OutboundFrame, PacketId, PacketType, ReceivedFrame, CONTROL_PAYLOAD_LEN, FILL_LEN,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Outcome of classifying one received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Frame is what the caller is waiting for
    Accepted,
    /// Header failed its integrity check
    HeaderError,
    /// Header is valid but the type is not the expected one
    TypeMismatch,
    /// Header and type fine, payload failed its integrity check
    PayloadError,
    /// Everything valid but for a different packet id
    IdMismatch,
}

impl Verdict {
    /// Integrity failures, as opposed to foreign or stale traffic.
    pub fn is_corruption(self) -> bool {
        matches!(self, Self::HeaderError | Self::PayloadError)
    }

    /// Single-character progress code, `None` for silently ignored frames.
    pub fn glyph(self) -> Option<char> {
        match self {
            Self::Accepted => Some('.'),
            Self::HeaderError => Some('x'),
            Self::PayloadError => Some('X'),
            Self::IdMismatch => Some('?'),
            Self::TypeMismatch => None,
        }
    }
}

/// Classify a received frame against what the caller expects.
///
/// `expected_id` is `None` when any id is acceptable (the slave does not
/// know which id comes next).
pub fn classify(
    frame: &ReceivedFrame,
    expected_type: PacketType,
    expected_id: Option<PacketId>,
) -> Verdict {
    if !frame.header_valid {
        return Verdict::HeaderError;
    }
    if frame.packet_type() != Some(expected_type) {
        return Verdict::TypeMismatch;
    }
    if !frame.payload_valid {
        return Verdict::PayloadError;
    }
    match expected_id {
        Some(id) if id != frame.id() => Verdict::IdMismatch,
        _ => Verdict::Accepted,
    }
}

/// Builder for outbound frames.
///
/// Generic over the RNG so tests can use any seeded generator; the default is
/// ChaCha8 like the rest of the crate.
pub struct FrameCodec<R: RngCore = ChaCha8Rng> {
    rng: R,
}

impl FrameCodec<ChaCha8Rng> {
    /// Codec backed by a ChaCha8 generator seeded with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> FrameCodec<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// DATA frame for `id` with `payload_len` random bytes.
    pub fn build_data(&mut self, id: PacketId, payload_len: usize) -> OutboundFrame {
        self.build(id, PacketType::Data, payload_len)
    }

    /// ACK frame echoing the id of the DATA frame being acknowledged.
    pub fn build_ack(&mut self, acked_id: PacketId) -> OutboundFrame {
        self.build(acked_id, PacketType::Ack, CONTROL_PAYLOAD_LEN)
    }

    /// END-of-run marker frame.
    pub fn build_end(&mut self, id: PacketId) -> OutboundFrame {
        self.build(id, PacketType::End, CONTROL_PAYLOAD_LEN)
    }

    fn build(&mut self, id: PacketId, packet_type: PacketType, payload_len: usize) -> OutboundFrame {
        let mut fill = [0u8; FILL_LEN];
        self.rng.fill_bytes(&mut fill);

        let mut payload = vec![0u8; payload_len];
        self.rng.fill_bytes(&mut payload);

        OutboundFrame {
            header: Header::new(id, packet_type, fill),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::LinkStats;

    fn received(frame: &OutboundFrame, header_valid: bool, payload_valid: bool) -> ReceivedFrame {
        ReceivedFrame {
            header: frame.header_bytes(),
            header_valid,
            payload: frame.payload.clone(),
            payload_valid,
            link_stats: LinkStats::default(),
        }
    }

    #[test]
    fn test_data_frame_shape() {
        let mut codec = FrameCodec::from_seed(1);
        let frame = codec.build_data(3, 200);

        assert_eq!(frame.id(), 3);
        assert_eq!(frame.header.packet_type(), Some(PacketType::Data));
        assert_eq!(frame.payload.len(), 200);
    }

    #[test]
    fn test_ack_echoes_id() {
        let mut codec = FrameCodec::from_seed(1);
        let ack = codec.build_ack(5);

        assert_eq!(ack.id(), 5);
        assert_eq!(ack.header.packet_type(), Some(PacketType::Ack));
        assert_eq!(ack.payload.len(), CONTROL_PAYLOAD_LEN);
    }

    #[test]
    fn test_codec_determinism() {
        let mut a = FrameCodec::from_seed(12345);
        let mut b = FrameCodec::from_seed(12345);

        for id in 0..10 {
            assert_eq!(a.build_data(id, 64), b.build_data(id, 64));
            assert_eq!(a.build_ack(id), b.build_ack(id));
        }
    }

    #[test]
    fn test_fill_changes_between_frames() {
        let mut codec = FrameCodec::from_seed(7);
        let first = codec.build_ack(0);
        let second = codec.build_ack(0);

        assert_ne!(first.header.fill, second.header.fill);
    }

    #[test]
    fn test_classify_accepts_matching_ack() {
        let mut codec = FrameCodec::from_seed(0);
        let ack = received(&codec.build_ack(5), true, true);

        assert_eq!(classify(&ack, PacketType::Ack, Some(5)), Verdict::Accepted);
        assert_eq!(classify(&ack, PacketType::Ack, Some(4)), Verdict::IdMismatch);
        assert_eq!(classify(&ack, PacketType::Ack, None), Verdict::Accepted);
    }

    #[test]
    fn test_classify_own_data_is_type_mismatch() {
        let mut codec = FrameCodec::from_seed(0);
        let echo = received(&codec.build_data(0, 16), true, true);

        assert_eq!(classify(&echo, PacketType::Ack, Some(0)), Verdict::TypeMismatch);
    }

    #[test]
    fn test_classify_check_order() {
        let mut codec = FrameCodec::from_seed(0);
        let data = codec.build_data(9, 16);

        // Header error wins over everything, even a type mismatch.
        let bad_header = received(&data, false, false);
        assert_eq!(classify(&bad_header, PacketType::Ack, Some(1)), Verdict::HeaderError);

        // Type is checked before payload validity.
        let bad_payload = received(&data, true, false);
        assert_eq!(classify(&bad_payload, PacketType::Ack, Some(9)), Verdict::TypeMismatch);
        assert_eq!(classify(&bad_payload, PacketType::Data, None), Verdict::PayloadError);

        // Payload is checked before the id.
        assert_eq!(classify(&bad_payload, PacketType::Data, Some(1)), Verdict::PayloadError);
    }

    #[test]
    fn test_unknown_type_is_type_mismatch() {
        let frame = ReceivedFrame::intact([0, 0, 1, 0, 0, 0, 0, 0], vec![]);
        assert_eq!(classify(&frame, PacketType::Data, None), Verdict::TypeMismatch);
    }

    #[test]
    fn test_glyphs() {
        assert_eq!(Verdict::Accepted.glyph(), Some('.'));
        assert_eq!(Verdict::HeaderError.glyph(), Some('x'));
        assert_eq!(Verdict::PayloadError.glyph(), Some('X'));
        assert_eq!(Verdict::IdMismatch.glyph(), Some('?'));
        assert_eq!(Verdict::TypeMismatch.glyph(), None);
        assert!(Verdict::HeaderError.is_corruption());
        assert!(!Verdict::IdMismatch.is_corruption());
    }
}
