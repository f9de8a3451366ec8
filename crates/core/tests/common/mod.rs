//! Shared test doubles.

#![allow(dead_code)]

use ping_arq_core::env::ManualClock;
use ping_arq_core::error::TransportError;
use ping_arq_core::framing::FrameCodec;
use ping_arq_core::packet::{Header, HeaderBytes, PacketId, PacketType, ReceivedFrame};
use ping_arq_core::transport::{PacketTransport, TxConfig};
use std::collections::VecDeque;
use std::time::Duration;

/// Reaction to one transmission: frames to queue for later polls.
pub type Responder = Box<dyn FnMut(&Header, &[u8]) -> Vec<ReceivedFrame> + Send>;

/// In-memory transport driven by a script.
///
/// Polls pop `inbound` in order. Each `send` is recorded and may queue
/// replies through the responder. Every poll advances the shared virtual
/// clock by the requested quantum, like a real blocking receive would.
pub struct ScriptedLink {
    pub inbound: VecDeque<ReceivedFrame>,
    pub sent: Vec<(Header, Vec<u8>)>,
    pub starts: u32,
    pub stops: u32,
    responder: Option<Responder>,
    clock: ManualClock,
    hang_up_when_empty: bool,
}

impl ScriptedLink {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            inbound: VecDeque::new(),
            sent: Vec::new(),
            starts: 0,
            stops: 0,
            responder: None,
            clock,
            hang_up_when_empty: false,
        }
    }

    pub fn with_responder(
        mut self,
        responder: impl FnMut(&Header, &[u8]) -> Vec<ReceivedFrame> + Send + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Return `ChannelClosed` once the script runs dry instead of idling.
    pub fn hang_up_when_empty(mut self) -> Self {
        self.hang_up_when_empty = true;
        self
    }

    pub fn push(&mut self, frame: ReceivedFrame) {
        self.inbound.push_back(frame);
    }

    pub fn sent_ids(&self) -> Vec<PacketId> {
        self.sent.iter().map(|(header, _)| header.id).collect()
    }

    pub fn sent_types(&self) -> Vec<Option<PacketType>> {
        self.sent.iter().map(|(header, _)| header.packet_type()).collect()
    }
}

impl PacketTransport for ScriptedLink {
    fn start(&mut self) -> Result<(), TransportError> {
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.stops += 1;
        Ok(())
    }

    fn send(
        &mut self,
        header: &HeaderBytes,
        payload: &[u8],
        _tx: &TxConfig,
    ) -> Result<(), TransportError> {
        let header = Header::from_bytes(header);
        if let Some(responder) = self.responder.as_mut() {
            self.inbound.extend(responder(&header, payload));
        }
        self.sent.push((header, payload.to_vec()));
        Ok(())
    }

    fn receive(&mut self, quantum: Duration) -> Result<Option<ReceivedFrame>, TransportError> {
        self.clock.advance(quantum);
        match self.inbound.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if self.hang_up_when_empty => Err(TransportError::ChannelClosed),
            None => Ok(None),
        }
    }
}

/// Intact ACK frame for `id`.
pub fn ack(id: PacketId) -> ReceivedFrame {
    let frame = FrameCodec::from_seed(u64::from(id)).build_ack(id);
    ReceivedFrame::intact(frame.header_bytes(), frame.payload)
}

/// Intact DATA frame for `id` with `len` payload bytes.
pub fn data(id: PacketId, len: usize) -> ReceivedFrame {
    let frame = FrameCodec::from_seed(u64::from(id)).build_data(id, len);
    ReceivedFrame::intact(frame.header_bytes(), frame.payload)
}

/// Intact END frame for `id`.
pub fn end(id: PacketId) -> ReceivedFrame {
    let frame = FrameCodec::from_seed(u64::from(id)).build_end(id);
    ReceivedFrame::intact(frame.header_bytes(), frame.payload)
}

/// Responder that acknowledges every DATA frame immediately.
pub fn ack_everything() -> impl FnMut(&Header, &[u8]) -> Vec<ReceivedFrame> + Send + 'static {
    |header: &Header, _payload: &[u8]| match header.packet_type() {
        Some(PacketType::Data) | Some(PacketType::End) => vec![ack(header.id)],
        _ => Vec::new(),
    }
}
