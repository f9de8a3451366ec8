//! Progress events emitted by the sessions.
//!
//! Reporting is outside the protocol core; sessions simply push
//! [`SessionEvent`]s into an optional [`EventSink`]. Closures implement the
//! trait, so a caller can print, count, or record events:
//!
//! ```
//! use ping_arq_core::events::{EventSink, SessionEvent};
//!
//! let sink = |event: SessionEvent| {
//!     if let Some(c) = event.glyph() {
//!         print!("{c}");
//!     }
//! };
//! sink.on_event(SessionEvent::AckTimeout { packet_id: 0, attempt: 1 });
//! ```

use crate::framing::Verdict;
use crate::packet::{LinkStats, PacketId};

/// Something observable happened inside a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Master is about to transmit a frame
    Transmitting {
        packet_id: PacketId,
        attempt: u32,
        max_attempts: u32,
    },

    /// A received frame was classified
    FrameClassified {
        packet_id: PacketId,
        verdict: Verdict,
    },

    /// Master's ack window for one attempt elapsed with no matching ACK
    AckTimeout { packet_id: PacketId, attempt: u32 },

    /// Slave accepted a DATA frame
    DataAccepted {
        packet_id: PacketId,
        payload_len: usize,
        link_stats: LinkStats,
    },

    /// Slave sent an ACK
    AckSent { packet_id: PacketId },

    /// Master gave up on a packet
    Aborted { packet_id: PacketId, attempts: u32 },

    /// Session loop exited normally
    Finished,
}

impl SessionEvent {
    /// Single-character progress code used in quiet mode.
    pub fn glyph(&self) -> Option<char> {
        match self {
            Self::FrameClassified { verdict, .. } => verdict.glyph(),
            Self::AckTimeout { .. } => Some('T'),
            _ => None,
        }
    }
}

/// Receiver of session events.
pub trait EventSink {
    fn on_event(&self, event: SessionEvent);
}

impl<F> EventSink for F
where
    F: Fn(SessionEvent),
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Optional sink owned by a session.
#[derive(Default)]
pub struct Emitter {
    sink: Option<Box<dyn EventSink + Send>>,
}

impl Emitter {
    /// Emitter that drops every event.
    pub fn none() -> Self {
        Self { sink: None }
    }

    pub fn new(sink: impl EventSink + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(sink) = &self.sink {
            sink.on_event(event);
        }
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_glyphs() {
        let timeout = SessionEvent::AckTimeout {
            packet_id: 1,
            attempt: 2,
        };
        assert_eq!(timeout.glyph(), Some('T'));

        let mismatch = SessionEvent::FrameClassified {
            packet_id: 1,
            verdict: Verdict::IdMismatch,
        };
        assert_eq!(mismatch.glyph(), Some('?'));

        assert_eq!(SessionEvent::Finished.glyph(), None);
    }

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |event: SessionEvent| seen.borrow_mut().push(event);

        sink.on_event(SessionEvent::AckSent { packet_id: 4 });
        sink.on_event(SessionEvent::Finished);

        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[0], SessionEvent::AckSent { packet_id: 4 });
    }

    #[test]
    fn test_emitter_forwards() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let emitter = Emitter::new(move |event: SessionEvent| {
            sink_seen.lock().unwrap().push(event);
        });

        emitter.emit(SessionEvent::Finished);
        Emitter::none().emit(SessionEvent::Finished);

        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Finished]);
    }
}
