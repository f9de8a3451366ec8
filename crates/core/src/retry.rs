//! Stop-and-wait send / await-ack / retry loop.
//!
//! [`RetryController`] delivers exactly one outstanding frame. It does not
//! decide what to send next; [`crate::master::MasterSession`] owns the packet
//! sequence and calls [`RetryController::deliver`] once per packet id.
//!
//! # State machine (per outstanding id)
//!
//! ```text
//!  Idle ──▶ Sending ──▶ AwaitingAck ──ACK accepted──▶ Acked
//!              ▲              │
//!              │              │ cumulative wait ≥ ack_timeout
//!              │              ▼
//!              └─attempts<max─ TimedOut ──attempts==max──▶ (exhausted)
//! ```
//!
//! # Contract
//! - Every physical send is preceded by the settle delay.
//! - The ack window is measured by summing poll quanta, so a transport that
//!   returns early with a frame still consumes a whole quantum of budget.
//! - Only a frame classified `Accepted` (right type, right id, both integrity
//!   checks passing) ends the wait. Everything else is counted and ignored.

use crate::env::Clock;
use crate::error::Result;
use crate::events::{Emitter, SessionEvent};
use crate::framing::{classify, Verdict};
use crate::metrics::LinkCounters;
use crate::packet::{OutboundFrame, PacketType};
use crate::transport::{PacketTransport, TxConfig};
use log::{debug, trace};
use std::time::Duration;

/// Bounds and timing for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per packet before giving up (≥ 1)
    pub max_attempts: u32,

    /// Total wait for an ACK after each transmission
    pub ack_timeout: Duration,

    /// Length of one receive poll
    pub poll_quantum: Duration,

    /// Pause before every transmission
    pub settle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 500,
            ack_timeout: Duration::from_millis(240),
            poll_quantum: Duration::from_millis(1),
            settle_delay: Duration::from_millis(80),
        }
    }
}

/// Position in the per-packet state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArqState {
    Idle,
    Sending,
    AwaitingAck,
    Acked,
    TimedOut,
}

/// Result of delivering one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Matching ACK accepted after `attempts` transmissions
    Acked { attempts: u32 },
    /// No matching ACK after `attempts` transmissions
    Exhausted { attempts: u32 },
}

impl Delivery {
    pub fn attempts(self) -> u32 {
        match self {
            Self::Acked { attempts } | Self::Exhausted { attempts } => attempts,
        }
    }
}

/// Drives the send → await → retry loop for one outstanding frame at a time.
#[derive(Debug)]
pub struct RetryController {
    policy: RetryPolicy,
    state: ArqState,
    attempts: u32,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: ArqState::Idle,
            attempts: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current state; `Acked` or `TimedOut` after a delivery returns.
    pub fn state(&self) -> ArqState {
        self.state
    }

    /// Transmissions made for the current (or last) frame.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Deliver `frame` and wait for an `expect`-typed reply carrying its id.
    ///
    /// # Errors
    /// Only transport failures. Running out of attempts is
    /// [`Delivery::Exhausted`], not an error.
    #[allow(clippy::too_many_arguments)]
    pub fn deliver<T, C>(
        &mut self,
        transport: &mut T,
        clock: &C,
        frame: &OutboundFrame,
        expect: PacketType,
        tx: &TxConfig,
        counters: &mut LinkCounters,
        events: &Emitter,
    ) -> Result<Delivery>
    where
        T: PacketTransport + ?Sized,
        C: Clock + ?Sized,
    {
        let id = frame.id();
        let header = frame.header_bytes();
        self.attempts = 0;
        self.state = ArqState::Idle;

        loop {
            self.attempts += 1;
            self.state = ArqState::Sending;
            events.emit(SessionEvent::Transmitting {
                packet_id: id,
                attempt: self.attempts,
                max_attempts: self.policy.max_attempts,
            });

            clock.sleep(self.policy.settle_delay);
            transport.send(&header, &frame.payload, tx)?;
            counters.transmissions += 1;
            if self.attempts > 1 {
                counters.retransmissions += 1;
            }

            self.state = ArqState::AwaitingAck;
            if self.await_ack(transport, frame, expect, counters, events)? {
                self.state = ArqState::Acked;
                return Ok(Delivery::Acked {
                    attempts: self.attempts,
                });
            }

            self.state = ArqState::TimedOut;
            counters.ack_timeouts += 1;
            events.emit(SessionEvent::AckTimeout {
                packet_id: id,
                attempt: self.attempts,
            });
            debug!(
                "packet {} ack timeout (attempt {}/{})",
                id, self.attempts, self.policy.max_attempts
            );

            if self.attempts >= self.policy.max_attempts {
                return Ok(Delivery::Exhausted {
                    attempts: self.attempts,
                });
            }
        }
    }

    /// Poll until a matching reply is accepted or the ack window closes.
    fn await_ack<T>(
        &self,
        transport: &mut T,
        frame: &OutboundFrame,
        expect: PacketType,
        counters: &mut LinkCounters,
        events: &Emitter,
    ) -> Result<bool>
    where
        T: PacketTransport + ?Sized,
    {
        let id = frame.id();
        let mut waited = Duration::ZERO;

        while waited < self.policy.ack_timeout {
            let polled = transport.receive(self.policy.poll_quantum)?;
            waited += self.policy.poll_quantum;

            let Some(reply) = polled else {
                continue;
            };

            let verdict = classify(&reply, expect, Some(id));
            counters.record(verdict, &reply.link_stats);

            match verdict {
                Verdict::TypeMismatch => {
                    trace!("ignoring foreign frame while awaiting {} {}", expect, id);
                }
                Verdict::IdMismatch => {
                    debug!("{} id ({}) does not match outstanding id {}", expect, reply.id(), id);
                }
                Verdict::HeaderError => debug!("rx header invalid"),
                Verdict::PayloadError => debug!("rx payload invalid"),
                Verdict::Accepted => {}
            }

            events.emit(SessionEvent::FrameClassified {
                packet_id: reply.id(),
                verdict,
            });

            if verdict == Verdict::Accepted {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
