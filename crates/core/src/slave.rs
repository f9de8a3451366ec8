//! Receive side of the ping run.
//!
//! The slave polls without a deadline, accepts valid DATA frames and answers
//! each one with an ACK carrying the same id. It never retransmits on its
//! own; a lost ACK is recovered by the master resending the DATA frame,
//! which the slave simply acknowledges again.
//!
//! # Termination
//!
//! How the slave knows the run is over is selected by [`Termination`]:
//!
//! | mode         | last-seen id updated on          | check runs after     | exit after            |
//! |--------------|----------------------------------|----------------------|-----------------------|
//! | `FinalId`    | accepted DATA                    | accepted DATA        | ACK for id `n - 1`    |
//! | `EndOfRun`   | n/a                              | accepted END         | ACK for the END frame |
//! | `Legacy`     | header-valid DATA (starts at 0)  | every received frame | id `n - 1` seen       |

use crate::config::{SessionConfig, SessionRole};
use crate::env::{Clock, SystemClock};
use crate::error::Result;
use crate::events::{Emitter, EventSink, SessionEvent};
use crate::framing::{classify, FrameCodec, Verdict};
use crate::metrics::{LinkCounters, RunOutcome, RunReport, RunStatistics};
use crate::packet::{PacketId, PacketType, ReceivedFrame};
use crate::transport::{PacketTransport, TxConfig};
use log::{debug, info, trace};
use rand::RngCore;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::str::FromStr;

/// How the slave decides the run is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Termination {
    /// Stop after acknowledging DATA id `num_packets - 1`
    #[default]
    FinalId,

    /// Stop after acknowledging an explicit END frame from the master
    EndOfRun,

    /// Compatibility mode: check the last header-valid DATA id after every frame
    Legacy,
}

impl Termination {
    pub const NAMES: &'static [&'static str] = &["final-id", "end-of-run", "legacy"];

    pub fn name(self) -> &'static str {
        match self {
            Self::FinalId => "final-id",
            Self::EndOfRun => "end-of-run",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Termination {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "final-id" => Ok(Self::FinalId),
            "end-of-run" => Ok(Self::EndOfRun),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!(
                "unknown termination '{}' (expected one of: {})",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Responder session: accept DATA, return ACK.
pub struct SlaveSession<T, R = ChaCha8Rng, C = SystemClock>
where
    R: RngCore,
{
    transport: T,
    codec: FrameCodec<R>,
    clock: C,
    config: SessionConfig,
    events: Emitter,
    stats: RunStatistics,
    counters: LinkCounters,
    packets_delivered: u32,
    last_accepted: Option<PacketId>,
}

impl<T> SlaveSession<T>
where
    T: PacketTransport,
{
    /// Slave on the system clock with a ChaCha8 codec seeded from `config.seed`
    /// (zero when unset).
    pub fn with_defaults(transport: T, config: SessionConfig) -> Self {
        let codec = FrameCodec::from_seed(config.seed.unwrap_or_default());
        Self::new(transport, codec, SystemClock, config)
    }
}

impl<T, R, C> SlaveSession<T, R, C>
where
    T: PacketTransport,
    R: RngCore,
    C: Clock,
{
    pub fn new(transport: T, codec: FrameCodec<R>, clock: C, config: SessionConfig) -> Self {
        let stats = RunStatistics::new(config.bandwidth);
        Self {
            transport,
            codec,
            clock,
            config,
            events: Emitter::none(),
            stats,
            counters: LinkCounters::default(),
            packets_delivered: 0,
            last_accepted: None,
        }
    }

    /// Attach a progress sink.
    pub fn with_events(mut self, sink: impl EventSink + Send + 'static) -> Self {
        self.events = Emitter::new(sink);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Give back the transport (e.g. to inspect a test double).
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run until the configured termination condition is met.
    ///
    /// The transport is stopped and the statistics closed even when the run
    /// fails.
    ///
    /// # Errors
    /// Invalid configuration or a transport failure.
    pub fn run(&mut self) -> Result<RunReport> {
        self.config.validate()?;

        let termination = self.config.termination;
        info!(
            "slave waiting for {} packets (termination: {})",
            self.config.num_packets, termination
        );

        self.stats.start(self.clock.now());
        self.transport.start()?;

        let result = self.serve();

        self.stats.finish(self.clock.now());
        let stopped = self.transport.stop();
        self.events.emit(SessionEvent::Finished);
        result?;
        stopped?;

        info!(
            "slave finished: {} packets, {} bytes",
            self.packets_delivered, self.stats.bytes_transferred
        );

        Ok(RunReport {
            role: SessionRole::Slave,
            outcome: RunOutcome::Completed,
            stats: self.stats.clone(),
            counters: self.counters.clone(),
            packets_delivered: self.packets_delivered,
        })
    }

    /// Receive and acknowledge until the termination condition holds.
    fn serve(&mut self) -> Result<()> {
        let final_id = (self.config.num_packets - 1) as PacketId;
        let termination = self.config.termination;
        // Legacy mode starts from id 0, so a one-packet run ends on any frame.
        let mut last_seen: Option<PacketId> = match termination {
            Termination::Legacy => Some(0),
            _ => None,
        };

        loop {
            let frame = self.next_frame()?;

            let expected = match (termination, frame.packet_type()) {
                (Termination::EndOfRun, Some(PacketType::End)) => PacketType::End,
                _ => PacketType::Data,
            };
            let verdict = classify(&frame, expected, None);
            self.counters.record(verdict, &frame.link_stats);

            if termination == Termination::Legacy
                && frame.header_valid
                && frame.packet_type() == Some(PacketType::Data)
            {
                last_seen = Some(frame.id());
            }

            self.events.emit(SessionEvent::FrameClassified {
                packet_id: frame.id(),
                verdict,
            });

            let done = match verdict {
                Verdict::HeaderError => {
                    debug!("rx header invalid");
                    false
                }
                Verdict::TypeMismatch => {
                    trace!("ignoring foreign frame (type byte {})", frame.header[2]);
                    // Foreign traffic skips the termination check except in legacy mode.
                    if termination != Termination::Legacy {
                        continue;
                    }
                    false
                }
                Verdict::PayloadError => {
                    debug!("packet {} payload invalid, not acknowledged", frame.id());
                    false
                }
                Verdict::IdMismatch => false,
                Verdict::Accepted if expected == PacketType::End => {
                    self.acknowledge(frame.id())?;
                    info!("end of run received (id {})", frame.id());
                    true
                }
                Verdict::Accepted => {
                    self.accept_data(&frame)?;
                    termination == Termination::FinalId && frame.id() == final_id
                }
            };

            let legacy_done = termination == Termination::Legacy && last_seen == Some(final_id);
            if done || legacy_done {
                return Ok(());
            }
        }
    }

    /// Poll in quanta until the transport hands over a frame.
    fn next_frame(&mut self) -> Result<ReceivedFrame> {
        loop {
            if let Some(frame) = self.transport.receive(self.config.poll_quantum)? {
                return Ok(frame);
            }
        }
    }

    fn accept_data(&mut self, frame: &ReceivedFrame) -> Result<()> {
        let id = frame.id();
        let len = frame.payload_len();

        self.stats.add_bytes(len);
        if self.last_accepted != Some(id) {
            self.packets_delivered += 1;
        }
        self.last_accepted = Some(id);

        self.events.emit(SessionEvent::DataAccepted {
            packet_id: id,
            payload_len: len,
            link_stats: frame.link_stats,
        });
        debug!(
            "packet {} accepted ({} bytes, rssi {:.1} dB, evm {:.1} dB)",
            id, len, frame.link_stats.rssi, frame.link_stats.evm
        );

        self.acknowledge(id)
    }

    fn acknowledge(&mut self, id: PacketId) -> Result<()> {
        let ack = self.codec.build_ack(id);

        self.clock.sleep(self.config.settle_delay);
        self.transport
            .send(&ack.header_bytes(), &ack.payload, &TxConfig::acknowledgment())?;

        self.counters.transmissions += 1;
        self.counters.acks_sent += 1;
        self.events.emit(SessionEvent::AckSent { packet_id: id });
        Ok(())
    }
}
