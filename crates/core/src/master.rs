//! Transmit side of the ping run.
//!
//! The master sends DATA ids `0..num_packets` strictly in order, handing each
//! frame to a [`RetryController`]. It advances only after the matching ACK is
//! accepted. If a packet exhausts its attempt budget the run aborts: no later
//! id is ever sent, and the statistics gathered so far are still reported.

use crate::config::{SessionConfig, SessionRole};
use crate::env::{Clock, SystemClock};
use crate::error::Result;
use crate::events::{Emitter, EventSink, SessionEvent};
use crate::framing::FrameCodec;
use crate::metrics::{LinkCounters, RunOutcome, RunReport, RunStatistics};
use crate::packet::{PacketId, PacketType};
use crate::retry::{Delivery, RetryController};
use crate::slave::Termination;
use crate::transport::PacketTransport;
use log::{debug, info, warn};
use rand::RngCore;
use rand_chacha::ChaCha8Rng;

/// Attempt budget for the END frame. A slave that already left never answers.
pub const END_OF_RUN_ATTEMPTS: u32 = 5;

/// Traffic generator session.
pub struct MasterSession<T, R = ChaCha8Rng, C = SystemClock>
where
    R: RngCore,
{
    transport: T,
    codec: FrameCodec<R>,
    clock: C,
    config: SessionConfig,
    controller: RetryController,
    events: Emitter,
    stats: RunStatistics,
    counters: LinkCounters,
    packets_delivered: u32,
}

impl<T> MasterSession<T>
where
    T: PacketTransport,
{
    /// Master on the system clock with a ChaCha8 codec seeded from
    /// `config.seed` (zero when unset).
    pub fn with_defaults(transport: T, config: SessionConfig) -> Self {
        let codec = FrameCodec::from_seed(config.seed.unwrap_or_default());
        Self::new(transport, codec, SystemClock, config)
    }
}

impl<T, R, C> MasterSession<T, R, C>
where
    T: PacketTransport,
    R: RngCore,
    C: Clock,
{
    pub fn new(transport: T, codec: FrameCodec<R>, clock: C, config: SessionConfig) -> Self {
        let controller = RetryController::new(config.retry_policy());
        let stats = RunStatistics::new(config.bandwidth);
        Self {
            transport,
            codec,
            clock,
            config,
            controller,
            events: Emitter::none(),
            stats,
            counters: LinkCounters::default(),
            packets_delivered: 0,
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

    /// Send every packet or stop at the first one that exhausts its attempts.
    ///
    /// An abort is reported through [`RunOutcome::Aborted`], not as an error.
    ///
    /// The transport is stopped and the statistics closed even when the run
    /// fails.
    ///
    /// # Errors
    /// Invalid configuration or a transport failure.
    pub fn run(&mut self) -> Result<RunReport> {
        self.config.validate()?;
        self.config.check_payload_fits(self.transport.max_payload())?;

        info!(
            "master sending {} packets of {} bytes ({})",
            self.config.num_packets, self.config.payload_length, self.config.tx
        );

        self.stats.start(self.clock.now());
        self.transport.start()?;

        let result = self.send_packets();
        // The END handshake is not part of the measured exchange.
        self.stats.finish(self.clock.now());

        let result = match result {
            Ok(RunOutcome::Completed) if self.config.termination == Termination::EndOfRun => {
                self.send_end_of_run().map(|()| RunOutcome::Completed)
            }
            other => other,
        };

        let stopped = self.transport.stop();
        self.events.emit(SessionEvent::Finished);
        let outcome = result?;
        stopped?;

        info!(
            "master finished: {}/{} packets, {} bytes",
            self.packets_delivered, self.config.num_packets, self.stats.bytes_transferred
        );

        Ok(RunReport {
            role: SessionRole::Master,
            outcome,
            stats: self.stats.clone(),
            counters: self.counters.clone(),
            packets_delivered: self.packets_delivered,
        })
    }

    fn send_packets(&mut self) -> Result<RunOutcome> {
        for n in 0..self.config.num_packets {
            let id = n as PacketId;
            // Built once: retransmissions of an id are byte-identical.
            let frame = self.codec.build_data(id, self.config.payload_length);

            let delivery = self.controller.deliver(
                &mut self.transport,
                &self.clock,
                &frame,
                PacketType::Ack,
                &self.config.tx,
                &mut self.counters,
                &self.events,
            )?;

            match delivery {
                Delivery::Acked { attempts } => {
                    self.stats.add_bytes(frame.payload.len());
                    self.packets_delivered += 1;
                    debug!("packet {} acknowledged after {} attempt(s)", id, attempts);
                }
                Delivery::Exhausted { attempts } => {
                    warn!(
                        "packet {} not acknowledged after {} attempts, aborting run",
                        id, attempts
                    );
                    self.events.emit(SessionEvent::Aborted {
                        packet_id: id,
                        attempts,
                    });
                    return Ok(RunOutcome::Aborted {
                        packet_id: id,
                        attempts,
                    });
                }
            }
        }
        Ok(RunOutcome::Completed)
    }

    /// Announce the end of the run. Failure to get it acknowledged is logged only.
    fn send_end_of_run(&mut self) -> Result<()> {
        let id = self.config.num_packets as PacketId;
        let frame = self.codec.build_end(id);

        let mut policy = self.config.retry_policy();
        policy.max_attempts = policy.max_attempts.min(END_OF_RUN_ATTEMPTS);
        let delivery = RetryController::new(policy).deliver(
            &mut self.transport,
            &self.clock,
            &frame,
            PacketType::Ack,
            &self.config.tx,
            &mut self.counters,
            &self.events,
        )?;

        match delivery {
            Delivery::Acked { attempts } => {
                info!("end of run acknowledged after {} attempt(s)", attempts)
            }
            Delivery::Exhausted { attempts } => warn!(
                "end of run not acknowledged after {} attempts; slave may still be waiting",
                attempts
            ),
        }
        Ok(())
    }
}
