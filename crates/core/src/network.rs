//! Simulated half-duplex radio channel with latency, jitter, loss, and
//! corruption.
//!
//! All endpoints share one medium: every frame sent by one endpoint is heard
//! by every other *started* endpoint, and (optionally) by the sender itself,
//! which is how a radio observes its own transmission.
//!
//! # Simulated Effects
//!
//! - **Latency**: Base delay for all frames
//! - **Jitter**: Random variation in latency (uniform ±jitter)
//! - **Loss**: Random frame drops per receiver (Bernoulli)
//! - **Corruption**: Header or payload integrity failures (Bernoulli), surfaced
//!   through the frame's validity verdicts like a real CRC would
//! - **Self-observation**: The sender hears its own frame, intact
//!
//! # Implementation
//!
//! Each endpoint owns a priority queue (min-heap) keyed by delivery time. A
//! blocked `receive` waits on a condition variable until either a frame
//! becomes due or its quantum runs out.
//!
//! # Determinism
//!
//! All randomness comes from a single seeded ChaCha8 RNG. Given the same seed
//! and the same sequence of sends, impairment decisions are identical.

use crate::error::TransportError;
use crate::packet::{HeaderBytes, LinkStats, ReceivedFrame};
use crate::transport::{PacketTransport, TxConfig};
use log::trace;
use parking_lot::{Condvar, Mutex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for channel simulation.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Base one-way latency
    pub base_latency: Duration,

    /// Jitter range (uniform ±jitter)
    pub jitter: Duration,

    /// Frame loss probability per receiver [0.0, 1.0]
    pub loss_rate: f64,

    /// Probability that a delivered frame fails its header check
    pub header_error_rate: f64,

    /// Probability that a delivered frame fails its payload check
    pub payload_error_rate: f64,

    /// Whether a sender hears its own transmissions
    pub self_observation: bool,

    /// Mean reported RSSI [dB]
    pub rssi: f32,

    /// Mean reported EVM [dB]
    pub evm: f32,

    /// Random seed for determinism
    pub seed: u64,
}

impl SimConfig {
    /// Create a configuration with no impairments (perfect channel).
    pub fn perfect(seed: u64) -> Self {
        Self {
            base_latency: Duration::ZERO,
            jitter: Duration::ZERO,
            loss_rate: 0.0,
            header_error_rate: 0.0,
            payload_error_rate: 0.0,
            self_observation: true,
            rssi: -40.0,
            evm: -30.0,
            seed,
        }
    }

    /// Create a default configuration with moderate impairments.
    pub fn default_with_seed(seed: u64) -> Self {
        Self {
            base_latency: Duration::from_millis(2),
            jitter: Duration::from_millis(1),
            loss_rate: 0.05,
            header_error_rate: 0.02,
            payload_error_rate: 0.05,
            self_observation: true,
            rssi: -62.0,
            evm: -18.0,
            seed,
        }
    }

    pub fn with_loss_rate(mut self, loss_rate: f64) -> Self {
        self.loss_rate = loss_rate;
        self
    }

    pub fn with_corruption(mut self, header_error_rate: f64, payload_error_rate: f64) -> Self {
        self.header_error_rate = header_error_rate;
        self.payload_error_rate = payload_error_rate;
        self
    }

    pub fn with_latency(mut self, base_latency: Duration, jitter: Duration) -> Self {
        self.base_latency = base_latency;
        self.jitter = jitter;
        self
    }
}

/// Statistics about channel behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Frames put on the channel
    pub frames_sent: u64,

    /// Per-receiver deliveries dropped by loss
    pub frames_dropped: u64,

    /// Deliveries marked header-invalid
    pub header_corrupted: u64,

    /// Deliveries marked payload-invalid
    pub payload_corrupted: u64,

    /// Frames handed to a receiver by `receive`
    pub frames_delivered: u64,
}

impl ChannelStats {
    /// Fraction of peer deliveries lost.
    pub fn loss_rate(&self, receivers: u64) -> f64 {
        let attempted = self.frames_sent * receivers;
        if attempted == 0 {
            0.0
        } else {
            self.frames_dropped as f64 / attempted as f64
        }
    }
}

/// A frame with scheduled delivery time.
#[derive(Debug, Clone)]
struct ScheduledFrame {
    frame: ReceivedFrame,
    delivery_time: Instant,
    seq: u64,
}

// Implement ordering for the heap (min-heap: earliest delivery first, then send order)
impl PartialEq for ScheduledFrame {
    fn eq(&self, other: &Self) -> bool {
        self.delivery_time == other.delivery_time && self.seq == other.seq
    }
}

impl Eq for ScheduledFrame {}

impl PartialOrd for ScheduledFrame {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledFrame {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .delivery_time
            .cmp(&self.delivery_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct Inbox {
    queue: BinaryHeap<ScheduledFrame>,
    listening: bool,
}

#[derive(Debug)]
struct Medium {
    rng: ChaCha8Rng,
    inboxes: Vec<Inbox>,
    stats: ChannelStats,
    next_seq: u64,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    medium: Mutex<Medium>,
    arrival: Condvar,
}

/// The shared medium. Hand out one [`SimEndpoint`] per station.
#[derive(Debug, Clone)]
pub struct SimChannel {
    config: SimConfig,
    shared: Arc<Shared>,
}

impl SimChannel {
    pub fn new(config: SimConfig) -> Self {
        let medium = Medium {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            inboxes: Vec::new(),
            stats: ChannelStats::default(),
            next_seq: 0,
            closed: false,
        };

        Self {
            config,
            shared: Arc::new(Shared {
                medium: Mutex::new(medium),
                arrival: Condvar::new(),
            }),
        }
    }

    /// Attach a new station to the channel.
    pub fn endpoint(&self) -> SimEndpoint {
        let mut medium = self.shared.medium.lock();
        medium.inboxes.push(Inbox::default());
        SimEndpoint {
            index: medium.inboxes.len() - 1,
            config: self.config,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Shut the channel down; every blocked or later call fails with
    /// `ChannelClosed`.
    pub fn close(&self) {
        self.shared.medium.lock().closed = true;
        self.shared.arrival.notify_all();
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.medium.lock().stats
    }
}

/// One station's view of a [`SimChannel`].
#[derive(Debug)]
pub struct SimEndpoint {
    index: usize,
    config: SimConfig,
    shared: Arc<Shared>,
}

impl SimEndpoint {
    /// Frames currently queued for this endpoint.
    pub fn pending_count(&self) -> usize {
        self.shared.medium.lock().inboxes[self.index].queue.len()
    }

    /// Compute delay for one delivery.
    ///
    /// Delay = base_latency ± jitter
    fn compute_delay(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.base_latency.as_micros() as i64;
        let jitter = self.config.jitter.as_micros() as i64;

        if jitter == 0 {
            return self.config.base_latency;
        }

        let offset = rng.gen_range(-jitter..=jitter);
        Duration::from_micros((base + offset).max(0) as u64)
    }

    fn measure(&self, rng: &mut ChaCha8Rng) -> LinkStats {
        LinkStats {
            rssi: self.config.rssi + rng.gen_range(-1.0f32..=1.0),
            evm: self.config.evm + rng.gen_range(-1.0f32..=1.0),
        }
    }
}

impl PacketTransport for SimEndpoint {
    fn start(&mut self) -> Result<(), TransportError> {
        let mut medium = self.shared.medium.lock();
        if medium.closed {
            return Err(TransportError::ChannelClosed);
        }
        medium.inboxes[self.index].listening = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        let mut medium = self.shared.medium.lock();
        let inbox = &mut medium.inboxes[self.index];
        inbox.listening = false;
        inbox.queue.clear();
        Ok(())
    }

    fn send(
        &mut self,
        header: &HeaderBytes,
        payload: &[u8],
        tx: &TxConfig,
    ) -> Result<(), TransportError> {
        let mut guard = self.shared.medium.lock();
        let medium = &mut *guard;
        if medium.closed {
            return Err(TransportError::ChannelClosed);
        }
        if !medium.inboxes[self.index].listening {
            return Err(TransportError::NotStarted);
        }

        trace!("station {} tx {} bytes ({})", self.index, payload.len(), tx);
        medium.stats.frames_sent += 1;
        let now = Instant::now();

        for receiver in 0..medium.inboxes.len() {
            if !medium.inboxes[receiver].listening {
                continue;
            }

            let mut frame = ReceivedFrame::intact(*header, payload.to_vec());
            let delay = if receiver == self.index {
                if !self.config.self_observation {
                    continue;
                }
                self.config.base_latency
            } else {
                if self.config.loss_rate > 0.0 && medium.rng.gen::<f64>() < self.config.loss_rate {
                    medium.stats.frames_dropped += 1;
                    continue;
                }
                if medium.rng.gen::<f64>() < self.config.header_error_rate {
                    frame.header_valid = false;
                    let bit = medium.rng.gen_range(0..frame.header.len() * 8);
                    frame.header[bit / 8] ^= 1 << (bit % 8);
                    medium.stats.header_corrupted += 1;
                } else if medium.rng.gen::<f64>() < self.config.payload_error_rate {
                    frame.payload_valid = false;
                    medium.stats.payload_corrupted += 1;
                }
                self.compute_delay(&mut medium.rng)
            };
            frame.link_stats = self.measure(&mut medium.rng);

            let seq = medium.next_seq;
            medium.next_seq += 1;
            medium.inboxes[receiver].queue.push(ScheduledFrame {
                frame,
                delivery_time: now + delay,
                seq,
            });
        }

        drop(guard);
        self.shared.arrival.notify_all();
        Ok(())
    }

    fn receive(&mut self, quantum: Duration) -> Result<Option<ReceivedFrame>, TransportError> {
        let deadline = Instant::now() + quantum;
        let mut medium = self.shared.medium.lock();

        loop {
            if medium.closed {
                return Err(TransportError::ChannelClosed);
            }
            if !medium.inboxes[self.index].listening {
                return Err(TransportError::NotStarted);
            }

            let now = Instant::now();
            let next_due = medium.inboxes[self.index]
                .queue
                .peek()
                .map(|scheduled| scheduled.delivery_time);

            if let Some(due) = next_due {
                if now >= due {
                    let scheduled = medium.inboxes[self.index].queue.pop();
                    if let Some(scheduled) = scheduled {
                        medium.stats.frames_delivered += 1;
                        return Ok(Some(scheduled.frame));
                    }
                }
            }

            if now >= deadline {
                return Ok(None);
            }

            let wake = next_due.map_or(deadline, |due| due.min(deadline));
            self.shared
                .arrival
                .wait_for(&mut medium, wake.saturating_duration_since(now));
        }
    }
}
