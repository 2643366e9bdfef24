// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The burst streaming engine runs one acquisition thread per streaming
//! session. Each period the thread asks the [`BurstSource`] for the next
//! burst of the acquisition plan, pushes it into a bounded FIFO and notifies
//! observers. Readers block on the FIFO with a timeout.
//!
//! Sequence numbers are stamped when a burst is handed to a reader, so a
//! burst dropped by the FIFO never leaves a gap.

use kanal::{ReceiveErrorTimeout, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tokio::{
    sync::oneshot,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    burst::{Burst, BurstFormat},
    common::{monotonic_us, set_thread_priority},
    error::{Error, Result},
    observer::Dispatcher,
};

/// Behaviour of the burst FIFO when the reader falls behind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FifoMode {
    Undefined = 0,
    /// Newly acquired bursts are discarded while the FIFO is full.
    DropNew = 1,
    /// The oldest queued burst is discarded to make room.
    #[default]
    DropOld = 2,
}

impl fmt::Display for FifoMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FifoMode::Undefined => write!(f, "undefined"),
            FifoMode::DropNew => write!(f, "drop-new"),
            FifoMode::DropOld => write!(f, "drop-old"),
        }
    }
}

/// Produces raw sample data. Implemented by hardware backends, the
/// simulated source stands in when no hardware is attached.
pub trait BurstSource: Send {
    /// Fills `data` with one burst laid out as described by `format`.
    fn acquire(&mut self, format: &BurstFormat, data: &mut Vec<u8>) -> Result<()>;
}

/// Deterministic synthetic samples: a ramp per channel offset by a burst
/// counter, masked to the sample width. Samples wider than 64 bits are
/// zero extended.
#[derive(Debug, Default)]
pub struct SimulatedSource {
    bursts: u32,
}

impl SimulatedSource {
    pub fn new() -> SimulatedSource {
        SimulatedSource::default()
    }
}

impl BurstSource for SimulatedSource {
    fn acquire(&mut self, format: &BurstFormat, data: &mut Vec<u8>) -> Result<()> {
        let width = format.bytes_per_sample();
        let used = width.min(8);
        let mask = match format.bits_per_sample {
            64.. => u64::MAX,
            bits => (1u64 << bits) - 1,
        };

        data.clear();
        data.reserve(format.burst_len());
        let samples = format.payload.samples() * format.num_channels as usize;
        for index in 0..samples {
            let value = (index as u64 + self.bursts as u64) & mask;
            match format.is_big_endian {
                true => {
                    data.resize(data.len() + width - used, 0);
                    data.extend_from_slice(&value.to_be_bytes()[8 - used..]);
                }
                false => {
                    data.extend_from_slice(&value.to_le_bytes()[..used]);
                    data.resize(data.len() + width - used, 0);
                }
            }
        }

        self.bursts = self.bursts.wrapping_add(1);
        Ok(())
    }
}

/// One config slot of the acquisition plan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Acquisition {
    pub format: BurstFormat,
    /// Bursts left before the slot leaves the plan, `None` for unlimited.
    pub remaining: Option<u32>,
}

impl Acquisition {
    /// A limit of zero means unlimited.
    pub fn new(format: BurstFormat, limit: Option<u32>) -> Acquisition {
        Acquisition {
            format,
            remaining: limit.filter(|n| *n > 0),
        }
    }
}

impl From<BurstFormat> for Acquisition {
    fn from(format: BurstFormat) -> Acquisition {
        Acquisition::new(format, None)
    }
}

/// Bursts produced in round-robin order of ascending config slot.
type Plan = Arc<Mutex<Vec<Acquisition>>>;

struct Stream {
    fifo: Receiver<Burst>,
    sequence: Arc<AtomicU32>,
    exhausted: Arc<AtomicBool>,
    plan: Plan,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Counters of the current or last streaming session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub acquired: u64,
    pub dropped: u64,
}

pub struct BurstEngine {
    capacity: usize,
    source: Arc<Mutex<dyn BurstSource>>,
    dispatcher: Arc<Dispatcher>,
    stream: Mutex<Option<Stream>>,
    acquired: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl fmt::Debug for BurstEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BurstEngine")
            .field("capacity", &self.capacity)
            .field("streaming", &self.is_streaming())
            .finish()
    }
}

impl BurstEngine {
    pub fn new(
        capacity: usize,
        source: Arc<Mutex<dyn BurstSource>>,
        dispatcher: Arc<Dispatcher>,
    ) -> BurstEngine {
        BurstEngine {
            capacity: capacity.max(1),
            source,
            dispatcher,
            stream: Mutex::new(None),
            acquired: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_streaming(&self) -> bool {
        match self.stream.lock() {
            Ok(stream) => stream.is_some(),
            Err(_) => false,
        }
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Spawns the acquisition thread. Sequence numbers restart at 1.
    pub fn start(&self, plan: Vec<Acquisition>, period: Duration, mode: FifoMode) -> Result<()> {
        if mode == FifoMode::Undefined {
            return Err(Error::InvalidFifoMode);
        }
        if plan.is_empty() {
            return Err(Error::NoActiveSlot);
        }

        let mut stream = self.stream.lock().map_err(|_| Error::Poisoned("stream"))?;
        if stream.is_some() {
            return Err(Error::Streaming);
        }

        let (tx, rx) = kanal::bounded(self.capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let plan = Arc::new(Mutex::new(plan));
        let exhausted = Arc::new(AtomicBool::new(false));
        self.acquired.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);

        let worker = Worker {
            plan: plan.clone(),
            next: 0,
            exhausted: exhausted.clone(),
            mode,
            tx,
            fifo: rx.clone(),
            source: self.source.clone(),
            dispatcher: self.dispatcher.clone(),
            acquired: self.acquired.clone(),
            dropped: self.dropped.clone(),
            data: Vec::new(),
        };

        let thread = thread::Builder::new()
            .name("burst".to_string())
            .spawn(move || {
                set_thread_priority("burst");
                match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(worker.run(period, shutdown_rx)),
                    Err(err) => error!("unable to build acquisition runtime: {}", err),
                }
            })
            .map_err(Error::Spawn)?;

        info!(
            "streaming started: period {:?}, fifo {} of {}",
            period, mode, self.capacity
        );
        *stream = Some(Stream {
            fifo: rx,
            sequence: Arc::new(AtomicU32::new(1)),
            exhausted,
            plan,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        });

        Ok(())
    }

    /// Stops acquisition and wakes blocked readers. Always succeeds, also
    /// when not streaming.
    pub fn stop(&self) -> Result<()> {
        let stream = self
            .stream
            .lock()
            .map_err(|_| Error::Poisoned("stream"))?
            .take();
        let Some(mut stream) = stream else {
            return Ok(());
        };

        if let Some(shutdown) = stream.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = stream.fifo.close();

        if let Some(thread) = stream.thread.take() {
            // An observer may stop the stream from the acquisition thread.
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                error!("acquisition thread panicked");
            }
        }

        let stats = self.stats();
        info!(
            "streaming stopped: {} bursts acquired, {} dropped",
            stats.acquired, stats.dropped
        );
        Ok(())
    }

    /// True once every slot of the plan used up its burst limit and the
    /// FIFO is drained.
    pub fn is_exhausted(&self) -> bool {
        match self.stream.lock() {
            Ok(stream) => stream.as_ref().is_some_and(Stream::is_exhausted),
            Err(_) => false,
        }
    }

    /// True when a burst can be read without blocking.
    pub fn is_ready(&self) -> bool {
        match self.stream.lock() {
            Ok(stream) => stream.as_ref().is_some_and(|s| !s.fifo.is_empty()),
            Err(_) => false,
        }
    }

    /// Blocks up to `timeout` for the next burst.
    #[instrument(skip(self), level = "trace")]
    pub fn read(&self, timeout: Duration) -> Result<Burst> {
        let (fifo, sequence, exhausted) = {
            let stream = self.stream.lock().map_err(|_| Error::Poisoned("stream"))?;
            match stream.as_ref() {
                Some(stream) if stream.is_exhausted() => return Err(Error::BurstLimitReached),
                Some(stream) => (
                    stream.fifo.clone(),
                    stream.sequence.clone(),
                    stream.exhausted.clone(),
                ),
                None => return Err(Error::NotStreaming),
            }
        };

        match fifo.recv_timeout(timeout) {
            Ok(mut burst) => {
                burst.format.sequence_number = sequence.fetch_add(1, Ordering::Relaxed);
                trace!("read {}", burst.format);
                Ok(burst)
            }
            // The last burst may have been taken while this read waited.
            Err(ReceiveErrorTimeout::Timeout) if exhausted.load(Ordering::Acquire) => {
                Err(Error::BurstLimitReached)
            }
            Err(ReceiveErrorTimeout::Timeout) => Err(Error::Timeout),
            Err(_) => Err(Error::NotStreaming),
        }
    }

    /// Adds a slot to the running acquisition plan.
    pub fn admit(&self, entry: Acquisition) -> Result<()> {
        let config_id = entry.format.config_id;
        self.with_plan(|plan, exhausted| {
            plan.retain(|a| a.format.config_id != config_id);
            let index = plan
                .iter()
                .position(|a| a.format.config_id > config_id)
                .unwrap_or(plan.len());
            plan.insert(index, entry);
            exhausted.store(false, Ordering::Release);
        })
    }

    /// Removes a slot from the running acquisition plan.
    pub fn retire(&self, config_id: u8) -> Result<()> {
        self.with_plan(|plan, _| plan.retain(|a| a.format.config_id != config_id))
    }

    fn with_plan<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Acquisition>, &AtomicBool),
    {
        let (plan, exhausted) = match self
            .stream
            .lock()
            .map_err(|_| Error::Poisoned("stream"))?
            .as_ref()
        {
            Some(stream) => (stream.plan.clone(), stream.exhausted.clone()),
            None => return Ok(()),
        };
        let mut plan = plan.lock().map_err(|_| Error::Poisoned("plan"))?;
        f(&mut plan, &exhausted);
        debug!(
            "acquisition plan: {:?}",
            plan.iter().map(|a| a.format.config_id).collect::<Vec<_>>()
        );
        Ok(())
    }
}

impl Stream {
    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire) && self.fifo.is_empty()
    }
}

impl Drop for BurstEngine {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("stopping stream on drop: {}", err);
        }
    }
}

struct Worker {
    plan: Plan,
    next: usize,
    exhausted: Arc<AtomicBool>,
    mode: FifoMode,
    tx: Sender<Burst>,
    fifo: Receiver<Burst>,
    source: Arc<Mutex<dyn BurstSource>>,
    dispatcher: Arc<Dispatcher>,
    acquired: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    data: Vec<u8>,
}

impl Worker {
    async fn run(mut self, period: Duration, mut shutdown: oneshot::Receiver<()>) {
        let mut interval = time::interval(period.max(Duration::from_micros(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => match self.produce() {
                    Ok(true) => self.dispatcher.burst_ready(),
                    Ok(false) => (),
                    Err(Error::NotStreaming) => break,
                    Err(err) => error!("burst acquisition failed: {}", err),
                },
            }
        }
        debug!("acquisition thread exiting");
    }

    /// Acquires the next burst of the plan. Returns whether a burst was
    /// queued.
    #[instrument(skip_all)]
    fn produce(&mut self) -> Result<bool> {
        let (format, last) = {
            let mut plan = self.plan.lock().map_err(|_| Error::Poisoned("plan"))?;
            if plan.is_empty() {
                return Ok(false);
            }
            let index = self.next % plan.len();
            let Acquisition { format, remaining } = plan[index];
            match remaining {
                Some(n) if n <= 1 => {
                    plan.remove(index);
                    self.next = index;
                    debug!("config slot {} reached its burst limit", format.config_id);
                }
                Some(n) => {
                    plan[index].remaining = Some(n - 1);
                    self.next = index + 1;
                }
                None => self.next = index + 1,
            }
            (format, plan.is_empty())
        };

        let timestamp_us = monotonic_us();
        // A source that panicked in an earlier session must not stall this one.
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .acquire(&format, &mut self.data)?;
        self.acquired.fetch_add(1, Ordering::Relaxed);

        let burst = Burst {
            format,
            timestamp_us,
            data: self.data.clone(),
        };
        let queued = self.push(burst)?;
        if last {
            self.exhausted.store(true, Ordering::Release);
            info!("burst limit reached, acquisition idle");
        }
        Ok(queued)
    }

    fn push(&mut self, burst: Burst) -> Result<bool> {
        if self.mode == FifoMode::DropOld {
            while self.tx.is_full() {
                match self.fifo.try_recv() {
                    Ok(Some(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("fifo full, dropped oldest burst");
                    }
                    Ok(None) => break,
                    Err(_) => return Err(Error::NotStreaming),
                }
            }
        }

        match self.tx.try_send(burst) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("fifo full, dropped new burst");
                Ok(false)
            }
            Err(_) => Err(Error::NotStreaming),
        }
    }
}
