//! Thread-pool velocity-Verlet
//!
//! A rayon pool of exactly `workers` threads lives as long as the integrator.
//! Each tick is one `broadcast`: every pool thread takes its partition range,
//! runs the position phase against the frozen pre-step records, meets its
//! peers at a barrier and then runs the velocity phase against the shared
//! buffer. The broadcast returns once every thread has finished the tick.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Barrier;

use glam::DVec2;
use particle_physics::{GravityModel, ParticleRecord, ParticleView, SystemState, RECORD_STRIDE};
use rayon::{BroadcastContext, ThreadPool, ThreadPoolBuilder};

use crate::error::SimError;
use crate::integrator::Integrator;
use crate::partition::partition_range;
use crate::verlet;

/// Record buffer written concurrently by the workers
///
/// Each `f64` is stored as its bit pattern in an `AtomicU64`. Workers only
/// write inside their own range; visibility across ranges comes from the
/// phase barrier and the end of the broadcast, so relaxed ordering is enough.
pub struct SharedRecords {
    cells: Box<[AtomicU64]>,
}

impl SharedRecords {
    pub fn from_records(records: &[ParticleRecord]) -> Self {
        let flat: &[f64] = bytemuck::cast_slice(records);
        Self {
            cells: flat.iter().map(|v| AtomicU64::new(v.to_bits())).collect(),
        }
    }

    #[inline]
    pub fn store(&self, index: usize, record: &ParticleRecord) {
        let values: &[f64] = bytemuck::cast_slice(std::slice::from_ref(record));
        let base = index * RECORD_STRIDE;
        for (cell, value) in self.cells[base..base + RECORD_STRIDE].iter().zip(values) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn copy_into(&self, records: &mut [ParticleRecord]) {
        for (i, record) in records.iter_mut().enumerate() {
            *record = self.record(i);
        }
    }
}

impl ParticleView for SharedRecords {
    #[inline]
    fn len(&self) -> usize {
        self.cells.len() / RECORD_STRIDE
    }

    #[inline]
    fn record(&self, index: usize) -> ParticleRecord {
        let base = index * RECORD_STRIDE;
        let mut values = [0.0f64; RECORD_STRIDE];
        for (value, cell) in values.iter_mut().zip(&self.cells[base..base + RECORD_STRIDE]) {
            *value = f64::from_bits(cell.load(Ordering::Relaxed));
        }
        bytemuck::cast(values)
    }
}

/// Everything one tick shares between the pool threads
struct TickFrame {
    previous: Vec<ParticleRecord>,
    shared: SharedRecords,
    dt: f64,
    failed: AtomicBool,
}

/// Velocity-Verlet split over a persistent rayon pool
pub struct ThreadedVerlet {
    model: GravityModel,
    pool: ThreadPool,
    phase_barrier: Barrier,
}

impl ThreadedVerlet {
    pub fn new(model: GravityModel, workers: usize) -> Result<Self, SimError> {
        if workers == 0 {
            return Err(SimError::NoWorkers);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|worker| format!("verlet-worker-{worker}"))
            .build()?;

        log::debug!("started {workers} verlet worker threads");
        Ok(Self {
            model,
            pool,
            phase_barrier: Barrier::new(workers),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// One pool thread's share of a tick. Every thread reaches the phase
    /// barrier exactly once, whatever happens in its position phase.
    fn tick(&self, frame: &TickFrame, ctx: BroadcastContext<'_>) -> Option<SimError> {
        let worker = ctx.index();
        let range = partition_range(frame.shared.len(), ctx.num_threads(), worker);
        let mut accelerations: Vec<DVec2> = Vec::with_capacity(range.len());

        let position = guarded(worker, || {
            let updated = verlet::position_phase(
                &self.model,
                &frame.previous[..],
                range.clone(),
                frame.dt,
                &mut accelerations,
            )?;
            store(&frame.shared, range.clone(), &updated);
            Ok(())
        });
        if position.is_some() {
            frame.failed.store(true, Ordering::Relaxed);
        }

        self.phase_barrier.wait();

        if position.is_some() || frame.failed.load(Ordering::Relaxed) {
            return position;
        }
        guarded(worker, || {
            let updated = verlet::velocity_phase(
                &self.model,
                &frame.shared,
                range.clone(),
                frame.dt,
                &accelerations,
            )?;
            store(&frame.shared, range.clone(), &updated);
            Ok(())
        })
    }
}

fn store(shared: &SharedRecords, range: Range<usize>, updated: &[ParticleRecord]) {
    for (i, record) in range.zip(updated) {
        shared.store(i, record);
    }
}

/// Run `f`, turning an error or a panic into the returned failure
fn guarded<F>(worker: usize, f: F) -> Option<SimError>
where
    F: FnOnce() -> Result<(), SimError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panicked".to_string());
            log::error!("verlet worker {worker} panicked: {reason}");
            Some(SimError::WorkerFailed { worker, reason })
        }
    }
}

impl Integrator for ThreadedVerlet {
    fn name(&self) -> &str {
        "verlet-threaded"
    }

    fn integrate(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError> {
        let frame = TickFrame {
            previous: state.records().to_vec(),
            shared: SharedRecords::from_records(state.records()),
            dt,
            failed: AtomicBool::new(false),
        };

        // Failures come back in worker order, so the reported one is stable
        let failures = self.pool.broadcast(|ctx| self.tick(&frame, ctx));
        if let Some(error) = failures.into_iter().flatten().next() {
            return Err(error);
        }

        frame.shared.copy_into(state.records_mut());
        Ok(())
    }
}
