//! Fixed pool of geometry workers fed from a priority queue.
//!
//! Every worker owns an inbound channel; all workers share one result
//! channel back to the main thread. Scheduling state (available/busy sets,
//! active count, queued tasks, completion tags) lives on the main thread
//! and is only touched by [`WorkerPool::enqueue`] and [`WorkerPool::poll`].
//! Tags never cross to the workers.

use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use geoid_terrain::{GenerationPayload, GeometryError, PatchGeometry, generate_patch_geometry};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, trace, warn};

use crate::PriorityTaskQueue;

/// Signature of the function the workers run.
pub type GeneratorFn = fn(&GenerationPayload) -> Result<PatchGeometry, GeometryError>;

/// Pool sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Worker threads; `0` means one per hardware thread. Clamped to the
    /// hardware concurrency.
    pub worker_count: usize,
    /// Upper bound on tasks dispatched at once.
    pub max_concurrent_tasks: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_concurrent_tasks: 8,
        }
    }
}

/// Number of workers a pool built from `requested` will spawn.
#[must_use]
pub fn resolve_worker_count(requested: usize) -> usize {
    let hardware = num_cpus::get().max(1);
    if requested == 0 {
        hardware
    } else {
        requested.min(hardware)
    }
}

/// A unit of work: geometry to build and how urgently.
#[derive(Clone, Debug)]
pub struct GenerationTask<T> {
    /// Input to the geometry function.
    pub payload: GenerationPayload,
    /// Distance to the camera; lower is served first.
    pub priority: f64,
    /// Returned with the result.
    pub tag: T,
}

/// Outcome reported by [`WorkerPool::poll`].
#[derive(Debug)]
pub enum PoolEvent<T> {
    /// The task finished and produced geometry.
    Completed {
        /// Tag of the finished task.
        tag: T,
        /// Generated arrays.
        geometry: PatchGeometry,
    },
    /// The task failed and was dropped.
    Failed {
        /// Tag of the failed task.
        tag: T,
        /// Why it failed.
        error: TaskError,
    },
}

/// Why a task produced no geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// The geometry function rejected the payload.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// The geometry function panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
    /// The worker thread is gone.
    #[error("worker {0} is not accepting work")]
    Disconnected(usize),
}

/// Failure to build a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A pool that may never run a task is useless.
    #[error("max_concurrent_tasks must be at least 1")]
    ZeroConcurrency,
}

struct Job {
    task: u64,
    payload: GenerationPayload,
}

struct JobResult {
    worker: usize,
    task: u64,
    outcome: Result<PatchGeometry, TaskError>,
}

struct Queued<T> {
    payload: GenerationPayload,
    tag: T,
}

struct Worker {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

/// Worker threads plus the main-thread scheduler in front of them.
pub struct WorkerPool<T> {
    workers: Vec<Worker>,
    available: Vec<usize>,
    busy: FxHashSet<usize>,
    queue: PriorityTaskQueue<Queued<T>>,
    in_flight: FxHashMap<u64, T>,
    results: Receiver<JobResult>,
    undelivered: Vec<PoolEvent<T>>,
    active: usize,
    peak_active: usize,
    max_concurrent: usize,
    next_task: u64,
}

impl<T> WorkerPool<T> {
    /// Spawn a pool running [`generate_patch_geometry`].
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        Self::with_generator(config, generate_patch_geometry)
    }

    /// Spawn a pool running `generate` on every task.
    pub fn with_generator(config: WorkerPoolConfig, generate: GeneratorFn) -> Result<Self, PoolError> {
        if config.max_concurrent_tasks == 0 {
            return Err(PoolError::ZeroConcurrency);
        }
        let count = resolve_worker_count(config.worker_count);
        let (result_tx, result_rx) = unbounded();

        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let (job_tx, job_rx) = unbounded::<Job>();
            let results = result_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("patch-gen-{id}"))
                .spawn(move || worker_loop(id, &job_rx, &results, generate))?;
            workers.push(Worker {
                sender: Some(job_tx),
                handle: Some(handle),
            });
        }

        debug!(
            workers = count,
            max_concurrent = config.max_concurrent_tasks,
            "worker pool started"
        );

        Ok(Self {
            workers,
            available: (0..count).rev().collect(),
            busy: FxHashSet::default(),
            queue: PriorityTaskQueue::new(),
            in_flight: FxHashMap::default(),
            results: result_rx,
            undelivered: Vec::new(),
            active: 0,
            peak_active: 0,
            max_concurrent: config.max_concurrent_tasks,
            next_task: 0,
        })
    }

    /// Queue a task and dispatch whatever the concurrency cap allows.
    pub fn enqueue(&mut self, task: GenerationTask<T>) {
        self.queue.push(
            task.priority,
            Queued {
                payload: task.payload,
                tag: task.tag,
            },
        );
        self.dispatch();
    }

    /// Collect finished tasks. Call once per frame on the main thread.
    ///
    /// Each result frees its worker and immediately lets the next queued
    /// task start.
    pub fn poll(&mut self) -> Vec<PoolEvent<T>> {
        let mut events = std::mem::take(&mut self.undelivered);
        while let Ok(result) = self.results.try_recv() {
            if self.busy.remove(&result.worker) {
                self.available.push(result.worker);
            }
            self.active = self.active.saturating_sub(1);

            match self.in_flight.remove(&result.task) {
                Some(tag) => events.push(match result.outcome {
                    Ok(geometry) => PoolEvent::Completed { tag, geometry },
                    Err(error) => {
                        warn!(worker = result.worker, task = result.task, %error, "generation task failed");
                        PoolEvent::Failed { tag, error }
                    }
                }),
                None => error!(task = result.task, "result for a task that was never dispatched"),
            }

            self.dispatch();
        }
        events
    }

    fn dispatch(&mut self) {
        while self.active < self.max_concurrent && !self.queue.is_empty() {
            let Some(worker) = self.available.pop() else {
                break;
            };
            let Some(Queued { payload, tag }) = self.queue.pop() else {
                self.available.push(worker);
                break;
            };

            let task = self.next_task;
            self.next_task += 1;
            let sent = self.workers[worker]
                .sender
                .as_ref()
                .is_some_and(|s| s.send(Job { task, payload }).is_ok());

            if sent {
                self.busy.insert(worker);
                self.in_flight.insert(task, tag);
                self.active += 1;
                self.peak_active = self.peak_active.max(self.active);
            } else {
                // The worker thread is gone; retire it.
                error!(worker, "worker channel closed");
                self.workers[worker].sender = None;
                self.undelivered.push(PoolEvent::Failed {
                    tag,
                    error: TaskError::Disconnected(worker),
                });
            }
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Tasks currently running on a worker.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.active
    }

    /// Highest `active_tasks` value observed.
    #[must_use]
    pub fn peak_active_tasks(&self) -> usize {
        self.peak_active
    }

    /// Concurrency cap.
    #[must_use]
    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent
    }

    /// Tasks waiting for a worker.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.queue.len()
    }

    /// Workers waiting for a task.
    #[must_use]
    pub fn available_workers(&self) -> usize {
        self.available.len()
    }

    /// Workers running a task.
    #[must_use]
    pub fn busy_workers(&self) -> usize {
        self.busy.len()
    }

    /// Whether nothing is queued, running or waiting to be reported.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active == 0 && self.undelivered.is_empty()
    }

    /// Tags of every queued or running task.
    pub fn pending_tags(&self) -> impl Iterator<Item = &T> {
        self.queue.iter().map(|q| &q.tag).chain(self.in_flight.values())
    }

    /// Close every worker channel and join the threads.
    pub fn shutdown(&mut self) {
        for worker in &mut self.workers {
            worker.sender.take();
        }
        for (id, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.handle.take()
                && handle.join().is_err()
            {
                error!(worker = id, "worker thread panicked outside a task");
            }
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, jobs: &Receiver<Job>, results: &Sender<JobResult>, generate: GeneratorFn) {
    while let Ok(job) = jobs.recv() {
        let start = Instant::now();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| generate(&job.payload))) {
            Ok(Ok(geometry)) => Ok(geometry),
            Ok(Err(err)) => Err(TaskError::Geometry(err)),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };
        trace!(
            worker = id,
            task = job.task,
            elapsed_us = start.elapsed().as_micros() as u64,
            "task finished"
        );
        if results
            .send(JobResult {
                worker: id,
                task: job.task,
                outcome,
            })
            .is_err()
        {
            break;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoid_cubesphere::{CubeFace, UvBounds};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::time::Duration;

    fn payload(resolution: u32) -> GenerationPayload {
        GenerationPayload {
            bounds: UvBounds::FULL,
            resolution,
            radius: 100.0,
            face: CubeFace::Front,
            level: 0,
            max_level: 4,
            seed: 3,
            displacement: None,
        }
    }

    fn task(tag: u32, priority: f64) -> GenerationTask<u32> {
        GenerationTask {
            payload: payload(4),
            priority,
            tag,
        }
    }

    fn slow_generate(p: &GenerationPayload) -> Result<PatchGeometry, GeometryError> {
        std::thread::sleep(Duration::from_millis(2));
        generate_patch_geometry(p)
    }

    fn panicking_generate(_: &GenerationPayload) -> Result<PatchGeometry, GeometryError> {
        panic!("generator exploded");
    }

    /// Poll until `want` events arrived or five seconds passed.
    fn collect(pool: &mut WorkerPool<u32>, want: usize) -> Vec<PoolEvent<u32>> {
        let start = Instant::now();
        let mut events = Vec::new();
        while events.len() < want && start.elapsed() < Duration::from_secs(5) {
            events.extend(pool.poll());
            std::thread::sleep(Duration::from_millis(1));
        }
        events
    }

    #[test]
    fn test_task_produces_geometry() {
        let mut pool = WorkerPool::new(WorkerPoolConfig {
            worker_count: 2,
            max_concurrent_tasks: 4,
        })
        .unwrap();
        pool.enqueue(task(7, 1.0));
        let events = collect(&mut pool, 1);
        match events.as_slice() {
            [PoolEvent::Completed { tag, geometry }] => {
                assert_eq!(*tag, 7);
                assert_eq!(geometry.vertex_count(), 25);
            }
            other => panic!("expected one completion, got {other:?}"),
        }
        assert!(pool.is_idle());
        assert_eq!(pool.available_workers(), pool.worker_count());
    }

    #[test]
    fn test_worker_count_is_clamped_to_hardware() {
        let pool: WorkerPool<u32> = WorkerPool::new(WorkerPoolConfig {
            worker_count: 10_000,
            max_concurrent_tasks: 1,
        })
        .unwrap();
        assert_eq!(pool.worker_count(), num_cpus::get().max(1));
        assert_eq!(resolve_worker_count(0), num_cpus::get().max(1));
        assert_eq!(resolve_worker_count(1), 1);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result: Result<WorkerPool<u32>, _> = WorkerPool::new(WorkerPoolConfig {
            worker_count: 1,
            max_concurrent_tasks: 0,
        });
        assert!(matches!(result, Err(PoolError::ZeroConcurrency)));
    }

    #[test]
    fn test_nearest_task_is_served_first() {
        // One worker, one slot: everything queued behind the first task runs
        // strictly in priority order.
        let mut pool = WorkerPool::with_generator(
            WorkerPoolConfig {
                worker_count: 1,
                max_concurrent_tasks: 1,
            },
            slow_generate,
        )
        .unwrap();
        pool.enqueue(task(0, 0.0));
        pool.enqueue(task(3, 300.0));
        pool.enqueue(task(1, 100.0));
        pool.enqueue(task(2, 200.0));
        assert_eq!(pool.queued_tasks(), 3);

        let order: Vec<u32> = collect(&mut pool, 4)
            .into_iter()
            .map(|e| match e {
                PoolEvent::Completed { tag, .. } => tag,
                PoolEvent::Failed { tag, error } => panic!("task {tag} failed: {error}"),
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_active_count_never_exceeds_cap_under_bursts() {
        let mut pool = WorkerPool::with_generator(
            WorkerPoolConfig {
                worker_count: 0,
                max_concurrent_tasks: 2,
            },
            slow_generate,
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut sent = 0;
        let mut received = 0;
        let start = Instant::now();

        for _burst in 0..6 {
            for _ in 0..rng.random_range(5..20) {
                pool.enqueue(task(sent, rng.random_range(0.0..1000.0)));
                sent += 1;
                assert!(pool.active_tasks() <= 2);
            }
            received += pool.poll().len();
            assert!(pool.active_tasks() <= 2);
            assert_eq!(pool.available_workers() + pool.busy_workers(), pool.worker_count());
        }
        while received < sent as usize && start.elapsed() < Duration::from_secs(10) {
            received += pool.poll().len();
            assert!(pool.active_tasks() <= 2, "active count exceeded cap");
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(received, sent as usize);
        assert!(pool.peak_active_tasks() <= 2);
        assert!(pool.is_idle());
    }

    #[test]
    fn test_geometry_error_is_reported_and_worker_freed() {
        let mut pool = WorkerPool::new(WorkerPoolConfig {
            worker_count: 1,
            max_concurrent_tasks: 1,
        })
        .unwrap();
        pool.enqueue(GenerationTask {
            payload: payload(0),
            priority: 0.0,
            tag: 1,
        });
        pool.enqueue(task(2, 1.0));

        let events = collect(&mut pool, 2);
        assert!(matches!(
            &events[0],
            PoolEvent::Failed { tag: 1, error: TaskError::Geometry(GeometryError::ZeroResolution) }
        ));
        assert!(matches!(&events[1], PoolEvent::Completed { tag: 2, .. }));
        assert_eq!(pool.active_tasks(), 0);
    }

    #[test]
    fn test_panicking_generator_becomes_failure() {
        let mut pool = WorkerPool::with_generator(
            WorkerPoolConfig {
                worker_count: 1,
                max_concurrent_tasks: 1,
            },
            panicking_generate,
        )
        .unwrap();
        pool.enqueue(task(5, 0.0));
        pool.enqueue(task(6, 0.0));
        let events = collect(&mut pool, 2);
        assert_eq!(events.len(), 2, "worker must survive a panic");
        for event in &events {
            match event {
                PoolEvent::Failed { error: TaskError::Panicked(msg), .. } => {
                    assert!(msg.contains("generator exploded"));
                }
                other => panic!("expected panic failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_pending_tags_cover_queue_and_in_flight() {
        let mut pool = WorkerPool::with_generator(
            WorkerPoolConfig {
                worker_count: 1,
                max_concurrent_tasks: 1,
            },
            slow_generate,
        )
        .unwrap();
        for tag in 0..4 {
            pool.enqueue(task(tag, tag as f64));
        }
        let mut tags: Vec<u32> = pool.pending_tags().copied().collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![0, 1, 2, 3]);
        collect(&mut pool, 4);
        assert_eq!(pool.pending_tags().count(), 0);
    }

    #[test]
    fn test_drop_joins_workers() {
        let mut pool = WorkerPool::with_generator(
            WorkerPoolConfig {
                worker_count: 2,
                max_concurrent_tasks: 2,
            },
            slow_generate,
        )
        .unwrap();
        pool.enqueue(task(0, 0.0));
        drop(pool);
    }
}
