use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};
use crate::task::{HostLoop, RenderTask};

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// `None` uses the host's logical CPU count.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl SchedulerConfig {
    #[must_use]
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = Some(worker_threads);
        self
    }

    pub fn validate(self) -> GraphResult<()> {
        if self.worker_threads == Some(0) {
            return Err(GraphError::InvalidConfig(
                "worker_threads must be > 0".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn resolved_worker_threads(self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// How a scheduled task gets executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStrategy {
    /// Worker threads; completion order is unspecified.
    ThreadPool,
    /// Newest-first queue drained on the host loop.
    #[default]
    Deferred,
}

struct Queued(RenderTask);

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.0.sequence() == other.0.sequence()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.sequence().cmp(&other.0.sequence())
    }
}

#[derive(Default)]
struct DeferredQueue {
    tasks: BinaryHeap<Queued>,
    drain_pending: bool,
}

/// Hands render tasks to a worker pool or to a deferred newest-first queue.
///
/// Built once by the owner of the graph and shared by handle with every
/// task producer.
pub struct Scheduler {
    pool: ThreadPool,
    worker_threads: usize,
    host: Arc<dyn HostLoop>,
    queue: Arc<Mutex<DeferredQueue>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("worker_threads", &self.worker_threads)
            .field("queued", &self.queued())
            .finish()
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, host: Arc<dyn HostLoop>) -> GraphResult<Self> {
        config.validate()?;
        let worker_threads = config.resolved_worker_threads();
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|index| format!("stripchart-render-{index}"))
            .build()
            .map_err(|err| GraphError::SchedulerUnavailable(err.to_string()))?;
        debug!(worker_threads, "scheduler started");
        Ok(Self {
            pool,
            worker_threads,
            host,
            queue: Arc::new(Mutex::new(DeferredQueue::default())),
        })
    }

    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    #[must_use]
    pub fn host(&self) -> &Arc<dyn HostLoop> {
        &self.host
    }

    /// Tasks waiting in the deferred queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.lock().tasks.len()
    }

    pub fn schedule(&self, task: RenderTask, strategy: ScheduleStrategy) {
        trace!(sequence = task.sequence(), ?strategy, "schedule task");
        match strategy {
            ScheduleStrategy::ThreadPool => {
                self.pool.spawn(move || {
                    task.run();
                });
            }
            ScheduleStrategy::Deferred => {
                let needs_drain = {
                    let mut queue = self.queue.lock();
                    queue.tasks.push(Queued(task));
                    !std::mem::replace(&mut queue.drain_pending, true)
                };
                if needs_drain {
                    request_drain(Arc::clone(&self.host), Arc::clone(&self.queue));
                }
            }
        }
    }
}

fn request_drain(host: Arc<dyn HostLoop>, queue: Arc<Mutex<DeferredQueue>>) {
    let next_host = Arc::clone(&host);
    host.defer(
        Duration::ZERO,
        Box::new(move || drain(next_host, queue)),
    );
}

// Runs the tasks queued at entry, newest first. Reschedules itself only when
// more tasks arrived meanwhile, so at most one drain is ever in flight.
fn drain(host: Arc<dyn HostLoop>, queue: Arc<Mutex<DeferredQueue>>) {
    let batch = {
        let mut queue = queue.lock();
        let mut batch = Vec::with_capacity(queue.tasks.len());
        while let Some(Queued(task)) = queue.tasks.pop() {
            batch.push(task);
        }
        batch
    };
    trace!(tasks = batch.len(), "drain deferred queue");
    for task in batch {
        task.run();
    }

    let reschedule = {
        let mut queue = queue.lock();
        queue.drain_pending = !queue.tasks.is_empty();
        queue.drain_pending
    };
    if reschedule {
        request_drain(host, queue);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{ScheduleStrategy, Scheduler, SchedulerConfig};
    use crate::core::ManualClock;
    use crate::task::{IdleLoop, RenderRequest, RenderTask};

    fn recording_task(log: &Arc<Mutex<Vec<u64>>>) -> RenderTask {
        let log = Arc::clone(log);
        RenderTask::builder(RenderRequest::new(0.0, 1.0, 1.0, 1.0).expect("request"))
            .with_render(move |task| {
                log.lock().push(task.sequence());
                Ok(())
            })
            .build()
            .expect("task")
    }

    #[test]
    fn deferred_queue_runs_newest_first_in_one_drain() {
        let idle = Arc::new(IdleLoop::new(Arc::new(ManualClock::new(0.0))));
        let scheduler =
            Scheduler::new(SchedulerConfig::default().with_worker_threads(1), idle.clone())
                .expect("scheduler");
        let log = Arc::new(Mutex::new(Vec::new()));
        let tasks = (0..3).map(|_| recording_task(&log)).collect::<Vec<_>>();
        for task in &tasks {
            scheduler.schedule(task.clone(), ScheduleStrategy::Deferred);
        }

        assert_eq!(idle.len(), 1);
        assert_eq!(idle.run_until_idle(), 1);
        let expected = tasks.iter().rev().map(RenderTask::sequence).collect::<Vec<_>>();
        assert_eq!(*log.lock(), expected);
        assert_eq!(scheduler.queued(), 0);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let idle = Arc::new(IdleLoop::new(Arc::new(ManualClock::new(0.0))));
        let config = SchedulerConfig::default().with_worker_threads(0);
        assert!(Scheduler::new(config, idle).is_err());
    }
}
