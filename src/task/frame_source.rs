use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::task::HostLoop;

type FrameCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Periodic tick driven by a [`HostLoop`].
///
/// Each tick re-defers the next one, so the source keeps running until
/// [`FrameSource::stop`] is called or the source is dropped.
#[derive(Debug)]
pub struct FrameSource {
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    interval: Duration,
}

impl FrameSource {
    pub fn start<F>(host: Arc<dyn HostLoop>, frames_per_second: u32, on_frame: F) -> GraphResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if frames_per_second == 0 {
            return Err(GraphError::InvalidConfig(
                "frames_per_second must be > 0".to_owned(),
            ));
        }
        let interval = Duration::from_secs_f64(1.0 / f64::from(frames_per_second));
        let source = Self {
            running: Arc::new(AtomicBool::new(true)),
            frames: Arc::new(AtomicU64::new(0)),
            interval,
        };
        schedule_tick(
            host,
            interval,
            Arc::clone(&source.running),
            Arc::clone(&source.frames),
            Arc::new(on_frame),
        );
        debug!(frames_per_second, "frame source started");
        Ok(source)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ticks delivered so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    /// Stops further ticks. A tick already queued on the host becomes a no-op.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!(frames = self.frames(), "frame source stopped");
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn schedule_tick(
    host: Arc<dyn HostLoop>,
    interval: Duration,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    on_frame: FrameCallback,
) {
    let next_host = Arc::clone(&host);
    host.defer(
        interval,
        Box::new(move || {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            frames.fetch_add(1, Ordering::SeqCst);
            on_frame();
            schedule_tick(next_host, interval, running, frames, on_frame);
        }),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::FrameSource;
    use crate::core::ManualClock;
    use crate::task::IdleLoop;

    #[test]
    fn ticks_once_per_interval_until_stopped() {
        let clock = Arc::new(ManualClock::new(0.0));
        let idle = Arc::new(IdleLoop::new(clock.clone()));
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let source = FrameSource::start(idle.clone(), 10, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("frame source");

        for _ in 0..3 {
            clock.advance(0.1);
            idle.run_until_idle();
        }
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        source.stop();
        clock.advance(0.1);
        idle.run_until_idle();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(source.frames(), 3);
        assert!(idle.is_empty());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let idle = Arc::new(IdleLoop::new(Arc::new(ManualClock::new(0.0))));
        assert!(FrameSource::start(idle, 0, || {}).is_err());
    }
}
