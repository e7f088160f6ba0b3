//! Frame-batched DOM access.
//!
//! Geometry reads and DOM writes are queued and flushed once per frame: every
//! read queued for a frame runs before every write queued for it, so no read
//! observes a half-applied batch of writes and the layout engine reflows at
//! most once per frame. Work scheduled while a frame is being flushed lands in
//! the next frame.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{trace, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProberError {
    #[error("Scheduled task was dropped before producing a value")]
    TaskDropped,
    #[error("No async runtime available to drive frames")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ProberError>;

/// What drives frame flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameSource {
    /// Flush as soon as the scheduling task yields.
    #[default]
    Microtask,
    /// Flush one interval after the first task of a frame is queued.
    Interval(Duration),
    /// Flushes only happen through [`LayoutProber::flush_frame`].
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub reads: usize,
    pub writes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProberStats {
    pub frames: u64,
    pub reads: u64,
    pub writes: u64,
    pub panicked: u64,
}

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queues {
    reads: VecDeque<Task>,
    writes: VecDeque<Task>,
    frame_requested: bool,
}

struct ProberInner {
    source: FrameSource,
    queues: Mutex<Queues>,
    stats: Mutex<ProberStats>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Read,
    Write,
}

/// Cloneable handle to a shared read/write scheduler.
#[derive(Clone)]
pub struct LayoutProber {
    inner: Arc<ProberInner>,
}

impl LayoutProber {
    pub fn new(source: FrameSource) -> Self {
        Self {
            inner: Arc::new(ProberInner {
                source,
                queues: Mutex::new(Queues::default()),
                stats: Mutex::new(ProberStats::default()),
            }),
        }
    }

    pub fn source(&self) -> FrameSource {
        self.inner.source
    }

    /// Queues a geometry read. The task is queued immediately; the returned
    /// future resolves once the frame containing it has flushed.
    pub fn measure<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let scheduled = self.inner.schedule(Phase::Read, f);
        async move { scheduled?.await.map_err(|_| ProberError::TaskDropped) }
    }

    /// Queues a DOM write, resolved after the frame's reads have run.
    pub fn mutate<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let scheduled = self.inner.schedule(Phase::Write, f);
        async move { scheduled?.await.map_err(|_| ProberError::TaskDropped) }
    }

    pub fn flush_frame(&self) -> FrameStats {
        self.inner.flush_frame()
    }

    pub fn pending(&self) -> FrameStats {
        let queues = self.inner.queues.lock();
        FrameStats {
            reads: queues.reads.len(),
            writes: queues.writes.len(),
        }
    }

    pub fn stats(&self) -> ProberStats {
        *self.inner.stats.lock()
    }
}

impl Default for LayoutProber {
    fn default() -> Self {
        Self::new(FrameSource::default())
    }
}

impl std::fmt::Debug for LayoutProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutProber")
            .field("source", &self.inner.source)
            .field("pending", &self.pending())
            .finish()
    }
}

impl ProberInner {
    fn schedule<T, F>(self: &Arc<Self>, phase: Phase, f: F) -> Result<oneshot::Receiver<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let runtime = match self.source {
            FrameSource::Manual => None,
            FrameSource::Microtask | FrameSource::Interval(_) => {
                Some(Handle::try_current().map_err(|_| ProberError::NoRuntime)?)
            }
        };

        let (tx, rx) = oneshot::channel();
        let task: Task = Box::new(move || {
            let _ = tx.send(f());
        });

        let request = {
            let mut queues = self.queues.lock();
            match phase {
                Phase::Read => queues.reads.push_back(task),
                Phase::Write => queues.writes.push_back(task),
            }
            let request = !queues.frame_requested;
            queues.frame_requested = true;
            request
        };

        if let (true, Some(handle)) = (request, runtime) {
            let inner = Arc::clone(self);
            let source = self.source;
            handle.spawn(async move {
                match source {
                    FrameSource::Interval(period) => tokio::time::sleep(period).await,
                    _ => tokio::task::yield_now().await,
                }
                inner.flush_frame();
            });
        }

        Ok(rx)
    }

    fn flush_frame(&self) -> FrameStats {
        let (reads, writes) = {
            let mut queues = self.queues.lock();
            queues.frame_requested = false;
            (
                std::mem::take(&mut queues.reads),
                std::mem::take(&mut queues.writes),
            )
        };

        let frame = FrameStats {
            reads: reads.len(),
            writes: writes.len(),
        };
        let mut panicked: u64 = 0;
        for task in reads.into_iter().chain(writes) {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            warn!(panicked, "scheduled DOM task panicked");
        }

        let mut stats = self.stats.lock();
        stats.frames += 1;
        stats.reads += frame.reads as u64;
        stats.writes += frame.writes as u64;
        stats.panicked += panicked;
        trace!(reads = frame.reads, writes = frame.writes, "frame flushed");
        frame
    }
}
