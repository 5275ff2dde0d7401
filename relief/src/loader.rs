//! Background tile rendering.
//!
//! A [`TileLoader`] owns one worker thread that drains a stack of pending
//! [`RenderRequest`]s: it resolves each request's grid through the
//! [`TileIndex`], renders it with the [`TileRenderer`] and hands the finished
//! raster to a [`TileSink`].
//!
//! Submitting a new batch replaces everything still pending, so a map view
//! that pans quickly only ever renders what it shows now.
//!
//! ```ignore
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let loader = TileLoader::spawn(index, renderer, tx, LoaderConfig::default())?;
//!
//! loader.submit(visible_tiles.iter().map(|t| RenderRequest::for_tile(*t, 256)));
//! for rendered in rx.iter() {
//!     display(rendered.tile, rendered.image);
//! }
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};

use crate::error::{ReliefError, Result};
use crate::index::TileIndex;
use crate::render::{RasterImage, TileRenderer};
use crate::tiles::{RenderRequest, TileId};

/// Default time the worker sleeps between checks when nothing is pending.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(500);

/// A finished tile.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub tile: TileId,
    pub request: RenderRequest,
    pub image: RasterImage,
}

/// Receives finished tiles from the worker thread.
pub trait TileSink: Send + Sync + 'static {
    fn deliver(&self, tile: RenderedTile);
}

impl TileSink for Sender<RenderedTile> {
    fn deliver(&self, tile: RenderedTile) {
        if self.send(tile).is_err() {
            tracing::debug!("Tile receiver dropped, discarding rendered tile");
        }
    }
}

/// Adapts a closure into a [`TileSink`].
pub struct CallbackSink<F>(pub F);

impl<F> TileSink for CallbackSink<F>
where
    F: Fn(RenderedTile) + Send + Sync + 'static,
{
    fn deliver(&self, tile: RenderedTile) {
        (self.0)(tile)
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Upper bound on how long an idle worker sleeps before re-checking the
    /// queue. Submissions wake it immediately.
    pub idle_interval: Duration,
    /// Name of the worker thread.
    pub thread_name: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            thread_name: "relief-tile-loader".to_string(),
        }
    }
}

/// Counters of what the worker did with the requests it took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoaderStats {
    /// Tiles rendered and handed to the sink.
    pub delivered: u64,
    /// Requests dropped because no grid covers them.
    pub no_data: u64,
    /// Requests abandoned after an error.
    pub failed: u64,
    /// Requests still waiting.
    pub pending: usize,
}

struct Queue {
    /// Stack: the last element is rendered next.
    pending: Vec<RenderRequest>,
    /// The worker is processing a request it already popped.
    busy: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
    idle: Condvar,
    stop: AtomicBool,
    delivered: AtomicU64,
    no_data: AtomicU64,
    failed: AtomicU64,
}

/// Renders submitted tiles on a background thread.
pub struct TileLoader {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TileLoader {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn<S: TileSink>(
        index: Arc<TileIndex>,
        renderer: TileRenderer,
        sink: S,
        config: LoaderConfig,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                pending: Vec::new(),
                busy: false,
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
            stop: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            no_data: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            index,
            renderer,
            sink,
            idle_interval: config.idle_interval,
        };
        let handle = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            worker: Some(handle),
        })
    }

    /// Replace every pending request with `requests`.
    ///
    /// The first request of the batch is rendered first. A request the worker
    /// is already rendering still completes.
    pub fn submit<I>(&self, requests: I)
    where
        I: IntoIterator<Item = RenderRequest>,
    {
        let mut batch: Vec<RenderRequest> = requests.into_iter().collect();
        batch.reverse();

        let mut queue = self.shared.queue.lock();
        let dropped = queue.pending.len();
        queue.pending = batch;
        tracing::trace!(
            submitted = queue.pending.len(),
            dropped,
            "Render requests submitted"
        );
        drop(queue);

        self.shared.wake.notify_one();
    }

    /// Drop every pending request.
    pub fn cancel(&self) {
        self.shared.queue.lock().pending.clear();
    }

    /// Number of requests not yet taken by the worker.
    pub fn pending_len(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            no_data: self.shared.no_data.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            pending: self.pending_len(),
        }
    }

    /// Block until nothing is pending or being rendered.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.busy || !queue.pending.is_empty() {
            if self.shared.idle.wait_until(&mut queue, deadline).timed_out() {
                return !queue.busy && queue.pending.is_empty();
            }
        }
        true
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// A request being rendered is finished first; pending ones are dropped.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.wake.notify_all();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Tile loader worker panicked");
            }
        }
    }
}

impl Drop for TileLoader {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

struct Worker<S> {
    shared: Arc<Shared>,
    index: Arc<TileIndex>,
    renderer: TileRenderer,
    sink: S,
    idle_interval: Duration,
}

impl<S: TileSink> Worker<S> {
    fn run(self) {
        tracing::debug!("Tile loader started");
        while let Some(request) = self.next_request() {
            self.process(request);
        }
        tracing::debug!("Tile loader stopped");
    }

    /// Pop the next request, sleeping while there is none.
    /// Returns `None` once the loader is stopping.
    fn next_request(&self) -> Option<RenderRequest> {
        let mut queue = self.shared.queue.lock();
        queue.busy = false;
        loop {
            if self.shared.stop.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(request) = queue.pending.pop() {
                queue.busy = true;
                return Some(request);
            }
            self.shared.idle.notify_all();
            self.shared.wake.wait_for(&mut queue, self.idle_interval);
        }
    }

    fn process(&self, request: RenderRequest) {
        let tile = request.tile;
        match self.render(&request) {
            Ok(Some(image)) => {
                self.sink.deliver(RenderedTile {
                    tile,
                    request,
                    image,
                });
                self.shared.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                tracing::debug!(%tile, "No grid covers tile, skipping");
                self.shared.no_data.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(%tile, error = %e, "Tile rendering failed");
                self.shared.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Load the covering grid and render it. A panic in either step becomes
    /// [`ReliefError::RenderPanicked`] so the worker keeps running.
    fn render(&self, request: &RenderRequest) -> Result<Option<RasterImage>> {
        panic::catch_unwind(AssertUnwindSafe(|| -> Result<Option<RasterImage>> {
            let Some(height_tile) = self.index.get(&request.bounds)? else {
                return Ok(None);
            };
            self.renderer.render(&height_tile, request).map(Some)
        }))
        .map_err(|payload| ReliefError::RenderPanicked(panic_message(payload.as_ref())))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
