use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mosaic_core::types::TileId;

use crate::fetch_queue::{FetchQueue, FetchResult};
use crate::normalize::{check_shape, normalize_tile, TilePixels};
use crate::store::{FetchOutcome, TileStore};

/// Counters reported by the worker when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tiles fetched, normalized and pushed to the result queue.
    pub delivered: u64,
    pub not_found: u64,
    pub transient_errors: u64,
    /// Tiles whose bytes did not match their advertised layout.
    pub malformed: u64,
    /// Fetches that panicked inside the store.
    pub panics: u64,
}

impl WorkerStats {
    pub fn failures(&self) -> u64 {
        self.not_found + self.transient_errors + self.malformed + self.panics
    }
}

/// Background thread that turns requests into results.
///
/// The worker polls: when there is nothing to fetch or the result queue is
/// full it sleeps `poll_interval` and checks again. It observes the cancel
/// flag between iterations, so shutdown waits at most one poll interval plus
/// the fetch in progress.
pub struct FetchWorker {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl FetchWorker {
    pub fn spawn(
        queue: Arc<FetchQueue>,
        store: Arc<dyn TileStore>,
        tileset: String,
        tile_size: u32,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("tile-fetch".to_string())
            .spawn(move || {
                run(&queue, store.as_ref(), &tileset, tile_size, poll_interval, &flag)
            })?;
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Whether the worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal cancellation and join the thread. Returns the worker's stats the
    /// first time; later calls are no-ops returning `None`.
    pub fn shutdown(&mut self) -> Option<WorkerStats> {
        let handle = self.handle.take()?;
        self.cancel.store(true, Ordering::Release);
        match handle.join() {
            Ok(stats) => {
                log::info!(
                    "tile-fetch worker stopped: {} delivered, {} failed",
                    stats.delivered,
                    stats.failures()
                );
                Some(stats)
            }
            Err(_) => {
                log::error!("tile-fetch worker terminated by panic");
                None
            }
        }
    }
}

impl Drop for FetchWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    queue: &FetchQueue,
    store: &dyn TileStore,
    tileset: &str,
    tile_size: u32,
    poll_interval: Duration,
    cancel: &AtomicBool,
) -> WorkerStats {
    log::info!("tile-fetch worker started (tileset '{tileset}')");
    let mut stats = WorkerStats::default();

    while !cancel.load(Ordering::Acquire) {
        if queue.results_full() {
            thread::sleep(poll_interval);
            continue;
        }
        let Some(tile) = queue.pop_next_request() else {
            thread::sleep(poll_interval);
            continue;
        };

        let Some(pixels) = fetch_one(store, tileset, tile, tile_size, &mut stats) else {
            queue.release(tile);
            continue;
        };

        // Another producer may have filled the queue since the check above;
        // hold the result until there is room rather than exceed the cap.
        let mut item = FetchResult { tile, pixels };
        loop {
            match queue.push_result(item) {
                Ok(()) => {
                    stats.delivered += 1;
                    break;
                }
                Err(rejected) => {
                    if cancel.load(Ordering::Acquire) {
                        return stats;
                    }
                    item = rejected;
                    thread::sleep(poll_interval);
                }
            }
        }
    }

    stats
}

/// Fetch and normalize one tile. Every failure, including a panic inside the
/// store or a tile that does not fit a `tile_size` RGBA8 slot, is counted and
/// reported as `None`; the consumer re-requests the tile while it stays
/// visible.
fn fetch_one(
    store: &dyn TileStore,
    tileset: &str,
    tile: TileId,
    tile_size: u32,
    stats: &mut WorkerStats,
) -> Option<TilePixels> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| store.fetch_tile(tileset, tile)));
    match outcome {
        Ok(FetchOutcome::Ok(raw)) => match normalize_tile(raw)
            .and_then(|pixels| check_shape(&pixels, tile_size).map(|()| pixels))
        {
            Ok(pixels) => Some(pixels),
            Err(e) => {
                stats.malformed += 1;
                log::debug!("dropping malformed tile {tile:?}: {e}");
                None
            }
        },
        Ok(FetchOutcome::NotFound) => {
            stats.not_found += 1;
            log::debug!("tile {tile:?} not found in '{tileset}'");
            None
        }
        Ok(FetchOutcome::TransientError(msg)) => {
            stats.transient_errors += 1;
            log::debug!("fetch of {tile:?} failed: {msg}");
            None
        }
        Err(payload) => {
            stats.panics += 1;
            log::warn!(
                "store panicked fetching {tile:?}: {}",
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
