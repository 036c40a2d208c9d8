pub mod error;
pub mod fetch_queue;
pub mod normalize;
pub mod occupancy;
pub mod residency;
pub mod store;
pub mod worker;

use std::sync::Arc;

use glam::UVec2;
use mosaic_core::types::{GridWindow, TileId};
use mosaic_core::{StreamConfig, ViewParams};

pub use error::{NormalizeError, StreamError};
pub use fetch_queue::{FetchQueue, FetchResult};
pub use normalize::TilePixels;
pub use occupancy::OccupancyTable;
pub use residency::ResidencyTracker;
pub use store::{FetchOutcome, LevelFormat, MemoryTileStore, RawTile, TileStore};
pub use worker::{FetchWorker, WorkerStats};

/// One tile to copy into the array this frame.
#[derive(Debug, Clone)]
pub struct TileUpload {
    pub tile: TileId,
    /// Toroidal slot inside layer `tile.level`.
    pub slot: UVec2,
    pub pixels: TilePixels,
}

/// Counters for one frame, for debug display and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub required: usize,
    pub resident: usize,
    /// Requests handed to the worker this frame.
    pub requested: usize,
    /// Results waiting in the queue after this frame's drain.
    pub pending_results: usize,
    /// Total results discarded because the view moved away before delivery.
    pub stale_dropped: u64,
}

/// Everything the GPU side needs to record for one frame.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub upload: Option<TileUpload>,
    pub occupancy: OccupancyTable,
    /// Windows of the active levels only (`level < num_grids`).
    pub windows: Vec<GridWindow>,
    pub stats: FrameStats,
}

/// Consumer side of the streaming core. Owns the residency tracker and the
/// fetch worker; called once per frame from the render thread.
pub struct TileStreamer {
    config: StreamConfig,
    tracker: ResidencyTracker,
    queue: Arc<FetchQueue>,
    worker: FetchWorker,
    frame: u64,
    stale_dropped: u64,
}

impl TileStreamer {
    /// Validate the config and start the fetch worker.
    pub fn new(config: StreamConfig, store: Arc<dyn TileStore>) -> Result<Self, StreamError> {
        config.validate()?;
        let tracker = ResidencyTracker::new(config.grid_size(), config.max_levels);
        let queue = Arc::new(FetchQueue::new(config.max_outstanding));
        let worker = FetchWorker::spawn(
            Arc::clone(&queue),
            store,
            config.tileset.clone(),
            config.tile_size,
            config.poll_interval(),
        )?;
        log::info!(
            "TileStreamer: {}x{} grid, {} levels, {} result slots",
            config.grid_size[0],
            config.grid_size[1],
            config.max_levels,
            config.max_outstanding
        );
        Ok(Self {
            config,
            tracker,
            queue,
            worker,
            frame: 0,
            stale_dropped: 0,
        })
    }

    /// Run one frame of residency bookkeeping. Never blocks on the worker.
    ///
    /// Recomputes the windows, replaces the request list with the missing
    /// tiles, takes at most one finished tile and publishes the new
    /// occupancy. A taken tile is returned for staging only if the view still
    /// needs it.
    pub fn update(&mut self, view: &ViewParams) -> FrameUpdate {
        self.tracker.update_view(view);
        let plan = self.tracker.plan();
        let requested = plan.to_fetch.len();
        self.queue.set_requested(plan.to_fetch);

        let upload = match self.queue.pop_result() {
            Some(result) if self.tracker.accepts(result.tile) => {
                self.tracker.slot_of(result.tile).map(|slot| TileUpload {
                    tile: result.tile,
                    slot,
                    pixels: result.pixels,
                })
            }
            Some(result) => {
                self.stale_dropped += 1;
                log::trace!("discarding stale tile {:?}", result.tile);
                None
            }
            None => None,
        };

        self.tracker
            .commit(plan.to_keep, upload.as_ref().map(|u| u.tile));

        let occupancy = OccupancyTable::build(
            self.tracker.resident(),
            self.tracker.windows(),
            self.tracker.num_grids(),
            self.tracker.grid_size(),
            self.tracker.max_levels(),
        );

        let stats = FrameStats {
            frame: self.frame,
            required: self.tracker.required().len(),
            resident: self.tracker.resident().len(),
            requested,
            pending_results: self.queue.result_len(),
            stale_dropped: self.stale_dropped,
        };
        self.frame += 1;

        let num_grids = self.tracker.num_grids();
        FrameUpdate {
            upload,
            occupancy,
            windows: self
                .tracker
                .windows()
                .iter()
                .filter(|w| w.level < num_grids)
                .copied()
                .collect(),
            stats,
        }
    }

    /// Stop the fetch worker. Safe to call more than once.
    pub fn shutdown(&mut self) -> Option<WorkerStats> {
        self.worker.shutdown()
    }

    pub fn tracker(&self) -> &ResidencyTracker {
        &self.tracker
    }

    pub fn queue(&self) -> &Arc<FetchQueue> {
        &self.queue
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}
