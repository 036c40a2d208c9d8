use std::sync::Arc;
use std::time::{Duration, Instant};

use mosaic_core::StreamConfig;
use mosaic_render::{ResidencyRenderer, UploadError};
use mosaic_stream::{StreamError, TileStore, TileStreamer};
use thiserror::Error;

use crate::paths::ViewPath;
use crate::report::{compute_timings, PathResult};

/// Errors that end a path run early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("streamer: {0}")]
    Stream(#[from] StreamError),

    #[error("upload: {0}")]
    Upload(#[from] UploadError),
}

/// Drives the streamer and renderer headlessly on a native adapter.
pub struct ViewerRunner {
    device: wgpu::Device,
    queue: wgpu::Queue,
    frames: u32,
    frame_interval: Duration,
}

impl ViewerRunner {
    /// Initialize wgpu natively. Blocks on async adapter request.
    pub fn new(frames: u32, frame_interval: Duration) -> Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| "no suitable GPU adapter found".to_string())?;

        log::info!("Viewer adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("viewer-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| format!("failed to create device: {e}"))?;

        Ok(Self {
            device,
            queue,
            frames,
            frame_interval,
        })
    }

    /// Stream tiles along `path` for the configured number of frames.
    pub fn run_path(
        &self,
        path: &ViewPath,
        config: &StreamConfig,
        store: Arc<dyn TileStore>,
    ) -> Result<PathResult, RunError> {
        log::info!("Running path '{}' for {} frames...", path.name, self.frames);

        let mut streamer = TileStreamer::new(config.clone(), store)?;
        let mut renderer = ResidencyRenderer::new(&self.device, config)?;

        let mut frame_times = Vec::with_capacity(self.frames as usize);
        let mut uploads = 0u64;
        let mut first_full_frame = None;
        let mut last_stats = None;

        for frame in 0..self.frames {
            let view = path.view_at(frame, config.max_levels);
            let frame_start = Instant::now();

            let update = streamer.update(&view);
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("viewer-encoder"),
                });
            uploads += renderer.record(&self.queue, &mut encoder, &update)? as u64;
            self.queue.submit(std::iter::once(encoder.finish()));
            renderer.end_frame()?;
            self.device.poll(wgpu::Maintain::Poll);

            frame_times.push(frame_start.elapsed().as_secs_f64() * 1000.0);

            let stats = update.stats;
            if first_full_frame.is_none() && stats.required > 0 && stats.resident == stats.required {
                log::info!("  Fully resident at frame {}", frame);
                first_full_frame = Some(frame);
            }
            if frame % 60 == 0 {
                log::debug!(
                    "  frame {}: {}/{} resident, {} requested, {} pending",
                    frame,
                    stats.resident,
                    stats.required,
                    stats.requested,
                    stats.pending_results
                );
            }
            last_stats = Some(stats);

            std::thread::sleep(self.frame_interval);
        }

        self.device.poll(wgpu::Maintain::Wait);
        let worker = streamer.shutdown().unwrap_or_default();
        let last = last_stats.unwrap_or_default();
        let timings = compute_timings(&frame_times);

        log::info!(
            "  Done: {} uploads, {}/{} resident, {} fetch failures, mean={:.2}ms",
            uploads,
            last.resident,
            last.required,
            worker.failures(),
            timings.mean_ms
        );

        Ok(PathResult {
            path_name: path.name.to_string(),
            frames: self.frames,
            uploads,
            final_required: last.required,
            final_resident: last.resident,
            first_full_frame,
            stale_dropped: last.stale_dropped,
            delivered: worker.delivered,
            fetch_failures: worker.failures(),
            panics: worker.panics,
            timings,
        })
    }
}
