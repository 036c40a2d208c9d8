use std::path::Path;

use serde::{Deserialize, Serialize};

/// Per-frame CPU timing summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

/// Outcome of one scripted path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    pub path_name: String,
    pub frames: u32,
    /// Tile copies recorded into the array.
    pub uploads: u64,
    pub final_required: usize,
    pub final_resident: usize,
    /// First frame at which every required tile was resident.
    pub first_full_frame: Option<u32>,
    pub stale_dropped: u64,
    pub delivered: u64,
    pub fetch_failures: u64,
    pub panics: u64,
    pub timings: TimingSeries,
}

/// Everything written by `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub tile_size: u32,
    pub grid_size: [u32; 2],
    pub max_levels: u32,
    pub latency_ms: u64,
    pub fail_rate: f32,
    pub results: Vec<PathResult>,
}

/// Save a report as pretty-printed JSON, creating parent directories.
pub fn save_report(path: &Path, report: &RunReport) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        max_ms: sorted[n - 1],
    }
}

/// Format results as a markdown summary table.
pub fn format_markdown(results: &[PathResult]) -> String {
    let mut out = String::new();
    out.push_str("| Path | Frames | Uploads | Resident | Full at | Stale | Failures | Mean (ms) | P95 (ms) |\n");
    out.push_str("|------|--------|---------|----------|---------|-------|----------|-----------|----------|\n");

    for r in results {
        let full_at = r
            .first_full_frame
            .map_or_else(|| "-".to_string(), |f| f.to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {}/{} | {} | {} | {} | {:.2} | {:.2} |\n",
            r.path_name,
            r.frames,
            r.uploads,
            r.final_resident,
            r.final_required,
            full_at,
            r.stale_dropped,
            r.fetch_failures,
            r.timings.mean_ms,
            r.timings.p95_ms,
        ));
    }

    out
}
