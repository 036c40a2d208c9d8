mod paths;
mod report;
mod runner;
mod synthetic;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use mosaic_core::StreamConfig;

use crate::runner::ViewerRunner;
use crate::synthetic::SyntheticStore;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut report_path: Option<PathBuf> = None;
    let mut path_names: Vec<String> = Vec::new();
    let mut frames = 600u32;
    let mut frame_ms = 16u64;
    let mut latency_ms = 5u64;
    let mut fail_rate = 0.0f32;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if matches!(flag, "--help" | "-h") {
            print_usage();
            process::exit(0);
        }
        i += 1;
        let Some(value) = args.get(i) else {
            eprintln!("Missing value for {}", flag);
            process::exit(1);
        };
        match flag {
            "--config" => config_path = Some(PathBuf::from(value)),
            "--report" => report_path = Some(PathBuf::from(value)),
            "--path" => path_names.push(value.clone()),
            "--frames" => frames = parse_or_exit(flag, value),
            "--frame-ms" => frame_ms = parse_or_exit(flag, value),
            "--latency-ms" => latency_ms = parse_or_exit(flag, value),
            "--fail-rate" => fail_rate = parse_or_exit(flag, value),
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => load_config(path),
        None => StreamConfig {
            tileset: "synthetic".to_string(),
            ..Default::default()
        },
    };

    let selected = if path_names.is_empty() {
        paths::standard_paths()
    } else {
        path_names
            .iter()
            .map(|name| {
                paths::find_path(name).unwrap_or_else(|| {
                    eprintln!("Unknown path: {}", name);
                    process::exit(1);
                })
            })
            .collect()
    };

    log::info!("Initializing GPU...");
    let runner = match ViewerRunner::new(frames, Duration::from_millis(frame_ms)) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let mut results = Vec::new();
    for path in &selected {
        let store = Arc::new(SyntheticStore::new(
            config.tile_size,
            Duration::from_millis(latency_ms),
            fail_rate,
        ));
        match runner.run_path(path, &config, store.clone()) {
            Ok(result) => {
                log::debug!("  Store served {} fetches", store.attempts());
                results.push(result);
            }
            Err(e) => {
                eprintln!("ERROR: path '{}' failed: {}", path.name, e);
                process::exit(1);
            }
        }
    }

    println!("\n## Streaming Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = report_path {
        let run = report::RunReport {
            run_id: format!("viewer-{}", process::id()),
            tile_size: config.tile_size,
            grid_size: config.grid_size,
            max_levels: config.max_levels,
            latency_ms,
            fail_rate,
            results,
        };
        if let Err(e) = report::save_report(path, &run) {
            eprintln!("ERROR: failed to write report {}: {}", path.display(), e);
            process::exit(1);
        }
        log::info!("Saved report to {}", path.display());
    }

    log::info!("Viewer run complete.");
}

fn print_usage() {
    eprintln!("Usage: mosaic-viewer [OPTIONS]");
    eprintln!("  --config <file.ron>   Stream configuration (default: built-in)");
    eprintln!("  --path <name>         Viewport path to run; repeatable (default: all)");
    eprintln!("                        still | pan | orbit | pan-frozen");
    eprintln!("  --frames <n>          Frames per path (default: 600)");
    eprintln!("  --frame-ms <ms>       Sleep between frames (default: 16)");
    eprintln!("  --latency-ms <ms>     Synthetic fetch latency (default: 5)");
    eprintln!("  --fail-rate <0..1>    Fraction of fetches that fail (default: 0)");
    eprintln!("  --report <path>       Write a JSON run report");
}

fn parse_or_exit<T: std::str::FromStr>(flag: &str, value: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("Invalid value for {}: {}", flag, value);
        process::exit(1);
    })
}

fn load_config(path: &Path) -> StreamConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("ERROR: cannot read {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    match StreamConfig::from_ron_str(&text) {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            eprintln!("ERROR: invalid config {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}
