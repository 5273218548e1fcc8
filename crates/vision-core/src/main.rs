use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use vision_core::{
    logging, Config, FrameReport, ImageSequenceSource, Pipeline, StopSignal, StreamConfig,
};

#[derive(Debug, Parser)]
#[command(name = "vision-core", about = "Multi-color blob detection over a frame stream")]
struct Args {
    /// TOML configuration file (defaults to config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the color frame directory
    #[arg(long)]
    color_dir: Option<PathBuf>,

    /// Override the depth frame directory
    #[arg(long)]
    depth_dir: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging needs the level from the config, so parse errors surface after init
    let config = Config::load(args.config.as_deref());
    let level = config
        .as_ref()
        .map(|c| c.system.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    logging::init(&level);
    tracing::info!("vision-core waking up...");

    let mut config = config.context("Could not load configuration")?;
    if let Some(dir) = args.color_dir {
        config.source.color_dir = dir;
    }
    if let Some(dir) = args.depth_dir {
        config.source.depth_dir = Some(dir);
    }

    // Configuration errors are fatal before any frame is requested
    let detector = config.build_detector().context("Invalid detection config")?;
    let mut pipeline = Pipeline::new(detector)
        .with_timeout(Duration::from_millis(config.source.timeout_ms));
    if let Some(fuser) = config.build_depth_fuser().context("Invalid depth config")? {
        pipeline = pipeline.with_depth(fuser, config.depth.roi);
    }

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.trigger()).context("Could not set Ctrl+C handler")?;

    let mut source = ImageSequenceSource::from_config(&config.source);
    let stream = StreamConfig::from(&config.source);

    let summary = pipeline.run(&mut source, &stream, &stop, args.max_frames, log_report)?;

    tracing::info!(
        frames = summary.frames,
        skipped = summary.skipped,
        detections = summary.detections,
        "Pipeline finished"
    );
    Ok(())
}

fn log_report(report: &FrameReport) {
    for located in &report.detections {
        let bbox = located.detection.region.bbox;
        tracing::info!(
            frame = report.index,
            label = %located.detection.label,
            x = bbox.x,
            y = bbox.y,
            width = bbox.width,
            height = bbox.height,
            area = located.detection.region.area,
            distance_m = ?located.distance.map(|d| d.mean),
        );
    }
    if let Some(stats) = report.roi_distance {
        tracing::info!(
            frame = report.index,
            "ROI Stats: Avg={:.2}m, Min={:.2}m, Max={:.2}m",
            stats.mean,
            stats.min,
            stats.max
        );
    }
}
