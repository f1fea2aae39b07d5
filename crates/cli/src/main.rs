use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use habit_monitor_core::alerts::domain::notifier::Notifier;
use habit_monitor_core::alerts::infrastructure::command_notifier::CommandNotifier;
use habit_monitor_core::alerts::infrastructure::log_notifier::LogNotifier;
use habit_monitor_core::config::monitor_settings::{MonitorSettings, DETECTOR_IDS};
use habit_monitor_core::detection::domain::perceiver::{AbsentPerceiver, Perceiver};
use habit_monitor_core::detection::infrastructure::replay_perceiver::ReplayPerceiver;
use habit_monitor_core::pipeline::habit_monitor::{HabitMonitor, MonitorError};
use habit_monitor_core::pipeline::pipeline_logger::LogPipelineLogger;
use habit_monitor_core::shared::clock::{Clock, SystemClock};
use habit_monitor_core::shared::constants::IMAGE_EXTENSIONS;
use habit_monitor_core::video::domain::snapshot_writer::SnapshotWriter;
use habit_monitor_core::video::domain::video_source::{SourceFactory, VideoSource};
use habit_monitor_core::video::infrastructure::ffmpeg_source::{FfmpegSource, FfmpegSourceConfig};
use habit_monitor_core::video::infrastructure::image_file_source::ImageFileSource;
use habit_monitor_core::video::infrastructure::png_snapshot_writer::PngSnapshotWriter;

const DRAIN_INTERVAL: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(66);
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// Watches the camera for bad habits and nudges you about them.
#[derive(Parser)]
#[command(name = "habit-monitor")]
struct Cli {
    /// Camera device, stream URL or still image (defaults to the platform camera).
    #[arg(long)]
    source: Option<String>,

    /// Still image to serve as an endless stream instead of a camera.
    #[arg(long, conflicts_with = "source")]
    image: Option<PathBuf>,

    /// Force an ffmpeg input format, e.g. v4l2, avfoundation, dshow.
    #[arg(long)]
    input_format: Option<String>,

    /// Recorded landmarks to replay, one JSON record per line.
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Detectors to enable (comma-separated); overrides the settings file.
    #[arg(long, value_delimiter = ',')]
    enable: Option<Vec<String>>,

    /// Capture rate in frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Minimum seconds between notifications from the same detector.
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Settings file (defaults to the per-user config location).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep writing the annotated preview to this PNG.
    #[arg(long)]
    preview_out: Option<PathBuf>,

    /// Stop after this many seconds (runs until killed otherwise).
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Log alerts instead of showing desktop notifications.
    #[arg(long)]
    log_notifier: bool,

    /// Do not flip camera frames left-to-right.
    #[arg(long)]
    no_mirror: bool,

    /// Write the effective settings to the settings file and exit.
    #[arg(long)]
    save_config: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = effective_settings(&cli)?;
    if cli.save_config {
        match &cli.config {
            Some(path) => settings.save_to(path)?,
            None => settings.save()?,
        }
        log::info!("Settings saved");
        return Ok(());
    }
    if settings.enabled_detectors.is_empty() {
        return Err(format!(
            "No detectors enabled; pass --enable with any of: {}",
            DETECTOR_IDS.join(", ")
        )
        .into());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = settings.build_registry(build_perceiver(&cli)?, clock.clone());
    let mut monitor = HabitMonitor::new(
        registry,
        build_source_factory(&cli, &settings),
        build_notifier(&cli),
        clock,
        settings.monitor_config(),
        Box::new(LogPipelineLogger::default()),
    );

    if cli.preview_out.is_some() {
        monitor.set_preview_enabled(true);
    }
    for id in &settings.enabled_detectors {
        if let Err(e) = monitor.enable(id) {
            if matches!(e, MonitorError::Capture(_)) {
                // Deliver the camera failure before bailing out.
                monitor.drain_alerts();
            }
            return Err(e.into());
        }
    }
    log::info!("Monitoring: {}", settings.enabled_detectors.join(", "));

    watch(&mut monitor, &cli);

    let report = monitor.shutdown();
    log::info!(
        "Shut down ({} delivered, {} suppressed, {} failed in final drain)",
        report.delivered,
        report.suppressed,
        report.failed
    );
    for (id, status) in monitor.statuses() {
        println!("{id}: {status}");
    }
    Ok(())
}

/// Owner loop: delivers queued alerts and mirrors the preview to disk
/// until the deadline passes or capture dies.
fn watch(monitor: &mut HabitMonitor, cli: &Cli) {
    let deadline = cli
        .duration_secs
        .map(|s| Instant::now() + Duration::from_secs(s));
    let writer = PngSnapshotWriter::new();
    let mut last_drain = Instant::now();
    let mut last_snapshot: Option<Instant> = None;

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if !monitor.is_running() {
            log::warn!("Capture stopped unexpectedly");
            break;
        }

        if last_drain.elapsed() >= DRAIN_INTERVAL {
            let report = monitor.drain_alerts();
            if report.delivered + report.failed > 0 {
                log::debug!(
                    "Drained alerts: {} delivered, {} suppressed, {} failed",
                    report.delivered,
                    report.suppressed,
                    report.failed
                );
            }
            last_drain = Instant::now();
        }

        if let Some(out) = &cli.preview_out {
            let due = last_snapshot.map_or(true, |t| t.elapsed() >= SNAPSHOT_INTERVAL);
            if due {
                if let Some(frame) = monitor.latest_preview_frame() {
                    if let Err(e) = writer.write(out, &frame) {
                        log::warn!("Could not write preview to {}: {e}", out.display());
                    }
                    last_snapshot = Some(Instant::now());
                }
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn effective_settings(cli: &Cli) -> Result<MonitorSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => MonitorSettings::load_from(path)?,
        None => MonitorSettings::load(),
    };
    if let Some(ids) = &cli.enable {
        settings.enabled_detectors = ids.iter().map(|id| id.trim().to_string()).collect();
    }
    if let Some(fps) = cli.fps {
        settings.fps = fps;
    }
    if let Some(secs) = cli.cooldown_secs {
        settings.cooldown_secs = secs;
    }
    if cli.no_mirror {
        settings.mirror = false;
    }
    settings.validate()?;
    Ok(settings)
}

fn build_perceiver(cli: &Cli) -> Result<Box<dyn Perceiver>, Box<dyn std::error::Error>> {
    match &cli.landmarks {
        Some(path) => Ok(Box::new(ReplayPerceiver::from_path(path)?)),
        None => {
            log::warn!("No landmark source given; only time-based detectors will see anything");
            Ok(Box::new(AbsentPerceiver))
        }
    }
}

fn build_notifier(cli: &Cli) -> Box<dyn Notifier> {
    if cli.log_notifier {
        Box::new(LogNotifier)
    } else {
        Box::new(CommandNotifier::default())
    }
}

fn build_source_factory(cli: &Cli, settings: &MonitorSettings) -> SourceFactory {
    let still = cli.image.clone().or_else(|| {
        cli.source
            .as_deref()
            .map(PathBuf::from)
            .filter(|p| is_image(p))
    });
    if let Some(path) = still {
        return Arc::new(move || Box::new(ImageFileSource::new(path.clone())) as Box<dyn VideoSource>);
    }

    let mut config = FfmpegSourceConfig::new(
        cli.source
            .clone()
            .unwrap_or_else(|| default_camera().to_string()),
    );
    config.input_format = match (&cli.input_format, &cli.source) {
        (Some(format), _) => Some(format.clone()),
        (None, None) => Some(default_camera_format().to_string()),
        (None, Some(_)) => None,
    };
    config.frame_size = Some((settings.capture_width, settings.capture_height));
    config.fps = Some(settings.fps);
    config.mirror = settings.mirror;
    Arc::new(move || Box::new(FfmpegSource::new(config.clone())) as Box<dyn VideoSource>)
}

fn default_camera() -> &'static str {
    if cfg!(target_os = "macos") {
        "0"
    } else if cfg!(target_os = "windows") {
        "video=Integrated Camera"
    } else {
        "/dev/video0"
    }
}

fn default_camera_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(fps) = cli.fps {
        if !(1..=120).contains(&fps) {
            return Err(format!("FPS must be between 1 and 120, got {fps}").into());
        }
    }
    if let Some(path) = &cli.landmarks {
        if !path.exists() {
            return Err(format!("Landmark file not found: {}", path.display()).into());
        }
    }
    let still = cli
        .image
        .as_deref()
        .or_else(|| cli.source.as_deref().map(Path::new).filter(|p| is_image(p)));
    if let Some(path) = still {
        if !path.exists() {
            return Err(format!("Image not found: {}", path.display()).into());
        }
    }
    if cli.duration_secs == Some(0) {
        return Err("--duration-secs must be positive".into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
