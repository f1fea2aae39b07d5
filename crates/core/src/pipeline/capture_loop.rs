use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::alerts::alert_dispatcher::AlertSender;
use crate::pipeline::detector_registry::DetectorRegistry;
use crate::pipeline::frame_pacer::FramePacer;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::preview::annotation::{annotate, OverlayGeometry};
use crate::preview::preview_publisher::PreviewPublisher;
use crate::shared::alert::Alert;
use crate::shared::constants::{DEFAULT_FPS, DEFAULT_OPEN_TIMEOUT, DEFAULT_STOP_TIMEOUT};
use crate::video::domain::video_source::{CaptureError, SourceFactory, SourceInfo, VideoSource};

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub fps: u32,
    /// How long `start` waits for the source to open.
    pub open_timeout: Duration,
    /// How long `stop` waits for the capture thread before detaching it.
    pub stop_timeout: Duration,
    pub overlay: OverlayGeometry,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            overlay: OverlayGeometry::default(),
        }
    }
}

/// Handle to one run of the capture thread.
struct Worker {
    running: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    handle: JoinHandle<Box<dyn PipelineLogger>>,
}

/// Clears the run flag when the capture thread exits, however it exits.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Background frame loop: read → perceive → detect → enqueue alerts →
/// publish preview → pace.
///
/// Layout: one capture thread per run. The video source is built and opened
/// on that thread and closed there before the thread signals exit.
pub struct CaptureLoop {
    source_factory: SourceFactory,
    registry: Arc<DetectorRegistry>,
    alerts: AlertSender,
    preview: Arc<PreviewPublisher>,
    config: CaptureConfig,
    logger: Option<Box<dyn PipelineLogger>>,
    worker: Option<Worker>,
    /// First frame timestamp of the next run. Shared with the running
    /// thread so timestamps keep increasing across restarts; the perceiver
    /// outlives any single run.
    next_timestamp: Arc<AtomicU64>,
}

impl CaptureLoop {
    pub fn new(
        source_factory: SourceFactory,
        registry: Arc<DetectorRegistry>,
        alerts: AlertSender,
        preview: Arc<PreviewPublisher>,
        config: CaptureConfig,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            source_factory,
            registry,
            alerts,
            preview,
            config,
            logger: Some(logger),
            worker: None,
            next_timestamp: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::SeqCst))
    }

    /// Starts capturing. Returns once the source has opened (or failed to).
    ///
    /// Calling `start` while already running is a no-op. On failure a
    /// high-severity system alert is queued and the loop stays stopped.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Ok(());
        }
        // A previous run that ended on its own still needs joining.
        self.stop();

        let running = Arc::new(AtomicBool::new(true));
        let (open_tx, open_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let logger = self
            .logger
            .take()
            .unwrap_or_else(|| Box::new(NullPipelineLogger));

        let run = CaptureRun {
            source_factory: self.source_factory.clone(),
            registry: self.registry.clone(),
            alerts: self.alerts.clone(),
            preview: self.preview.clone(),
            fps: self.config.fps,
            overlay: self.config.overlay,
            running: running.clone(),
            next_timestamp: self.next_timestamp.clone(),
            logger,
        };

        let handle = std::thread::Builder::new()
            .name("habit-capture".into())
            .spawn(move || run.execute(open_tx, done_tx))
            .map_err(|e| {
                running.store(false, Ordering::SeqCst);
                CaptureError::Thread(e.to_string())
            })?;

        let worker = Worker {
            running,
            done_rx,
            handle,
        };

        match open_rx.recv_timeout(self.config.open_timeout) {
            Ok(Ok(info)) => {
                log::info!(
                    "Capture started on {} ({}x{}) at {} fps",
                    info.description,
                    info.width,
                    info.height,
                    self.config.fps
                );
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => {
                self.worker = Some(worker);
                self.stop();
                self.report_start_failure(&e);
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.worker = Some(worker);
                self.stop();
                let e = CaptureError::StartTimeout;
                self.report_start_failure(&e);
                Err(e)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker = Some(worker);
                self.stop();
                let e = CaptureError::Thread("capture thread exited before opening".into());
                self.report_start_failure(&e);
                Err(e)
            }
        }
    }

    fn report_start_failure(&self, error: &CaptureError) {
        let detail = match error {
            CaptureError::SourceOpen(msg) => msg.clone(),
            other => other.to_string(),
        };
        log::warn!("Capture failed to start: {detail}");
        if self
            .alerts
            .send(Alert::system(format!("Could not open camera: {detail}")))
            .is_err()
        {
            log::debug!("Alert queue closed; start failure not reported");
        }
    }

    /// Stops capturing and releases the source, waiting at most
    /// `stop_timeout`. On timeout the thread is detached.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.running.store(false, Ordering::SeqCst);

        match worker.done_rx.recv_timeout(self.config.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match worker.handle.join() {
                Ok(logger) => self.logger = Some(logger),
                Err(_) => log::warn!("Capture thread panicked"),
            },
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Capture thread did not stop within {:?}; detaching it",
                    self.config.stop_timeout
                );
            }
        }
        self.preview.clear();
        log::info!("Capture stopped");
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the capture thread owns for one run.
struct CaptureRun {
    source_factory: SourceFactory,
    registry: Arc<DetectorRegistry>,
    alerts: AlertSender,
    preview: Arc<PreviewPublisher>,
    fps: u32,
    overlay: OverlayGeometry,
    running: Arc<AtomicBool>,
    next_timestamp: Arc<AtomicU64>,
    logger: Box<dyn PipelineLogger>,
}

impl CaptureRun {
    fn execute(
        mut self,
        open_tx: Sender<Result<SourceInfo, CaptureError>>,
        done_tx: Sender<()>,
    ) -> Box<dyn PipelineLogger> {
        let _guard = RunGuard(self.running.clone());

        let mut source = (self.source_factory)();
        match source.open() {
            Ok(info) => {
                self.logger.begin_run();
                self.logger.info(&format!("Reading frames from {}", info.description));
                let _ = open_tx.send(Ok(info));
            }
            Err(e) => {
                source.close();
                let _ = open_tx.send(Err(e));
                let _ = done_tx.send(());
                return self.logger;
            }
        }

        self.run_frames(source.as_mut());

        source.close();
        self.logger.summary();
        let _ = done_tx.send(());
        self.logger
    }

    fn run_frames(&mut self, source: &mut dyn VideoSource) {
        let mut pacer =
            FramePacer::resuming_at(self.fps, self.next_timestamp.load(Ordering::SeqCst));

        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            let frame = match source.read_frame() {
                Ok(frame) => {
                    let frame = frame.with_timestamp(pacer.next_timestamp());
                    self.next_timestamp
                        .fetch_max(pacer.upcoming_timestamp(), Ordering::SeqCst);
                    frame
                }
                Err(e) => {
                    log::debug!("Frame read failed: {e}");
                    self.logger.metric("dropped_reads", 1.0);
                    pacer.pace();
                    continue;
                }
            };
            self.logger.timing("read", elapsed_ms(started));

            let started = Instant::now();
            let landmarks = self.registry.perceive(&frame);
            self.logger.timing("perceive", elapsed_ms(started));
            let Some(landmarks) = landmarks else {
                pacer.pace();
                continue;
            };

            let started = Instant::now();
            let alerts = self
                .registry
                .process(&landmarks, frame.width(), frame.height());
            self.logger.timing("detect", elapsed_ms(started));

            if !alerts.is_empty() {
                self.logger.metric("alerts", alerts.len() as f64);
            }
            for alert in alerts {
                if self.alerts.send(alert).is_err() {
                    log::debug!("Alert queue closed; dropping alert");
                }
            }

            if self.preview.is_enabled() {
                let started = Instant::now();
                let annotated = annotate(
                    &frame,
                    &landmarks,
                    &self.registry.statuses(),
                    &self.registry.enabled_ids(),
                    &self.overlay,
                );
                self.preview.publish(annotated);
                self.logger.timing("preview", elapsed_ms(started));
            }

            self.logger.frame();
            pacer.pace();
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
