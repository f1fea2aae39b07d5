use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;

use crate::alerts::alert_dispatcher::{alert_channel, AlertDispatcher, DispatchConfig, DrainReport};
use crate::alerts::domain::notifier::Notifier;
use crate::pipeline::capture_loop::{CaptureConfig, CaptureLoop};
use crate::pipeline::detector_registry::{DetectorRegistry, RegistryError};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::preview::preview_publisher::PreviewPublisher;
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{CaptureError, SourceFactory};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorConfig {
    pub capture: CaptureConfig,
    pub dispatch: DispatchConfig,
}

/// Control surface over the whole pipeline.
///
/// Owned by the caller's thread (menu, timer loop, CLI). The capture loop
/// runs exactly while at least one detector is enabled; alerts are delivered
/// only when the owner calls [`HabitMonitor::drain_alerts`].
pub struct HabitMonitor {
    registry: Arc<DetectorRegistry>,
    preview: Arc<PreviewPublisher>,
    capture: CaptureLoop,
    dispatcher: AlertDispatcher,
}

impl HabitMonitor {
    pub fn new(
        registry: DetectorRegistry,
        source_factory: SourceFactory,
        notifier: Box<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        let registry = Arc::new(registry);
        let preview = Arc::new(PreviewPublisher::new());
        let (sender, receiver) = alert_channel();
        let capture = CaptureLoop::new(
            source_factory,
            registry.clone(),
            sender,
            preview.clone(),
            config.capture,
            logger,
        );
        let dispatcher = AlertDispatcher::new(receiver, notifier, clock, config.dispatch);
        Self {
            registry,
            preview,
            capture,
            dispatcher,
        }
    }

    /// Enables a detector and makes sure capture is running.
    ///
    /// If capture cannot start the detector stays enabled, a system alert is
    /// queued and the error is returned.
    pub fn enable(&mut self, id: &str) -> Result<(), MonitorError> {
        self.registry.enable(id)?;
        self.capture.start()?;
        Ok(())
    }

    /// Disables a detector; capture stops once nothing is enabled.
    pub fn disable(&mut self, id: &str) -> Result<(), MonitorError> {
        self.registry.disable(id)?;
        if !self.registry.any_enabled() {
            self.capture.stop();
        }
        Ok(())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.registry.is_enabled(id)
    }

    pub fn any_enabled(&self) -> bool {
        self.registry.any_enabled()
    }

    pub fn detector_ids(&self) -> Vec<&'static str> {
        self.registry.ids()
    }

    pub fn enabled_ids(&self) -> BTreeSet<String> {
        self.registry.enabled_ids()
    }

    pub fn statuses(&self) -> BTreeMap<String, String> {
        self.registry.statuses()
    }

    pub fn reset_detector(&self, id: &str) -> Result<(), MonitorError> {
        self.registry.reset_detector(id)?;
        Ok(())
    }

    pub fn set_preview_enabled(&self, enabled: bool) {
        self.preview.set_enabled(enabled);
    }

    pub fn is_preview_enabled(&self) -> bool {
        self.preview.is_enabled()
    }

    pub fn latest_preview_frame(&self) -> Option<Arc<Frame>> {
        self.preview.latest()
    }

    pub fn is_running(&self) -> bool {
        self.capture.is_running()
    }

    pub fn drain_alerts(&mut self) -> DrainReport {
        self.dispatcher.drain()
    }

    /// Stops capture and delivers whatever is still queued.
    pub fn shutdown(&mut self) -> DrainReport {
        self.capture.stop();
        self.preview.set_enabled(false);
        self.dispatcher.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::domain::notifier::NotifyError;
    use crate::detection::domain::detector::{DetectionInput, Detector, DetectorError};
    use crate::detection::domain::landmarks::LandmarkSet;
    use crate::detection::domain::perceiver::AbsentPerceiver;
    use crate::detection::infrastructure::replay_perceiver::ReplayPerceiver;
    use crate::detection::infrastructure::focus_detector::{FocusConfig, FocusDetector};
    use crate::detection::infrastructure::hydration_detector::{HydrationConfig, HydrationDetector};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::alert::Severity;
    use crate::shared::clock::SystemClock;
    use crate::video::domain::video_source::{SourceInfo, VideoSource};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct DeviceState {
        open: AtomicBool,
        opens: AtomicUsize,
    }

    struct FakeCamera {
        state: Arc<DeviceState>,
        fail: bool,
    }

    impl VideoSource for FakeCamera {
        fn open(&mut self) -> Result<SourceInfo, CaptureError> {
            if self.fail {
                return Err(CaptureError::SourceOpen("permission denied".into()));
            }
            self.state.opens.fetch_add(1, Ordering::SeqCst);
            self.state.open.store(true, Ordering::SeqCst);
            Ok(SourceInfo {
                width: 160,
                height: 90,
                fps: 30.0,
                description: "fake camera".into(),
            })
        }

        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            Ok(Frame::filled(160, 90, [40, 40, 40]))
        }

        fn close(&mut self) {
            self.state.open.store(false, Ordering::SeqCst);
        }
    }

    struct CollectingNotifier(Arc<Mutex<Vec<String>>>);

    impl Notifier for CollectingNotifier {
        fn notify(&self, _title: &str, message: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }

        fn play_cue(&self, _severity: Severity) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    struct Setup {
        monitor: HabitMonitor,
        device: Arc<DeviceState>,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    fn setup(camera_fails: bool) -> Setup {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = DetectorRegistry::new(
            vec![
                Box::new(FocusDetector::new(FocusConfig {
                    frames_threshold: 3,
                    ..FocusConfig::default()
                })),
                Box::new(HydrationDetector::new(HydrationConfig::default(), clock.now())),
            ],
            Box::new(AbsentPerceiver),
            clock.clone(),
        );
        let device = Arc::new(DeviceState::default());
        let factory: SourceFactory = {
            let device = device.clone();
            Arc::new(move || {
                Box::new(FakeCamera {
                    state: device.clone(),
                    fail: camera_fails,
                }) as Box<dyn VideoSource>
            })
        };
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let config = MonitorConfig {
            capture: CaptureConfig {
                fps: 100,
                ..CaptureConfig::default()
            },
            ..MonitorConfig::default()
        };
        let monitor = HabitMonitor::new(
            registry,
            factory,
            Box::new(CollectingNotifier(delivered.clone())),
            clock,
            config,
            Box::new(NullPipelineLogger),
        );
        Setup {
            monitor,
            device,
            delivered,
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_loop_runs_exactly_while_a_detector_is_enabled() {
        let mut s = setup(false);
        assert!(!s.monitor.any_enabled());
        assert!(!s.monitor.is_running());

        s.monitor.enable("hydration").unwrap();
        assert!(s.monitor.is_running());
        assert!(s.device.open.load(Ordering::SeqCst));

        s.monitor.enable("focus").unwrap();
        s.monitor.disable("hydration").unwrap();
        assert!(s.monitor.is_running());

        s.monitor.disable("focus").unwrap();
        assert!(!s.monitor.any_enabled());
        assert!(!s.monitor.is_running());
        assert!(!s.device.open.load(Ordering::SeqCst));
        assert_eq!(s.device.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_alerts_reach_notifier_on_drain() {
        let mut s = setup(false);
        s.monitor.enable("focus").unwrap();

        // No face in front of the camera counts as looking away.
        assert!(wait_until(|| {
            s.monitor.drain_alerts();
            !s.delivered.lock().unwrap().is_empty()
        }));
        let delivered = s.delivered.lock().unwrap();
        assert!(delivered[0].starts_with("Focus on your work"));
    }

    #[test]
    fn test_camera_failure_keeps_detector_enabled_and_alerts() {
        let mut s = setup(true);
        let err = s.monitor.enable("focus").unwrap_err();
        assert!(matches!(err, MonitorError::Capture(CaptureError::SourceOpen(_))));
        assert!(s.monitor.is_enabled("focus"));
        assert!(!s.monitor.is_running());

        let report = s.monitor.drain_alerts();
        assert_eq!(report.delivered, 1);
        assert_eq!(
            s.delivered.lock().unwrap()[0],
            "Could not open camera: permission denied"
        );
    }

    #[test]
    fn test_unknown_detector_is_rejected_without_starting() {
        let mut s = setup(false);
        assert!(matches!(
            s.monitor.enable("posture"),
            Err(MonitorError::Registry(RegistryError::UnknownDetector(_)))
        ));
        assert!(!s.monitor.is_running());
    }

    #[test]
    fn test_preview_toggle() {
        let mut s = setup(false);
        s.monitor.enable("hydration").unwrap();
        assert!(s.monitor.latest_preview_frame().is_none());

        s.monitor.set_preview_enabled(true);
        assert!(wait_until(|| s.monitor.latest_preview_frame().is_some()));

        s.monitor.set_preview_enabled(false);
        assert!(s.monitor.latest_preview_frame().is_none());
    }

    #[test]
    fn test_statuses_and_reset() {
        let mut s = setup(false);
        s.monitor.enable("hydration").unwrap();
        assert_eq!(s.monitor.statuses()["focus"], "Disabled");

        s.monitor.reset_detector("hydration").unwrap();
        assert!(s.monitor.statuses()["hydration"].starts_with("Next reminder in 44m")
            || s.monitor.statuses()["hydration"] == "Timer reset");
        assert!(matches!(
            s.monitor.reset_detector("focus"),
            Err(MonitorError::Registry(RegistryError::ResetUnsupported(_)))
        ));
    }

    struct CountingDetector(Arc<AtomicUsize>);

    impl Detector for CountingDetector {
        fn id(&self) -> &'static str {
            "counting"
        }
        fn name(&self) -> &'static str {
            "Counting"
        }
        fn alert_message(&self) -> &'static str {
            "counted"
        }
        fn detect(&mut self, _input: &DetectionInput<'_>) -> Result<bool, DetectorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
        fn reset(&mut self, _now: Instant) {}
        fn status(&self) -> String {
            "Monitoring".into()
        }
    }

    #[test]
    fn test_detectors_keep_running_after_restart_with_replay() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = DetectorRegistry::new(
            vec![Box::new(CountingDetector(evaluations.clone()))],
            Box::new(ReplayPerceiver::new(vec![LandmarkSet::empty()])),
            clock.clone(),
        );
        let device = Arc::new(DeviceState::default());
        let factory: SourceFactory = {
            let device = device.clone();
            Arc::new(move || {
                Box::new(FakeCamera {
                    state: device.clone(),
                    fail: false,
                }) as Box<dyn VideoSource>
            })
        };
        let config = MonitorConfig {
            capture: CaptureConfig {
                fps: 100,
                ..CaptureConfig::default()
            },
            ..MonitorConfig::default()
        };
        let mut monitor = HabitMonitor::new(
            registry,
            factory,
            Box::new(CollectingNotifier(Arc::new(Mutex::new(Vec::new())))),
            clock,
            config,
            Box::new(NullPipelineLogger),
        );

        monitor.enable("counting").unwrap();
        assert!(wait_until(|| evaluations.load(Ordering::SeqCst) >= 5));
        monitor.disable("counting").unwrap();
        assert!(!monitor.is_running());

        let before_restart = evaluations.load(Ordering::SeqCst);
        monitor.enable("counting").unwrap();
        assert!(wait_until(
            || evaluations.load(Ordering::SeqCst) >= before_restart + 5
        ));
        assert_eq!(device.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_stops_and_releases() {
        let mut s = setup(false);
        s.monitor.enable("hydration").unwrap();
        s.monitor.shutdown();
        assert!(!s.monitor.is_running());
        assert!(!s.device.open.load(Ordering::SeqCst));
        assert!(s.monitor.is_enabled("hydration"));
    }
}
