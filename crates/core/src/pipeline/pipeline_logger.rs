use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for capture-loop events.
///
/// Lets the capture loop report stage timings and counters without knowing
/// whether anyone is listening.
pub trait PipelineLogger: Send {
    /// Called once per fully processed frame.
    fn frame(&mut self);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. alerts raised, dropped reads).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Called when a capture run starts. Default: no-op.
    fn begin_run(&mut self) {}

    /// Emit a summary when the loop stops. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame(&mut self) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate for one stage. Constant size however long capture runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageStats {
    pub count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageStats {
    fn record(&mut self, duration_ms: f64) {
        self.count += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// Aggregates per-stage timings and metric totals for the current run and
/// reports them through `log`.
///
/// A heartbeat line is logged every `heartbeat_frames` frames so a
/// long-running capture shows it is alive without flooding the output.
pub struct LogPipelineLogger {
    heartbeat_frames: u64,
    timings: HashMap<String, StageStats>,
    metrics: HashMap<String, f64>,
    start_time: Instant,
    frames: u64,
}

impl LogPipelineLogger {
    pub fn new(heartbeat_frames: u64) -> Self {
        Self {
            heartbeat_frames: heartbeat_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        let frames = self.frames;
        let mut lines = Vec::new();

        lines.push(format!(
            "Capture summary ({frames} frames, {elapsed_secs:.1}s total):"
        ));

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stats) in stages {
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms",
                stats.avg_ms(),
                stats.max_ms
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.iter().collect();
        metric_names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, total) in metric_names {
            lines.push(format!("  {name}: total {total:.0}"));
        }

        if frames > 0 && elapsed_secs > 0.0 {
            let fps = frames as f64 / elapsed_secs;
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn stage(&self, stage: &str) -> Option<StageStats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_total(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(300)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn frame(&mut self) {
        self.frames += 1;
        if self.frames % self.heartbeat_frames == 0 {
            log::debug!("Processed {} frames", self.frames);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        match self.timings.get_mut(stage) {
            Some(stats) => stats.record(duration_ms),
            None => {
                let mut stats = StageStats::default();
                stats.record(duration_ms);
                self.timings.insert(stage.to_string(), stats);
            }
        }
    }

    fn metric(&mut self, name: &str, value: f64) {
        match self.metrics.get_mut(name) {
            Some(total) => *total += value,
            None => {
                self.metrics.insert(name.to_string(), value);
            }
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn begin_run(&mut self) {
        self.timings.clear();
        self.metrics.clear();
        self.frames = 0;
        self.start_time = Instant::now();
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
