use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Wall-clock timer with named checkpoints.
///
/// Created with an implicit `"start"` checkpoint; `since` and `fsince` measure
/// from any checkpoint that was added before.
#[derive(Debug, Clone)]
pub struct Timer {
    checkpoints: HashMap<String, Instant>,
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        let start = Instant::now();
        let mut checkpoints = HashMap::new();
        checkpoints.insert("start".to_string(), start);
        Timer { checkpoints, start }
    }

    pub fn add(&mut self, name: impl Into<String>) {
        self.checkpoints.insert(name.into(), Instant::now());
    }

    /// Time since `name`, or since creation when the checkpoint is unknown.
    pub fn since(&self, name: &str) -> Duration {
        self.checkpoints
            .get(name)
            .copied()
            .unwrap_or(self.start)
            .elapsed()
    }

    pub fn fsince(&self, name: &str) -> String {
        format_duration(self.since(name))
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Human-readable duration, e.g. `850ms`, `12.30s`, `3m 05s`, `1h 02m 09s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs < 60 {
        return format!("{:.2}s", d.as_secs_f64());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else {
        format!("{}m {:02}s", m, s)
    }
}
