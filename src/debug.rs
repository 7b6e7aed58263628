use std::time::Instant;

/// Logs how long a bootstrap stage took when dropped.
pub(crate) struct StageTimer {
    stage: &'static str,
    log_level: log::Level,
    started: Instant,
}

impl StageTimer {
    pub fn new(log_level: log::Level, stage: &'static str) -> Self {
        log::log!(log_level, "{stage}...");
        Self {
            stage,
            log_level,
            started: Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        log::log!(
            self.log_level,
            "{} took {:.2?}",
            self.stage,
            self.started.elapsed()
        );
    }
}
