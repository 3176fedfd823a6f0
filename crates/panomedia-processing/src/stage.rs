//! Processing job lifecycle.
//!
//! `received -> decompressing -> tiling -> uploading -> reportedSuccess`, with a
//! jump to `reportedFailure` from any non-terminal stage. There is no retry: a
//! terminal stage never moves again.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Decompressing,
    Tiling,
    Uploading,
    ReportedSuccess,
    ReportedFailure,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Received => "received",
            JobStage::Decompressing => "decompressing",
            JobStage::Tiling => "tiling",
            JobStage::Uploading => "uploading",
            JobStage::ReportedSuccess => "reportedSuccess",
            JobStage::ReportedFailure => "reportedFailure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::ReportedSuccess | JobStage::ReportedFailure)
    }

    pub fn can_advance_to(&self, next: JobStage) -> bool {
        use JobStage::*;
        match (self, next) {
            (s, ReportedFailure) => !s.is_terminal(),
            (Received, Decompressing)
            | (Decompressing, Tiling)
            | (Tiling, Uploading)
            | (Uploading, ReportedSuccess) => true,
            _ => false,
        }
    }
}

impl Display for JobStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Records the stages a single job passes through and logs each transition.
#[derive(Debug)]
pub struct StageTracker {
    media_id: String,
    history: Vec<JobStage>,
    started: Instant,
}

impl StageTracker {
    pub fn new(media_id: &str) -> Self {
        Self {
            media_id: media_id.to_string(),
            history: vec![JobStage::Received],
            started: Instant::now(),
        }
    }

    pub fn current(&self) -> JobStage {
        self.history
            .last()
            .copied()
            .unwrap_or(JobStage::Received)
    }

    pub fn history(&self) -> &[JobStage] {
        &self.history
    }

    /// Moves to `next`. Illegal transitions are ignored and return false.
    pub fn advance(&mut self, next: JobStage) -> bool {
        let current = self.current();
        if !current.can_advance_to(next) {
            tracing::warn!(
                media_id = %self.media_id,
                from = %current,
                to = %next,
                "Ignoring illegal job stage transition"
            );
            return false;
        }

        tracing::debug!(
            media_id = %self.media_id,
            from = %current,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Job stage transition"
        );
        self.history.push(next);
        true
    }

    pub fn fail(&mut self) -> bool {
        self.advance(JobStage::ReportedFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut tracker = StageTracker::new("m");
        for stage in [
            JobStage::Decompressing,
            JobStage::Tiling,
            JobStage::Uploading,
            JobStage::ReportedSuccess,
        ] {
            assert!(tracker.advance(stage));
        }
        assert_eq!(tracker.history().len(), 5);
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn failure_from_any_running_stage() {
        let mut tracker = StageTracker::new("m");
        tracker.advance(JobStage::Decompressing);
        assert!(tracker.fail());
        assert_eq!(tracker.current(), JobStage::ReportedFailure);
    }

    #[test]
    fn terminal_stages_do_not_move() {
        let mut tracker = StageTracker::new("m");
        assert!(tracker.fail());
        assert!(!tracker.fail());
        assert!(!tracker.advance(JobStage::Decompressing));
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut tracker = StageTracker::new("m");
        assert!(!tracker.advance(JobStage::Uploading));
        assert_eq!(tracker.current(), JobStage::Received);
    }
}
