use panomedia_core::AppError;
use serde::{Deserialize, Serialize};

/// Terminal failure of a job submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobFault {
    /// The job server could not be reached or the connection dropped.
    #[error("socket error: {0}")]
    Socket(String),

    /// The job server failed independently of the job (crash, overload, lost job).
    #[error("job server error: {0}")]
    JobServer(String),

    /// The job handler itself reported an error.
    #[error("job exception: {0}")]
    Exception(String),

    #[error("job timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultKind {
    Socket,
    JobServer,
    Exception,
    Timeout,
}

impl JobFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            FaultKind::Socket => JobFault::Socket(message),
            FaultKind::JobServer => JobFault::JobServer(message),
            FaultKind::Exception => JobFault::Exception(message),
            FaultKind::Timeout => JobFault::Timeout(message),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            JobFault::Socket(_) => FaultKind::Socket,
            JobFault::JobServer(_) => FaultKind::JobServer,
            JobFault::Exception(_) => FaultKind::Exception,
            JobFault::Timeout(_) => FaultKind::Timeout,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            JobFault::Socket(m)
            | JobFault::JobServer(m)
            | JobFault::Exception(m)
            | JobFault::Timeout(m) => m,
        }
    }

    /// Whether resubmitting the same job could succeed. Nothing retries
    /// automatically; this only informs logs and callers.
    pub fn is_transient(&self) -> bool {
        !matches!(self, JobFault::Exception(_))
    }
}

impl From<JobFault> for AppError {
    fn from(fault: JobFault) -> Self {
        AppError::JobFailed(fault.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_new() {
        for kind in [
            FaultKind::Socket,
            FaultKind::JobServer,
            FaultKind::Exception,
            FaultKind::Timeout,
        ] {
            let fault = JobFault::new(kind, "boom");
            assert_eq!(fault.kind(), kind);
            assert_eq!(fault.message(), "boom");
        }
    }

    #[test]
    fn only_exceptions_are_permanent() {
        assert!(!JobFault::Exception("bad zip".into()).is_transient());
        assert!(JobFault::Timeout("300s".into()).is_transient());
        assert!(JobFault::Socket("refused".into()).is_transient());
    }

    #[test]
    fn converts_to_job_failed() {
        let err: AppError = JobFault::JobServer("crashed".into()).into();
        assert!(matches!(err, AppError::JobFailed(ref m) if m.contains("crashed")));
    }
}
