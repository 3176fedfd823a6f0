//! Remote job server client.
//!
//! Wire format: `POST {base_url}/jobs/{jobName}` with the payload as the JSON body.
//! Success is `200 { "result": ... }`; failure is any other status with
//! `{ "error": { "message": ..., "fault": "socket"|"jobServer"|"exception"|"timeout" } }`.
//! When the body carries no fault kind it is derived from the status code.

use async_trait::async_trait;
use panomedia_core::models::JobKind;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::client::JobQueueClient;
use crate::fault::{FaultKind, JobFault};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultBody {
    pub result: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorBody {
    pub error: JobErrorDetail,
}

impl From<&JobFault> for JobErrorBody {
    fn from(fault: &JobFault) -> Self {
        Self {
            error: JobErrorDetail {
                message: fault.message().to_string(),
                fault: Some(fault.kind()),
            },
        }
    }
}

impl JobFault {
    /// HTTP status a job server answers with for this fault.
    pub fn status_code(&self) -> u16 {
        match self {
            JobFault::Exception(_) => 422,
            JobFault::Socket(_) => 502,
            JobFault::Timeout(_) => 504,
            JobFault::JobServer(_) => 500,
        }
    }
}

fn fault_kind_for_status(status: StatusCode) -> FaultKind {
    match status {
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => FaultKind::Timeout,
        s if s.is_client_error() => FaultKind::Exception,
        _ => FaultKind::JobServer,
    }
}

#[derive(Clone)]
pub struct HttpJobQueueClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobQueueClient {
    /// `timeout` bounds the whole request, including the job's run time.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build job server HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn job_url(&self, kind: JobKind) -> String {
        format!("{}/jobs/{}", self.base_url, kind)
    }
}

#[async_trait]
impl JobQueueClient for HttpJobQueueClient {
    #[tracing::instrument(skip(self, payload), fields(job.kind = %kind))]
    async fn submit_job(&self, kind: JobKind, payload: Value) -> Result<Value, JobFault> {
        let response = self
            .client
            .post(self.job_url(kind))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JobFault::Timeout(e.to_string())
                } else {
                    JobFault::Socket(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                JobFault::Timeout(e.to_string())
            } else {
                JobFault::Socket(e.to_string())
            }
        })?;

        if status.is_success() {
            let body: JobResultBody = serde_json::from_slice(&body).map_err(|e| {
                JobFault::JobServer(format!("malformed job server response: {}", e))
            })?;
            return Ok(body.result);
        }

        let fault = match serde_json::from_slice::<JobErrorBody>(&body) {
            Ok(JobErrorBody { error }) => JobFault::new(
                error.fault.unwrap_or_else(|| fault_kind_for_status(status)),
                error.message,
            ),
            Err(_) => JobFault::new(
                fault_kind_for_status(status),
                format!("job server responded with {}", status),
            ),
        };

        tracing::warn!(status = status.as_u16(), fault = %fault, "Job server reported a fault");
        Err(fault)
    }
}
