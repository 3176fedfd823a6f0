//! Panomedia worker service
//!
//! Wires configuration, storage, record stores, the job handlers and the
//! in-process queue together, and serves `POST /jobs/{name}` so orchestrators
//! elsewhere can reach this worker through `HttpJobQueueClient`.

pub mod error;
pub mod setup;
pub mod state;
pub mod telemetry;
