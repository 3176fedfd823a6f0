//! Snowflake identifiers used as record primary keys and feed sort keys.
//!
//! Layout of the 64-bit value, most significant bits first:
//!
//! | bits | field                                   |
//! |------|-----------------------------------------|
//! | 41   | milliseconds since [`DEFAULT_EPOCH_MS`] |
//! | 13   | generator instance id                   |
//! | 10   | per-millisecond sequence                |
//!
//! The value is packed big-endian into 8 bytes and rendered as URL-safe base64.
//! Ordering is defined on the decoded value: [`SnowflakeId`] implements `Ord`, and
//! descending-by-id is descending-by-creation-time.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 2015-01-01T00:00:00Z in unix milliseconds.
pub const DEFAULT_EPOCH_MS: u64 = 1_420_070_400_000;

const TIMESTAMP_BITS: u32 = 41;
const INSTANCE_BITS: u32 = 13;
const SEQUENCE_BITS: u32 = 10;

const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;
pub const MAX_INSTANCE_ID: u16 = (1 << INSTANCE_BITS) - 1;
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Delay before retrying once the sequence of the current millisecond is exhausted.
const OVERFLOW_RETRY: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    #[error("instance id {0} exceeds the maximum of {MAX_INSTANCE_ID}")]
    InstanceIdOutOfRange(u16),

    #[error("invalid snowflake encoding: {0}")]
    InvalidEncoding(String),
}

/// Source of wall-clock milliseconds since the unix epoch.
pub trait TimeSource: Send + Sync {
    fn current_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Ordered by generation time. The encoded text is not: the URL-safe alphabet
/// puts digits, `-` and `_` out of value order, so sort decoded ids only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId(u64);

impl SnowflakeId {
    pub fn from_parts(timestamp: u64, instance_id: u16, sequence: u16) -> Self {
        let value = ((timestamp & TIMESTAMP_MASK) << (INSTANCE_BITS + SEQUENCE_BITS))
            | ((instance_id as u64 & MAX_INSTANCE_ID as u64) << SEQUENCE_BITS)
            | (sequence as u64 & MAX_SEQUENCE as u64);
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Milliseconds since the generator epoch.
    pub fn timestamp(&self) -> u64 {
        self.0 >> (INSTANCE_BITS + SEQUENCE_BITS)
    }

    pub fn instance_id(&self) -> u16 {
        ((self.0 >> SEQUENCE_BITS) & MAX_INSTANCE_ID as u64) as u16
    }

    pub fn sequence(&self) -> u16 {
        (self.0 & MAX_SEQUENCE as u64) as u16
    }

    /// Creation time in unix milliseconds, given the epoch the id was generated with.
    pub fn unix_millis(&self, epoch_ms: u64) -> u64 {
        self.timestamp() + epoch_ms
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// URL-safe base64 of the big-endian bytes. Do not sort on this text.
    pub fn encode(&self) -> String {
        URL_SAFE.encode(self.to_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self, IdError> {
        let bytes = URL_SAFE
            .decode(encoded)
            .map_err(|e| IdError::InvalidEncoding(e.to_string()))?;
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidEncoding(format!("expected 8 bytes in {encoded}")))?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

impl Display for SnowflakeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.encode())
    }
}

/// Output of [`SnowflakeGenerator::next`]: the encoded id and its creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedId {
    pub id: String,
    /// Unix milliseconds embedded in the id.
    pub timestamp: i64,
}

/// Result of a single generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Ready(SnowflakeId),
    Pending { retry_after: Duration },
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_time: u64,
    sequence: u16,
    overflow: bool,
}

/// Snowflake generator for one instance id.
///
/// Access to the sequence state is serialized; callers may share one generator
/// behind an `Arc`. Sequence exhaustion is handled by [`SnowflakeGenerator::next`]
/// with a deferred 1 ms retry, never by returning an error.
pub struct SnowflakeGenerator<T: TimeSource = SystemClock> {
    instance_id: u16,
    epoch_ms: u64,
    time: T,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator<SystemClock> {
    pub fn new(instance_id: u16) -> Result<Self, IdError> {
        Self::with_clock(instance_id, DEFAULT_EPOCH_MS, SystemClock)
    }
}

impl<T: TimeSource> SnowflakeGenerator<T> {
    pub fn with_clock(instance_id: u16, epoch_ms: u64, time: T) -> Result<Self, IdError> {
        if instance_id > MAX_INSTANCE_ID {
            return Err(IdError::InstanceIdOutOfRange(instance_id));
        }
        Ok(Self {
            instance_id,
            epoch_ms,
            time,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    pub fn instance_id(&self) -> u16 {
        self.instance_id
    }

    pub fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }

    /// Attempts to generate the next id without waiting.
    pub fn poll_id(&self) -> Poll {
        let time = self.time.current_millis().saturating_sub(self.epoch_ms);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if time == state.last_time {
            if state.sequence >= MAX_SEQUENCE {
                state.overflow = true;
                return Poll::Pending {
                    retry_after: OVERFLOW_RETRY,
                };
            }
            state.sequence += 1;
        } else if time > state.last_time {
            state.last_time = time;
            state.sequence = 0;
            state.overflow = false;
        } else {
            // Clock moved backwards: wait until it catches up rather than reuse a slot.
            return Poll::Pending {
                retry_after: Duration::from_millis(state.last_time - time),
            };
        }

        Poll::Ready(SnowflakeId::from_parts(
            state.last_time,
            self.instance_id,
            state.sequence,
        ))
    }

    /// Generates the next id, deferring by 1 ms while the current millisecond is exhausted.
    pub async fn next(&self) -> GeneratedId {
        loop {
            match self.poll_id() {
                Poll::Ready(id) => {
                    return GeneratedId {
                        id: id.encode(),
                        timestamp: id.unix_millis(self.epoch_ms) as i64,
                    };
                }
                Poll::Pending { retry_after } => {
                    tracing::trace!(
                        instance_id = self.instance_id,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Snowflake sequence exhausted, deferring"
                    );
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }

    pub fn is_overflowed(&self) -> bool {
        self.state.lock().map(|s| s.overflow).unwrap_or(false)
    }
}
