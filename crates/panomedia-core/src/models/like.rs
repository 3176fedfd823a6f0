use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's like of a media record; unique per `(media_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub media_id: String,
    pub user_id: String,
    pub created: DateTime<Utc>,
}
