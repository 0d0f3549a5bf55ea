/// Jobs are identified by random (v4) UUIDs.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Free-form JSON object (parameter bags, metadata).
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
