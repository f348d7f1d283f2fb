//! Event payloads. Field names are serialized in camelCase and form a contract
//! that external tooling relies on.

use crate::constants::events;
use crate::error::ValidationErrors;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Fields shared by every schema-level event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEventFields {
    pub schema_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub id: String,
    #[serde(rename = "async")]
    pub is_async: bool,
}

impl BaseEventFields {
    pub fn new(schema_type: impl Into<String>, data: Value, id: impl Into<String>) -> Self {
        Self {
            schema_type: schema_type.into(),
            data,
            timestamp: Utc::now(),
            id: id.into(),
            is_async: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEvent {
    #[serde(flatten)]
    pub base: BaseEventFields,
    pub result: Value,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    #[serde(flatten)]
    pub base: BaseEventFields,
    pub error: ValidationErrors,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncStartEvent {
    #[serde(flatten)]
    pub base: BaseEventFields,
    pub refinement_id: String,
    pub debounced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncCompleteEvent {
    #[serde(flatten)]
    pub base: BaseEventFields,
    pub refinement_id: String,
    pub success: bool,
    pub duration: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEvent {
    #[serde(flatten)]
    pub base: BaseEventFields,
    pub cache_hit: bool,
    pub cache_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStartEvent {
    pub item_count: usize,
    pub max_concurrency: usize,
    pub batch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemEvent {
    pub batch_id: String,
    pub item_index: usize,
    pub item_id: Option<String>,
    pub success: bool,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCompleteEvent {
    pub batch_id: String,
    pub successful: usize,
    pub failed: usize,
    pub duration: u64,
    pub avg_item_duration: f64,
}

/// Every event the engine can emit, tagged by its published name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ValidationEvent {
    #[serde(rename = "validation:start")]
    Start(BaseEventFields),
    #[serde(rename = "validation:success")]
    Success(SuccessEvent),
    #[serde(rename = "validation:error")]
    Error(ErrorEvent),
    #[serde(rename = "async:start")]
    AsyncStart(AsyncStartEvent),
    #[serde(rename = "async:complete")]
    AsyncComplete(AsyncCompleteEvent),
    #[serde(rename = "cache")]
    Cache(CacheEvent),
    #[serde(rename = "batch:start")]
    BatchStart(BatchStartEvent),
    #[serde(rename = "batch:item")]
    BatchItem(BatchItemEvent),
    #[serde(rename = "batch:complete")]
    BatchComplete(BatchCompleteEvent),
}

impl ValidationEvent {
    /// Published name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ValidationEvent::Start(_) => events::VALIDATION_START,
            ValidationEvent::Success(_) => events::VALIDATION_SUCCESS,
            ValidationEvent::Error(_) => events::VALIDATION_ERROR,
            ValidationEvent::AsyncStart(_) => events::ASYNC_START,
            ValidationEvent::AsyncComplete(_) => events::ASYNC_COMPLETE,
            ValidationEvent::Cache(_) => events::CACHE,
            ValidationEvent::BatchStart(_) => events::BATCH_START,
            ValidationEvent::BatchItem(_) => events::BATCH_ITEM,
            ValidationEvent::BatchComplete(_) => events::BATCH_COMPLETE,
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
