//! Upload manifest written by the media pipeline.
//!
//! The item schema belongs to the pipeline and its uploaders. The watcher only
//! counts items, so they are kept as raw JSON and any JSON object is a readable
//! manifest. Producers build items with [`UploadItem`].

use schemars::JsonSchema;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One short ready for publishing, as this crate's producers write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadItem {
    /// Path to the rendered video file
    pub path: String,
    /// Title / caption
    #[serde(default)]
    pub title: String,
    /// Hashtags without the leading `#`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Platform-specific metadata owned by the pipeline
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UploadItem {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `success` is informational: anything but an explicit `false` counts as true.
fn lenient_success<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(!matches!(Value::deserialize(deserializer)?, Value::Bool(false)))
}

fn default_success() -> bool {
    true
}

/// Items are opaque. `null` is an empty batch; a lone non-array value is one item.
fn lenient_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Producer-reported count; dropped unless it is a non-negative integer.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_u64())
}

/// A batch of shorts pending upload to one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    /// Whether the producing pipeline run succeeded
    #[serde(default = "default_success", deserialize_with = "lenient_success")]
    #[schemars(with = "Option<bool>")]
    pub success: bool,
    /// Items in upload order, as written by the pipeline
    #[serde(default, alias = "items", deserialize_with = "lenient_items")]
    #[schemars(with = "Vec<Value>")]
    pub shorts: Vec<Value>,
    /// Count reported by the producer (informational)
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<u64>")]
    pub shorts_count: Option<u64>,
    /// Remaining pipeline metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Manifest {
    /// Create a successful manifest from a list of items.
    pub fn new(items: Vec<UploadItem>) -> Self {
        let shorts: Vec<Value> = items.into_iter().map(UploadItem::into_value).collect();
        Self {
            success: true,
            shorts_count: Some(shorts.len() as u64),
            shorts,
            extra: Map::new(),
        }
    }

    /// Number of items in the batch.
    pub fn item_count(&self) -> usize {
        self.shorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shorts.is_empty()
    }

    /// Parse a manifest from raw JSON bytes.
    ///
    /// Fails only when the bytes are not JSON or the top level is not an object.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        match serde_json::from_slice::<Value>(bytes)? {
            value @ Value::Object(_) => serde_json::from_value(value),
            other => Err(de::Error::custom(format!(
                "manifest must be a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
