//! On-disk cache of stage requests and responses.
//!
//! The cache is the only durable state: it records what each stage sent and
//! what the server answered, and a stage's status marker decides whether the
//! stage runs again. Loading is lenient. A missing or corrupt document starts
//! fresh, and a malformed field resets only that field, never a sibling
//! `data`. Keys this tool does not interpret are written back unchanged.
use crate::error::ProvisionError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Completion marker recorded alongside each stage result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    NotStarted,
    Completed,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::NotStarted => "not_started",
            StageStatus::Completed => "completed",
        }
    }
}

/// One stage's request and the `data` payload the server returned for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Absent on records written before status markers existed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub status: Option<StageStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Uninterpreted keys stored next to the stage result.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StageRecord {
    pub fn completed(url: String, body: Value, data: Value) -> Self {
        Self {
            status: Some(StageStatus::Completed),
            url: Some(url),
            body: Some(body),
            data: Some(data),
            extra: Map::new(),
        }
    }

    /// Effective status; unmarked records fall back to `data` truthiness.
    pub fn status(&self) -> StageStatus {
        match self.status {
            Some(status) => status,
            None if self.data.as_ref().is_some_and(is_truthy) => StageStatus::Completed,
            None => StageStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == StageStatus::Completed
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Replace this record with a fresh result, keeping uninterpreted keys.
    pub fn replace_with(&mut self, mut record: StageRecord) {
        record.extra = std::mem::take(&mut self.extra);
        *self = record;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationEntry {
    #[serde(flatten)]
    pub stage: StageRecord,
    #[serde(default, deserialize_with = "lenient")]
    pub subscription: SubscriptionEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    #[serde(flatten)]
    pub stage: StageRecord,
    #[serde(default, deserialize_with = "lenient")]
    pub payment: StageRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(flatten)]
    pub stage: StageRecord,
    #[serde(default, deserialize_with = "lenient_list")]
    pub modules: Vec<ProjectModuleEntry>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub versions: Vec<StageRecord>,
}

/// A module version attached to the project, plus the feature snapshots
/// the server reported once features were attached to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectModuleEntry {
    #[serde(flatten)]
    pub stage: StageRecord,
    #[serde(default, deserialize_with = "lenient_list")]
    pub features: Vec<StageRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    #[serde(flatten)]
    pub stage: StageRecord,
    #[serde(default, deserialize_with = "lenient_list")]
    pub features: Vec<StageRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    #[serde(flatten)]
    pub stage: StageRecord,
    #[serde(default, deserialize_with = "lenient_list")]
    pub projects: Vec<StageRecord>,
}

/// The whole cache document, keyed by top-level stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cache {
    pub organization: OrganizationEntry,
    pub project: ProjectEntry,
    pub module: ModuleEntry,
    pub plan: PlanEntry,
    /// Top-level keys that are not stages.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cache {
    /// Build a cache from an arbitrary JSON document without failing.
    pub fn from_document(document: Value) -> Self {
        let Value::Object(mut root) = document else {
            tracing::warn!("cache document is not an object; starting fresh");
            return Cache::default();
        };

        let mut organization = ensure_stage(&mut root, "organization");
        let mut subscription = ensure_stage(&mut organization, "subscription");
        let payment = ensure_stage(&mut subscription, "payment");

        let mut organization: OrganizationEntry = decode_entry("organization", organization);
        organization.subscription = SubscriptionEntry {
            stage: decode_entry("organization.subscription", subscription),
            payment: decode_entry("subscription.payment", payment),
        };
        let project = decode_entry("project", ensure_stage(&mut root, "project"));
        let module = decode_entry("module", ensure_stage(&mut root, "module"));
        let plan = decode_entry("plan", ensure_stage(&mut root, "plan"));

        Cache {
            organization,
            project,
            module,
            plan,
            extra: root,
        }
    }
}

/// Detach the sub-mapping at `key`, replacing anything that is not a mapping
/// with an empty one.
pub fn ensure_stage(parent: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match parent.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn decode_entry<T: DeserializeOwned + Default>(key: &str, map: Map<String, Value>) -> T {
    decode_or_default(key, Value::Object(map))
}

fn decode_or_default<T: DeserializeOwned + Default>(key: &str, value: Value) -> T {
    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!(field = key, error = %err, "malformed cache field; resetting");
            T::default()
        }
    }
}

/// Decode a field, falling back to its default instead of failing the
/// enclosing record.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decode_or_default(std::any::type_name::<T>(), value))
}

/// Decode a list element by element; a non-list becomes empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| decode_or_default(std::any::type_name::<T>(), item))
            .collect()),
        other => {
            tracing::warn!(found = %other, "expected a list in cache; resetting");
            Ok(Vec::new())
        }
    }
}

/// Load the cache, treating a missing or undecodable file as empty.
pub fn load_cache(path: &Path) -> Cache {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            if path.exists() {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read cache; starting fresh"
                );
            } else {
                tracing::debug!(path = %path.display(), "no cache file; starting fresh");
            }
            return Cache::default();
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(document) => Cache::from_document(document),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse cache; starting fresh"
            );
            Cache::default()
        }
    }
}

/// Rewrite the whole cache file in a stable pretty JSON format.
pub fn write_cache(path: &Path, cache: &Cache) -> Result<(), ProvisionError> {
    let write_err = |source: std::io::Error| ProvisionError::CacheWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let text = serde_json::to_string_pretty(cache).map_err(|err| write_err(err.into()))?;
    fs::write(path, text.as_bytes()).map_err(write_err)?;
    Ok(())
}

/// Truthiness as the original guards saw it: null, false, zero and empty
/// strings, lists or mappings do not count as a result.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
