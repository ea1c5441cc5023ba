//! Runtime configuration for a provisioning run.
//!
//! Settings resolve in priority order: CLI flag, then environment variable,
//! then built-in default. Request payloads come from an optional JSON file
//! that may override any subset of the default bodies.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://admin.swaragh.com/api";
pub const DEFAULT_CACHE_PATH: &str = "data.json";
pub const BASE_URL_ENV: &str = "PROVISION_BASE_URL";
pub const CACHE_PATH_ENV: &str = "PROVISION_CACHE";

/// Request bodies for the stages whose payload is not derived from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payloads {
    pub organization: Value,
    pub project: Value,
    pub module: Value,
    /// One feature is created per entry.
    pub features: Vec<Value>,
    pub plan: Value,
    pub subscription: Value,
}

impl Default for Payloads {
    fn default() -> Self {
        Self {
            organization: json!({
                "name": "Google",
                "owner_keycloak_id": "keyClockUserId",
                "email": "gururaj.hr@swaragh.co.in",
                "phone": "9880699054",
                "description": "Every where we are.",
                "state": "active"
            }),
            project: json!({
                "name": "Project PMS",
                "short_name": "project",
                "sub_domain": "new-pro"
            }),
            module: json!({
                "name": "Porject managemane system python",
                "code": "pms_server",
                "description": "asset",
                "docker_container": "pms_noder",
                "port": "8088"
            }),
            features: vec![
                json!({ "name": "Python main cdn", "code": "py_main_cnd_new" }),
                json!({ "name": "another feature", "code": "another" }),
            ],
            plan: json!({
                "type": "bundle",
                "billing_cycle": "monthly",
                "price": "1400",
                "name": "all plans",
                "pause_days": "+40",
                "allow_trial": "True",
                "is_public": "True"
            }),
            subscription: json!({ "is_trial": "False" }),
        }
    }
}

/// Load a payload override file. Unlike the cache, a malformed file is an error.
pub fn load_payloads(path: &Path) -> Result<Payloads> {
    let bytes = fs::read(path).with_context(|| format!("read payloads {}", path.display()))?;
    let payloads: Payloads =
        serde_json::from_slice(&bytes).context("parse payloads JSON")?;
    validate_payloads(&payloads)?;
    Ok(payloads)
}

fn validate_payloads(payloads: &Payloads) -> Result<()> {
    let bodies = [
        ("organization", &payloads.organization),
        ("project", &payloads.project),
        ("module", &payloads.module),
        ("plan", &payloads.plan),
        ("subscription", &payloads.subscription),
    ];
    for (name, body) in bodies {
        if !body.is_object() {
            return Err(anyhow!("payload `{name}` must be a JSON object"));
        }
    }
    if let Some(index) = payloads.features.iter().position(|body| !body.is_object()) {
        return Err(anyhow!("payload `features[{index}]` must be a JSON object"));
    }
    Ok(())
}

/// Fully resolved settings for `provision run`.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub base_url: String,
    pub cache_path: PathBuf,
    pub payloads: Payloads,
}

impl ProvisionConfig {
    pub fn resolve(
        base_url: Option<&str>,
        cache_path: Option<&Path>,
        payloads_path: Option<&Path>,
    ) -> Result<Self> {
        let payloads = match payloads_path {
            Some(path) => load_payloads(path)?,
            None => Payloads::default(),
        };
        Ok(Self {
            base_url: resolve_base_url(base_url, std::env::var(BASE_URL_ENV).ok()),
            cache_path: resolve_cache_path(cache_path, std::env::var_os(CACHE_PATH_ENV)),
            payloads,
        })
    }
}

/// Pick the base URL from the flag, then the environment, then the default.
pub fn resolve_base_url(flag: Option<&str>, env: Option<String>) -> String {
    let chosen = flag
        .map(str::to_string)
        .or(env.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    chosen.trim().trim_end_matches('/').to_string()
}

pub fn resolve_cache_path(flag: Option<&Path>, env: Option<std::ffi::OsString>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or(env.filter(|value| !value.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH))
}
