//! Classified failures for the provisioning sequence.
//!
//! Cache-load problems never appear here: a missing or corrupt cache is
//! recovered by starting fresh. Everything below aborts the run.
use crate::stages::StageId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// An upstream stage has not produced the identifier this stage needs.
    #[error("{stage}: missing upstream field `{field}` (run earlier stages first)")]
    MissingUpstream { stage: StageId, field: String },

    #[error("POST {url} failed")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("POST {url} returned HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("response from {url} has no `{field}` field")]
    ResponseShape { url: String, field: String },

    #[error("write cache {}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    pub(crate) fn missing(stage: StageId, field: &str) -> Self {
        ProvisionError::MissingUpstream {
            stage,
            field: field.to_string(),
        }
    }

    pub(crate) fn shape(url: &str, field: &str) -> Self {
        ProvisionError::ResponseShape {
            url: url.to_string(),
            field: field.to_string(),
        }
    }
}
