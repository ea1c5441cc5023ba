//! Read-only stage summary for a cache file.
//!
//! Status never touches the network. It loads the cache the same lenient way
//! a run does and reports, per stage, whether the stage is complete and which
//! identifier the server assigned to it.
//!
//! ```text
//! StatusSummary
//! ├── decision: complete | incomplete
//! ├── next_stage: first stage that has not completed
//! └── stages: [StageSummary, ...]
//! ```
use crate::cache::{Cache, StageStatus};
use crate::stages::{self, StageId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<String>,
    pub stages: Vec<StageSummary>,
}

/// Summarize every stage a run with `feature_count` features would walk.
pub fn build_status_summary(cache: &Cache, feature_count: usize) -> StatusSummary {
    let stages: Vec<StageSummary> = stages::sequence(feature_count)
        .into_iter()
        .map(|stage| stage_summary(cache, stage))
        .collect();
    let next_stage = stages
        .iter()
        .find(|summary| summary.status != StageStatus::Completed)
        .map(|summary| summary.stage.clone());
    StatusSummary {
        decision: if next_stage.is_none() {
            Decision::Complete
        } else {
            Decision::Incomplete
        },
        next_stage,
        stages,
    }
}

fn stage_summary(cache: &Cache, stage: StageId) -> StageSummary {
    let record = cache.record(stage);
    StageSummary {
        stage: stage.to_string(),
        status: record.map_or(StageStatus::NotStarted, |record| record.status()),
        id: record
            .and_then(|record| record.data())
            .and_then(|data| data.get("id"))
            .and_then(|id| match id {
                serde_json::Value::String(text) => Some(text.clone()),
                serde_json::Value::Number(number) => Some(number.to_string()),
                _ => None,
            }),
        url: record.and_then(|record| record.url.clone()),
    }
}

/// Render the summary as aligned text lines for terminals.
pub fn render_text(summary: &StatusSummary) -> String {
    let width = summary
        .stages
        .iter()
        .map(|stage| stage.stage.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for stage in &summary.stages {
        out.push_str(&format!(
            "{:<width$}  {:<11}",
            stage.stage,
            stage.status.as_str(),
        ));
        if let Some(id) = &stage.id {
            out.push_str(&format!("  id={id}"));
        }
        out.push('\n');
    }
    match &summary.next_stage {
        Some(next) => out.push_str(&format!("next: {next}\n")),
        None => out.push_str("all stages complete\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StageRecord;
    use serde_json::json;

    #[test]
    fn empty_cache_is_incomplete_at_organization() {
        let summary = build_status_summary(&Cache::default(), 2);
        assert_eq!(summary.decision, Decision::Incomplete);
        assert_eq!(summary.next_stage.as_deref(), Some("organization"));
        assert_eq!(summary.stages.len(), 11);
        assert!(summary
            .stages
            .iter()
            .all(|stage| stage.status == StageStatus::NotStarted));
    }

    #[test]
    fn next_stage_points_past_completed_prefix() {
        let mut cache = Cache::default();
        cache.organization.stage =
            StageRecord::completed("u".into(), json!({}), json!({"id": 17}));
        cache.project.stage =
            StageRecord::completed("u".into(), json!({}), json!({"id": "proj-1"}));
        let summary = build_status_summary(&cache, 2);
        assert_eq!(summary.next_stage.as_deref(), Some("module"));
        assert_eq!(summary.stages[0].id.as_deref(), Some("17"));
        assert_eq!(summary.stages[1].id.as_deref(), Some("proj-1"));

        let text = render_text(&summary);
        assert!(text.contains("id=proj-1"));
        assert!(text.ends_with("next: module\n"));
    }

    #[test]
    fn json_summary_uses_snake_case_statuses() {
        let value = serde_json::to_value(build_status_summary(&Cache::default(), 0))
            .expect("serialize summary");
        assert_eq!(value["decision"], json!("incomplete"));
        assert_eq!(value["stages"][0]["status"], json!("not_started"));
        assert!(value["stages"][0].get("id").is_none());
    }
}
