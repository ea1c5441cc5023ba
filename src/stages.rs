//! Stage identifiers and the typed request builder for each stage.
//!
//! Builders read upstream identifiers out of the cache and fail with
//! [`ProvisionError::MissingUpstream`] before any request is sent when one is
//! absent.
use crate::cache::{Cache, StageRecord};
use crate::config::Payloads;
use crate::error::ProvisionError;
use serde_json::{json, Value};
use std::fmt;

/// Every network call the sequence can make, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    Organization,
    Project,
    Module,
    ModuleFeature(usize),
    ProjectModule,
    ProjectModuleFeatures,
    Plan,
    PlanProjects,
    Subscription,
    Payment,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageId::Organization => f.write_str("organization"),
            StageId::Project => f.write_str("project"),
            StageId::Module => f.write_str("module"),
            StageId::ModuleFeature(index) => write!(f, "module.features[{index}]"),
            StageId::ProjectModule => f.write_str("project.modules[0]"),
            StageId::ProjectModuleFeatures => f.write_str("project.versions[0]"),
            StageId::Plan => f.write_str("plan"),
            StageId::PlanProjects => f.write_str("plan.projects[0]"),
            StageId::Subscription => f.write_str("organization.subscription"),
            StageId::Payment => f.write_str("subscription.payment"),
        }
    }
}

/// The full stage list for a run creating `feature_count` module features.
pub fn sequence(feature_count: usize) -> Vec<StageId> {
    let mut stages = vec![StageId::Organization, StageId::Project, StageId::Module];
    stages.extend((0..feature_count).map(StageId::ModuleFeature));
    stages.extend([
        StageId::ProjectModule,
        StageId::ProjectModuleFeatures,
        StageId::Plan,
        StageId::PlanProjects,
        StageId::Subscription,
        StageId::Payment,
    ]);
    stages
}

impl Cache {
    /// The record a stage's result is stored in, if it exists yet.
    pub fn record(&self, stage: StageId) -> Option<&StageRecord> {
        match stage {
            StageId::Organization => Some(&self.organization.stage),
            StageId::Project => Some(&self.project.stage),
            StageId::Module => Some(&self.module.stage),
            StageId::ModuleFeature(index) => self.module.features.get(index),
            StageId::ProjectModule => self.project.modules.first().map(|entry| &entry.stage),
            StageId::ProjectModuleFeatures => self.project.versions.first(),
            StageId::Plan => Some(&self.plan.stage),
            StageId::PlanProjects => self.plan.projects.first(),
            StageId::Subscription => Some(&self.organization.subscription.stage),
            StageId::Payment => Some(&self.organization.subscription.payment),
        }
    }

    /// The record for a stage, growing list slots as needed.
    pub fn record_mut(&mut self, stage: StageId) -> &mut StageRecord {
        match stage {
            StageId::Organization => &mut self.organization.stage,
            StageId::Project => &mut self.project.stage,
            StageId::Module => &mut self.module.stage,
            StageId::ModuleFeature(index) => slot(&mut self.module.features, index),
            StageId::ProjectModule => &mut slot(&mut self.project.modules, 0).stage,
            StageId::ProjectModuleFeatures => slot(&mut self.project.versions, 0),
            StageId::Plan => &mut self.plan.stage,
            StageId::PlanProjects => slot(&mut self.plan.projects, 0),
            StageId::Subscription => &mut self.organization.subscription.stage,
            StageId::Payment => &mut self.organization.subscription.payment,
        }
    }
}

fn slot<T: Default>(items: &mut Vec<T>, index: usize) -> &mut T {
    if items.len() <= index {
        items.resize_with(index + 1, T::default);
    }
    &mut items[index]
}

/// A fully-resolved request: path relative to the base URL plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRequest {
    pub stage: StageId,
    pub path: String,
    pub body: Value,
}

impl StageRequest {
    fn new(stage: StageId, path: impl Into<String>, body: Value) -> Self {
        Self {
            stage,
            path: path.into(),
            body,
        }
    }
}

pub fn organization(payloads: &Payloads) -> StageRequest {
    StageRequest::new(
        StageId::Organization,
        "/organizations",
        payloads.organization.clone(),
    )
}

pub fn project(payloads: &Payloads) -> StageRequest {
    StageRequest::new(StageId::Project, "/project", payloads.project.clone())
}

pub fn module(payloads: &Payloads) -> StageRequest {
    StageRequest::new(StageId::Module, "/modules", payloads.module.clone())
}

pub fn module_feature(
    cache: &Cache,
    index: usize,
    body: &Value,
) -> Result<StageRequest, ProvisionError> {
    let stage = StageId::ModuleFeature(index);
    let version_id = upstream_id(
        stage,
        &cache.module.stage,
        "/version/id",
        "module.data.version.id",
    )?;
    Ok(StageRequest::new(
        stage,
        format!("/module/{}/feature", path_segment(version_id)),
        body.clone(),
    ))
}

pub fn project_module(cache: &Cache) -> Result<StageRequest, ProvisionError> {
    let stage = StageId::ProjectModule;
    let project_id = upstream_id(stage, &cache.project.stage, "/id", "project.data.id")?;
    let version_id = upstream_id(
        stage,
        &cache.module.stage,
        "/version/id",
        "module.data.version.id",
    )?;
    Ok(StageRequest::new(
        stage,
        format!("/project/{}/versions/modules", path_segment(project_id)),
        json!({ "module_version_ids": [version_id] }),
    ))
}

pub fn project_module_features(cache: &Cache) -> Result<StageRequest, ProvisionError> {
    let stage = StageId::ProjectModuleFeatures;
    let project_id = upstream_id(stage, &cache.project.stage, "/id", "project.data.id")?;
    let attached = cache
        .project
        .modules
        .first()
        .ok_or_else(|| ProvisionError::missing(stage, "project.modules[0]"))?;
    let module_version_id =
        upstream_id(stage, &attached.stage, "/id", "project.modules[0].data.id")?;
    let feature_ids = cache
        .module
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let field = format!("module.features[{index}].data.id");
            upstream_id(stage, feature, "/id", &field).cloned()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StageRequest::new(
        stage,
        format!(
            "/project/{}/versions/module/{}/features",
            path_segment(project_id),
            path_segment(module_version_id)
        ),
        json!({ "feature_ids": feature_ids }),
    ))
}

pub fn plan(payloads: &Payloads) -> StageRequest {
    StageRequest::new(StageId::Plan, "/plan", payloads.plan.clone())
}

pub fn plan_projects(cache: &Cache) -> Result<StageRequest, ProvisionError> {
    let stage = StageId::PlanProjects;
    let plan_id = upstream_id(stage, &cache.plan.stage, "/id", "plan.data.id")?;
    let version = cache
        .project
        .versions
        .first()
        .ok_or_else(|| ProvisionError::missing(stage, "project.versions[0]"))?;
    let version_id = upstream_id(stage, version, "/id", "project.versions[0].data.id")?;
    Ok(StageRequest::new(
        stage,
        format!("/plan/{}/projects", path_segment(plan_id)),
        json!({ "project_version_ids": [version_id] }),
    ))
}

pub fn subscription(cache: &Cache, payloads: &Payloads) -> Result<StageRequest, ProvisionError> {
    let stage = StageId::Subscription;
    let organization_id = upstream_id(
        stage,
        &cache.organization.stage,
        "/id",
        "organization.data.id",
    )?;
    let plan_id = upstream_id(stage, &cache.plan.stage, "/id", "plan.data.id")?;
    Ok(StageRequest::new(
        stage,
        format!(
            "/subscription/{}/plan/{}",
            path_segment(organization_id),
            path_segment(plan_id)
        ),
        payloads.subscription.clone(),
    ))
}

pub fn payment(cache: &Cache) -> Result<StageRequest, ProvisionError> {
    let stage = StageId::Payment;
    let invoice_id = upstream_id(
        stage,
        &cache.organization.subscription.stage,
        "/invoice/id",
        "organization.subscription.data.invoice.id",
    )?;
    Ok(StageRequest::new(
        stage,
        format!("/payment/{}", path_segment(invoice_id)),
        json!({}),
    ))
}

/// Look up an identifier inside a record's `data`. Only non-empty strings
/// and numbers count as identifiers.
fn upstream_id<'a>(
    stage: StageId,
    record: &'a StageRecord,
    pointer: &str,
    field: &str,
) -> Result<&'a Value, ProvisionError> {
    record
        .data()
        .and_then(|data| data.pointer(pointer))
        .filter(|id| match id {
            Value::String(text) => !text.is_empty(),
            Value::Number(_) => true,
            _ => false,
        })
        .ok_or_else(|| ProvisionError::missing(stage, field))
}

fn path_segment(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
