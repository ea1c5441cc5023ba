//! The idempotent provisioning sequence.
//!
//! Stages run strictly in order. Each one is skipped when its cached record
//! is already complete; otherwise its request is built from upstream
//! identifiers, sent, and stored. The whole cache is rewritten after every
//! stage attempt that does not fail, so an aborted run resumes at the stage
//! that failed.
use crate::cache::{write_cache, Cache, StageRecord};
use crate::client::Transport;
use crate::config::{Payloads, ProvisionConfig};
use crate::error::ProvisionError;
use crate::stages::{self, StageId, StageRequest};
use serde_json::Value;
use std::path::PathBuf;

/// Walks the fixed stage list against one transport and one cache file.
pub struct Sequencer<T> {
    transport: T,
    base_url: String,
    cache_path: PathBuf,
    payloads: Payloads,
    performed: Vec<StageId>,
    skipped: Vec<StageId>,
}

impl<T: Transport> Sequencer<T> {
    pub fn new(transport: T, config: ProvisionConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url,
            cache_path: config.cache_path,
            payloads: config.payloads,
            performed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Stages whose network call was made during this run, in order.
    pub fn performed(&self) -> &[StageId] {
        &self.performed
    }

    /// Stages skipped because their cached record was already complete.
    pub fn skipped(&self) -> &[StageId] {
        &self.skipped
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Run every stage in order, threading the cache through each one.
    pub fn run(&mut self, cache: Cache) -> Result<Cache, ProvisionError> {
        let cache = self.perform_if_absent(cache, StageId::Organization, |_, payloads| {
            Ok(stages::organization(payloads))
        })?;
        let cache = self.perform_if_absent(cache, StageId::Project, |_, payloads| {
            Ok(stages::project(payloads))
        })?;
        let mut cache = self.perform_if_absent(cache, StageId::Module, |_, payloads| {
            Ok(stages::module(payloads))
        })?;
        for index in 0..self.payloads.features.len() {
            let stage = StageId::ModuleFeature(index);
            cache = self.perform_if_absent(cache, stage, |cache, payloads| {
                stages::module_feature(cache, index, &payloads.features[index])
            })?;
        }
        let cache = self.perform_if_absent(cache, StageId::ProjectModule, |cache, _| {
            stages::project_module(cache)
        })?;
        let cache = self.attach_project_module_features(cache)?;
        let cache = self.perform_if_absent(cache, StageId::Plan, |_, payloads| {
            Ok(stages::plan(payloads))
        })?;
        let cache = self.perform_if_absent(cache, StageId::PlanProjects, |cache, _| {
            stages::plan_projects(cache)
        })?;
        let cache = self.perform_if_absent(cache, StageId::Subscription, |cache, payloads| {
            stages::subscription(cache, payloads)
        })?;
        self.perform_if_absent(cache, StageId::Payment, |cache, _| stages::payment(cache))
    }

    /// Send the stage's request unless its record is already complete, then
    /// persist the cache either way.
    pub fn perform_if_absent<F>(
        &mut self,
        mut cache: Cache,
        stage: StageId,
        build: F,
    ) -> Result<Cache, ProvisionError>
    where
        F: FnOnce(&Cache, &Payloads) -> Result<StageRequest, ProvisionError>,
    {
        if is_complete(&cache, stage) {
            self.skip(stage);
        } else {
            let request = build(&cache, &self.payloads)?;
            let record = self.call(&request)?;
            cache.record_mut(stage).replace_with(record);
        }
        self.persist(&cache)?;
        Ok(cache)
    }

    /// Attaching features answers with the whole project; the stored record
    /// keeps only `project.version`, and each feature snapshot is recorded
    /// under the attached module.
    fn attach_project_module_features(
        &mut self,
        mut cache: Cache,
    ) -> Result<Cache, ProvisionError> {
        let stage = StageId::ProjectModuleFeatures;
        if is_complete(&cache, stage) {
            self.skip(stage);
            self.persist(&cache)?;
            return Ok(cache);
        }
        let request = stages::project_module_features(&cache)?;
        let record = self.call(&request)?;
        let url = record.url.clone().unwrap_or_default();
        let version = record
            .data()
            .and_then(|data| data.pointer("/project/version"))
            .cloned()
            .ok_or_else(|| ProvisionError::shape(&url, "project.version"))?;
        let snapshots = version
            .pointer("/snapshot_modules/0/snapshot_module_features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        tracing::debug!(snapshots = snapshots.len(), "project module features attached");

        if let Some(attached) = cache.project.modules.first_mut() {
            attached.features = snapshots
                .into_iter()
                .map(|feature| StageRecord::completed(url.clone(), request.body.clone(), feature))
                .collect();
        }
        cache
            .record_mut(stage)
            .replace_with(StageRecord::completed(url, request.body, version));
        self.persist(&cache)?;
        Ok(cache)
    }

    fn call(&mut self, request: &StageRequest) -> Result<StageRecord, ProvisionError> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!(stage = %request.stage, url = %url, "sending stage request");
        let mut response = self.transport.post_json(&url, &request.body)?;
        let data = response
            .as_object_mut()
            .and_then(|envelope| envelope.remove("data"))
            .ok_or_else(|| ProvisionError::shape(&url, "data"))?;
        self.performed.push(request.stage);
        Ok(StageRecord::completed(url, request.body.clone(), data))
    }

    fn skip(&mut self, stage: StageId) {
        tracing::info!(stage = %stage, "already completed; skipping");
        self.skipped.push(stage);
    }

    fn persist(&self, cache: &Cache) -> Result<(), ProvisionError> {
        write_cache(&self.cache_path, cache)
    }
}

/// Read-only guard: a stage without a record slot yet is not complete.
fn is_complete(cache: &Cache, stage: StageId) -> bool {
    cache.record(stage).is_some_and(StageRecord::is_complete)
}
