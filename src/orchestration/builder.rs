//! # Challenge Build Orchestrator
//!
//! Top-level driver of the ingestion pipeline. Selects the challenge's data
//! source, fetches and possibly paginates it, drives format detection,
//! geometry extraction, name resolution, and materialization, and maintains
//! the challenge's build-status state machine.
//!
//! The entry point returns as soon as the challenge is flipped to
//! `Building`; the remainder runs on the configured executor. Every exit
//! path of the background job persists a terminal status — per-item errors
//! are caught at the unit of work and degrade the result to
//! `PartiallyLoaded`, while transport, capacity, and structural parse
//! errors end the build as `Failed` with the error text retained for
//! operator visibility. Processing within one run is strictly sequential,
//! and paginated sources are fetched one page at a time, deliberately,
//! to avoid bursting requests against third-party geodata services.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::formats;
use crate::geojson;
use crate::materializer::TaskMaterializer;
use crate::models::{BuildStatus, Challenge, CreationSource};
use crate::naming;
use crate::orchestration::executor::{BackgroundExecutor, BoxedJob};
use crate::orchestration::fetcher::RemoteFetcher;
use crate::orchestration::priority_pass::PriorityRecomputer;
use crate::overpass::{self, OverpassElement, OverpassResponse};
use crate::stores::{ChallengeStore, TaskStore};

/// What a rebuild request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The build was accepted and submitted to the executor
    Scheduled,
    /// The challenge has no data source configured; nothing to do
    NoSource,
    /// A build is already running for this challenge; request rejected
    AlreadyBuilding,
}

/// Terminal result of one build run
#[derive(Debug, Clone)]
struct BuildResult {
    status: BuildStatus,
    message: Option<String>,
}

impl BuildResult {
    fn ready() -> Self {
        Self {
            status: BuildStatus::Ready,
            message: None,
        }
    }

    fn from_failures(total: usize, failures: usize, unit: &str) -> Self {
        if failures == 0 {
            Self::ready()
        } else {
            Self {
                status: BuildStatus::PartiallyLoaded,
                message: Some(format!("{failures} of {total} {unit} failed to load")),
            }
        }
    }
}

/// Drives challenge builds end to end
#[derive(Clone)]
pub struct ChallengeBuildOrchestrator {
    config: PipelineConfig,
    challenge_store: Arc<dyn ChallengeStore>,
    task_store: Arc<dyn TaskStore>,
    fetcher: Arc<dyn RemoteFetcher>,
    executor: Arc<dyn BackgroundExecutor>,
    materializer: TaskMaterializer,
}

impl ChallengeBuildOrchestrator {
    pub fn new(
        config: PipelineConfig,
        challenge_store: Arc<dyn ChallengeStore>,
        task_store: Arc<dyn TaskStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        executor: Arc<dyn BackgroundExecutor>,
    ) -> Self {
        let materializer =
            TaskMaterializer::new(task_store.clone(), config.max_tasks_per_challenge);
        Self {
            config,
            challenge_store,
            task_store,
            fetcher,
            executor,
            materializer,
        }
    }

    /// Request a rebuild of the challenge's tasks.
    ///
    /// Flips the challenge to `Building` and submits the remainder of the
    /// build to the executor, returning immediately. A challenge already
    /// in `Building` is rejected rather than interleaved. With
    /// `replace_existing`, previously materialized but incomplete tasks
    /// are removed before ingestion begins.
    pub async fn rebuild_tasks(
        &self,
        challenge_id: i64,
        replace_existing: bool,
    ) -> Result<RebuildOutcome> {
        let challenge = self
            .challenge_store
            .get(challenge_id)
            .await?
            .ok_or_else(|| PipelineError::Store(format!("unknown challenge id {challenge_id}")))?;

        if challenge.build_status.is_building() {
            warn!(
                "challenge {}: rebuild requested while a build is already running, rejecting",
                challenge_id
            );
            return Ok(RebuildOutcome::AlreadyBuilding);
        }

        let Some(source) = challenge.creation_source.clone() else {
            debug!(
                "challenge {}: no data source configured, rebuild is a no-op",
                challenge_id
            );
            return Ok(RebuildOutcome::NoSource);
        };

        self.challenge_store
            .update_status(challenge_id, BuildStatus::Building, None)
            .await?;

        let orchestrator = self.clone();
        let job: BoxedJob = Box::pin(async move {
            orchestrator
                .run_build(challenge, source, replace_existing)
                .await;
        });
        self.executor.submit(job).await;

        Ok(RebuildOutcome::Scheduled)
    }

    /// Body of the background build. Never lets an error escape: every
    /// exit writes a terminal status or logs the store failure that
    /// prevented it.
    async fn run_build(
        &self,
        challenge: Challenge,
        source: CreationSource,
        replace_existing: bool,
    ) {
        info!(
            "challenge {}: starting task build from {}",
            challenge.id,
            source_label(&source)
        );

        if replace_existing {
            match self.task_store.remove_incomplete_tasks(challenge.id).await {
                Ok(removed) => {
                    info!(
                        "challenge {}: removed {} incomplete tasks before rebuild",
                        challenge.id, removed
                    );
                }
                Err(error) => {
                    error!(
                        "challenge {}: failed to remove incomplete tasks: {}",
                        challenge.id, error
                    );
                    self.finalize_failed(challenge.id, &error).await;
                    return;
                }
            }
        }

        let outcome = match &source {
            CreationSource::OverpassQuery(query) => {
                self.build_from_overpass(&challenge, query).await
            }
            CreationSource::RemoteGeoJson(url) => self.build_from_remote(&challenge, url).await,
            CreationSource::InlineGeoJson(payload) => {
                self.build_from_payload(&challenge, payload).await
            }
        };

        match outcome {
            Ok(result) => {
                info!(
                    "challenge {}: build finished with status {}",
                    challenge.id, result.status
                );
                if let Err(error) = self
                    .challenge_store
                    .update_status(challenge.id, result.status, result.message)
                    .await
                {
                    error!(
                        "challenge {}: failed to persist terminal status: {}",
                        challenge.id, error
                    );
                    return;
                }
                if let Err(error) = self
                    .challenge_store
                    .mark_tasks_refreshed(challenge.id, false)
                    .await
                {
                    error!(
                        "challenge {}: failed to mark tasks refreshed: {}",
                        challenge.id, error
                    );
                }

                let recomputer = PriorityRecomputer::new(
                    self.task_store.clone(),
                    self.config.priority_batch_size,
                );
                if let Err(error) = recomputer.recompute(&challenge).await {
                    // Classification failures never alter the build status
                    error!(
                        "challenge {}: priority recomputation failed: {}",
                        challenge.id, error
                    );
                }
            }
            Err(error) => {
                error!("challenge {}: build failed: {}", challenge.id, error);
                self.finalize_failed(challenge.id, &error).await;
            }
        }
    }

    async fn finalize_failed(&self, challenge_id: i64, error: &PipelineError) {
        if let Err(store_error) = self
            .challenge_store
            .update_status(challenge_id, BuildStatus::Failed, Some(error.to_string()))
            .await
        {
            error!(
                "challenge {}: failed to persist Failed status: {}",
                challenge_id, store_error
            );
        }
    }

    /// Overpass path: rewrite the query, post it to the provider, and
    /// process each returned element.
    async fn build_from_overpass(
        &self,
        challenge: &Challenge,
        raw_query: &str,
    ) -> Result<BuildResult> {
        let (query, timeout_secs) =
            overpass::prepare_query(raw_query, self.config.default_request_timeout_secs);
        let payload = self
            .fetcher
            .post_form(
                &self.config.overpass_provider_url,
                &[("data", query.as_str())],
                Duration::from_secs(timeout_secs),
            )
            .await?;

        if !payload.is_success() {
            return Err(PipelineError::Transport(format!(
                "Overpass request failed with status {}",
                payload.status
            )));
        }
        if let Some(content_type) = &payload.content_type {
            if !content_type.starts_with("application/json") {
                return Err(PipelineError::Transport(format!(
                    "Overpass returned content type '{content_type}' instead of \
                     application/json; check the query for an [out:xml] or [out:csv] directive"
                )));
            }
        }

        let response: OverpassResponse = serde_json::from_str(&payload.body)?;
        self.materializer
            .check_capacity(challenge.id, response.elements.len())
            .await?;

        let total = response.elements.len();
        let mut failures = 0;
        for element in &response.elements {
            // A mismatched element type fails the whole batch, not just
            // the element
            if let Some(target) = challenge.overpass_target_type {
                if element.element_type != target.as_str() {
                    return Err(PipelineError::Parse(format!(
                        "expected only {target} elements but the response contains \
                         a '{}' element",
                        element.element_type
                    )));
                }
            }
            if let Err(error) = self.process_element(challenge, element).await {
                failures += 1;
                warn!(
                    "challenge {}: failed to process element {:?}: {}",
                    challenge.id, element.id, error
                );
            }
        }

        Ok(BuildResult::from_failures(total, failures, "elements"))
    }

    async fn process_element(
        &self,
        challenge: &Challenge,
        element: &OverpassElement,
    ) -> Result<()> {
        let geometry = overpass::extract_geometry(element).ok_or_else(|| {
            PipelineError::Geometry(format!(
                "element {:?} of type '{}' has no usable geometry",
                element.id, element.element_type
            ))
        })?;
        let candidate = element.to_candidate();
        let name = naming::resolve_name(&candidate, challenge);
        let properties = geojson::flatten_properties(&candidate);
        self.materializer
            .materialize(&name, &geometry, &properties, challenge.id)
            .await?;
        Ok(())
    }

    /// Remote GeoJSON path: a URL with the page placeholder is paginated,
    /// anything else is fetched once.
    async fn build_from_remote(&self, challenge: &Challenge, url: &str) -> Result<BuildResult> {
        let timeout = Duration::from_secs(self.config.default_request_timeout_secs);

        if url.contains(&self.config.page_placeholder) {
            return self.build_paginated(challenge, url, timeout).await;
        }

        let payload = self.fetcher.get(url, timeout).await?;
        if !payload.is_success() {
            return Err(PipelineError::Transport(format!(
                "fetching '{url}' failed with status {}",
                payload.status
            )));
        }
        self.build_from_payload(challenge, &payload.body).await
    }

    /// Sequential pagination: page N+1 is fetched only after page N is
    /// fully processed. A failed fetch on page 1 is a hard failure; a
    /// failed fetch on any later page is indistinguishable from "no more
    /// pages" and finalizes the build with what was loaded so far.
    async fn build_paginated(
        &self,
        challenge: &Challenge,
        template: &str,
        timeout: Duration,
    ) -> Result<BuildResult> {
        let mut page = 1usize;
        let mut worst_status = BuildStatus::Ready;
        let mut messages: Vec<String> = Vec::new();

        loop {
            let url = template.replace(&self.config.page_placeholder, &page.to_string());
            let fetched = match self.fetcher.get(&url, timeout).await {
                Ok(payload) if payload.is_success() => Ok(payload),
                Ok(payload) => Err(PipelineError::Transport(format!(
                    "fetching page {page} failed with status {}",
                    payload.status
                ))),
                Err(error) => Err(error),
            };

            match fetched {
                Ok(payload) => {
                    if payload.body.trim().is_empty() {
                        debug!(
                            "challenge {}: page {} is empty, ending pagination",
                            challenge.id, page
                        );
                        break;
                    }
                    // Capacity errors on later pages propagate and abort
                    // the remaining pagination
                    let result = self.build_from_payload(challenge, &payload.body).await?;
                    if result.status == BuildStatus::PartiallyLoaded {
                        worst_status = BuildStatus::PartiallyLoaded;
                        if let Some(message) = result.message {
                            messages.push(format!("page {page}: {message}"));
                        }
                    }
                    page += 1;
                }
                Err(error) if page == 1 => return Err(error),
                Err(error) => {
                    info!(
                        "challenge {}: page {} fetch failed ({}), treating as end of pagination",
                        challenge.id, page, error
                    );
                    break;
                }
            }
        }

        Ok(BuildResult {
            status: worst_status,
            message: if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            },
        })
    }

    /// GeoJSON payload path: line-delimited payloads are processed line by
    /// line, a standard document as one batch.
    async fn build_from_payload(&self, challenge: &Challenge, raw: &str) -> Result<BuildResult> {
        if formats::classify(raw).is_line_delimited() {
            self.build_from_lines(challenge, raw).await
        } else {
            self.build_from_document(challenge, raw).await
        }
    }

    /// Each non-empty line is one candidate task. A line that fails to
    /// parse is recorded by its 0-based index without aborting the rest.
    async fn build_from_lines(&self, challenge: &Challenge, raw: &str) -> Result<BuildResult> {
        let lines: Vec<(usize, &str)> = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();
        self.materializer
            .check_capacity(challenge.id, lines.len())
            .await?;

        let mut failed_indices: Vec<usize> = Vec::new();
        for (index, line) in lines {
            let normalized = formats::strip_record_separators(line);
            match serde_json::from_str::<Value>(normalized) {
                Ok(document) => {
                    if let Err(error) = self.materialize_document(challenge, &document).await {
                        warn!(
                            "challenge {}: failed to materialize line {}: {}",
                            challenge.id, index, error
                        );
                        failed_indices.push(index);
                    }
                }
                Err(error) => {
                    warn!(
                        "challenge {}: line {} is not valid JSON: {}",
                        challenge.id, index, error
                    );
                    failed_indices.push(index);
                }
            }
        }

        if failed_indices.is_empty() {
            Ok(BuildResult::ready())
        } else {
            let indices = failed_indices
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            Ok(BuildResult {
                status: BuildStatus::PartiallyLoaded,
                message: Some(format!("failed to load line indices: {indices}")),
            })
        }
    }

    /// A standard document: a FeatureCollection becomes one task per
    /// feature, anything else becomes a single task.
    async fn build_from_document(&self, challenge: &Challenge, raw: &str) -> Result<BuildResult> {
        let document: Value = serde_json::from_str(raw)?;

        let Some(features) = document.get("features").and_then(Value::as_array) else {
            self.materializer.check_capacity(challenge.id, 1).await?;
            self.materialize_document(challenge, &document).await?;
            return Ok(BuildResult::ready());
        };

        self.materializer
            .check_capacity(challenge.id, features.len())
            .await?;

        let total = features.len();
        let mut failures = 0;
        for feature in features {
            if let Err(error) = self.materialize_feature(challenge, feature).await {
                failures += 1;
                warn!(
                    "challenge {}: failed to materialize feature: {}",
                    challenge.id, error
                );
            }
        }

        Ok(BuildResult::from_failures(total, failures, "features"))
    }

    /// One document (Feature or FeatureCollection) as one task
    async fn materialize_document(&self, challenge: &Challenge, document: &Value) -> Result<()> {
        let name = naming::resolve_name(document, challenge);
        self.materializer
            .materialize_single(&name, document, challenge.id)
            .await?;
        Ok(())
    }

    /// One feature out of a collection as one task
    async fn materialize_feature(&self, challenge: &Challenge, feature: &Value) -> Result<()> {
        let geometry = feature
            .get("geometry")
            .filter(|geometry| !geometry.is_null())
            .ok_or_else(|| PipelineError::Geometry("feature has no geometry".to_string()))?;
        let name = naming::resolve_name(feature, challenge);
        let properties = geojson::flatten_properties(feature);
        self.materializer
            .materialize(&name, geometry, &properties, challenge.id)
            .await?;
        Ok(())
    }
}

fn source_label(source: &CreationSource) -> &'static str {
    match source {
        CreationSource::OverpassQuery(_) => "an Overpass query",
        CreationSource::RemoteGeoJson(_) => "a remote GeoJSON source",
        CreationSource::InlineGeoJson(_) => "an uploaded GeoJSON payload",
    }
}
