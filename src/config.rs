use crate::error::{PipelineError, Result};

/// Configuration consumed by the ingestion pipeline.
///
/// Passed into the orchestrator's constructor as an explicit value object so
/// tests can vary caps and timeouts without touching process state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hard cap on the number of tasks a single challenge may hold
    pub max_tasks_per_challenge: usize,
    /// Request timeout applied when the source does not carry its own hint
    pub default_request_timeout_secs: u64,
    /// Overpass interpreter endpoint queries are posted to
    pub overpass_provider_url: String,
    /// Page size used by the priority recomputation pass
    pub priority_batch_size: usize,
    /// Token in a remote GeoJSON URL that marks it as paginated
    pub page_placeholder: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_challenge: 50_000,
            default_request_timeout_secs: 120,
            overpass_provider_url: "https://overpass-api.de/api/interpreter".to_string(),
            priority_batch_size: 50,
            page_placeholder: "{page}".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(max_tasks) = std::env::var("PIPELINE_MAX_TASKS_PER_CHALLENGE") {
            config.max_tasks_per_challenge = max_tasks.parse().map_err(|e| {
                PipelineError::Configuration(format!("Invalid max_tasks_per_challenge: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("PIPELINE_DEFAULT_TIMEOUT_SECS") {
            config.default_request_timeout_secs = timeout.parse().map_err(|e| {
                PipelineError::Configuration(format!("Invalid default_request_timeout_secs: {e}"))
            })?;
        }

        if let Ok(url) = std::env::var("PIPELINE_OVERPASS_PROVIDER_URL") {
            config.overpass_provider_url = url;
        }

        if let Ok(batch_size) = std::env::var("PIPELINE_PRIORITY_BATCH_SIZE") {
            config.priority_batch_size = batch_size.parse().map_err(|e| {
                PipelineError::Configuration(format!("Invalid priority_batch_size: {e}"))
            })?;
        }

        if let Ok(placeholder) = std::env::var("PIPELINE_PAGE_PLACEHOLDER") {
            config.page_placeholder = placeholder;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tasks_per_challenge == 0 {
            return Err(PipelineError::Configuration(
                "max_tasks_per_challenge must be greater than zero".to_string(),
            ));
        }
        if self.priority_batch_size == 0 {
            return Err(PipelineError::Configuration(
                "priority_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.page_placeholder.is_empty() {
            return Err(PipelineError::Configuration(
                "page_placeholder must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
