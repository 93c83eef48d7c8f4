//! Production [`ApplyRunner`]: wires a fresh browser, the LLM client and
//! the orchestrator for each attempt.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use autoapply::prelude::*;

use crate::dispatcher::ApplyRunner;
use crate::error::{BotError, Result};

/// Builds the full stack per run: config is re-read, the browser is
/// launched fresh and closed unconditionally afterwards.
pub struct LiveApplyRunner {
    config: FsConfigProvider,
    job_store: Arc<dyn JobApplicationStore>,
    credential_store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    artifacts_dir: PathBuf,
}

impl std::fmt::Debug for LiveApplyRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveApplyRunner")
            .field("artifacts_dir", &self.artifacts_dir)
            .finish_non_exhaustive()
    }
}

impl LiveApplyRunner {
    /// Wire a runner over the given stores and config directory.
    #[must_use]
    pub fn new(
        config: FsConfigProvider,
        job_store: Arc<dyn JobApplicationStore>,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            job_store,
            credential_store,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIdGenerator),
            artifacts_dir: PathBuf::from("logs"),
        }
    }

    /// Override the debug artifact directory.
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }
}

#[async_trait]
impl ApplyRunner for LiveApplyRunner {
    async fn run_apply(
        &self,
        url: &str,
        ui: Arc<dyn UserInteraction>,
    ) -> Result<JobApplicationRecord> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            return Err(BotError::Validation(errors));
        }
        let config = self.config.get_config()?;
        let profile = self.config.get_profile()?;
        let resume_data = self.config.get_resume_data()?;

        let job = JobPostingRef::from_url(url);
        let run_id = self.ids.new_run_id();
        let run_context = if config.debug_mode {
            RunContext::debug(&run_id)
        } else {
            RunContext::new(&run_id)
        };
        info!(run_id = %run_id, url = %url, debug = config.debug_mode, "Starting apply run");

        let llm = OpenAiClient::builder()
            .api_key(&config.llm_api_key)
            .base_url(&config.llm_base_url)
            .build()?;

        let mut browser = CdpBrowser::launch().await?;
        let outcome = self
            .drive(&browser, llm, ui, &job, &profile, &resume_data, &run_context, &config)
            .await;
        // The browser dies with the run, success or not.
        browser.close().await;
        outcome
    }
}

impl LiveApplyRunner {
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        browser: &CdpBrowser,
        llm: OpenAiClient,
        ui: Arc<dyn UserInteraction>,
        job: &JobPostingRef,
        profile: &UserProfile,
        resume_data: &ResumeData,
        run_context: &RunContext,
        config: &AppConfig,
    ) -> Result<JobApplicationRecord> {
        let page = browser.new_page().await?;
        let tools = BrowserToolExecutor::new(
            Arc::new(page),
            ui.clone(),
            self.config.resume_path(),
            self.config.cover_letter_path(),
        );
        let agent = BrowserAgent::new(Arc::new(llm), Arc::new(tools));

        let mut orchestrator = ApplicationOrchestrator::new(
            self.job_store.clone(),
            self.credential_store.clone(),
            self.clock.clone(),
            self.ids.clone(),
        );
        if config.debug_mode {
            orchestrator = orchestrator
                .with_artifacts(Arc::new(DebugArtifactStore::new(&self.artifacts_dir)));
        }

        orchestrator
            .apply_to_job(&agent, ui.as_ref(), job, profile, resume_data, run_context)
            .await
            .map_err(BotError::from)
    }
}
