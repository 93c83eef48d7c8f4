//! Application orchestrator.
//!
//! Wraps one agent invocation with everything that must not live inside
//! the loop: the record lifecycle (pending → exactly one terminal
//! mutation), credential capture, debug artifacts, and the conversion of
//! errors into terminal records. The agent is never retried; the user
//! re-issues the command to try again.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agent::{AgentOutcome, AgentResult, AgentTask, TaskAgent};
use crate::artifacts::DebugArtifactStore;
use crate::error::StoreError;
use crate::interaction::UserInteraction;
use crate::model::{
    AccountCredential, JobApplicationRecord, JobPostingRef, ResumeData, RunContext, UserProfile,
};
use crate::runtime::{Clock, IdGenerator};
use crate::store::{CredentialStore, JobApplicationStore};

/// Default reason when the model skips without one.
const DEFAULT_SKIP_REASON: &str = "Debug mode: final submit skipped";
/// Default reason when the model fails without one.
const DEFAULT_FAILURE_REASON: &str = "Agent reported failure";

/// Orchestrates one complete job application attempt.
pub struct ApplicationOrchestrator {
    job_store: Arc<dyn JobApplicationStore>,
    credential_store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    artifacts: Option<Arc<DebugArtifactStore>>,
}

impl std::fmt::Debug for ApplicationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationOrchestrator")
            .field("artifacts", &self.artifacts.is_some())
            .finish_non_exhaustive()
    }
}

impl ApplicationOrchestrator {
    /// Build an orchestrator over the given stores and runtime seams.
    #[must_use]
    pub fn new(
        job_store: Arc<dyn JobApplicationStore>,
        credential_store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            job_store,
            credential_store,
            clock,
            ids,
            artifacts: None,
        }
    }

    /// Attach a debug artifact store (used only for debug runs).
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<DebugArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Run one application attempt to a terminal record.
    ///
    /// Store failures while creating the pending record abort the attempt;
    /// everything after that point is folded into the record itself.
    pub async fn apply_to_job(
        &self,
        agent: &dyn TaskAgent,
        ui: &dyn UserInteraction,
        job: &JobPostingRef,
        profile: &UserProfile,
        resume_data: &ResumeData,
        run_context: &RunContext,
    ) -> Result<JobApplicationRecord, StoreError> {
        let started_at = self.clock.now();

        let mut record = JobApplicationRecord::pending(self.ids.new_record_id(), job);
        if run_context.is_debug {
            record.debug_run_id = Some(run_context.run_id.clone());
        }
        self.job_store.add(&record)?;

        if run_context.is_debug {
            if let Some(artifacts) = &self.artifacts {
                if let Err(e) = artifacts.ensure_run_dir(run_context) {
                    warn!(error = %e, run_id = %run_context.run_id, "Cannot create debug run directory");
                }
            }
        }

        let generated_password = self.ids.new_password();
        let task = build_task(job, profile, resume_data, &generated_password, run_context);

        let outcome = agent.execute_task(&task).await;

        let (terminal, agent_result) = match outcome {
            Ok(result) => {
                let terminal = match result.status {
                    AgentOutcome::Success => record.clone().applied(self.clock.now()),
                    AgentOutcome::Skipped => record.clone().skipped(
                        result.reason.clone().unwrap_or_else(|| DEFAULT_SKIP_REASON.into()),
                    ),
                    AgentOutcome::Failed => record.clone().failed(
                        result
                            .reason
                            .clone()
                            .unwrap_or_else(|| DEFAULT_FAILURE_REASON.into()),
                    ),
                };
                (terminal, Some(result))
            }
            Err(e) => {
                error!(
                    run_id = %run_context.run_id,
                    job_url = %job.job_url,
                    error = %e,
                    "Agent run aborted"
                );
                (record.clone().failed(e.to_string()), None)
            }
        };

        self.job_store.update(&terminal)?;

        if let Some(result) = &agent_result {
            self.capture_credentials(job, result);
        }

        self.notify(ui, &terminal).await;

        if run_context.is_debug {
            self.write_debug_artifacts(
                run_context,
                job,
                &terminal,
                agent_result.as_ref(),
                started_at,
            );
        }

        info!(
            run_id = %run_context.run_id,
            job_url = %job.job_url,
            status = terminal.status.as_str(),
            reason = terminal.failure_reason.as_deref().unwrap_or(""),
            "Application attempt finished"
        );

        Ok(terminal)
    }

    /// Persist credentials the model reported in its `done` data.
    fn capture_credentials(&self, job: &JobPostingRef, result: &AgentResult) {
        let email = result.data.get("account_email").and_then(Value::as_str);
        let password = result.data.get("account_password").and_then(Value::as_str);
        let (Some(email), Some(password)) = (email, password) else {
            return;
        };
        let now = self.clock.now();
        // The model does not report which portal it created the account
        // on, so the key is always ("unknown", tenant, email).
        let credential = AccountCredential {
            id: self.ids.new_record_id(),
            portal: "unknown".to_owned(),
            tenant: job.company_name.to_lowercase(),
            email: email.to_owned(),
            password: password.to_owned(),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = self.credential_store.upsert(&credential) {
            warn!(error = %e, tenant = %credential.tenant, "Cannot persist account credential");
        }
    }

    /// Human-readable outcome summary to the chat.
    async fn notify(&self, ui: &dyn UserInteraction, record: &JobApplicationRecord) {
        use crate::model::JobApplicationStatus as Status;
        let message = match record.status {
            Status::Applied => format!(
                "Application submitted for {} - {}.",
                record.company_name, record.job_title
            ),
            Status::Skipped => format!(
                "[DEBUG] Prepared application for {} but skipped the final submit.",
                record.company_name
            ),
            _ => format!(
                "Failed to apply for {}. Reason: {}",
                record.company_name,
                record.failure_reason.as_deref().unwrap_or("unknown")
            ),
        };
        if let Err(e) = ui.send_info(&message).await {
            warn!(error = %e, "Cannot deliver outcome summary");
        }
    }

    /// Per-step screenshots plus the end-of-run metadata blob.
    fn write_debug_artifacts(
        &self,
        run_context: &RunContext,
        job: &JobPostingRef,
        terminal: &JobApplicationRecord,
        result: Option<&AgentResult>,
        started_at: chrono::DateTime<chrono::Utc>,
    ) {
        let Some(artifacts) = &self.artifacts else {
            return;
        };
        if let Some(result) = result {
            for step in &result.steps_taken {
                if let Some(image) = &step.screenshot {
                    if let Err(e) =
                        artifacts.save_screenshot(run_context, &step.tool_name, image)
                    {
                        warn!(error = %e, step = step.step, "Cannot save debug screenshot");
                    }
                }
            }
        }
        let metadata = json!({
            "run_id": run_context.run_id,
            "company": job.company_name,
            "job_url": job.job_url,
            "mode": if run_context.is_debug { "debug" } else { "normal" },
            "started_at": started_at.to_rfc3339(),
            "ended_at": self.clock.now().to_rfc3339(),
            "outcome": terminal.status.as_str(),
            "failure_reason": terminal.failure_reason,
        });
        if let Err(e) = artifacts.save_run_metadata(run_context, &metadata) {
            warn!(error = %e, run_id = %run_context.run_id, "Cannot save run metadata");
        }
    }
}

/// Build the agent task for one posting.
fn build_task(
    job: &JobPostingRef,
    profile: &UserProfile,
    resume_data: &ResumeData,
    generated_password: &str,
    run_context: &RunContext,
) -> AgentTask {
    AgentTask::new(format!(
        "Apply to {} - {} at {}",
        job.company_name, job.job_title, job.job_url
    ))
    .with_context(
        "profile",
        json!({
            "full_name": profile.full_name,
            "email": profile.email,
            "phone": profile.phone,
            "address": profile.address,
        }),
    )
    .with_context("job_url", json!(job.job_url))
    .with_context("company", json!(job.company_name))
    .with_context("job_title", json!(job.job_title))
    .with_context(
        "resume_available",
        json!(!resume_data.primary_resume_path.as_os_str().is_empty()),
    )
    .with_context(
        "cover_letter_available",
        json!(resume_data
            .primary_cover_letter()
            .is_some_and(|p| !p.as_os_str().is_empty())),
    )
    .with_context("generated_password", json!(generated_password))
    .with_debug(run_context.is_debug)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::agent::AgentStep;
    use crate::error::{AgentError, InteractionError, LlmError};
    use crate::interaction::{ChoiceReply, FreeTextReply};
    use crate::model::JobApplicationStatus;
    use crate::runtime::{FixedClock, SequentialIdGenerator};
    use crate::store::memory::{InMemoryCredentialStore, InMemoryJobApplicationStore};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;
    use std::sync::Mutex;

    struct ScriptedAgent {
        outcome: Mutex<Option<Result<AgentResult, AgentError>>>,
        seen_task: Mutex<Option<AgentTask>>,
    }

    impl ScriptedAgent {
        fn ok(result: AgentResult) -> Self {
            Self {
                outcome: Mutex::new(Some(Ok(result))),
                seen_task: Mutex::new(None),
            }
        }

        fn err(error: AgentError) -> Self {
            Self {
                outcome: Mutex::new(Some(Err(error))),
                seen_task: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TaskAgent for ScriptedAgent {
        async fn execute_task(&self, task: &AgentTask) -> Result<AgentResult, AgentError> {
            *self.seen_task.lock().unwrap() = Some(task.clone());
            self.outcome.lock().unwrap().take().expect("one call only")
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        infos: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UserInteraction for RecordingUi {
        async fn send_info(&self, message: &str) -> Result<(), InteractionError> {
            self.infos.lock().unwrap().push(message.to_owned());
            Ok(())
        }

        async fn ask_free_text(
            &self,
            question_id: &str,
            _prompt: &str,
        ) -> Result<FreeTextReply, InteractionError> {
            Ok(FreeTextReply {
                question_id: question_id.to_owned(),
                text: String::new(),
            })
        }

        async fn ask_choice(
            &self,
            question_id: &str,
            _prompt: &str,
            _options: &[String],
            _allow_multiple: bool,
        ) -> Result<ChoiceReply, InteractionError> {
            Ok(ChoiceReply {
                question_id: question_id.to_owned(),
                selected: Vec::new(),
            })
        }

        async fn send_image_and_ask_text(
            &self,
            question_id: &str,
            _image: &[u8],
            _prompt: &str,
        ) -> Result<FreeTextReply, InteractionError> {
            Ok(FreeTextReply {
                question_id: question_id.to_owned(),
                text: String::new(),
            })
        }
    }

    struct Harness {
        orchestrator: ApplicationOrchestrator,
        job_store: Arc<InMemoryJobApplicationStore>,
        credential_store: Arc<InMemoryCredentialStore>,
        ui: RecordingUi,
    }

    fn harness() -> Harness {
        let job_store = Arc::new(InMemoryJobApplicationStore::new());
        let credential_store = Arc::new(InMemoryCredentialStore::new());
        let orchestrator = ApplicationOrchestrator::new(
            job_store.clone(),
            credential_store.clone(),
            Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            )),
            Arc::new(SequentialIdGenerator::default()),
        );
        Harness {
            orchestrator,
            job_store,
            credential_store,
            ui: RecordingUi::default(),
        }
    }

    fn job() -> JobPostingRef {
        JobPostingRef {
            company_name: "Acme".into(),
            job_title: "Backend Engineer".into(),
            job_url: "https://example.test/jobs/1".into(),
            board_type: None,
        }
    }

    fn profile() -> UserProfile {
        UserProfile::new("Ada Lovelace", "ada@x.test")
    }

    fn resume() -> ResumeData {
        ResumeData::with_resume("/tmp/resume.pdf")
    }

    fn success_result() -> AgentResult {
        AgentResult {
            status: AgentOutcome::Success,
            reason: None,
            data: Map::new(),
            steps_taken: Vec::new(),
        }
    }

    #[tokio::test]
    async fn success_maps_to_applied_with_timestamp() {
        let h = harness();
        let agent = ScriptedAgent::ok(success_result());
        let record = h
            .orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();

        assert_eq!(record.status, JobApplicationStatus::Applied);
        assert_eq!(
            record.applied_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        );
        let stored = h.job_store.get(&record.id).unwrap().unwrap();
        assert_eq!(stored, record);
        assert!(h.ui.infos.lock().unwrap()[0].contains("Application submitted for Acme"));
    }

    #[tokio::test]
    async fn exactly_one_pending_record_reaches_a_terminal_status() {
        let h = harness();
        let agent = ScriptedAgent::ok(success_result());
        h.orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();
        let all = h.job_store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].status.is_terminal());
    }

    #[tokio::test]
    async fn skipped_uses_default_reason_when_missing() {
        let h = harness();
        let agent = ScriptedAgent::ok(AgentResult {
            status: AgentOutcome::Skipped,
            reason: None,
            data: Map::new(),
            steps_taken: Vec::new(),
        });
        let record = h
            .orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::debug("run-1"),
            )
            .await
            .unwrap();
        assert_eq!(record.status, JobApplicationStatus::Skipped);
        assert_eq!(
            record.failure_reason.as_deref(),
            Some("Debug mode: final submit skipped")
        );
        assert_eq!(record.debug_run_id.as_deref(), Some("run-1"));
    }

    #[tokio::test]
    async fn failed_result_keeps_model_reason() {
        let h = harness();
        let agent = ScriptedAgent::ok(AgentResult {
            status: AgentOutcome::Failed,
            reason: Some("Image captcha prevents automation".into()),
            data: Map::new(),
            steps_taken: Vec::new(),
        });
        let record = h
            .orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();
        assert_eq!(record.status, JobApplicationStatus::Failed);
        assert!(record.failure_reason.unwrap().contains("Image captcha"));
        assert!(h.ui.infos.lock().unwrap()[0].starts_with("Failed to apply for Acme"));
    }

    #[tokio::test]
    async fn agent_error_becomes_a_failed_record() {
        let h = harness();
        let agent = ScriptedAgent::err(AgentError::Llm(LlmError::Protocol(
            "tool call 'goto': malformed arguments".into(),
        )));
        let record = h
            .orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();
        assert_eq!(record.status, JobApplicationStatus::Failed);
        assert!(record
            .failure_reason
            .unwrap()
            .contains("malformed arguments"));
    }

    #[tokio::test]
    async fn reported_account_credentials_are_upserted() {
        let h = harness();
        let mut data = Map::new();
        data.insert("account_email".into(), json!("ada@x.test"));
        data.insert("account_password".into(), json!("pw-99"));
        let agent = ScriptedAgent::ok(AgentResult {
            status: AgentOutcome::Success,
            reason: None,
            data,
            steps_taken: Vec::new(),
        });
        h.orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();
        let stored = h
            .credential_store
            .get("unknown", "acme", "ada@x.test")
            .unwrap()
            .unwrap();
        assert_eq!(stored.password, "pw-99");
    }

    #[tokio::test]
    async fn credential_portal_is_unknown_even_with_a_board_type_hint() {
        let h = harness();
        let mut data = Map::new();
        data.insert("account_email".into(), json!("ada@x.test"));
        data.insert("account_password".into(), json!("pw-7"));
        let agent = ScriptedAgent::ok(AgentResult {
            status: AgentOutcome::Success,
            reason: None,
            data,
            steps_taken: Vec::new(),
        });
        let mut greenhouse_job = job();
        greenhouse_job.board_type = Some("greenhouse".into());
        h.orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &greenhouse_job,
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();
        assert!(h
            .credential_store
            .get("unknown", "acme", "ada@x.test")
            .unwrap()
            .is_some());
        assert!(h
            .credential_store
            .get("greenhouse", "acme", "ada@x.test")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn task_context_carries_profile_and_document_flags() {
        let h = harness();
        let agent = ScriptedAgent::ok(success_result());
        h.orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::new("run-1"),
            )
            .await
            .unwrap();
        let task = agent.seen_task.lock().unwrap().clone().unwrap();
        assert_eq!(
            task.objective,
            "Apply to Acme - Backend Engineer at https://example.test/jobs/1"
        );
        assert_eq!(task.max_steps, 50);
        assert_eq!(task.context["resume_available"], json!(true));
        assert_eq!(task.context["cover_letter_available"], json!(false));
        assert!(task.context["generated_password"].as_str().is_some());
    }

    #[tokio::test]
    async fn debug_run_writes_screenshots_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness();
        h.orchestrator = h
            .orchestrator
            .with_artifacts(Arc::new(DebugArtifactStore::new(dir.path())));
        let agent = ScriptedAgent::ok(AgentResult {
            status: AgentOutcome::Skipped,
            reason: Some("Debug mode: final submit skipped".into()),
            data: Map::new(),
            steps_taken: vec![AgentStep {
                step: 0,
                tool_name: "page_snapshot".into(),
                arguments: Map::new(),
                result: "ok".into(),
                screenshot: Some(vec![1, 2, 3]),
            }],
        });
        h.orchestrator
            .apply_to_job(
                &agent,
                &h.ui,
                &job(),
                &profile(),
                &resume(),
                &RunContext::debug("run-5"),
            )
            .await
            .unwrap();

        let run_dir = dir.path().join("run_run-5");
        let shots = crate::artifacts::list_screenshots(&run_dir).unwrap();
        assert_eq!(shots, vec!["Screenshot_001_page_snapshot.png"]);
        let meta: Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("run_meta.json")).unwrap())
                .unwrap();
        assert_eq!(meta["outcome"], "skipped");
        assert_eq!(meta["mode"], "debug");
        assert_eq!(meta["run_id"], "run-5");
    }
}
