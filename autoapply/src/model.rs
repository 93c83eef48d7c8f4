//! Domain entities shared across the library.
//!
//! These are plain data carriers: the orchestrator owns the application
//! record and run context, the agent owns its task and steps, the chat
//! front-end owns the pending URL. Statuses are sum types; unknown status
//! strings are only tolerated at the LLM boundary (see
//! [`crate::agent::AgentOutcome`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Static identity data the agent may fill into forms without asking.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Full legal name, non-empty.
    pub full_name: String,
    /// Contact email, syntactically valid.
    pub email: String,
    /// Optional phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Optional postal address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UserProfile {
    /// Create a profile from the two required fields.
    #[must_use]
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            phone: None,
            address: None,
        }
    }

    /// Set the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Set the address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// References to resume and cover-letter assets plus structured skills.
///
/// Paths are opaque here; the tool executor resolves them when the model
/// requests an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeData {
    /// Primary resume file. Empty when no resume is configured.
    pub primary_resume_path: PathBuf,
    /// Additional resume variants.
    #[serde(default)]
    pub additional_resume_paths: Vec<PathBuf>,
    /// Cover letter files.
    #[serde(default)]
    pub cover_letter_paths: Vec<PathBuf>,
    /// Skills listed in the profile.
    #[serde(default)]
    pub skills: Vec<String>,
}

impl ResumeData {
    /// Resume data with just a primary resume.
    #[must_use]
    pub fn with_resume(path: impl Into<PathBuf>) -> Self {
        Self {
            primary_resume_path: path.into(),
            ..Self::default()
        }
    }

    /// First configured cover letter, if any.
    #[must_use]
    pub fn primary_cover_letter(&self) -> Option<&PathBuf> {
        self.cover_letter_paths.first()
    }
}

/// Validated runtime configuration, read from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Telegram bot token.
    pub bot_token: String,
    /// Telegram chat id; may be negative for group chats.
    pub chat_id: i64,
    /// LLM API key.
    pub llm_api_key: String,
    /// LLM base URL (https).
    pub llm_base_url: String,
    /// Whether the final submit should be skipped and artifacts captured.
    pub debug_mode: bool,
}

/// Lightweight reference to a job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPostingRef {
    /// Company name, derived from the URL when not known.
    pub company_name: String,
    /// Job title; empty when unknown.
    pub job_title: String,
    /// The posting URL.
    pub job_url: String,
    /// Job board hint (e.g. "greenhouse"), when detectable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_type: Option<String>,
}

impl JobPostingRef {
    /// Build a posting reference from a bare URL.
    ///
    /// The company name is the hostname's first label, title-cased, with a
    /// leading `www.` stripped; the board type is sniffed from well-known
    /// job-board hostnames.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let host = url
            .split("://")
            .nth(1)
            .unwrap_or(url)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("unknown")
            .trim_start_matches("www.");
        let first_label = host.split('.').next().unwrap_or("unknown");
        let mut company = String::with_capacity(first_label.len());
        let mut chars = first_label.chars();
        if let Some(c) = chars.next() {
            company.extend(c.to_uppercase());
            company.extend(chars);
        }
        if company.is_empty() {
            company.push_str("Unknown");
        }
        Self {
            company_name: company,
            job_title: String::new(),
            job_url: url.to_owned(),
            board_type: detect_board_type(url),
        }
    }
}

/// Sniff the job board from the posting URL.
fn detect_board_type(url: &str) -> Option<String> {
    let lower = url.to_lowercase();
    if lower.contains("myworkdayjobs") || lower.contains("workday") {
        Some("workday".to_owned())
    } else if lower.contains("greenhouse.io") {
        Some("greenhouse".to_owned())
    } else if lower.contains("lever.co") {
        Some("lever".to_owned())
    } else if lower.contains("smartrecruiters") {
        Some("smartrecruiters".to_owned())
    } else {
        None
    }
}

/// Lifecycle states of a job application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobApplicationStatus {
    /// Created, outcome not yet known.
    Pending,
    /// Final submit went through.
    Applied,
    /// The attempt failed.
    Failed,
    /// The attempt stopped deliberately before the final submit.
    Skipped,
}

impl JobApplicationStatus {
    /// String form as persisted and shown to the user.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parse a persisted status string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "applied" => Some(Self::Applied),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Whether this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for JobApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent record of a single application attempt.
///
/// Created in `Pending` at orchestrator entry and mutated exactly once to
/// a terminal status. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplicationRecord {
    /// Stable identifier.
    pub id: String,
    /// Denormalized company name.
    pub company_name: String,
    /// Denormalized job title.
    pub job_title: String,
    /// Denormalized posting URL.
    pub job_url: String,
    /// Lifecycle status.
    pub status: JobApplicationStatus,
    /// Set iff `status == Applied`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    /// Set iff `status` is `Failed` or `Skipped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Run id of the debug session that produced this record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_run_id: Option<String>,
}

impl JobApplicationRecord {
    /// A fresh pending record for the given job.
    #[must_use]
    pub fn pending(id: impl Into<String>, job: &JobPostingRef) -> Self {
        Self {
            id: id.into(),
            company_name: job.company_name.clone(),
            job_title: job.job_title.clone(),
            job_url: job.job_url.clone(),
            status: JobApplicationStatus::Pending,
            applied_at: None,
            failure_reason: None,
            debug_run_id: None,
        }
    }

    /// Terminal `Applied` transition.
    #[must_use]
    pub fn applied(mut self, at: DateTime<Utc>) -> Self {
        self.status = JobApplicationStatus::Applied;
        self.applied_at = Some(at);
        self.failure_reason = None;
        self
    }

    /// Terminal `Failed` transition.
    #[must_use]
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.status = JobApplicationStatus::Failed;
        self.failure_reason = Some(reason.into());
        self
    }

    /// Terminal `Skipped` transition.
    #[must_use]
    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.status = JobApplicationStatus::Skipped;
        self.failure_reason = Some(reason.into());
        self
    }
}

/// Credentials for a job board portal and tenant.
///
/// `(portal, tenant, email)` is the upsert key. Stored as plain text;
/// this is a documented limitation — layer encryption at the store seam
/// before shipping anything real.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredential {
    /// Stable identifier.
    pub id: String,
    /// Portal, e.g. "greenhouse"; "unknown" when not detectable.
    pub portal: String,
    /// Tenant (usually the company), lower-cased.
    pub tenant: String,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// First time this key was stored. Preserved across upserts.
    pub created_at: DateTime<Utc>,
    /// Advanced on every upsert.
    pub updated_at: DateTime<Utc>,
}

/// Per-run context handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Identifier of this run.
    pub run_id: String,
    /// Whether this is a debug run (skip final submit, capture artifacts).
    pub is_debug: bool,
    /// Explicit artifact directory override.
    pub log_directory: Option<PathBuf>,
}

impl RunContext {
    /// A non-debug run context.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            is_debug: false,
            log_directory: None,
        }
    }

    /// A debug run context.
    #[must_use]
    pub fn debug(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            is_debug: true,
            log_directory: None,
        }
    }
}
