//! Configuration provider and validator.
//!
//! Reads `config.json` and `profile.json` (plus the resume and cover
//! letter assets) from a config directory. Every public read goes back
//! to disk, so edits take effect without restarting the bot.
//!
//! Validation is two-phase: [`FsConfigProvider::validate`] is purely
//! syntactic and aggregates every problem into one list;
//! [`FsConfigProvider::check_connectivity`] probes the Telegram and LLM
//! endpoints concurrently.

use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::{AppConfig, ResumeData, UserProfile};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^YOUR_").expect("static regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s\-()]{7,}$").expect("static regex"));

const REQUIRED_CONFIG_KEYS: [&str; 4] = ["BOT_TOKEN", "CHAT_ID", "LLM_KEY", "LLM_BASE_URL"];
const REQUIRED_PROFILE_KEYS: [&str; 2] = ["name", "email"];

/// Outcome of the connectivity probes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityReport {
    /// True when both endpoints answered successfully.
    pub ok: bool,
    /// Human-readable problems, one per failed probe.
    pub errors: Vec<String>,
    /// Bot username as reported by the chat platform, when reachable.
    pub bot_username: Option<String>,
}

/// Filesystem-backed configuration provider.
#[derive(Debug, Clone)]
pub struct FsConfigProvider {
    config_dir: PathBuf,
}

impl FsConfigProvider {
    /// Provider rooted at `config_dir`.
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// The configuration directory.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the primary resume asset.
    #[must_use]
    pub fn resume_path(&self) -> PathBuf {
        self.config_dir.join("resume").join("resume.pdf")
    }

    /// Path of the cover letter asset.
    #[must_use]
    pub fn cover_letter_path(&self) -> PathBuf {
        self.config_dir
            .join("cover_letter")
            .join("cover_letter.pdf")
    }

    /// Read and parse the runtime configuration.
    pub fn get_config(&self) -> Result<AppConfig, ConfigError> {
        let data = self.read_json("config.json")?;
        Ok(AppConfig {
            bot_token: require_string(&data, "config.json", "BOT_TOKEN")?,
            chat_id: parse_chat_id(&data)?,
            llm_api_key: require_string(&data, "config.json", "LLM_KEY")?,
            llm_base_url: require_string(&data, "config.json", "LLM_BASE_URL")?,
            debug_mode: data
                .get("debug_mode")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Read and parse the user profile.
    pub fn get_profile(&self) -> Result<UserProfile, ConfigError> {
        let data = self.read_json("profile.json")?;
        let mut profile = UserProfile::new(
            require_string(&data, "profile.json", "name")?,
            require_string(&data, "profile.json", "email")?,
        );
        profile.phone = data
            .get("phone")
            .and_then(Value::as_str)
            .map(str::to_owned);
        profile.address = data
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(profile)
    }

    /// Resume data derived from the asset layout and profile skills.
    pub fn get_resume_data(&self) -> Result<ResumeData, ConfigError> {
        let data = self.read_json("profile.json")?;
        let skills = data
            .get("skills")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ResumeData {
            primary_resume_path: self.resume_path(),
            additional_resume_paths: Vec::new(),
            cover_letter_paths: vec![self.cover_letter_path()],
            skills,
        })
    }

    /// Syntactic validation. Returns every problem found; empty = valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let config = self.validate_json_file("config.json", &REQUIRED_CONFIG_KEYS, &mut errors);
        let profile = self.validate_json_file("profile.json", &REQUIRED_PROFILE_KEYS, &mut errors);

        if let Some(data) = config {
            validate_config_formats(&data, &mut errors);
        }
        if let Some(data) = profile {
            validate_profile_formats(&data, &mut errors);
        }

        let resume = self.resume_path();
        if !resume.is_file() {
            errors.push(format!(
                "Resume not found at {}. Place your resume.pdf in the resume/ folder.",
                resume.display()
            ));
        }
        let cover_letter = self.cover_letter_path();
        if !cover_letter.is_file() {
            errors.push(format!(
                "Cover letter not found at {}. Place your cover_letter.pdf in the cover_letter/ folder.",
                cover_letter.display()
            ));
        }

        errors
    }

    /// Probe the chat platform and the LLM endpoint concurrently.
    pub async fn check_connectivity(&self, config: &AppConfig) -> ConnectivityReport {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                return ConnectivityReport {
                    ok: false,
                    errors: vec![format!("Cannot build http client: {e}")],
                    bot_username: None,
                }
            }
        };

        let (bot, llm) = tokio::join!(
            probe_bot(&client, &config.bot_token),
            probe_llm(&client, &config.llm_base_url, &config.llm_api_key),
        );

        let mut report = ConnectivityReport::default();
        match bot {
            Ok(username) => report.bot_username = username,
            Err(e) => report.errors.push(e),
        }
        if let Err(e) = llm {
            report.errors.push(e);
        }
        report.ok = report.errors.is_empty();
        report
    }

    // -- internal helpers ---------------------------------------------------

    fn read_json(&self, filename: &str) -> Result<Map<String, Value>, ConfigError> {
        let path = self.config_dir.join(filename);
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::MissingKey {
                file: filename.to_owned(),
                key: "<top-level object>".to_owned(),
            }),
        }
    }

    /// Parse a JSON file and check required keys, pushing problems into
    /// `errors`. Returns the parsed map only when it is usable.
    fn validate_json_file(
        &self,
        filename: &str,
        required: &[&str],
        errors: &mut Vec<String>,
    ) -> Option<Map<String, Value>> {
        let path = self.config_dir.join(filename);
        if !path.is_file() {
            errors.push(format!("Missing file: {}", path.display()));
            return None;
        }
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                errors.push(format!("Cannot read {}: {e}", path.display()));
                return None;
            }
        };
        let data: Map<String, Value> = match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                errors.push(format!("{filename} must contain a JSON object"));
                return None;
            }
            Err(e) => {
                errors.push(format!("Cannot parse {}: {e}", path.display()));
                return None;
            }
        };
        let missing: Vec<&str> = required
            .iter()
            .filter(|key| !data.contains_key(**key))
            .copied()
            .collect();
        if !missing.is_empty() {
            errors.push(format!("{filename} missing keys: {}", missing.join(", ")));
            return None;
        }
        Some(data)
    }
}

fn require_string(
    data: &Map<String, Value>,
    file: &str,
    key: &str,
) -> Result<String, ConfigError> {
    match data.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(ConfigError::MissingKey {
            file: file.to_owned(),
            key: key.to_owned(),
        }),
    }
}

fn parse_chat_id(data: &Map<String, Value>) -> Result<i64, ConfigError> {
    let missing = || ConfigError::MissingKey {
        file: "config.json".to_owned(),
        key: "CHAT_ID".to_owned(),
    };
    match data.get("CHAT_ID") {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(missing),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| missing()),
        _ => Err(missing()),
    }
}

fn validate_config_formats(data: &Map<String, Value>, errors: &mut Vec<String>) {
    let bot_token = data.get("BOT_TOKEN").and_then(Value::as_str).unwrap_or("");
    if bot_token.is_empty() || PLACEHOLDER.is_match(bot_token) {
        errors.push(
            "BOT_TOKEN is a placeholder. Get a real token from @BotFather on Telegram.".into(),
        );
    }

    let chat_id = match data.get("CHAT_ID") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let digits = chat_id.strip_prefix('-').unwrap_or(&chat_id);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        errors.push(
            "CHAT_ID must be numeric. Send /start to your bot and check the chat ID.".into(),
        );
    }

    let llm_key = data.get("LLM_KEY").and_then(Value::as_str).unwrap_or("");
    if llm_key.to_uppercase().contains("YOUR") {
        errors.push("LLM_KEY is a placeholder. Set your real API key.".into());
    } else if !llm_key.starts_with("sk-") || llm_key.len() < 10 {
        errors.push("LLM_KEY must start with 'sk-' and be at least 10 characters.".into());
    }

    let base_url = data
        .get("LLM_BASE_URL")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !base_url.starts_with("https://") {
        errors.push("LLM_BASE_URL must start with 'https://'.".into());
    }

    if let Some(debug_mode) = data.get("debug_mode") {
        if !debug_mode.is_boolean() {
            errors.push("debug_mode must be a boolean (true/false), not a string.".into());
        }
    }
}

fn validate_profile_formats(data: &Map<String, Value>, errors: &mut Vec<String>) {
    let name = data.get("name").and_then(Value::as_str).unwrap_or("");
    if name.is_empty() || name == "Your Full Name" {
        errors.push("profile.json: name is a placeholder. Enter your real name.".into());
    }

    let email = data.get("email").and_then(Value::as_str).unwrap_or("");
    if !EMAIL.is_match(email) {
        errors.push(format!(
            "profile.json: email '{email}' is not a valid email address."
        ));
    } else if email == "your@email.com" {
        errors.push("profile.json: email is a placeholder. Enter your real email.".into());
    }

    if let Some(phone) = data.get("phone") {
        let phone = match phone {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !PHONE.is_match(&phone) {
            errors.push(format!(
                "profile.json: phone '{phone}' is not a valid phone number."
            ));
        }
    }
}

async fn probe_bot(client: &reqwest::Client, bot_token: &str) -> Result<Option<String>, String> {
    let url = format!("https://api.telegram.org/bot{bot_token}/getMe");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Telegram endpoint unreachable: {e}"))?;
    if !response.status().is_success() {
        return Err(format!(
            "Telegram getMe failed with status {}",
            response.status()
        ));
    }
    let payload: Value = response
        .json()
        .await
        .map_err(|e| format!("Telegram getMe returned invalid JSON: {e}"))?;
    if !payload["ok"].as_bool().unwrap_or(false) {
        return Err(format!("Telegram getMe rejected the token: {payload}"));
    }
    Ok(payload["result"]["username"].as_str().map(str::to_owned))
}

async fn probe_llm(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<(), String> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let response = client
        .get(url)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| format!("LLM endpoint unreachable: {e}"))?;
    match response.status().as_u16() {
        200..=299 => Ok(()),
        401 => Err("LLM endpoint rejected the key (unauthorized).".into()),
        status => Err(format!("LLM models listing failed with status {status}")),
    }
}
