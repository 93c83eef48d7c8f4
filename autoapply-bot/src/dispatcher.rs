//! Chat dispatcher: command handling plus the human-channel
//! implementation used by the agent's `ask_user` / `report_status`.
//!
//! One listener loop polls the transport. While an application is in
//! flight, inbound messages are routed FIFO into the pending question of
//! that run; otherwise they are parsed as commands. At most one apply
//! task runs at a time.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use autoapply::config::FsConfigProvider;
use autoapply::error::InteractionError;
use autoapply::interaction::{ChoiceReply, FreeTextReply, UserInteraction};
use autoapply::model::JobApplicationRecord;
use autoapply::store::JobApplicationStore;

use crate::error::Result;

/// How many records `/status` shows.
const STATUS_LIMIT: usize = 10;

/// The chat wire, stripped to what the dispatcher needs.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Block (long-poll) for the next batch of text messages from the
    /// configured chat.
    async fn poll_messages(&self) -> Result<Vec<String>>;

    /// Send a text message.
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Send a photo with a caption.
    async fn send_photo(&self, image: &[u8], caption: &str) -> Result<()>;
}

/// Runs one application attempt against a URL.
///
/// The production implementation wires browser, LLM and orchestrator;
/// tests substitute a scripted one.
#[async_trait]
pub trait ApplyRunner: Send + Sync {
    /// Apply to the posting at `url`, asking the human through `ui`.
    async fn run_apply(
        &self,
        url: &str,
        ui: Arc<dyn UserInteraction>,
    ) -> Result<JobApplicationRecord>;
}

/// Human channel bound to the dispatcher's chat: questions go out over
/// the transport, answers come back from the listener via the reply
/// queue.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    replies: Mutex<mpsc::Receiver<String>>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession").finish_non_exhaustive()
    }
}

impl ChatSession {
    fn new(transport: Arc<dyn ChatTransport>, replies: mpsc::Receiver<String>) -> Self {
        Self {
            transport,
            replies: Mutex::new(replies),
        }
    }

    async fn wait_for_reply(&self) -> std::result::Result<String, InteractionError> {
        self.replies
            .lock()
            .await
            .recv()
            .await
            .ok_or(InteractionError::ChannelClosed)
    }

    fn transport_err(e: crate::error::BotError) -> InteractionError {
        InteractionError::Transport(e.to_string())
    }
}

#[async_trait]
impl UserInteraction for ChatSession {
    async fn send_info(&self, message: &str) -> std::result::Result<(), InteractionError> {
        self.transport
            .send_message(message)
            .await
            .map_err(Self::transport_err)
    }

    async fn ask_free_text(
        &self,
        question_id: &str,
        prompt: &str,
    ) -> std::result::Result<FreeTextReply, InteractionError> {
        self.transport
            .send_message(&format!("[Question: {question_id}]\n{prompt}"))
            .await
            .map_err(Self::transport_err)?;
        let text = self.wait_for_reply().await?;
        Ok(FreeTextReply {
            question_id: question_id.to_owned(),
            text: text.trim().to_owned(),
        })
    }

    async fn ask_choice(
        &self,
        question_id: &str,
        prompt: &str,
        options: &[String],
        allow_multiple: bool,
    ) -> std::result::Result<ChoiceReply, InteractionError> {
        if options.is_empty() {
            return Ok(ChoiceReply {
                question_id: question_id.to_owned(),
                selected: Vec::new(),
            });
        }
        let options_text: String = options
            .iter()
            .enumerate()
            .map(|(i, opt)| format!("  {}. {opt}\n", i + 1))
            .collect();
        self.transport
            .send_message(&format!(
                "[Question: {question_id}]\n{prompt}\n{options_text}Reply with the option text."
            ))
            .await
            .map_err(Self::transport_err)?;
        let reply = self.wait_for_reply().await?;
        let reply = reply.trim();

        let selected = if allow_multiple {
            let picked: Vec<&str> = reply.split(',').map(str::trim).collect();
            options
                .iter()
                .filter(|opt| picked.contains(&opt.as_str()))
                .cloned()
                .collect()
        } else if options.iter().any(|opt| opt == reply) {
            vec![reply.to_owned()]
        } else {
            vec![options[0].clone()]
        };
        Ok(ChoiceReply {
            question_id: question_id.to_owned(),
            selected,
        })
    }

    async fn send_image_and_ask_text(
        &self,
        question_id: &str,
        image: &[u8],
        prompt: &str,
    ) -> std::result::Result<FreeTextReply, InteractionError> {
        self.transport
            .send_photo(image, prompt)
            .await
            .map_err(Self::transport_err)?;
        let text = self.wait_for_reply().await?;
        Ok(FreeTextReply {
            question_id: question_id.to_owned(),
            text: text.trim().to_owned(),
        })
    }
}

/// Long-running command loop for one chat.
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    config: FsConfigProvider,
    job_store: Arc<dyn JobApplicationStore>,
    runner: Arc<dyn ApplyRunner>,
    session: Arc<ChatSession>,
    reply_tx: mpsc::Sender<String>,
    applying: Arc<AtomicBool>,
    last_url: Option<String>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("applying", &self.applying.load(Ordering::SeqCst))
            .field("last_url", &self.last_url)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Wire a dispatcher over the given collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        config: FsConfigProvider,
        job_store: Arc<dyn JobApplicationStore>,
        runner: Arc<dyn ApplyRunner>,
    ) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel(32);
        let session = Arc::new(ChatSession::new(transport.clone(), reply_rx));
        Self {
            transport,
            config,
            job_store,
            runner,
            session,
            reply_tx,
            applying: Arc::new(AtomicBool::new(false)),
            last_url: None,
        }
    }

    /// Announce startup, then poll and handle messages forever.
    pub async fn run(&mut self) -> Result<()> {
        self.transport
            .send_message("Bot started. Send a job URL, then /apply.")
            .await?;
        info!("Dispatcher listening");
        loop {
            let messages = match self.transport.poll_messages().await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(error = %e, "Polling failed; backing off");
                    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                    continue;
                }
            };
            for text in messages {
                self.handle_message(&text).await;
            }
        }
    }

    /// Route one inbound message.
    pub async fn handle_message(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if self.applying.load(Ordering::SeqCst) {
            // A run is in flight: `/apply` is rejected, everything else
            // answers the pending question, FIFO.
            if first_token_is(text, "/apply") {
                self.send("An application is already in progress.").await;
            } else if self.reply_tx.send(text.to_owned()).await.is_err() {
                warn!("Reply queue closed; dropping message");
            }
            return;
        }

        if first_token_is(text, "/apply") {
            self.handle_apply().await;
        } else if first_token_is(text, "/status") {
            self.handle_status().await;
        } else if first_token_is(text, "/debug") {
            self.handle_debug().await;
        } else if first_token_is(text, "/help") {
            self.handle_help().await;
        } else if is_url(text) {
            let url = text.split_whitespace().next().unwrap_or(text).to_owned();
            self.send(&format!("URL received: {url}\nSend /apply to start."))
                .await;
            self.last_url = Some(url);
        } else {
            self.send("Unrecognized message. Send a job URL or /help for commands.")
                .await;
        }
    }

    async fn handle_apply(&mut self) {
        let Some(url) = self.last_url.take() else {
            self.send("No URL stored. Send a job URL first.").await;
            return;
        };

        self.applying.store(true, Ordering::SeqCst);
        let transport = self.transport.clone();
        let runner = self.runner.clone();
        let session = self.session.clone();
        let applying = self.applying.clone();

        tokio::spawn(async move {
            let _ = transport
                .send_message(&format!("Starting application for {url} ..."))
                .await;
            match runner.run_apply(&url, session).await {
                Ok(record) => {
                    let mut summary = format!(
                        "Result: {}\nCompany: {}\nURL: {}",
                        record.status, record.company_name, record.job_url
                    );
                    if let Some(reason) = &record.failure_reason {
                        summary.push_str(&format!("\nReason: {reason}"));
                    }
                    let _ = transport.send_message(&summary).await;
                }
                Err(e) => {
                    error!(error = %e, url = %url, "Apply command failed");
                    let _ = transport
                        .send_message(&format!("Application failed: {e}"))
                        .await;
                }
            }
            applying.store(false, Ordering::SeqCst);
        });
    }

    async fn handle_status(&self) {
        let records = match self.job_store.list_all() {
            Ok(records) => records,
            Err(e) => {
                self.send(&format!("Cannot read applications: {e}")).await;
                return;
            }
        };
        if records.is_empty() {
            self.send("No applications yet.").await;
            return;
        }
        let lines: String = records
            .iter()
            .take(STATUS_LIMIT)
            .map(|r| format!("- [{}] {}: {}\n", r.status, r.company_name, r.job_url))
            .collect();
        self.send(&format!("Recent applications:\n{}", lines.trim_end()))
            .await;
    }

    async fn handle_debug(&self) {
        match self.config.get_config() {
            Ok(config) => {
                let state = if config.debug_mode { "ON" } else { "OFF" };
                self.send(&format!(
                    "Debug mode is currently {state}.\nToggle it by editing debug_mode in config.json."
                ))
                .await;
            }
            Err(e) => self.send(&format!("Cannot read config: {e}")).await,
        }
    }

    async fn handle_help(&self) {
        self.send(
            "Commands:\n\
             \x20 Send a job URL — stores it for /apply\n\
             \x20 /apply — apply to the last URL\n\
             \x20 /status — list recent applications\n\
             \x20 /debug — show debug mode status\n\
             \x20 /help — this message",
        )
        .await;
    }

    async fn send(&self, text: &str) {
        if let Err(e) = self.transport.send_message(text).await {
            warn!(error = %e, "Cannot send chat message");
        }
    }
}

/// Case-insensitive prefix match on the first whitespace token.
fn first_token_is(text: &str, command: &str) -> bool {
    text.split_whitespace()
        .next()
        .is_some_and(|token| token.to_lowercase().starts_with(command))
}

fn is_url(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
