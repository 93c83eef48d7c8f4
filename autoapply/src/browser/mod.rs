//! Browser page abstraction.
//!
//! The tool executor never talks to a driver directly: it drives a
//! [`BrowserPage`], which exposes exactly the primitives the declared
//! tools need. The production implementation is [`cdp::CdpPage`] over a
//! headless Chromium; tests use an in-memory fake.
//!
//! Locator probes return `Ok(false)` when nothing matched — a recoverable
//! miss the executor reports to the model as a benign string. `Err` is
//! reserved for infrastructure failures (driver gone, page crashed).

pub mod cdp;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::BrowserError;

/// How to find an element on the page.
///
/// The executor tries locators in a fixed priority order per tool; see
/// [`crate::tool`] for the chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element with ARIA role `button` and the given accessible name.
    ButtonRole(String),
    /// Element with ARIA role `link` and the given accessible name.
    LinkRole(String),
    /// Element containing the given visible text (non-exact).
    VisibleText(String),
    /// Form control labelled with the given text.
    Label(String),
    /// Input with the given placeholder.
    Placeholder(String),
    /// Element with the given `name` attribute.
    NameAttr(String),
    /// Element with the given `id`.
    Id(String),
    /// Raw CSS selector.
    Css(String),
}

/// Driver-agnostic view of one live browser page.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Structured-text rendering of the accessibility tree, or `None`
    /// when the tree is unavailable.
    async fn accessibility_snapshot(&self) -> Result<Option<String>, BrowserError>;

    /// Plain text of the document body.
    async fn body_text(&self) -> Result<String, BrowserError>;

    /// PNG screenshot of the page.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Navigate and wait for DOM content loaded.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Click the first element matching `locator`. `Ok(false)` = no match.
    async fn click_first(&self, locator: &Locator) -> Result<bool, BrowserError>;

    /// Fill the first input matching `locator`. `Ok(false)` = no match.
    async fn fill_first(&self, locator: &Locator, value: &str) -> Result<bool, BrowserError>;

    /// Select a dropdown option (by visible text or value) on the first
    /// matching select. `Ok(false)` = no match.
    async fn select_first(&self, locator: &Locator, value: &str) -> Result<bool, BrowserError>;

    /// Set files on the first matching file input. `Ok(false)` = no match.
    async fn set_files_first(&self, locator: &Locator, path: &Path) -> Result<bool, BrowserError>;

    /// Scroll the viewport vertically by `dy` pixels (negative = up).
    async fn scroll_by(&self, dy: i64) -> Result<(), BrowserError>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Wait for the network to go idle, up to `timeout`.
    ///
    /// Returns `Ok(false)` when the timeout elapsed first; callers fall
    /// back to a plain sleep.
    async fn wait_network_idle(&self, timeout: Duration) -> Result<bool, BrowserError>;
}
