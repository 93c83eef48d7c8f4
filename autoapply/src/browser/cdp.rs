//! Chromium adapter for [`BrowserPage`] over the DevTools protocol.
//!
//! The adapter keeps the protocol surface small: element lookup and all
//! form interactions run as injected JavaScript (one self-contained
//! expression per call), so only navigation, screenshots and file-input
//! population use native CDP commands. A browser is launched fresh for
//! each apply run and closed unconditionally afterwards.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrowserPage, Locator};
use crate::error::BrowserError;

/// Marker attribute used to hand a JS-located element over to CDP.
const UPLOAD_MARKER: &str = "data-autoapply-upload";

/// Owns one headless Chromium instance and its event handler task.
pub struct CdpBrowser {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
}

impl std::fmt::Debug for CdpBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpBrowser")
            .field("launched", &self.browser.is_some())
            .finish_non_exhaustive()
    }
}

impl CdpBrowser {
    /// Launch a fresh headless Chromium.
    pub async fn launch() -> Result<Self, BrowserError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(BrowserError::Driver)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(driver)?;
        // The handler stream must be polled for the browser to make progress.
        let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });
        Ok(Self {
            browser: Some(browser),
            handler: handle,
        })
    }

    /// Open a new blank page.
    pub async fn new_page(&self) -> Result<CdpPage, BrowserError> {
        let browser = self.browser.as_ref().ok_or(BrowserError::NotLaunched)?;
        let page = browser.new_page("about:blank").await.map_err(driver)?;
        Ok(CdpPage { page })
    }

    /// Close the browser process. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Browser close failed");
            }
            let _ = browser.wait().await;
        }
        self.handler.abort();
    }
}

/// One live Chromium tab.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl std::fmt::Debug for CdpPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpPage").finish_non_exhaustive()
    }
}

impl CdpPage {
    async fn eval_bool(&self, script: String) -> Result<bool, BrowserError> {
        let result = self.page.evaluate(script).await.map_err(driver)?;
        result.into_value::<bool>().map_err(|e| driver(e))
    }
}

fn driver(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

/// JSON-encode a string into a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

/// JS object literal describing a [`Locator`] for the finder library.
fn locator_spec(locator: &Locator) -> String {
    let (kind, value) = match locator {
        Locator::ButtonRole(v) => ("button", v),
        Locator::LinkRole(v) => ("link", v),
        Locator::VisibleText(v) => ("text", v),
        Locator::Label(v) => ("label", v),
        Locator::Placeholder(v) => ("placeholder", v),
        Locator::NameAttr(v) => ("name", v),
        Locator::Id(v) => ("id", v),
        Locator::Css(v) => ("css", v),
    };
    format!("{{kind: {}, value: {}}}", js_str(kind), js_str(value))
}

/// Finder library shared by every injected action.
///
/// Declares `norm`, `visible` and `find(spec)` in the surrounding scope.
const FINDER_JS: &str = r#"
const norm = t => (t || '').replace(/\s+/g, ' ').trim().toLowerCase();
const visible = el => {
    const r = el.getBoundingClientRect();
    const s = getComputedStyle(el);
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
};
const accName = el => norm(
    el.getAttribute('aria-label')
    || (el.labels && el.labels[0] && el.labels[0].innerText)
    || el.innerText
    || el.value
    || el.getAttribute('title')
);
const byRole = (role, name) => {
    const n = norm(name);
    const sel = role === 'button'
        ? 'button, input[type=button], input[type=submit], [role=button]'
        : 'a, [role=link]';
    return Array.from(document.querySelectorAll(sel))
        .find(el => visible(el) && accName(el).includes(n)) || null;
};
const byLabel = name => {
    const n = norm(name);
    const lab = Array.from(document.querySelectorAll('label'))
        .find(l => norm(l.innerText).includes(n));
    if (lab) {
        if (lab.htmlFor) {
            const el = document.getElementById(lab.htmlFor);
            if (el) return el;
        }
        const nested = lab.querySelector('input, select, textarea');
        if (nested) return nested;
    }
    return Array.from(document.querySelectorAll('[aria-label]'))
        .find(el => norm(el.getAttribute('aria-label')).includes(n)) || null;
};
const find = spec => {
    try {
        switch (spec.kind) {
            case 'button': return byRole('button', spec.value);
            case 'link': return byRole('link', spec.value);
            case 'text': {
                const n = norm(spec.value);
                return Array.from(document.querySelectorAll('body *'))
                    .find(el => visible(el) && el.children.length === 0
                        && norm(el.innerText).includes(n)) || null;
            }
            case 'label': return byLabel(spec.value);
            case 'placeholder':
                return Array.from(document.querySelectorAll('[placeholder]'))
                    .find(el => norm(el.getAttribute('placeholder')).includes(norm(spec.value)))
                    || null;
            case 'name': return document.querySelector('[name=' + CSS.escape(spec.value) + ']');
            case 'id': return document.getElementById(spec.value);
            case 'css': return document.querySelector(spec.value);
        }
    } catch (e) {
        return null;
    }
    return null;
};
"#;

/// Build one self-contained action expression: find the element described
/// by `spec`, run `action` with it bound to `el`, or yield `false`.
fn action_script(spec: &str, action: &str) -> String {
    format!(
        "(() => {{\n{FINDER_JS}\nconst el = find({spec});\nif (!el) return false;\n{action}\n}})()"
    )
}

#[async_trait]
impl BrowserPage for CdpPage {
    async fn accessibility_snapshot(&self) -> Result<Option<String>, BrowserError> {
        let script = format!(
            "(() => {{\n{FINDER_JS}\n{}\n}})()",
            r#"
const lines = [];
const roleOf = el => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit;
    const tag = el.tagName.toLowerCase();
    if (tag === 'a') return 'link';
    if (tag === 'button') return 'button';
    if (tag === 'select') return 'combobox';
    if (tag === 'textarea') return 'textbox';
    if (tag === 'img') return 'img';
    if (tag === 'form') return 'form';
    if (tag === 'label') return 'label';
    if (tag === 'option') return 'option';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'input') {
        const t = (el.getAttribute('type') || 'text').toLowerCase();
        if (t === 'submit' || t === 'button') return 'button';
        if (t === 'checkbox') return 'checkbox';
        if (t === 'radio') return 'radio';
        if (t === 'file') return 'fileinput';
        return 'textbox';
    }
    return null;
};
const label = el => {
    const name = (el.getAttribute('aria-label')
        || (el.labels && el.labels[0] && el.labels[0].innerText)
        || el.getAttribute('placeholder')
        || el.innerText
        || el.value
        || '').replace(/\s+/g, ' ').trim();
    return name.slice(0, 120);
};
const walk = (el, depth) => {
    if (!el || depth > 24) return;
    const role = roleOf(el);
    if (role && visible(el)) {
        const name = label(el);
        lines.push('  '.repeat(Math.min(depth, 8)) + role + (name ? ' "' + name + '"' : ''));
    }
    for (const child of el.children) walk(child, depth + 1);
};
if (document.body) walk(document.body, 0);
return lines.length ? lines.join('\n') : null;
"#
        );
        let result = self.page.evaluate(script).await.map_err(driver)?;
        result
            .into_value::<Option<String>>()
            .map_err(|e| driver(e))
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        let result = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(driver)?;
        result.into_value::<String>().map_err(|e| driver(e))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(driver)
    }

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!(url, "Navigating");
        self.page.goto(url).await.map_err(driver)?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    async fn click_first(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let script = action_script(
            &locator_spec(locator),
            "el.scrollIntoView({block: 'center'});\nel.click();\nreturn true;",
        );
        self.eval_bool(script).await
    }

    async fn fill_first(&self, locator: &Locator, value: &str) -> Result<bool, BrowserError> {
        let action = format!(
            r#"
const value = {};
el.focus();
const proto = el.tagName === 'TEXTAREA'
    ? HTMLTextAreaElement.prototype
    : HTMLInputElement.prototype;
const desc = Object.getOwnPropertyDescriptor(proto, 'value');
if (desc && desc.set) {{ desc.set.call(el, value); }} else {{ el.value = value; }}
el.dispatchEvent(new Event('input', {{bubbles: true}}));
el.dispatchEvent(new Event('change', {{bubbles: true}}));
return true;"#,
            js_str(value)
        );
        self.eval_bool(action_script(&locator_spec(locator), &action))
            .await
    }

    async fn select_first(&self, locator: &Locator, value: &str) -> Result<bool, BrowserError> {
        let action = format!(
            r#"
const wanted = {};
const opts = Array.from(el.options || []);
const hit = opts.find(o => o.value === wanted)
    || opts.find(o => norm(o.text) === norm(wanted));
if (!hit) return false;
el.value = hit.value;
el.dispatchEvent(new Event('change', {{bubbles: true}}));
return true;"#,
            js_str(value)
        );
        self.eval_bool(action_script(&locator_spec(locator), &action))
            .await
    }

    async fn set_files_first(&self, locator: &Locator, path: &Path) -> Result<bool, BrowserError> {
        // Tag the JS-located input, then hand it to CDP by selector.
        let tag = action_script(
            &locator_spec(locator),
            &format!("el.setAttribute('{UPLOAD_MARKER}', '1');\nreturn true;"),
        );
        if !self.eval_bool(tag).await? {
            return Ok(false);
        }
        let element = self
            .page
            .find_element(format!("[{UPLOAD_MARKER}]"))
            .await
            .map_err(driver)?;
        let params = SetFileInputFilesParams::builder()
            .file(path.display().to_string())
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(BrowserError::Driver)?;
        self.page.execute(params).await.map_err(driver)?;
        let _ = self
            .page
            .evaluate(format!(
                "(() => {{ const el = document.querySelector('[{UPLOAD_MARKER}]'); if (el) el.removeAttribute('{UPLOAD_MARKER}'); return true; }})()"
            ))
            .await;
        Ok(true)
    }

    async fn scroll_by(&self, dy: i64) -> Result<(), BrowserError> {
        self.page
            .evaluate(format!("window.scrollBy(0, {dy})"))
            .await
            .map_err(driver)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let url = self.page.url().await.map_err(driver)?;
        Ok(url.unwrap_or_default())
    }

    async fn wait_network_idle(&self, timeout: Duration) -> Result<bool, BrowserError> {
        // readyState polling stands in for true network-idle tracking.
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let result = self
                .page
                .evaluate("document.readyState === 'complete'")
                .await
                .map_err(driver)?;
            if result.into_value::<bool>().unwrap_or(false) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}
