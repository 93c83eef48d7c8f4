//! Debug artifact store.
//!
//! One directory per run under `<base>/run_<run_id>` (or the context's
//! explicit log directory), numbered screenshots, and a `run_meta.json`
//! blob at the end. Screenshot counters are keyed by run id so two runs
//! could never collide on filenames.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ArtifactError;
use crate::model::RunContext;

/// Filesystem-backed debug artifact store.
#[derive(Debug)]
pub struct DebugArtifactStore {
    base_dir: PathBuf,
    counters: Mutex<HashMap<String, u32>>,
}

impl DebugArtifactStore {
    /// A store rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Directory for this run, creating it if needed. Idempotent.
    pub fn ensure_run_dir(&self, ctx: &RunContext) -> Result<PathBuf, ArtifactError> {
        let dir = self.run_dir(ctx);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write `Screenshot_NNN_<step>.png`; NNN starts at 001 per run and
    /// advances on every call.
    pub fn save_screenshot(
        &self,
        ctx: &RunContext,
        step_name: &str,
        image: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.ensure_run_dir(ctx)?;
        let count = {
            let mut counters = self.counters.lock().expect("counter mutex poisoned");
            let slot = counters.entry(ctx.run_id.clone()).or_insert(0);
            *slot += 1;
            *slot
        };
        let path = dir.join(format!("Screenshot_{count:03}_{}.png", sanitize(step_name)));
        std::fs::write(&path, image)?;
        Ok(path)
    }

    /// Write the end-of-run `run_meta.json`.
    pub fn save_run_metadata(
        &self,
        ctx: &RunContext,
        metadata: &Value,
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.ensure_run_dir(ctx)?;
        let path = dir.join("run_meta.json");
        std::fs::write(&path, serde_json::to_vec_pretty(metadata)?)?;
        Ok(path)
    }

    fn run_dir(&self, ctx: &RunContext) -> PathBuf {
        ctx.log_directory
            .clone()
            .unwrap_or_else(|| self.base_dir.join(format!("run_{}", ctx.run_id)))
    }
}

/// Restrict a step name to `[A-Za-z0-9_-]`; empty results become "step".
fn sanitize(step_name: &str) -> String {
    let mut out = String::with_capacity(step_name.len());
    let mut last_was_filler = false;
    for c in step_name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            last_was_filler = false;
        } else if !last_was_filler {
            out.push('_');
            last_was_filler = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "step".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// List a run directory's screenshot filenames in counter order.
///
/// Convenience for tests and the `/status` views.
pub fn list_screenshots(dir: &Path) -> Result<Vec<String>, ArtifactError> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("Screenshot_") && name.ends_with(".png"))
        .collect();
    names.sort();
    Ok(names)
}
