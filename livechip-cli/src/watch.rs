//! Script reload by modification-time polling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use livechip_engine::{AudioBackend, Engine, LuaScriptHost, ScriptMeta};

pub struct ScriptWatcher {
    path: PathBuf,
    seen: Option<SystemTime>,
}

impl ScriptWatcher {
    pub fn new(meta: &ScriptMeta) -> Self {
        Self { path: meta.path.clone(), seen: meta.modified }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` once for each new modification time observed.
    /// A missing or unreadable file counts as unchanged.
    pub fn changed(&mut self) -> bool {
        match ScriptMeta::read_from(&self.path).modified {
            Some(now) if self.seen != Some(now) => {
                self.seen = Some(now);
                true
            }
            _ => false,
        }
    }
}

/// Load `path` and swap it in. On failure the current script keeps playing.
pub fn reload<B: AudioBackend>(engine: &Engine<B>, host: &LuaScriptHost, path: &Path) -> bool {
    match host.load_file(path) {
        Ok((script, meta)) => {
            engine.swap_script_from_file(Arc::new(script), meta);
            true
        }
        Err(e) => {
            log::error!("reload of {} failed, keeping the previous script: {e}", path.display());
            false
        }
    }
}
