use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use livechip_engine::EngineConfig;
use log::LevelFilter;

#[derive(Debug, Parser, Clone)]
#[command(name = "livechip", version)]
#[command(about = "Play a Lua sample script live, reloading it whenever the file changes")]
pub struct Cli {
    /// Lua script returning `function(t) ... end`.
    #[arg(required_unless_present = "list_devices")]
    pub script: Option<PathBuf>,

    /// Print the available output devices and exit.
    #[arg(long)]
    pub list_devices: bool,

    /// TOML file with engine settings; flags below override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output device name (exact or substring match).
    #[arg(long)]
    pub device: Option<String>,

    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Frames per block.
    #[arg(long)]
    pub frame_size: Option<usize>,

    /// Ring capacity in blocks.
    #[arg(long)]
    pub buffer_blocks: Option<usize>,

    /// Initial volume, 0.0 to 1.0.
    #[arg(long)]
    pub volume: Option<f32>,

    /// Seed for chip.random / chip.random_int.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many seconds (otherwise plays until Ctrl+C / SIGTERM).
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Do not watch the script for changes.
    #[arg(long)]
    pub no_reload: bool,

    /// How often to check the script's modification time.
    #[arg(long, default_value_t = 250)]
    pub reload_interval_ms: u64,

    /// -v for debug, -vv for trace. RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Config file (if any) with command-line overrides applied, validated.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut cfg = match &self.config {
            Some(path) => read_config(path)?,
            None => EngineConfig::default(),
        };
        self.apply_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides(&self, cfg: &mut EngineConfig) {
        if let Some(v) = self.sample_rate {
            cfg.sample_rate = v;
        }
        if let Some(v) = self.frame_size {
            cfg.frame_size = v;
        }
        if let Some(v) = self.buffer_blocks {
            cfg.buffer_blocks = v;
        }
        if let Some(v) = self.volume {
            cfg.volume = v;
        }
        if let Some(v) = &self.device {
            cfg.device = Some(v.clone());
        }
        if let Some(v) = self.seed {
            cfg.seed = Some(v);
        }
    }

    pub fn duration(&self) -> Result<Option<Duration>> {
        self.duration
            .map(|s| Duration::try_from_secs_f64(s).with_context(|| format!("invalid --duration {s}")))
            .transpose()
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms.max(1))
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn read_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
