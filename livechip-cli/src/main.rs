//! livechip: play a Lua sample script through the default output device and
//! hot-reload it on every save.

mod cli;
mod watch;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use livechip_engine::{list_output_devices, CpalBackend, Engine, LuaScriptHost};

use crate::cli::Cli;
use crate::watch::{reload, ScriptWatcher};

const STATS_EVERY: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    if cli.list_devices {
        println!("Available output devices:");
        for name in list_output_devices()? {
            println!("- {name}");
        }
        return Ok(());
    }

    let path = cli.script.as_deref().context("no script given")?;
    let config = cli.engine_config()?;
    let duration = cli.duration()?;

    let host = LuaScriptHost::new(config.sample_rate, config.seed);
    let (script, meta) = host
        .load_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    // SIGINT/SIGTERM only clear the flag; teardown happens once, below.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::Release))
            .context("failed to install the termination handler")?;
    }

    let mut engine = Engine::new(config, CpalBackend::new())?;
    let mut watcher = ScriptWatcher::new(&meta);
    engine.swap_script_from_file(Arc::new(script), meta);
    engine.start()?;

    log::info!(
        "playing {} (volume {:.2}{})",
        path.display(),
        engine.volume(),
        if cli.no_reload { ", reload off" } else { "" }
    );
    if let Some(d) = duration {
        log::info!("auto-stop after {:.1}s", d.as_secs_f64());
    }

    let deadline = duration.map(|d| Instant::now() + d);
    run(&engine, &host, &mut watcher, &cli, deadline, &running, path);

    if !running.load(Ordering::Acquire) {
        log::info!("termination requested, shutting down");
    }
    engine.stop();
    Ok(())
}

fn run(
    engine: &Engine<CpalBackend>,
    host: &LuaScriptHost,
    watcher: &mut ScriptWatcher,
    cli: &Cli,
    deadline: Option<Instant>,
    running: &AtomicBool,
    path: &Path,
) {
    let poll = cli.reload_interval();
    let mut last_stats = Instant::now();
    while let Some(step) = next_step(Instant::now(), deadline, poll, running) {
        thread::sleep(step);

        if !cli.no_reload && watcher.changed() {
            log::info!("{} changed, reloading", path.display());
            reload(engine, host, watcher.path());
        }

        if last_stats.elapsed() >= STATS_EVERY {
            let s = engine.stats();
            log::debug!(
                "t={:.2}s buffered={} rendered={} errors={} underruns={}",
                engine.time_cursor(),
                engine.buffered(),
                s.frames_rendered,
                s.script_errors,
                s.underrun_frames
            );
            last_stats = Instant::now();
        }
    }
}

/// How long to sleep before the next poll, or `None` once playback should end
/// (termination requested or the deadline reached).
fn next_step(now: Instant, deadline: Option<Instant>, poll: Duration, running: &AtomicBool) -> Option<Duration> {
    if !running.load(Ordering::Acquire) {
        return None;
    }
    match deadline {
        Some(end) => match end.checked_duration_since(now) {
            Some(left) if !left.is_zero() => Some(left.min(poll)),
            _ => None,
        },
        None => Some(poll),
    }
}
