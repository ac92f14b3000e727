//! Lua 5.4 script host.
//!
//! A script file is a chunk that returns its sample function:
//!
//! ```lua
//! return function(t)
//!     return 0.6 * chip.sin(t, 220) + 0.2 * chip.rnd(-1, 1)
//! end
//! ```
//!
//! A chunk that returns nothing but defines a global `main` function works too.
//! Every load builds a fresh sandboxed state (`math`, `string`, `table`,
//! `coroutine`, `utf8` only), so globals never leak from one version of a file
//! into the next. The random generator is owned by the host and shared by every
//! script it loads.
//!
//! The `chip` table:
//!
//! | name                  | alias  | call                         |
//! |-----------------------|--------|------------------------------|
//! | `sine`                | `sin`  | `(t, freq [, phase])`        |
//! | `sawtooth`            | `saw`  | `(t, freq [, phase])`        |
//! | `square`              | `sq`   | `(t, freq [, phase])`        |
//! | `triangle`            | `tri`  | `(t, freq [, phase])`        |
//! | `random`              | `rnd`, `rndf` | `()`, `(max)`, `(min, max)` |
//! | `random_int`          | `rndi` | `(max)`, `(min, max)`        |
//! | `time`                |        | `()`                         |
//! | `sample_rate`         |        | number                       |
//!
//! Passing `nil` as `t` uses the time currently being rendered.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use livechip_core::osc::Waveform;
use mlua::{Function, Lua, LuaOptions, StdLib, Table, Value, Variadic};
use parking_lot::Mutex;

use super::{SampleScript, ScriptMeta};
use crate::error::{ScriptError, ScriptResult};
use crate::noise::SignalRng;

const OSCILLATORS: [(&str, &str, Waveform); 4] = [
    ("sine", "sin", Waveform::Sine),
    ("sawtooth", "saw", Waveform::Sawtooth),
    ("square", "sq", Waveform::Square),
    ("triangle", "tri", Waveform::Triangle),
];

/// Builds [`LuaScript`]s that share one sample rate and one random generator.
pub struct LuaScriptHost {
    sample_rate: u32,
    rng: Arc<Mutex<SignalRng>>,
}

impl LuaScriptHost {
    /// `seed = None` seeds the random family from OS entropy.
    pub fn new(sample_rate: u32, seed: Option<u64>) -> Self {
        Self { sample_rate, rng: Arc::new(Mutex::new(SignalRng::new(seed))) }
    }

    /// Evaluate `source` and resolve its sample function.
    ///
    /// Fails with [`ScriptError::Lua`] on syntax or load-time errors and with
    /// [`ScriptError::MissingEntry`] when no function is provided.
    pub fn load_source(&self, name: &str, source: &str) -> ScriptResult<LuaScript> {
        let clock = Arc::new(AtomicU64::new(0f64.to_bits()));
        let lua = self.sandbox(&clock)?;

        let returned: Value = lua.load(source).set_name(format!("={name}")).eval()?;
        let globals = lua.globals();
        let main = match returned {
            Value::Function(f) => {
                globals.set("main", f.clone())?;
                f
            }
            other => match globals.get::<Value>("main")? {
                Value::Function(f) => f,
                _ => return Err(ScriptError::MissingEntry(other.type_name().to_string())),
            },
        };

        log::debug!("loaded lua script '{name}'");
        Ok(LuaScript { name: name.to_string(), main, clock, lua })
    }

    /// Read and load `path`, recording its modification time.
    pub fn load_file(&self, path: impl AsRef<Path>) -> ScriptResult<(LuaScript, ScriptMeta)> {
        let path = path.as_ref();
        let meta = ScriptMeta::read_from(path);
        let source = std::fs::read_to_string(path)?;
        let script = self.load_source(&path.display().to_string(), &source)?;
        Ok((script, meta))
    }

    fn sandbox(&self, clock: &Arc<AtomicU64>) -> mlua::Result<Lua> {
        let libs = StdLib::MATH | StdLib::STRING | StdLib::TABLE | StdLib::COROUTINE | StdLib::UTF8;
        let lua = Lua::new_with(libs, LuaOptions::default())?;

        let globals = lua.globals();
        for name in ["loadfile", "dofile", "collectgarbage"] {
            globals.set(name, Value::Nil)?;
        }
        globals.set(
            "print",
            lua.create_function(|_, args: Variadic<Value>| {
                let line: Vec<String> = args.iter().map(display).collect();
                log::info!("[lua] {}", line.join("\t"));
                Ok(())
            })?,
        )?;

        let chip = self.chip_table(&lua, clock)?;
        globals.set("chip", chip)?;
        Ok(lua)
    }

    fn chip_table(&self, lua: &Lua, clock: &Arc<AtomicU64>) -> mlua::Result<Table> {
        let chip = lua.create_table()?;

        for (long, short, wave) in OSCILLATORS {
            let clock = Arc::clone(clock);
            let f = lua.create_function(move |_, (t, freq, phase): (Option<f64>, f64, Option<f64>)| {
                let t = t.unwrap_or_else(|| read_clock(&clock));
                Ok(wave.eval(t, freq, phase.unwrap_or(0.0)))
            })?;
            chip.set(long, f.clone())?;
            chip.set(short, f)?;
        }

        let rng = Arc::clone(&self.rng);
        let random = lua.create_function(move |_, (a, b): (Option<f64>, Option<f64>)| {
            let mut rng = rng.lock();
            Ok(match (a, b) {
                (Some(min), Some(max)) => rng.random_range(min, max),
                (Some(max), None) => rng.random_max(max),
                (None, _) => rng.random(),
            })
        })?;
        chip.set("random", random.clone())?;
        chip.set("rnd", random.clone())?;
        chip.set("rndf", random)?;

        let rng = Arc::clone(&self.rng);
        let random_int = lua.create_function(move |_, (a, b): (i64, Option<i64>)| {
            let mut rng = rng.lock();
            Ok(match b {
                Some(max) => rng.random_int_range(a, max),
                None => rng.random_int(a),
            })
        })?;
        chip.set("random_int", random_int.clone())?;
        chip.set("rndi", random_int)?;

        let clock = Arc::clone(clock);
        chip.set("time", lua.create_function(move |_, ()| Ok(read_clock(&clock)))?)?;
        chip.set("sample_rate", self.sample_rate)?;

        Ok(chip)
    }
}

#[inline]
fn read_clock(clock: &AtomicU64) -> f64 {
    f64::from_bits(clock.load(Ordering::Relaxed))
}

fn display(v: &Value) -> String {
    match v {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

/// A loaded Lua sample function.
pub struct LuaScript {
    name: String,
    main: Function,
    clock: Arc<AtomicU64>,
    // Keeps the state alive; `main` only holds a weak reference to it.
    lua: Lua,
}

impl SampleScript for LuaScript {
    fn sample(&self, t: f64) -> ScriptResult<f64> {
        self.clock.store(t.to_bits(), Ordering::Relaxed);
        let value: Value = self.main.call(t)?;
        self.to_sample(value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl core::fmt::Debug for LuaScript {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LuaScript").field("name", &self.name).finish_non_exhaustive()
    }
}

impl LuaScript {
    /// Numbers pass through; strings go through Lua's own number coercion.
    #[allow(clippy::cast_precision_loss)]
    fn to_sample(&self, value: Value) -> ScriptResult<f64> {
        match value {
            Value::Number(n) => Ok(n),
            Value::Integer(i) => Ok(i as f64),
            Value::String(_) => self.lua.coerce_number(value)?.ok_or(ScriptError::NotNumeric("string")),
            other => Err(ScriptError::NotNumeric(other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livechip_core::osc::{sawtooth, sine};

    fn host() -> LuaScriptHost {
        LuaScriptHost::new(44_100, Some(7))
    }

    fn load(src: &str) -> LuaScript {
        host().load_source("test", src).expect("script loads")
    }

    #[test]
    fn returned_function_is_the_entry() {
        let s = load("return function(t) return chip.sin(t, 440) end");
        for i in 0..64 {
            let t = f64::from(i) / 44_100.0;
            assert!((s.sample(t).unwrap() - sine(t, 440.0, 0.0)).abs() < 1e-12);
        }
        assert_eq!(s.name(), "test");
    }

    #[test]
    fn global_main_is_accepted() {
        let s = load("function main(t) return chip.saw(t, 2, 0.1) end");
        assert!((s.sample(0.3).unwrap() - sawtooth(0.3, 2.0, 0.1)).abs() < 1e-12);
    }

    #[test]
    fn missing_entry_is_reported() {
        let err = host().load_source("bad", "return 42").unwrap_err();
        assert!(matches!(err, ScriptError::MissingEntry(ref got) if got == "integer"));
        let err = host().load_source("empty", "local x = 1").unwrap_err();
        assert!(matches!(err, ScriptError::MissingEntry(ref got) if got == "nil"));
    }

    #[test]
    fn syntax_errors_fail_the_load() {
        let err = host().load_source("broken", "return function(t) return t +").unwrap_err();
        assert!(matches!(err, ScriptError::Lua(_)));
    }

    #[test]
    fn runtime_errors_fail_the_sample_only() {
        let s = load("return function(t) if t > 1 then error('late') end return 0.5 end");
        assert_eq!(s.sample(0.5).unwrap(), 0.5);
        assert!(matches!(s.sample(2.0), Err(ScriptError::Lua(_))));
        assert_eq!(s.sample(0.0).unwrap(), 0.5);
    }

    #[test]
    fn results_are_coerced_like_lua_does() {
        assert_eq!(load("return function() return 3 end").sample(0.0).unwrap(), 3.0);
        assert_eq!(load("return function() return ' 0.25 ' end").sample(0.0).unwrap(), 0.25);
        assert_eq!(load("return function() return '0x10' end").sample(0.0).unwrap(), 16.0);
        assert_eq!(load("return function() return '1e-1' end").sample(0.0).unwrap(), 0.1);
        assert!(matches!(
            load("return function() return 'loud' end").sample(0.0),
            Err(ScriptError::NotNumeric("string"))
        ));
        assert!(matches!(
            load("return function() return {} end").sample(0.0),
            Err(ScriptError::NotNumeric("table"))
        ));
        assert!(matches!(
            load("return function() end").sample(0.0),
            Err(ScriptError::NotNumeric("nil"))
        ));
    }

    #[test]
    fn nil_time_reads_the_render_clock() {
        let s = load(
            "return function(t)
                 assert(chip.time() == t)
                 return chip.sq(nil, 1) + chip.tri(nil, 1)
             end",
        );
        // square(0.25) = 1, triangle(0.25) = 1
        assert_eq!(s.sample(0.25).unwrap(), 2.0);
        // square(0.75) = -1, triangle(0.75) = -1
        assert_eq!(s.sample(0.75).unwrap(), -2.0);
    }

    #[test]
    fn every_name_is_installed() {
        let s = load(
            "return function()
                 local names = { 'sine', 'sin', 'sawtooth', 'saw', 'square', 'sq', 'triangle', 'tri',
                                 'random', 'rnd', 'rndf', 'random_int', 'rndi', 'time' }
                 for _, n in ipairs(names) do
                     if type(chip[n]) ~= 'function' then return -1 end
                 end
                 return chip.sample_rate
             end",
        );
        assert_eq!(s.sample(0.0).unwrap(), 44_100.0);
    }

    #[test]
    fn sandbox_hides_host_access() {
        let s = load(
            "return function()
                 if os ~= nil or io ~= nil or debug ~= nil or package ~= nil then return 1 end
                 if dofile ~= nil or loadfile ~= nil then return 2 end
                 return 0
             end",
        );
        assert_eq!(s.sample(0.0).unwrap(), 0.0);
    }

    #[test]
    fn random_family_respects_ranges() {
        let s = load(
            "return function()
                 for _ = 1, 2000 do
                     local u = chip.rnd()
                     if u < 0 or u >= 1 then return 1 end
                     local m = chip.rndf(4)
                     if m < 0 or m >= 4 then return 2 end
                     local r = chip.random(3, -2)
                     if r < -2 or r > 3 then return 3 end
                     local i = chip.rndi(3)
                     if i < 0 or i > 3 or math.type(i) ~= 'integer' then return 4 end
                     local j = chip.random_int(-5, 5)
                     if j < -5 or j > 5 then return 5 end
                 end
                 return 0
             end",
        );
        assert_eq!(s.sample(0.0).unwrap(), 0.0);
    }

    #[test]
    fn same_seed_same_noise() {
        let src = "return function() return chip.rnd(-1, 1) end";
        let a = LuaScriptHost::new(44_100, Some(99)).load_source("a", src).unwrap();
        let b = LuaScriptHost::new(44_100, Some(99)).load_source("b", src).unwrap();
        for _ in 0..32 {
            assert_eq!(a.sample(0.0).unwrap().to_bits(), b.sample(0.0).unwrap().to_bits());
        }
    }

    #[test]
    fn reload_starts_from_clean_globals() {
        let h = host();
        let first = h
            .load_source("v1", "counter = 10 return function() return counter end")
            .unwrap();
        let second = h
            .load_source("v2", "return function() return counter or 0 end")
            .unwrap();
        assert_eq!(first.sample(0.0).unwrap(), 10.0);
        assert_eq!(second.sample(0.0).unwrap(), 0.0);
    }

    #[test]
    fn load_file_records_meta() {
        let path = std::env::temp_dir().join(format!("livechip-load-{}.lua", std::process::id()));
        std::fs::write(&path, "return function(t) return t * 2 end").unwrap();

        let (script, meta) = host().load_file(&path).unwrap();
        assert_eq!(script.sample(0.25).unwrap(), 0.5);
        assert_eq!(meta.path, path);
        assert!(meta.modified.is_some());

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(host().load_file(&path), Err(ScriptError::Io(_))));
    }
}
