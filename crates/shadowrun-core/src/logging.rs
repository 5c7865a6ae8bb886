//! Logging bootstrap shared by the ShadowRun binaries.

use crate::config::LogLevel;
use env_logger::Env;
use log::LevelFilter;
use serde_json::json;
use std::env;
use std::io::Write;
use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

const FORMAT_ENV: &str = "SHADOWRUN_LOG_FORMAT";
const LEVEL_ENV: &str = "SHADOWRUN_LOG_LEVEL";

/// Level from `SHADOWRUN_LOG_LEVEL`, if set to something recognisable.
pub fn level_from_env() -> Option<LogLevel> {
    env::var(LEVEL_ENV).ok().and_then(|value| value.parse().ok())
}

/// Initialize the global logger once and apply `level`.
///
/// `SHADOWRUN_LOG_FORMAT=json` switches from plain console lines to JSON
/// objects. When `RUST_LOG` is set its filters win over `level`.
pub fn init(level: LogLevel) {
    let _ = INIT.get_or_init(configure);
    set_level(level);
}

/// Change the level after initialization, e.g. once `-log-level` is known.
pub fn set_level(level: LogLevel) {
    if env::var_os("RUST_LOG").is_none() {
        log::set_max_level(level.filter());
    }
}

fn configure() {
    let format = env::var(FORMAT_ENV)
        .unwrap_or_else(|_| String::from("plain"))
        .to_lowercase();

    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Trace);
    builder.parse_env(Env::default());

    if format == "json" {
        builder.format(|buf, record| {
            let ts = buf.timestamp().to_string();
            let payload = json!({
                "timestamp": ts,
                "level": record.level().to_string().to_lowercase(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", payload)
        });
    } else {
        builder.format(|buf, record| writeln!(buf, "{}", record.args()));
    }

    if let Err(err) = builder.try_init() {
        eprintln!("failed to initialize logger: {}", err);
    }
}
