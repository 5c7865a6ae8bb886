//! ShadowRun command-line entry point: snapshot the given volumes, expose the
//! shadow copies to a command, then clean up.

use anyhow::{Context, Result};
use shadowrun_core::launch::{self, Console};
use shadowrun_core::{
    logging, ProcessEnvironment, ProcessExecutor, ShadowDefaults, DEFAULT_ERROR_CODE_START,
};
use std::env;
use std::io::{self, BufRead, Write};

fn main() {
    let code = run();
    std::process::exit(code);
}

fn load_defaults() -> Result<ShadowDefaults> {
    let mut defaults = ShadowDefaults::from_env().with_context(|| {
        format!(
            "failed to load defaults from {}",
            env::var(shadowrun_core::config::CONFIG_ENV).unwrap_or_default()
        )
    })?;
    if let Some(level) = logging::level_from_env() {
        defaults.log_level = Some(level);
    }
    Ok(defaults)
}

fn wait_for_enter() {
    print!("Press <ENTER> to continue...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

/// Returns normally so that teardown runs before the process exits.
fn run() -> i32 {
    let argv: Vec<String> = env::args().skip(1).collect();

    let defaults = match load_defaults() {
        Ok(defaults) => defaults,
        Err(err) => {
            eprintln!("error: {err:#}");
            return DEFAULT_ERROR_CODE_START;
        }
    };

    launch::run(
        argv,
        &defaults,
        shadowrun_vss::volume_host(),
        shadowrun_vss::open_session,
        Console {
            executor: &mut ProcessExecutor,
            environment: &mut ProcessEnvironment,
            pause: &mut wait_for_enter,
        },
    )
}
