//! Command-line scanning.
//!
//! Flags begin with `-` or `/` and compare case-insensitively; valued flags
//! use `name=value`. The first bare token starts the volume list, and `--`
//! inside the list hands every remaining token to the exec command.

use crate::config::{LogLevel, RunConfig, ShadowDefaults};
use crate::error::ShadowError;
use log::debug;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A scan failure together with the exit code base in effect when it was
/// detected.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct UsageError {
    pub source: ShadowError,
    pub exit_base: i32,
}

impl UsageError {
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code(self.exit_base)
    }
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Run(RunConfig),
}

pub fn logo() -> String {
    format!(
        "ShadowRun (Volume Shadow Copy Runner) version {VERSION}.\n\
         Copyright (C) 2022 Albertony. All rights reserved.\n"
    )
}

pub fn usage() -> &'static str {
    "Usage:\n\
     \x20  ShadowRun [flags] [volumes]\n\
     \n\
     List of flags:\n\
     \x20 -?                 - Displays this usage screen\n\
     \x20 -h                 - Displays this usage screen\n\
     \x20 -nw                - Create no-writer shadow copies (implied and deprecated)\n\
     \x20 -script={file.cmd} - Environment variable configuration script creation\n\
     \x20 -exec={command}    - Custom command executed after shadow creation\n\
     \x20 -wait              - Wait before program termination\n\
     \x20 -tracing           - Same as -log-level=trace (deprecated)\n\
     \x20 -env               - Set process environment variables\n\
     \x20 -mount             - Mount shadow copies as temporary drives\n\
     \x20 -drive={ABC}       - Specific drive letters to use for mounting\n\
     \x20 -errorcode=1       - First exit code value to use for internal errors, not from the command\n\
     \x20 -nq                - Do not force quotes around arguments specified with -arg or after --\n\
     \x20 -arg={string}      - Argument to append after the -exec command, repeat or use -- for multiple arguments\n\
     \x20 -log-level={debug} - Log level, one of: trace, debug, info (default), notice, error or silent\n\
     \x20 -- {args}...       - Pass all following arguments directly to the -exec command\n"
}

/// No arguments at all, or a lone `-?` / `-h`.
pub fn is_help_request<S: AsRef<str>>(args: &[S]) -> bool {
    match args {
        [] => true,
        [only] => match_flag(only.as_ref(), "?") || match_flag(only.as_ref(), "h"),
        _ => false,
    }
}

/// `-name` or `/name`.
fn match_flag(arg: &str, name: &str) -> bool {
    match arg.strip_prefix(['-', '/']) {
        Some(rest) => rest.eq_ignore_ascii_case(name),
        None => false,
    }
}

/// `-name=value` or `/name=value`. An empty value does not match.
fn match_value(arg: &str, name: &str, dequote: bool) -> Option<String> {
    let rest = arg.strip_prefix(['-', '/'])?;
    let (key, value) = rest.split_once('=')?;
    if !key.eq_ignore_ascii_case(name) || value.is_empty() {
        return None;
    }
    let value = if dequote && value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    };
    Some(value.to_string())
}

fn invalid(message: String, exit_base: i32) -> UsageError {
    UsageError {
        source: ShadowError::InvalidArgument(message),
        exit_base,
    }
}

/// Pull the first `-log-level=..` or `-tracing` out of `args`.
fn take_log_level(args: &mut Vec<String>, exit_base: i32) -> Result<Option<LogLevel>, UsageError> {
    for index in 0..args.len() {
        if let Some(value) = match_value(&args[index], "log-level", true) {
            let level = value.parse::<LogLevel>().map_err(|_| {
                invalid(
                    format!(
                        "The parameter '{value}' must be trace, debug, info, notice, error or silent!"
                    ),
                    exit_base,
                )
            })?;
            args.remove(index);
            return Ok(Some(level));
        }
        if match_flag(&args[index], "tracing") {
            args.remove(index);
            return Ok(Some(LogLevel::Trace));
        }
    }
    Ok(None)
}

/// Scan `args` (without the program name). `accepts` decides whether a bare
/// token is a volume or file share path.
///
/// `apply_level` receives the effective log level before any other flag is
/// looked at, so everything logged while scanning honours `-log-level`.
pub fn scan<I, S, F, L>(
    args: I,
    defaults: &ShadowDefaults,
    accepts: F,
    mut apply_level: L,
) -> Result<Invocation, UsageError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(&str) -> bool,
    L: FnMut(LogLevel),
{
    let mut args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut cfg = RunConfig::with_defaults(defaults);

    if is_help_request(&args) {
        return Ok(Invocation::Help);
    }

    let explicit = take_log_level(&mut args, cfg.error_code_start)?;
    if let Some(level) = explicit {
        cfg.log_level = level;
    }
    apply_level(cfg.log_level);
    match explicit {
        Some(level) => debug!("Log level {level}"),
        None => debug!("Using default log level"),
    }

    let mut tokens = args.into_iter();
    while let Some(arg) = tokens.next() {
        if let Some(value) = match_value(&arg, "script", true) {
            debug!("- Environment variable configuration script creation '{value}'");
            cfg.script = Some(PathBuf::from(value));
            continue;
        }

        if let Some(value) = match_value(&arg, "exec", true) {
            debug!("- Execute binary/script after shadow creation '{value}'");
            let is_file = fs::metadata(&value).map(|m| !m.is_dir()).unwrap_or(false);
            if !is_file {
                return Err(invalid(
                    format!(
                        "The parameter '{value}' must be an existing file! \
                         For parameters use '-arg' or '--' options"
                    ),
                    cfg.error_code_start,
                ));
            }
            cfg.exec = Some(PathBuf::from(value));
            continue;
        }

        if match_flag(&arg, "wait") {
            debug!("- Wait after shadow copy has been created");
            cfg.wait = true;
            continue;
        }

        if let Some(value) = match_value(&arg, "errorcode", true) {
            match value.trim().parse::<i32>() {
                Ok(code) if code != 0 => {
                    debug!("- Program errors will be reported with exit codes starting at {code}");
                    cfg.error_code_start = code;
                }
                _ => {
                    return Err(invalid(
                        format!("The parameter '{value}' must be a non-zero integer!"),
                        cfg.error_code_start,
                    ));
                }
            }
            continue;
        }

        if match_flag(&arg, "env") {
            debug!("- Set process environment");
            cfg.env = true;
            continue;
        }

        if match_flag(&arg, "mount") {
            debug!("- Mount shadow copies as temporary drives");
            cfg.mount = true;
            continue;
        }

        if let Some(value) = match_value(&arg, "drive", true) {
            debug!("- Mount shadow copies as temporary drives '{value}'");
            cfg.drive_letters = value;
            cfg.mount = true;
            continue;
        }

        // Quotes are only stripped while they will be re-added at launch.
        if let Some(value) = match_value(&arg, "arg", cfg.force_quotes) {
            debug!("- Including additional argument when executing binary/script '{value}'");
            cfg.exec_args.push(value);
            continue;
        }

        if match_flag(&arg, "nq") {
            debug!("- Do not force quotes around arguments");
            cfg.force_quotes = false;
            continue;
        }

        if match_flag(&arg, "nw") {
            debug!("- No-writers option is implied and ignored");
            continue;
        }

        if accepts(&arg) {
            debug!("Volume {arg} was added as unnamed parameter");
            cfg.volumes.push(arg);
            let mut pass_through = false;
            for arg in tokens.by_ref() {
                if pass_through {
                    cfg.exec_args.push(arg);
                } else if match_flag(&arg, "-") {
                    pass_through = true;
                } else if accepts(&arg) {
                    cfg.volumes.push(arg);
                } else {
                    return Err(invalid(
                        format!(
                            "Parameter {arg} is expected to be a volume or a file share path! \
                             Example: ShadowRun C:"
                        ),
                        cfg.error_code_start,
                    ));
                }
            }
            return Ok(Invocation::Run(cfg));
        }

        return Err(invalid(
            format!("Parameter '{arg}' was not expected!"),
            cfg.error_code_start,
        ));
    }

    Err(invalid(
        "Missing volume parameter!".to_string(),
        cfg.error_code_start,
    ))
}
