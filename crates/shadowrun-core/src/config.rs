use crate::error::{ShadowError, ShadowResult, DEFAULT_ERROR_CODE_START};
use crate::exec::CommandSpec;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming an optional defaults file.
pub const CONFIG_ENV: &str = "SHADOWRUN_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Notice,
    Error,
    Silent,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Notice => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Silent => LevelFilter::Off,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(ShadowError::InvalidArgument(format!(
                "unknown log level `{other}` (expected trace, debug, info, notice, error or silent)"
            ))),
        }
    }
}

/// Defaults read from the file named by `SHADOWRUN_CONFIG`. Command-line
/// flags always win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowDefaults {
    #[serde(default)]
    pub log_level: Option<LogLevel>,

    #[serde(default = "default_error_code_start")]
    pub error_code_start: i32,

    #[serde(default)]
    pub mount: bool,

    #[serde(default = "default_force_quotes")]
    pub force_quotes: bool,

    #[serde(skip)]
    pub path: Option<PathBuf>,
}

fn default_error_code_start() -> i32 {
    DEFAULT_ERROR_CODE_START
}

fn default_force_quotes() -> bool {
    true
}

impl Default for ShadowDefaults {
    fn default() -> Self {
        Self {
            log_level: None,
            error_code_start: default_error_code_start(),
            mount: false,
            force_quotes: default_force_quotes(),
            path: None,
        }
    }
}

impl ShadowDefaults {
    pub fn load<P: AsRef<Path>>(path: P) -> ShadowResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut cfg = if matches!(path.extension().and_then(|ext| ext.to_str()), Some(ext) if ext.eq_ignore_ascii_case("toml"))
        {
            toml::from_str::<Self>(&contents)?
        } else {
            serde_yaml::from_str::<Self>(&contents)?
        };

        cfg.path = Some(path.to_path_buf());

        if cfg.error_code_start == 0 {
            return Err(ShadowError::InvalidConfig(
                "error_code_start must be non-zero".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Load the file named by `SHADOWRUN_CONFIG`, or built-in defaults when
    /// the variable is unset or empty.
    pub fn from_env() -> ShadowResult<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }
}

/// One fully parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub volumes: Vec<String>,
    pub script: Option<PathBuf>,
    pub exec: Option<PathBuf>,
    pub exec_args: Vec<String>,
    pub force_quotes: bool,
    pub wait: bool,
    pub env: bool,
    pub mount: bool,
    pub drive_letters: String,
    pub error_code_start: i32,
    pub log_level: LogLevel,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::with_defaults(&ShadowDefaults::default())
    }
}

impl RunConfig {
    pub fn with_defaults(defaults: &ShadowDefaults) -> Self {
        Self {
            volumes: Vec::new(),
            script: None,
            exec: None,
            exec_args: Vec::new(),
            force_quotes: defaults.force_quotes,
            wait: false,
            env: false,
            mount: defaults.mount,
            drive_letters: String::new(),
            error_code_start: defaults.error_code_start,
            log_level: defaults.log_level.unwrap_or_default(),
        }
    }

    /// The command to launch after the set is ready, if any.
    pub fn command(&self) -> Option<CommandSpec> {
        self.exec.as_ref().map(|program| CommandSpec {
            program: program.clone(),
            args: self.exec_args.clone(),
            quote_arguments: self.force_quotes,
        })
    }
}
