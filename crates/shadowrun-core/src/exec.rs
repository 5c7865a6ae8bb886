//! Launching the user command once the snapshot set is ready.

use crate::error::{ShadowError, ShadowResult};
use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// What to run and how to render its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Wrap each argument in double quotes. Cleared by `-nq`.
    pub quote_arguments: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            quote_arguments: true,
        }
    }

    /// Arguments after `%NAME%` expansion and optional quoting.
    pub fn formatted_args<F>(&self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.args
            .iter()
            .map(|arg| {
                let expanded = expand_env_refs(arg, &lookup);
                if self.quote_arguments {
                    format!("\"{expanded}\"")
                } else {
                    expanded
                }
            })
            .collect()
    }

    /// The full command line as the child sees it. The program path is
    /// always quoted.
    pub fn command_line<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut line = format!("\"{}\"", self.program.display());
        for arg in self.formatted_args(lookup) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// Replace `%NAME%` with the value from `lookup`. Unknown names and a lone
/// `%` are kept verbatim.
pub fn expand_env_refs<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            Some(_) => {
                // "%%" stays as typed.
                out.push_str("%%");
                rest = &after[1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Runs a [`CommandSpec`] to completion and reports its exit code.
pub trait CommandExecutor {
    fn execute(&mut self, spec: &CommandSpec) -> ShadowResult<i32>;
}

/// Spawns a real child process that inherits the environment and working
/// directory of this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    fn lookup(name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&mut self, spec: &CommandSpec) -> ShadowResult<i32> {
        info!("Executing command {} ...", spec.command_line(Self::lookup));

        let mut command = Command::new(&spec.program);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            for arg in spec.formatted_args(Self::lookup) {
                command.raw_arg(arg);
            }
        }
        #[cfg(not(windows))]
        {
            let expanded = spec
                .args
                .iter()
                .map(|arg| expand_env_refs(arg, Self::lookup));
            command.args(expanded);
        }

        let status = command.status().map_err(|err| ShadowError::ResourceFault {
            operation: format!("launching {}", spec.program.display()),
            code: err.raw_os_error().map(|c| c as u32).unwrap_or_default(),
            message: err.to_string(),
        })?;

        let code = status.code().ok_or_else(|| ShadowError::ResourceFault {
            operation: format!("waiting for {}", spec.program.display()),
            code: 0,
            message: format!("child terminated without an exit code ({status})"),
        })?;
        debug!("- Command exited with code {code}");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SHADOW_DRIVE_1" => Some("B:".into()),
            "SHADOW_SET_ID" => Some("{abc}".into()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_references() {
        assert_eq!(expand_env_refs(r"%SHADOW_DRIVE_1%\data", lookup), r"B:\data");
        assert_eq!(
            expand_env_refs("%SHADOW_SET_ID%-%SHADOW_DRIVE_1%", lookup),
            "{abc}-B:"
        );
    }

    #[test]
    fn keeps_unknown_and_unterminated_references() {
        assert_eq!(expand_env_refs("%NOPE%", lookup), "%NOPE%");
        assert_eq!(expand_env_refs("100%", lookup), "100%");
        assert_eq!(expand_env_refs("a%%b", lookup), "a%%b");
        assert_eq!(expand_env_refs("plain", lookup), "plain");
    }

    #[test]
    fn command_line_quotes_program_and_arguments() {
        let mut spec = CommandSpec::new(r"C:\Tools\backup tool.exe");
        spec.args = vec!["%SHADOW_DRIVE_1%\\".into(), "two words".into()];
        assert_eq!(
            spec.command_line(lookup),
            r#""C:\Tools\backup tool.exe" "B:\" "two words""#
        );
    }

    #[test]
    fn raw_arguments_keep_their_own_quotes() {
        let mut spec = CommandSpec::new("robocopy.exe");
        spec.quote_arguments = false;
        spec.args = vec!["%SHADOW_DRIVE_1%\\".into(), "\"D:\\dest dir\"".into(), "/MIR".into()];
        assert_eq!(
            spec.command_line(lookup),
            r#""robocopy.exe" B:\ "D:\dest dir" /MIR"#
        );
    }

    #[cfg(unix)]
    #[test]
    fn process_executor_propagates_exit_code() {
        let mut spec = CommandSpec::new("/bin/sh");
        spec.quote_arguments = false;
        spec.args = vec!["-c".into(), "exit 7".into()];
        assert_eq!(ProcessExecutor.execute(&spec).unwrap(), 7);
    }

    #[test]
    fn missing_program_is_a_resource_fault() {
        let spec = CommandSpec::new("/definitely/not/here/shadowrun-child");
        let err = ProcessExecutor.execute(&spec).unwrap_err();
        assert!(matches!(err, ShadowError::ResourceFault { .. }));
    }
}
