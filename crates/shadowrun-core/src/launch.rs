//! The `shadowrun` command-line flow, from raw arguments to exit code.
//!
//! Arguments are scanned and volumes resolved against the volume host alone.
//! The shadow copy session is opened only after both succeeded, so argument
//! and volume errors always report `errorcode` and session failures
//! `errorcode + 1`.

use crate::args::{self, Invocation};
use crate::config::ShadowDefaults;
use crate::error::ShadowResult;
use crate::exec::CommandExecutor;
use crate::export::EnvironmentSink;
use crate::logging;
use crate::provider::{DriveNamespace, ShadowService, VolumeHost};
use crate::resolver::VolumeResolver;
use crate::service::ShadowRun;
use log::{error, info};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

/// Process-facing collaborators used once the snapshots exist.
pub struct Console<'a> {
    pub executor: &'a mut dyn CommandExecutor,
    pub environment: &'a mut dyn EnvironmentSink,
    /// Blocks for `-wait`.
    pub pause: &'a mut dyn FnMut(),
}

pub fn print_help() {
    println!("{}", args::logo());
    print!("{}", args::usage());
}

/// Run one invocation and return the process exit code.
///
/// `open_session` is called at most once, after the arguments were accepted
/// and every volume resolved.
/// Everything it returns is dropped before this function returns.
pub fn run<V, S, D, O>(
    argv: Vec<String>,
    defaults: &ShadowDefaults,
    volumes: V,
    open_session: O,
    console: Console<'_>,
) -> i32
where
    V: VolumeHost,
    S: ShadowService,
    D: DriveNamespace,
    O: FnOnce() -> ShadowResult<(S, D)>,
{
    if args::is_help_request(&argv) {
        print_help();
        return 0;
    }

    logging::init(defaults.log_level.unwrap_or_default());

    let resolver = VolumeResolver::new(volumes);
    let logo_shown = Cell::new(false);
    let scanned = args::scan(
        argv,
        defaults,
        |token| resolver.accepts(token),
        |level| {
            logging::set_level(level);
            info!("{}", args::logo());
            logo_shown.set(true);
        },
    );

    let config = match scanned {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return 0;
        }
        Err(err) => {
            if !logo_shown.get() {
                info!("{}", args::logo());
            }
            error!("ERROR: {err}");
            info!("\n{}", args::usage());
            return err.exit_code();
        }
    };

    let base = config.error_code_start;
    let volumes = match resolver.resolve_all(&config.volumes) {
        Ok(volumes) => volumes,
        Err(err) => {
            error!("ERROR: {err}");
            return err.exit_code(base);
        }
    };

    let (service, drives) = match open_session() {
        Ok(session) => session,
        Err(err) => {
            error!("ERROR: {err}");
            return err.exit_code(base);
        }
    };
    let mut shadow = ShadowRun::from_parts(service, resolver, drives);

    let Console {
        executor,
        environment,
        pause,
    } = console;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        shadow.execute_resolved(&volumes, &config, executor, environment, pause)
    }));

    let code = match outcome {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            error!("ERROR: {err}");
            err.exit_code(base)
        }
        Err(_) => {
            error!("ERROR: unexpected internal failure");
            base.wrapping_add(1)
        }
    };

    drop(shadow);
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShadowError;
    use crate::fakes::{FakeDrives, FakeService, FakeVolumes, MemoryEnvironment, RecordingExecutor};
    use crate::provider::ServiceCode;

    const E_ACCESSDENIED: ServiceCode = ServiceCode(0x8007_0005u32 as i32);

    fn volumes() -> FakeVolumes {
        FakeVolumes::new().with_volume(r"C:\", r"\\?\Volume{c}\")
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    fn launch<O>(args: &[&str], open_session: O) -> (i32, RecordingExecutor)
    where
        O: FnOnce() -> ShadowResult<(FakeService, FakeDrives)>,
    {
        let mut executor = RecordingExecutor::default();
        let mut environment = MemoryEnvironment::default();
        let mut pause = || {};
        let code = run(
            argv(args),
            &ShadowDefaults::default(),
            volumes(),
            open_session,
            Console {
                executor: &mut executor,
                environment: &mut environment,
                pause: &mut pause,
            },
        );
        (code, executor)
    }

    fn access_denied() -> ShadowResult<(FakeService, FakeDrives)> {
        Err(ShadowError::ServiceFault {
            operation: "InitializeForBackup".into(),
            code: E_ACCESSDENIED,
            message: "Access is denied.".into(),
        })
    }

    #[test]
    fn argument_errors_never_open_the_session() {
        let opened = Cell::new(false);
        let open = || {
            opened.set(true);
            access_denied()
        };
        assert_eq!(launch(&["-bogus"], open).0, 1);
        assert!(!opened.get());

        let (code, _) = launch(&["-errorcode=5", "-bogus"], access_denied);
        assert_eq!(code, 5);
        let (code, _) = launch(&["-errorcode=5", "Q:"], access_denied);
        assert_eq!(code, 5);
    }

    #[test]
    fn unresolvable_volume_is_reported_before_the_session() {
        let opened = Cell::new(false);
        let volumes = FakeVolumes::new().with_failing_cluster(r"X:\");
        let mut executor = RecordingExecutor::default();
        let mut environment = MemoryEnvironment::default();
        let code = run(
            argv(&["-errorcode=3", "X:"]),
            &ShadowDefaults::default(),
            volumes,
            || {
                opened.set(true);
                access_denied()
            },
            Console {
                executor: &mut executor,
                environment: &mut environment,
                pause: &mut || {},
            },
        );
        assert_eq!(code, 3);
        assert!(!opened.get());
    }

    #[test]
    fn session_failure_uses_the_scanned_base() {
        let (code, executor) = launch(&["-errorcode=10", "C:"], access_denied);
        assert_eq!(code, 11);
        assert!(executor.launched.is_empty());

        let (code, _) = launch(&["C:"], access_denied);
        assert_eq!(code, 2);
    }

    #[test]
    fn help_returns_zero_without_a_session() {
        let opened = Cell::new(false);
        let (code, _) = launch(&["-?"], || {
            opened.set(true);
            access_denied()
        });
        assert_eq!(code, 0);
        assert!(!opened.get());
    }

    #[test]
    fn successful_run_releases_the_session() {
        let service = FakeService::new();
        let state = service.state.clone();
        let (code, _) = launch(&["-mount", "C:"], || Ok((service, FakeDrives::default())));
        assert_eq!(code, 0);
        let calls = state.borrow().calls.clone();
        assert_eq!(calls.first().map(String::as_str), Some("start"));
        assert_eq!(calls.last().map(String::as_str), Some("release"));
    }
}
