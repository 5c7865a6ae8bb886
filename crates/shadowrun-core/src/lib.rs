pub mod args;
pub mod config;
pub mod error;
pub mod exec;
pub mod export;
pub mod guard;
pub mod launch;
pub mod logging;
pub mod model;
pub mod mount;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod service;

#[cfg(test)]
mod fakes;

pub use args::{Invocation, UsageError};
pub use config::{LogLevel, RunConfig, ShadowDefaults};
pub use error::{ShadowError, ShadowResult, DEFAULT_ERROR_CODE_START};
pub use exec::{CommandExecutor, CommandSpec, ProcessExecutor};
pub use export::{EnvironmentSink, ProcessEnvironment};
pub use guard::{defer, Guard};
pub use launch::Console;
pub use model::{MountBinding, SetId, Snapshot, SnapshotId, SnapshotSet};
pub use mount::MountManager;
pub use orchestrator::{AsyncOutcome, SetState, SnapshotSetOrchestrator};
pub use provider::{
    AsyncOperation, ClusterVolume, DriveNamespace, ServiceCode, ShadowService,
    SnapshotProperties, VolumeHost,
};
pub use resolver::{VolumeKind, VolumeResolver};
pub use service::ShadowRun;
