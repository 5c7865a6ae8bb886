//! High-level run coordinator tying the resolver, orchestrator, mount manager,
//! exporter and executor together for one invocation.

use crate::config::RunConfig;
use crate::error::{ShadowError, ShadowResult};
use crate::exec::CommandExecutor;
use crate::export::{apply_environment, write_script, EnvironmentSink};
use crate::model::{Snapshot, SnapshotSet};
use crate::mount::MountManager;
use crate::orchestrator::SnapshotSetOrchestrator;
use crate::provider::{DriveNamespace, ShadowService, VolumeHost};
use crate::resolver::VolumeResolver;
use log::{info, warn};

/// One ShadowRun invocation. Dropping it removes any drive bindings still in
/// place and then releases the service session.
pub struct ShadowRun<S, V, D>
where
    S: ShadowService,
    V: VolumeHost,
    D: DriveNamespace,
{
    mounts: MountManager<D>,
    resolver: VolumeResolver<V>,
    orchestrator: SnapshotSetOrchestrator<S>,
}

impl<S, V, D> ShadowRun<S, V, D>
where
    S: ShadowService,
    V: VolumeHost,
    D: DriveNamespace,
{
    pub fn new(service: S, volumes: V, drives: D) -> Self {
        Self::from_parts(service, VolumeResolver::new(volumes), drives)
    }

    /// Build around a resolver that was already used to scan the arguments.
    pub fn from_parts(service: S, resolver: VolumeResolver<V>, drives: D) -> Self {
        Self {
            mounts: MountManager::new(drives),
            resolver,
            orchestrator: SnapshotSetOrchestrator::new(service),
        }
    }

    pub fn resolver(&self) -> &VolumeResolver<V> {
        &self.resolver
    }

    pub fn orchestrator(&self) -> &SnapshotSetOrchestrator<S> {
        &self.orchestrator
    }

    pub fn mounts(&self) -> &MountManager<D> {
        &self.mounts
    }

    pub fn snapshot_set(&self) -> Option<&SnapshotSet> {
        self.orchestrator.snapshot_set()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        self.orchestrator.snapshots()
    }

    /// Run every step `config` asks for and return the exit code of the
    /// launched command, or 0 when nothing was launched.
    ///
    /// `pause` is called for `-wait` and should block until the user is done
    /// with the snapshots.
    pub fn execute(
        &mut self,
        config: &RunConfig,
        executor: &mut dyn CommandExecutor,
        environment: &mut dyn EnvironmentSink,
        pause: &mut dyn FnMut(),
    ) -> ShadowResult<i32> {
        let volumes = self.resolver.resolve_all(&config.volumes)?;
        self.execute_resolved(&volumes, config, executor, environment, pause)
    }

    /// Same as [`execute`](Self::execute) for volume names that were already
    /// resolved, in the order of `config.volumes`.
    pub fn execute_resolved(
        &mut self,
        volumes: &[String],
        config: &RunConfig,
        executor: &mut dyn CommandExecutor,
        environment: &mut dyn EnvironmentSink,
        pause: &mut dyn FnMut(),
    ) -> ShadowResult<i32> {
        if volumes.is_empty() {
            return Err(ShadowError::InvalidArgument(
                "Missing volume parameter!".to_string(),
            ));
        }

        self.orchestrator.create_snapshot_set(volumes)?;

        // Drive letters have to exist before they are exported.
        if config.mount {
            self.mounts
                .mount(self.orchestrator.snapshots_mut(), &config.drive_letters)?;
        }

        let set = self
            .orchestrator
            .snapshot_set()
            .ok_or_else(|| ShadowError::invalid_state("exporting", self.orchestrator.state()))?;

        if let Some(script) = &config.script {
            write_script(set, script)?;
        }

        if config.env {
            apply_environment(set, environment)?;
        }

        let mut exit_code = 0;
        if let Some(spec) = config.command() {
            exit_code = executor.execute(&spec)?;
        }

        if config.wait {
            info!("Suspending ShadowRun while leaving any created shadow copies available for use");
            pause();
        }

        if config.mount {
            let failures = self.mounts.unmount(self.orchestrator.snapshots_mut());
            if failures > 0 {
                warn!("{failures} shadow copy drive(s) could not be unmounted");
            }
        }

        info!("ShadowRun completed with exit code {exit_code}");
        Ok(exit_code)
    }
}

impl<S, V, D> Drop for ShadowRun<S, V, D>
where
    S: ShadowService,
    V: VolumeHost,
    D: DriveNamespace,
{
    fn drop(&mut self) {
        self.mounts.unmount_silent(self.orchestrator.snapshots_mut());
        self.orchestrator.release();
    }
}
