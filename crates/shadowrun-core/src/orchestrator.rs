//! Drives the begin → add → commit → finalize protocol against a
//! [`ShadowService`] and owns the resulting [`SnapshotSet`].

use crate::error::{ShadowError, ShadowResult};
use crate::model::{SetId, Snapshot, SnapshotId, SnapshotSet};
use crate::provider::{ServiceCode, ShadowService};
use log::{debug, info, log_enabled, warn, Level};
use std::fmt;

/// Lifecycle of the snapshot set owned by an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetState {
    Idle,
    SetStarted,
    VolumesAdded,
    Committing,
    Committed,
    Finalized,
    Released,
}

impl fmt::Display for SetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetState::Idle => "no snapshot set has been started",
            SetState::SetStarted => "the snapshot set has no volumes",
            SetState::VolumesAdded => "volumes have been added",
            SetState::Committing => "commit has already begun",
            SetState::Committed => "the snapshot set is committed",
            SetState::Finalized => "the snapshot set is finalized",
            SetState::Released => "the snapshot set has been released",
        };
        f.write_str(name)
    }
}

/// Result of an asynchronous service request, kept at both levels: whether
/// the request was accepted, and how the underlying work completed.
/// `completed` is `None` when the request was refused and nothing ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncOutcome {
    pub issued: ServiceCode,
    pub completed: Option<ServiceCode>,
}

impl AsyncOutcome {
    /// Fail if either level reports a failure, issued level first.
    pub fn check(self, operation: &str, describe: impl Fn(ServiceCode) -> String) -> ShadowResult<()> {
        if self.issued.is_failure() {
            return Err(ShadowError::ServiceFault {
                operation: operation.to_string(),
                code: self.issued,
                message: describe(self.issued),
            });
        }
        if let Some(code) = self.completed.filter(|code| code.is_failure()) {
            return Err(ShadowError::ServiceFault {
                operation: format!("{operation} (asynchronous completion)"),
                code,
                message: describe(code),
            });
        }
        Ok(())
    }
}

/// Owns one snapshot set for the duration of a run.
pub struct SnapshotSetOrchestrator<S: ShadowService> {
    service: S,
    state: SetState,
    set: Option<SnapshotSet>,
    last_commit: Option<AsyncOutcome>,
}

impl<S: ShadowService> SnapshotSetOrchestrator<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: SetState::Idle,
            set: None,
            last_commit: None,
        }
    }

    pub fn state(&self) -> SetState {
        self.state
    }

    pub fn snapshot_set(&self) -> Option<&SnapshotSet> {
        self.set.as_ref()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        self.set
            .as_ref()
            .map(|set| set.snapshots.as_slice())
            .unwrap_or_default()
    }

    pub fn snapshots_mut(&mut self) -> &mut [Snapshot] {
        match self.set.as_mut() {
            Some(set) => set.snapshots.as_mut_slice(),
            None => &mut [],
        }
    }

    pub fn last_commit(&self) -> Option<AsyncOutcome> {
        self.last_commit
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Request a new snapshot set from the service.
    pub fn begin(&mut self) -> ShadowResult<SetId> {
        if self.state != SetState::Idle {
            return Err(ShadowError::invalid_state("starting a snapshot set", self.state));
        }
        let id = self.service.start_snapshot_set()?;
        let set = SnapshotSet::new(id);
        info!("Creating shadow set {}", set.id_string);
        self.set = Some(set);
        self.state = SetState::SetStarted;
        Ok(id)
    }

    /// Register one volume. Order of calls is the order of the snapshot list.
    pub fn add_volume(&mut self, volume: &str) -> ShadowResult<SnapshotId> {
        if !matches!(self.state, SetState::SetStarted | SetState::VolumesAdded) {
            return Err(ShadowError::invalid_state("adding a volume", self.state));
        }

        match self.service.display_name(volume) {
            Some(display) => info!("- Adding volume {volume} [{display}] to the shadow set..."),
            None => info!("- Adding volume {volume} to the shadow set..."),
        }

        let set = self
            .set
            .as_mut()
            .ok_or_else(|| ShadowError::invalid_state("adding a volume", SetState::Idle))?;
        set.snapshots.try_reserve(1)?;

        let id = self.service.add_to_snapshot_set(volume)?;
        set.snapshots.push(Snapshot::new(id, volume));
        self.state = SetState::VolumesAdded;
        Ok(id)
    }

    /// Materialize the set and block until the service finishes.
    pub fn commit(&mut self) -> ShadowResult<AsyncOutcome> {
        if self.state != SetState::VolumesAdded {
            return Err(ShadowError::invalid_state("committing", self.state));
        }
        self.state = SetState::Committing;
        info!("Creating the shadow (DoSnapshotSet) ...");

        let outcome = match self.service.do_snapshot_set() {
            Ok(mut operation) => {
                debug!("(Waiting for the asynchronous operation to finish...)");
                operation.wait()?;
                AsyncOutcome {
                    issued: ServiceCode::OK,
                    completed: Some(operation.status()?),
                }
            }
            Err(ShadowError::ServiceFault { code, .. }) => AsyncOutcome {
                issued: code,
                completed: None,
            },
            Err(err) => return Err(err),
        };
        self.last_commit = Some(outcome);

        if let Err(err) = outcome.check("DoSnapshotSet", |code| self.service.describe(code)) {
            warn!("Error during the last asynchronous operation: {err}");
            return Err(err);
        }

        self.state = SetState::Committed;
        Ok(outcome)
    }

    /// Read back the device path of every snapshot. Paths are assigned only
    /// once every lookup has succeeded.
    pub fn finalize(&mut self) -> ShadowResult<()> {
        if self.state != SetState::Committed {
            return Err(ShadowError::invalid_state("finalizing", self.state));
        }

        let ids: Vec<SnapshotId> = self.snapshots().iter().map(|snap| snap.id).collect();
        let mut devices = Vec::new();
        devices.try_reserve(ids.len())?;
        for id in ids {
            let props = self.service.snapshot_properties(id)?;
            debug!("- Shadow copy {id} is device {}", props.device_object);
            devices.push(props.device_object);
        }

        for (snapshot, device) in self.snapshots_mut().iter_mut().zip(devices) {
            snapshot.device_path = Some(device);
        }
        self.state = SetState::Finalized;
        Ok(())
    }

    /// Begin a set, add `volumes` in order, commit and finalize it.
    pub fn create_snapshot_set(&mut self, volumes: &[String]) -> ShadowResult<&SnapshotSet> {
        self.begin()?;
        for volume in volumes {
            self.add_volume(volume)?;
        }
        self.commit()?;
        self.finalize()?;
        info!("Shadow set successfully created.");
        let set = self
            .set
            .as_ref()
            .ok_or_else(|| ShadowError::invalid_state("reading the snapshot set", self.state))?;
        if log_enabled!(Level::Debug) {
            if let Ok(json) = serde_json::to_string(set) {
                debug!("Shadow set: {json}");
            }
        }
        Ok(set)
    }

    /// Release the service session. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.state == SetState::Released {
            return;
        }
        debug!("Releasing the shadow copy service session");
        self.service.release();
        self.state = SetState::Released;
    }
}

impl<S: ShadowService> Drop for SnapshotSetOrchestrator<S> {
    fn drop(&mut self) {
        self.release();
    }
}
