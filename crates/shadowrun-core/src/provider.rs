use crate::error::ShadowResult;
use crate::model::{SetId, SnapshotId};
use serde::Serialize;
use std::fmt;

/// HRESULT-shaped status reported by the shadowing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ServiceCode(pub i32);

impl ServiceCode {
    pub const OK: ServiceCode = ServiceCode(0);

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ServiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0 as u32)
    }
}

/// Properties copied out of the service once a snapshot exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotProperties {
    pub device_object: String,
}

/// Paths returned when a cluster shared volume is prepared for backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterVolume {
    pub root_path: String,
    pub unique_name: String,
}

/// An asynchronous service operation that has been accepted.
pub trait AsyncOperation {
    /// Block until the operation signals completion. No timeout is applied.
    fn wait(&mut self) -> ShadowResult<()>;

    /// The completed operation's own result, separate from whether the
    /// request was accepted.
    fn status(&self) -> ShadowResult<ServiceCode>;
}

/// Abstraction over the volume shadowing service.
///
/// Implementations are expected to be a thin surface over the host API so
/// the orchestration can be exercised without creating real snapshots.
pub trait ShadowService {
    /// Allocate a new snapshot set.
    fn start_snapshot_set(&mut self) -> ShadowResult<SetId>;

    /// Register `volume` with the open set, returning the snapshot identity.
    fn add_to_snapshot_set(&mut self, volume: &str) -> ShadowResult<SnapshotId>;

    /// Issue the materialize request. An `Err` means the request itself was
    /// rejected; failures of the underlying work surface via
    /// [`AsyncOperation::status`].
    fn do_snapshot_set(&mut self) -> ShadowResult<Box<dyn AsyncOperation + '_>>;

    /// Read the properties of a committed snapshot. Implementations must
    /// free any service-allocated descriptor before returning.
    fn snapshot_properties(&mut self, id: SnapshotId) -> ShadowResult<SnapshotProperties>;

    /// Human-readable text for a service code.
    fn describe(&self, code: ServiceCode) -> String;

    /// Friendly mount point for a volume name, used only for logging.
    fn display_name(&self, volume: &str) -> Option<String> {
        let _ = volume;
        None
    }

    /// Drop the service session. Called before the hosting layer is torn down.
    fn release(&mut self) {}
}

/// Host volume management calls used by the resolver.
pub trait VolumeHost {
    fn is_on_cluster_shared_volume(&self, path: &str) -> bool;

    /// Prepare a cluster shared volume for backup. May reserve cluster state.
    fn prepare_cluster_shared_volume(&self, path: &str) -> ShadowResult<ClusterVolume>;

    /// Root path of the volume containing `path`.
    fn volume_path_name(&self, path: &str) -> ShadowResult<String>;

    /// Unique `\\?\Volume{GUID}\` name for a volume root.
    fn volume_name_for_mount_point(&self, root: &str) -> ShadowResult<String>;

    /// Ask the shadowing service for the `(root, logical prefix)` of a share.
    fn root_and_logical_prefix(&self, unc_path: &str) -> ShadowResult<(String, String)>;

    fn path_exists(&self, path: &str) -> bool;
}

/// The host's drive letter namespace.
pub trait DriveNamespace {
    /// Bitmap of live drive letters, bit 0 = `A`.
    fn logical_drives(&self) -> ShadowResult<u32>;

    /// Map `drive` (`X:` form) to `target`.
    fn define(&mut self, drive: &str, target: &str) -> ShadowResult<()>;

    /// Remove the mapping only if it still points at `target`.
    fn remove_exact(&mut self, drive: &str, target: &str) -> ShadowResult<()>;

    /// Open `drive` for read and close it again.
    fn probe(&self, drive: &str) -> ShadowResult<()>;
}
