//! Stand-in backend for hosts without the Volume Shadow Copy Service.
//!
//! The session types are uninhabited: [`open_session`](crate::open_session)
//! always fails, so none of their methods can ever be reached. The volume
//! host exists so the command line can still be scanned; it knows no
//! volumes.

use shadowrun_core::{
    AsyncOperation, ClusterVolume, DriveNamespace, ServiceCode, SetId, ShadowError,
    ShadowResult, ShadowService, SnapshotId, SnapshotProperties, VolumeHost,
};

/// `E_NOTIMPL`.
pub(crate) const NOT_IMPLEMENTED: ServiceCode = ServiceCode(0x8000_4001u32 as i32);

/// `ERROR_NOT_SUPPORTED`.
const NOT_SUPPORTED: u32 = 50;

pub enum Unsupported {}

pub type VssShadowService = Unsupported;
pub type DosDeviceNamespace = Unsupported;

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32VolumeHost;

impl Win32VolumeHost {
    pub fn new() -> Self {
        Self
    }
}

fn not_implemented(operation: &str, path: &str) -> ShadowError {
    ShadowError::ResourceFault {
        operation: format!("{operation}({path})"),
        code: NOT_SUPPORTED,
        message: "volume queries are only available on Windows".to_string(),
    }
}

impl ShadowService for Unsupported {
    fn start_snapshot_set(&mut self) -> ShadowResult<SetId> {
        match *self {}
    }

    fn add_to_snapshot_set(&mut self, _volume: &str) -> ShadowResult<SnapshotId> {
        match *self {}
    }

    fn do_snapshot_set(&mut self) -> ShadowResult<Box<dyn AsyncOperation + '_>> {
        match *self {}
    }

    fn snapshot_properties(&mut self, _id: SnapshotId) -> ShadowResult<SnapshotProperties> {
        match *self {}
    }

    fn describe(&self, _code: ServiceCode) -> String {
        match *self {}
    }
}

impl VolumeHost for Win32VolumeHost {
    fn is_on_cluster_shared_volume(&self, _path: &str) -> bool {
        false
    }

    fn prepare_cluster_shared_volume(&self, path: &str) -> ShadowResult<ClusterVolume> {
        Err(not_implemented("ClusterPrepareSharedVolumeForBackup", path))
    }

    fn volume_path_name(&self, path: &str) -> ShadowResult<String> {
        Err(not_implemented("GetVolumePathName", path))
    }

    fn volume_name_for_mount_point(&self, root: &str) -> ShadowResult<String> {
        Err(not_implemented("GetVolumeNameForVolumeMountPoint", root))
    }

    fn root_and_logical_prefix(&self, unc_path: &str) -> ShadowResult<(String, String)> {
        Err(not_implemented("GetRootAndLogicalPrefixPaths", unc_path))
    }

    fn path_exists(&self, _path: &str) -> bool {
        false
    }
}

impl DriveNamespace for Unsupported {
    fn logical_drives(&self) -> ShadowResult<u32> {
        match *self {}
    }

    fn define(&mut self, _drive: &str, _target: &str) -> ShadowResult<()> {
        match *self {}
    }

    fn remove_exact(&mut self, _drive: &str, _target: &str) -> ShadowResult<()> {
        match *self {}
    }

    fn probe(&self, _drive: &str) -> ShadowResult<()> {
        match *self {}
    }
}
