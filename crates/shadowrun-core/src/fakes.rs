//! In-memory capability implementations shared by the unit tests.

use crate::error::{ShadowError, ShadowResult};
use crate::exec::{CommandExecutor, CommandSpec};
use crate::export::EnvironmentSink;
use crate::model::{SetId, SnapshotId};
use crate::provider::{
    AsyncOperation, ClusterVolume, DriveNamespace, ServiceCode, ShadowService,
    SnapshotProperties, VolumeHost,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use uuid::Uuid;

pub const E_PROVIDER_VETO: ServiceCode = ServiceCode(0x8004_230Fu32 as i32);
pub const E_BAD_STATE: ServiceCode = ServiceCode(0x8004_2301u32 as i32);

#[derive(Debug, Default)]
pub struct ServiceState {
    pub calls: Vec<String>,
    pub added: Vec<String>,
    pub reject_commit: Option<ServiceCode>,
    pub completion: Option<ServiceCode>,
    pub fail_properties_at: Option<usize>,
    pub released: bool,
    counter: u128,
}

#[derive(Clone, Default)]
pub struct FakeService {
    pub state: Rc<RefCell<ServiceState>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_completion(code: ServiceCode) -> Self {
        let svc = Self::default();
        svc.state.borrow_mut().completion = Some(code);
        svc
    }

    pub fn rejecting_commit(code: ServiceCode) -> Self {
        let svc = Self::default();
        svc.state.borrow_mut().reject_commit = Some(code);
        svc
    }

    fn next_uuid(&self) -> Uuid {
        let mut state = self.state.borrow_mut();
        state.counter += 1;
        Uuid::from_u128(0x1000_0000_0000_4000_8000_0000_0000_0000 + state.counter)
    }
}

struct FakeAsync {
    state: Rc<RefCell<ServiceState>>,
    completion: ServiceCode,
}

impl AsyncOperation for FakeAsync {
    fn wait(&mut self) -> ShadowResult<()> {
        self.state.borrow_mut().calls.push("wait".into());
        Ok(())
    }

    fn status(&self) -> ShadowResult<ServiceCode> {
        self.state.borrow_mut().calls.push("status".into());
        Ok(self.completion)
    }
}

impl ShadowService for FakeService {
    fn start_snapshot_set(&mut self) -> ShadowResult<SetId> {
        let id = SetId(self.next_uuid());
        self.state.borrow_mut().calls.push("start".into());
        Ok(id)
    }

    fn add_to_snapshot_set(&mut self, volume: &str) -> ShadowResult<SnapshotId> {
        let id = SnapshotId(self.next_uuid());
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("add {volume}"));
        state.added.push(volume.to_string());
        Ok(id)
    }

    fn do_snapshot_set(&mut self) -> ShadowResult<Box<dyn AsyncOperation + '_>> {
        let (reject, completion) = {
            let mut state = self.state.borrow_mut();
            state.calls.push("commit".into());
            (state.reject_commit, state.completion)
        };
        if let Some(code) = reject {
            return Err(ShadowError::ServiceFault {
                operation: "DoSnapshotSet".into(),
                code,
                message: self.describe(code),
            });
        }
        Ok(Box::new(FakeAsync {
            state: self.state.clone(),
            completion: completion.unwrap_or(ServiceCode::OK),
        }))
    }

    fn snapshot_properties(&mut self, id: SnapshotId) -> ShadowResult<SnapshotProperties> {
        let mut state = self.state.borrow_mut();
        let index = state
            .calls
            .iter()
            .filter(|c| c.starts_with("properties"))
            .count();
        state.calls.push(format!("properties {index}"));
        if state.fail_properties_at == Some(index) {
            return Err(ShadowError::ServiceFault {
                operation: "GetSnapshotProperties".into(),
                code: E_BAD_STATE,
                message: "object not found".into(),
            });
        }
        Ok(SnapshotProperties {
            device_object: format!(
                r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy{}",
                id.0.as_u128() & 0xff
            ),
        })
    }

    fn describe(&self, code: ServiceCode) -> String {
        match code {
            E_PROVIDER_VETO => "The shadow copy provider vetoed the operation.".into(),
            E_BAD_STATE => "A function call was made when the object was in an incorrect state."
                .into(),
            other => format!("unknown service code {other}"),
        }
    }

    fn release(&mut self) {
        let mut state = self.state.borrow_mut();
        state.released = true;
        state.calls.push("release".into());
    }
}

#[derive(Debug, Default)]
pub struct DriveState {
    /// Letters in use by something other than this process.
    pub foreign: u32,
    pub bindings: BTreeMap<char, String>,
    pub broken_targets: HashSet<String>,
    pub fail_remove: bool,
    pub panic_on_remove: bool,
    pub defines: Vec<String>,
    pub removals: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeDrives {
    pub state: Rc<RefCell<DriveState>>,
}

impl FakeDrives {
    /// Letters given are treated as already in use by the host.
    pub fn with_live(letters: &str) -> Self {
        let drives = Self::default();
        let mut mask = 0u32;
        for letter in letters.chars() {
            mask |= 1 << (letter as u32 - 'A' as u32);
        }
        drives.state.borrow_mut().foreign = mask;
        drives
    }

    pub fn is_bound(&self, letter: char) -> bool {
        self.state.borrow().bindings.contains_key(&letter)
    }
}

fn letter_of(drive: &str) -> char {
    drive.chars().next().unwrap_or('?')
}

impl DriveNamespace for FakeDrives {
    fn logical_drives(&self) -> ShadowResult<u32> {
        let state = self.state.borrow();
        let mut mask = state.foreign;
        for letter in state.bindings.keys() {
            mask |= 1 << (*letter as u32 - 'A' as u32);
        }
        Ok(mask)
    }

    fn define(&mut self, drive: &str, target: &str) -> ShadowResult<()> {
        let mut state = self.state.borrow_mut();
        state.defines.push(drive.to_string());
        state.bindings.insert(letter_of(drive), target.to_string());
        Ok(())
    }

    fn remove_exact(&mut self, drive: &str, target: &str) -> ShadowResult<()> {
        let mut state = self.state.borrow_mut();
        if state.panic_on_remove {
            drop(state);
            panic!("simulated crash while removing {drive}");
        }
        state.removals.push(drive.to_string());
        if state.fail_remove {
            return Err(ShadowError::ResourceFault {
                operation: format!("DefineDosDevice(remove {drive})"),
                code: 5,
                message: "Access is denied.".into(),
            });
        }
        let letter = letter_of(drive);
        match state.bindings.get(&letter) {
            Some(current) if current == target => {
                state.bindings.remove(&letter);
                Ok(())
            }
            _ => Err(ShadowError::ResourceFault {
                operation: format!("DefineDosDevice(remove {drive})"),
                code: 2,
                message: "The system cannot find the file specified.".into(),
            }),
        }
    }

    fn probe(&self, drive: &str) -> ShadowResult<()> {
        let state = self.state.borrow();
        match state.bindings.get(&letter_of(drive)) {
            Some(target) if !state.broken_targets.contains(target) => Ok(()),
            _ => Err(ShadowError::ResourceFault {
                operation: format!("CreateFile({drive})"),
                code: 3,
                message: "The system cannot find the path specified.".into(),
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeVolumes {
    mount_points: HashMap<String, String>,
    clusters: HashMap<String, ClusterVolume>,
    failing_clusters: HashSet<String>,
    shares: HashMap<String, (String, String)>,
}

impl FakeVolumes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(mut self, mount_point: &str, unique: &str) -> Self {
        self.mount_points
            .insert(mount_point.to_ascii_uppercase(), unique.to_string());
        self
    }

    pub fn with_cluster(mut self, path: &str, root: &str, unique: &str) -> Self {
        self.clusters.insert(
            path.to_ascii_uppercase(),
            ClusterVolume {
                root_path: root.to_string(),
                unique_name: unique.to_string(),
            },
        );
        self
    }

    pub fn with_failing_cluster(mut self, path: &str) -> Self {
        self.failing_clusters.insert(path.to_ascii_uppercase());
        self
    }

    pub fn with_share(mut self, path: &str, root: &str, prefix: &str) -> Self {
        self.shares.insert(
            path.to_ascii_uppercase(),
            (root.to_string(), prefix.to_string()),
        );
        self
    }

    fn not_found(operation: &str) -> ShadowError {
        ShadowError::ResourceFault {
            operation: operation.to_string(),
            code: 2,
            message: "The system cannot find the file specified.".into(),
        }
    }
}

impl VolumeHost for FakeVolumes {
    fn is_on_cluster_shared_volume(&self, path: &str) -> bool {
        let key = path.to_ascii_uppercase();
        self.clusters.contains_key(&key) || self.failing_clusters.contains(&key)
    }

    fn prepare_cluster_shared_volume(&self, path: &str) -> ShadowResult<ClusterVolume> {
        self.clusters
            .get(&path.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| Self::not_found("ClusterPrepareSharedVolumeForBackup"))
    }

    fn volume_path_name(&self, path: &str) -> ShadowResult<String> {
        let key = path.to_ascii_uppercase();
        if self.mount_points.contains_key(&key) {
            Ok(key)
        } else {
            Err(Self::not_found("GetVolumePathName"))
        }
    }

    fn volume_name_for_mount_point(&self, root: &str) -> ShadowResult<String> {
        self.mount_points
            .get(&root.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| Self::not_found("GetVolumeNameForVolumeMountPoint"))
    }

    fn root_and_logical_prefix(&self, unc_path: &str) -> ShadowResult<(String, String)> {
        self.shares
            .get(&unc_path.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| ShadowError::ServiceFault {
                operation: "GetRootAndLogicalPrefixPaths".into(),
                code: ServiceCode(0x8004_2308u32 as i32),
                message: "The specified object does not exist.".into(),
            })
    }

    fn path_exists(&self, path: &str) -> bool {
        let key = path.to_ascii_uppercase();
        self.clusters.contains_key(&key) || self.failing_clusters.contains(&key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    pub vars: BTreeMap<String, String>,
}

impl EnvironmentSink for MemoryEnvironment {
    fn set(&mut self, name: &str, value: &str) -> ShadowResult<()> {
        self.vars.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn unset(&mut self, name: &str) -> ShadowResult<()> {
        self.vars.remove(name);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub launched: Vec<CommandSpec>,
    pub exit_code: i32,
    pub fail: bool,
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&mut self, spec: &CommandSpec) -> ShadowResult<i32> {
        self.launched.push(spec.clone());
        if self.fail {
            return Err(ShadowError::ResourceFault {
                operation: "CreateProcess".into(),
                code: 2,
                message: "The system cannot find the file specified.".into(),
            });
        }
        Ok(self.exit_code)
    }
}
