//! `ShadowService` over `IVssBackupComponents`.

use crate::com::{self, service_fault, ComApartment};
use crate::volume;
use crate::wide::{from_wide_ptr, to_wide};
use log::{debug, trace};
use shadowrun_core::guard::Guard;
use shadowrun_core::{
    AsyncOperation, ServiceCode, SetId, ShadowError, ShadowResult, ShadowService, SnapshotId,
    SnapshotProperties,
};
use std::rc::Rc;
use uuid::Uuid;
use windows::core::{BSTR, GUID, HRESULT};
use windows::Win32::Storage::Vss::{
    CreateVssBackupComponentsInternal, IVssAsync, IVssBackupComponents,
    VssFreeSnapshotPropertiesInternal, VSS_BT_FULL, VSS_CTX_FILE_SHARE_BACKUP, VSS_SNAPSHOT_PROP,
};

const INFINITE: u32 = u32::MAX;

fn to_uuid(guid: GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

fn to_guid(uuid: Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

/// One backup components session configured for non-persistent,
/// writer-less file share snapshots.
pub struct VssShadowService {
    components: Option<IVssBackupComponents>,
    _com: Rc<ComApartment>,
}

impl VssShadowService {
    pub(crate) fn create(com: Rc<ComApartment>) -> ShadowResult<Self> {
        let components = unsafe { CreateVssBackupComponentsInternal() }
            .map_err(|err| service_fault("CreateVssBackupComponents", err))?;

        unsafe { components.InitializeForBackup(&BSTR::new()) }
            .map_err(|err| service_fault("InitializeForBackup", err))?;

        debug!(
            "- Setting the VSS context to: 0x{:08x}",
            VSS_CTX_FILE_SHARE_BACKUP.0
        );
        unsafe { components.SetContext(VSS_CTX_FILE_SHARE_BACKUP.0) }
            .map_err(|err| service_fault("SetContext", err))?;

        unsafe { components.SetBackupState(true, true, VSS_BT_FULL, false) }
            .map_err(|err| service_fault("SetBackupState", err))?;

        Ok(Self {
            components: Some(components),
            _com: com,
        })
    }

    fn components(&self) -> ShadowResult<&IVssBackupComponents> {
        self.components.as_ref().ok_or_else(|| ShadowError::InvalidState {
            operation: "using the shadow copy service".to_string(),
            state: "session already released".to_string(),
        })
    }
}

struct VssAsync(IVssAsync);

impl AsyncOperation for VssAsync {
    fn wait(&mut self) -> ShadowResult<()> {
        unsafe { self.0.Wait(INFINITE) }.map_err(|err| service_fault("IVssAsync::Wait", err))
    }

    fn status(&self) -> ShadowResult<ServiceCode> {
        let mut result = HRESULT(0);
        unsafe { self.0.QueryStatus(&mut result, std::ptr::null_mut()) }
            .map_err(|err| service_fault("IVssAsync::QueryStatus", err))?;
        Ok(ServiceCode(result.0))
    }
}

impl ShadowService for VssShadowService {
    fn start_snapshot_set(&mut self) -> ShadowResult<SetId> {
        let id = unsafe { self.components()?.StartSnapshotSet() }
            .map_err(|err| service_fault("StartSnapshotSet", err))?;
        Ok(SetId(to_uuid(id)))
    }

    fn add_to_snapshot_set(&mut self, volume: &str) -> ShadowResult<SnapshotId> {
        let mut name = to_wide(volume);
        let id = unsafe {
            self.components()?
                .AddToSnapshotSet(name.as_mut_ptr(), GUID::zeroed())
        }
        .map_err(|err| service_fault("AddToSnapshotSet", err))?;
        Ok(SnapshotId(to_uuid(id)))
    }

    fn do_snapshot_set(&mut self) -> ShadowResult<Box<dyn AsyncOperation + '_>> {
        let operation = unsafe { self.components()?.DoSnapshotSet() }
            .map_err(|err| service_fault("DoSnapshotSet", err))?;
        Ok(Box::new(VssAsync(operation)))
    }

    fn snapshot_properties(&mut self, id: SnapshotId) -> ShadowResult<SnapshotProperties> {
        let components = self.components()?;
        let mut prop = VSS_SNAPSHOT_PROP::default();
        unsafe { components.GetSnapshotProperties(to_guid(id.0), &mut prop) }
            .map_err(|err| service_fault("GetSnapshotProperties", err))?;
        let prop = Guard::new(prop, |mut prop| unsafe {
            VssFreeSnapshotPropertiesInternal(&mut prop)
        });
        let device_object = unsafe { from_wide_ptr(prop.m_pwszSnapshotDeviceObject) };
        trace!("- Snapshot {id} device object {device_object}");
        Ok(SnapshotProperties { device_object })
    }

    fn describe(&self, code: ServiceCode) -> String {
        com::describe(code)
    }

    fn display_name(&self, volume: &str) -> Option<String> {
        volume::volume_display_name(volume)
    }

    fn release(&mut self) {
        if self.components.take().is_some() {
            debug!("Released IVssBackupComponents");
        }
    }
}
