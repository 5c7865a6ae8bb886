//! `VolumeHost` over the Win32 volume management and cluster APIs.
//!
//! No shadow copy session is held here, so paths can be checked while the
//! command line is scanned. Share resolution opens COM and a short-lived
//! backup components object of its own.

use crate::com::{resource_fault, service_fault, ComApartment};
use crate::wide::{from_wide, from_wide_ptr, split_multi_sz, to_wide, MAX_PATH};
use log::trace;
use shadowrun_core::guard::Guard;
use shadowrun_core::{ClusterVolume, ShadowResult, VolumeHost};
use std::ffi::c_void;
use windows::core::{Error as WinError, Interface, HRESULT, PCWSTR, PWSTR};
use windows::Win32::Networking::Clustering::{
    ClusterIsPathOnSharedVolume, ClusterPrepareSharedVolumeForBackup,
};
use windows::Win32::Storage::FileSystem::{
    GetFileAttributesW, GetVolumeNameForVolumeMountPointW, GetVolumePathNameW,
    GetVolumePathNamesForVolumeNameW, INVALID_FILE_ATTRIBUTES,
};
use windows::Win32::Storage::Vss::{CreateVssBackupComponentsInternal, IVssBackupComponentsEx4};
use windows::Win32::System::Com::CoTaskMemFree;

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32VolumeHost;

impl Win32VolumeHost {
    pub fn new() -> Self {
        Self
    }
}

fn co_task_string(ptr: *mut u16) -> Guard<*mut u16, impl FnOnce(*mut u16)> {
    Guard::new(ptr, |ptr: *mut u16| {
        if !ptr.is_null() {
            unsafe { CoTaskMemFree(Some(ptr as *const c_void)) };
        }
    })
}

impl VolumeHost for Win32VolumeHost {
    fn is_on_cluster_shared_volume(&self, path: &str) -> bool {
        let wide = to_wide(path);
        unsafe { ClusterIsPathOnSharedVolume(PCWSTR(wide.as_ptr())) }.as_bool()
    }

    fn prepare_cluster_shared_volume(&self, path: &str) -> ShadowResult<ClusterVolume> {
        let wide = to_wide(path);
        let mut root = [0u16; MAX_PATH];
        let mut root_len = root.len() as u32;
        let mut unique = [0u16; MAX_PATH];
        let mut unique_len = unique.len() as u32;
        let status = unsafe {
            ClusterPrepareSharedVolumeForBackup(
                PCWSTR(wide.as_ptr()),
                PWSTR(root.as_mut_ptr()),
                &mut root_len,
                PWSTR(unique.as_mut_ptr()),
                &mut unique_len,
            )
        };
        if status != 0 {
            return Err(resource_fault(
                format!("ClusterPrepareSharedVolumeForBackup({path})"),
                WinError::from(HRESULT::from_win32(status)),
            ));
        }
        Ok(ClusterVolume {
            root_path: from_wide(&root),
            unique_name: from_wide(&unique),
        })
    }

    fn volume_path_name(&self, path: &str) -> ShadowResult<String> {
        let wide = to_wide(path);
        let mut buffer = [0u16; MAX_PATH];
        unsafe { GetVolumePathNameW(PCWSTR(wide.as_ptr()), &mut buffer) }
            .map_err(|err| resource_fault(format!("GetVolumePathName({path})"), err))?;
        Ok(from_wide(&buffer))
    }

    fn volume_name_for_mount_point(&self, root: &str) -> ShadowResult<String> {
        let wide = to_wide(root);
        let mut buffer = [0u16; MAX_PATH];
        unsafe { GetVolumeNameForVolumeMountPointW(PCWSTR(wide.as_ptr()), &mut buffer) }.map_err(
            |err| resource_fault(format!("GetVolumeNameForVolumeMountPoint({root})"), err),
        )?;
        Ok(from_wide(&buffer))
    }

    fn root_and_logical_prefix(&self, unc_path: &str) -> ShadowResult<(String, String)> {
        // Declared first so COM outlives the interface pointers below.
        let _com = ComApartment::initialize()?;
        let components = unsafe { CreateVssBackupComponentsInternal() }
            .map_err(|err| service_fault("CreateVssBackupComponents", err))?;
        let components: IVssBackupComponentsEx4 = components
            .cast()
            .map_err(|err| service_fault("IVssBackupComponentsEx4", err))?;
        let mut path = to_wide(unc_path);
        let mut root_ptr: *mut u16 = std::ptr::null_mut();
        let mut prefix_ptr: *mut u16 = std::ptr::null_mut();
        unsafe {
            components.GetRootAndLogicalPrefixPaths(
                path.as_mut_ptr(),
                &mut root_ptr,
                &mut prefix_ptr,
                false,
            )
        }
        .map_err(|err| service_fault("GetRootAndLogicalPrefixPaths", err))?;

        let root = co_task_string(root_ptr);
        let prefix = co_task_string(prefix_ptr);
        Ok(unsafe { (from_wide_ptr(*root), from_wide_ptr(*prefix)) })
    }

    fn path_exists(&self, path: &str) -> bool {
        let wide = to_wide(path);
        let attributes = unsafe { GetFileAttributesW(PCWSTR(wide.as_ptr())) };
        attributes != INVALID_FILE_ATTRIBUTES
    }
}

/// First mount point of a `\\?\Volume{..}\` name, for log output.
pub(crate) fn volume_display_name(volume: &str) -> Option<String> {
    let wide = to_wide(volume);
    let mut buffer = vec![0u16; MAX_PATH];
    let mut needed = 0u32;
    let result = unsafe {
        GetVolumePathNamesForVolumeNameW(PCWSTR(wide.as_ptr()), Some(&mut buffer), &mut needed)
    };
    if let Err(err) = result {
        trace!("GetVolumePathNamesForVolumeName({volume}) failed: {err}");
        return None;
    }
    split_multi_sz(&buffer).into_iter().next()
}
