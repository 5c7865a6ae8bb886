//! `DriveNamespace` over DOS device definitions.

use crate::com::resource_fault;
use crate::wide::to_wide;
use shadowrun_core::guard::Guard;
use shadowrun_core::{DriveNamespace, ShadowResult};
use windows::core::{Error as WinError, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, GENERIC_READ, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, DefineDosDeviceW, GetLogicalDrives, DDD_EXACT_MATCH_ON_REMOVE,
    DDD_REMOVE_DEFINITION, DEFINE_DOS_DEVICE_FLAGS, FILE_FLAG_BACKUP_SEMANTICS, FILE_SHARE_READ,
    FILE_SHARE_WRITE, OPEN_EXISTING,
};

#[derive(Debug, Default)]
pub struct DosDeviceNamespace;

impl DriveNamespace for DosDeviceNamespace {
    fn logical_drives(&self) -> ShadowResult<u32> {
        let mask = unsafe { GetLogicalDrives() };
        if mask == 0 {
            return Err(resource_fault("GetLogicalDrives", WinError::from_win32()));
        }
        Ok(mask)
    }

    fn define(&mut self, drive: &str, target: &str) -> ShadowResult<()> {
        let name = to_wide(drive);
        let path = to_wide(target);
        unsafe {
            DefineDosDeviceW(
                DEFINE_DOS_DEVICE_FLAGS(0),
                PCWSTR(name.as_ptr()),
                PCWSTR(path.as_ptr()),
            )
        }
        .map_err(|err| resource_fault(format!("DefineDosDevice({drive})"), err))
    }

    fn remove_exact(&mut self, drive: &str, target: &str) -> ShadowResult<()> {
        let name = to_wide(drive);
        let path = to_wide(target);
        unsafe {
            DefineDosDeviceW(
                DDD_REMOVE_DEFINITION | DDD_EXACT_MATCH_ON_REMOVE,
                PCWSTR(name.as_ptr()),
                PCWSTR(path.as_ptr()),
            )
        }
        .map_err(|err| resource_fault(format!("DefineDosDevice(remove {drive})"), err))
    }

    fn probe(&self, drive: &str) -> ShadowResult<()> {
        let name = to_wide(drive);
        let handle = unsafe {
            CreateFileW(
                PCWSTR(name.as_ptr()),
                GENERIC_READ.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS,
                HANDLE::default(),
            )
        }
        .map_err(|err| resource_fault(format!("CreateFile({drive})"), err))?;
        let _handle = Guard::new(handle, |handle| {
            let _ = unsafe { CloseHandle(handle) };
        });
        Ok(())
    }
}
