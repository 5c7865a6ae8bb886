//! COM apartment lifetime and HRESULT mapping.

use crate::wide::win32_code;
use log::debug;
use shadowrun_core::{ServiceCode, ShadowError, ShadowResult};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use windows::core::{Error as WinError, HRESULT};
use windows::Win32::Foundation::RPC_E_TOO_LATE;
use windows::Win32::System::Com::{
    CoInitializeEx, CoInitializeSecurity, CoUninitialize, COINIT_APARTMENTTHREADED,
    COINIT_DISABLE_OLE1DDE, EOAC_DYNAMIC_CLOAKING, RPC_C_AUTHN_LEVEL_PKT_PRIVACY,
    RPC_C_IMP_LEVEL_IMPERSONATE,
};
use windows::Win32::Security::PSECURITY_DESCRIPTOR;

thread_local! {
    static CURRENT: RefCell<Weak<ComApartment>> = RefCell::new(Weak::new());
}

/// Keeps COM initialized for the current thread. Every interface pointer
/// must be released before the last clone of this is dropped.
pub(crate) struct ComApartment {
    _private: (),
}

impl ComApartment {
    /// Join the apartment already open on this thread, or open one.
    pub(crate) fn initialize() -> ShadowResult<Rc<Self>> {
        if let Some(apartment) = CURRENT.with(|current| current.borrow().upgrade()) {
            return Ok(apartment);
        }

        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE) }
            .ok()
            .map_err(|err| service_fault("CoInitializeEx", err))?;
        let apartment = Rc::new(Self { _private: () });

        // Writers call back into this process, so no security descriptor.
        // Security can be set once per process; a later apartment inherits it.
        let security = unsafe {
            CoInitializeSecurity(
                PSECURITY_DESCRIPTOR::default(),
                -1,
                None,
                None,
                RPC_C_AUTHN_LEVEL_PKT_PRIVACY,
                RPC_C_IMP_LEVEL_IMPERSONATE,
                None,
                EOAC_DYNAMIC_CLOAKING,
                None,
            )
        };
        match security {
            Ok(()) => {}
            Err(err) if err.code() == RPC_E_TOO_LATE => {
                debug!("COM security was already initialized")
            }
            Err(err) => return Err(service_fault("CoInitializeSecurity", err)),
        }

        CURRENT.with(|current| *current.borrow_mut() = Rc::downgrade(&apartment));
        debug!("COM initialized");
        Ok(apartment)
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        debug!("Uninitializing COM");
        unsafe { CoUninitialize() };
    }
}

/// System message text for an HRESULT.
pub(crate) fn describe(code: ServiceCode) -> String {
    let message = WinError::from(HRESULT(code.0)).message();
    let message = message.trim();
    if message.is_empty() {
        format!("Unknown error {code}")
    } else {
        message.to_string()
    }
}

/// A failed service call.
pub(crate) fn service_fault(operation: &str, err: WinError) -> ShadowError {
    let code = ServiceCode(err.code().0);
    ShadowError::ServiceFault {
        operation: operation.to_string(),
        code,
        message: describe(code),
    }
}

/// A failed host resource call, reported with its Win32 error code.
pub(crate) fn resource_fault(operation: impl Into<String>, err: WinError) -> ShadowError {
    ShadowError::ResourceFault {
        operation: operation.into(),
        code: win32_code(err.code().0),
        message: describe(ServiceCode(err.code().0)),
    }
}
