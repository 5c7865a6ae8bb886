//! Host backend for ShadowRun. On Windows the capability traits are served
//! by the Volume Shadow Copy Service, the volume management API and DOS
//! device definitions; elsewhere [`open_session`] reports the platform as
//! unsupported and no path resolves to a volume.

mod wide;

#[cfg(windows)]
mod com;
#[cfg(windows)]
mod drive;
#[cfg(windows)]
mod service;
#[cfg(windows)]
mod volume;

#[cfg(not(windows))]
mod unsupported;

#[cfg(windows)]
pub use drive::DosDeviceNamespace;
#[cfg(windows)]
pub use service::VssShadowService;
#[cfg(windows)]
pub use volume::Win32VolumeHost;

#[cfg(not(windows))]
pub use unsupported::{DosDeviceNamespace, Unsupported, VssShadowService, Win32VolumeHost};

use shadowrun_core::ShadowResult;

/// Volume queries for scanning and resolving the command line. Needs no
/// shadow copy session.
pub fn volume_host() -> Win32VolumeHost {
    Win32VolumeHost::new()
}

/// Initialize COM and open a backup components session, together with the
/// drive namespace used to mount its snapshots.
#[cfg(windows)]
pub fn open_session() -> ShadowResult<(VssShadowService, DosDeviceNamespace)> {
    let apartment = com::ComApartment::initialize()?;
    let service = VssShadowService::create(apartment)?;
    Ok((service, DosDeviceNamespace))
}

#[cfg(not(windows))]
pub fn open_session() -> ShadowResult<(VssShadowService, DosDeviceNamespace)> {
    Err(shadowrun_core::ShadowError::ServiceFault {
        operation: "opening the shadow copy service".to_string(),
        code: unsupported::NOT_IMPLEMENTED,
        message: "volume shadow copies are only available on Windows".to_string(),
    })
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use shadowrun_core::{ShadowError, VolumeHost, VolumeResolver};

    #[test]
    fn session_is_unavailable_off_windows() {
        let err = open_session().err().expect("session must not open");
        assert!(matches!(err, ShadowError::ServiceFault { .. }));
        assert_eq!(err.exit_code(1), 2);
        assert!(err.to_string().contains("0x80004001"));
    }

    #[test]
    fn volume_host_rejects_every_path_off_windows() {
        let host = volume_host();
        assert!(!host.is_on_cluster_shared_volume(r"C:\"));
        assert!(!host.path_exists(r"C:\"));
        assert!(host.volume_path_name(r"C:\").is_err());

        let resolver = VolumeResolver::new(host);
        assert!(!resolver.accepts("C:"));
        let err = resolver.resolve(r"\\server\share").unwrap_err();
        assert!(matches!(err, ShadowError::InvalidVolume { .. }));
    }
}
