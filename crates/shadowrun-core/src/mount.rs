//! Binds snapshot devices to temporary drive letters and reverses the
//! bindings on teardown.

use crate::error::{ShadowError, ShadowResult};
use crate::guard::Guard;
use crate::model::{MountBinding, Snapshot};
use crate::provider::DriveNamespace;
use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};

/// Win32 `ERROR_ALREADY_ASSIGNED`.
const DRIVE_IN_USE: u32 = 85;

fn letter_bit(letter: char) -> u32 {
    1 << (letter as u32 - 'A' as u32)
}

/// Allocates drive letters and binds them to snapshot devices.
pub struct MountManager<D: DriveNamespace> {
    drives: D,
}

impl<D: DriveNamespace> MountManager<D> {
    pub fn new(drives: D) -> Self {
        Self { drives }
    }

    pub fn drives(&self) -> &D {
        &self.drives
    }

    /// Lowest letter A-Z not reported live by the host.
    pub fn next_available_letter(&self) -> ShadowResult<char> {
        let mask = self.drives.logical_drives()?;
        ('A'..='Z')
            .find(|letter| mask & letter_bit(*letter) == 0)
            .ok_or_else(|| {
                ShadowError::invalid_state("selecting a mount drive letter", "no drive letter A-Z is free")
            })
    }

    /// Accept `requested` only if it is a letter A-Z that the host does not
    /// already have in use.
    pub fn verify_available_letter(&self, requested: char) -> ShadowResult<char> {
        let letter = requested.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(ShadowError::invalid_state(
                "using mount drive letter",
                format!("`{requested}` is not a letter A-Z"),
            ));
        }
        let mask = self.drives.logical_drives()?;
        if mask & letter_bit(letter) != 0 {
            return Err(ShadowError::ResourceFault {
                operation: format!("reserving mount drive {letter}:"),
                code: DRIVE_IN_USE,
                message: format!("drive letter {letter} is already in use"),
            });
        }
        Ok(letter)
    }

    /// Mount every snapshot. Snapshot `i` uses `letters[i]` when given and the
    /// lowest free letter otherwise.
    pub fn mount(&mut self, snapshots: &mut [Snapshot], letters: &str) -> ShadowResult<()> {
        info!("Mounting shadow copies ...");
        let requested: Vec<char> = letters.chars().collect();

        for (index, snapshot) in snapshots.iter_mut().enumerate() {
            if snapshot.mount.is_some() {
                continue;
            }

            let letter = match requested.get(index) {
                Some(letter) => self.verify_available_letter(*letter)?,
                None => self.next_available_letter()?,
            };
            let target = snapshot.device_path.clone().ok_or_else(|| {
                ShadowError::invalid_state(
                    "mounting a shadow copy",
                    format!("{} has no device path", snapshot.id_string),
                )
            })?;
            let binding = MountBinding { letter, target };
            let drive = binding.drive();

            self.drives.define(&drive, &binding.target)?;
            let defined = Guard::new(&mut self.drives, |drives: &mut D| {
                if let Err(err) = drives.remove_exact(&drive, &binding.target) {
                    warn!("- Unable to remove unusable mount {drive}: {err}");
                }
            });

            // A successful define does not prove the target works.
            if let Err(err) = defined.probe(&drive) {
                error!("Mount {drive} of {} is not accessible!", binding.target);
                return Err(ShadowError::MountVerificationFailed {
                    drive: drive.clone(),
                    target: binding.target.clone(),
                    reason: err.to_string(),
                });
            }
            defined.dismiss();

            info!("- Mounted {drive} to {}", binding.target);
            snapshot.mount = Some(binding);
        }
        Ok(())
    }

    /// Remove every live binding. Failures are logged and skipped; returns the
    /// number of bindings that could not be removed.
    pub fn unmount(&mut self, snapshots: &mut [Snapshot]) -> usize {
        info!("Unmounting shadow copies ...");
        let mut failures = 0;
        for snapshot in snapshots.iter_mut() {
            let Some(binding) = snapshot.mount.as_ref() else {
                continue;
            };
            let drive = binding.drive();
            match self.drives.remove_exact(&drive, &binding.target) {
                Ok(()) => {
                    info!("- Unmounted {drive} from {}", binding.target);
                    snapshot.mount = None;
                }
                Err(err) => {
                    warn!("- Unable to unmount {drive} from {}: {err}", binding.target);
                    failures += 1;
                }
            }
        }
        failures
    }

    /// Teardown variant of [`unmount`](Self::unmount): every error and panic
    /// is discarded so cleanup never replaces the primary outcome.
    pub fn unmount_silent(&mut self, snapshots: &mut [Snapshot]) {
        for snapshot in snapshots.iter_mut() {
            let drives = &mut self.drives;
            let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                if let Some(binding) = snapshot.mount.as_ref() {
                    if drives
                        .remove_exact(&binding.drive(), &binding.target)
                        .is_ok()
                    {
                        debug!("- Removed leftover mount {}", binding.drive());
                        snapshot.mount = None;
                    }
                }
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeDrives;
    use crate::model::SnapshotId;
    use uuid::Uuid;

    fn committed(count: usize) -> Vec<Snapshot> {
        (0..count)
            .map(|i| {
                let mut snap = Snapshot::new(SnapshotId(Uuid::from_u128(i as u128 + 1)), "vol");
                snap.device_path = Some(format!(
                    r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy{}",
                    i + 1
                ));
                snap
            })
            .collect()
    }

    #[test]
    fn positional_letters_then_lowest_free() {
        let drives = FakeDrives::with_live("AC");
        let mut manager = MountManager::new(drives.clone());
        let mut snaps = committed(3);

        manager.mount(&mut snaps, "BD").unwrap();

        assert_eq!(snaps[0].drive().as_deref(), Some("B:"));
        assert_eq!(snaps[1].drive().as_deref(), Some("D:"));
        assert_eq!(snaps[2].drive().as_deref(), Some("E:"));
    }

    #[test]
    fn lowercase_letters_are_accepted() {
        let drives = FakeDrives::with_live("C");
        let mut manager = MountManager::new(drives);
        let mut snaps = committed(1);
        manager.mount(&mut snaps, "x").unwrap();
        assert_eq!(snaps[0].drive().as_deref(), Some("X:"));
    }

    #[test]
    fn live_letter_is_rejected_before_binding() {
        let drives = FakeDrives::with_live("C");
        let mut manager = MountManager::new(drives.clone());
        let mut snaps = committed(1);

        let err = manager.mount(&mut snaps, "C").unwrap_err();
        assert!(matches!(err, ShadowError::ResourceFault { code, .. } if code == DRIVE_IN_USE));
        assert!(drives.state.borrow().defines.is_empty());
        assert!(snaps[0].mount.is_none());
    }

    #[test]
    fn non_letter_is_a_precondition_failure() {
        let mut manager = MountManager::new(FakeDrives::default());
        let mut snaps = committed(1);
        let err = manager.mount(&mut snaps, "1").unwrap_err();
        assert!(matches!(err, ShadowError::InvalidState { .. }));
    }

    #[test]
    fn exhausted_letters_are_a_precondition_failure() {
        let drives = FakeDrives::with_live("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        let mut manager = MountManager::new(drives);
        let mut snaps = committed(1);
        let err = manager.mount(&mut snaps, "").unwrap_err();
        assert!(matches!(err, ShadowError::InvalidState { .. }));
    }

    #[test]
    fn unusable_binding_fails_verification_and_is_reverted() {
        let drives = FakeDrives::with_live("C");
        let mut snaps = committed(1);
        drives
            .state
            .borrow_mut()
            .broken_targets
            .insert(snaps[0].device().to_string());
        let mut manager = MountManager::new(drives.clone());

        let err = manager.mount(&mut snaps, "").unwrap_err();
        assert!(matches!(err, ShadowError::MountVerificationFailed { .. }));
        assert!(snaps[0].mount.is_none());
        assert!(!drives.is_bound('A'));
    }

    #[test]
    fn mount_unmount_round_trip() {
        let drives = FakeDrives::with_live("C");
        let mut manager = MountManager::new(drives.clone());
        let mut snaps = committed(2);

        manager.mount(&mut snaps, "").unwrap();
        assert!(drives.is_bound('A'));
        assert!(drives.is_bound('B'));

        assert_eq!(manager.unmount(&mut snaps), 0);
        assert!(!drives.is_bound('A'));
        assert!(!drives.is_bound('B'));
        assert!(snaps.iter().all(|s| s.mount.is_none()));
    }

    #[test]
    fn unmount_continues_past_failures() {
        let drives = FakeDrives::with_live("C");
        let mut manager = MountManager::new(drives.clone());
        let mut snaps = committed(2);
        manager.mount(&mut snaps, "").unwrap();

        drives.state.borrow_mut().fail_remove = true;
        assert_eq!(manager.unmount(&mut snaps), 2);
        assert_eq!(drives.state.borrow().removals.len(), 2);
        assert!(snaps.iter().all(|s| s.mount.is_some()));
    }

    #[test]
    fn unmount_leaves_unrelated_mappings() {
        let drives = FakeDrives::with_live("C");
        let mut manager = MountManager::new(drives.clone());
        let mut snaps = committed(1);
        manager.mount(&mut snaps, "M").unwrap();

        drives
            .state
            .borrow_mut()
            .bindings
            .insert('M', r"\Device\Other".to_string());
        assert_eq!(manager.unmount(&mut snaps), 1);
        assert_eq!(
            drives.state.borrow().bindings.get(&'M').map(String::as_str),
            Some(r"\Device\Other")
        );
    }

    #[test]
    fn silent_unmount_swallows_errors_and_panics() {
        let drives = FakeDrives::with_live("C");
        let mut manager = MountManager::new(drives.clone());
        let mut snaps = committed(2);
        manager.mount(&mut snaps, "").unwrap();

        drives.state.borrow_mut().panic_on_remove = true;
        manager.unmount_silent(&mut snaps);
        assert!(snaps.iter().all(|s| s.mount.is_some()));

        drives.state.borrow_mut().panic_on_remove = false;
        manager.unmount_silent(&mut snaps);
        assert!(snaps.iter().all(|s| s.mount.is_none()));
        assert!(drives.state.borrow().bindings.is_empty());
    }
}
