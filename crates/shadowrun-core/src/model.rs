//! In-memory model of one snapshot set and its members.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identity of a snapshot set as assigned by the shadowing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SetId(pub Uuid);

/// Identity of a single snapshot inside a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SnapshotId(pub Uuid);

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

/// A drive letter bound to a snapshot device object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountBinding {
    pub letter: char,
    pub target: String,
}

impl MountBinding {
    /// Device name in the `X:` form used for DOS device definitions.
    pub fn drive(&self) -> String {
        format!("{}:", self.letter)
    }
}

/// One volume's point-in-time copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub id_string: String,
    pub source_volume: String,
    /// Populated once the set has been committed and finalized.
    pub device_path: Option<String>,
    /// Populated while a drive binding is live.
    pub mount: Option<MountBinding>,
}

impl Snapshot {
    pub fn new(id: SnapshotId, source_volume: impl Into<String>) -> Self {
        Self {
            id,
            id_string: id.to_string(),
            source_volume: source_volume.into(),
            device_path: None,
            mount: None,
        }
    }

    pub fn device(&self) -> &str {
        self.device_path.as_deref().unwrap_or_default()
    }

    /// Mounted drive in `X:` form, if any.
    pub fn drive(&self) -> Option<String> {
        self.mount.as_ref().map(MountBinding::drive)
    }
}

/// A batch of snapshots committed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSet {
    pub id: SetId,
    pub id_string: String,
    pub snapshots: Vec<Snapshot>,
}

impl SnapshotSet {
    pub fn new(id: SetId) -> Self {
        Self {
            id,
            id_string: id.to_string(),
            snapshots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_render_braced_lowercase() {
        let id = SetId(Uuid::from_u128(0xB5946137_7B9F_4925_AF80_51ABD60B20D5));
        assert_eq!(id.to_string(), "{b5946137-7b9f-4925-af80-51abd60b20d5}");
    }

    #[test]
    fn snapshot_starts_without_device_or_mount() {
        let snap = Snapshot::new(SnapshotId(Uuid::nil()), r"\\?\Volume{1}\");
        assert_eq!(snap.device(), "");
        assert!(snap.drive().is_none());
        assert_eq!(snap.id_string, "{00000000-0000-0000-0000-000000000000}");
    }
}
