//! Turns user-supplied paths into volume names the shadowing service accepts.

use crate::error::{ShadowError, ShadowResult};
use crate::provider::VolumeHost;
use log::{debug, trace};

const UNC_PREFIX: &str = r"\\?\UNC\";
const LOCAL_DEVICE_PREFIX: &str = r"\\?\";
const SHARE_PREFIX: &str = r"\\";

/// How a path is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    FileShare,
    ClusterShared,
    Local,
}

/// True for `\\server\share` and `\\?\UNC\server\share` paths. Local device
/// paths such as `\\?\Volume{...}\` are not shares.
pub fn is_unc_path(path: &str) -> bool {
    if starts_with_ignore_case(path, UNC_PREFIX) {
        true
    } else if starts_with_ignore_case(path, LOCAL_DEVICE_PREFIX) {
        false
    } else {
        starts_with_ignore_case(path, SHARE_PREFIX)
    }
}

/// Ensure `path` ends with exactly one backslash.
pub fn append_backslash(path: &str) -> String {
    let trimmed = path.trim_end_matches('\\');
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push_str(trimmed);
    out.push('\\');
    out
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Resolves paths through a [`VolumeHost`].
pub struct VolumeResolver<H: VolumeHost> {
    host: H,
}

impl<H: VolumeHost> VolumeResolver<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Shares are checked first: cluster and mount point lookups on a share
    /// path are meaningless.
    pub fn classify(&self, path: &str) -> VolumeKind {
        if is_unc_path(path) {
            return VolumeKind::FileShare;
        }
        if self.host.is_on_cluster_shared_volume(&append_backslash(path)) {
            VolumeKind::ClusterShared
        } else {
            VolumeKind::Local
        }
    }

    /// True when `path` names a volume root (`C:`, `C:\`, a mount folder) or
    /// an existing path on a cluster shared volume.
    pub fn is_volume(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let normalized = append_backslash(path);
        let result = if self.host.is_on_cluster_shared_volume(&normalized) {
            self.host.path_exists(&normalized)
        } else {
            match self.host.volume_name_for_mount_point(&normalized) {
                Ok(_) => true,
                Err(err) => {
                    trace!("{normalized} is not a volume mount point: {err}");
                    false
                }
            }
        };
        trace!("is_volume({path}) = {result}");
        result
    }

    /// True when `path` is something `resolve` should be attempted on.
    pub fn accepts(&self, path: &str) -> bool {
        is_unc_path(path) || self.is_volume(path)
    }

    /// Resolve `path` to the unique volume name used with the service.
    pub fn resolve(&self, path: &str) -> ShadowResult<String> {
        if !self.accepts(path) {
            return Err(ShadowError::InvalidVolume {
                input: path.to_string(),
                reason: "expected a volume or a file share path".to_string(),
            });
        }

        let normalized = append_backslash(path);
        let kind = self.classify(path);
        debug!("resolving {path} as {kind:?}");

        let unique = match kind {
            VolumeKind::FileShare => self
                .host
                .root_and_logical_prefix(&normalized)
                .map(|(root, prefix)| {
                    debug!("- root path: {root}, logical prefix: {prefix}");
                    root
                }),
            VolumeKind::ClusterShared => {
                self.host
                    .prepare_cluster_shared_volume(&normalized)
                    .map(|csv| {
                        debug!("- path name: {}", csv.root_path);
                        csv.unique_name
                    })
            }
            VolumeKind::Local => self
                .host
                .volume_path_name(&normalized)
                .and_then(|root| {
                    debug!("- path name: {root}");
                    self.host.volume_name_for_mount_point(&root)
                }),
        }
        .map_err(|err| ShadowError::InvalidVolume {
            input: path.to_string(),
            reason: err.to_string(),
        })?;

        if unique.is_empty() {
            return Err(ShadowError::InvalidVolume {
                input: path.to_string(),
                reason: "resolution returned an empty volume name".to_string(),
            });
        }

        debug!("- unique volume name: {unique}");
        Ok(unique)
    }

    /// Resolve `paths` in order, stopping at the first failure.
    pub fn resolve_all(&self, paths: &[String]) -> ShadowResult<Vec<String>> {
        let mut volumes = Vec::new();
        volumes.try_reserve(paths.len())?;
        for path in paths {
            volumes.push(self.resolve(path)?);
        }
        Ok(volumes)
    }
}
