//! Renders snapshot metadata as a command script or as process environment
//! variables for a child process to consume.

use crate::error::{ShadowError, ShadowResult};
use crate::model::SnapshotSet;
use log::{debug, info};
use std::env;
use std::fs;
use std::path::Path;

const LINE_END: &str = "\r\n";

/// Destination for exported variables.
pub trait EnvironmentSink {
    fn set(&mut self, name: &str, value: &str) -> ShadowResult<()>;
    fn unset(&mut self, name: &str) -> ShadowResult<()>;
}

/// Writes into the current process environment, inherited by children.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentSink for ProcessEnvironment {
    fn set(&mut self, name: &str, value: &str) -> ShadowResult<()> {
        if value.contains('\0') {
            return Err(ShadowError::InvalidArgument(format!(
                "value for {name} contains a NUL character"
            )));
        }
        env::set_var(name, value);
        Ok(())
    }

    fn unset(&mut self, name: &str) -> ShadowResult<()> {
        env::remove_var(name);
        Ok(())
    }
}

/// One exported variable. `None` means "not mounted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub value: Option<String>,
}

impl ExportEntry {
    fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The exported variables for `set`, in schema order.
pub fn export_entries(set: &SnapshotSet) -> Vec<ExportEntry> {
    let mut entries = Vec::with_capacity(2 + set.len() * 3);
    entries.push(ExportEntry::new("SHADOW_SET_ID", Some(set.id_string.clone())));
    entries.push(ExportEntry::new("SHADOW_SET_COUNT", Some(set.len().to_string())));
    for (index, snapshot) in set.snapshots.iter().enumerate() {
        let ordinal = index + 1;
        entries.push(ExportEntry::new(
            format!("SHADOW_ID_{ordinal}"),
            Some(snapshot.id_string.clone()),
        ));
        entries.push(ExportEntry::new(
            format!("SHADOW_DEVICE_{ordinal}"),
            Some(snapshot.device().to_string()),
        ));
        entries.push(ExportEntry::new(
            format!("SHADOW_DRIVE_{ordinal}"),
            snapshot.drive(),
        ));
    }
    entries
}

/// Render the command script. Unmounted drives are written as empty values.
pub fn render_script(set: &SnapshotSet) -> String {
    let mut script = String::new();
    script.push_str("@echo.");
    script.push_str(LINE_END);
    script.push_str(&format!(
        "@echo [This script is generated by ShadowRun.exe for the shadow set {}]",
        set.id_string
    ));
    script.push_str(LINE_END);
    script.push_str("@echo.");
    script.push_str(LINE_END);
    script.push_str(LINE_END);
    for entry in export_entries(set) {
        script.push_str(&format!(
            "SET {}={}",
            entry.name,
            entry.value.as_deref().unwrap_or_default()
        ));
        script.push_str(LINE_END);
    }
    script
}

/// Write the command script to `path`, replacing any existing file.
pub fn write_script(set: &SnapshotSet, path: &Path) -> ShadowResult<()> {
    info!("Generating the SETVAR script ({}) ...", path.display());
    fs::write(path, render_script(set)).map_err(|err| {
        ShadowError::Io(std::io::Error::new(
            err.kind(),
            format!("unable to write script {}: {err}", path.display()),
        ))
    })
}

/// Export into `sink`. Unmounted drives are unset rather than set empty.
pub fn apply_environment(set: &SnapshotSet, sink: &mut dyn EnvironmentSink) -> ShadowResult<()> {
    info!("Setting process environment variables ...");
    for entry in export_entries(set) {
        match entry.value {
            Some(value) => {
                debug!("- {}={}", entry.name, value);
                sink.set(&entry.name, &value)?;
            }
            None => {
                debug!("- {} (unset)", entry.name);
                sink.unset(&entry.name)?;
            }
        }
    }
    Ok(())
}
