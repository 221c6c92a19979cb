use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{InstallError, Result};
use crate::schema::{self, ServerRegistry};

/// Merge an extracted registry into an existing one.
///
/// Every incoming server replaces the existing entry of the same name
/// wholesale; a launch spec is atomic, so fields absent from the incoming
/// entry are not retained. Names only present in `existing` are preserved.
/// Neither input is mutated.
pub fn merge_registries(existing: &ServerRegistry, incoming: &ServerRegistry) -> ServerRegistry {
    let mut merged = existing.clone();
    for (name, config) in incoming.iter() {
        merged.insert(name.clone(), config.clone());
    }
    merged
}

/// Recursively merge a trusted configuration document into `target`.
///
/// Objects merge key by key, everything else is overwritten by the incoming
/// value. Only for data that is already normalized and trusted; extracted
/// registries go through [`merge_registries`] instead.
pub fn deep_merge(target: &mut Value, incoming: &Value) {
    if let (Value::Object(target_map), Value::Object(incoming_map)) = (&mut *target, incoming) {
        for (key, value) in incoming_map {
            match target_map.get_mut(key) {
                Some(slot) => deep_merge(slot, value),
                None => {
                    target_map.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *target = incoming.clone();
}

/// On-disk MCP configuration store (`{"mcpServers": {...}}`).
pub struct ConfigStore {
    path: PathBuf,
    registry: ServerRegistry,
}

impl ConfigStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty registry; an unreadable or malformed
    /// file is logged and also yields an empty registry, so a corrupt store
    /// never blocks an install.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let registry = match Self::load_registry(&path) {
            Ok(registry) => registry,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(
                        "could not read config store {}: {e}; starting with an empty registry",
                        path.display()
                    );
                }
                ServerRegistry::new()
            }
        };

        Self { path, registry }
    }

    fn load_registry(path: &Path) -> Result<ServerRegistry> {
        let file = File::open(path).map_err(|e| InstallError::Persistence(e.to_string()))?;
        let reader = BufReader::new(file);

        let value: Value = serde_json::from_reader(reader)
            .map_err(|e| InstallError::Persistence(e.to_string()))?;

        // An existing store written in the alternate schema is converted
        // to the canonical shape here and stays canonical from then on.
        schema::normalize(&value)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Merge an extracted registry into the store and persist it.
    pub fn install(&mut self, incoming: &ServerRegistry) -> Result<()> {
        self.registry = merge_registries(&self.registry, incoming);
        self.save()
    }

    /// Deep-merge a trusted, fully formed configuration document into the
    /// store and persist it.
    pub fn merge_trusted(&mut self, config: &Value) -> Result<()> {
        let mut current = self.registry.to_value();
        deep_merge(&mut current, config);
        self.registry = schema::normalize(&current)?;
        self.save()
    }

    /// Write the canonical shape with 4-space indentation, entries in
    /// insertion order.
    pub fn save(&self) -> Result<()> {
        let file = File::create(&self.path).map_err(|e| InstallError::Persistence(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
        self.registry
            .to_value()
            .serialize(&mut ser)
            .map_err(|e| InstallError::Persistence(e.to_string()))?;

        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|e| InstallError::Persistence(e.to_string()))?;

        Ok(())
    }
}
