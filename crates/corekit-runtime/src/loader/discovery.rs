//! Directory scanning for module and command manifests.
//!
//! A directory entry is a manifest when it is either a `*.toml` file or a
//! sub-directory holding a `module.toml`. Scanning is not recursive.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use corekit_core::error::AppError;
use corekit_core::result::AppResult;
use corekit_core::types::module_name_from_path;

use super::catalog::ModuleCatalog;
use super::definition::ModuleDefinition;

/// Manifest file of a sub-directory module.
pub const DIRECTORY_MANIFEST: &str = "module.toml";

/// A manifest found while scanning.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    /// File stem, or the directory name for directory modules.
    pub name: String,
    /// The manifest file itself.
    pub manifest_path: PathBuf,
    /// The scanned entry (file or directory).
    pub path: PathBuf,
}

/// Module manifest contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleManifest {
    /// Mount id; defaults to the entry name.
    #[serde(default)]
    pub id: Option<String>,
    /// Catalog key of the factory; defaults to the id.
    #[serde(default)]
    pub factory: Option<String>,
    /// Ids that must be mounted first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Lower mounts first among placeable modules.
    #[serde(default)]
    pub priority: i32,
    /// Whether the module ships a `commands` directory.
    #[serde(default)]
    pub commands: bool,
}

/// Compiles `exclude` entries into glob patterns.
pub fn compile_patterns(exclude: &[String]) -> AppResult<Vec<glob::Pattern>> {
    exclude
        .iter()
        .map(|raw| {
            glob::Pattern::new(raw).map_err(|e| {
                AppError::configuration(format!("Invalid exclude pattern \"{raw}\": {e}"))
            })
        })
        .collect()
}

/// Scans `dir` for manifests, sorted by entry name. Returns `None` when the
/// directory does not exist.
pub fn scan(dir: &Path, exclude: &[glob::Pattern]) -> AppResult<Option<Vec<ManifestFile>>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        if exclude.iter().any(|pattern| pattern.matches(&file_name)) {
            debug!(path = %path.display(), "Excluded from scan");
            continue;
        }

        if path.is_dir() {
            let manifest_path = path.join(DIRECTORY_MANIFEST);
            if !manifest_path.is_file() {
                debug!(path = %path.display(), "No module.toml found, skipping");
                continue;
            }
            found.push(ManifestFile {
                name: file_name,
                manifest_path,
                path,
            });
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            found.push(ManifestFile {
                name: module_name_from_path(&path),
                manifest_path: path.clone(),
                path,
            });
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    info!(dir = %dir.display(), count = found.len(), "Scanned directory");
    Ok(Some(found))
}

/// Parses a manifest through the `config` crate. An empty file yields
/// `T::default()` values for every defaulted field.
pub fn parse_manifest<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .build()?;
    settings.try_deserialize().map_err(|e| {
        AppError::configuration(format!("Invalid manifest {}: {e}", path.display()))
    })
}

/// Turns scanned manifests into module definitions. A manifest whose
/// factory is not in `catalog` yields a definition without a factory.
pub fn module_definitions(
    files: &[ManifestFile],
    catalog: &ModuleCatalog,
) -> AppResult<Vec<ModuleDefinition>> {
    files
        .iter()
        .map(|file| {
            let manifest: ModuleManifest = parse_manifest(&file.manifest_path)?;
            let id = manifest.id.clone().unwrap_or_else(|| file.name.clone());
            let factory_key = manifest.factory.clone().unwrap_or_else(|| id.clone());
            let commands = manifest.commands || (file.path.is_dir() && file.path.join("commands").is_dir());

            let definition = match catalog.factory(&factory_key) {
                Some(factory) => ModuleDefinition::new(id, factory),
                None => ModuleDefinition::without_factory(id),
            };
            Ok(definition
                .with_dependencies(manifest.dependencies)
                .with_priority(manifest.priority)
                .with_path(file.path.clone())
                .with_commands(commands))
        })
        .collect()
}
