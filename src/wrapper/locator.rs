// Classpath resolution for one language version
//
// Layout:
//   <wrappers_dir>/<language_version>/kotlin/*               artifacts
//   <wrappers_dir>/<language_version>/<relative_class_dir>   pre-expanded classes

use std::fs;
use std::path::{Component, Path, PathBuf};
use url::Url;

use crate::error::RegistryError;

use super::LoadResult;

/// Artifact folder inside every version directory
pub const ARTIFACTS_DIR: &str = "kotlin";

/// Resolves the classpath of a language version
pub struct ArtifactLocator;

impl ArtifactLocator {
    /// Every entry of the version's artifact folder in enumeration order,
    /// followed by the pre-expanded classes directory.
    pub fn locate(
        language_version: &str,
        wrappers_dir: &Path,
        relative_class_dir: &Path,
    ) -> LoadResult<Vec<Url>> {
        let not_found = |path: &Path, reason: String| RegistryError::ArtifactsNotFound {
            language_version: language_version.to_string(),
            path: path.to_path_buf(),
            reason,
        };

        if !is_plain_name(language_version) {
            return Err(not_found(
                wrappers_dir,
                "version identifier is not a single path component".to_string(),
            ));
        }

        if !is_nested_path(relative_class_dir) {
            return Err(not_found(
                relative_class_dir,
                "class directory must be relative and stay inside the version directory"
                    .to_string(),
            ));
        }

        let wrappers_dir = absolute(wrappers_dir)
            .map_err(|e| not_found(wrappers_dir, format!("cannot resolve directory: {e}")))?;
        let version_dir = wrappers_dir.join(language_version);
        if !version_dir.is_dir() {
            return Err(not_found(&version_dir, "version directory does not exist".to_string()));
        }

        let artifacts_dir = version_dir.join(ARTIFACTS_DIR);
        let entries = fs::read_dir(&artifacts_dir)
            .map_err(|e| not_found(&artifacts_dir, e.to_string()))?;

        let mut classpath = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| not_found(&artifacts_dir, e.to_string()))?;
            let path = entry.path();
            let url = if path.is_dir() {
                Url::from_directory_path(&path)
            } else {
                Url::from_file_path(&path)
            }
            .map_err(|_| not_found(&path, "path is not representable as a file URL".to_string()))?;
            classpath.push(url);
        }

        let classes_dir = version_dir.join(relative_class_dir);
        let classes_url = Url::from_directory_path(&classes_dir).map_err(|_| {
            not_found(&classes_dir, "path is not representable as a file URL".to_string())
        })?;
        classpath.push(classes_url);

        tracing::debug!(
            language_version = %language_version,
            entries = classpath.len(),
            "Resolved wrapper classpath"
        );
        Ok(classpath)
    }
}

fn is_plain_name(version: &str) -> bool {
    let mut components = Path::new(version).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Non-empty relative path made of plain components only
pub(crate) fn is_nested_path(path: &Path) -> bool {
    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    has_name
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
