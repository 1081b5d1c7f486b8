use crate::error::{Result, TreefenceError};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads a template file
///
/// # Errors
///
/// - `TreefenceError::NotFound` if the path doesn't exist or isn't a file.
/// - `TreefenceError::Io` if there's an error reading the file.
pub fn read_template(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(TreefenceError::NotFound {
            path: path.to_path_buf(),
        });
    }

    fs::read_to_string(path).map_err(Into::into)
}

/// Resolves a directive target such as `@docs/` inside `base_dir`.
///
/// Targets that don't exist yet still resolve, so the caller decides how a
/// missing directory is reported.
///
/// # Errors
///
/// - `TreefenceError::Access` if the target lies outside `base_dir`.
/// - `TreefenceError::Io` if `base_dir` itself can't be canonicalized.
pub fn resolve_local_path(target: &str, base_dir: &Path) -> Result<PathBuf> {
    let relative = target.trim_start_matches('@').trim_start_matches(['/', '\\']);
    let base = base_dir.canonicalize()?;
    let resolved = canonicalize_lenient(&base.join(relative))?;

    if resolved.starts_with(&base) {
        Ok(resolved)
    } else {
        Err(TreefenceError::access(
            resolved.display().to_string(),
            "path escapes the base directory",
        ))
    }
}

/// Canonicalizes the longest existing ancestor and re-appends the missing tail
fn canonicalize_lenient(path: &Path) -> Result<PathBuf> {
    let mut missing: Vec<&OsStr> = Vec::new();
    let mut existing = path;
    loop {
        match existing.canonicalize() {
            Ok(found) => {
                return Ok(missing.iter().rev().fold(found, |acc, name| acc.join(name)));
            }
            Err(err) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = parent;
                }
                _ => return Err(err.into()),
            },
        }
    }
}
