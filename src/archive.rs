//! Installer archive extraction.
//!
//! The TeX Live network installer ships as a gzipped tarball containing
//! exactly one top-level directory (`install-tl-YYYYMMDD/`). Extraction
//! strips that component so the installer lands at a fixed scratch path
//! regardless of the dated directory name. An archive violating the
//! single-root assumption fails extraction rather than silently placing
//! files in the wrong location.

use std::fs;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::StageError;

/// Extract a .tar.gz archive into `dest`, stripping the single top-level
/// directory component from every entry.
pub fn extract_stripped(archive_path: &Path, dest: &Path) -> Result<(), StageError> {
    let paths = entry_paths(archive_path)?;
    let root = single_root(&paths)?;
    println!(
        "Extracting {} (root '{}') to {}",
        archive_path.display(),
        root.display(),
        dest.display()
    );

    let file = fs::File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    fs::create_dir_all(dest)?;

    for entry in archive.entries().map_err(|e| malformed(archive_path, &e))? {
        let mut entry = entry.map_err(|e| malformed(archive_path, &e))?;
        if is_pax_header(&entry) {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| malformed(archive_path, &e))?
            .into_owned();

        let stripped: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .skip(1)
            .collect();
        // The root directory entry itself strips to nothing
        if stripped.as_os_str().is_empty() {
            continue;
        }

        let target = dest.join(stripped);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(|e| {
            StageError::ArchiveFormat(format!("failed to unpack '{}': {}", path.display(), e))
        })?;
    }

    Ok(())
}

/// Determine the unique top-level directory of an entry listing.
///
/// Fails when the listing is empty, when entries escape the root
/// (absolute paths or `..` components), or when more than one top-level
/// name is present.
pub fn single_root(paths: &[PathBuf]) -> Result<PathBuf, StageError> {
    if paths.is_empty() {
        return Err(StageError::ArchiveFormat("archive contains no entries".into()));
    }

    let mut root: Option<PathBuf> = None;
    for path in paths {
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(StageError::ArchiveFormat(format!(
                "entry '{}' escapes the archive root",
                path.display()
            )));
        }

        let first = path
            .components()
            .find(|c| !matches!(c, Component::CurDir))
            .ok_or_else(|| {
                StageError::ArchiveFormat(format!("entry '{}' has no path", path.display()))
            })?;
        let first = match first {
            Component::Normal(name) => PathBuf::from(name),
            _ => {
                return Err(StageError::ArchiveFormat(format!(
                    "entry '{}' escapes the archive root",
                    path.display()
                )))
            }
        };

        match &root {
            None => root = Some(first),
            Some(r) if *r == first => {}
            Some(r) => {
                return Err(StageError::ArchiveFormat(format!(
                    "expected exactly one top-level directory, found '{}' and '{}'",
                    r.display(),
                    first.display()
                )))
            }
        }
    }

    // Non-empty input guarantees a root at this point
    root.ok_or_else(|| StageError::ArchiveFormat("archive contains no entries".into()))
}

/// List entry paths, validating link entries along the way so a bad
/// archive is rejected before anything is written.
fn entry_paths(archive_path: &Path) -> Result<Vec<PathBuf>, StageError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut paths = Vec::new();
    for entry in archive.entries().map_err(|e| malformed(archive_path, &e))? {
        let entry = entry.map_err(|e| malformed(archive_path, &e))?;
        if is_pax_header(&entry) {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| malformed(archive_path, &e))?
            .into_owned();
        check_link_entry(&entry, &path)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Reject link entries that would point outside the extraction root.
///
/// Later file entries can be routed through a symlink that escapes the
/// root, so an escaping target fails the whole archive up front. Symlink
/// targets are resolved relative to the link's own directory (after the
/// top-level component is stripped); hard-link targets are archive paths,
/// where any `..` or absolute target is already out of bounds.
fn check_link_entry<R: std::io::Read>(
    entry: &tar::Entry<'_, R>,
    path: &Path,
) -> Result<(), StageError> {
    let ty = entry.header().entry_type();
    if !ty.is_symlink() && !ty.is_hard_link() {
        return Ok(());
    }

    let target = entry
        .link_name()
        .map_err(|e| {
            StageError::ArchiveFormat(format!(
                "link entry '{}' has an unreadable target: {}",
                path.display(),
                e
            ))
        })?
        .ok_or_else(|| {
            StageError::ArchiveFormat(format!("link entry '{}' has no target", path.display()))
        })?;

    let escapes = if ty.is_symlink() {
        let stripped: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .skip(1)
            .collect();
        link_escapes(&stripped, &target)
    } else {
        target.is_absolute()
            || target
                .components()
                .any(|c| matches!(c, Component::ParentDir))
    };

    if escapes {
        return Err(StageError::ArchiveFormat(format!(
            "link entry '{}' targets '{}' outside the extraction root",
            path.display(),
            target.display()
        )));
    }
    Ok(())
}

/// Whether a symlink at `link_path` (relative to the extraction root) with
/// the given target can resolve to something outside the root.
fn link_escapes(link_path: &Path, target: &Path) -> bool {
    if target.is_absolute() {
        return true;
    }

    // Directories above the link, inside the root
    let mut depth = link_path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count() as i64
        - 1;

    for component in target.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            _ => return true,
        }
    }
    false
}

fn is_pax_header<R: std::io::Read>(entry: &tar::Entry<'_, R>) -> bool {
    let ty = entry.header().entry_type();
    ty.is_pax_global_extensions() || ty.is_pax_local_extensions()
}

fn malformed(archive_path: &Path, err: &dyn std::fmt::Display) -> StageError {
    StageError::ArchiveFormat(format!(
        "malformed archive {}: {}",
        archive_path.display(),
        err
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn single_root_accepts_one_top_level_dir() {
        let root = single_root(&paths(&[
            "install-tl-20240312/",
            "install-tl-20240312/install-tl",
            "install-tl-20240312/tlpkg/TeXLive/TLUtils.pm",
        ]))
        .unwrap();
        assert_eq!(root, PathBuf::from("install-tl-20240312"));
    }

    #[test]
    fn single_root_tolerates_leading_dot_components() {
        let root = single_root(&paths(&["./pkg/", "./pkg/bin/tool"])).unwrap();
        assert_eq!(root, PathBuf::from("pkg"));
    }

    #[test]
    fn empty_listing_is_rejected() {
        let err = single_root(&[]).unwrap_err();
        assert!(matches!(err, StageError::ArchiveFormat(_)));
    }

    #[test]
    fn multiple_roots_are_rejected() {
        let err = single_root(&paths(&["a/x", "b/y"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'a'") && msg.contains("'b'"));
    }

    #[test]
    fn parent_dir_escape_is_rejected() {
        let err = single_root(&paths(&["pkg/../../etc/passwd"])).unwrap_err();
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn absolute_entry_is_rejected() {
        let err = single_root(&paths(&["/etc/passwd"])).unwrap_err();
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn symlink_within_the_root_is_allowed() {
        // pkg/alias -> real: stays at the root level after stripping
        assert!(!link_escapes(Path::new("alias"), Path::new("real")));
        assert!(!link_escapes(
            Path::new("docs/link"),
            Path::new("../bin/tool")
        ));
    }

    #[test]
    fn symlink_climbing_past_the_root_escapes() {
        assert!(link_escapes(Path::new("alias"), Path::new("../outside")));
        assert!(link_escapes(
            Path::new("a/b/link"),
            Path::new("../../../etc/passwd")
        ));
    }

    #[test]
    fn absolute_symlink_target_escapes() {
        assert!(link_escapes(Path::new("deep/alias"), Path::new("/etc")));
    }
}
