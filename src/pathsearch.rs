//! Architecture-conditional executable search path.
//!
//! TeX Live installs its binaries under `<TEXDIR>/bin/<platform>`, and the
//! final runtime architecture is not known when the pipeline is authored.
//! All supported platform directories are prepended to PATH in enumerated
//! order; at most one exists on any concrete machine, and executable
//! resolution naturally skips nonexistent directories (first existing wins,
//! order implies nothing beyond that).

use std::path::{Path, PathBuf};

/// Supported TeX Live platform directory names, one per CPU architecture.
pub const TEX_PLATFORMS: [&str; 3] = ["armhf-linux", "aarch64-linux", "x86_64-linux"];

/// Candidate binary directories for a TeX Live root, in enumerated order.
pub fn candidate_dirs(texdir: &Path) -> Vec<PathBuf> {
    TEX_PLATFORMS
        .iter()
        .map(|platform| texdir.join("bin").join(platform))
        .collect()
}

/// First candidate directory that exists, if any.
///
/// Zero or one matches are expected; a successful TeX Live install creates
/// exactly the directory for the build machine's architecture.
pub fn resolve_existing(dirs: &[PathBuf]) -> Option<&PathBuf> {
    dirs.iter().find(|dir| dir.is_dir())
}

/// Build a PATH value with `dirs` prepended ahead of the current value.
pub fn prepend_to_path(dirs: &[PathBuf], current: Option<&str>) -> String {
    let mut parts: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
    if let Some(current) = current {
        if !current.is_empty() {
            parts.push(current.to_string());
        }
    }
    parts.join(":")
}

/// TeX Live platform name for a Rust target architecture, if supported.
pub fn tex_platform_for(arch: &str) -> Option<&'static str> {
    match arch {
        "arm" => Some("armhf-linux"),
        "aarch64" => Some("aarch64-linux"),
        "x86_64" => Some("x86_64-linux"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn candidates_cover_all_platforms_in_order() {
        let dirs = candidate_dirs(Path::new("/usr/local/texlive"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/usr/local/texlive/bin/armhf-linux"),
                PathBuf::from("/usr/local/texlive/bin/aarch64-linux"),
                PathBuf::from("/usr/local/texlive/bin/x86_64-linux"),
            ]
        );
    }

    #[test]
    fn first_existing_candidate_wins() {
        let temp = TempDir::new().unwrap();
        let dirs = candidate_dirs(temp.path());
        // Only the x86_64 directory exists
        fs::create_dir_all(&dirs[2]).unwrap();
        assert_eq!(resolve_existing(&dirs), Some(&dirs[2]));

        // An earlier candidate appearing takes precedence
        fs::create_dir_all(&dirs[0]).unwrap();
        assert_eq!(resolve_existing(&dirs), Some(&dirs[0]));
    }

    #[test]
    fn no_existing_candidate_resolves_to_none() {
        let temp = TempDir::new().unwrap();
        let dirs = candidate_dirs(temp.path());
        assert_eq!(resolve_existing(&dirs), None);
    }

    #[test]
    fn prepend_puts_candidates_ahead_of_current_path() {
        let dirs = candidate_dirs(Path::new("/tex"));
        let path = prepend_to_path(&dirs, Some("/usr/bin:/bin"));
        assert_eq!(
            path,
            "/tex/bin/armhf-linux:/tex/bin/aarch64-linux:/tex/bin/x86_64-linux:/usr/bin:/bin"
        );
    }

    #[test]
    fn prepend_handles_empty_current_path() {
        let dirs = vec![PathBuf::from("/tex/bin/x86_64-linux")];
        assert_eq!(prepend_to_path(&dirs, None), "/tex/bin/x86_64-linux");
        assert_eq!(prepend_to_path(&dirs, Some("")), "/tex/bin/x86_64-linux");
    }

    #[test]
    fn platform_mapping_covers_supported_arches() {
        assert_eq!(tex_platform_for("x86_64"), Some("x86_64-linux"));
        assert_eq!(tex_platform_for("aarch64"), Some("aarch64-linux"));
        assert_eq!(tex_platform_for("arm"), Some("armhf-linux"));
        assert_eq!(tex_platform_for("riscv64"), None);
    }
}
