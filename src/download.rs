//! Download management for the provisioning pipeline.
//!
//! Fetches the TeX Live installer archive and verifies its checksum.
//! A failed or corrupted download is fatal and never retried; the partial
//! file is deleted so a rebuild starts clean.

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::StageError;
use crate::process::Cmd;

/// Download a URL to a destination path using wget.
///
/// wget is installed by the packages stage, which always runs first.
/// Skips the download if the destination already exists (idempotent on a
/// warm scratch directory).
pub fn fetch(url: &str, dest: &Path) -> Result<(), StageError> {
    if dest.exists() {
        println!("Installer archive already exists at {}", dest.display());
        return Ok(());
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    println!("Fetching {}", url);
    let result = Cmd::new("wget")
        .args(["-q", "-O"])
        .arg_path(dest)
        .arg(url)
        .run()?;

    if !result.success() {
        // wget leaves an empty or partial file behind on failure
        let _ = fs::remove_file(dest);
        return Err(StageError::NetworkFetch(format!(
            "wget failed for {} (exit code {}): {}",
            url,
            result.code(),
            result.stderr_trimmed()
        )));
    }

    println!("Downloaded to {}", dest.display());
    Ok(())
}

/// Verify the SHA-256 checksum of a downloaded file.
///
/// On mismatch the file is deleted and the error reports both digests.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), StageError> {
    println!("Verifying SHA-256 checksum...");

    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let actual = format!("{:x}", hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        fs::remove_file(path)?;
        return Err(StageError::NetworkFetch(format!(
            "checksum mismatch for {}\n  expected: {}\n  actual:   {}\nDeleted the corrupted file.",
            path.display(),
            expected,
            actual
        )));
    }

    println!("Checksum verified OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // SHA-256 of the ASCII string "hello\n"
    const HELLO_SHA256: &str =
        "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn verify_accepts_matching_checksum() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data");
        fs::write(&path, "hello\n").unwrap();

        verify_sha256(&path, HELLO_SHA256).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn verify_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data");
        fs::write(&path, "hello\n").unwrap();

        verify_sha256(&path, &HELLO_SHA256.to_uppercase()).unwrap();
    }

    #[test]
    fn mismatch_deletes_file_and_reports_fetch_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data");
        fs::write(&path, "tampered\n").unwrap();

        let err = verify_sha256(&path, HELLO_SHA256).unwrap_err();
        assert!(matches!(err, StageError::NetworkFetch(_)));
        assert!(!path.exists(), "corrupted file must be removed");
    }
}
