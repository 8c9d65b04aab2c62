//! Runtime Identity Provisioner stage.
//!
//! Creates the non-root account the final runtime session executes as,
//! transfers ownership of the home directory to it, and relaxes the
//! directory's permission bits. Ordering is load-bearing: ownership and
//! permission mutation happen while still root; the identity switch is the
//! last act of the pipeline (`login_shell`), never earlier.
//!
//! The world-writable home directory is a deliberate trade-off so arbitrary
//! host-volume mounts stay writable at container-run time. It is scoped to
//! a disposable, non-networked build context and is called out here for
//! auditors rather than hidden.

use std::fs;
use std::os::unix::fs::{lchown, PermissionsExt};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Stage, StageError};
use crate::process::Cmd;
use crate::stages::{Context, ProvisionStage};

/// GECOS label for the runtime account.
const ACCOUNT_GECOS: &str = "Default user";

pub struct Identity;

impl ProvisionStage for Identity {
    fn stage(&self) -> Stage {
        Stage::Identity
    }

    fn run(&self, ctx: &mut Context) -> Result<(), StageError> {
        let config = &ctx.config;
        create_account(config)?;

        let entry = lookup_account(Path::new("/etc/passwd"), &config.username)?;

        // The home/work directory may not exist yet on a bare layer
        fs::create_dir_all(&config.home)?;
        take_ownership(&config.home, entry.uid, entry.gid)?;
        relax_permissions(&config.home)?;

        println!(
            "Runtime identity ready: {} (uid {}, gid {}) owns {}",
            config.username,
            entry.uid,
            entry.gid,
            config.home.display()
        );
        Ok(())
    }
}

/// Create a disabled-password account bound to the fixed UID.
///
/// Run twice with the same UID, the second run fails here: adduser refuses
/// a UID collision and that is exactly the fail-fast behavior we want.
fn create_account(config: &Config) -> Result<(), StageError> {
    println!(
        "Creating account {} with uid {}...",
        config.username, config.uid
    );
    let result = Cmd::new("adduser")
        .args(["--disabled-password", "--gecos", ACCOUNT_GECOS, "--uid"])
        .arg(config.uid.to_string())
        .arg(&config.username)
        .run()?;

    if !result.success() {
        return Err(classify_adduser_failure(
            result.stderr_trimmed(),
            result.code(),
        ));
    }
    Ok(())
}

/// Classify an adduser failure, distinguishing identity collisions.
pub fn classify_adduser_failure(stderr: &str, code: i32) -> StageError {
    let collision = stderr.lines().find(|line| {
        line.contains("already in use")
            || line.contains("is not unique")
            || line.contains("already exists")
    });
    match collision {
        Some(line) => StageError::IdentityCreation(format!("identity collision: {}", line.trim())),
        None => StageError::IdentityCreation(format!(
            "adduser failed (exit code {code}): {stderr}"
        )),
    }
}

/// One parsed /etc/passwd entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub uid: u32,
    pub gid: u32,
    pub home: String,
    pub shell: String,
}

/// Look up an account in a passwd file.
pub fn lookup_account(passwd_path: &Path, username: &str) -> Result<PasswdEntry, StageError> {
    let content = fs::read_to_string(passwd_path)?;
    parse_passwd(&content, username).ok_or_else(|| {
        StageError::IdentityCreation(format!(
            "account '{}' not present in {} after creation",
            username,
            passwd_path.display()
        ))
    })
}

/// Find a username's entry in passwd-format content.
pub fn parse_passwd(content: &str, username: &str) -> Option<PasswdEntry> {
    for line in content.lines() {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() >= 7 && parts[0] == username {
            let uid = parts[2].parse().ok()?;
            let gid = parts[3].parse().ok()?;
            return Some(PasswdEntry {
                uid,
                gid,
                home: parts[5].to_string(),
                shell: parts[6].to_string(),
            });
        }
    }
    None
}

/// Recursively transfer ownership of a directory tree.
///
/// Uses lchown so symlinks inside the tree change owner themselves instead
/// of retargeting whatever they point at.
pub fn take_ownership(root: &Path, uid: u32, gid: u32) -> Result<(), StageError> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            StageError::IdentityCreation(format!("walking {}: {}", root.display(), e))
        })?;
        lchown(entry.path(), Some(uid), Some(gid))?;
    }
    Ok(())
}

/// Relax permission bits to 0o777 across a directory tree so any effective
/// user at container-run time can write into mounted volumes.
pub fn relax_permissions(root: &Path) -> Result<(), StageError> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            StageError::IdentityCreation(format!("walking {}: {}", root.display(), e))
        })?;
        // set_permissions follows symlinks; the target is handled on its own visit
        if entry.file_type().is_symlink() {
            continue;
        }
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(0o777))?;
    }
    Ok(())
}

/// Hand control to an interactive shell as the runtime account.
///
/// Only called after the full pipeline succeeded, so ownership and
/// permission mutation are already done; this is the privilege drop.
/// On success this replaces the current process and never returns.
pub fn login_shell(config: &Config, search_path: &str) -> Result<(), StageError> {
    let entry = lookup_account(Path::new("/etc/passwd"), &config.username)?;

    println!(
        "Switching to {} and starting a shell in {}",
        config.username,
        config.home.display()
    );
    let err = Command::new("/bin/bash")
        .current_dir(&config.home)
        .env("PATH", search_path)
        .env("HOME", &entry.home)
        .env("USER", &config.username)
        .uid(entry.uid)
        .gid(entry.gid)
        .exec();

    // exec only returns on failure
    Err(StageError::Io(err))
}
