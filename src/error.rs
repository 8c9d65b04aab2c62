//! Stage identifiers and the pipeline error taxonomy.
//!
//! Every stage returns `Result<(), StageError>`. All errors are fatal to the
//! pipeline: there is no retry and no partial-success continuation, because a
//! silently-incomplete environment surfaces its symptoms (a missing font, a
//! missing TeX package) far from their cause.

use std::fmt;

use thiserror::Error;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// OS-level package installation (apt).
    Packages,
    /// System font index rebuild.
    Fonts,
    /// Selective TeX Live installation.
    TexLive,
    /// manim + documentation tooling installation (pip).
    App,
    /// Runtime user creation and home-directory ownership.
    Identity,
}

impl Stage {
    /// All stages in pipeline order. Stage N+1 never runs before stage N
    /// completes successfully.
    pub const ALL: [Stage; 5] = [
        Stage::Packages,
        Stage::Fonts,
        Stage::TexLive,
        Stage::App,
        Stage::Identity,
    ];

    /// Short name used in CLI output and the provision manifest.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Packages => "packages",
            Stage::Fonts => "fonts",
            Stage::TexLive => "texlive",
            Stage::App => "app",
            Stage::Identity => "identity",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure kinds for pipeline stages.
///
/// Each stage owns a small slice of this taxonomy; the pipeline runner does
/// not interpret the variants beyond printing them and halting.
#[derive(Debug, Error)]
pub enum StageError {
    /// A download from a remote mirror failed (network, mirror outage, or
    /// checksum mismatch). Never retried.
    #[error("network fetch failed: {0}")]
    NetworkFetch(String),

    /// An archive did not have the expected layout (exactly one top-level
    /// directory, no escaping entries).
    #[error("unexpected archive layout: {0}")]
    ArchiveFormat(String),

    /// The distribution installer rejected the profile or failed mid-install.
    #[error("profile install failed: {0}")]
    ProfileInstall(String),

    /// A requested package name does not exist in the remote catalog.
    /// Fail-closed: a silently-skipped package produces a runtime that is
    /// missing a rendering capability with no visible symptom until first use.
    #[error("package '{name}' not found in {catalog} catalog")]
    PackageNotFound { name: String, catalog: &'static str },

    /// A package exists in the catalog but failed to install.
    #[error("package install failed: {0}")]
    PackageInstall(String),

    /// A required executable is not resolvable on the search path.
    #[error("required tool '{0}' not found on PATH")]
    ToolchainMissing(String),

    /// The application (or its documentation dependencies) failed to build.
    #[error("application build failed: {0}")]
    Compile(String),

    /// Account creation failed (UID collision, name collision, or tool error).
    #[error("identity creation failed: {0}")]
    IdentityCreation(String),

    /// The font index rebuild failed.
    #[error("font cache rebuild failed: {0}")]
    FontCache(String),

    /// Filesystem or process-spawn error outside the kinds above.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
