//! Font Cache Builder stage.
//!
//! Rebuilds the system font index after the font packages are present.
//! Purely idempotent: rerunning is always safe and produces the same
//! observable index. The verbose output is diagnostic only.

use crate::error::{Stage, StageError};
use crate::process::Cmd;
use crate::stages::{Context, ProvisionStage};

pub struct FontCache;

impl ProvisionStage for FontCache {
    fn stage(&self) -> Stage {
        Stage::Fonts
    }

    fn run(&self, _ctx: &mut Context) -> Result<(), StageError> {
        println!("Rebuilding font cache...");
        let status = Cmd::new("fc-cache").args(["-f", "-v"]).run_interactive()?;
        if !status.success() {
            return Err(StageError::FontCache(format!(
                "fc-cache exited with code {}",
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}
