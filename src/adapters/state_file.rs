//! Scanner run state shared between `start`, `stop` and `status` through a
//! one-word text file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::TurbotraderError;
use crate::domain::scanner::RunState;

pub struct RunStateFile {
    path: PathBuf,
}

impl RunStateFile {
    pub fn new(path: PathBuf) -> Self {
        RunStateFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as `Stopped`.
    pub fn read(&self) -> Result<RunState, TurbotraderError> {
        if !self.path.exists() {
            return Ok(RunState::Stopped);
        }
        let content = fs::read_to_string(&self.path)?;
        RunState::parse(&content).ok_or_else(|| TurbotraderError::Storage {
            reason: format!(
                "unrecognised run state '{}' in {}",
                content.trim(),
                self.path.display()
            ),
        })
    }

    pub fn write(&self, state: RunState) -> Result<(), TurbotraderError> {
        fs::write(&self.path, format!("{}\n", state))?;
        Ok(())
    }
}
