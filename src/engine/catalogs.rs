//! Munki catalog rebuild (`makecatalogs <repo>`).

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::Config;
use crate::engine::process::run_with_timeout;

/// Rebuilds the downstream catalog after a cycle that imported something.
pub trait CatalogRebuilder: Send + Sync {
    fn rebuild(&self) -> Result<()>;
}

impl<F> CatalogRebuilder for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn rebuild(&self) -> Result<()> {
        self()
    }
}

#[derive(Clone, Debug)]
pub struct MakeCatalogs {
    cmd_path: PathBuf,
    repo_path: PathBuf,
    timeout: Duration,
}

impl MakeCatalogs {
    pub fn new(cmd_path: &Path, repo_path: &Path, timeout: Duration) -> Self {
        Self {
            cmd_path: cmd_path.to_path_buf(),
            repo_path: repo_path.to_path_buf(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.makecatalogs_path,
            &config.munki_repo,
            config.exec_timeout,
        )
    }
}

impl CatalogRebuilder for MakeCatalogs {
    fn rebuild(&self) -> Result<()> {
        let mut cmd = Command::new(&self.cmd_path);
        cmd.arg(&self.repo_path);
        run_with_timeout(cmd, "makecatalogs", self.timeout)?.check("makecatalogs")
    }
}
