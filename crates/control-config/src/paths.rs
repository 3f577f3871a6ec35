//! File system paths for a control-plane instance.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages runtime file system paths for one control-plane process
/// (control socket, PID file, config file, logs).
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.control-plane, or
    /// `/var/lib/control-plane` under a system install).
    base_dir: PathBuf,
}

impl Paths {
    /// Uses `~/.control-plane` for runtime files.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("could not determine home directory".to_string()))?;
        Ok(Self {
            base_dir: home.join(".control-plane"),
        })
    }

    /// Create a new Paths instance rooted at a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `~/.control-plane/config.json`.
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// `~/.control-plane/control.sock` — the operator control socket
    /// (start/stop/status), not the router wire protocol.
    pub fn socket_file(&self) -> PathBuf {
        self.base_dir.join("control.sock")
    }

    /// `~/.control-plane/control-plane.pid`.
    pub fn pid_file(&self) -> PathBuf {
        self.base_dir.join("control-plane.pid")
    }

    /// `~/.control-plane/logs`.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("failed to determine home directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn with_base_dir_derives_every_path_under_it() {
        let base = PathBuf::from("/tmp/test-control-plane");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.socket_file(), base.join("control.sock"));
        assert_eq!(paths.pid_file(), base.join("control-plane.pid"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
    }

    #[test]
    fn default_uses_home_dir() {
        let paths = Paths::new().unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(paths.base_dir(), &home.join(".control-plane"));
    }

    #[test]
    fn ensure_dirs_creates_directories() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("control-plane");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());
        paths.ensure_dirs().unwrap();
        assert!(base.is_dir());
        assert!(paths.logs_dir().is_dir());
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.base_dir().exists());
    }
}
