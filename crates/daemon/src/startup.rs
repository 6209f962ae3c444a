// Daemon startup: state directory, PID file, file locations.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{global_dir, DISCORD_SETTINGS_FILE_NAME, SETTINGS_FILE_NAME};
use crate::security::restrict_to_owner;

/// Known-id database: ~/.tidewatch/known_ids.db
const DB_FILE_NAME: &str = "known_ids.db";
/// PID file: ~/.tidewatch/daemon.pid (one daemon per state directory)
const PID_FILE_NAME: &str = "daemon.pid";

/// Resolved paths for daemon state files.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub settings_path: PathBuf,
    pub discord_settings_path: PathBuf,
    pub db_path: PathBuf,
    pub pid_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve paths under `~/.tidewatch/` (or `$TIDEWATCH_HOME`), creating
    /// the directory if needed.
    pub fn resolve() -> Result<Self> {
        let base = global_dir().context("could not determine home directory")?;
        fs::create_dir_all(&base)
            .with_context(|| format!("failed to create `{}`", base.display()))?;
        restrict_to_owner(&base)?;
        Ok(Self::under(base))
    }

    /// Lay out all files under `base` without touching the filesystem.
    pub fn under(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            settings_path: base.join(SETTINGS_FILE_NAME),
            discord_settings_path: base.join(DISCORD_SETTINGS_FILE_NAME),
            db_path: base.join(DB_FILE_NAME),
            pid_path: base.join(PID_FILE_NAME),
            base_dir: base,
        }
    }
}

/// Claim on the state directory, held for the daemon's lifetime. The PID
/// file is removed when this is dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write this process's PID to `path`.
    ///
    /// Fails when the file names another process that is still running. A
    /// file left behind by a dead process, or one that does not hold a PID,
    /// is replaced.
    pub fn acquire(path: &Path) -> Result<Self> {
        let own = std::process::id();
        if let Some(pid) = read_pid(path)? {
            if pid != own && process_alive(pid) {
                bail!(
                    "tidewatchd is already running (pid {pid}); remove `{}` if it is not",
                    path.display()
                );
            }
            warn!(pid, path = %path.display(), "replacing stale PID file");
        }
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("failed to remove stale PID file"),
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                bail!("another tidewatchd claimed `{}` while starting", path.display())
            }
            Err(e) => return Err(e).context("failed to create PID file"),
        };
        write!(file, "{own}").context("failed to write PID")?;
        restrict_to_owner(path)?;
        info!(pid = own, path = %path.display(), "wrote PID file");
        Ok(Self { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(error = %e, "failed to remove PID file");
            }
        }
    }
}

/// PID recorded in `path`. Missing or unparsable files yield `None`.
fn read_pid(path: &Path) -> Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read `{}`", path.display())),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Without a cheap liveness check, any recorded PID counts as running.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}
