//! Verrou sur le répertoire de sortie
//!
//! Un seul run écrit dans un répertoire donné. Le fichier de verrou est
//! supprimé au drop, y compris en cas d'erreur ou de panique.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Nom du fichier de verrou
pub const LOCK_FILE: &str = ".sara-report.lock";

/// Accès exclusif au répertoire de sortie
#[derive(Debug)]
pub struct OutputLock {
    dir: PathBuf,
    lock_path: PathBuf,
}

impl OutputLock {
    /// Crée le répertoire si besoin et prend le verrou
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .context(format!("Failed to create output directory: {}", dir.display()))?;

        let lock_path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                anyhow::bail!(
                    "Output directory {} is used by another run (remove {} if no run is active)",
                    dir.display(),
                    lock_path.display()
                );
            }
            Err(e) => {
                return Err(e).context(format!("Failed to lock {}", dir.display()));
            }
        };
        writeln!(file, "{}", std::process::id())?;

        debug!(dir = %dir.display(), "Output directory locked");
        Ok(Self {
            dir: dir.to_path_buf(),
            lock_path,
        })
    }

    /// Répertoire verrouillé
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Chemin d'un fichier dans le répertoire, sous-répertoires créés
    pub fn file(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(path)
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            warn!(path = %self.lock_path.display(), error = %e, "Failed to release output lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let dir = std::env::temp_dir().join("sara_lock_test");
        std::fs::remove_dir_all(&dir).ok();

        {
            let lock = OutputLock::acquire(&dir).unwrap();
            assert!(dir.join(LOCK_FILE).exists());
            assert!(OutputLock::acquire(&dir).is_err());

            let nested = lock.file("sub/table.csv").unwrap();
            assert!(nested.parent().unwrap().is_dir());
        }

        assert!(!dir.join(LOCK_FILE).exists());
        assert!(OutputLock::acquire(&dir).is_ok());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_lock_released_on_error_path() {
        let dir = std::env::temp_dir().join("sara_lock_err_test");
        std::fs::remove_dir_all(&dir).ok();

        let failing = || -> Result<()> {
            let _lock = OutputLock::acquire(&dir)?;
            anyhow::bail!("formatter failed")
        };
        assert!(failing().is_err());
        assert!(!dir.join(LOCK_FILE).exists());

        std::fs::remove_dir_all(dir).ok();
    }
}
