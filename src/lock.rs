use crate::error::{Result, StackError};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

/// Exclusive advisory lock held for the lifetime of one driver run.
/// Released when dropped.
pub struct StackLock {
    #[cfg(unix)]
    _flock: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl std::fmt::Debug for StackLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackLock").finish_non_exhaustive()
    }
}

impl StackLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        Self::lock(file, path)
    }

    #[cfg(unix)]
    fn lock(file: File, path: &Path) -> Result<Self> {
        use nix::errno::Errno;
        use nix::fcntl::{Flock, FlockArg};

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => {
                debug!("acquired {}", path.display());
                Ok(StackLock { _flock: flock })
            }
            Err((_, Errno::EWOULDBLOCK)) => Err(StackError::Busy {
                path: path.to_path_buf(),
            }),
            Err((_, errno)) => Err(StackError::Io(std::io::Error::from(errno))),
        }
    }

    // No advisory locking off unix; concurrent runs are not detected.
    #[cfg(not(unix))]
    fn lock(file: File, path: &Path) -> Result<Self> {
        debug!("opened {} (unlocked)", path.display());
        Ok(StackLock { _file: file })
    }
}
