//! Temporary redirection of standard output.
//!
//! Standard output carries the reply channel, so anything a native call prints
//! there would corrupt it. [`SilencedStdout`] points the descriptor at the null
//! device for the duration of such a call and puts the original back.

use std::io::{self, Write};
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup, dup2};
use thiserror::Error;
use tracing::warn;

const STDIO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::stdio");

const NULL_DEVICE: &str = "/dev/null";

/// Errors raised while redirecting or restoring a descriptor.
#[derive(Debug, Error)]
pub enum SilenceError {
    /// Pending output could not be flushed before redirecting.
    #[error("failed to flush standard output: {0}")]
    Flush(#[source] io::Error),
    /// The original descriptor could not be duplicated.
    #[error("failed to save descriptor {fd}: {source}")]
    Save {
        /// Descriptor being redirected.
        fd: RawFd,
        /// Underlying error.
        #[source]
        source: Errno,
    },
    /// The null device could not be opened.
    #[error("failed to open /dev/null: {0}")]
    OpenNull(#[source] Errno),
    /// The descriptor could not be pointed at the null device.
    #[error("failed to redirect descriptor {fd}: {source}")]
    Redirect {
        /// Descriptor being redirected.
        fd: RawFd,
        /// Underlying error.
        #[source]
        source: Errno,
    },
    /// The saved descriptor could not be put back.
    #[error("failed to restore descriptor {fd}: {source}")]
    Restore {
        /// Descriptor being restored.
        fd: RawFd,
        /// Underlying error.
        #[source]
        source: Errno,
    },
}

/// A descriptor temporarily pointed at the null device.
///
/// Call [`SilencedStdout::restore`] to put the descriptor back and observe
/// failures. Dropping the guard without restoring also restores, logging any
/// failure.
#[derive(Debug)]
#[must_use = "the descriptor is restored when the guard is dropped"]
pub struct SilencedStdout {
    target: RawFd,
    saved: Option<RawFd>,
}

impl SilencedStdout {
    /// Redirects the process's standard output.
    ///
    /// # Errors
    ///
    /// Fails when buffered output cannot be flushed or any descriptor
    /// operation fails. Standard output is untouched on failure.
    pub fn engage() -> Result<Self, SilenceError> {
        io::stdout().flush().map_err(SilenceError::Flush)?;
        Self::engage_fd(libc::STDOUT_FILENO)
    }

    /// Redirects an arbitrary descriptor.
    ///
    /// # Errors
    ///
    /// Fails when any descriptor operation fails. The descriptor is untouched
    /// on failure.
    pub fn engage_fd(target: RawFd) -> Result<Self, SilenceError> {
        let saved = dup(target).map_err(|source| SilenceError::Save { fd: target, source })?;

        let null = match open(NULL_DEVICE, OFlag::O_WRONLY | OFlag::O_CLOEXEC, Mode::empty()) {
            Ok(fd) => fd,
            Err(errno) => {
                let _ = close(saved);
                return Err(SilenceError::OpenNull(errno));
            }
        };

        let redirected = dup2(null, target);
        let _ = close(null);
        if let Err(source) = redirected {
            let _ = close(saved);
            return Err(SilenceError::Redirect { fd: target, source });
        }

        Ok(Self {
            target,
            saved: Some(saved),
        })
    }

    /// Puts the original descriptor back.
    ///
    /// # Errors
    ///
    /// Returns [`SilenceError::Restore`] when the descriptor cannot be
    /// duplicated back into place.
    pub fn restore(mut self) -> Result<(), SilenceError> {
        self.put_back()
    }

    fn put_back(&mut self) -> Result<(), SilenceError> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        let restored = dup2(saved, self.target);
        let _ = close(saved);
        restored.map(drop).map_err(|source| SilenceError::Restore {
            fd: self.target,
            source,
        })
    }
}

impl Drop for SilencedStdout {
    fn drop(&mut self) {
        if let Err(error) = self.put_back() {
            warn!(target: STDIO_TARGET, %error, "descriptor left redirected");
        }
    }
}
