//! Seam between the command handlers and the native container library.
//!
//! Handlers only ever talk to the [`Container`] and [`ContainerLibrary`]
//! traits. The liblxc binding in [`lxc`] implements them for production; the
//! test suite supplies in-memory doubles. Error codes are sampled inside the
//! implementations, immediately after the native call they describe, and
//! surface as [`ErrnoCode`].

#[cfg(feature = "liblxc")]
pub mod lxc;

use std::ffi::CStr;
use std::fmt;
use std::rc::Rc;

use libc::pid_t;

use crate::marshal::Argv;
use crate::reply::ErrnoCode;

/// Which containers a listing enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Containers that are currently running.
    Active,
    /// Every container, defined or running.
    All,
    /// Containers with a configuration on disk.
    Defined,
}

impl ListKind {
    /// Name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::All => "all",
            Self::Defined => "defined",
        }
    }
}

/// Arguments of a native `create` call.
#[derive(Debug)]
pub struct CreateRequest<'a> {
    /// Template used to populate the root filesystem.
    pub template: &'a CStr,
    /// Backing store type; `None` lets the library choose.
    pub bdev_type: Option<&'a CStr>,
    /// Native `LXC_CREATE_*` flags.
    pub flags: i32,
    /// Extra template arguments; `None` is passed as a null vector.
    pub argv: Option<&'a Argv>,
}

/// Operations on one container, mirroring the native container object.
///
/// Sized buffer calls follow the native convention: a call without a buffer
/// reports the length the value needs, and a call with a buffer writes at most
/// `buffer.len() - 1` bytes followed by a NUL while still returning the full
/// length.
pub trait Container {
    /// Container name.
    fn name(&self) -> Option<Vec<u8>>;
    /// Whether a configuration for the container exists.
    fn is_defined(&self) -> bool;
    /// Whether the container is running.
    fn is_running(&self) -> bool;
    /// Creates the container from a template.
    fn create(&self, request: &CreateRequest<'_>) -> bool;
    /// Deletes the container and its configuration.
    fn destroy(&self) -> bool;
    /// Runs the container in the calling process. Blocks until it stops.
    fn start(&self, use_init: i32, argv: Option<&Argv>) -> bool;
    /// Kills the container.
    fn stop(&self) -> Result<(), ErrnoCode>;
    /// Requests a clean shutdown, waiting up to `timeout` seconds.
    fn shutdown(&self, timeout: i32) -> bool;
    /// Pid of the container's init process, or a negative value.
    fn init_pid(&self) -> pid_t;
    /// Loads the configuration from `path`, or the default location.
    fn load_config(&self, path: Option<&CStr>) -> Result<(), ErrnoCode>;
    /// Newline separated configuration keys under `prefix`.
    fn get_keys(&self, prefix: Option<&CStr>, buffer: Option<&mut [u8]>) -> i32;
    /// Path of the configuration file.
    fn config_file_name(&self) -> Option<Vec<u8>>;
    /// Drops all loaded configuration.
    fn clear_config(&self);
    /// Drops one configuration item.
    fn clear_config_item(&self, key: &CStr) -> Result<(), ErrnoCode>;
    /// Value of a configuration item.
    fn get_config_item(&self, key: &CStr, buffer: Option<&mut [u8]>) -> i32;
    /// Sets a configuration item; `None` sets it to the empty value.
    fn set_config_item(&self, key: &CStr, value: Option<&CStr>) -> Result<(), ErrnoCode>;
    /// LXC root the container lives under.
    fn config_path(&self) -> Option<Vec<u8>>;
    /// Moves the container to another LXC root.
    fn set_config_path(&self, path: &CStr) -> bool;
    /// Takes one additional reference on the native object.
    fn acquire(&self) -> bool;
    /// Drops one reference on the native object.
    fn release(&self);
}

/// Entry points of the native library that do not need a container.
pub trait ContainerLibrary {
    /// Names of the containers of `kind` under `path`, or the default root.
    ///
    /// # Errors
    ///
    /// Returns the native error code when the library reports a negative
    /// count.
    fn list(&self, kind: ListKind, path: Option<&CStr>) -> Result<Vec<Vec<u8>>, ErrnoCode>;

    /// Opens the named container, holding one reference on it.
    fn open(&self, name: &CStr, config_path: Option<&CStr>) -> Option<Rc<dyn Container>>;
}

/// Library used when the port was built without a native backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLibrary;

impl ContainerLibrary for UnavailableLibrary {
    fn list(&self, _kind: ListKind, _path: Option<&CStr>) -> Result<Vec<Vec<u8>>, ErrnoCode> {
        Err(ErrnoCode::new(libc::ENOSYS))
    }

    fn open(&self, _name: &CStr, _config_path: Option<&CStr>) -> Option<Rc<dyn Container>> {
        None
    }
}

/// The library the binary serves with: liblxc when linked, otherwise
/// [`UnavailableLibrary`].
#[must_use]
pub fn default_library() -> Box<dyn ContainerLibrary> {
    #[cfg(feature = "liblxc")]
    {
        Box::new(lxc::LxcLibrary)
    }
    #[cfg(not(feature = "liblxc"))]
    {
        Box::new(UnavailableLibrary)
    }
}

/// The container bound to a session.
///
/// The handle owns the reference taken when the container was opened and
/// releases it on drop. Extra references are only ever taken through
/// [`ContainerHandle::acquire`], which returns a guard that releases them.
pub struct ContainerHandle {
    container: Rc<dyn Container>,
}

impl ContainerHandle {
    /// Binds an already referenced container.
    #[must_use]
    pub fn new(container: Rc<dyn Container>) -> Self {
        Self { container }
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &dyn Container {
        self.container.as_ref()
    }

    /// Takes one extra reference, returning `None` if the library refuses.
    #[must_use]
    pub fn acquire(&self) -> Option<HandleRef> {
        self.container.acquire().then(|| HandleRef {
            container: Rc::clone(&self.container),
        })
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle").finish_non_exhaustive()
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        self.container.release();
    }
}

/// One extra native reference, released when dropped.
#[must_use = "dropping a HandleRef releases the reference immediately"]
pub struct HandleRef {
    container: Rc<dyn Container>,
}

impl fmt::Debug for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRef").finish_non_exhaustive()
    }
}

impl Drop for HandleRef {
    fn drop(&mut self) {
        self.container.release();
    }
}
