//! liblxc binding.
//!
//! `struct lxc_container` is a table of function pointers. Only the prefix the
//! port calls is mirrored here; liblxc only ever appends to the structure, and
//! the port never allocates one itself, so a prefix view of a library-owned
//! object is sound.
//!
//! The field order follows `lxccontainer.h` from LXC 1.1 onwards, the release
//! that introduced `get_running_config_item`. Older headers lack that entry and
//! are not supported.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::ptr::{self, NonNull};
use std::rc::Rc;

use libc::pid_t;
use tracing::warn;

use crate::listing::MAX_NAME_BYTES;
use crate::marshal::Argv;
use crate::reply::ErrnoCode;

use super::{Container, ContainerLibrary, CreateRequest, ListKind};

type ContainerFn<R> = Option<unsafe extern "C" fn(*mut RawContainer) -> R>;

#[repr(C)]
struct RawContainer {
    name: *mut c_char,
    configfile: *mut c_char,
    pidfile: *mut c_char,
    slock: *mut c_void,
    privlock: *mut c_void,
    numthreads: c_int,
    lxc_conf: *mut c_void,
    error_string: *mut c_char,
    error_num: c_int,
    daemonize: bool,
    config_path: *mut c_char,
    is_defined: ContainerFn<bool>,
    state: ContainerFn<*const c_char>,
    is_running: ContainerFn<bool>,
    freeze: ContainerFn<bool>,
    unfreeze: ContainerFn<bool>,
    init_pid: ContainerFn<pid_t>,
    load_config: Option<unsafe extern "C" fn(*mut RawContainer, *const c_char) -> bool>,
    start: Option<unsafe extern "C" fn(*mut RawContainer, c_int, *const *mut c_char) -> bool>,
    startl: *mut c_void,
    stop: ContainerFn<bool>,
    want_daemonize: Option<unsafe extern "C" fn(*mut RawContainer, bool) -> bool>,
    want_close_all_fds: Option<unsafe extern "C" fn(*mut RawContainer, bool) -> bool>,
    config_file_name: ContainerFn<*mut c_char>,
    wait: Option<unsafe extern "C" fn(*mut RawContainer, *const c_char, c_int) -> bool>,
    set_config_item:
        Option<unsafe extern "C" fn(*mut RawContainer, *const c_char, *const c_char) -> bool>,
    destroy: ContainerFn<bool>,
    save_config: Option<unsafe extern "C" fn(*mut RawContainer, *const c_char) -> bool>,
    create: Option<
        unsafe extern "C" fn(
            *mut RawContainer,
            *const c_char,
            *const c_char,
            *mut c_void,
            c_int,
            *const *mut c_char,
        ) -> bool,
    >,
    createl: *mut c_void,
    rename: Option<unsafe extern "C" fn(*mut RawContainer, *const c_char) -> bool>,
    reboot: ContainerFn<bool>,
    shutdown: Option<unsafe extern "C" fn(*mut RawContainer, c_int) -> bool>,
    clear_config: ContainerFn<()>,
    clear_config_item: Option<unsafe extern "C" fn(*mut RawContainer, *const c_char) -> bool>,
    get_config_item:
        Option<unsafe extern "C" fn(*mut RawContainer, *const c_char, *mut c_char, c_int) -> c_int>,
    get_running_config_item:
        Option<unsafe extern "C" fn(*mut RawContainer, *const c_char) -> *mut c_char>,
    get_keys:
        Option<unsafe extern "C" fn(*mut RawContainer, *const c_char, *mut c_char, c_int) -> c_int>,
    get_interfaces: ContainerFn<*mut *mut c_char>,
    get_ips: *mut c_void,
    get_cgroup_item: *mut c_void,
    set_cgroup_item: *mut c_void,
    get_config_path: ContainerFn<*const c_char>,
    set_config_path: Option<unsafe extern "C" fn(*mut RawContainer, *const c_char) -> bool>,
}

type ListFn = unsafe extern "C" fn(
    *const c_char,
    *mut *mut *mut c_char,
    *mut *mut *mut RawContainer,
) -> c_int;

#[link(name = "lxc")]
unsafe extern "C" {
    fn lxc_container_new(name: *const c_char, configpath: *const c_char) -> *mut RawContainer;
    fn lxc_container_get(c: *mut RawContainer) -> c_int;
    fn lxc_container_put(c: *mut RawContainer) -> c_int;
    fn list_active_containers(
        lxcpath: *const c_char,
        names: *mut *mut *mut c_char,
        cret: *mut *mut *mut RawContainer,
    ) -> c_int;
    fn list_all_containers(
        lxcpath: *const c_char,
        names: *mut *mut *mut c_char,
        cret: *mut *mut *mut RawContainer,
    ) -> c_int;
    fn list_defined_containers(
        lxcpath: *const c_char,
        names: *mut *mut *mut c_char,
        cret: *mut *mut *mut RawContainer,
    ) -> c_int;
}

fn optional_ptr(value: Option<&CStr>) -> *const c_char {
    value.map_or(ptr::null(), CStr::as_ptr)
}

fn argv_ptr(argv: Option<&Argv>) -> *const *mut c_char {
    argv.map_or(ptr::null(), |argv| argv.as_ptr().cast())
}

/// Copies a library-owned string; the library keeps ownership.
///
/// # Safety
///
/// `value` must be null or point to a NUL-terminated string.
unsafe fn copy_string(value: *const c_char) -> Option<Vec<u8>> {
    if value.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    Some(unsafe { CStr::from_ptr(value) }.to_bytes().to_vec())
}

fn buffer_parts(buffer: Option<&mut [u8]>) -> (*mut c_char, c_int) {
    match buffer {
        Some(bytes) => (
            bytes.as_mut_ptr().cast(),
            c_int::try_from(bytes.len()).unwrap_or(c_int::MAX),
        ),
        None => (ptr::null_mut(), 0),
    }
}

/// A container opened through liblxc.
pub struct LxcContainer {
    raw: NonNull<RawContainer>,
}

impl LxcContainer {
    fn vtable(&self) -> &RawContainer {
        // SAFETY: `raw` came from `lxc_container_new` and the handle holds a
        // reference for as long as this value lives.
        unsafe { self.raw.as_ref() }
    }

    fn ptr(&self) -> *mut RawContainer {
        self.raw.as_ptr()
    }

    fn call_bool(&self, function: ContainerFn<bool>) -> bool {
        // SAFETY: the function pointer belongs to this container's table.
        function.is_some_and(|call| unsafe { call(self.ptr()) })
    }

    fn sampled(&self, call: impl FnOnce() -> bool) -> Result<(), ErrnoCode> {
        ErrnoCode::clear();
        let succeeded = call();
        let code = ErrnoCode::last();
        if succeeded { Ok(()) } else { Err(code) }
    }
}

impl Container for LxcContainer {
    fn name(&self) -> Option<Vec<u8>> {
        // SAFETY: `name` is NUL-terminated or null.
        unsafe { copy_string(self.vtable().name) }
    }

    fn is_defined(&self) -> bool {
        self.call_bool(self.vtable().is_defined)
    }

    fn is_running(&self) -> bool {
        self.call_bool(self.vtable().is_running)
    }

    fn create(&self, request: &CreateRequest<'_>) -> bool {
        let Some(create) = self.vtable().create else {
            return false;
        };
        // SAFETY: every pointer is valid for the duration of the call.
        unsafe {
            create(
                self.ptr(),
                request.template.as_ptr(),
                optional_ptr(request.bdev_type),
                ptr::null_mut(),
                request.flags,
                argv_ptr(request.argv),
            )
        }
    }

    fn destroy(&self) -> bool {
        self.call_bool(self.vtable().destroy)
    }

    fn start(&self, use_init: i32, argv: Option<&Argv>) -> bool {
        let Some(start) = self.vtable().start else {
            return false;
        };
        // SAFETY: the vector outlives the call.
        unsafe { start(self.ptr(), use_init, argv_ptr(argv)) }
    }

    fn stop(&self) -> Result<(), ErrnoCode> {
        self.sampled(|| self.call_bool(self.vtable().stop))
    }

    fn shutdown(&self, timeout: i32) -> bool {
        let Some(shutdown) = self.vtable().shutdown else {
            return false;
        };
        // SAFETY: plain call on a live container.
        unsafe { shutdown(self.ptr(), timeout) }
    }

    fn init_pid(&self) -> pid_t {
        match self.vtable().init_pid {
            // SAFETY: plain call on a live container.
            Some(init_pid) => unsafe { init_pid(self.ptr()) },
            None => -1,
        }
    }

    fn load_config(&self, path: Option<&CStr>) -> Result<(), ErrnoCode> {
        let load = self.vtable().load_config;
        self.sampled(|| {
            // SAFETY: `path` is null or NUL-terminated.
            load.is_some_and(|call| unsafe { call(self.ptr(), optional_ptr(path)) })
        })
    }

    fn get_keys(&self, prefix: Option<&CStr>, buffer: Option<&mut [u8]>) -> i32 {
        let Some(get_keys) = self.vtable().get_keys else {
            return -1;
        };
        let (data, len) = buffer_parts(buffer);
        // SAFETY: `data` is null with `len` zero, or a writable buffer of `len` bytes.
        unsafe { get_keys(self.ptr(), optional_ptr(prefix), data, len) }
    }

    fn config_file_name(&self) -> Option<Vec<u8>> {
        let name = self.vtable().config_file_name?;
        // SAFETY: plain call; the result is a heap string we now own.
        let raw = unsafe { name(self.ptr()) };
        // SAFETY: `raw` is null or NUL-terminated.
        let copied = unsafe { copy_string(raw) };
        if !raw.is_null() {
            // SAFETY: allocated with malloc by liblxc and not used after this point.
            unsafe { libc::free(raw.cast()) };
        }
        copied
    }

    fn clear_config(&self) {
        if let Some(clear) = self.vtable().clear_config {
            // SAFETY: plain call on a live container.
            unsafe { clear(self.ptr()) };
        }
    }

    fn clear_config_item(&self, key: &CStr) -> Result<(), ErrnoCode> {
        let clear = self.vtable().clear_config_item;
        // SAFETY: `key` is NUL-terminated.
        self.sampled(|| clear.is_some_and(|call| unsafe { call(self.ptr(), key.as_ptr()) }))
    }

    fn get_config_item(&self, key: &CStr, buffer: Option<&mut [u8]>) -> i32 {
        let Some(get) = self.vtable().get_config_item else {
            return -1;
        };
        let (data, len) = buffer_parts(buffer);
        // SAFETY: `data` is null with `len` zero, or a writable buffer of `len` bytes.
        unsafe { get(self.ptr(), key.as_ptr(), data, len) }
    }

    fn set_config_item(&self, key: &CStr, value: Option<&CStr>) -> Result<(), ErrnoCode> {
        let set = self.vtable().set_config_item;
        self.sampled(|| {
            // SAFETY: both strings are null or NUL-terminated.
            set.is_some_and(|call| unsafe { call(self.ptr(), key.as_ptr(), optional_ptr(value)) })
        })
    }

    fn config_path(&self) -> Option<Vec<u8>> {
        let path = self.vtable().get_config_path?;
        // SAFETY: the returned string is owned by the container.
        unsafe { copy_string(path(self.ptr())) }
    }

    fn set_config_path(&self, path: &CStr) -> bool {
        let Some(set) = self.vtable().set_config_path else {
            return false;
        };
        // SAFETY: `path` is NUL-terminated.
        unsafe { set(self.ptr(), path.as_ptr()) }
    }

    fn acquire(&self) -> bool {
        // SAFETY: the container is live while `self` exists.
        unsafe { lxc_container_get(self.ptr()) > 0 }
    }

    fn release(&self) {
        // SAFETY: balanced against `lxc_container_new` or `acquire`.
        unsafe { lxc_container_put(self.ptr()) };
    }
}

/// Entry points of liblxc itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct LxcLibrary;

impl LxcLibrary {
    fn list_fn(kind: ListKind) -> ListFn {
        match kind {
            ListKind::Active => list_active_containers,
            ListKind::All => list_all_containers,
            ListKind::Defined => list_defined_containers,
        }
    }
}

impl ContainerLibrary for LxcLibrary {
    fn list(&self, kind: ListKind, path: Option<&CStr>) -> Result<Vec<Vec<u8>>, ErrnoCode> {
        let list = Self::list_fn(kind);
        let mut names: *mut *mut c_char = ptr::null_mut();

        ErrnoCode::clear();
        // SAFETY: `names` is a valid out pointer; containers are not requested.
        let count = unsafe { list(optional_ptr(path), &mut names, ptr::null_mut()) };
        let code = ErrnoCode::last();

        let Ok(count) = usize::try_from(count) else {
            return Err(code);
        };

        let mut copied = Vec::with_capacity(count);
        for index in 0..count {
            // SAFETY: liblxc returned `count` malloc'd, NUL-terminated names.
            unsafe {
                let name = *names.add(index);
                let len = libc::strnlen(name, MAX_NAME_BYTES);
                copied.push(std::slice::from_raw_parts(name.cast::<u8>(), len).to_vec());
                libc::free(name.cast());
            }
        }
        if !names.is_null() {
            // SAFETY: the array itself was malloc'd by liblxc.
            unsafe { libc::free(names.cast()) };
        }
        Ok(copied)
    }

    fn open(&self, name: &CStr, config_path: Option<&CStr>) -> Option<Rc<dyn Container>> {
        // SAFETY: both strings are null or NUL-terminated.
        let raw = unsafe { lxc_container_new(name.as_ptr(), optional_ptr(config_path)) };
        match NonNull::new(raw) {
            Some(raw) => Some(Rc::new(LxcContainer { raw })),
            None => {
                warn!(name = %name.to_string_lossy(), "liblxc could not open container");
                None
            }
        }
    }
}
