//! In-memory doubles for the native seam.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ffi::CStr;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::rc::Rc;

use libc::pid_t;

use crate::dispatch::{CommandTable, Dispatcher};
use crate::marshal::Argv;
use crate::native::{Container, ContainerHandle, ContainerLibrary, CreateRequest, ListKind};
use crate::reply::{ErrnoCode, Reply};
use crate::session::Session;
use crate::supervisor::Supervisor;
use crate::term::Term;

/// What a fake `create` call received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRecord {
    pub template: String,
    pub bdev_type: Option<String>,
    pub flags: i32,
    pub argv: Option<Vec<String>>,
}

/// Mutable state behind a [`FakeContainer`].
#[derive(Debug)]
pub struct FakeState {
    pub defined: bool,
    pub running: bool,
    pub config: BTreeMap<Vec<u8>, Vec<u8>>,
    pub config_path: Option<Vec<u8>>,
    pub config_file: Option<Vec<u8>>,
    pub loaded_from: Option<Option<String>>,
    pub references: i32,
    pub refuse_acquire: bool,
    pub stop_error: Option<i32>,
    pub reject_config_path: bool,
    pub keys_length: Option<i32>,
    pub init_pid: pid_t,
    pub created: Option<CreateRecord>,
    pub started: Option<(i32, Option<Vec<String>>)>,
    pub shutdown_timeout: Option<i32>,
    pub calls: Vec<&'static str>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            defined: false,
            running: false,
            config: BTreeMap::new(),
            config_path: Some(b"/var/lib/lxc".to_vec()),
            config_file: None,
            loaded_from: None,
            references: 1,
            refuse_acquire: false,
            stop_error: None,
            reject_config_path: false,
            keys_length: None,
            init_pid: -1,
            created: None,
            started: None,
            shutdown_timeout: None,
            calls: Vec::new(),
        }
    }
}

/// Container double keeping its configuration in memory.
#[derive(Debug)]
pub struct FakeContainer {
    name: Vec<u8>,
    pub state: RefCell<FakeState>,
}

impl FakeContainer {
    pub fn named(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: name.as_bytes().to_vec(),
            state: RefCell::new(FakeState::default()),
        })
    }

    pub fn references(&self) -> i32 {
        self.state.borrow().references
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    fn record(&self, call: &'static str) {
        self.state.borrow_mut().calls.push(call);
    }

    fn keys(&self, prefix: Option<&CStr>) -> Vec<u8> {
        let state = self.state.borrow();
        let prefix = prefix.map_or(&b""[..], CStr::to_bytes);
        let matching: Vec<&[u8]> = state
            .config
            .keys()
            .filter(|key| key.starts_with(prefix))
            .map(Vec::as_slice)
            .collect();
        matching.join(&b'\n')
    }
}

fn strings(argv: Option<&Argv>) -> Option<Vec<String>> {
    argv.map(|argv| {
        argv.iter()
            .map(|value| value.to_string_lossy().into_owned())
            .collect()
    })
}

/// Copies `value` into `buffer` the way the native library does and returns
/// the untruncated length.
fn fill(value: &[u8], buffer: Option<&mut [u8]>) -> i32 {
    if let Some(buffer) = buffer {
        if let Some(room) = buffer.len().checked_sub(1) {
            let copied = value.len().min(room);
            buffer[..copied].copy_from_slice(&value[..copied]);
            buffer[copied] = 0;
        }
    }
    i32::try_from(value.len()).unwrap_or(i32::MAX)
}

impl Container for FakeContainer {
    fn name(&self) -> Option<Vec<u8>> {
        self.record("name");
        Some(self.name.clone())
    }

    fn is_defined(&self) -> bool {
        self.record("is_defined");
        self.state.borrow().defined
    }

    fn is_running(&self) -> bool {
        self.record("is_running");
        self.state.borrow().running
    }

    fn create(&self, request: &CreateRequest<'_>) -> bool {
        self.record("create");
        let mut state = self.state.borrow_mut();
        state.created = Some(CreateRecord {
            template: request.template.to_string_lossy().into_owned(),
            bdev_type: request
                .bdev_type
                .map(|value| value.to_string_lossy().into_owned()),
            flags: request.flags,
            argv: strings(request.argv),
        });
        state.defined = true;
        true
    }

    fn destroy(&self) -> bool {
        self.record("destroy");
        let mut state = self.state.borrow_mut();
        let existed = state.defined;
        state.defined = false;
        existed
    }

    fn start(&self, use_init: i32, argv: Option<&Argv>) -> bool {
        self.record("start");
        let mut state = self.state.borrow_mut();
        state.started = Some((use_init, strings(argv)));
        state.running = true;
        true
    }

    fn stop(&self) -> Result<(), ErrnoCode> {
        self.record("stop");
        let mut state = self.state.borrow_mut();
        match state.stop_error {
            Some(code) => Err(ErrnoCode::new(code)),
            None => {
                state.running = false;
                Ok(())
            }
        }
    }

    fn shutdown(&self, timeout: i32) -> bool {
        self.record("shutdown");
        let mut state = self.state.borrow_mut();
        state.shutdown_timeout = Some(timeout);
        let was_running = state.running;
        state.running = false;
        was_running
    }

    fn init_pid(&self) -> pid_t {
        self.record("init_pid");
        self.state.borrow().init_pid
    }

    fn load_config(&self, path: Option<&CStr>) -> Result<(), ErrnoCode> {
        self.record("load_config");
        self.state.borrow_mut().loaded_from =
            Some(path.map(|value| value.to_string_lossy().into_owned()));
        Ok(())
    }

    fn get_keys(&self, prefix: Option<&CStr>, buffer: Option<&mut [u8]>) -> i32 {
        self.record("get_keys");
        if let Some(length) = self.state.borrow().keys_length {
            return length;
        }
        let keys = self.keys(prefix);
        fill(&keys, buffer)
    }

    fn config_file_name(&self) -> Option<Vec<u8>> {
        self.record("config_file_name");
        self.state.borrow().config_file.clone()
    }

    fn clear_config(&self) {
        self.record("clear_config");
        self.state.borrow_mut().config.clear();
    }

    fn clear_config_item(&self, key: &CStr) -> Result<(), ErrnoCode> {
        self.record("clear_config_item");
        match self.state.borrow_mut().config.remove(key.to_bytes()) {
            Some(_) => Ok(()),
            None => Err(ErrnoCode::new(libc::ENOENT)),
        }
    }

    fn get_config_item(&self, key: &CStr, buffer: Option<&mut [u8]>) -> i32 {
        self.record("get_config_item");
        let state = self.state.borrow();
        match state.config.get(key.to_bytes()) {
            Some(value) => fill(value, buffer),
            None => -1,
        }
    }

    fn set_config_item(&self, key: &CStr, value: Option<&CStr>) -> Result<(), ErrnoCode> {
        self.record("set_config_item");
        if !key.to_bytes().starts_with(b"lxc.") {
            return Err(ErrnoCode::new(libc::EINVAL));
        }
        let value = value.map(|value| value.to_bytes().to_vec()).unwrap_or_default();
        self.state
            .borrow_mut()
            .config
            .insert(key.to_bytes().to_vec(), value);
        Ok(())
    }

    fn config_path(&self) -> Option<Vec<u8>> {
        self.record("config_path");
        self.state.borrow().config_path.clone()
    }

    fn set_config_path(&self, path: &CStr) -> bool {
        self.record("set_config_path");
        let mut state = self.state.borrow_mut();
        if state.reject_config_path {
            return false;
        }
        state.config_path = Some(path.to_bytes().to_vec());
        true
    }

    fn acquire(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.refuse_acquire {
            return false;
        }
        state.references += 1;
        true
    }

    fn release(&self) {
        self.state.borrow_mut().references -= 1;
    }
}

/// Library double with fixed listings.
#[derive(Debug, Default)]
pub struct FakeLibrary {
    pub listings: BTreeMap<&'static str, Vec<Vec<u8>>>,
    pub container: Option<Rc<FakeContainer>>,
}

impl ContainerLibrary for FakeLibrary {
    fn list(&self, kind: ListKind, _path: Option<&CStr>) -> Result<Vec<Vec<u8>>, ErrnoCode> {
        Ok(self.listings.get(kind.as_str()).cloned().unwrap_or_default())
    }

    fn open(&self, name: &CStr, _config_path: Option<&CStr>) -> Option<Rc<dyn Container>> {
        self.container
            .as_ref()
            .filter(|container| container.name == name.to_bytes())
            .map(|container| Rc::clone(container) as Rc<dyn Container>)
    }
}

/// Observations shared between a [`ScriptedSupervisor`] and its test.
#[derive(Debug, Default)]
pub struct SpawnLog {
    pub spawned: Cell<usize>,
    pub worker_result: Cell<Option<bool>>,
}

/// Supervisor that runs the worker inline instead of forking.
#[derive(Debug)]
pub struct ScriptedSupervisor {
    outcome: Result<i32, ErrnoCode>,
    log: Rc<SpawnLog>,
}

impl ScriptedSupervisor {
    pub fn new(outcome: Result<i32, ErrnoCode>) -> (Self, Rc<SpawnLog>) {
        let log = Rc::new(SpawnLog::default());
        (
            Self {
                outcome,
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl Supervisor for ScriptedSupervisor {
    fn spawn(&self, worker: &mut dyn FnMut() -> bool) -> Result<i32, ErrnoCode> {
        self.log.spawned.set(self.log.spawned.get() + 1);
        if self.outcome.is_ok() {
            self.log.worker_result.set(Some(worker()));
        }
        self.outcome
    }
}

/// A session wired to doubles, with output silenced into a scratch file.
pub struct Harness {
    pub container: Rc<FakeContainer>,
    pub spawns: Rc<SpawnLog>,
    pub session: Session,
    pub dispatcher: Dispatcher,
    _output: File,
}

impl Harness {
    /// Bound to a container named `web`; spawns succeed with pid 4242.
    pub fn bound() -> Self {
        Self::build(true, Ok(4242), FakeLibrary::default())
    }

    /// No container bound.
    pub fn unbound() -> Self {
        Self::build(false, Ok(4242), FakeLibrary::default())
    }

    pub fn with_spawn_outcome(outcome: Result<i32, ErrnoCode>) -> Self {
        Self::build(true, outcome, FakeLibrary::default())
    }

    pub fn with_library(library: FakeLibrary) -> Self {
        Self::build(false, Ok(4242), library)
    }

    fn build(bind: bool, outcome: Result<i32, ErrnoCode>, library: FakeLibrary) -> Self {
        let container = FakeContainer::named("web");
        let (supervisor, spawns) = ScriptedSupervisor::new(outcome);
        let output = tempfile::tempfile().expect("scratch output");
        let mut session = Session::new(Box::new(library), Box::new(supervisor))
            .with_output_fd(output.as_raw_fd());
        if bind {
            let handle: Rc<dyn Container> = Rc::clone(&container) as Rc<dyn Container>;
            session = session.with_handle(ContainerHandle::new(handle));
        }
        Self {
            container,
            spawns,
            session,
            dispatcher: Dispatcher::new(CommandTable::standard().expect("standard table")),
            _output: output,
        }
    }

    pub fn call(&mut self, id: u32, arguments: Vec<Term>) -> Reply {
        self.dispatcher.dispatch(&mut self.session, id, &arguments)
    }
}

pub fn bin(text: &str) -> Term {
    Term::binary(text)
}

pub fn empty() -> Term {
    Term::List(Vec::new())
}

pub fn int(value: i64) -> Term {
    Term::Integer(value)
}

pub fn strings_list(values: &[&str]) -> Term {
    Term::List(values.iter().map(|value| Term::binary(value)).collect())
}
