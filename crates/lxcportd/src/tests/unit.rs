//! Handler and session unit tests driven through the dispatcher.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::rc::Rc;

use lxcport_config::ExitPolicy;
use mockall::mock;
use rstest::{fixture, rstest};

use crate::dispatch::{CommandTable, Dispatcher};
use crate::native::{Container, ContainerHandle, ContainerLibrary, ListKind};
use crate::reply::{ErrnoCode, Payload, Reply};
use crate::session::Session;
use crate::term::Term;

use super::support::{
    CreateRecord, FakeLibrary, Harness, ScriptedSupervisor, bin, empty, int, strings_list,
};

mock! {
    Library {}
    impl ContainerLibrary for Library {
        fn list<'a>(&self, kind: ListKind, path: Option<&'a CStr>) -> Result<Vec<Vec<u8>>, ErrnoCode>;
        fn open<'a>(&self, name: &CStr, config_path: Option<&'a CStr>) -> Option<Rc<dyn Container>>;
    }
}

#[fixture]
fn bound() -> Harness {
    Harness::bound()
}

fn create_args(template: Term, flags: Term, argv: Term) -> Vec<Term> {
    vec![template, bin(""), bin("ignored"), flags, argv]
}

#[rstest]
#[case::name(4, vec![])]
#[case::defined(5, vec![])]
#[case::running(6, vec![])]
#[case::create(7, create_args(bin("busybox"), int(0), empty()))]
#[case::destroy(8, vec![])]
#[case::start(9, vec![int(0), empty()])]
#[case::stop(10, vec![])]
#[case::shutdown(11, vec![int(5)])]
#[case::init_pid(12, vec![])]
#[case::load_config(13, vec![empty()])]
#[case::get_keys(14, vec![empty()])]
#[case::config_file_name(15, vec![])]
#[case::clear_config(16, vec![])]
#[case::clear_config_item(17, vec![bin("lxc.arch")])]
#[case::get_config_item(18, vec![bin("lxc.arch")])]
#[case::set_config_item(19, vec![bin("lxc.arch"), bin("x86_64")])]
#[case::get_config_path(20, vec![])]
#[case::set_config_path(21, vec![bin("/srv/lxc")])]
fn container_commands_need_a_handle(#[case] id: u32, #[case] arguments: Vec<Term>) {
    let mut harness = Harness::unbound();
    assert_eq!(harness.call(id, arguments), Reply::invalid());
    assert_eq!(harness.spawns.spawned.get(), 0);
}

#[rstest]
#[case::past_table(22)]
#[case::far_away(u32::MAX)]
fn unknown_commands_are_invalid(mut bound: Harness, #[case] id: u32) {
    assert_eq!(bound.call(id, vec![]), Reply::invalid());
}

#[rstest]
#[case::missing(11, vec![])]
#[case::extra(6, vec![int(1)])]
#[case::create_short(7, vec![bin("busybox")])]
fn arity_mismatch_is_badarg_before_the_handler(
    mut bound: Harness,
    #[case] id: u32,
    #[case] arguments: Vec<Term>,
) {
    assert_eq!(bound.call(id, arguments), Reply::badarg());
    assert!(bound.container.calls().is_empty());
}

#[rstest]
fn listing_needs_no_handle() {
    let mut listings = BTreeMap::new();
    listings.insert("all", vec![b"web".to_vec(), b"db".to_vec()]);
    let mut harness = Harness::with_library(FakeLibrary {
        listings,
        container: None,
    });
    assert_eq!(
        harness.call(1, vec![empty()]),
        Reply::ok_value(Payload::Binaries(vec![b"web".to_vec(), b"db".to_vec()]))
    );
    assert_eq!(
        harness.call(0, vec![empty()]),
        Reply::ok_value(Payload::Binaries(Vec::new()))
    );
}

#[rstest]
fn listing_forwards_the_root_path() {
    let mut library = MockLibrary::new();
    library
        .expect_list()
        .withf(|kind, path| {
            *kind == ListKind::Defined && path.map(CStr::to_bytes) == Some(b"/srv/lxc".as_slice())
        })
        .times(1)
        .returning(|_, _| Err(ErrnoCode::new(libc::ENOENT)));
    let (supervisor, _log) = ScriptedSupervisor::new(Ok(1));
    let mut session = Session::new(Box::new(library), Box::new(supervisor));
    let dispatcher = Dispatcher::new(CommandTable::standard().expect("table"));

    let reply = dispatcher.dispatch(&mut session, 2, &[bin("/srv/lxc")]);
    assert_eq!(reply, Reply::errno(ErrnoCode::new(libc::ENOENT)));
}

#[rstest]
fn listing_rejects_non_string_paths() {
    let mut library = MockLibrary::new();
    library.expect_list().never();
    let (supervisor, _log) = ScriptedSupervisor::new(Ok(1));
    let mut session = Session::new(Box::new(library), Box::new(supervisor));
    let dispatcher = Dispatcher::new(CommandTable::standard().expect("table"));

    assert_eq!(
        dispatcher.dispatch(&mut session, 0, &[Term::atom("default")]),
        Reply::badarg()
    );
}

#[rstest]
#[case::strings(strings_list(&["-n", "web"]), Reply::ok())]
#[case::empty(empty(), Reply::ok())]
#[case::atom_element(Term::List(vec![bin("-n"), Term::atom("web")]), Reply::badarg())]
#[case::not_a_list(bin("-n"), Reply::badarg())]
fn argv_validates_vectors(#[case] argument: Term, #[case] expected: Reply) {
    let mut harness = Harness::unbound();
    assert_eq!(harness.call(3, vec![argument]), expected);
}

#[rstest]
fn accessors_report_container_state(mut bound: Harness) {
    bound.container.state.borrow_mut().defined = true;
    bound.container.state.borrow_mut().init_pid = 321;

    assert_eq!(bound.call(4, vec![]), Reply::binary(Some(b"web".to_vec())));
    assert_eq!(bound.call(5, vec![]), Reply::boolean(true));
    assert_eq!(bound.call(6, vec![]), Reply::boolean(false));
    assert_eq!(bound.call(12, vec![]), Reply::ok_value(Payload::Integer(321)));
    assert_eq!(
        bound.call(20, vec![]),
        Reply::binary(Some(b"/var/lib/lxc".to_vec()))
    );
}

#[rstest]
fn absent_config_file_is_an_empty_binary(mut bound: Harness) {
    assert_eq!(bound.call(15, vec![]), Reply::Binary(Vec::new()));
}

#[rstest]
fn create_forwards_marshalled_arguments(mut bound: Harness) {
    let reply = bound.call(
        7,
        create_args(bin("download"), int(1), strings_list(&["-d", "alpine"])),
    );

    assert_eq!(reply, Reply::boolean(true));
    assert_eq!(
        bound.container.state.borrow().created,
        Some(CreateRecord {
            template: String::from("download"),
            bdev_type: None,
            flags: 1,
            argv: Some(vec![String::from("-d"), String::from("alpine")]),
        })
    );
}

#[rstest]
fn create_passes_no_vector_for_an_empty_list(mut bound: Harness) {
    let mut arguments = create_args(bin("busybox"), int(0), empty());
    arguments[1] = bin("dir");
    assert_eq!(bound.call(7, arguments), Reply::boolean(true));

    let created = bound.container.state.borrow().created.clone().expect("created");
    assert_eq!(created.bdev_type.as_deref(), Some("dir"));
    assert_eq!(created.argv, None);
}

#[rstest]
#[case::empty_template(create_args(bin(""), int(0), empty()))]
#[case::atom_template(create_args(Term::atom("busybox"), int(0), empty()))]
#[case::atom_backing_store(vec![
    bin("busybox"),
    Term::atom("undefined"),
    bin(""),
    int(0),
    empty(),
])]
#[case::flags_not_integer(create_args(bin("busybox"), bin("0"), empty()))]
#[case::flags_too_large(create_args(bin("busybox"), int(1 << 40), empty()))]
#[case::bad_argv(create_args(bin("busybox"), int(0), Term::List(vec![int(-1)])))]
#[case::bad_argv_after_valid_elements(create_args(
    bin("busybox"),
    int(0),
    Term::List(vec![bin("-d"), bin("alpine"), Term::atom("release")]),
))]
fn create_rejects_malformed_arguments(mut bound: Harness, #[case] arguments: Vec<Term>) {
    assert_eq!(bound.call(7, arguments), Reply::badarg());
    assert!(!bound.container.calls().contains(&"create"));
}

#[rstest]
fn create_is_not_attempted_when_output_cannot_be_silenced() {
    let mut harness = Harness::bound();
    let container = Rc::clone(&harness.container);
    let (supervisor, _log) = ScriptedSupervisor::new(Ok(1));
    let handle: Rc<dyn Container> = container;
    harness.session = Session::new(Box::new(FakeLibrary::default()), Box::new(supervisor))
        .with_output_fd(-1)
        .with_handle(ContainerHandle::new(handle));

    let reply = harness.call(7, create_args(bin("busybox"), int(0), empty()));
    assert_eq!(reply, Reply::boolean(false));
    assert!(!harness.container.calls().contains(&"create"));
}

#[rstest]
fn start_keeps_a_reference_for_the_child(mut bound: Harness) {
    let reply = bound.call(9, vec![int(1), strings_list(&["/sbin/init"])]);

    assert_eq!(reply, Reply::ok_value(Payload::Integer(4242)));
    assert_eq!(bound.container.references(), 2);
    assert_eq!(bound.session.supervised().len(), 1);
    assert_eq!(bound.session.supervised()[0].pid(), 4242);
    assert_eq!(bound.spawns.worker_result.get(), Some(true));
    assert_eq!(
        bound.container.state.borrow().started,
        Some((1, Some(vec![String::from("/sbin/init")])))
    );
}

#[rstest]
fn start_failure_releases_the_extra_reference() {
    let mut harness = Harness::with_spawn_outcome(Err(ErrnoCode::new(libc::EAGAIN)));

    let reply = harness.call(9, vec![int(0), empty()]);

    assert_eq!(reply, Reply::errno(ErrnoCode::new(libc::EAGAIN)));
    assert_eq!(harness.container.references(), 1);
    assert!(harness.session.supervised().is_empty());
    assert_eq!(harness.spawns.spawned.get(), 1);
}

#[rstest]
fn start_refused_reference_is_badarg(mut bound: Harness) {
    bound.container.state.borrow_mut().refuse_acquire = true;

    assert_eq!(bound.call(9, vec![int(0), empty()]), Reply::badarg());
    assert_eq!(bound.spawns.spawned.get(), 0);
    assert_eq!(bound.container.references(), 1);
}

#[rstest]
fn start_with_bad_argv_never_spawns(mut bound: Harness) {
    let reply = bound.call(9, vec![int(0), Term::List(vec![Term::atom("init")])]);
    assert_eq!(reply, Reply::badarg());
    assert_eq!(bound.spawns.spawned.get(), 0);
    assert_eq!(bound.container.references(), 1);
}

#[rstest]
fn stop_releases_the_reference_held_for_a_child(mut bound: Harness) {
    bound.call(9, vec![int(0), empty()]);
    assert_eq!(bound.container.references(), 2);

    assert_eq!(bound.call(10, vec![]), Reply::ok());
    assert_eq!(bound.container.references(), 1);
    assert!(bound.session.supervised().is_empty());
}

#[rstest]
fn stop_without_children_keeps_the_session_reference(mut bound: Harness) {
    assert_eq!(bound.call(10, vec![]), Reply::ok());
    assert_eq!(bound.container.references(), 1);
}

#[rstest]
fn stop_failure_reports_errno_and_still_releases(mut bound: Harness) {
    bound.call(9, vec![int(0), empty()]);
    bound.container.state.borrow_mut().stop_error = Some(libc::EPERM);

    assert_eq!(bound.call(10, vec![]), Reply::errno(ErrnoCode::new(libc::EPERM)));
    assert_eq!(bound.container.references(), 1);
}

#[rstest]
fn stop_with_unnamed_code_is_unknown(mut bound: Harness) {
    bound.container.state.borrow_mut().stop_error = Some(0);
    let reply = bound.call(10, vec![]);
    assert_eq!(Term::from(reply).to_string(), "{error,{unknown,0}}");
}

#[rstest]
#[case::negative(-1, Reply::badarg(), None)]
#[case::zero(0, Reply::boolean(false), Some(0))]
#[case::positive(30, Reply::boolean(false), Some(30))]
fn shutdown_forwards_only_non_negative_timeouts(
    mut bound: Harness,
    #[case] timeout: i64,
    #[case] expected: Reply,
    #[case] forwarded: Option<i32>,
) {
    assert_eq!(bound.call(11, vec![int(timeout)]), expected);
    assert_eq!(bound.container.state.borrow().shutdown_timeout, forwarded);
}

#[rstest]
fn load_config_treats_empty_path_as_default(mut bound: Harness) {
    assert_eq!(bound.call(13, vec![empty()]), Reply::ok());
    assert_eq!(bound.container.state.borrow().loaded_from, Some(None));

    assert_eq!(bound.call(13, vec![bin("/tmp/web.conf")]), Reply::ok());
    assert_eq!(
        bound.container.state.borrow().loaded_from,
        Some(Some(String::from("/tmp/web.conf")))
    );
}

fn with_items(harness: &Harness, items: &[(&str, &str)]) {
    let mut state = harness.container.state.borrow_mut();
    for (key, value) in items {
        state
            .config
            .insert(key.as_bytes().to_vec(), value.as_bytes().to_vec());
    }
}

#[rstest]
fn get_keys_without_prefix_sizes_first(mut bound: Harness) {
    with_items(&bound, &[("lxc.arch", "x86_64"), ("lxc.utsname", "web")]);

    assert_eq!(
        bound.call(14, vec![empty()]),
        Reply::ok_value(Payload::Binary(b"lxc.arch\nlxc.utsname".to_vec()))
    );
}

#[rstest]
fn get_keys_with_prefix_uses_the_fixed_buffer(mut bound: Harness) {
    with_items(&bound, &[("lxc.net.0.type", "veth"), ("lxc.utsname", "web")]);

    assert_eq!(
        bound.call(14, vec![bin("lxc.net")]),
        Reply::ok_value(Payload::Binary(b"lxc.net.0.type".to_vec()))
    );
    assert_eq!(
        bound.container.calls().iter().filter(|call| **call == "get_keys").count(),
        1
    );
}

#[rstest]
#[case::at_limit(2048)]
#[case::negative(-1)]
fn get_keys_rejects_unbufferable_sizes(mut bound: Harness, #[case] length: i32) {
    bound.container.state.borrow_mut().keys_length = Some(length);
    assert_eq!(bound.call(14, vec![empty()]), Reply::badarg());
}

#[rstest]
fn get_keys_accepts_the_largest_bufferable_listing(mut bound: Harness) {
    let key = format!("lxc.{}", "a".repeat(2043));
    with_items(&bound, &[(key.as_str(), "1")]);

    let reply = bound.call(14, vec![empty()]);
    assert_eq!(key.len(), 2047);
    assert_eq!(reply, Reply::ok_value(Payload::Binary(key.into_bytes())));
}

#[rstest]
fn get_keys_with_nothing_to_list_is_none(mut bound: Harness) {
    assert_eq!(bound.call(14, vec![empty()]), Reply::none());
}

#[rstest]
fn config_items_round_trip(mut bound: Harness) {
    assert_eq!(
        bound.call(19, vec![bin("lxc.utsname"), bin("web01")]),
        Reply::ok()
    );
    assert_eq!(
        bound.call(18, vec![bin("lxc.utsname")]),
        Reply::ok_value(Payload::Binary(b"web01".to_vec()))
    );
    assert_eq!(bound.call(17, vec![bin("lxc.utsname")]), Reply::ok());
    assert_eq!(bound.call(18, vec![bin("lxc.utsname")]), Reply::none());
}

#[rstest]
fn empty_config_values_read_back_as_none(mut bound: Harness) {
    assert_eq!(bound.call(19, vec![bin("lxc.hook"), empty()]), Reply::ok());
    assert_eq!(bound.call(18, vec![bin("lxc.hook")]), Reply::none());
}

#[rstest]
fn config_item_errors_carry_errno(mut bound: Harness) {
    assert_eq!(
        bound.call(19, vec![bin("bogus"), bin("1")]),
        Reply::errno(ErrnoCode::new(libc::EINVAL))
    );
    assert_eq!(
        bound.call(17, vec![bin("lxc.missing")]),
        Reply::errno(ErrnoCode::new(libc::ENOENT))
    );
}

#[rstest]
#[case::get(18)]
#[case::clear(17)]
fn config_keys_are_required(mut bound: Harness, #[case] id: u32) {
    assert_eq!(bound.call(id, vec![empty()]), Reply::badarg());
}

#[rstest]
fn clear_config_drops_everything(mut bound: Harness) {
    with_items(&bound, &[("lxc.arch", "x86_64")]);
    assert_eq!(bound.call(16, vec![]), Reply::ok());
    assert!(bound.container.state.borrow().config.is_empty());
}

#[rstest]
fn set_config_path_failure_is_badarg(mut bound: Harness) {
    assert_eq!(bound.call(21, vec![bin("/srv/lxc")]), Reply::ok());
    assert_eq!(
        bound.call(20, vec![]),
        Reply::binary(Some(b"/srv/lxc".to_vec()))
    );

    bound.container.state.borrow_mut().reject_config_path = true;
    assert_eq!(bound.call(21, vec![bin("/elsewhere")]), Reply::badarg());
}

#[rstest]
fn destroy_reports_whether_anything_was_removed(mut bound: Harness) {
    assert_eq!(bound.call(8, vec![]), Reply::boolean(false));
    bound.container.state.borrow_mut().defined = true;
    assert_eq!(bound.call(8, vec![]), Reply::boolean(true));
}

#[rstest]
fn finishing_with_destroy_stops_and_destroys() {
    let harness = Harness::bound();
    {
        let mut state = harness.container.state.borrow_mut();
        state.running = true;
        state.defined = true;
    }
    let container = Rc::clone(&harness.container);

    harness.session.finish(ExitPolicy::Destroy);

    assert_eq!(container.calls(), vec!["is_running", "stop", "destroy"]);
    assert_eq!(container.references(), 0);
}

#[rstest]
fn finishing_with_keep_only_releases() {
    let mut harness = Harness::bound();
    harness.call(9, vec![int(0), empty()]);
    let container = Rc::clone(&harness.container);
    let before = container.calls().len();

    harness.session.finish(ExitPolicy::Keep);

    assert_eq!(container.calls().len(), before);
    assert_eq!(container.references(), 0);
}
