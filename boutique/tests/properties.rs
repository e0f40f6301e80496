//! End-to-end dispatch, batching and ordering behaviour

use boutique::testing::{CallLog, ListenerSpy, WarningRecorder};
use boutique::{
    generate_actions, store_methods, Actions, Dispatcher, DispatcherConfig, Error, HandlerResult,
    Listeners, ObjectShape, OrderingCycleError, State, Store, StoreCore, StoreShape, Warning,
};
use serde_json::{json, Value};

fn create_actions(dispatcher: &Dispatcher, names: &[&str]) -> Actions {
    dispatcher
        .create_actions(generate_actions(names).unwrap())
        .unwrap()
}

/// Store whose handlers only record their invocation
fn recording_store(name: &str, handlers: &[&str], log: &CallLog) -> ObjectShape {
    handlers.iter().fold(ObjectShape::new(name), |shape, handler| {
        let log = log.clone();
        let entry = handler.to_string();
        shape.method(*handler, move |_, _, payload| {
            if payload.is_null() {
                log.record(entry.clone());
            } else {
                log.record(format!("{entry}:{payload}"));
            }
            Ok(())
        })
    })
}

#[test]
fn test_bound_handler_runs_once_synchronously() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["ping"]);
    let log = CallLog::new();

    let ping = actions["ping"].clone();
    let _store = dispatcher
        .create_store(
            recording_store("Pinger", &["onX"], &log)
                .constructor(move |_, store| store.bind_action(&ping, Some("onX"))),
        )
        .unwrap();

    actions["ping"].dispatch(json!({ "n": 1 })).unwrap();
    // Ran before dispatch returned
    assert_eq!(log.entries(), [r#"onX:{"n":1}"#]);
}

#[test]
fn test_bind_actions_runs_action_then_success_handler() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["login"]);
    let log = CallLog::new();

    let bound = actions.clone();
    let _store = dispatcher
        .create_store(
            recording_store("Session", &["onLogin", "onLoginSuccess"], &log)
                .constructor(move |_, store| store.bind_actions(&bound)),
        )
        .unwrap();

    actions["login"].fire().unwrap();
    actions["login"].success().fire().unwrap();
    assert_eq!(log.entries(), ["onLogin", "onLoginSuccess"]);
}

#[test]
fn test_one_notification_with_ordered_merge_per_dispatch() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["update"]);

    let update = actions["update"].clone();
    let store = dispatcher
        .create_store(
            ObjectShape::new("Merge")
                .initial_state(json!({ "first": 5 }))
                .method("onUpdate", |_, store, _| {
                    store.set_state(json!({ "prop": 1 }));
                    store.set_state(json!({ "otherProp": 3 }));
                    Ok(())
                })
                .constructor(move |_, store| store.bind_action(&update, None)),
        )
        .unwrap();
    let spy = ListenerSpy::new();
    store.listen(spy.listener());

    actions["update"].fire().unwrap();

    assert!(spy.called_once());
    let expected = json!({ "first": 5, "prop": 1, "otherProp": 3 });
    assert_eq!(Value::Object(spy.last().unwrap()), expected);
    assert_eq!(Value::Object(store.state()), expected);
}

#[test]
fn test_later_keys_overwrite_earlier_ones() {
    let dispatcher = Dispatcher::new();
    let store = dispatcher
        .create_store(ObjectShape::new("Overwrite").initial_state(json!({ "a": 1, "b": 1 })))
        .unwrap();

    store.batch_changes(|| {
        store.set_state(json!({ "a": 2 }));
        store.set_state(json!({ "a": 3, "c": 1 }));
    });

    assert_eq!(
        Value::Object(store.state()),
        json!({ "a": 3, "b": 1, "c": 1 })
    );
}

#[test]
fn test_no_set_state_means_no_notification() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["noop"]);
    let log = CallLog::new();

    let noop = actions["noop"].clone();
    let store = dispatcher
        .create_store(
            recording_store("Idle", &["onNoop"], &log)
                .constructor(move |_, store| store.bind_action(&noop, None)),
        )
        .unwrap();
    let spy = ListenerSpy::new();
    store.listen(spy.listener());

    actions["noop"].fire().unwrap();
    assert_eq!(log.entries(), ["onNoop"]);
    assert!(spy.not_called());
}

#[test]
fn test_batch_changes_collapses_notifications() {
    let dispatcher = Dispatcher::new();
    let store = dispatcher.create_store(ObjectShape::new("Batch")).unwrap();
    let spy = ListenerSpy::new();
    store.listen(spy.listener());

    store.batch_changes(|| {
        for i in 0..5 {
            store.set_state(json!({ "i": i }));
        }
    });

    assert!(spy.called_once());
    assert_eq!(spy.last().unwrap()["i"], json!(4));
}

#[test]
fn test_several_handlers_on_one_store_notify_once() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["save"]);

    let bound = actions.clone();
    let store = dispatcher
        .create_store(
            ObjectShape::new("Split")
                .method("onA", |_, store, _| {
                    store.set_state(json!({ "a": 1 }));
                    Ok(())
                })
                .method("onB", |_, store, _| {
                    store.set_state(json!({ "b": 2 }));
                    Ok(())
                })
                .constructor(move |_, store| {
                    store.bind_listeners(
                        Listeners::new()
                            .on("onA", [&bound["save"]])
                            .on("onB", [&bound["save"]]),
                    )
                }),
        )
        .unwrap();
    let spy = ListenerSpy::new();
    store.listen(spy.listener());

    actions["save"].fire().unwrap();

    assert!(spy.called_once());
    assert_eq!(Value::Object(spy.last().unwrap()), json!({ "a": 1, "b": 2 }));
}

#[test]
fn test_nested_dispatch_flushes_with_the_outer_one() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["outer", "inner"]);

    let inner = actions["inner"].clone();
    let inner_store = dispatcher
        .create_store(
            ObjectShape::new("Inner")
                .method("onInner", |_, store, _| {
                    store.set_state(json!({ "touched": true }));
                    Ok(())
                })
                .constructor(move |_, store| store.bind_action(&inner, None)),
        )
        .unwrap();
    let inner_spy = ListenerSpy::new();
    inner_store.listen(inner_spy.listener());

    let inner = actions["inner"].clone();
    let outer = actions["outer"].clone();
    let counted = inner_spy.clone();
    let outer_store = dispatcher
        .create_store(
            ObjectShape::new("Outer")
                .method("onOuter", move |_, store, _| {
                    inner.fire()?;
                    store.set_state(json!({ "inner_notified": counted.call_count() }));
                    Ok(())
                })
                .constructor(move |_, store| store.bind_action(&outer, None)),
        )
        .unwrap();

    actions["outer"].fire().unwrap();

    assert_eq!(outer_store.get("inner_notified"), Some(json!(0)));
    assert_eq!(inner_spy.call_count(), 1);
    assert_eq!(inner_store.get("touched"), Some(json!(true)));
}

#[test]
fn test_stop_listening_stops_notifications() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["change"]);

    let change = actions["change"].clone();
    let store = dispatcher
        .create_store(
            ObjectShape::new("Listened")
                .method("onChange", |_, store, payload| {
                    store.set_state(json!({ "value": payload }));
                    Ok(())
                })
                .constructor(move |_, store| store.bind_action(&change, None)),
        )
        .unwrap();
    let spy = ListenerSpy::new();
    store.listen(spy.listener());

    actions["change"].dispatch(1).unwrap();
    store.stop_listening(&spy.listener());
    actions["change"].dispatch(2).unwrap();

    assert!(spy.called_once());
    assert_eq!(store.get("value"), Some(json!(2)));
}

#[test]
fn test_bind_listeners_follows_invocation_order() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["a", "b"]);
    let log = CallLog::new();

    let bound = actions.clone();
    let _store = dispatcher
        .create_store(
            recording_store("Multi", &["onSuccess", "onLogin"], &log).constructor(
                move |_, store| {
                    store.bind_listeners(
                        Listeners::new()
                            .on("onSuccess", [bound["a"].success(), bound["b"].success()])
                            .on("onLogin", [&bound["a"]]),
                    )
                },
            ),
        )
        .unwrap();

    actions["a"].success().fire().unwrap();
    actions["b"].success().fire().unwrap();
    actions["a"].fire().unwrap();

    assert_eq!(log.entries(), ["onSuccess", "onSuccess", "onLogin"]);
}

struct Follower {
    leader: Store<ObjectShape>,
    actions: Actions,
}

#[store_methods]
impl Follower {
    fn on_sync(&mut self, store: &StoreCore) -> HandlerResult {
        store.wait_for(&self.leader)?;
        store.set_state(json!({ "seen": self.leader.get("value") }));
        Ok(())
    }
}

impl StoreShape for Follower {
    fn construct(&mut self, store: &Store<Self>) -> boutique::Result<()> {
        store.bind_action(&self.actions["sync"], None)
    }
}

#[test]
fn test_wait_for_observes_updated_state() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["sync"]);

    let leader = dispatcher
        .create_store(ObjectShape::new("Leader").method("onSync", |_, store, payload| {
            store.set_state(json!({ "value": payload }));
            Ok(())
        }))
        .unwrap();

    // The follower binds first, so only wait_for puts the leader ahead of it
    let follower = dispatcher
        .create_store(Follower {
            leader: leader.clone(),
            actions: actions.clone(),
        })
        .unwrap();
    leader.bind_action(&actions["sync"], None).unwrap();

    for n in 1..=3 {
        actions["sync"].dispatch(n).unwrap();
        assert_eq!(follower.get("seen"), Some(json!(n)));
    }
}

#[test]
fn test_wait_for_on_handled_store_returns_immediately() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["sync"]);
    let leader_calls = CallLog::new();

    let log = leader_calls.clone();
    let leader = dispatcher
        .create_store(ObjectShape::new("Leader").method("onSync", move |_, store, payload| {
            log.record("leader");
            store.set_state(json!({ "value": payload }));
            Ok(())
        }))
        .unwrap();
    leader.bind_action(&actions["sync"], None).unwrap();

    let follower = dispatcher
        .create_store(Follower {
            leader: leader.clone(),
            actions: actions.clone(),
        })
        .unwrap();

    actions["sync"].dispatch("x").unwrap();
    assert_eq!(leader_calls.entries(), ["leader"]);
    assert_eq!(follower.get("seen"), Some(json!("x")));
}

#[test]
fn test_wait_for_unbound_store_is_a_no_op() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["sync"]);
    let bystander = dispatcher.create_store(ObjectShape::new("Bystander")).unwrap();

    let follower = dispatcher
        .create_store(Follower {
            leader: bystander,
            actions: actions.clone(),
        })
        .unwrap();

    actions["sync"].fire().unwrap();
    assert_eq!(follower.get("seen"), Some(Value::Null));
}

#[test]
fn test_wait_for_cycle_reports_chain() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["sync"]);
    let peer: std::rc::Rc<std::cell::RefCell<Option<Store<ObjectShape>>>> = Default::default();

    let slot = peer.clone();
    let first = dispatcher
        .create_store(ObjectShape::new("First").method("onSync", move |_, store, _| {
            match slot.borrow().as_ref() {
                Some(second) => store.wait_for(second),
                None => Ok(()),
            }
        }))
        .unwrap();
    first.bind_action(&actions["sync"], None).unwrap();

    let waits_on = first.clone();
    let second = dispatcher
        .create_store(ObjectShape::new("Second").method("onSync", move |_, store, _| {
            store.wait_for(&waits_on)
        }))
        .unwrap();
    second.bind_action(&actions["sync"], None).unwrap();
    *peer.borrow_mut() = Some(second.clone());

    let err = actions["sync"].fire().unwrap_err();
    assert!(matches!(
        err,
        Error::OrderingCycle(OrderingCycleError::Cycle { ref chain, .. })
            if chain == &["First", "Second", "First"]
    ));
    assert_eq!(
        err.to_string(),
        "circular wait_for while dispatching `sync`: First -> Second -> First"
    );
}

#[test]
fn test_wait_for_requires_the_caller_to_be_handling() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["other"]);
    let leader = dispatcher.create_store(ObjectShape::new("Leader")).unwrap();

    // Outside any dispatch
    let err = leader.wait_for(&leader).unwrap_err();
    assert!(matches!(
        err,
        Error::OrderingCycle(OrderingCycleError::OutsideDispatch { ref store }) if store == "Leader"
    ));

    // During a dispatch the leader is not part of
    let other = actions["other"].clone();
    let _watcher = dispatcher
        .create_store(
            ObjectShape::new("Watcher")
                .method("onOther", move |_, store, _| leader.wait_for(store))
                .constructor(move |_, store| store.bind_action(&other, None)),
        )
        .unwrap();

    let err = actions["other"].fire().unwrap_err();
    assert!(matches!(
        err,
        Error::OrderingCycle(OrderingCycleError::OutsideDispatch { ref store }) if store == "Leader"
    ));
}

#[test]
fn test_direct_call_of_bound_handler_warns_but_runs() {
    let dispatcher = Dispatcher::new();
    let warnings = WarningRecorder::install(&dispatcher);
    let actions = create_actions(&dispatcher, &["login"]);

    let login = actions["login"].clone();
    let store = dispatcher
        .create_store(
            ObjectShape::new("Session")
                .method("onLogin", |_, store, payload| {
                    store.set_state(json!({ "user": payload }));
                    Ok(())
                })
                .constructor(move |_, store| store.bind_action(&login, None)),
        )
        .unwrap();

    store.call("onLogin", "ada").unwrap();
    assert_eq!(store.get("user"), Some(json!("ada")));
    assert_eq!(
        warnings.warnings(),
        [Warning::DirectHandlerCall {
            store: "Session".into(),
            handler: "onLogin".into(),
        }]
    );
}

#[test]
fn test_config_from_json_silences_direct_call_warning() {
    let config = DispatcherConfig::from_json(r#"{ "warn_direct_handler_calls": false }"#).unwrap();
    let dispatcher = Dispatcher::with_config(config);
    let warnings = WarningRecorder::install(&dispatcher);
    let actions = create_actions(&dispatcher, &["login"]);

    let login = actions["login"].clone();
    let store = dispatcher
        .create_store(
            ObjectShape::new("Session")
                .method("onLogin", |_, _, _| Ok(()))
                .constructor(move |_, store| {
                    store.bind_action(&login, None)?;
                    store.bind_action(&login, Some("onMissing"))
                }),
        )
        .unwrap();
    store.call("onLogin", ()).unwrap();

    // Only the missing-handler warning got through
    assert_eq!(warnings.count(), 1);
    assert!(matches!(warnings.warnings()[0], Warning::MissingHandler { .. }));
}

#[test]
fn test_listeners_see_consistent_state_across_stores() {
    let dispatcher = Dispatcher::new();
    let actions = create_actions(&dispatcher, &["sync"]);
    let seen: std::rc::Rc<std::cell::RefCell<Vec<(Option<Value>, Option<Value>)>>> =
        Default::default();

    let make = |name: &str| {
        let sync = actions["sync"].clone();
        dispatcher
            .create_store(
                ObjectShape::new(name)
                    .method("onSync", |_, store, payload| {
                        store.set_state(json!({ "n": payload }));
                        Ok(())
                    })
                    .constructor(move |_, store| store.bind_action(&sync, None)),
            )
            .unwrap()
    };
    let a = make("A");
    let b = make("B");

    // When A notifies, B has already handled the same dispatch
    let (sink, peer) = (seen.clone(), b.clone());
    a.listen(boutique::listener(move |state: &State| {
        sink.borrow_mut()
            .push((state.get("n").cloned(), peer.get("n")));
    }));

    actions["sync"].dispatch(7).unwrap();
    assert_eq!(*seen.borrow(), [(Some(json!(7)), Some(json!(7)))]);
}
