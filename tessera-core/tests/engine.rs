//! Integration Tests: dispatch, interception, modes and the tick loop.

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use support::{
    BlackHole, Colorful, Counter, Echo, Faulty, First, Reaper, Second, Shy, Spawner, Visible,
    assert_saw, drain, heard, player, zone,
};
use tessera_core::event::fields;
use tessera_core::mode::Command;
use tessera_core::pipeline::dispatch;
use tessera_core::{Component, EntityId, Fields, ModeState, TesseraError};

// ---------------------------------------------------------------------------
// Resolution through the explore mode
// ---------------------------------------------------------------------------

#[test]
fn text_command_runs_matched_action() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![Box::new(Visible)]);
    let lamp = zone.spawn().expect("spawn");

    zone.perform(alice, format!("look at {lamp}"));
    assert_eq!(heard(&handle, alice), vec![format!("You see #{lamp}.")]);
}

#[test]
fn unknown_command_gets_configured_reply() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![]);

    zone.perform(alice, "juggle");
    assert_eq!(heard(&handle, alice), vec!["What?".to_string()]);
    assert_eq!(handle.counters.snapshot().resolution_misses, 1);
}

#[test]
fn entity_without_mode_cannot_act() {
    let (mut zone, handle) = zone();
    let mute = zone.spawn_with(vec![Box::new(Visible)]).expect("spawn");
    zone.set_hearing(mute, true).expect("hearing");

    zone.perform(mute, "look 1");
    assert!(drain(&handle).is_empty());
    assert_eq!(handle.counters.snapshot().commands_dispatched, 0);
}

#[test]
fn programmatic_invocation_skips_resolution() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![]);
    let vase = zone.spawn_with(vec![Box::new(Colorful::new("red"))]).expect("spawn");

    zone.perform(
        alice,
        Command::invoke(
            "Colorful.paint",
            fields([("descriptor", vase.to_string()), ("color", "green".to_string())]),
        ),
    );
    assert_eq!(zone.component::<Colorful>(vase).map(|c| c.color.as_str()), Some("green"));
    assert_saw(&heard(&handle, alice), "is now green");
}

#[test]
fn dispatch_of_unknown_action_is_an_error() {
    let (mut zone, _handle) = zone();
    let alice = player(&mut zone, vec![]);
    let result = dispatch(&mut zone, alice, "Nobody.nothing", Fields::new());
    assert!(matches!(result, Err(TesseraError::UnknownAction(_))));
}

#[test]
fn prepare_halt_skips_hooks_and_run() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![Box::new(Faulty)]);

    let outcome = dispatch(
        &mut zone,
        alice,
        "Visible.look_at",
        fields([("descriptor", "999")]),
    )
    .expect("dispatch");
    assert!(outcome.halted);
    assert!(!outcome.faulted, "halted before the faulty interceptor");
    assert_eq!(heard(&handle, alice), vec!["No such entity \"999\".".to_string()]);
}

// ---------------------------------------------------------------------------
// Interception
// ---------------------------------------------------------------------------

#[test]
fn interceptor_vetoes_default_behavior() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![]);
    let hole = zone.spawn_with(vec![Box::new(BlackHole)]).expect("spawn");

    let outcome = dispatch(
        &mut zone,
        alice,
        "Visible.look_at",
        fields([("descriptor", hole.to_string())]),
    )
    .expect("dispatch");

    assert!(outcome.vetoed());
    let messages = heard(&handle, alice);
    assert_eq!(
        messages,
        vec![format!("You're unable to look directly at #{hole}.")]
    );
    assert_eq!(handle.counters.snapshot().actions_vetoed, 1);
}

#[test]
fn interceptor_rewrites_event_fields() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![]);
    let hole = zone
        .spawn_with(vec![Box::new(Colorful::new("white")), Box::new(BlackHole)])
        .expect("spawn");

    zone.perform(alice, format!("paint {hole} pink"));
    assert_eq!(zone.component::<Colorful>(hole).map(|c| c.color.as_str()), Some("black"));
    assert_saw(&heard(&handle, alice), "is now black");
}

#[test]
fn veto_is_visible_to_later_interceptors_and_run() {
    let (mut zone, _handle) = zone();
    let alice = player(&mut zone, vec![]);
    // Lower id witnesses first: the black hole vetoes before the watcher runs.
    let hole = zone.spawn_with(vec![Box::new(BlackHole)]).expect("spawn");
    let _watcher = zone.spawn_with(vec![Box::new(Second)]).expect("spawn");

    let outcome = dispatch(
        &mut zone,
        alice,
        "Visible.look_at",
        fields([("descriptor", hole.to_string())]),
    )
    .expect("dispatch");
    assert!(outcome.event.prevented());
    assert!(outcome.event.text("trail").is_some(), "later interceptors still run");
    assert!(outcome.event.flag("saw_prevented"));
}

#[test]
fn witness_order_then_attachment_then_declaration() {
    let (mut zone, _handle) = zone();
    let a = zone.spawn_with(vec![Box::new(First)]).expect("spawn a");
    let b = zone.spawn_with(vec![Box::new(Second)]).expect("spawn b");
    // Attachment order on c is Second, then First.
    let c = zone
        .spawn_with(vec![Box::new(Second), Box::new(First)])
        .expect("spawn c");
    let actor = player(&mut zone, vec![]);

    let outcome = dispatch(
        &mut zone,
        actor,
        "Visible.look_at",
        fields([("descriptor", a.to_string())]),
    )
    .expect("dispatch");

    assert_eq!(
        outcome.event.text("trail"),
        Some(
            format!(
                "First.a@{a},First.b@{a},Second@{b},Second@{c},First.a@{c},First.b@{c}"
            )
            .as_str()
        )
    );
}

#[test]
fn witnesses_default_to_actor() {
    use tessera_core::registry::{ActionDef, ComponentKind, Registry, from_record};

    #[derive(Debug, serde::Deserialize)]
    struct Waver;
    impl Component for Waver {
        fn kind(&self) -> &'static str {
            "Waver"
        }
    }
    fn mark(
        _: &mut tessera_core::Zone,
        owner: EntityId,
        e: &mut tessera_core::Event,
    ) -> anyhow::Result<()> {
        e.set("seen_by", owner);
        Ok(())
    }

    let registry = Registry::builder()
        .component(
            ComponentKind::new("Waver", from_record::<Waver>)
                .action(ActionDef::new("wave", "^wave$"))
                .before("Waver.wave", mark),
        )
        .and_then(tessera_core::RegistryBuilder::build)
        .expect("build");
    let (mut zone, _handle) = tessera_core::Zone::new(Arc::new(registry), Default::default());
    let bystander = zone.spawn_with(vec![Box::new(Waver)]).expect("spawn");
    let actor = zone.spawn_with(vec![Box::new(Waver)]).expect("spawn");

    let outcome = dispatch(&mut zone, actor, "Waver.wave", Default::default()).expect("dispatch");
    assert_eq!(outcome.event.entity("seen_by"), Some(actor));
    assert_ne!(outcome.event.entity("seen_by"), Some(bystander));
}

#[test]
fn failing_interceptor_abandons_hook_point_but_run_continues() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![]);
    let target = zone.spawn().expect("spawn");
    let _faulty = zone.spawn_with(vec![Box::new(Faulty)]).expect("spawn");
    let _later = zone.spawn_with(vec![Box::new(Second)]).expect("spawn");

    let outcome = dispatch(
        &mut zone,
        alice,
        "Visible.look_at",
        fields([("descriptor", target.to_string())]),
    )
    .expect("dispatch");

    assert!(outcome.faulted);
    assert!(outcome.event.text("trail").is_none(), "rest of the hook point skipped");
    assert_eq!(heard(&handle, alice), vec![format!("You see #{target}.")]);
    assert_eq!(handle.counters.snapshot().interceptor_faults, 1);
}

#[test]
fn component_detached_mid_point_is_skipped() {
    let (mut zone, _handle) = zone();
    let alice = player(&mut zone, vec![]);
    let shy = zone
        .spawn_with(vec![Box::new(Shy), Box::new(Second)])
        .expect("spawn");

    let outcome = dispatch(
        &mut zone,
        alice,
        "Visible.look_at",
        fields([("descriptor", shy.to_string())]),
    )
    .expect("dispatch");

    assert!(!outcome.faulted);
    assert!(outcome.event.text("trail").is_none());
    assert!(!zone.has(shy, &["Second"]));
}

#[test]
fn interceptors_may_dispatch_reentrantly() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![]);
    let parrot = zone
        .spawn_with(vec![Box::new(Colorful::new("teal")), Box::new(Echo)])
        .expect("spawn");
    zone.set_hearing(parrot, true).expect("hearing");

    let outcome = dispatch(
        &mut zone,
        alice,
        "Visible.look_at",
        fields([("descriptor", parrot.to_string())]),
    )
    .expect("dispatch");

    assert!(outcome.event.flag("echoed"));
    let messages = drain(&handle);
    let parrot_pos = messages
        .iter()
        .position(|(e, m)| *e == parrot && m.contains("is teal"))
        .expect("parrot heard its color");
    let alice_pos = messages
        .iter()
        .position(|(e, m)| *e == alice && m.contains("You see"))
        .expect("alice saw the parrot");
    assert!(parrot_pos < alice_pos, "nested dispatch completes first");
}

// ---------------------------------------------------------------------------
// Store and index invariants
// ---------------------------------------------------------------------------

#[test]
fn attach_then_detach_clears_index() {
    let (mut zone, _handle) = zone();
    let e = zone.spawn().expect("spawn");

    zone.attach(e, Box::new(Colorful::new("red"))).expect("attach");
    assert!(zone.has(e, &["Colorful"]));
    assert_eq!(zone.with_kind("Colorful"), vec![e]);

    let detached = zone.detach(e, "Colorful").expect("detach");
    assert_eq!(detached.kind(), "Colorful");
    assert!(!zone.has(e, &["Colorful"]));
    assert!(zone.with_kind("Colorful").is_empty());
}

#[test]
fn one_instance_per_kind() {
    let (mut zone, _handle) = zone();
    let e = zone.spawn_with(vec![Box::new(Visible)]).expect("spawn");
    assert!(matches!(
        zone.attach(e, Box::new(Visible)),
        Err(TesseraError::AlreadyAttached { .. })
    ));
    assert!(matches!(
        zone.detach(e, "Colorful"),
        Err(TesseraError::NotAttached { .. })
    ));
}

#[test]
fn unregistered_kind_cannot_attach() {
    #[derive(Debug)]
    struct Stray;
    impl Component for Stray {
        fn kind(&self) -> &'static str {
            "Stray"
        }
    }

    let (mut zone, _handle) = zone();
    let e = zone.spawn().expect("spawn");
    assert!(matches!(
        zone.attach(e, Box::new(Stray)),
        Err(TesseraError::UnknownKind(name)) if name == "Stray"
    ));
    assert!(matches!(
        zone.spawn_with(vec![Box::new(Visible), Box::new(Stray)]),
        Err(TesseraError::UnknownKind(_))
    ));
    assert_eq!(zone.len(), 1, "failed spawn leaves nothing behind");
}

#[test]
fn destroy_clears_every_index() {
    let (mut zone, _handle) = zone();
    let e = zone
        .spawn_with(vec![Box::new(Visible), Box::new(Counter::default())])
        .expect("spawn");
    assert!(zone.is_ticking(e));

    zone.destroy(e).expect("destroy");
    assert!(zone.get(e).is_none());
    assert!(zone.with_kind("Visible").is_empty());
    assert!(zone.with_kind("Counter").is_empty());
    assert!(!zone.is_ticking(e));
    assert!(matches!(zone.destroy(e), Err(TesseraError::EntityNotFound(_))));
}

#[test]
fn unknown_mode_is_rejected() {
    #[derive(Debug)]
    struct Dreaming;
    impl ModeState for Dreaming {
        fn kind(&self) -> &'static str {
            "Dreaming"
        }
    }

    let (mut zone, _handle) = zone();
    let e = zone.spawn().expect("spawn");
    assert!(matches!(
        zone.set_mode(e, Some(Box::new(Dreaming))),
        Err(TesseraError::UnknownMode(_))
    ));
    assert!(matches!(
        zone.enter_mode(e, "Dreaming"),
        Err(TesseraError::UnknownMode(_))
    ));
    assert!(zone.get(e).is_some_and(|entity| entity.mode().is_none()));
}

#[test]
fn enter_mode_uses_initial_state() {
    let (mut zone, _handle) = zone();
    let e = zone.spawn().expect("spawn");
    zone.enter_mode(e, "Explore").expect("enter");
    assert_eq!(zone.get(e).and_then(|entity| entity.mode_kind()), Some("Explore"));
}

// ---------------------------------------------------------------------------
// Ticking
// ---------------------------------------------------------------------------

#[test]
fn tick_set_follows_ticking_components() {
    let (mut zone, _handle) = zone();
    let idle = zone.spawn_with(vec![Box::new(Visible)]).expect("spawn");
    let busy = zone.spawn_with(vec![Box::new(Counter::default())]).expect("spawn");
    assert_eq!(zone.ticking(), vec![busy]);

    zone.tick();
    assert_eq!(zone.component::<Counter>(busy).map(|c| c.ticks), Some(1));

    zone.attach(idle, Box::new(Counter::default())).expect("attach");
    zone.tick();
    assert_eq!(zone.component::<Counter>(idle).map(|c| c.ticks), Some(1));

    let before = zone.detach(busy, "Counter").expect("detach");
    assert!(!zone.is_ticking(busy));
    zone.tick();
    let before = before.downcast_ref::<Counter>().map(|c| c.ticks);
    assert_eq!(before, Some(2), "detached counter is no longer visited");
    assert_eq!(zone.component::<Counter>(idle).map(|c| c.ticks), Some(2));
}

#[test]
fn entities_spawned_during_tick_wait_for_next_step() {
    let (mut zone, _handle) = zone();
    zone.spawn_with(vec![Box::new(Spawner)]).expect("spawn");

    zone.tick();
    let spawned = zone.with_kind("Counter");
    assert_eq!(spawned.len(), 1);
    assert_eq!(zone.component::<Counter>(spawned[0]).map(|c| c.ticks), Some(0));

    zone.tick();
    assert_eq!(zone.component::<Counter>(spawned[0]).map(|c| c.ticks), Some(1));
    assert_eq!(zone.with_kind("Counter").len(), 2);
}

#[test]
fn entities_destroyed_during_tick_are_skipped() {
    let (mut zone, _handle) = zone();
    let reaper = zone.spawn_with(vec![Box::new(Reaper)]).expect("spawn");
    let victim = zone.spawn_with(vec![Box::new(Counter::default())]).expect("spawn");
    assert!(reaper < victim);

    zone.tick();
    assert!(zone.get(victim).is_none());
    assert_eq!(zone.ticking(), vec![reaper]);
    assert_eq!(zone.counters().snapshot().tick_faults, 0);
}

// ---------------------------------------------------------------------------
// Messaging and the zone loop
// ---------------------------------------------------------------------------

#[test]
fn tell_respects_hearing() {
    let (mut zone, handle) = zone();
    let deaf = zone.spawn().expect("spawn");
    let listener = zone.spawn().expect("spawn");
    zone.set_hearing(listener, true).expect("hearing");

    zone.tell(deaf, "psst");
    zone.tell(listener, "hello");
    zone.tell(EntityId(999), "anyone?");

    assert_eq!(drain(&handle), vec![(listener, "hello".to_string())]);
    let counters = handle.counters.snapshot();
    assert_eq!(counters.messages_sent, 1);
    assert_eq!(counters.messages_dropped, 2);
}

#[test]
fn inbound_commands_preserve_arrival_order() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![Box::new(Visible)]);
    let a = zone.spawn().expect("spawn");
    let b = zone.spawn().expect("spawn");

    handle.inbound.push(alice, format!("look {a}"));
    handle.inbound.push(alice, "dance");
    handle.inbound.push(alice, format!("look {b}"));
    assert_eq!(zone.drain_inbound(), 3);

    assert_eq!(
        heard(&handle, alice),
        vec![format!("You see #{a}."), "What?".to_string(), format!("You see #{b}.")]
    );
}

#[test]
fn step_drains_then_ticks() {
    let (mut zone, handle) = zone();
    let counter = zone.spawn_with(vec![Box::new(Counter::default())]).expect("spawn");
    let alice = player(&mut zone, vec![]);
    handle.inbound.push(alice, "hm");

    zone.step();
    assert!(handle.inbound.is_empty());
    assert_eq!(zone.tick_count(), 1);
    assert_eq!(zone.component::<Counter>(counter).map(|c| c.ticks), Some(1));
}

#[test]
fn run_until_stops_on_flag() {
    let (mut zone, handle) = zone();
    let alice = player(&mut zone, vec![Box::new(Visible)]);
    let target = zone.spawn().expect("spawn");
    handle.inbound.push(alice, format!("look {target}"));

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::Relaxed);
    });

    zone.run_until(&stop, None).expect("run");
    stopper.join().expect("join");
    assert_eq!(heard(&handle, alice), vec![format!("You see #{target}.")]);
}
