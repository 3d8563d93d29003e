mod common;

use common::{Sim, ns, sleep};

use tasklet::factory::Test;
use tasklet::testing::{Captures, ErrorKind, ExpectError, StageGroup};
use tasklet::{Failure, Resume, Schedule, Step, TaskError};

use std::cell::Cell;
use std::rc::Rc;

use tracing_subscriber::layer::SubscriberExt;

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("boom {0}")]
struct Boom(u32);

#[derive(thiserror::Error, Debug)]
#[error("other")]
struct Other;

#[test]
fn test_timeout_kills_slow_body() {
    let sim = Sim::new();
    let sched = sim.sched();
    let finished = Rc::new(Cell::new(false));

    let slow = Test::new("test_slow").timeout(ns(10)).build({
        let sched = sched.clone();
        let finished = finished.clone();
        move |()| {
            let sched = sched.clone();
            let finished = finished.clone();
            async move {
                sleep(sched, ns(20)).await?;
                finished.set(true);
                Ok::<(), Failure>(())
            }
        }
    });

    let test = slow.call(&sched, ());
    let handle = test.handle();
    sched.start(Box::new(test));
    sim.run();

    let failure = handle.retval().unwrap_err();
    assert_eq!(
        failure.downcast_ref::<TaskError>(),
        Some(&TaskError::Timeout { after: ns(10) })
    );
    assert!(failure.downcast_ref::<TaskError>().is_some_and(TaskError::is_timeout));
    assert!(!finished.get());
}

#[test]
fn test_body_faster_than_timeout_keeps_its_value() {
    let sim = Sim::new();
    let sched = sim.sched();

    let quick = Test::new("test_quick").timeout(ns(100)).build({
        let sched = sched.clone();
        move |x: u32| {
            let sched = sched.clone();
            async move {
                sleep(sched, ns(5)).await?;
                Ok::<u32, Failure>(x)
            }
        }
    });

    let test = quick.call(&sched, 9);
    let handle = test.handle();
    sched.start(Box::new(test));
    sim.run();

    assert_eq!(handle.retval().unwrap(), Some(9));
    assert_eq!(handle.timeout(), Some(ns(100)));
}

#[test]
fn test_body_failure_passes_through_timeout_race() {
    let sim = Sim::new();
    let sched = sim.sched();

    let failing = Test::new("test_failing")
        .timeout(ns(100))
        .build(|()| async { Err::<(), Failure>(Boom(4).into()) });

    let test = failing.call(&sched, ());
    let handle = test.handle();
    sched.start(Box::new(test));
    sim.run();

    let failure = handle.retval().unwrap_err();
    assert_eq!(failure.downcast_ref::<Boom>(), Some(&Boom(4)));
}

#[test]
fn test_killing_timed_test_kills_its_body() {
    let sim = Sim::new();
    let sched = sim.sched();
    let finished = Rc::new(Cell::new(false));

    let timed = Test::new("test_timed").timeout(ns(100)).build({
        let sched = sched.clone();
        let finished = finished.clone();
        move |()| {
            let sched = sched.clone();
            let finished = finished.clone();
            async move {
                sleep(sched, ns(50)).await?;
                finished.set(true);
                Ok::<(), Failure>(())
            }
        }
    });

    let mut test = timed.call(&sched, ());
    let handle = test.handle();
    assert!(matches!(test.advance(Resume::start()), Step::Suspended(_)));

    handle.kill();
    assert_eq!(sim.unscheduled().len(), 2);

    sim.run();
    assert!(!finished.get());
    assert_eq!(handle.retval().unwrap(), None);
}

#[test]
fn test_abort_fails_test_without_running_body() {
    let sim = Sim::new();
    let sched = sim.sched();
    let resumed = Rc::new(Cell::new(false));

    let waiting = Test::new("test_waiting").build({
        let sched = sched.clone();
        let resumed = resumed.clone();
        move |()| {
            let sched = sched.clone();
            let resumed = resumed.clone();
            async move {
                sleep(sched, ns(10)).await?;
                resumed.set(true);
                Ok::<(), Failure>(())
            }
        }
    });

    let mut test = waiting.call(&sched, ());
    let id = test.id();
    let handle = test.handle();
    assert!(matches!(test.advance(Resume::start()), Step::Suspended(_)));

    handle.abort(Boom(1));

    assert!(handle.is_completed());
    assert_eq!(sim.unscheduled(), vec![id]);
    assert_eq!(handle.retval().unwrap_err().downcast_ref::<Boom>(), Some(&Boom(1)));

    sim.run();
    assert!(!resumed.get());
}

#[test]
#[should_panic(expected = "abort() called on completed test")]
fn test_abort_after_completion_panics() {
    let sim = Sim::new();
    let done = Test::new("test_done").build(|()| async { Ok::<(), Failure>(()) });

    let mut test = done.call(&sim.sched(), ());
    test.advance(Resume::start());
    test.abort(Boom(2));
}

#[test]
fn test_start_times_recorded_on_first_advance() {
    let sim = Sim::new();
    let sched = sim.sched();
    let timed = Test::new("test_times").build(|()| async { Ok::<(), Failure>(()) });

    let test = timed.call(&sched, ());
    let handle = test.handle();
    assert_eq!(handle.start_time(), None);
    assert_eq!(handle.start_sim_time(), None);

    sim.set_now(ns(5));
    sched.start(Box::new(test));
    sim.run();

    assert!(handle.start_time().is_some());
    assert_eq!(handle.start_sim_time(), Some(ns(5)));
}

#[test]
fn test_metadata_accessors() {
    let sim = Sim::new();
    let meta_test = Test::new("test_meta")
        .module("bench")
        .skip(true)
        .expect_fail(true)
        .expect_error(ExpectError::kind::<Boom>())
        .stage(4)
        .build(|()| async { Ok::<(), Failure>(()) });

    let handle = meta_test.call(&sim.sched(), ()).handle();
    assert!(handle.skip());
    assert!(handle.expect_fail());
    assert_eq!(handle.stage(), Some(4));
    assert_eq!(handle.expect_error(), &ExpectError::Kinds(vec![ErrorKind::of::<Boom>()]));
    assert_eq!(handle.sort_key().stage, StageGroup::Staged(4));
}

#[test]
fn test_expect_error_matching() {
    let boom = Failure::new(Boom(1));
    let other = Failure::new(Other);

    assert!(!ExpectError::None.is_expected());
    assert!(!ExpectError::None.matches(&boom));

    assert!(ExpectError::Any.matches(&boom));
    assert!(ExpectError::Any.matches(&other));

    let only_boom = ExpectError::kind::<Boom>();
    assert!(only_boom.is_expected());
    assert!(only_boom.matches(&boom));
    assert!(!only_boom.matches(&other));

    let either = ExpectError::Kinds(vec![ErrorKind::of::<Boom>(), ErrorKind::of::<Other>()]);
    assert!(either.matches(&other));
    assert!(!ExpectError::Kinds(Vec::new()).is_expected());
}

#[test]
fn test_sort_keys_order_stages_numerically() {
    let sim = Sim::new();
    let sched = sim.sched();

    let build = |name: &str, stage: Option<u32>| {
        let mut test = Test::new(name).module("mod");
        if let Some(stage) = stage {
            test = test.stage(stage);
        }
        test.build(|()| async { Ok::<(), Failure>(()) })
            .call(&sched, ())
            .sort_key()
    };

    let a = build("fnA", None);
    let b = build("fnB", Some(1));
    let c = build("fnC", Some(2));
    let d = build("fnD", Some(10));
    let e = build("fnE", Some(2));

    let mut keys = vec![a.clone(), d.clone(), c.clone(), e.clone(), b.clone()];
    keys.sort();
    assert_eq!(keys, vec![b, c, e.clone(), d.clone(), a]);
    assert!(e < d);
    assert_eq!(d.to_string(), "mod.10.fnD");
}

#[test]
fn test_captured_logs_only_match_exact_namespace() {
    let sim = Sim::new();
    let sched = sim.sched();
    let captures = Captures::new("bench");
    let subscriber = tracing_subscriber::registry().with(captures.layer());

    let noisy = Test::new("test_noisy").build({
        let sched = sched.clone();
        move |()| {
            let sched = sched.clone();
            async move {
                tracing::info!(target: "bench", "hello");
                tracing::warn!(target: "bench::child", "ignored");
                sleep(sched, ns(1)).await?;
                tracing::info!(target: "bench", value = 3, "again");
                Ok::<(), Failure>(())
            }
        }
    });

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "bench", "before");

        let test = noisy.call(&sched, ());
        test.capture_logs(&captures);
        let handle = test.handle();
        sched.start(Box::new(test));
        sim.run();

        tracing::info!(target: "bench", "after");

        assert_eq!(
            handle.captured_logs(),
            vec!["INFO bench: hello".to_string(), "INFO bench: again value=3".to_string()]
        );
    });
}

#[test]
fn test_first_advance_announces_test() {
    let sim = Sim::new();
    let sched = sim.sched();
    let captures = Captures::new("tasklet::test");
    let subscriber = tracing_subscriber::registry().with(captures.layer());

    let stepping = |test: Test| {
        test.build({
            let sched = sched.clone();
            move |()| {
                let sched = sched.clone();
                async move {
                    sleep(sched.clone(), ns(1)).await?;
                    sleep(sched, ns(1)).await?;
                    Ok::<(), Failure>(())
                }
            }
        })
    };
    let described = stepping(Test::new("test_x").description("does X"));
    let bare = stepping(Test::new("test_y"));

    tracing::subscriber::with_default(subscriber, || {
        let test = described.call(&sched, ());
        test.capture_logs(&captures);
        let handle = test.handle();
        sched.start(Box::new(test));
        sim.run();

        assert_eq!(sim.advances(), 3);
        assert_eq!(
            handle.captured_logs(),
            vec!["INFO tasklet::test: Starting test: \"test_x\"\nDescription: does X".to_string()]
        );

        let test = bare.call(&sched, ());
        test.capture_logs(&captures);
        let handle = test.handle();
        sched.start(Box::new(test));
        sim.run();

        assert_eq!(
            handle.captured_logs(),
            vec!["INFO tasklet::test: Starting test: \"test_y\"\nDescription: None".to_string()]
        );
    });
}

#[test]
fn test_captured_logs_empty_without_capture() {
    let sim = Sim::new();
    let quiet = Test::new("test_quiet").build(|()| async { Ok::<(), Failure>(()) });

    let mut test = quiet.call(&sim.sched(), ());
    test.advance(Resume::start());
    assert!(test.handle().captured_logs().is_empty());
}

#[test]
#[should_panic(expected = "is not complete")]
fn test_captured_logs_before_completion_panics() {
    let sim = Sim::new();
    let pending = Test::new("test_pending").build(|()| async { Ok::<(), Failure>(()) });
    let test = pending.call(&sim.sched(), ());
    let _ = test.handle().captured_logs();
}
