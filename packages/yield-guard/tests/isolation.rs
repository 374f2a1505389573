use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{mpsc, Barrier};
use std::thread;

use futures::executor::{block_on, LocalPool};
use futures::future::join;
use futures::task::LocalSpawnExt;
use futures::TryStreamExt;

use yield_guard::scenarios::{self, Outcome};
use yield_guard::{
    allow_suspension, checkpoint, current_forbid_state, forbid_suspension, isolate,
    is_suspension_forbidden, AsyncGenerator, Generator, GeneratorStep, GuardError,
};

type Slot<T> = Rc<RefCell<Option<T>>>;

fn rejection_reason(result: Result<Vec<i32>, GuardError>) -> String {
    match result {
        Err(GuardError::Forbidden(err)) => err.reason().to_string(),
        other => panic!("expected a rejected suspension, got {other:?}"),
    }
}

fn forbidding_flow(
    name: &'static str,
    reason: &'static str,
    checkpoints: usize,
    value: i32,
) -> AsyncGenerator<'static, i32> {
    AsyncGenerator::new(name, move |co| async move {
        let _scope = forbid_suspension(reason);
        for _ in 0..checkpoints {
            checkpoint().await;
        }
        co.yield_(value).await;
    })
}

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
    yield_guard::install();
}

#[test]
fn reallow_in_one_flow_does_not_lift_another() {
    setup();
    let barrier = Barrier::new(2);
    let barrier = &barrier;

    let (a, b) = thread::scope(|s| {
        let a = s.spawn(move || {
            Generator::new("flow-a", |co| async move {
                let _scope = forbid_suspension("flow a");
                barrier.wait();
                barrier.wait();
                co.yield_(1).await;
            })
            .collect::<Result<Vec<_>, GuardError>>()
        });
        let b = s.spawn(move || {
            Generator::new("flow-b", |co| async move {
                barrier.wait();
                let _scope = allow_suspension();
                barrier.wait();
                co.yield_(2).await;
            })
            .collect::<Result<Vec<_>, GuardError>>()
        });
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_eq!(a.unwrap_err().to_string(), "flow a");
    assert_eq!(b.unwrap(), vec![2]);
}

#[test]
fn forbid_state_is_not_visible_from_other_threads() {
    setup();
    let _scope = forbid_suspension("main thread");
    assert!(is_suspension_forbidden());

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        tx.send((current_forbid_state(), is_suspension_forbidden()))
            .unwrap();
    })
    .join()
    .unwrap();

    let (state, forbidden) = rx.recv().unwrap();
    assert!(state.is_none());
    assert!(!forbidden);
    assert_eq!(current_forbid_state().unwrap().reason(), Some("main thread"));
}

#[test]
fn forbidding_tasks_on_one_local_pool_keep_their_own_scopes() {
    setup();
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let a: Slot<Result<Vec<i32>, GuardError>> = Rc::default();
    let b: Slot<Result<Vec<i32>, GuardError>> = Rc::default();

    let out = Rc::clone(&a);
    spawner
        .spawn_local(async move {
            let result = forbidding_flow("task-a", "flow a", 2, 1).try_collect().await;
            *out.borrow_mut() = Some(result);
        })
        .unwrap();
    let out = Rc::clone(&b);
    spawner
        .spawn_local(async move {
            let result = forbidding_flow("task-b", "flow b", 3, 2).try_collect().await;
            *out.borrow_mut() = Some(result);
        })
        .unwrap();
    pool.run();

    assert_eq!(rejection_reason(a.take().unwrap()), "flow a");
    assert_eq!(rejection_reason(b.take().unwrap()), "flow b");
    assert!(current_forbid_state().is_none());
}

#[test]
fn joined_generators_in_one_block_on_keep_their_own_scopes() {
    setup();
    let a = forbidding_flow("joined-a", "flow a", 1, 1);
    let b = forbidding_flow("joined-b", "flow b", 2, 2);

    let (a, b) = block_on(join(a.try_collect(), b.try_collect()));
    assert_eq!(rejection_reason(a), "flow a");
    assert_eq!(rejection_reason(b), "flow b");
}

#[test]
fn reallowing_generator_does_not_lift_a_sibling_on_the_same_thread() {
    setup();
    let a = forbidding_flow("sibling-a", "flow a", 2, 1);
    let b = AsyncGenerator::new("sibling-b", |co| async move {
        checkpoint().await;
        let _scope = allow_suspension();
        checkpoint().await;
        co.yield_(2).await;
    });

    let (a, b) = block_on(join(a.try_collect(), b.try_collect::<Vec<i32>>()));
    assert_eq!(rejection_reason(a), "flow a");
    assert_eq!(b.unwrap(), vec![2]);
}

#[test]
fn isolated_tasks_on_one_local_pool_see_only_their_own_state() {
    setup();
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let seen_a: Slot<Option<String>> = Rc::default();
    let seen_b: Slot<bool> = Rc::default();

    let out = Rc::clone(&seen_a);
    spawner
        .spawn_local(isolate(async move {
            let _scope = forbid_suspension("task a");
            checkpoint().await;
            checkpoint().await;
            let reason = current_forbid_state().and_then(|s| s.reason().map(str::to_string));
            *out.borrow_mut() = Some(reason);
        }))
        .unwrap();
    let out = Rc::clone(&seen_b);
    spawner
        .spawn_local(isolate(async move {
            checkpoint().await;
            let _scope = allow_suspension();
            checkpoint().await;
            *out.borrow_mut() = Some(is_suspension_forbidden());
        }))
        .unwrap();
    pool.run();

    assert_eq!(seen_a.take().unwrap().as_deref(), Some("task a"));
    assert_eq!(seen_b.take(), Some(false));
    assert!(current_forbid_state().is_none());
}

#[test]
fn suspended_generator_scope_does_not_leak_into_its_caller() {
    setup();
    let _scope = forbid_suspension("caller");
    let mut gen = Generator::new("holds-allow", |co| async move {
        let _allow = allow_suspension();
        co.yield_(1).await;
        co.yield_(2).await;
    });

    assert!(matches!(gen.resume(), Ok(GeneratorStep::Yield(1))));
    assert!(is_suspension_forbidden());
    assert_eq!(current_forbid_state().unwrap().reason(), Some("caller"));
    drop(gen);
    assert!(is_suspension_forbidden());
}

#[test]
fn every_scenario_behaves_as_expected() {
    setup();
    for scenario in scenarios::all() {
        let report = scenario.run();
        assert!(
            report.passed,
            "scenario {} expected {:?}, observed {:?}",
            report.name, report.expected, report.outcome
        );
    }
}

#[test]
fn context_isolation_scenario_rejects_only_flow_a() {
    setup();
    let report = scenarios::find("context-isolation").unwrap().run();
    assert_eq!(report.outcome, Outcome::Rejected("flow a".to_string()));
}
