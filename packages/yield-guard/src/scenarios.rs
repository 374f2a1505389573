//! Acceptance scenarios, shared by the test suite and the demo binary.
//!
//! Scenarios assume the suspension filter is registered (see
//! [`install`](crate::filter::install)); without it nothing is ever rejected
//! and the rejection scenarios report a mismatch.

use std::sync::Barrier;
use std::thread;

use futures::executor::block_on;
use futures::future::join;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;

use crate::async_generator::{checkpoint, AsyncGenerator};
use crate::error::GuardError;
use crate::generator::{Generator, GeneratorStep};
use crate::scope::{allow_suspension, forbid_suspension};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Expected {
    Completes,
    Rejected(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Rejected(String),
    Failed(String),
}

impl From<Result<(), GuardError>> for Outcome {
    fn from(result: Result<(), GuardError>) -> Self {
        match result {
            Ok(()) => Outcome::Completed,
            Err(GuardError::Forbidden(err)) => Outcome::Rejected(err.reason().to_string()),
            Err(err) => Outcome::Failed(err.to_string()),
        }
    }
}

pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub expected: Expected,
    body: fn() -> Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub description: &'static str,
    pub expected: Expected,
    pub outcome: Outcome,
    pub passed: bool,
}

impl Scenario {
    pub fn run(&self) -> ScenarioReport {
        let outcome = (self.body)();
        let passed = match (&self.expected, &outcome) {
            (Expected::Completes, Outcome::Completed) => true,
            (Expected::Rejected(expected), Outcome::Rejected(reason)) => expected == reason,
            _ => false,
        };
        ScenarioReport {
            name: self.name,
            description: self.description,
            expected: self.expected,
            outcome,
            passed,
        }
    }
}

static SCENARIOS: [Scenario; 10] = [
    Scenario {
        name: "basic-rejection",
        description: "a yield inside a forbidding scope opened in the generator's own frame fails",
        expected: Expected::Rejected("test"),
        body: basic_rejection,
    },
    Scenario {
        name: "reallow",
        description: "forbid, then re-allow: the yield goes through",
        expected: Expected::Completes,
        body: reallow,
    },
    Scenario {
        name: "reforbid-after-reallow",
        description: "forbid A, re-allow, forbid B: the yield fails with B",
        expected: Expected::Rejected("test2"),
        body: reforbid_after_reallow,
    },
    Scenario {
        name: "restore-after-nested-scope",
        description: "forbid A, re-allow, forbid B and close it: the yield goes through",
        expected: Expected::Completes,
        body: restore_after_nested_scope,
    },
    Scenario {
        name: "return-unaffected",
        description: "returning from a generator inside a forbidding scope is not a suspension",
        expected: Expected::Completes,
        body: return_unaffected,
    },
    Scenario {
        name: "frame-locality",
        description: "a generator driven from inside the scope yields in its own frame",
        expected: Expected::Completes,
        body: frame_locality,
    },
    Scenario {
        name: "async-await-allowed",
        description: "awaits inside a forbidding scope of an async generator go through",
        expected: Expected::Completes,
        body: async_await_allowed,
    },
    Scenario {
        name: "async-yield-rejected",
        description: "a true yield inside a forbidding scope of an async generator fails",
        expected: Expected::Rejected("test"),
        body: async_yield_rejected,
    },
    Scenario {
        name: "context-isolation",
        description: "a thread re-allowing suspension does not lift another thread's scope",
        expected: Expected::Rejected("flow a"),
        body: context_isolation,
    },
    Scenario {
        name: "task-isolation",
        description: "forbidding async generators sharing one thread each keep their own scope",
        expected: Expected::Rejected("flow a"),
        body: task_isolation,
    },
];

pub fn all() -> &'static [Scenario] {
    &SCENARIOS
}

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|scenario| scenario.name == name)
}

fn drain<Y, R>(generator: Generator<'_, Y, R>) -> Result<(), GuardError> {
    for item in generator {
        item?;
    }
    Ok(())
}

fn basic_rejection() -> Outcome {
    drain(Generator::new("genfunc", |co| async move {
        let _scope = forbid_suspension("test");
        co.yield_(1).await;
    }))
    .into()
}

fn reallow() -> Outcome {
    drain(Generator::new("genfunc", |co| async move {
        let _forbid = forbid_suspension("test");
        let _allow = allow_suspension();
        co.yield_(1).await;
    }))
    .into()
}

fn reforbid_after_reallow() -> Outcome {
    drain(Generator::new("genfunc", |co| async move {
        let _forbid = forbid_suspension("test");
        let _allow = allow_suspension();
        let _again = forbid_suspension("test2");
        co.yield_(1).await;
    }))
    .into()
}

fn restore_after_nested_scope() -> Outcome {
    drain(Generator::new("genfunc", |co| async move {
        let _forbid = forbid_suspension("test");
        let _allow = allow_suspension();
        {
            let _again = forbid_suspension("test2");
        }
        co.yield_(1).await;
    }))
    .into()
}

fn return_unaffected() -> Outcome {
    drain(Generator::new("genfunc", |co| async move {
        co.yield_(1).await;
        let _scope = forbid_suspension("test");
        2
    }))
    .into()
}

fn frame_locality() -> Outcome {
    let mut outer = Generator::new("genfunc", |co| async move {
        co.yield_(1).await;
        let _scope = forbid_suspension("test");
        let mut inner = Generator::new("simplegen", |co| async move {
            co.yield_(1).await;
        });
        inner.resume().map(|_| ())
    });
    let result = loop {
        match outer.resume() {
            Ok(GeneratorStep::Yield(_)) => continue,
            Ok(GeneratorStep::Return(result)) => break result,
            Err(err) => break Err(err),
        }
    };
    result.into()
}

fn async_await_allowed() -> Outcome {
    let generator: AsyncGenerator<'_, i32> = AsyncGenerator::new("genfunc", |_co| async move {
        let _scope = forbid_suspension("test");
        checkpoint().await;
        checkpoint().await;
    });
    block_on(generator.try_for_each(|_| async { Ok(()) })).into()
}

fn async_yield_rejected() -> Outcome {
    let mut generator = AsyncGenerator::new("genfunc", |co| async move {
        checkpoint().await;
        let _scope = forbid_suspension("test");
        checkpoint().await;
        co.yield_(1).await;
    });
    block_on(async {
        while let Some(item) = generator.next().await {
            item?;
        }
        Ok::<(), GuardError>(())
    })
    .into()
}

fn context_isolation() -> Outcome {
    let barrier = Barrier::new(2);
    let barrier = &barrier;

    let (a, b) = thread::scope(|s| {
        let a = s.spawn(move || {
            drain(Generator::new("flow-a", |co| async move {
                let _scope = forbid_suspension("flow a");
                barrier.wait();
                barrier.wait();
                co.yield_("a").await;
            }))
        });
        let b = s.spawn(move || {
            drain(Generator::new("flow-b", |co| async move {
                barrier.wait();
                let _scope = allow_suspension();
                barrier.wait();
                co.yield_("b").await;
            }))
        });
        (a.join(), b.join())
    });

    match (a, b) {
        (Ok(a), Ok(Ok(()))) => a.into(),
        (Ok(_), Ok(Err(err))) => Outcome::Failed(format!("flow b failed: {err}")),
        _ => Outcome::Failed("a flow panicked".to_string()),
    }
}

fn task_isolation() -> Outcome {
    let flow = |name: &'static str, reason: &'static str, checkpoints: usize| {
        AsyncGenerator::new(name, move |co| async move {
            let _scope = forbid_suspension(reason);
            for _ in 0..checkpoints {
                checkpoint().await;
            }
            co.yield_(()).await;
        })
    };
    let a = flow("flow-a", "flow a", 2);
    let b = flow("flow-b", "flow b", 3);

    let (a, b): (Result<Vec<()>, GuardError>, Result<Vec<()>, GuardError>) =
        block_on(join(a.try_collect(), b.try_collect()));
    match Outcome::from(b.map(drop)) {
        Outcome::Rejected(reason) if reason == "flow b" => a.map(drop).into(),
        other => Outcome::Failed(format!("flow b was not rejected on its own: {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_and_findable() {
        for scenario in all() {
            let found = find(scenario.name).expect("scenario should be findable");
            assert_eq!(found.description, scenario.description);
        }
        assert!(find("no-such-scenario").is_none());
    }

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(Outcome::from(Ok(())), Outcome::Completed);
        let forbidden = GuardError::from(crate::error::SuspensionForbidden::new("why"));
        assert_eq!(Outcome::from(Err(forbidden)), Outcome::Rejected("why".into()));
    }

    #[test]
    fn test_report_serializes_expectation() {
        let report = ScenarioReport {
            name: "x",
            description: "y",
            expected: Expected::Rejected("r"),
            outcome: Outcome::Completed,
            passed: false,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["expected"]["kind"], "rejected");
        assert_eq!(json["expected"]["reason"], "r");
        assert_eq!(json["outcome"]["kind"], "completed");
    }
}
