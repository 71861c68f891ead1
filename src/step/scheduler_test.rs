use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::test_utils::enable_logger;
use crate::Error;
use crate::StepError;

fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn push_step(
    steps: &mut Steps,
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
    priority: i64,
) {
    let log = log.clone();
    steps
        .register(name, priority, move || async move {
            log.lock().push(name);
            Ok(())
        })
        .unwrap();
}

#[tokio::test]
async fn test_runs_in_priority_order() {
    enable_logger();
    let log = recorder();
    let mut steps = Steps::new();
    push_step(&mut steps, &log, "router", 3);
    push_step(&mut steps, &log, "logger", 1);
    push_step(&mut steps, &log, "config", 2);
    assert_eq!(steps.len(), 3);

    steps.run().await.unwrap();
    assert_eq!(*log.lock(), vec!["logger", "config", "router"]);
    assert!(steps.is_empty());
}

#[tokio::test]
async fn test_failure_stops_run_with_position() {
    let log = recorder();
    let mut steps = Steps::new();
    push_step(&mut steps, &log, "logger", 1);
    steps
        .register("config", 2, || async {
            Err(Error::InvalidConfig("missing store endpoints".to_string()))
        })
        .unwrap();
    push_step(&mut steps, &log, "router", 3);

    let err = steps.run().await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("step 2/3"), "{msg}");
    assert!(msg.contains("config"), "{msg}");
    assert!(matches!(
        err,
        Error::Step(StepError::Failed { ordinal: 2, total: 3, .. })
    ));
    assert_eq!(*log.lock(), vec!["logger"]);
}

#[tokio::test]
async fn test_rejected_registration_leaves_steps_unchanged() {
    let log = recorder();
    let mut steps = Steps::new();
    push_step(&mut steps, &log, "logger", 1);

    let negative = steps.register("bad", -1, || async { Ok(()) });
    assert!(matches!(
        negative,
        Err(Error::Step(StepError::NegativePriority(-1)))
    ));
    let missing = steps.register_boxed("empty", 4, None);
    assert!(matches!(
        missing,
        Err(Error::Step(StepError::MissingAction { ref name })) if name == "empty"
    ));
    assert_eq!(steps.len(), 1);

    steps.run().await.unwrap();
    assert_eq!(*log.lock(), vec!["logger"]);
}

#[tokio::test]
async fn test_duplicate_names_and_ties_run_in_insertion_order() {
    let log = recorder();
    let mut steps = Steps::new();
    push_step(&mut steps, &log, "a", 0);
    push_step(&mut steps, &log, "b", 0);
    push_step(&mut steps, &log, "a", 0);

    steps.run().await.unwrap();
    assert_eq!(*log.lock(), vec!["a", "b", "a"]);
}

#[tokio::test]
async fn test_empty_run_succeeds() {
    assert!(Steps::new().run().await.is_ok());
}
