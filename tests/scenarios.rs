//! End-to-end scenarios driving the engine, registry, and worker loop
//! together over the in-memory broker and store fakes — no Redis or
//! Postgres required.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use taskq_broker::InMemoryBroker;
use taskq_domain::{NewTask, Priority, TaskStatus};
use taskq_engine::{DequeueOutcome, QueueEngine};
use taskq_registry::{Lookup, TaskRegistryBuilder};
use taskq_store::InMemoryStore;
use taskq_worker::{run_worker, WorkerConfig};
use tokio_util::sync::CancellationToken;

fn engine() -> QueueEngine {
    QueueEngine::new(Arc::new(InMemoryBroker::new()), Arc::new(InMemoryStore::new()))
}

fn task(name: &str, priority: Priority, max_retries: u32, retry_delay_seconds: u32) -> NewTask {
    NewTask {
        task_name: name.into(),
        args: vec![Json::from(2), Json::from(3)],
        kwargs: BTreeMap::new(),
        priority,
        max_retries,
        retry_delay_seconds,
        queue_name: "q".into(),
    }
}

fn assigned_id(outcome: DequeueOutcome) -> uuid::Uuid {
    match outcome {
        DequeueOutcome::Assigned(envelope) => envelope.task_id,
        DequeueOutcome::NoTask => panic!("expected a task, queue was empty"),
        DequeueOutcome::Infra(err) => panic!("expected a task, got infra error: {err}"),
    }
}

/// S1 — priority order: four sequential dequeues drain high, normal, low,
/// then nothing, regardless of enqueue order.
#[tokio::test]
async fn priority_order_drains_highest_first() {
    let engine = engine();
    let low = engine.enqueue(task("t_low", Priority::Low, 0, 0)).await.unwrap();
    let norm = engine.enqueue(task("t_norm", Priority::Normal, 0, 0)).await.unwrap();
    let high = engine.enqueue(task("t_high", Priority::High, 0, 0)).await.unwrap();

    assert_eq!(assigned_id(engine.dequeue("q", "w1").await), high);
    assert_eq!(assigned_id(engine.dequeue("q", "w2").await), norm);
    assert_eq!(assigned_id(engine.dequeue("q", "w3").await), low);
    assert!(matches!(engine.dequeue("q", "w4").await, DequeueOutcome::NoTask));
}

/// S2 — happy path: enqueue, execute, complete, with the final record
/// carrying the expected result and timestamps.
#[tokio::test]
async fn happy_path_completes_with_result() {
    let engine = engine();
    let registry = TaskRegistryBuilder::new()
        .register("add", |args: Vec<Json>, _kwargs| async move {
            Ok(Json::from(args[0].as_f64().unwrap() + args[1].as_f64().unwrap()))
        })
        .freeze();

    let id = engine.enqueue(task("add", Priority::Normal, 0, 0)).await.unwrap();
    let config = WorkerConfig {
        worker_id: "w1".into(),
        queue_name: "q".into(),
        poll_interval: Duration::from_millis(5),
        max_tasks_per_run: Some(1),
    };
    run_worker(engine.clone(), registry, config, CancellationToken::new()).await;

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Success);
    assert_eq!(record.result, Some(Json::from(5.0)));
    assert_eq!(record.retry_count, 0);
    assert!(record.completed_at.is_some());
}

/// S3 — retry then success: a task that fails once and succeeds
/// thereafter ends up `success` with `retry_count == 1` after promotion.
#[tokio::test]
async fn retry_then_success_after_promotion() {
    let engine = engine();
    let attempts = Arc::new(AtomicUsize::new(0));
    let registry = {
        let attempts = Arc::clone(&attempts);
        TaskRegistryBuilder::new()
            .register("flaky", move |_args: Vec<Json>, _kwargs| {
                let attempts = Arc::clone(&attempts);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(taskq_domain::QueueError::TaskExecution("first attempt fails".into()))
                    } else {
                        Ok(Json::from("ok"))
                    }
                }
            })
            .freeze()
    };

    let id = engine.enqueue(task("flaky", Priority::Normal, 2, 0)).await.unwrap();

    match engine.dequeue("q", "w1").await {
        DequeueOutcome::Assigned(envelope) => {
            let Lookup::Found(handler) = registry.lookup(&envelope.task_name) else {
                panic!("flaky must be registered");
            };
            let err = handler.call(&envelope.args, &envelope.kwargs).await.unwrap_err();
            engine.fail(id, "w1", &err.to_string()).await;
        }
        _ => panic!("expected Assigned"),
    }

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Retry);
    assert_eq!(record.retry_count, 1);

    let report = engine.promote_retries().await;
    assert_eq!(report.promoted, 1);
    assert!(!report.errored);

    match engine.dequeue("q", "w2").await {
        DequeueOutcome::Assigned(envelope) => {
            let Lookup::Found(handler) = registry.lookup(&envelope.task_name) else {
                panic!("flaky must be registered");
            };
            let result = handler.call(&envelope.args, &envelope.kwargs).await.unwrap();
            engine.complete(id, "w2", result).await;
        }
        _ => panic!("expected Assigned on second attempt"),
    }

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Success);
    assert_eq!(record.retry_count, 1);
    assert!(record.error_message.is_none(), "stale failure message must be cleared on success");
}

/// S4 — exhaustion: `max_retries=1` means the second failure is terminal,
/// and the envelope lands in the dead-letter list.
#[tokio::test]
async fn exhausted_retries_become_terminal_failure() {
    let engine = engine();
    let registry = TaskRegistryBuilder::new()
        .register("always_fails", |_args: Vec<Json>, _kwargs| async move {
            Err(taskq_domain::QueueError::TaskExecution("boom".into()))
        })
        .freeze();

    let id = engine.enqueue(task("always_fails", Priority::Normal, 1, 0)).await.unwrap();

    for worker in ["w1", "w2"] {
        match engine.dequeue("q", worker).await {
            DequeueOutcome::Assigned(envelope) => {
                let Lookup::Found(handler) = registry.lookup(&envelope.task_name) else {
                    panic!("always_fails must be registered");
                };
                let err = handler.call(&envelope.args, &envelope.kwargs).await.unwrap_err();
                engine.fail(id, worker, &err.to_string()).await;
            }
            DequeueOutcome::NoTask => {
                engine.promote_retries().await;
                match engine.dequeue("q", worker).await {
                    DequeueOutcome::Assigned(envelope) => {
                        let Lookup::Found(handler) = registry.lookup(&envelope.task_name) else {
                            panic!("always_fails must be registered");
                        };
                        let err = handler.call(&envelope.args, &envelope.kwargs).await.unwrap_err();
                        engine.fail(id, worker, &err.to_string()).await;
                    }
                    other => panic!("expected Assigned after promotion, got a different outcome: {}", matches!(other, DequeueOutcome::NoTask)),
                }
            }
            DequeueOutcome::Infra(err) => panic!("unexpected infra error: {err}"),
        }
    }

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.retry_count, 1);
    assert!(record.error_message.is_some());

    let stats = engine.stats("q").await.unwrap();
    assert_eq!(stats.dead_letter, 1);
}

/// S5 — unknown task: the worker loop itself fails it, without ever
/// calling a handler.
#[tokio::test]
async fn unknown_task_name_fails_with_a_clear_message() {
    let engine = engine();
    let registry = TaskRegistryBuilder::new().freeze();
    let id = engine.enqueue(task("does_not_exist", Priority::Normal, 0, 0)).await.unwrap();

    let config = WorkerConfig {
        worker_id: "w1".into(),
        queue_name: "q".into(),
        poll_interval: Duration::from_millis(5),
        max_tasks_per_run: Some(1),
    };
    run_worker(engine.clone(), registry, config, CancellationToken::new()).await;

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.error_message.unwrap().contains("Task function not found"));
}

/// S6 — multi-worker drainage: 10 quick tasks, 3 concurrent workers, no
/// task claimed twice.
#[tokio::test]
async fn multiple_workers_drain_the_queue_without_double_claims() {
    let engine = engine();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let registry = {
        let seen = Arc::clone(&seen);
        TaskRegistryBuilder::new()
            .register("touch", move |args: Vec<Json>, _kwargs| {
                let seen = Arc::clone(&seen);
                async move {
                    let id = args[0].as_str().unwrap().to_string();
                    seen.lock().unwrap().push(id);
                    Ok(Json::Null)
                }
            })
            .freeze()
    };

    let mut ids = Vec::new();
    for n in 0..10 {
        let mut t = task("touch", Priority::Normal, 0, 0);
        t.args = vec![Json::from(format!("task-{n}"))];
        ids.push(engine.enqueue(t).await.unwrap());
    }

    let token = CancellationToken::new();
    let mut handles = Vec::new();
    for n in 1..=3 {
        let config = WorkerConfig {
            worker_id: format!("worker_q_{n}"),
            queue_name: "q".into(),
            poll_interval: Duration::from_millis(50),
            max_tasks_per_run: None,
        };
        handles.push(tokio::spawn(run_worker(
            engine.clone(),
            registry.clone(),
            config,
            token.child_token(),
        )));
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    token.cancel();

    let mut total_processed = 0u64;
    for handle in handles {
        total_processed += tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap();
    }
    assert_eq!(total_processed, 10);

    for id in ids {
        let record = engine.get_record(id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Success);
    }

    let claimed = seen.lock().unwrap();
    let mut unique = claimed.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), claimed.len(), "no task should be claimed twice");
}

/// P1/P4 — retry budget is never exceeded, and every terminal record
/// carries a completion timestamp.
#[tokio::test]
async fn retry_budget_and_completion_timestamp_invariants_hold() {
    let engine = engine();
    let id = engine.enqueue(task("always_fails", Priority::Normal, 1, 0)).await.unwrap();

    engine.dequeue("q", "w1").await;
    engine.fail(id, "w1", "boom").await;
    engine.promote_retries().await;
    engine.dequeue("q", "w2").await;
    engine.fail(id, "w2", "boom again").await;

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert!(record.retry_count <= record.max_retries);
    assert!(record.is_terminal());
    assert!(record.completed_at.is_some());
}

/// Boundary: dequeuing from an empty queue is side-effect free and
/// `promote_retries` on an empty retry set is a no-op.
#[tokio::test]
async fn empty_queue_and_empty_retry_set_are_no_ops() {
    let engine = engine();
    assert!(matches!(engine.dequeue("q", "w1").await, DequeueOutcome::NoTask));

    let report = engine.promote_retries().await;
    assert_eq!(report.promoted, 0);
    assert!(!report.errored);

    let stats = engine.stats("q").await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 0);
}

/// Round-trip: dequeue returns the same name/args/kwargs/priority/queue
/// supplied at enqueue time.
#[tokio::test]
async fn dequeue_round_trips_the_enqueued_fields() {
    let engine = engine();
    let mut kwargs = BTreeMap::new();
    kwargs.insert("operation".to_string(), Json::from("sum"));
    let submitted = NewTask {
        task_name: "process_data".into(),
        args: vec![Json::Array(vec![Json::from(1), Json::from(2)])],
        kwargs: kwargs.clone(),
        priority: Priority::High,
        max_retries: 3,
        retry_delay_seconds: 30,
        queue_name: "q".into(),
    };
    engine.enqueue(submitted.clone()).await.unwrap();

    match engine.dequeue("q", "w1").await {
        DequeueOutcome::Assigned(envelope) => {
            assert_eq!(envelope.task_name, submitted.task_name);
            assert_eq!(envelope.args, submitted.args);
            assert_eq!(envelope.kwargs, submitted.kwargs);
            assert_eq!(envelope.priority, submitted.priority);
            assert_eq!(envelope.queue_name, submitted.queue_name);
        }
        _ => panic!("expected Assigned"),
    }
}

/// Idempotence: calling `complete` twice for the same task leaves it in
/// `success` and does not error the second time.
#[tokio::test]
async fn completing_a_task_twice_is_idempotent() {
    let engine = engine();
    let id = engine.enqueue(task("add", Priority::Normal, 0, 0)).await.unwrap();
    engine.dequeue("q", "w1").await;

    assert!(engine.complete(id, "w1", Json::from(5)).await);
    assert!(engine.complete(id, "w1", Json::from(5)).await);

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Success);
}
