use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use taskq_broker::InMemoryBroker;
use taskq_domain::{NewTask, Priority, TaskStatus};
use taskq_engine::QueueEngine;
use taskq_registry::TaskRegistryBuilder;
use taskq_store::InMemoryStore;
use taskq_worker::{run_worker, WorkerConfig};
use tokio_util::sync::CancellationToken;

fn engine() -> QueueEngine {
    QueueEngine::new(Arc::new(InMemoryBroker::new()), Arc::new(InMemoryStore::new()))
}

fn sample_task(name: &str) -> NewTask {
    NewTask {
        task_name: name.into(),
        args: vec![Json::from(2), Json::from(3)],
        kwargs: BTreeMap::new(),
        priority: Priority::Normal,
        max_retries: 0,
        retry_delay_seconds: 0,
        queue_name: "default".into(),
    }
}

#[tokio::test]
async fn worker_completes_a_registered_task_then_stops_at_cap() {
    let engine = engine();
    let id = engine.enqueue(sample_task("add_numbers")).await.unwrap();

    let registry = TaskRegistryBuilder::new()
        .register("add_numbers", |args: Vec<Json>, _kwargs| async move {
            let a = args[0].as_f64().unwrap();
            let b = args[1].as_f64().unwrap();
            Ok(Json::from(a + b))
        })
        .freeze();

    let config = WorkerConfig {
        worker_id: "worker_default_1".into(),
        queue_name: "default".into(),
        poll_interval: Duration::from_millis(10),
        max_tasks_per_run: Some(1),
    };

    let processed = run_worker(engine.clone(), registry, config, CancellationToken::new()).await;
    assert_eq!(processed, 1);

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Success);
    assert_eq!(record.result, Some(Json::from(5.0)));
}

#[tokio::test]
async fn unknown_task_name_fails_without_counting_as_success() {
    let engine = engine();
    let id = engine.enqueue(sample_task("does_not_exist")).await.unwrap();

    let registry = TaskRegistryBuilder::new().freeze();
    let config = WorkerConfig {
        worker_id: "worker_default_1".into(),
        queue_name: "default".into(),
        poll_interval: Duration::from_millis(10),
        max_tasks_per_run: Some(1),
    };

    run_worker(engine.clone(), registry, config, CancellationToken::new()).await;

    let record = engine.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record
        .error_message
        .unwrap()
        .contains("Task function not found"));
}

#[tokio::test]
async fn shutdown_token_stops_worker_on_empty_queue() {
    let engine = engine();
    let registry = TaskRegistryBuilder::new().freeze();
    let token = CancellationToken::new();
    let config = WorkerConfig {
        worker_id: "worker_default_1".into(),
        queue_name: "default".into(),
        poll_interval: Duration::from_secs(30),
        max_tasks_per_run: None,
    };

    let token_clone = token.clone();
    let handle = tokio::spawn(run_worker(engine, registry, config, token_clone));

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let processed = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker should stop promptly after cancellation")
        .unwrap();
    assert_eq!(processed, 0);
}
