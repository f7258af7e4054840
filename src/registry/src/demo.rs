//! A small set of illustrative task bodies, registered by `src/bin/server.rs`
//! and `src/bin/run_worker.rs` so the binaries are runnable out of the box.
//! Real applications register their own handlers against
//! [`TaskRegistryBuilder`](crate::TaskRegistryBuilder) instead.

use std::collections::BTreeMap;

use serde_json::Value as Json;
use taskq_domain::{QueueError, QueueResult};
use tracing::info;

use crate::TaskRegistryBuilder;

pub fn register_demo_tasks(builder: TaskRegistryBuilder) -> TaskRegistryBuilder {
    builder
        .register("add_numbers", add_numbers)
        .register("multiply_numbers", multiply_numbers)
        .register("process_data", process_data)
        .register("failing_task", failing_task)
}

fn number(value: &Json) -> QueueResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| QueueError::TaskExecution(format!("expected a number, got {value}")))
}

async fn add_numbers(args: Vec<Json>, _kwargs: BTreeMap<String, Json>) -> QueueResult<Json> {
    let [a, b] = take_two(&args)?;
    Ok(Json::from(number(a)? + number(b)?))
}

async fn multiply_numbers(args: Vec<Json>, _kwargs: BTreeMap<String, Json>) -> QueueResult<Json> {
    let [a, b] = take_two(&args)?;
    Ok(Json::from(number(a)? * number(b)?))
}

fn take_two(args: &[Json]) -> QueueResult<[&Json; 2]> {
    match args {
        [a, b] => Ok([a, b]),
        other => Err(QueueError::TaskExecution(format!(
            "expected 2 positional args, got {}",
            other.len()
        ))),
    }
}

/// Sums, averages, or finds the extremum of a list of numbers, selected by
/// `kwargs["operation"]` (default `"sum"`).
async fn process_data(args: Vec<Json>, kwargs: BTreeMap<String, Json>) -> QueueResult<Json> {
    let data = args
        .first()
        .and_then(|v| v.as_array())
        .ok_or_else(|| QueueError::TaskExecution("expected a list as the first argument".into()))?;
    if data.is_empty() {
        return Err(QueueError::TaskExecution("data list cannot be empty".into()));
    }
    let values: Vec<f64> = data.iter().map(number).collect::<QueueResult<_>>()?;

    let operation = kwargs
        .get("operation")
        .and_then(|v| v.as_str())
        .unwrap_or("sum")
        .to_string();

    let result = match operation.as_str() {
        "sum" => values.iter().sum::<f64>(),
        "avg" => values.iter().sum::<f64>() / values.len() as f64,
        "max" => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        "min" => values.iter().cloned().fold(f64::INFINITY, f64::min),
        other => {
            return Err(QueueError::TaskExecution(format!(
                "unsupported operation: {other}"
            )))
        }
    };

    info!(operation, data_count = values.len(), "processed data");
    Ok(serde_json::json!({
        "operation": operation,
        "data_count": values.len(),
        "result": result,
    }))
}

/// Always fails unless `kwargs["should_fail"]` is explicitly `false`. Useful
/// for exercising the retry scheduler and the dead-letter path end to end.
async fn failing_task(_args: Vec<Json>, kwargs: BTreeMap<String, Json>) -> QueueResult<Json> {
    let should_fail = kwargs
        .get("should_fail")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    if should_fail {
        let message = kwargs
            .get("error_message")
            .and_then(|v| v.as_str())
            .unwrap_or("task failed intentionally")
            .to_string();
        return Err(QueueError::TaskExecution(message));
    }
    Ok(Json::from("task completed successfully"))
}
