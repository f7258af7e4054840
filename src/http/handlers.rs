use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use taskq_domain::TaskStatus;
use taskq_store::TaskQuery;
use tracing::error;
use uuid::Uuid;

use crate::app::AppContext;
use crate::http::dto::{ListTasksQuery, SubmitTaskRequest, TaskRecordDto};
use crate::http::validation::validate_submission;

fn success(status: StatusCode, message: &str, data: serde_json::Value) -> Response {
    (
        status,
        Json(json!({ "success": true, "message": message, "data": data })),
    )
        .into_response()
}

fn failure(status: StatusCode, message: &str, errors: serde_json::Value) -> Response {
    (
        status,
        Json(json!({ "success": false, "message": message, "errors": errors })),
    )
        .into_response()
}

pub async fn submit_task(
    State(context): State<AppContext>,
    Json(request): Json<SubmitTaskRequest>,
) -> Response {
    let task = match validate_submission(request) {
        Ok(task) => task,
        Err(errors) => {
            return failure(StatusCode::BAD_REQUEST, "validation failed", json!(errors));
        }
    };

    let engine = context.engine();
    let task_id = match engine.enqueue(task).await {
        Ok(id) => id,
        Err(err) => {
            error!(%err, "enqueue failed");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "failed to enqueue task", json!({}));
        }
    };

    match engine.get_record(task_id).await {
        Ok(Some(record)) => success(
            StatusCode::CREATED,
            "task submitted",
            json!(TaskRecordDto::from(record)),
        ),
        _ => success(StatusCode::CREATED, "task submitted", json!({ "id": task_id.to_string() })),
    }
}

pub async fn list_tasks(State(context): State<AppContext>, Query(query): Query<ListTasksQuery>) -> Response {
    let status = query.status.as_deref().and_then(TaskStatus::from_str);
    if query.status.is_some() && status.is_none() {
        return failure(
            StatusCode::BAD_REQUEST,
            "validation failed",
            json!({ "status": [format!("unrecognized status: {}", query.status.unwrap())] }),
        );
    }

    let task_query = TaskQuery {
        status,
        queue_name: query.queue_name,
        limit: query.limit.unwrap_or(0),
    };

    match context.engine().list_records(&task_query).await {
        Ok(records) => {
            let count = records.len();
            let dtos: Vec<TaskRecordDto> = records.into_iter().map(TaskRecordDto::from).collect();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "message": "ok", "data": dtos, "count": count })),
            )
                .into_response()
        }
        Err(err) => {
            error!(%err, "list_tasks failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "failed to list tasks", json!({}))
        }
    }
}

pub async fn get_task(State(context): State<AppContext>, Path(id): Path<String>) -> Response {
    let Ok(task_id) = Uuid::parse_str(&id) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "validation failed",
            json!({ "id": ["must be a UUID"] }),
        );
    };

    match context.engine().get_record(task_id).await {
        Ok(Some(record)) => success(StatusCode::OK, "ok", json!(TaskRecordDto::from(record))),
        Ok(None) => failure(StatusCode::NOT_FOUND, "task not found", json!({})),
        Err(err) => {
            error!(%err, "get_task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch task", json!({}))
        }
    }
}
