use std::collections::BTreeMap;

use taskq_domain::{NewTask, Priority};

use crate::http::dto::SubmitTaskRequest;

/// `{field: [message]}`, per the submission endpoint's validation error
/// shape — deliberately a map of lists, not a single message, so a client
/// can show every violation at once.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

pub fn validate_submission(request: SubmitTaskRequest) -> Result<NewTask, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if request.task_name.trim().is_empty() {
        errors
            .entry("task_name".to_string())
            .or_default()
            .push("must not be empty".to_string());
    }

    let priority = Priority::from_label(&request.priority);
    if priority.is_none() {
        errors.entry("priority".to_string()).or_default().push(format!(
            "must be one of low, normal, high, critical (got \"{}\")",
            request.priority
        ));
    }

    if request.queue_name.trim().is_empty() {
        errors
            .entry("queue_name".to_string())
            .or_default()
            .push("must not be empty".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewTask {
        task_name: request.task_name,
        args: request.args,
        kwargs: request.kwargs,
        priority: priority.expect("validated above"),
        max_retries: request.max_retries,
        retry_delay_seconds: request.retry_delay,
        queue_name: request.queue_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    fn valid_request() -> SubmitTaskRequest {
        SubmitTaskRequest {
            task_name: "add_numbers".into(),
            priority: "normal".into(),
            args: vec![Json::from(1), Json::from(2)],
            kwargs: BTreeMap::new(),
            max_retries: 3,
            retry_delay: 60,
            queue_name: "default".into(),
        }
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(validate_submission(valid_request()).is_ok());
    }

    #[test]
    fn rejects_empty_task_name() {
        let mut request = valid_request();
        request.task_name = "  ".into();
        let errors = validate_submission(request).unwrap_err();
        assert!(errors.contains_key("task_name"));
    }

    #[test]
    fn rejects_unknown_priority_label() {
        let mut request = valid_request();
        request.priority = "urgent".into();
        let errors = validate_submission(request).unwrap_err();
        assert!(errors.contains_key("priority"));
    }

    #[test]
    fn reports_every_violation_at_once() {
        let mut request = valid_request();
        request.task_name = "".into();
        request.priority = "bogus".into();
        request.queue_name = "".into();
        let errors = validate_submission(request).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
