use cascade_core::prelude::*;
use cascade_test_utils::{blog_schema, InterceptLog, RecordingExecutor};
use pretty_assertions::assert_eq;
use serde_json::json;

fn nested_create() -> OperationDescriptor {
    OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {
            "profile": {"create": {"bio": "hi"}},
            "posts": {"create": [{"title": "a"}, {"title": "b"}, {"title": "c"}]}
        }}),
    )
}

#[tokio::test]
async fn test_injected_error_settles_every_continuation() {
    let log = InterceptLog::new();
    let recorder = log.clone();
    let interceptor = NestedInterceptor::new(
        move |d: OperationDescriptor, next: Next| {
            let log = recorder.clone();
            async move {
                let position = log.record(&d);
                if d.args["title"] == json!("b") {
                    let err = InterceptError::custom("boom");
                    log.settle(position, &Err(err.clone()));
                    return Err(err);
                }
                let outcome = next.run(d).await;
                log.settle(position, &outcome);
                outcome
            }
        },
        Arc::new(blog_schema()),
    );
    let executor = RecordingExecutor::new(json!({"id": 1}));

    let err = interceptor
        .execute(nested_create(), executor.clone())
        .await
        .unwrap_err();

    assert_eq!(err, InterceptError::custom("boom"));
    assert!(log.all_settled());
    assert!(log.entries().iter().all(|entry| !entry.root));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_executor_failure_rejects_nested_continuations() {
    let log = InterceptLog::new();
    let recorder = log.clone();
    let interceptor = NestedInterceptor::new(
        move |d: OperationDescriptor, next: Next| {
            let log = recorder.clone();
            async move {
                let position = log.record(&d);
                let outcome = next.run(d).await;
                log.settle(position, &outcome);
                outcome
            }
        },
        Arc::new(blog_schema()),
    );
    let executor = RecordingExecutor::failing(InterceptError::executor("db down"));

    let err = interceptor
        .execute(nested_create(), executor)
        .await
        .unwrap_err();

    assert_eq!(err, InterceptError::executor("db down"));
    assert!(log.all_settled());
    let entries = log.entries();
    assert_eq!(entries.len(), 5);
    for entry in entries {
        assert_eq!(entry.outcome, Some(Err(InterceptError::executor("db down"))));
    }
}

#[tokio::test]
async fn test_write_to_read_conversion_rejected() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            if d.model == "Post" {
                return next.run(d.with_action(ReadAction::Include, json!(true))).await;
            }
            next.run(d).await
        },
        Arc::new(blog_schema()),
    );
    let executor = RecordingExecutor::new(json!({"id": 1}));

    let err = interceptor
        .execute(nested_create(), executor.clone())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InterceptError::InvalidActionChange {
            from: Action::Write(WriteAction::Create),
            to: Action::Read(ReadAction::Include),
        }
    );
    assert!(err.is_invalid_change());
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_filter_conversion_rejected() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            if d.action == Action::Where {
                let args = d.args.clone();
                return next.run(d.with_action(WriteAction::Create, args)).await;
            }
            next.run(d).await
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindMany,
        json!({"where": {"posts": {"some": {"title": "a"}}}}),
    );

    let err = interceptor
        .execute(descriptor, RecordingExecutor::new(json!([])))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InterceptError::InvalidActionChange {
            from: Action::Where,
            to: Action::Write(WriteAction::Create),
        }
    );
}

#[tokio::test]
async fn test_nested_query_action_rejected() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            if d.model == "Post" {
                let args = d.args.clone();
                return next.run(d.with_action(QueryAction::FindMany, args)).await;
            }
            next.run(d).await
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindFirst,
        json!({"include": {"posts": true}}),
    );

    let err = interceptor
        .execute(descriptor, RecordingExecutor::new(json!({"id": 1})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InterceptError::InvalidTargetAction {
            action: Action::Query(QueryAction::FindMany),
        }
    );
}

#[tokio::test]
async fn test_missing_continuation_reported() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            if d.model == "Profile" {
                return Ok(json!({"cached": true}));
            }
            next.run(d).await
        },
        Arc::new(blog_schema()),
    );

    let err = interceptor
        .execute(nested_create(), RecordingExecutor::new(json!({"id": 1})))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InterceptError::ContinuationDropped {
            model: "Profile".to_string(),
            action: Action::Write(WriteAction::Create),
        }
    );
}
