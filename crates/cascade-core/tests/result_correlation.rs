use cascade_core::prelude::*;
use cascade_core::{LogicalOperator, Modifier};
use cascade_test_utils::{blog_schema, init_tracing, InterceptLog, RecordingExecutor};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn logged(log: &InterceptLog, models: &'static [&'static str], replace: Option<Value>) -> NestedInterceptor {
    let log = log.clone();
    NestedInterceptor::new(
        move |d: OperationDescriptor, next: Next| {
            let log = log.clone();
            let replace = replace.clone();
            async move {
                let position = log.record(&d);
                let watched = models.contains(&d.model.as_str());
                let outcome = next.run(d).await;
                log.settle(position, &outcome);
                match (watched, replace) {
                    (true, Some(value)) => Ok(value),
                    _ => outcome,
                }
            }
        },
        Arc::new(blog_schema()),
    )
}

#[tokio::test]
async fn test_null_relation_result_not_spliced() {
    init_tracing();
    let log = InterceptLog::new();
    let interceptor = logged(&log, &["Profile"], Some(json!({"injected": true})));
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindFirst,
        json!({"where": {"id": 1}, "include": {"profile": true}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1, "profile": null}));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(result, json!({"id": 1, "profile": null}));
    let profile = log
        .entries()
        .into_iter()
        .find(|entry| entry.model == "Profile")
        .unwrap();
    assert_eq!(profile.outcome, Some(Ok(Value::Null)));
}

#[tokio::test]
async fn test_list_filter_across_repeated_parents() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            let is_comment = d.model == "Comment";
            let result = next.run(d).await?;
            match result {
                Value::Array(comments) if is_comment => Ok(Value::Array(
                    comments
                        .into_iter()
                        .filter(|comment| comment["deleted"] != json!(true))
                        .collect(),
                )),
                other => Ok(other),
            }
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindMany,
        json!({"include": {"posts": {"include": {"comments": true}}}}),
    );
    let executor = RecordingExecutor::new(json!([
        {"id": 1, "posts": [
            {"id": 10, "comments": [{"id": 100, "deleted": false}, {"id": 101, "deleted": true}]},
            {"id": 11, "comments": [{"id": 110, "deleted": true}]}
        ]},
        {"id": 2, "posts": [
            {"id": 20, "comments": []},
            {"id": 21, "comments": [{"id": 210, "deleted": false}]}
        ]}
    ]));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!([
            {"id": 1, "posts": [
                {"id": 10, "comments": [{"id": 100, "deleted": false}]},
                {"id": 11, "comments": []}
            ]},
            {"id": 2, "posts": [
                {"id": 20, "comments": []},
                {"id": 21, "comments": [{"id": 210, "deleted": false}]}
            ]}
        ])
    );
}

#[tokio::test]
async fn test_to_one_relation_result_replaced() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            let is_profile = d.model == "Profile";
            let mut result = next.run(d).await?;
            if let (true, Value::Array(profiles)) = (is_profile, &mut result) {
                for profile in profiles {
                    profile["bio"] = json!("[redacted]");
                }
            }
            Ok(result)
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindMany,
        json!({"include": {"profile": true}}),
    );
    let executor = RecordingExecutor::new(json!([
        {"id": 1, "profile": {"id": 5, "bio": "a"}},
        {"id": 2, "profile": null},
        {"id": 3, "profile": {"id": 6, "bio": "b"}}
    ]));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!([
            {"id": 1, "profile": {"id": 5, "bio": "[redacted]"}},
            {"id": 2, "profile": null},
            {"id": 3, "profile": {"id": 6, "bio": "[redacted]"}}
        ])
    );
}

#[tokio::test]
async fn test_filter_inside_logical_operators() {
    let scopes = Arc::new(Mutex::new(Vec::new()));
    let recorded = scopes.clone();
    let interceptor = NestedInterceptor::new(
        move |d: OperationDescriptor, next: Next| {
            let recorded = recorded.clone();
            async move {
                if d.action != Action::Where {
                    return next.run(d).await;
                }
                if let Some(scope) = &d.scope {
                    recorded
                        .lock()
                        .push((scope.modifier, scope.logical_operators.clone()));
                }
                let result = next.run(d.with_action(Action::Where, json!({"title": "published"}))).await?;
                assert_eq!(result, Value::Null);
                Ok(result)
            }
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindMany,
        json!({"where": {"NOT": {"AND": {"OR": [{"posts": {"some": {"title": "draft"}}}]}}}}),
    );
    let executor = RecordingExecutor::new(json!([{"id": 1}]));

    let result = interceptor
        .execute(descriptor, executor.clone())
        .await
        .unwrap();

    assert_eq!(result, json!([{"id": 1}]));
    assert_eq!(
        executor.last().unwrap().args,
        json!({"where": {"NOT": {"AND": {"OR": [{"posts": {"some": {"title": "published"}}}]}}}})
    );
    assert_eq!(
        *scopes.lock(),
        vec![(
            Some(Modifier::Some),
            vec![LogicalOperator::Not, LogicalOperator::And, LogicalOperator::Or]
        )]
    );
}

#[tokio::test]
async fn test_executor_skip_releases_nested_calls() {
    let log = InterceptLog::new();
    let interceptor = logged(&log, &[], None);
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {"posts": {"create": [{"title": "a"}, {"title": "b"}]}}}),
    );
    let executor = RecordingExecutor::new(Value::Null);

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(result, Value::Null);
    assert!(log.all_settled());
    for entry in log.entries() {
        assert_eq!(entry.outcome, Some(Ok(Value::Null)));
    }
}

#[tokio::test]
async fn test_identity_field_aligns_reordered_results() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            let is_post = d.model == "Post";
            let result = next.run(d).await?;
            match result {
                Value::Array(mut posts) if is_post => {
                    posts.reverse();
                    for post in &mut posts {
                        post["title"] = json!(post["title"].as_str().unwrap_or_default().to_uppercase());
                    }
                    Ok(Value::Array(posts))
                }
                other => Ok(other),
            }
        },
        Arc::new(blog_schema()),
    )
    .with_config(InterceptConfig::new().with_identity_field(Some("id".to_string())));
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindMany,
        json!({"include": {"posts": true}}),
    );
    let executor = RecordingExecutor::new(json!([
        {"id": 1, "posts": [{"id": 10, "title": "a"}]},
        {"id": 2, "posts": [{"id": 20, "title": "b"}, {"id": 21, "title": "c"}]}
    ]));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!([
            {"id": 1, "posts": [{"id": 10, "title": "A"}]},
            {"id": 2, "posts": [{"id": 21, "title": "C"}, {"id": 20, "title": "B"}]}
        ])
    );
}

fn without_deleted_comments() -> impl Interceptor {
    |d: OperationDescriptor, next: Next| async move {
        let is_comment = d.model == "Comment";
        let result = next.run(d).await?;
        match result {
            Value::Array(comments) if is_comment => Ok(Value::Array(
                comments
                    .into_iter()
                    .filter(|comment| comment["deleted"] != json!(true))
                    .collect(),
            )),
            other => Ok(other),
        }
    }
}

#[tokio::test]
async fn test_nested_select_keeps_child_post_processing() {
    let interceptor = NestedInterceptor::new(without_deleted_comments(), Arc::new(blog_schema()));
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindFirst,
        json!({"include": {"posts": {"select": {"id": true, "comments": true}}}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1, "posts": [
        {"id": 10, "comments": [{"id": 100, "deleted": false}, {"id": 101, "deleted": true}]}
    ]}));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!({"id": 1, "posts": [{"id": 10, "comments": [{"id": 100, "deleted": false}]}]})
    );
}

#[tokio::test]
async fn test_sibling_writes_keep_child_post_processing() {
    let interceptor = NestedInterceptor::new(without_deleted_comments(), Arc::new(blog_schema()));
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {"posts": {"create": [
            {"title": "a", "comments": {"create": {"body": "x"}}},
            {"title": "b"}
        ]}}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1, "posts": [
        {"id": 10, "title": "a", "comments": [{"id": 100, "deleted": false}, {"id": 101, "deleted": true}]},
        {"id": 11, "title": "b", "comments": []}
    ]}));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!({"id": 1, "posts": [
            {"id": 10, "title": "a", "comments": [{"id": 100, "deleted": false}]},
            {"id": 11, "title": "b", "comments": []}
        ]})
    );
}

#[tokio::test]
async fn test_record_shared_by_several_parents() {
    let schema = blog_schema().many_to_many("User", "tags", "Tag", "users");
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            let is_tag = d.model == "Tag";
            let mut result = next.run(d).await?;
            if let (true, Value::Array(tags)) = (is_tag, &mut result) {
                for tag in tags {
                    tag["seen"] = json!(true);
                }
            }
            Ok(result)
        },
        Arc::new(schema),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        QueryAction::FindMany,
        json!({"include": {"tags": true}}),
    );
    let executor = RecordingExecutor::new(json!([
        {"id": 1, "tags": [{"id": 7}]},
        {"id": 2, "tags": [{"id": 7}, {"id": 8}]}
    ]));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!([
            {"id": 1, "tags": [{"id": 7, "seen": true}]},
            {"id": 2, "tags": [{"id": 7, "seen": true}, {"id": 8, "seen": true}]}
        ])
    );
}
