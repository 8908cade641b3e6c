use cascade_core::prelude::*;
use cascade_core::Extractor;
use cascade_test_utils::{blog_schema, init_tracing, InterceptLog, RecordingExecutor};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

fn passthrough() -> NestedInterceptor {
    NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move { next.run(d).await },
        Arc::new(blog_schema()),
    )
}

#[tokio::test]
async fn test_no_nested_operations_intercepted_once() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let interceptor = NestedInterceptor::new(
        move |d: OperationDescriptor, next: Next| {
            let log = log.clone();
            async move {
                log.lock().push(d.clone());
                next.run(d).await
            }
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Update,
        json!({"where": {"id": 1}, "data": {"name": "n", "posts": null}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1, "name": "n"}));

    let result = interceptor
        .execute(descriptor.clone(), executor.clone())
        .await
        .unwrap();

    assert_eq!(result, json!({"id": 1, "name": "n"}));
    assert_eq!(*seen.lock(), vec![descriptor.clone()]);
    assert_eq!(executor.executed(), vec![descriptor]);
}

#[tokio::test]
async fn test_nested_creates_round_trip_unchanged() {
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {
            "name": "u",
            "profile": {"create": {"bio": "hi"}},
            "posts": {
                "create": [
                    {"title": "a", "comments": {"create": [{"body": "1"}, {"body": "2"}]}},
                    {"title": "b"}
                ],
                "connect": [{"id": 7}]
            }
        }}),
    )
    .in_transaction();
    let executor = RecordingExecutor::new(json!({"id": 1}));

    passthrough()
        .execute(descriptor.clone(), executor.clone())
        .await
        .unwrap();

    assert_eq!(executor.last(), Some(descriptor));
}

#[tokio::test]
async fn test_converted_create_merges_into_upsert() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            if d.model == "Post" && d.action == Action::Write(WriteAction::Create) {
                let args = json!({
                    "where": {"title": d.args["title"].clone()},
                    "create": d.args.clone(),
                    "update": d.args.clone(),
                });
                return next.run(d.with_action(WriteAction::Upsert, args)).await;
            }
            next.run(d).await
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {"name": "u", "posts": {
            "create": {"title": "A"},
            "upsert": {"where": {"id": 1}, "create": {"title": "B"}, "update": {"title": "B"}}
        }}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1}));

    interceptor
        .execute(descriptor, executor.clone())
        .await
        .unwrap();

    assert_eq!(
        executor.last().unwrap().args,
        json!({"data": {"name": "u", "posts": {"upsert": [
            {"where": {"id": 1}, "create": {"title": "B"}, "update": {"title": "B"}},
            {"where": {"title": "A"}, "create": {"title": "A"}, "update": {"title": "A"}}
        ]}}})
    );
}

#[tokio::test]
async fn test_nested_arguments_rewritten_at_every_level() {
    let log = InterceptLog::new();
    let recorder = log.clone();
    let interceptor = NestedInterceptor::new(
        move |mut d: OperationDescriptor, next: Next| {
            let log = recorder.clone();
            async move {
                log.record(&d);
                if d.model == "Comment" {
                    d.args["body"] = json!(d.args["body"].as_str().unwrap_or_default().to_uppercase());
                }
                next.run(d).await
            }
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Update,
        json!({"where": {"id": 1}, "data": {"posts": {"update": {
            "where": {"id": 10},
            "data": {"comments": {"create": [{"body": "a"}, {"body": "b"}]}}
        }}}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1}));

    interceptor
        .execute(descriptor, executor.clone())
        .await
        .unwrap();

    assert_eq!(
        executor.last().unwrap().args["data"]["posts"]["update"]["data"]["comments"]["create"],
        json!([{"body": "A"}, {"body": "B"}])
    );
    assert_eq!(
        log.operations(),
        vec!["Comment.create", "Comment.create", "Post.update", "User.update"]
    );
    let depths: Vec<usize> = log.entries().iter().map(|entry| entry.depth).collect();
    assert!(depths.contains(&2));
}

#[tokio::test]
async fn test_converted_parent_keeps_child_edits() {
    let interceptor = NestedInterceptor::new(
        |mut d: OperationDescriptor, next: Next| async move {
            match (d.model.as_str(), d.action) {
                ("Post", Action::Write(WriteAction::Create)) => {
                    let args = json!({"where": {"id": 0}, "create": d.args.clone(), "update": d.args.clone()});
                    next.run(d.with_action(WriteAction::Upsert, args)).await
                }
                ("Comment", _) => {
                    d.args["approved"] = json!(true);
                    next.run(d).await
                }
                _ => next.run(d).await,
            }
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {"posts": {"create": {"title": "a", "comments": {"create": {"body": "x"}}}}}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1}));

    interceptor
        .execute(descriptor, executor.clone())
        .await
        .unwrap();

    let record = json!({"title": "a", "comments": {"create": {"body": "x", "approved": true}}});
    assert_eq!(
        executor.last().unwrap().args,
        json!({"data": {"posts": {"upsert": {"where": {"id": 0}, "create": record.clone(), "update": record}}}})
    );
}

#[tokio::test]
async fn test_nested_write_result_post_processed() {
    let interceptor = NestedInterceptor::new(
        |d: OperationDescriptor, next: Next| async move {
            let is_post = d.model == "Post";
            let mut result = next.run(d).await?;
            if is_post {
                if let Value::Array(posts) = &mut result {
                    for post in posts {
                        post["seen"] = json!(true);
                    }
                }
            }
            Ok(result)
        },
        Arc::new(blog_schema()),
    );
    let descriptor = OperationDescriptor::new(
        "User",
        WriteAction::Create,
        json!({"data": {"posts": {"create": {"title": "a"}}}, "include": {"posts": true}}),
    );
    let executor = RecordingExecutor::new(json!({"id": 1, "posts": [{"id": 10, "title": "a"}]}));

    let result = interceptor.execute(descriptor, executor).await.unwrap();

    assert_eq!(
        result,
        json!({"id": 1, "posts": [{"id": 10, "title": "a", "seen": true}]})
    );
}

proptest! {
    #[test]
    fn prop_indexed_creates_round_trip(titles in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
        let records: Vec<Value> = titles.iter().map(|title| json!({"title": title})).collect();
        let descriptor = OperationDescriptor::new(
            "User",
            WriteAction::Create,
            json!({"data": {"posts": {"create": records}}}),
        );

        let seeds = Extractor::new(Arc::new(blog_schema())).extract(&descriptor).unwrap();
        prop_assert_eq!(seeds.len(), titles.len());
        for (position, seed) in seeds.iter().enumerate() {
            prop_assert_eq!(seed.target.index(), Some(position));
        }

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let executor = RecordingExecutor::new(json!({"id": 1}));
        runtime
            .block_on(passthrough().execute(descriptor.clone(), executor.clone()))
            .unwrap();
        prop_assert_eq!(executor.last(), Some(descriptor));
    }
}
