//! End-to-end lifecycle scenarios driven through the HTTP surface

mod common;

use actix_web::test;
use serde_json::{json, Value};

use common::TestContext;

fn create_body() -> Value {
    json!({
        "model": {"url": "http://m", "name": "m"},
        "benchmarks": [
            {"id": "arc_easy", "provider_id": "lm_evaluation_harness"}
        ]
    })
}

async fn create_job<S, B>(app: &S) -> Value
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
    B::Error: std::fmt::Debug,
{
    let req = test::TestRequest::post()
        .uri("/api/v1/evaluations/jobs")
        .set_json(create_body())
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status().as_u16(), 202);
    test::read_body_json(resp).await
}

async fn get_job<S, B>(app: &S, id: &str) -> Value
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
    B::Error: std::fmt::Debug,
{
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/evaluations/jobs/{id}"))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status().as_u16(), 200);
    test::read_body_json(resp).await
}

async fn post_event<S, B>(app: &S, id: &str, event: Value) -> u16
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
    B::Error: std::fmt::Debug,
{
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/evaluations/jobs/{id}/events"))
        .set_json(json!({"benchmark_status_event": event}))
        .to_request();
    test::call_service(app, req).await.status().as_u16()
}

#[actix_web::test]
async fn test_create_and_run_to_completion() {
    let ctx = TestContext::new().await;
    let app = test_app!(&ctx);

    let created = create_job(&app).await;
    let id = created["id"].as_str().expect("resource id").to_string();
    assert_eq!(created["status"]["state"], "pending");

    // Fire-and-forget dispatch reaches the runtime.
    for _ in 0..50 {
        if !ctx.dispatched.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(ctx.dispatched.lock().unwrap().as_slice(), &[id.clone()]);

    let status = post_event(
        &app,
        &id,
        json!({
            "provider_id": "lm_evaluation_harness",
            "id": "arc_easy",
            "status": "running",
            "started_at": "2025-01-01T00:00:00Z"
        }),
    )
    .await;
    assert_eq!(status, 204);

    let job = get_job(&app, &id).await;
    assert_eq!(job["status"]["state"], "running");
    assert_eq!(
        job["status"]["benchmarks"][0]["started_at"],
        "2025-01-01T00:00:00Z"
    );

    let status = post_event(
        &app,
        &id,
        json!({
            "provider_id": "lm_evaluation_harness",
            "id": "arc_easy",
            "status": "completed",
            "completed_at": "2025-01-01T00:05:00Z",
            "metrics": {"acc": 0.85}
        }),
    )
    .await;
    assert_eq!(status, 204);

    let job = get_job(&app, &id).await;
    assert_eq!(job["status"]["state"], "completed");
    assert_eq!(job["results"]["benchmarks"][0]["metrics"]["acc"], 0.85);
    assert_eq!(job["results"]["completed_evaluations"], 1);
    assert_eq!(job["results"]["total_evaluations"], 1);
}

#[actix_web::test]
async fn test_partial_failure() {
    let ctx = TestContext::new().await;
    let app = test_app!(&ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/evaluations/jobs")
        .set_json(json!({
            "model": {"url": "http://m", "name": "m"},
            "benchmarks": [
                {"id": "arc_easy", "provider_id": "lm_evaluation_harness"},
                {"id": "hellaswag", "provider_id": "lm_evaluation_harness"}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 202);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();

    assert_eq!(
        post_event(
            &app,
            &id,
            json!({
                "provider_id": "lm_evaluation_harness",
                "id": "arc_easy",
                "status": "completed",
                "completed_at": "2025-01-01T00:05:00Z"
            })
        )
        .await,
        204
    );
    assert_eq!(
        post_event(
            &app,
            &id,
            json!({
                "provider_id": "lm_evaluation_harness",
                "id": "hellaswag",
                "status": "failed",
                "completed_at": "2025-01-01T00:06:00Z",
                "error_message": {"message": "oom", "code": "OOM"}
            })
        )
        .await,
        204
    );

    let job = get_job(&app, &id).await;
    assert_eq!(job["status"]["state"], "partially_failed");
    assert!(job["status"]["message"].as_str().unwrap().contains("oom"));
    assert_eq!(job["results"]["completed_evaluations"], 1);
    assert_eq!(job["results"]["failed_evaluations"], 1);
}

#[actix_web::test]
async fn test_idempotent_callback() {
    let ctx = TestContext::new().await;
    let app = test_app!(&ctx);

    let created = create_job(&app).await;
    let id = created["id"].as_str().unwrap().to_string();

    let completed = json!({
        "provider_id": "lm_evaluation_harness",
        "id": "arc_easy",
        "status": "completed",
        "completed_at": "2025-01-01T00:05:00Z",
        "metrics": {"acc": 0.85}
    });

    assert_eq!(post_event(&app, &id, completed.clone()).await, 204);
    let first = get_job(&app, &id).await;

    assert_eq!(post_event(&app, &id, completed).await, 204);
    let second = get_job(&app, &id).await;

    // Counters advance exactly once; metrics unchanged on the second apply.
    assert_eq!(second["results"]["completed_evaluations"], 1);
    assert_eq!(second["results"]["total_evaluations"], 1);
    assert_eq!(first["results"], second["results"]);
    assert_eq!(first["status"], second["status"]);
}

#[actix_web::test]
async fn test_unknown_benchmark_event_leaves_job_untouched() {
    let ctx = TestContext::new().await;
    let app = test_app!(&ctx);

    let created = create_job(&app).await;
    let id = created["id"].as_str().unwrap().to_string();

    let before = get_job(&app, &id).await;

    let status = post_event(
        &app,
        &id,
        json!({
            "provider_id": "lm_evaluation_harness",
            "id": "not_in_config",
            "status": "running"
        }),
    )
    .await;
    assert_eq!(status, 404);

    let after = get_job(&app, &id).await;
    assert_eq!(before["status"], after["status"]);
    assert_eq!(before["results"], after["results"]);
    assert_eq!(before["updated_at"], after["updated_at"]);
}

#[actix_web::test]
async fn test_unknown_job_event_returns_404() {
    let ctx = TestContext::new().await;
    let app = test_app!(&ctx);

    let status = post_event(
        &app,
        "does-not-exist",
        json!({
            "provider_id": "lm_evaluation_harness",
            "id": "arc_easy",
            "status": "running"
        }),
    )
    .await;
    assert_eq!(status, 404);
}

#[actix_web::test]
async fn test_malformed_event_rejected() {
    let ctx = TestContext::new().await;
    let app = test_app!(&ctx);

    let created = create_job(&app).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Unknown state string.
    let status = post_event(
        &app,
        &id,
        json!({
            "provider_id": "lm_evaluation_harness",
            "id": "arc_easy",
            "status": "warming_up"
        }),
    )
    .await;
    assert_eq!(status, 400);

    // Missing provider_id fails JSON deserialization.
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/evaluations/jobs/{id}/events"))
        .set_json(json!({
            "benchmark_status_event": {"id": "arc_easy", "status": "running"}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
