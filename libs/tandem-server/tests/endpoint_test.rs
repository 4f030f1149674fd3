//! End-to-end behavior of directly registered endpoints, exercised through
//! an axum router with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::response::IntoResponse;
use axum::Router;
use http::{Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;

use tandem_server::{typed, ApiResponse, Builder, JsonObject, Outcome, StepArgs};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[derive(Debug, Serialize, Deserialize)]
struct NewPost {
    title: String,
    author: Author,
}

#[derive(Debug, Serialize, Deserialize)]
struct Author {
    id: u64,
}

#[tokio::test]
async fn first_halting_step_wins_and_later_steps_never_run() {
    let app = Builder::new()
        .path("/guarded")
        .middleware(|_args: StepArgs| async move {
            Ok(Outcome::Halt(ApiResponse::new(
                "unauthorized",
                StatusCode::UNAUTHORIZED,
                json!({ "message": "no session" }),
            )))
        })
        .middleware(|_args: StepArgs| async move {
            Ok(Outcome::Halt(ApiResponse::new(
                "payment-required",
                StatusCode::PAYMENT_REQUIRED,
                json!({}),
            )))
        })
        .get(|_args| async move { Ok(ApiResponse::success(json!({ "reached": true }))) })
        .register(Router::new());

    let response = app.oneshot(get("/guarded")).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["result"], "unauthorized");
    assert_eq!(body["message"], "no session");
    assert!(body.get("statusCode").is_none());
}

#[tokio::test]
async fn later_steps_see_and_override_earlier_data() {
    let app = Builder::new()
        .path("/merge")
        .middleware(|_args: StepArgs| async move {
            let mut patch = JsonObject::new();
            patch.insert("who".into(), json!("first"));
            patch.insert("keep".into(), json!("kept"));
            Ok(Outcome::Proceed(patch))
        })
        .middleware(|args: StepArgs| async move {
            assert_eq!(args.field("who"), Some(&json!("first")));
            let mut patch = JsonObject::new();
            patch.insert("who".into(), json!("second"));
            Ok(Outcome::Proceed(patch))
        })
        .get(|args| async move {
            Ok(ApiResponse::success(json!({
                "who": args.field("who"),
                "keep": args.field("keep"),
            })))
        })
        .register(Router::new());

    let body = body_json(app.oneshot(get("/merge")).await.expect("response")).await;
    assert_eq!(body["result"], "success");
    assert_eq!(body["who"], "second");
    assert_eq!(body["keep"], "kept");
}

#[tokio::test]
async fn invalid_body_yields_422_with_field_paths() {
    let app = Builder::new()
        .path("/posts")
        .body_schema(typed::<NewPost>())
        .post(|_args| async move { Ok(ApiResponse::success(json!({}))) })
        .register(Router::new());

    let request = post_json("/posts", json!({ "title": "hi", "author": { "id": "seven" } }));
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["result"], "validation-error");
    assert_eq!(
        body["message"],
        "We found some incorrect field(s) during validating the form."
    );
    let issues = body["issues"].as_array().expect("issues array");
    assert!(!issues.is_empty());
    assert_eq!(issues[0]["path"], json!(["author", "id"]));
}

#[tokio::test]
async fn valid_body_lands_in_the_body_field() {
    let app = Builder::new()
        .path("/posts")
        .body_schema(typed::<NewPost>())
        .post(|args: StepArgs| async move {
            let title = args
                .field("body")
                .and_then(|body| body.get("title"))
                .cloned();
            Ok(ApiResponse::success(json!({ "title": title })))
        })
        .register(Router::new());

    let request = post_json("/posts", json!({ "title": "hello", "author": { "id": 7 } }));
    let body = body_json(app.oneshot(request).await.expect("response")).await;
    assert_eq!(body["result"], "success");
    assert_eq!(body["title"], "hello");
}

#[tokio::test]
async fn query_and_params_are_validated_from_the_url() {
    #[derive(Debug, Serialize, Deserialize)]
    struct Page {
        page: String,
    }
    #[derive(Debug, Serialize, Deserialize)]
    struct UserId {
        id: String,
    }

    let app = Builder::new()
        .path("/users/:id")
        .params_schema(typed::<UserId>())
        .query_schema(typed::<Page>())
        .get(|args: StepArgs| async move {
            Ok(ApiResponse::success(json!({
                "id": args.field("params").and_then(|p| p.get("id")),
                "page": args.field("query").and_then(|q| q.get("page")),
            })))
        })
        .register(Router::new());

    let body = body_json(app.oneshot(get("/users/42?page=3")).await.expect("response")).await;
    assert_eq!(body["result"], "success");
    assert_eq!(body["id"], "42");
    assert_eq!(body["page"], "3");
}

#[tokio::test]
async fn step_fault_runs_the_default_error_handler() {
    let app = Builder::new()
        .path("/broken")
        .middleware(|_args: StepArgs| async move {
            Err(anyhow::anyhow!("database connection refused"))
        })
        .get(|_args| async move { Ok(ApiResponse::success(json!({}))) })
        .register(Router::new());

    let response = app.oneshot(get("/broken")).await.expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["result"], "unexpected-error");
    assert_eq!(body["message"], "Something went wrong. Please try again later.");
    // the fault detail must not leak
    assert!(!body.to_string().contains("database"));
}

#[tokio::test]
async fn injected_error_handler_replaces_the_default() {
    let app = Builder::new()
        .path("/broken")
        .middleware(|_args: StepArgs| async move { Err(anyhow::anyhow!("boom")) })
        .on_error(|error: &anyhow::Error, _ctx: &tandem_server::RequestContext| {
            ApiResponse::new(
                "teapot",
                StatusCode::IM_A_TEAPOT,
                json!({ "detail": error.to_string() }),
            )
        })
        .get(|_args| async move { Ok(ApiResponse::success(json!({}))) })
        .register(Router::new());

    let response = app.oneshot(get("/broken")).await.expect("response");
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    let body = body_json(response).await;
    assert_eq!(body["result"], "teapot");
    assert_eq!(body["detail"], "boom");
}

#[tokio::test]
async fn panicking_injected_handler_falls_back_to_the_default() {
    let app = Builder::new()
        .path("/broken")
        .middleware(|_args: StepArgs| async move { Err(anyhow::anyhow!("boom")) })
        .on_error(
            |_error: &anyhow::Error, _ctx: &tandem_server::RequestContext| -> ApiResponse {
                panic!("handler exploded")
            },
        )
        .get(|_args| async move { Ok(ApiResponse::success(json!({}))) })
        .register(Router::new());

    let response = app.oneshot(get("/broken")).await.expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["result"], "unexpected-error");
    assert_eq!(body["message"], "Something went wrong. Please try again later.");
}

#[tokio::test]
async fn panicking_step_is_contained_as_unexpected_error() {
    let app = Builder::new()
        .path("/panics")
        .middleware(|args: StepArgs| async move {
            if args.field("never").is_none() {
                panic!("index out of bounds somewhere deep");
            }
            Ok(Outcome::proceed_empty())
        })
        .get(|_args| async move { Ok(ApiResponse::success(json!({}))) })
        .register(Router::new());

    let response = app.oneshot(get("/panics")).await.expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["result"], "unexpected-error");
}

#[tokio::test]
async fn raw_terminal_bypasses_the_envelope_and_sees_chain_data() {
    let app = Builder::new()
        .path("/report")
        .middleware(|_args: StepArgs| async move {
            let mut patch = JsonObject::new();
            patch.insert("rows".into(), json!(3));
            Ok(Outcome::Proceed(patch))
        })
        .get_raw(|outcome, _ctx| async move {
            let rows = match &outcome {
                Outcome::Proceed(data) => data.get("rows").and_then(Value::as_u64).unwrap_or(0),
                Outcome::Halt(_) => 0,
            };
            Ok((
                StatusCode::OK,
                [("content-type", "text/csv")],
                format!("rows\n{rows}\n"),
            )
                .into_response())
        })
        .register(Router::new());

    let response = app.oneshot(get("/report")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv"
    );
    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"rows\n3\n");
}

#[tokio::test]
async fn raw_terminal_receives_halts_instead_of_auto_serialization() {
    let app = Builder::new()
        .path("/report")
        .middleware(|_args: StepArgs| async move {
            Ok(Outcome::Halt(ApiResponse::new(
                "unauthorized",
                StatusCode::UNAUTHORIZED,
                json!({}),
            )))
        })
        .get_raw(|outcome, _ctx| async move {
            let status = match outcome {
                Outcome::Halt(response) => response.status(),
                Outcome::Proceed(_) => StatusCode::OK,
            };
            Ok((status, "denied, in plain text").into_response())
        })
        .register(Router::new());

    let response = app.oneshot(get("/report")).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let bytes = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"denied, in plain text");
}

#[tokio::test]
async fn second_schema_for_the_same_slot_sees_the_first_result() {
    #[derive(Debug, Serialize, Deserialize)]
    struct Who {
        name: String,
    }
    #[derive(Debug, Serialize, Deserialize)]
    struct HowOld {
        age: u32,
    }

    let app = Builder::new()
        .path("/people")
        .body_schema(typed::<Who>())
        .body_schema(typed::<HowOld>())
        .post(|args: StepArgs| async move {
            Ok(ApiResponse::success(json!({ "body": args.field("body") })))
        })
        .register(Router::new());

    let request = post_json("/people", json!({ "name": "Ada", "age": 36 }));
    let body = body_json(app.oneshot(request).await.expect("response")).await;
    // both parses contribute to the accumulated body field
    assert_eq!(body["body"]["name"], "Ada");
    assert_eq!(body["body"]["age"], 36);
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_the_chain() {
    let app = Builder::new()
        .path("/posts")
        .body_schema(typed::<NewPost>())
        .post(|_args| async move { Ok(ApiResponse::success(json!({}))) })
        .register(Router::new());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/posts")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["result"], "bad-request");
}
