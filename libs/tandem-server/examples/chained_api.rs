//! A small user API served both as plain REST routes and through the wire
//! dispatcher.
//!
//! Run with `cargo run -p tandem-server --example chained_api`, then:
//!
//! ```text
//! curl 'localhost:3000/rpc?data={"segments":["user","get"],"argument":{"params":{"id":"1"}}}'
//! curl 'localhost:3000/users/1'
//! ```

use axum::Router;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use tandem_server::{
    mount, typed, ApiResponse, Builder, DataToken, JsonObject, Outcome, Routes, StepArgs,
};

#[derive(Debug, Serialize, Deserialize)]
struct IdParam {
    id: String,
}

const AUTH: DataToken = DataToken("auth");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tandem_server=debug".into()),
        )
        .init();

    // Reusable auth link: reads the authorization header, halts with 401
    // when it is missing, otherwise contributes `auth` to the chain data.
    let authenticated = Builder::new()
        .middleware(|args: StepArgs| async move {
            match args.ctx.header("authorization") {
                Some(token) => {
                    let mut patch = JsonObject::new();
                    patch.insert("auth".into(), json!({ "token": token }));
                    Ok(Outcome::Proceed(patch))
                }
                None => Ok(Outcome::Halt(ApiResponse::new(
                    "unauthorized",
                    StatusCode::UNAUTHORIZED,
                    json!({ "message": "missing authorization header" }),
                ))),
            }
        })
        .responds("unauthorized", StatusCode::UNAUTHORIZED)
        .provides(AUTH)
        .build_link();

    let get_user = Builder::new()
        .path("/users/{id}")
        .params_schema(typed::<IdParam>())
        .get(|args: StepArgs| async move {
            let id = args
                .field("params")
                .and_then(|slot| slot.get("id"))
                .cloned();
            Ok(ApiResponse::success(json!({ "id": id, "name": "Ada" })))
        });

    let whoami = Builder::new()
        .chain(&authenticated)
        .get(|args: StepArgs| async move {
            Ok(ApiResponse::success(json!({ "auth": args.field("auth") })))
        });

    let routes = Routes::new().nest(
        "user",
        Routes::new().at("get", &get_user).at("whoami", &whoami),
    );

    // The same endpoint works registered directly and mounted on the wire.
    let app: Router = mount(get_user.register(Router::new()), "/rpc", routes);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
