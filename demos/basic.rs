//! Minimal httpmid example: three middlewares around one handler.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/hello
//!   curl -i -H 'authorization: Bearer demo' http://localhost:3000/hello

use std::time::Instant;

use httpmid::{BoxedHandler, HeaderValue, Middleware, Request, Response, Server, StatusCode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Outermost first: timing sees the full latency, auth runs before the
    // handler, and the request id is set on every response.
    let app = httpmid::compose!(timing, request_id, require_bearer).then(hello);

    Server::bind(([0, 0, 0, 0], 3000))
        .serve(app)
        .await
        .expect("server error");
}

fn timing(next: BoxedHandler) -> BoxedHandler {
    BoxedHandler::new(move |req: Request| {
        let next = next.clone();
        async move {
            let started = Instant::now();
            let (method, path) = (req.method().clone(), req.path().to_owned());
            let res = next.call(req).await;
            tracing::info!(%method, %path, status = %res.status_code(), elapsed = ?started.elapsed(), "request");
            res
        }
    })
}

fn request_id(next: BoxedHandler) -> BoxedHandler {
    BoxedHandler::new(move |req: Request| {
        let next = next.clone();
        async move {
            let id = req
                .headers()
                .get("x-request-id")
                .cloned()
                .unwrap_or(HeaderValue::from_static("generated"));
            let mut res = next.call(req).await;
            res.headers_mut().insert("x-request-id", id);
            res
        }
    })
}

// Short-circuits: the handler never runs without a bearer token.
fn require_bearer(next: BoxedHandler) -> BoxedHandler {
    BoxedHandler::new(move |req: Request| {
        let next = next.clone();
        async move {
            let authorized = req
                .header("authorization")
                .is_some_and(|v| v.starts_with("Bearer "));
            if !authorized {
                return Response::status(StatusCode::UNAUTHORIZED);
            }
            next.call(req).await
        }
    })
}

async fn hello(req: Request) -> Response {
    Response::text(format!("hello from {}", req.path()))
}
