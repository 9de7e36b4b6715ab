//! # httpmid
//!
//! Compose HTTP middlewares into one handler. Nothing more.
//!
//! A middleware is a plain function from handler to handler. [`compose!`]
//! (or [`compose`] for runtime-built lists) stacks any number of them into a
//! single [`Chain`], which is itself a middleware:
//!
//! ```text
//! compose!(m1, m2, m3).then(h)   ≡   m1(m2(m3(h)))
//! ```
//!
//! The **first** middleware listed is the **outermost**. On a request, the
//! "before" logic runs m1 → m2 → m3, then `h`, then the "after" logic
//! unwinds m3 → m2 → m1.
//!
//! What httpmid intentionally leaves to you:
//!
//! - **Routing**: dispatch inside your terminal handler or use a router crate
//! - **Built-in middlewares**: auth, logging, recovery are yours to write
//! - **Failure recovery**: a middleware that wants to survive an inner
//!   failure handles it around its own `next.call(req)`
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use httpmid::{compose, BoxedHandler, HeaderValue, Middleware, Request, Response, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = compose!(request_log, server_header).then(hello);
//!
//!     Server::bind(([0, 0, 0, 0], 3000)).serve(app).await.unwrap();
//! }
//!
//! fn request_log(next: BoxedHandler) -> BoxedHandler {
//!     BoxedHandler::new(move |req: Request| {
//!         let next = next.clone();
//!         async move {
//!             let path = req.path().to_owned();
//!             let res = next.call(req).await;
//!             tracing::info!(%path, status = %res.status_code(), "served");
//!             res
//!         }
//!     })
//! }
//!
//! fn server_header(next: BoxedHandler) -> BoxedHandler {
//!     BoxedHandler::new(move |req: Request| {
//!         let next = next.clone();
//!         async move {
//!             let mut res = next.call(req).await;
//!             res.headers_mut().append("server", HeaderValue::from_static("httpmid"));
//!             res
//!         }
//!     })
//! }
//!
//! async fn hello(_req: Request) -> Response {
//!     Response::text("hello")
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use http::{HeaderMap, HeaderValue, StatusCode};
pub use middleware::{compose, BoxedMiddleware, Chain, Middleware};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use server::Server;
