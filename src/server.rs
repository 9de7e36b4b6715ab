//! HTTP server and graceful shutdown.
//!
//! The server knows nothing about routing or middleware. It drives exactly
//! one [`BoxedHandler`], usually the result of composing a chain around a
//! terminal handler, and invokes it concurrently for every request.
//!
//! # Graceful shutdown
//!
//! On the shutdown signal the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Tells every open connection to finish its in-flight request and close.
//!    Idle keep-alive connections close at once.
//! 3. Waits for those connection tasks, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use httpmid::Server;
    /// let server = Server::bind(([127, 0, 0, 1], 3000));
    /// # drop(server);
    /// ```
    pub fn bind(addr: impl Into<SocketAddr>) -> Self {
        Self { addr: addr.into() }
    }

    /// Serves `handler` until SIGTERM or Ctrl-C, then drains connections.
    pub async fn serve(self, handler: impl Handler) -> Result<(), Error> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Serves `handler` until `signal` resolves, then drains connections.
    pub async fn serve_with_shutdown<S>(self, handler: impl Handler, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| Error::Bind { addr: self.addr, source })?;

        let handler = handler.into_boxed_handler();

        info!(addr = %self.addr, "httpmid listening");

        let mut tasks = JoinSet::new();

        // Every connection task holds a receiver. Sending on it asks each
        // connection to finish its current request and close.
        let (drain, _) = watch::channel(());

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown is checked first so a pending signal wins over
                // queued connections.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    tasks.spawn(serve_connection(
                        handler.clone(),
                        TokioIo::new(stream),
                        remote_addr,
                        drain.subscribe(),
                    ));
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => log_join(res),
            }
        }

        drop(listener);
        drain.send_replace(());

        while let Some(res) = tasks.join_next().await {
            log_join(res);
        }

        info!("httpmid stopped");
        Ok(())
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

/// Drives one connection until the peer closes it or a drain is requested.
///
/// On drain, hyper finishes any in-flight request, then closes the
/// connection. Idle keep-alive connections close right away.
async fn serve_connection(
    handler: BoxedHandler,
    io: TokioIo<TcpStream>,
    peer: SocketAddr,
    mut drain: watch::Receiver<()>,
) {
    // Called once per request on the connection.
    let svc = service_fn(move |req: hyper::Request<Incoming>| dispatch(handler.clone(), req));

    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        // `Err` means the server is gone; drain in that case too.
        _ = drain.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = res {
        error!(%peer, "connection error: {e}");
    }
}

/// A connection task that panicked (a handler or middleware panic unwinds to
/// here) is reported rather than silently reaped.
fn log_join(res: Result<(), JoinError>) {
    if let Err(e) = res {
        error!(panic = e.is_panic(), "connection task failed: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body and hands the request to the handler.
///
/// Never returns `Err`: a body that cannot be read becomes `400 Bad Request`.
async fn dispatch<B>(
    handler: BoxedHandler,
    req: http::Request<B>,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = %parts.uri.path(), "failed to read request body: {e}");
            return Ok(Response::status(http::StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let response = handler.call(Request::from_parts(parts, body)).await;
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C
/// is available.
///
/// A listener that fails to install is logged and then never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
