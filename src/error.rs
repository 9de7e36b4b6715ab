//! Unified error type.

use std::net::SocketAddr;

/// The error type returned by httpmid's fallible operations.
///
/// Composing middlewares cannot fail, and failures inside handlers are
/// expressed as [`Response`](crate::Response) values. This type only
/// surfaces infrastructure failures of the bundled [`Server`](crate::Server).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
