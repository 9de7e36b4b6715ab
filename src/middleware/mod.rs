//! Middleware composition.
//!
//! A middleware is a function from handler to handler: it receives the
//! `next` handler and returns a new one that runs some logic, delegates, and
//! optionally runs more logic on the way back out. That is the whole model.
//!
//! ```text
//! compose!(m1, m2, m3).then(h)   ≡   m1(m2(m3(h)))
//!
//!   request ──▶ m1 ──▶ m2 ──▶ m3 ──▶ h
//!                                    │
//!   response ◀── m1 ◀── m2 ◀── m3 ◀──┘
//! ```
//!
//! The first middleware listed is the **outermost**: its "before" logic runs
//! first and its "after" logic runs last.
//!
//! # Writing a middleware
//!
//! Any `Fn(BoxedHandler) -> BoxedHandler` is a [`Middleware`]:
//!
//! ```rust
//! use httpmid::{BoxedHandler, HeaderValue, Request};
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
//! ```
//!
//! Middlewares hold no state of their own beyond what they capture. Per-request
//! state belongs in [`Request::extensions_mut`](crate::Request::extensions_mut).

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::handler::{BoxedHandler, Handler};

/// A transformation that wraps a handler in another handler.
pub trait Middleware: Send + Sync + 'static {
    /// Wraps `next`, returning the handler that runs this layer's logic.
    fn apply(&self, next: BoxedHandler) -> BoxedHandler;

    /// Converts `handler` and applies this middleware to it.
    fn then<H: Handler>(&self, handler: H) -> BoxedHandler
    where
        Self: Sized,
    {
        self.apply(handler.into_boxed_handler())
    }
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// A shared, type-erased middleware, for lists built at runtime.
pub type BoxedMiddleware = Arc<dyn Middleware>;

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered sequence of middlewares that acts as one middleware.
///
/// Built with [`compose!`](crate::compose!), [`compose`], or
/// [`Chain::with`]. The chain owns its own snapshot of the layers; the
/// collection it was built from is never touched again.
///
/// A `Chain` is itself a [`Middleware`], so chains nest:
/// `compose!(compose!(m1, m2), m3)` behaves exactly like `compose!(m1, m2, m3)`.
///
/// Building a chain costs one `Arc` per layer plus the backing `Vec`, and
/// applying it costs one [`BoxedHandler`] per layer. Both happen once, when
/// the app is assembled; serving a request allocates nothing in the chain
/// itself beyond what each layer's own future does.
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<BoxedMiddleware>,
}

impl Chain {
    /// The empty chain. Applying it returns the handler unchanged.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends `middleware` as the new innermost layer.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Middleware for Chain {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        trace!(layers = self.layers.len(), "wrapping handler in middleware chain");
        // Last layer wraps first, so the first layer ends up outermost.
        self.layers
            .iter()
            .rev()
            .fold(next, |next, layer| layer.apply(next))
    }
}

impl FromIterator<BoxedMiddleware> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self { layers: iter.into_iter().collect() }
    }
}

impl Extend<BoxedMiddleware> for Chain {
    fn extend<I: IntoIterator<Item = BoxedMiddleware>>(&mut self, iter: I) {
        self.layers.extend(iter);
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("layers", &self.layers.len()).finish()
    }
}

/// Combines `middlewares` into one, first element outermost.
///
/// For a fixed list of distinct middleware types, [`compose!`](crate::compose!)
/// is usually more convenient.
///
/// ```rust
/// use std::sync::Arc;
/// use httpmid::{compose, BoxedHandler, BoxedMiddleware, Middleware, Request};
///
/// fn noop(next: BoxedHandler) -> BoxedHandler { next }
///
/// let layers: Vec<BoxedMiddleware> = vec![Arc::new(noop), Arc::new(noop)];
/// let handler = compose(layers.iter().cloned()).then(|_req: Request| async { "ok" });
/// # drop(handler);
/// ```
pub fn compose<I>(middlewares: I) -> Chain
where
    I: IntoIterator<Item = BoxedMiddleware>,
{
    middlewares.into_iter().collect()
}

/// Combines middleware values of any types into a [`Chain`], first argument
/// outermost. `compose!()` is the identity.
///
/// ```rust
/// use httpmid::{BoxedHandler, Middleware, Request};
///
/// fn outer(next: BoxedHandler) -> BoxedHandler { next }
/// fn inner(next: BoxedHandler) -> BoxedHandler { next }
///
/// let app = httpmid::compose!(outer, inner).then(|_req: Request| async { "ok" });
/// # drop(app);
/// ```
#[macro_export]
macro_rules! compose {
    ($($middleware:expr),* $(,)?) => {
        $crate::Chain::new()$(.with($middleware))*
    };
}
