//! Adapters turning user functions into handlers the runtime loop can drive.
//!
//! The loop awaits the handler before it reports and fetches again, so only one
//! invocation is ever in flight, whichever adapter is used.

use crate::context::Context;
use crate::document::Document;
use crate::error::BoxError;
use serde::Serialize;
use std::any::Any;
use std::future::{self, Future};
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::oneshot;

/// A function invoked once per event.
pub trait Handler {
    /// Must serialize to a JSON object, anything else fails the invocation
    type Response: Serialize;

    fn call(&mut self, ctx: &Context, event: Document) -> impl Future<Output = Result<Self::Response, BoxError>>;
}

/// A handler that returns its response directly.
pub struct FnHandler<F> {
    f: F,
}

/// Wraps a synchronous function. Panics are turned into handler errors.
pub fn handler_fn<F, R, E>(f: F) -> FnHandler<F>
where
    F: FnMut(&Context, Document) -> Result<R, E>,
    R: Serialize,
    E: Into<BoxError>,
{
    FnHandler { f }
}

impl<F, R, E> Handler for FnHandler<F>
where
    F: FnMut(&Context, Document) -> Result<R, E>,
    R: Serialize,
    E: Into<BoxError>,
{
    type Response = R;

    fn call(&mut self, ctx: &Context, event: Document) -> impl Future<Output = Result<R, BoxError>> {
        let result = match catch_unwind(AssertUnwindSafe(|| (self.f)(ctx, event))) {
            Ok(result) => result.map_err(Into::into),
            Err(panic) => Err(panic_error(panic)),
        };
        future::ready(result)
    }
}

/// Delivers the outcome of a callback-style handler back to the runtime loop.
///
/// It is consumed by `succeed`, `fail` or `complete`, so it can fire at most once.
/// Dropping it without firing fails the invocation.
#[derive(Debug)]
pub struct Completion<R> {
    tx: oneshot::Sender<Result<R, BoxError>>,
}

impl<R> Completion<R> {
    pub fn succeed(self, response: R) {
        self.complete(Ok(response))
    }

    pub fn fail(self, error: impl Into<BoxError>) {
        self.complete(Err(error.into()))
    }

    pub fn complete(self, result: Result<R, BoxError>) {
        // the receiver only goes away if the runtime itself is gone
        let _ = self.tx.send(result);
    }
}

/// A handler that reports its outcome through a [`Completion`], possibly from another
/// task or thread.
pub struct CallbackHandler<F, R> {
    f: F,
    _response: PhantomData<fn(R)>,
}

/// Wraps a callback-style function. The loop waits until the completion fires.
pub fn callback_fn<F, R>(f: F) -> CallbackHandler<F, R>
where
    F: FnMut(&Context, Document, Completion<R>),
    R: Serialize,
{
    CallbackHandler {
        f,
        _response: PhantomData,
    }
}

impl<F, R> Handler for CallbackHandler<F, R>
where
    F: FnMut(&Context, Document, Completion<R>),
    R: Serialize,
{
    type Response = R;

    fn call(&mut self, ctx: &Context, event: Document) -> impl Future<Output = Result<R, BoxError>> {
        let (tx, rx) = oneshot::channel();
        let started = catch_unwind(AssertUnwindSafe(|| (self.f)(ctx, event, Completion { tx })));

        async move {
            started.map_err(panic_error)?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(BoxError::from("handler dropped its completion without responding")),
            }
        }
    }
}

/// A handler returning a future, e.g. an `async fn`.
pub struct AsyncHandler<F> {
    f: F,
}

/// Wraps an async function. It gets its own copy of the context so the future can be `'static`.
pub fn async_handler_fn<F, Fut, R, E>(f: F) -> AsyncHandler<F>
where
    F: FnMut(Context, Document) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: Serialize,
    E: Into<BoxError>,
{
    AsyncHandler { f }
}

impl<F, Fut, R, E> Handler for AsyncHandler<F>
where
    F: FnMut(Context, Document) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: Serialize,
    E: Into<BoxError>,
{
    type Response = R;

    fn call(&mut self, ctx: &Context, event: Document) -> impl Future<Output = Result<R, BoxError>> {
        let fut = (self.f)(ctx.clone(), event);
        async move { fut.await.map_err(Into::into) }
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> BoxError {
    let msg = if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    };
    BoxError::from(format!("handler panicked: {msg}"))
}
