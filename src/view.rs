//! Handler adapter rendering returned context mappings.
//!
//! [`templated`] wraps an async handler so that the mapping it returns is
//! rendered into a named template and answered as an HTML response:
//!
//! ```rust,ignore
//! use vellum::{templated, ContextMap, RenderContext};
//!
//! async fn index(ctx: RenderContext) -> ContextMap {
//!     ctx.flash().success("Welcome back");
//!     ContextMap::new().with("greetings", "Hello")
//! }
//!
//! let app = Router::new().route("/", get(templated("index.html", index)));
//! ```
//!
//! The wrapped handler always receives a [`RenderContext`] as its first
//! parameter; any further parameters are ordinary axum extractors. This fixes
//! the calling convention up front instead of inspecting argument shapes at
//! call time. A handler that already produced a full [`Response`] bypasses
//! templating entirely; returning `()` renders with an empty context.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{FromRequestParts, Request},
    handler::Handler,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use minijinja::value::Value;
use serde::Serialize;

use crate::context::{ContextMap, RenderContext};
use crate::error::{Error, Result};
use crate::render::html_response;

/// Outcome of a templated handler.
#[derive(Debug)]
pub enum ViewResult {
    /// A context value to render into the wrapped template.
    Context(Value),
    /// A complete response, passed through unchanged.
    Response(Response),
}

impl ViewResult {
    /// Render the wrapped template with a serializable context.
    ///
    /// The value must serialize to a mapping; anything else fails the render
    /// with a server error naming the offending kind.
    #[must_use]
    pub fn context(data: impl Serialize) -> Self {
        Self::Context(Value::from_serialize(data))
    }

    /// Render the wrapped template with an empty context.
    #[must_use]
    pub fn empty() -> Self {
        Self::Context(Value::UNDEFINED)
    }
}

impl From<Response> for ViewResult {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<ContextMap> for ViewResult {
    fn from(context: ContextMap) -> Self {
        Self::Context(Value::from_serialize(context))
    }
}

/// Conversion of handler return values into a [`ViewResult`].
pub trait IntoViewResult {
    /// Perform the conversion.
    ///
    /// # Errors
    ///
    /// Returns an error when the handler outcome itself is an error.
    fn into_view_result(self) -> Result<ViewResult>;
}

impl IntoViewResult for ViewResult {
    fn into_view_result(self) -> Result<ViewResult> {
        Ok(self)
    }
}

impl IntoViewResult for ContextMap {
    fn into_view_result(self) -> Result<ViewResult> {
        Ok(self.into())
    }
}

impl IntoViewResult for Response {
    fn into_view_result(self) -> Result<ViewResult> {
        Ok(self.into())
    }
}

impl IntoViewResult for () {
    fn into_view_result(self) -> Result<ViewResult> {
        Ok(ViewResult::empty())
    }
}

impl<T> IntoViewResult for Option<T>
where
    T: IntoViewResult,
{
    fn into_view_result(self) -> Result<ViewResult> {
        match self {
            Some(value) => value.into_view_result(),
            None => Ok(ViewResult::empty()),
        }
    }
}

impl<T> IntoViewResult for Result<T>
where
    T: IntoViewResult,
{
    fn into_view_result(self) -> Result<ViewResult> {
        self?.into_view_result()
    }
}

/// Wrap a handler so its returned mapping is rendered into `template`.
///
/// See the [module documentation](self) for the handler shape.
pub fn templated<H>(template: impl Into<Cow<'static, str>>, handler: H) -> Templated<H> {
    Templated {
        template: template.into(),
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        handler,
    }
}

/// Handler produced by [`templated`].
#[derive(Clone)]
pub struct Templated<H> {
    template: Cow<'static, str>,
    status: StatusCode,
    headers: HeaderMap,
    handler: H,
}

impl<H> Templated<H> {
    /// Set the status code of rendered responses.
    ///
    /// Pass-through responses keep their own status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header to rendered responses.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

async fn respond(
    ctx: &RenderContext,
    template: &str,
    status: StatusCode,
    headers: &HeaderMap,
    outcome: impl IntoViewResult,
) -> Result<Response> {
    let value = match outcome.into_view_result()? {
        ViewResult::Response(response) => return Ok(response),
        ViewResult::Context(value) => value,
    };
    if !ctx.engine().has_template(template) {
        return Err(Error::TemplateNotFound(template.to_string()));
    }
    let context = ContextMap::from_value(value)?;
    let body = ctx.render_string_async(template, context).await?;
    Ok(html_response(body, status, headers))
}

macro_rules! impl_templated_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, Fut, R, S, $($ty,)*> Handler<(R, $($ty,)*), S> for Templated<F>
        where
            F: FnOnce(RenderContext, $($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoViewResult + Send + 'static,
            S: Send + Sync + 'static,
            $($ty: FromRequestParts<S> + Send + 'static,)*
        {
            type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

            fn call(self, req: Request, state: S) -> Self::Future {
                Box::pin(async move {
                    let (mut parts, _body) = req.into_parts();
                    let ctx = match RenderContext::from_request_parts(&mut parts, &state).await {
                        Ok(ctx) => ctx,
                        Err(err) => return err.into_response(),
                    };
                    $(
                        let $ty = match $ty::from_request_parts(&mut parts, &state).await {
                            Ok(value) => value,
                            Err(rejection) => return rejection.into_response(),
                        };
                    )*
                    let outcome = (self.handler)(ctx.clone(), $($ty,)*).await;
                    match respond(&ctx, &self.template, self.status, &self.headers, outcome).await {
                        Ok(response) => response,
                        Err(err) => err.into_response(),
                    }
                })
            }
        }
    };
}

impl_templated_handler!();
impl_templated_handler!(T1);
impl_templated_handler!(T1, T2);
impl_templated_handler!(T1, T2, T3);
impl_templated_handler!(T1, T2, T3, T4);
impl_templated_handler!(T1, T2, T3, T4, T5);
