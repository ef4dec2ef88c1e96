//! Render helpers producing text and HTML responses.
//!
//! All helpers assemble the reserved context defaults before handing the
//! context to the engine. Response variants answer with
//! `text/html; charset=utf-8`. The async variants suspend only inside the
//! engine's render call, and only when the engine was built with
//! `async_rendering`; otherwise they behave identically to the synchronous
//! path. Failures are surfaced immediately; nothing at this layer retries.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::context::{ContextMap, RenderContext};
use crate::error::Result;

pub(crate) fn html_response(body: String, status: StatusCode, headers: &HeaderMap) -> Response {
    let mut response = (status, Html(body)).into_response();
    for (name, value) in headers {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}

impl RenderContext {
    /// Render a named template to text.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or fails to render.
    pub fn render_string(&self, template: &str, mut context: ContextMap) -> Result<String> {
        self.apply_defaults(&mut context);
        self.engine.render_named(template, &context)
    }

    /// Render a named template to text, suspending during evaluation when the
    /// engine offloads rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or fails to render.
    pub async fn render_string_async(
        &self,
        template: &str,
        mut context: ContextMap,
    ) -> Result<String> {
        self.apply_defaults(&mut context);
        self.engine.render_named_offloaded(template, context).await
    }

    /// Render a named template into an HTML response with status 200.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or fails to render.
    pub fn render(&self, template: &str, context: ContextMap) -> Result<Response> {
        self.render_with(template, context, StatusCode::OK, HeaderMap::new())
    }

    /// Render a named template into an HTML response with explicit status and
    /// extra headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or fails to render.
    pub fn render_with(
        &self,
        template: &str,
        context: ContextMap,
        status: StatusCode,
        headers: HeaderMap,
    ) -> Result<Response> {
        let body = self.render_string(template, context)?;
        Ok(html_response(body, status, &headers))
    }

    /// Async variant of [`render`](Self::render).
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or fails to render.
    pub async fn render_async(&self, template: &str, context: ContextMap) -> Result<Response> {
        self.render_async_with(template, context, StatusCode::OK, HeaderMap::new())
            .await
    }

    /// Async variant of [`render_with`](Self::render_with).
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or fails to render.
    pub async fn render_async_with(
        &self,
        template: &str,
        context: ContextMap,
        status: StatusCode,
        headers: HeaderMap,
    ) -> Result<Response> {
        let body = self.render_string_async(template, context).await?;
        Ok(html_response(body, status, &headers))
    }

    /// Render inline template source to text, without a loader lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to parse or render.
    pub fn render_source(&self, source: &str, mut context: ContextMap) -> Result<String> {
        self.apply_defaults(&mut context);
        self.engine.render_inline(source, &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestInfo;
    use crate::engine::TemplateEngine;
    use crate::error::Error;
    use crate::session::SessionMap;
    use axum::http::{header, HeaderValue};
    use std::sync::Arc;

    fn bound(engine: TemplateEngine, session: Option<SessionMap>) -> RenderContext {
        let info = RequestInfo {
            method: "GET".to_string(),
            uri: "/".to_string(),
            path: "/".to_string(),
            query: None,
            locale: None,
        };
        RenderContext::new(engine, Some(Arc::new(info)), session)
    }

    fn greeting_engine() -> TemplateEngine {
        TemplateEngine::builder()
            .template("index.html", "<p>{{ greetings }}</p>")
            .unwrap()
            .build()
    }

    #[test]
    fn test_render_string() {
        let ctx = bound(greeting_engine(), None);
        let body = ctx
            .render_string("index.html", ContextMap::new().with("greetings", "Hello"))
            .unwrap();
        assert_eq!(body, "<p>Hello</p>");
    }

    #[tokio::test]
    async fn test_render_sets_status_and_content_type() {
        let ctx = bound(greeting_engine(), None);
        let response = ctx
            .render("index.html", ContextMap::new().with("greetings", "Hello"))
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(std::str::from_utf8(&body).unwrap().contains("Hello"));
    }

    #[test]
    fn test_render_with_custom_status_and_headers() {
        let ctx = bound(greeting_engine(), None);
        let mut headers = HeaderMap::new();
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        let response = ctx
            .render_with(
                "index.html",
                ContextMap::new().with("greetings", "Hi"),
                StatusCode::CREATED,
                headers,
            )
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[test]
    fn test_render_source_skips_loader() {
        let ctx = bound(TemplateEngine::builder().build(), None);
        let body = ctx
            .render_source("inline {{ n }}", ContextMap::new().with("n", 1))
            .unwrap();
        assert_eq!(body, "inline 1");
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let ctx = bound(TemplateEngine::builder().build(), None);
        let err = ctx
            .render("nowhere.html", ContextMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(name) if name == "nowhere.html"));
    }

    #[tokio::test]
    async fn test_async_variants_match_sync_output() {
        let engine = TemplateEngine::builder()
            .async_rendering(true)
            .template("index.html", "<p>{{ greetings }}</p>")
            .unwrap()
            .build();
        let ctx = bound(engine, None);
        let body = ctx
            .render_string_async("index.html", ContextMap::new().with("greetings", "Hello"))
            .await
            .unwrap();
        assert_eq!(body, "<p>Hello</p>");

        let response = ctx
            .render_async("index.html", ContextMap::new().with("greetings", "Hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_flash_drains_on_first_render_only() {
        let engine = TemplateEngine::builder()
            .template(
                "flashes.html",
                "{% for message in get_flashed_messages() %}[{{ message }}]{% endfor %}",
            )
            .unwrap()
            .build();
        let session = SessionMap::new();
        let ctx = bound(engine, Some(session));

        ctx.flash().success("saved");
        let first = ctx.render_string("flashes.html", ContextMap::new()).unwrap();
        assert_eq!(first, "[saved]");

        let second = ctx.render_string("flashes.html", ContextMap::new()).unwrap();
        assert_eq!(second, "");
    }
}
