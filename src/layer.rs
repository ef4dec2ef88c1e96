//! Request-lifecycle wiring for the template engine and session context.
//!
//! [`TemplateLayer`] makes the shared [`TemplateEngine`] available to every
//! request and, when a `tower-sessions` session is present, binds the
//! configured record key to a [`SessionMap`] for the duration of the request:
//! loaded before the handler, written back afterwards when it changed. All
//! session I/O happens here; handlers and templates see only the synchronous
//! view.
//!
//! Apply the layer so the session middleware wraps it:
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/", get(index))
//!     .layer(TemplateLayer::new(engine))
//!     .layer(SessionManagerLayer::new(MemoryStore::default()));
//! ```
//!
//! Without a session layer the engine is still injected; flash and session
//! context degrade to their soft no-op behavior.

use std::future::Future;
use std::pin::Pin;

use axum::{body::Body, http::Request, response::Response};
use serde_json::Value as JsonValue;
use tower_sessions::Session;

use crate::config::{default_session_key, TemplatesConfig};
use crate::engine::TemplateEngine;
use crate::session::SessionMap;

/// Layer injecting the template engine and the session-backed template
/// context into requests.
#[derive(Debug, Clone)]
pub struct TemplateLayer {
    engine: TemplateEngine,
    session_key: String,
}

impl TemplateLayer {
    /// Create a layer with the default session record key.
    #[must_use]
    pub fn new(engine: TemplateEngine) -> Self {
        Self {
            engine,
            session_key: default_session_key(),
        }
    }

    /// Create a layer using the session record key from configuration.
    #[must_use]
    pub fn from_config(engine: TemplateEngine, config: &TemplatesConfig) -> Self {
        Self::new(engine).with_session_key(config.session_key.clone())
    }

    /// Override the session record key holding the template namespace.
    ///
    /// # Panics
    ///
    /// Panics if the key is empty; the key is an explicit configuration value
    /// and an empty one is always a wiring mistake.
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "session key must not be empty");
        self.session_key = key;
        self
    }
}

impl<S> tower::Layer<S> for TemplateLayer {
    type Service = TemplateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TemplateService {
            inner,
            engine: self.engine.clone(),
            session_key: self.session_key.clone(),
        }
    }
}

/// Service produced by [`TemplateLayer`].
#[derive(Debug, Clone)]
pub struct TemplateService<S> {
    inner: S,
    engine: TemplateEngine,
    session_key: String,
}

impl<S> tower::Service<Request<Body>> for TemplateService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let engine = self.engine.clone();
        let session_key = self.session_key.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            request.extensions_mut().insert(engine);

            // Bind the template namespace when a session middleware is
            // installed around this layer.
            let bound = match request.extensions().get::<Session>().cloned() {
                Some(session) => {
                    let values = match session
                        .get::<serde_json::Map<String, JsonValue>>(&session_key)
                        .await
                    {
                        Ok(values) => values.unwrap_or_default(),
                        Err(err) => {
                            tracing::error!(
                                key = %session_key,
                                "failed to load template session namespace: {err}"
                            );
                            serde_json::Map::new()
                        }
                    };
                    let map = SessionMap::from_values(values);
                    request.extensions_mut().insert(map.clone());
                    Some((session, map))
                }
                None => None,
            };

            let response = inner.call(request).await?;

            if let Some((session, map)) = bound {
                if map.is_dirty() {
                    let result = if map.is_empty() {
                        session.remove::<JsonValue>(&session_key).await.map(|_| ())
                    } else {
                        session.insert(&session_key, map.snapshot()).await
                    };
                    if let Err(err) = result {
                        // Flash and session context are best-effort UI state;
                        // the rendered response still goes out.
                        tracing::error!(
                            key = %session_key,
                            "failed to write back template session namespace: {err}"
                        );
                    }
                }
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RenderContext;
    use crate::session::Flash;
    use axum::{http::header, routing::get, Router};
    use tower::ServiceExt;
    use tower_sessions::SessionManagerLayer;
    use tower_sessions_memory_store::MemoryStore;

    async fn flash_handler(flash: Flash) -> &'static str {
        flash.success("saved");
        "ok"
    }

    async fn read_handler(flash: Flash) -> String {
        flash.take_messages(&[]).join(",")
    }

    async fn noop_handler() -> &'static str {
        "ok"
    }

    fn app() -> Router {
        Router::new()
            .route("/push", get(flash_handler))
            .route("/read", get(read_handler))
            .route("/noop", get(noop_handler))
            .layer(TemplateLayer::new(TemplateEngine::builder().build()))
            .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
    }

    fn request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_flash_survives_across_requests_until_read() {
        let app = app();

        let response = app.clone().oneshot(request("/push", None)).await.unwrap();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie issued")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        // An intervening request that never reads leaves the mailbox alone.
        let response = app
            .clone()
            .oneshot(request("/noop", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "ok");

        let response = app
            .clone()
            .oneshot(request("/read", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "saved");

        // The drain wrote back an emptied namespace.
        let response = app
            .clone()
            .oneshot(request("/read", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_session_values_persist_across_requests() {
        async fn set_handler(session: SessionMap) -> crate::Result<&'static str> {
            session.insert("user", "ferris")?;
            Ok("set")
        }

        async fn get_handler(session: SessionMap) -> String {
            session
                .get("user")
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default()
        }

        let app = Router::new()
            .route("/set", get(set_handler))
            .route("/get", get(get_handler))
            .layer(TemplateLayer::new(TemplateEngine::builder().build()))
            .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false));

        let response = app.clone().oneshot(request("/set", None)).await.unwrap();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie issued")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(request("/get", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "ferris");
    }

    #[tokio::test]
    async fn test_engine_is_injected_without_session_layer() {
        async fn handler(ctx: RenderContext) -> String {
            format!("session={}", ctx.session().is_some())
        }

        let app = Router::new()
            .route("/", get(handler))
            .layer(TemplateLayer::new(TemplateEngine::builder().build()));

        let response = app.oneshot(request("/", None)).await.unwrap();
        assert_eq!(body_string(response).await, "session=false");
    }

    #[tokio::test]
    async fn test_missing_layer_rejects_render_context() {
        async fn handler(_ctx: RenderContext) -> &'static str {
            "unreachable"
        }

        let app = Router::new().route("/", get(handler));
        let response = app.oneshot(request("/", None)).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(response).await,
            "Template engine has not been initialized"
        );
    }

    #[test]
    #[should_panic(expected = "session key must not be empty")]
    fn test_empty_session_key_panics() {
        let _ = TemplateLayer::new(TemplateEngine::builder().build()).with_session_key("");
    }
}
