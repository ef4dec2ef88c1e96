//! Minimal demo: one route through the templated adapter, one through the
//! manual render facade, both flashing messages and touching the session.
//!
//! ```bash
//! cargo run --example hello
//! ```
//!
//! Then open http://localhost:8000 (and http://localhost:8000/normal).

use axum::response::Response;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionManagerLayer;
use tower_sessions_memory_store::MemoryStore;
use vellum::prelude::*;

fn flash_all(ctx: &RenderContext) -> Result<()> {
    let flash = ctx.flash();
    flash.success("success message");
    flash.info("info message");
    flash.warning("warning message");
    flash.error("error message");
    if let Some(session) = ctx.session() {
        session.insert("user", "session user")?;
    }
    Ok(())
}

async fn index(ctx: RenderContext) -> Result<ContextMap> {
    flash_all(&ctx)?;
    Ok(ContextMap::new().with("greetings", "Hello, template adapter!"))
}

async fn normal(ctx: RenderContext) -> Result<Response> {
    flash_all(&ctx)?;
    ctx.render(
        "normal_index.html",
        ContextMap::new().with("greetings", "Hello, manual render!"),
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let engine = TemplateEngine::builder()
        .directory("demos/templates")
        .global("site_name", "vellum demo")
        .build();

    let app = Router::new()
        .route("/", get(templated("index.html", index)))
        .route("/normal", get(normal))
        .layer(TemplateLayer::new(engine))
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8000")
        .await
        .expect("failed to bind 0.0.0.0:8000");
    tracing::info!("listening on http://localhost:8000");
    axum::serve(listener, app).await.expect("server error");
}
