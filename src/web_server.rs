use std::fmt::Debug;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::gateway::CompletionGateway;
use crate::session::{Session, TransitionError, View};
use crate::sessions::SessionStore;

const EMBEDDED_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("discovery.html", include_str!("../templates/discovery.html")),
    ("chat.html", include_str!("../templates/chat.html")),
];

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    sessions: Arc<SessionStore>,
    gateway: Arc<dyn CompletionGateway>,
}

impl AppState {
    pub fn new(
        catalog: Arc<Catalog>,
        gateway: Arc<dyn CompletionGateway>,
        templates_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir)),
            sessions: Arc::new(SessionStore::new(catalog)),
            gateway,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

// Minijinja Environment setup. Templates are compiled into the binary unless a
// directory is given, in which case they are loaded from disk and reloaded on change.
fn create_minijinja_env(templates_dir: Option<PathBuf>) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        match &templates_dir {
            Some(dir) => {
                env.set_loader(path_loader(dir.clone()));
                notifier.watch_path(dir, true);
            }
            None => {
                for &(name, source) in EMBEDDED_TEMPLATES {
                    env.add_template(name, source)?;
                }
            }
        }
        Ok(env)
    })
}

fn render(state: &AppState, session: &Session) -> Response {
    let (template, context) = match session.current_view() {
        View::Discovery => (
            "discovery.html",
            minijinja::context! {
                title => "SYNC",
                matches => session.matches(),
                profile => session.current_profile(),
            },
        ),
        View::Chat => (
            "chat.html",
            minijinja::context! {
                title => "SYNC",
                matches => session.matches(),
                active => session.active_match(),
                history => session.active_history().unwrap_or(&[]),
            },
        ),
    };

    // Acquire env, get template, and render within the same block
    state
        .templates
        .acquire_env()
        .and_then(|env| env.get_template(template).and_then(|tmpl| tmpl.render(context)))
        .map(|html| Html(html).into_response())
        .unwrap_or_else(|e| {
            error!("Failed to get or render template {}: {}", template, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        })
}

fn with_cookie(set_cookie: Option<HeaderValue>, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = set_cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

fn log_outcome<T: Debug>(operation: &str, outcome: Result<T, TransitionError>) {
    match outcome {
        Ok(value) => info!(operation, ?value, "Transition applied"),
        Err(e) => warn!(operation, error = %e, "Transition rejected"),
    }
}

// Runs one synchronous transition against the caller's session, then sends the browser back to `/`.
// Requests without a live session cookie are bounced to `/`, which starts one.
async fn apply<T, F>(state: &AppState, headers: &HeaderMap, operation: &str, transition: F) -> Response
where
    T: Debug,
    F: FnOnce(&mut Session) -> Result<T, TransitionError>,
{
    match state.sessions.lookup(headers).await {
        Some(session) => {
            let mut session = session.lock().await;
            log_outcome(operation, transition(&mut *session));
        }
        None => warn!(operation, "No live session; ignoring transition"),
    }
    Redirect::to("/").into_response()
}

#[derive(Deserialize)]
struct OpenChatForm {
    name: String,
}

#[derive(Deserialize)]
struct SendForm {
    message: String,
}

async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let resolved = state.sessions.resolve(&headers).await;
    let page = {
        let session = resolved.session.lock().await;
        render(&state, &session)
    };
    with_cookie(resolved.set_cookie, page)
}

async fn skip_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    apply(&state, &headers, "skip", Session::skip).await
}

async fn match_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    apply(&state, &headers, "match", Session::match_current).await
}

async fn open_chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<OpenChatForm>,
) -> Response {
    apply(&state, &headers, "open_chat", |s| s.open_chat(&form.name)).await
}

async fn close_chat_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    apply(&state, &headers, "close_chat", Session::close_chat).await
}

// Holds the session lock for the whole provider call, so one browser's sends are applied in order.
async fn send_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SendForm>,
) -> Response {
    match state.sessions.lookup(&headers).await {
        Some(session) => {
            let mut session = session.lock().await;
            let outcome = session
                .send_message(&form.message, state.gateway.as_ref())
                .await
                .map(|turn| turn.content.len());
            log_outcome("send_message", outcome);
        }
        None => warn!("No live session; ignoring send_message"),
    }
    Redirect::to("/").into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/skip", post(skip_handler))
        .route("/match", post(match_handler))
        .route("/chat/open", post(open_chat_handler))
        .route("/chat/close", post(close_chat_handler))
        .route("/chat/send", post(send_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = app_router(state);

    // Bind using tokio::net::TcpListener
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;
    info!("SYNC listening on http://{}", addr);

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
