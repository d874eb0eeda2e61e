//! Axum handlers for the downloader form.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use tracing::info;

use crate::{
    models::{GenerateForm, LoginForm},
    pages::{self, FormView, Notice, NoticeKind},
    pipeline::{self, GenerateRequest},
    session::{self, Session},
    AppState,
};

/// Id of the caller's session if it is authenticated.
fn authenticated(state: &AppState, headers: &HeaderMap) -> Option<uuid::Uuid> {
    session::session_id(headers).filter(|id| state.sessions.is_authenticated(*id))
}

// ------------------------------------------------------------------ //
//  Login / logout                                                     //
// ------------------------------------------------------------------ //

/// GET /login
pub async fn login_page() -> Html<String> {
    Html(pages::login(None))
}

/// POST /login
///
/// A successful login always starts a fresh session; any session the
/// caller already held is dropped.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let mut session = Session::default();
    match session.authenticate(&state.credentials, &form.username, &form.password) {
        Ok(()) => {
            if let Some(previous) = session::session_id(&headers) {
                state.sessions.remove(previous);
            }
            let id = state.sessions.insert(session);
            info!("login succeeded");
            (
                [(header::SET_COOKIE, session::set_cookie(id))],
                Redirect::to("/"),
            )
                .into_response()
        }
        Err(e) => {
            info!("login rejected");
            (StatusCode::UNAUTHORIZED, Html(pages::login(Some(e.user_message())))).into_response()
        }
    }
}

/// POST /logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session::session_id(&headers) {
        state.sessions.with(id, Session::logout);
        state.sessions.remove(id);
    }
    (
        [(header::SET_COOKIE, session::clear_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

// ------------------------------------------------------------------ //
//  Download form                                                      //
// ------------------------------------------------------------------ //

/// GET /
pub async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if authenticated(&state, &headers).is_none() {
        return Redirect::to("/login").into_response();
    }

    let mut view = FormView::default();
    match state.sites.get(&state.gateway).await {
        Ok(directory) => {
            if directory.is_empty() {
                view.notices.push(Notice::new(
                    NoticeKind::Warning,
                    "Could not fetch site list. Check API key or permissions.",
                ));
            }
            view.sites = directory.names();
        }
        Err(e) => view.notices.push(Notice::new(NoticeKind::Error, e.user_message())),
    }
    Html(pages::download_form(&view)).into_response()
}

/// POST /generate
pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<GenerateForm>,
) -> Response {
    let Some(id) = authenticated(&state, &headers) else {
        return Redirect::to("/login").into_response();
    };

    let directory = match state.sites.get(&state.gateway).await {
        Ok(directory) => directory,
        Err(e) => {
            let view = FormView {
                previous: Some(&form),
                notices: vec![Notice::new(NoticeKind::Error, e.user_message())],
                ..Default::default()
            };
            return Html(pages::download_form(&view)).into_response();
        }
    };

    let req = GenerateRequest::from(form.clone());
    let today = chrono::Local::now().date_naive();
    let result = pipeline::generate(&state.gateway, directory, &req, today).await;

    let mut view = FormView {
        sites: directory.names(),
        previous: Some(&form),
        ..Default::default()
    };

    // Any earlier bundle is replaced or dropped.
    let bundle = match result {
        Ok(bundle) => {
            view.notices.push(Notice::new(
                NoticeKind::Success,
                "Your files are ready to download below!",
            ));
            Some(bundle)
        }
        Err(e) => {
            let kind = if e.is_warning() {
                NoticeKind::Warning
            } else {
                NoticeKind::Error
            };
            view.notices.push(Notice::new(kind, e.user_message()));
            None
        }
    };
    view.bundle = bundle.as_ref();
    let html = pages::download_form(&view);
    state.sessions.with(id, |s| s.bundle = bundle);

    Html(html).into_response()
}

// ------------------------------------------------------------------ //
//  Downloads                                                          //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Copy)]
enum Artifact {
    RawJson,
    Csv,
}

fn download(state: &AppState, headers: &HeaderMap, artifact: Artifact) -> Response {
    let Some(id) = authenticated(state, headers) else {
        return Redirect::to("/login").into_response();
    };

    let file = state.sessions.with(id, |s| {
        s.bundle.as_ref().map(|b| match artifact {
            Artifact::RawJson => (b.raw_filename(), "application/json", b.raw_json.clone()),
            Artifact::Csv => (b.csv_filename(), "text/csv", b.csv_text.clone()),
        })
    });

    match file.flatten() {
        Some((filename, mime, body)) => (
            [
                (header::CONTENT_TYPE, mime.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Nothing to download. Generate files first.").into_response(),
    }
}

/// GET /download/raw
pub async fn download_raw(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    download(&state, &headers, Artifact::RawJson)
}

/// GET /download/csv
pub async fn download_csv(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    download(&state, &headers, Artifact::Csv)
}

// ------------------------------------------------------------------ //
//  Health                                                             //
// ------------------------------------------------------------------ //

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
