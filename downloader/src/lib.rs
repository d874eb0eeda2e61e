//! SolarEdge data downloader: a credential-gated form that runs one
//! monitoring API query per Generate action and offers the response as raw
//! JSON plus a flattened CSV.

pub mod config;
pub mod credentials;
pub mod handlers;
pub mod models;
pub mod pages;
pub mod pipeline;
pub mod secrets;
pub mod session;
pub mod sites;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use solaredge::Gateway;
use tower_http::trace::TraceLayer;

use crate::{credentials::CredentialTable, session::SessionStore, sites::SiteCache};

// ------------------------------------------------------------------ //
//  Shared application state                                           //
// ------------------------------------------------------------------ //

/// Shared state injected into every Axum handler via `State`.
pub struct AppState {
    /// Monitoring API client carrying the configured API key.
    pub gateway: Gateway,
    /// Allow-list used by the login form.
    pub credentials: CredentialTable,
    pub sessions: SessionStore,
    /// Site list, fetched on first use and kept for the process lifetime.
    pub sites: SiteCache,
}

impl AppState {
    pub fn new(gateway: Gateway, credentials: CredentialTable) -> Self {
        Self {
            gateway,
            credentials,
            sessions: SessionStore::new(),
            sites: SiteCache::new(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::index))
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/generate", post(handlers::generate))
        .route("/download/raw", get(handlers::download_raw))
        .route("/download/csv", get(handlers::download_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_api() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(
                {"sites": {"count": 1, "site": [{"id": 77, "name": "Roof"}]}}
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/site/77/details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(
                {"details": {"id": 77, "name": "Roof", "location": {"city": "Eilat"}}}
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/equipment/77/sensors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(
                {"SiteSensors": {"count": 0, "list": []}}
            )))
            .mount(&server)
            .await;
        server
    }

    fn app_with_state(server: &MockServer) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            Gateway::new(server.uri(), Some("k".into())),
            CredentialTable::new(vec!["Alice".into()], vec!["secret".into()]),
        ));
        (router(state.clone()), state)
    }

    fn app(server: &MockServer) -> Router {
        app_with_state(server).0
    }

    fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn login(app: &Router) -> String {
        let resp = app
            .clone()
            .oneshot(form("/login", "username=ALICE&password=secret", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let server = mock_api().await;
        let resp = app(&server).oneshot(get("/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_requires_login() {
        let server = mock_api().await;
        let resp = app(&server).oneshot(get("/", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn bad_login_is_rejected_without_cookie() {
        let server = mock_api().await;
        let resp = app(&server)
            .oneshot(form("/login", "username=alice&password=wrong", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert!(text(resp).await.contains("Invalid username or password"));
    }

    #[tokio::test]
    async fn login_shows_sites() {
        let server = mock_api().await;
        let app = app(&server);
        let cookie = login(&app).await;

        let resp = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(text(resp).await.contains("<option value=\"Roof\""));
    }

    #[tokio::test]
    async fn generate_then_download_both_files() {
        let server = mock_api().await;
        let app = app(&server);
        let cookie = login(&app).await;

        let resp = app
            .clone()
            .oneshot(form("/generate", "site=Roof&operation=site_details", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(text(resp).await.contains("ready to download"));

        let resp = app.clone().oneshot(get("/download/csv", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"solaredge_77_site_details_"));
        assert!(disposition.ends_with(".csv\""));
        assert_eq!(text(resp).await, "id,location_city,name\n77,Eilat,Roof\n");

        let resp = app.oneshot(get("/download/raw", Some(&cookie))).await.unwrap();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
        let raw: serde_json::Value = serde_json::from_str(&text(resp).await).unwrap();
        assert_eq!(raw["details"]["location"]["city"], "Eilat");
    }

    #[tokio::test]
    async fn empty_result_offers_no_download() {
        let server = mock_api().await;
        let app = app(&server);
        let cookie = login(&app).await;

        let resp = app
            .clone()
            .oneshot(form("/generate", "site=Roof&operation=get_sensor_list", Some(&cookie)))
            .await
            .unwrap();
        let html = text(resp).await;
        assert!(html.contains("No data found"));
        assert!(!html.contains("/download/csv"));

        let resp = app.oneshot(get("/download/csv", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_site_is_reported() {
        let server = mock_api().await;
        let app = app(&server);
        let cookie = login(&app).await;

        let resp = app
            .oneshot(form("/generate", "site=Shed&operation=site_details", Some(&cookie)))
            .await
            .unwrap();
        assert!(text(resp).await.contains("Invalid site selected."));
    }

    #[tokio::test]
    async fn logout_ends_session() {
        let server = mock_api().await;
        let app = app(&server);
        let cookie = login(&app).await;

        let resp = app.clone().oneshot(form("/logout", "", Some(&cookie))).await.unwrap();
        assert_eq!(resp.headers()[header::LOCATION], "/login");

        let resp = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn relogin_replaces_previous_session() {
        let server = mock_api().await;
        let (app, state) = app_with_state(&server);
        let first = login(&app).await;

        let resp = app
            .clone()
            .oneshot(form("/login", "username=alice&password=secret", Some(&first)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let second = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(!second.starts_with(&first));

        let resp = app.oneshot(get("/", Some(&first))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        assert_eq!(state.sessions.len(), 1);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn operator_log_records_only_api_failures() {
        use tracing_subscriber::layer::SubscriberExt;

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::registry()
            .with(telemetry::operator_layer(move || writer.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = mock_api().await;
        let app = app(&server);

        let resp = app
            .clone()
            .oneshot(form("/login", "username=alice&password=wrong", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let cookie = login(&app).await;
        let resp = app
            .clone()
            .oneshot(form("/generate", "site=Roof&operation=get_sensor_list", Some(&cookie)))
            .await
            .unwrap();
        assert!(text(resp).await.contains("No data found"));

        // No mock for the energy endpoint: the API answers 404.
        let resp = app
            .oneshot(form(
                "/generate",
                "site=Roof&operation=site_energy&start_date=2024-04-01&end_date=2024-04-02",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert!(text(resp).await.contains("404"));

        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("monitoring API call failed"));
        assert!(log.contains("\"level\":\"ERROR\""));
        assert!(!log.contains("login rejected"));
        assert!(!log.contains("response contained no rows"));
    }
}
