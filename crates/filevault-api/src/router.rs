use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use filevault_core::UserFileService;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Room for multipart boundaries and part headers on top of the file bytes.
const MULTIPART_FRAMING: u64 = 64 * 1024;

/// The body limit follows the configured request cap. Per-file and total
/// file sizes are checked again while the parts are read.
pub fn api_router(service: Arc<UserFileService>) -> Router {
    let body_limit = usize::try_from(service.max_request_size().saturating_add(MULTIPART_FRAMING))
        .unwrap_or(usize::MAX);
    let app: Router<Arc<UserFileService>> = Router::<Arc<UserFileService>>::new()
        .route(
            "/api/resource",
            get(handlers::resource::get_resource)
                .post(handlers::resource::upload_resources)
                .delete(handlers::resource::delete_resource),
        )
        .route(
            "/api/resource/download",
            get(handlers::resource::download_resource),
        )
        .route("/api/resource/move", get(handlers::resource::move_resource))
        .route(
            "/api/resource/search",
            get(handlers::resource::search_resources),
        )
        .route(
            "/api/directory",
            get(handlers::directory::get_directory).post(handlers::directory::create_directory),
        )
        .route("/health/live", get(handlers::health::health_live));

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header::CONTENT_DISPOSITION},
    };
    use filevault_core::{CoreConfig, UserFileService};
    use filevault_storage::MemoryObjectStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::api_router;
    use crate::identity::USER_ID_HEADER;

    const BOUNDARY: &str = "filevault-test-boundary";

    async fn app() -> Router {
        app_with(CoreConfig::default()).await
    }

    async fn app_with(config: CoreConfig) -> Router {
        let store = MemoryObjectStore::with_bucket(&config.bucket).await.unwrap();
        api_router(Arc::new(UserFileService::new(Arc::new(store), config)))
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, "7")
            .body(Body::empty())
            .unwrap()
    }

    fn upload_request(uri: &str, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, contents) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"object\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(USER_ID_HEADER, "7")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = app().await;
        let req = Request::builder()
            .uri("/api/directory?path=")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].as_str().unwrap().contains("identity"));
    }

    #[tokio::test]
    async fn directory_upload_and_info_flow() {
        let app = app().await;

        let (status, body) = send(&app, request(Method::POST, "/api/directory?path=a/")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"path": "", "name": "a", "type": "DIRECTORY"}));

        let (status, body) = send(
            &app,
            upload_request("/api/resource?path=a/", &[("x.txt", "hi"), ("y.txt", "yes")]),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) =
            send(&app, request(Method::GET, "/api/resource?path=a/x.txt")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"path": "a/", "name": "x.txt", "size": 2, "type": "FILE"})
        );

        let (status, body) = send(&app, request(Method::GET, "/api/directory?path=a/")).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["x.txt", "y.txt"]);
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app().await;
        send(&app, request(Method::POST, "/api/directory?path=a/")).await;

        let (status, body) =
            send(&app, request(Method::GET, "/api/resource?path=../escape")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (status, _) = send(&app, request(Method::GET, "/api/resource?path=nope.txt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, request(Method::POST, "/api/directory?path=a/")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, request(Method::POST, "/api/directory?path=x/y/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = app_with(CoreConfig {
            max_upload_size: 3,
            ..CoreConfig::default()
        })
        .await;

        let (status, _) = send(&app, upload_request("/api/resource?path=", &[("big.bin", "12345")])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn request_over_total_limit_writes_nothing() {
        let app = app_with(CoreConfig {
            max_upload_size: 4,
            max_request_size: 6,
            ..CoreConfig::default()
        })
        .await;

        let (status, body) = send(
            &app,
            upload_request("/api/resource?path=", &[("a.bin", "1234"), ("b.bin", "1234")]),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["message"].as_str().unwrap().contains("max_size=6"));

        let (status, body) = send(&app, request(Method::GET, "/api/directory?path=")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(
            &app,
            upload_request("/api/resource?path=", &[("a.bin", "1234"), ("b.bin", "12")]),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn move_search_download_and_delete() {
        let app = app().await;
        send(&app, request(Method::POST, "/api/directory?path=docs/")).await;
        send(&app, upload_request("/api/resource?path=docs/", &[("Plan.md", "plan")])).await;

        let (status, body) = send(
            &app,
            request(Method::GET, "/api/resource/move?from=docs/Plan.md&to=plan.md"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "");
        assert_eq!(body["name"], "plan.md");

        let (status, body) =
            send(&app, request(Method::GET, "/api/resource/search?query=PLAN")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/resource/download?path=plan.md"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename*=UTF-8''plan%2Emd"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"plan");

        let (status, body) =
            send(&app, request(Method::DELETE, "/api/resource?path=plan.md")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = send(&app, request(Method::GET, "/api/resource?path=plan.md")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn liveness_needs_no_identity() {
        let app = app().await;
        let req = Request::builder()
            .uri("/health/live")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
