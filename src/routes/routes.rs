//! Defines routes for all bucket operations.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `GET    /buckets` : list buckets visible to the caller
//!   - `POST   /buckets` : create bucket
//!   - `GET    /buckets/{bucket}` : bucket info
//!   - `DELETE /buckets/{bucket}` : delete an empty bucket
//!   - `POST   /buckets/{bucket}/rename` : rename
//!   - `PUT    /buckets/{bucket}/settings/{key}` : set one setting
//!   - `POST   /buckets/{bucket}/access` : toggle a character's action
//!   - `POST   /buckets/{bucket}/monitor` : toggle monitoring
//!
//! - **Job membership endpoints**
//!   - `PUT    /buckets/{bucket}/jobs/{job}` : tag job
//!   - `DELETE /buckets/{bucket}/jobs/{job}` : untag job
//!   - `POST   /buckets/{bucket}/jobs/{job}/resolve` : mark resolved
//!
//! - `GET /characters/{character}/access` : access report

use crate::{
    handlers::{
        bucket_handlers::{
            bucket_info, check_access, create_bucket, delete_bucket, list_buckets, rename_bucket,
            resolve_job, set_setting, tag_job, toggle_access, toggle_monitor, untag_job,
        },
        health_handlers::{healthz, readyz},
    },
    services::bucket_service::BucketService,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router. Shared state is the `BucketService`.
pub fn routes() -> Router<BucketService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route("/buckets/{bucket}", get(bucket_info).delete(delete_bucket))
        .route("/buckets/{bucket}/rename", post(rename_bucket))
        .route("/buckets/{bucket}/settings/{key}", put(set_setting))
        .route("/buckets/{bucket}/access", post(toggle_access))
        .route("/buckets/{bucket}/monitor", post(toggle_monitor))
        .route("/buckets/{bucket}/jobs/{job}", put(tag_job).delete(untag_job))
        .route("/buckets/{bucket}/jobs/{job}/resolve", post(resolve_job))
        .route("/characters/{character}/access", get(check_access))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::bucket_handlers::PRINCIPAL_HEADER;
    use crate::services::bucket_service::tests::service;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        who: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(who) = who {
            req = req.header(PRINCIPAL_HEADER, who);
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn app() -> Router {
        routes().with_state(service().await)
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/healthz", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let (status, _) = send(&app, "GET", "/readyz", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_unknown_caller_is_rejected() {
        let app = app().await;
        let (status, _) = send(&app, "GET", "/buckets", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, "GET", "/buckets", Some("Nobody"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bucket_lifecycle_over_http() {
        let app = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/buckets",
            Some("Wiz"),
            Some(json!({"name": "Plots", "description": "Plot development"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "Plots");

        let (status, _) = send(
            &app,
            "POST",
            "/buckets",
            Some("Wiz"),
            Some(json!({"name": "plots", "description": "Again"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/buckets",
            Some("Wiz"),
            Some(json!({"name": "Code"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/buckets/Plots/access",
            Some("Wiz"),
            Some(json!({"action": "bucket_info", "character": "Alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["granted"], json!(["bucket_info"]));

        let (status, body) = send(&app, "GET", "/buckets/Plots", Some("Alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "Plot development");

        let (status, body) = send(
            &app,
            "PUT",
            "/buckets/Plots/settings/timeout",
            Some("Wiz"),
            Some(json!({"value": "5 fortnights"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, _) = send(&app, "PUT", "/buckets/Plots/jobs/3", Some("Wiz"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/buckets/Plots", Some("Wiz"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, "DELETE", "/buckets/Plots/jobs/3", Some("Wiz"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/buckets/Plots", Some("Wiz"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "GET", "/buckets", Some("Wiz"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn unauthorized_reply_is_generic() {
        let app = app().await;
        send(
            &app,
            "POST",
            "/buckets",
            Some("Wiz"),
            Some(json!({"name": "Plots", "description": "Plot development"})),
        )
        .await;

        let (hidden, hidden_body) = send(&app, "GET", "/buckets/Ghost", Some("Alice"), None).await;
        let (denied, denied_body) = send(&app, "GET", "/buckets/Plots", Some("Alice"), None).await;
        assert_eq!(hidden, StatusCode::FORBIDDEN);
        assert_eq!(denied, StatusCode::FORBIDDEN);
        assert_eq!(hidden_body, denied_body);
    }

    #[tokio::test]
    async fn blank_bucket_name_is_rejected() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/buckets",
            Some("Wiz"),
            Some(json!({"name": "   ", "description": "Blank name"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, body) = send(&app, "GET", "/buckets", Some("Wiz"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
