//! HTTP binding for the query functions.
//!
//! Handlers grab the current snapshot, call into [`crate::query`] and turn the
//! [`Reply`] into a JSON response. Nothing here holds a lock across a query.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::output::{render_html, rows_to_csv};
use crate::query::{self, Reply};
use crate::store::SharedStore;

type AppState = Arc<SharedStore>;

type QueryParams = std::result::Result<Query<Params>, QueryRejection>;

/// Query-string parameters. Kept as raw strings so that validation (and its
/// error messages) happens in one place, in [`crate::query`].
#[derive(Debug, Default, Deserialize)]
pub struct Params {
    pub hw_name: Option<String>,
    pub group_id: Option<String>,
    pub student_id: Option<String>,
    pub format: Option<String>,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

pub fn router(store: AppState) -> Router {
    Router::new()
        .route("/names", get(names))
        .route("/health", get(health))
        .route("/mean_score", get(query_mean_score))
        .route("/mark", get(mark))
        .route("/course_table", get(course_table))
        .route("/reload", post(reload))
        .route("/:hw/mean_score", get(mean_score))
        .route("/:hw/:group/mean_score", get(mean_score_for_group))
        .with_state(store)
}

/// Binds `addr` and serves until Ctrl+C.
#[tracing::instrument(skip(store))]
pub async fn serve(store: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    #[cfg(unix)]
    reload_on_sighup(Arc::clone(&store))?;

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(unix)]
fn reload_on_sighup(store: AppState) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading sources");
            let reply = reload_blocking(Arc::clone(&store)).await;
            if !reply.is_ok() {
                warn!(status = reply.status, "SIGHUP reload kept the current snapshot");
            }
        }
    });
    Ok(())
}

/// Loading reads files, so it runs off the async workers.
async fn reload_blocking(store: AppState) -> Reply {
    match tokio::task::spawn_blocking(move || query::reload(&store)).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "Reload task failed");
            Reply {
                status: query::STATUS_SERVER_ERROR,
                body: json!({ "error": "reload task failed" }),
            }
        }
    }
}

/// Unwraps an extractor result, turning axum's plain-text rejection into the
/// usual `{"error": ..}` body.
fn accept<T, E>(extracted: std::result::Result<T, E>) -> std::result::Result<T, Reply>
where
    E: std::fmt::Display,
{
    extracted.map_err(|rejection| {
        debug!(error = %rejection, "Request rejected by extractor");
        Reply::bad_request(rejection.to_string())
    })
}

async fn names(State(store): State<AppState>) -> Reply {
    query::names(&store.snapshot())
}

async fn health(State(store): State<AppState>) -> Reply {
    query::health(&store.snapshot())
}

#[tracing::instrument(level = "debug", skip(store))]
async fn mean_score(
    State(store): State<AppState>,
    hw: std::result::Result<Path<String>, PathRejection>,
) -> Reply {
    match accept(hw) {
        Ok(Path(hw)) => query::mean_score(&store.snapshot(), &hw),
        Err(reply) => reply,
    }
}

#[tracing::instrument(level = "debug", skip(store))]
async fn mean_score_for_group(
    State(store): State<AppState>,
    segments: std::result::Result<Path<(String, String)>, PathRejection>,
) -> Reply {
    match accept(segments) {
        Ok(Path((hw, group))) => query::mean_score_for_group(&store.snapshot(), &hw, &group),
        Err(reply) => reply,
    }
}

#[tracing::instrument(level = "debug", skip(store))]
async fn query_mean_score(State(store): State<AppState>, params: QueryParams) -> Reply {
    match accept(params) {
        Ok(Query(params)) => query::query_mean_score(
            &store.snapshot(),
            params.hw_name.as_deref(),
            params.group_id.as_deref(),
        ),
        Err(reply) => reply,
    }
}

#[tracing::instrument(level = "debug", skip(store))]
async fn mark(State(store): State<AppState>, params: QueryParams) -> Reply {
    match accept(params) {
        Ok(Query(params)) => query::mark(
            &store.snapshot(),
            params.student_id.as_deref(),
            params.group_id.as_deref(),
        ),
        Err(reply) => reply,
    }
}

#[tracing::instrument(level = "debug", skip(store))]
async fn course_table(State(store): State<AppState>, params: QueryParams) -> Response {
    let Query(params) = match accept(params) {
        Ok(params) => params,
        Err(reply) => return reply.into_response(),
    };
    let snapshot = store.snapshot();
    let table = match query::course_table(
        &snapshot,
        params.hw_name.as_deref(),
        params.group_id.as_deref(),
    ) {
        Ok(table) => table,
        Err(reply) => return reply.into_response(),
    };

    if params.format.as_deref() == Some("csv") {
        return match rows_to_csv(&table.rows) {
            Ok(body) => ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response(),
            Err(e) => {
                error!(error = %e, "Failed to render course table as CSV");
                Reply {
                    status: query::STATUS_SERVER_ERROR,
                    body: json!({ "error": "failed to render report" }),
                }
                .into_response()
            }
        };
    }

    Html(render_html(table.assignment, table.group, &table.rows)).into_response()
}

async fn reload(State(store): State<AppState>) -> Reply {
    reload_blocking(store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ScoreRow;
    use crate::store::{Snapshot, StudentStore};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let row = |student_id: i64, name: &str, group: i64, score: i64| ScoreRow {
            student_id,
            name: name.to_string(),
            group,
            score,
        };
        let store = StudentStore::from_sheets(
            &[row(1, "Anna", 10, 80)],
            &[row(1, "Anna", 10, 60), row(2, "Boris", 20, 90)],
        );
        router(Arc::new(SharedStore::fixed(Snapshot::from_store(store))))
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body) = get(uri).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    #[tokio::test]
    async fn test_names_route() {
        let (status, body) = get_json("/names").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "names": ["Anna", "Boris"] }));
    }

    #[tokio::test]
    async fn test_mean_score_routes() {
        assert_eq!(
            get_json("/hw-01/mean_score").await,
            (StatusCode::OK, json!({ "mean_score": 40.0 }))
        );
        assert_eq!(
            get_json("/hw-02/mean_score").await,
            (StatusCode::OK, json!({ "mean_score": 75.0 }))
        );
        assert_eq!(
            get_json("/hw-02/20/mean_score").await,
            (StatusCode::OK, json!({ "mean_score": 90.0 }))
        );
        assert_eq!(
            get_json("/mean_score?hw_name=hw-01&group_id=10").await,
            (StatusCode::OK, json!({ "mean_score": 80.0 }))
        );
    }

    #[tokio::test]
    async fn test_error_routes_are_400_json() {
        for uri in [
            "/hw-9/mean_score",
            "/hw-01/30/mean_score",
            "/hw-01/abc/mean_score",
            "/mean_score?hw_name=hw-01",
            "/mark",
            "/mark?student_id=7",
            "/course_table",
            "/mark?student_id=1&student_id=2",
            "/course_table?hw_name=hw-01&hw_name=hw-02",
            "/hw-01/%FF/mean_score",
            "/%FF/mean_score",
        ] {
            let (status, body) = get_json(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_mark_route() {
        assert_eq!(
            get_json("/mark?student_id=1").await,
            (StatusCode::OK, json!({ "mark": 2 }))
        );
        assert_eq!(
            get_json("/mark?group_id=20").await,
            (StatusCode::OK, json!({ "average_mark": 2.0 }))
        );
    }

    #[tokio::test]
    async fn test_course_table_html_and_csv() {
        let (status, html) = get("/course_table?hw_name=hw-02&group_id=20").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<td>Boris</td><td>20</td><td>90</td>"));
        assert!(!html.contains("Anna"));

        let (status, csv) = get("/course_table?hw_name=hw-01&format=csv").await;
        assert_eq!(status, StatusCode::OK);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["name,group,score", "Anna,10,80", "Boris,20,0"]);
    }

    #[tokio::test]
    async fn test_unreadable_request_error_text() {
        let (status, body) = get_json("/mark?student_id=1&student_id=2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("student_id"));
    }

    #[tokio::test]
    async fn test_reload_blocking_fixed_store_is_ok() {
        let store = StudentStore::from_sheets(&[], &[]);
        let shared = Arc::new(SharedStore::fixed(Snapshot::from_store(store)));
        let reply = reload_blocking(shared).await;
        assert!(reply.is_ok());
        assert_eq!(reply.body["students"], 0);
    }

    #[tokio::test]
    async fn test_reload_fixed_store() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
