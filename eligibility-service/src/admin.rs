//! Operator HTTP surface: bulk re-evaluation triggers and the eligibility query.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use eligibility_client::db::{Store, StoreResult};
use serde::Serialize;

use crate::{
    evaluation::BulkRunner,
    query::{self, QueryError},
};

#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn Store>,
    pub bulk: Arc<BulkRunner>,
}

#[derive(Debug, Serialize)]
struct JobAccepted {
    job: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct AccountEligibility {
    account_id: String,
    eligible: bool,
}

type ApiError = (StatusCode, String);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/evaluation", patch(evaluate_pending))
        .route("/rerunEvaluation", patch(rerun_all))
        .route("/accounts/:account_id/eligibility", get(account_eligibility))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

pub async fn serve(state: AdminState, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid admin bind address: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "admin API listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn evaluate_pending(
    State(state): State<AdminState>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let ids = state.store.pending_evaluation_ids().await;
    start_job(&state, "evaluation", ids)
}

async fn rerun_all(
    State(state): State<AdminState>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let ids = state.store.live_occupancy_ids().await;
    start_job(&state, "rerunEvaluation", ids)
}

fn start_job(
    state: &AdminState,
    job: &'static str,
    ids: StoreResult<Vec<String>>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let ids = ids.map_err(|e| {
        tracing::error!(job, error = %e, "failed to list occupancies");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    tracing::info!(job, occupancies = ids.len(), "bulk evaluation accepted");
    let bulk = state.bulk.clone();
    tokio::spawn(async move {
        let summary = bulk.run(ids).await;
        tracing::info!(
            job,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "bulk evaluation finished"
        );
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job,
            status: "accepted",
        }),
    ))
}

async fn account_eligibility(
    State(state): State<AdminState>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountEligibility>, ApiError> {
    match query::is_account_eligible(state.store.as_ref(), &account_id).await {
        Ok(eligible) => Ok(Json(AccountEligibility {
            account_id,
            eligible,
        })),
        Err(e @ QueryError::NotEvaluated(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use eligibility_client::{
        db::{EvaluationStore, MemoryStore, OccupancyStore},
        domain::{EvaluationKind, ReasonSet},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        evaluation::Evaluator,
        observability::NoopMetrics,
        sinks::MemorySink,
    };

    fn state(store: Arc<MemoryStore>, sink: Arc<MemorySink>) -> AdminState {
        let evaluator = Arc::new(Evaluator::new(store.clone(), sink, Arc::new(NoopMetrics)));
        AdminState {
            store,
            bulk: Arc::new(BulkRunner::new(evaluator, Arc::new(NoopMetrics))),
        }
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = router(state(Arc::new(MemoryStore::new()), Arc::new(MemorySink::new())));
        assert_eq!(send(app, "GET", "/healthz").await, (StatusCode::OK, "ok".to_string()));
    }

    #[tokio::test]
    async fn pending_evaluation_is_accepted_and_runs_in_background() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_occupancy("occ-1", "acc-1", None).await.unwrap();
        let sink = Arc::new(MemorySink::new());
        let app = router(state(store.clone(), sink.clone()));

        let (status, body) = send(app, "PATCH", "/evaluation").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({"job": "evaluation", "status": "accepted"}));

        for _ in 0..200 {
            if store.pending_evaluation_ids().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(store.pending_evaluation_ids().await.unwrap().is_empty());
        assert!(!sink.published().is_empty());
    }

    #[tokio::test]
    async fn rerun_names_its_job() {
        let app = router(state(Arc::new(MemoryStore::new()), Arc::new(MemorySink::new())));
        let (status, body) = send(app, "PATCH", "/rerunEvaluation").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.contains("\"job\":\"rerunEvaluation\""));
    }

    #[tokio::test]
    async fn account_eligibility_reports_404_then_result() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_occupancy("occ-1", "acc-1", None).await.unwrap();
        let app = router(state(store.clone(), Arc::new(MemorySink::new())));

        let (status, _) = send(app.clone(), "GET", "/accounts/acc-1/eligibility").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        for kind in [EvaluationKind::Eligibility, EvaluationKind::Suppliability] {
            store.save_result("occ-1", "acc-1", kind, &ReasonSet::new()).await.unwrap();
        }
        let (status, body) = send(app, "GET", "/accounts/acc-1/eligibility").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({"account_id": "acc-1", "eligible": true}));
    }
}
