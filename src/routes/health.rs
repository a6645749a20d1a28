use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{sql_query, RunQueryDsl};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let pool = state.pool.clone();
    let database = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|err| err.to_string())?;
        sql_query("SELECT 1")
            .execute(&mut conn)
            .map_err(|err| err.to_string())
    })
    .await;

    match database {
        Ok(Ok(_)) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Ok(Err(err)) => {
            warn!(error = %err, "health check could not reach the database");
            degraded()
        }
        Err(err) => {
            warn!(error = %err, "health check task failed");
            degraded()
        }
    }
}

fn degraded() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "degraded", "database": "unavailable" })),
    )
}
