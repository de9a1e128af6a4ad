/// Current user endpoint

use super::{AppState, AuthUser};
use crate::error::ApiResult;
use crate::service::billing;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

pub fn create_account_routes() -> Router<AppState> {
    Router::new().route("/api/me", get(me))
}

/// GET /api/me
/// Returns: { "user": {...}, "plan": "free", "project_limit": 3, "project_count": 1 }
async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<Value>> {
    let plan = billing::effective_plan(state.store.as_ref(), &user).await?;
    let project_count = state.store.count_projects(user.id).await?;
    Ok(Json(json!({
        "user": user,
        "plan": plan,
        "project_limit": plan.project_limit(),
        "project_count": project_count,
    })))
}
