//! `GET /alerts/dashboard`: alerts grouped per visit.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::VisitAlertGroup;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub dashboard_data: Vec<VisitAlertGroup>,
}

pub async fn dashboard(State(ctx): State<ApiContext>) -> Result<Json<DashboardResponse>, ApiError> {
    let dashboard_data = ctx
        .run_blocking(|core| {
            let conn = core.open_db()?;
            Ok(db::alert_dashboard(&conn)?)
        })
        .await?;

    Ok(Json(DashboardResponse { dashboard_data }))
}
