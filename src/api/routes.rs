use super::error::{ApiError, err_response};
use crate::AppState;
use crate::cdn::Invalidation;
use crate::claims::Principal;
use crate::store::Distribution;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const USER_NOT_ENTITLED: &str = "User is not entitled to the CloudFront Invalidation service";

#[derive(Debug, Serialize)]
pub struct DistributionsResponse {
    pub distributions: BTreeMap<String, Distribution>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvalidationRequest {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidationResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "createTime")]
    pub create_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl From<Invalidation> for InvalidationResponse {
    fn from(invalidation: Invalidation) -> Self {
        Self {
            status: invalidation.status,
            id: invalidation.id,
            create_time: invalidation.create_time,
            paths: invalidation.paths,
        }
    }
}

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1beta1/distributions
pub async fn list_distributions(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, ApiError> {
    let distributions = state.service.list_distributions(&principal)?;

    if distributions.is_empty() {
        debug!(claims = ?principal.claims(), "Caller has no entitled distributions");
        return Ok(err_response(StatusCode::UNAUTHORIZED, USER_NOT_ENTITLED));
    }

    Ok(Json(DistributionsResponse { distributions }).into_response())
}

/// POST /api/v1beta1/distributions/{name}/invalidations
pub async fn create_invalidation(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    body: Result<Json<InvalidationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(distribution = name, error = %rejection, "Invalid invalidation request body");
            return Ok(err_response(
                StatusCode::BAD_REQUEST,
                &format!("Bad request: {}", rejection.body_text()),
            ));
        }
    };

    let invalidation = state
        .service
        .create_invalidation(&principal, &name, &request.paths)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvalidationResponse::from(invalidation)),
    )
        .into_response())
}

/// GET /api/v1beta1/distributions/{name}/invalidations/{id}
pub async fn get_invalidation(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<InvalidationResponse>, ApiError> {
    let invalidation = state
        .service
        .get_invalidation_status(&principal, &name, &id)
        .await?;

    Ok(Json(invalidation.into()))
}
