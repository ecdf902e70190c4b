//! The status transition endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use ridepool_common::{RideStatus, TransitionError};

use crate::auth::AuthPrincipal;
use crate::service::{self, ServiceError};
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    status: RideStatus,
}

pub async fn api_update_status(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    match service::execute_transition(
        state.store.as_ref(),
        state.sink.as_ref(),
        id,
        body.status,
        principal,
    )
    .await
    {
        Ok(ride) => Json(super::ride_json(&ride)).into_response(),
        Err(e) => error_response(e, id),
    }
}

fn error_response(err: ServiceError, ride_id: Uuid) -> Response {
    let (status, code) = match &err {
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ServiceError::Decision(TransitionError::Invalid { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
        }
        ServiceError::Decision(TransitionError::Unauthorized { from, to, role, principal_id }) => {
            // Audit trail for refused transitions.
            warn!(
                ride = %ride_id,
                %from,
                %to,
                %role,
                actor = %principal_id,
                "unauthorized transition refused"
            );
            (StatusCode::FORBIDDEN, "unauthorized")
        }
        ServiceError::Decision(TransitionError::NoOp { .. }) => (StatusCode::CONFLICT, "no_op"),
        ServiceError::Conflict => (StatusCode::CONFLICT, "conflict"),
        ServiceError::Storage(e) => {
            warn!(error = %e, ride = %ride_id, "transition storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };

    (
        status,
        Json(serde_json::json!({
            "error": err.to_string(),
            "code": code,
        })),
    )
        .into_response()
}
