pub mod transition;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use ridepool_common::{derive_view_model, format_fare, GeoPoint, Principal, Ride, Role};

use crate::auth::{constant_time_eq, AuthPrincipal};
use crate::AppState;

// --- Request structs ---

#[derive(Deserialize)]
pub struct CreateRideRequest {
    pickup: GeoPoint,
    dropoff: GeoPoint,
}

#[derive(Deserialize)]
pub struct RidesQuery {
    limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct MintTokenRequest {
    mint_secret: String,
    user_id: Uuid,
    role: Role,
}

// --- Helpers ---

/// Rider, assigned driver, and admins may see a ride.
pub fn can_view(ride: &Ride, principal: Principal) -> bool {
    principal.role == Role::Admin
        || principal.id == ride.rider_id
        || Some(principal.id) == ride.driver_id
}

pub(crate) fn ride_json(ride: &Ride) -> serde_json::Value {
    let mut value = serde_json::to_value(ride).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "fare_display".to_string(),
            serde_json::json!(format_fare(ride.fare_cents)),
        );
    }
    value
}

fn not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "ride not found"})),
    )
        .into_response()
}

// --- Handlers ---

/// Mint a token for a known user. Guarded by a shared operator secret;
/// production deployments issue tokens from their identity provider and
/// never configure this secret for end users.
pub async fn api_mint_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MintTokenRequest>,
) -> impl IntoResponse {
    if !constant_time_eq(
        body.mint_secret.as_bytes(),
        state.config.token_mint_secret.as_bytes(),
    ) {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "invalid mint secret"})),
        )
            .into_response();
    }

    match state.jwt.create_token(body.user_id, body.role) {
        Ok(token) => Json(serde_json::json!({ "token": token })).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to mint token");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_create_ride(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(body): Json<CreateRideRequest>,
) -> impl IntoResponse {
    if principal.role != Role::Rider {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "only riders can request rides"})),
        )
            .into_response();
    }
    if !body.pickup.in_range() || !body.dropoff.in_range() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "coordinates out of range"})),
        )
            .into_response();
    }

    let ride = Ride::request(principal.id, body.pickup, body.dropoff);
    match state.store.create(&ride).await {
        Ok(()) => {
            info!(ride = %ride.id, rider = %principal.id, "ride requested");
            (StatusCode::CREATED, Json(ride_json(&ride))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to create ride");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_list_rides(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Query(params): Query<RidesQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(20).min(100);
    match state.store.list_for_user(principal.id, limit).await {
        Ok(rides) => {
            let rides: Vec<serde_json::Value> = rides.iter().map(ride_json).collect();
            Json(serde_json::json!({ "rides": rides })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to list rides");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_ride_detail(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.find_by_id(id).await {
        // Non-parties get 404 rather than confirmation that the ride exists.
        Ok(Some(ride)) if can_view(&ride, principal) => Json(ride_json(&ride)).into_response(),
        Ok(_) => not_found(),
        Err(e) => {
            warn!(error = %e, ride = %id, "failed to load ride");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_ride_progress(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.store.find_by_id(id).await {
        Ok(Some(ride)) if can_view(&ride, principal) => {
            Json(serde_json::json!({ "steps": derive_view_model(&ride) })).into_response()
        }
        Ok(_) => not_found(),
        Err(e) => {
            warn!(error = %e, ride = %id, "failed to load ride progress");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
