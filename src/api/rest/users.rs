use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{GeoPoint, Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
    pub location: GeoPoint,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.email.trim().is_empty() {
        return Err(AppError::BadRequest("email cannot be empty".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        mobile: payload.mobile,
        role: payload.role,
        location: payload.location,
        socket_id: None,
        is_online: false,
        updated_at: Utc::now(),
    };

    state.users.insert(user.id, user.clone());
    Ok(Json(user))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

    Ok(Json(user.value().clone()))
}
