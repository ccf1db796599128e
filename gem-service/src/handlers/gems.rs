use crate::dtos::{CreateGemResponse, MessageResponse};
use crate::models::gem::missing_required_fields;
use crate::models::{Gem, GemChanges, GemId};
use crate::services::UpdateOutcome;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{Map, Value};
use service_core::error::AppError;

type JsonObject = Map<String, Value>;

fn object_body(body: Result<Json<JsonObject>, JsonRejection>) -> Result<JsonObject, AppError> {
    body.map(|Json(object)| object).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected request body");
        AppError::bad_request("Request body must be a JSON object")
    })
}

/// Log a store failure with context and swap in the fixed client message.
fn store_error(
    message: &'static str,
    gem_id: Option<GemId>,
) -> impl FnOnce(AppError) -> AppError {
    move |e| {
        match gem_id {
            Some(id) => tracing::error!(gem_id = %id, error = %e, "{}", message),
            None => tracing::error!(error = %e, "{}", message),
        }
        e.with_public_message(message)
    }
}

pub async fn list_gems(State(state): State<AppState>) -> Result<Json<Vec<Gem>>, AppError> {
    let gems = state
        .store
        .list()
        .await
        .map_err(store_error("Failed to fetch gems", None))?;
    Ok(Json(gems))
}

pub async fn get_gem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Gem>, AppError> {
    let id = GemId::parse(&id)?;

    let gem = state
        .store
        .find(id)
        .await
        .map_err(store_error("Failed to fetch gem", Some(id)))?
        .ok_or_else(|| AppError::not_found("Gem not found"))?;

    Ok(Json(gem))
}

/// Requires non-empty `title`, `description` and `category`. The server
/// assigns `_id` and `submissionDate`; everything else is stored as sent.
pub async fn create_gem(
    State(state): State<AppState>,
    body: Result<Json<JsonObject>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = object_body(body)?;

    let missing = missing_required_fields(&body);
    if !missing.is_empty() {
        return Err(AppError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let gem = Gem::new(GemId::generate(), body, Utc::now());
    let inserted_id = state
        .store
        .insert(&gem)
        .await
        .map_err(store_error("Failed to create gem", gem.id()))?;

    tracing::info!(gem_id = %inserted_id, "Gem created");

    Ok((
        StatusCode::CREATED,
        Json(CreateGemResponse {
            message: "Gem created successfully".to_string(),
            inserted_id: inserted_id.to_string(),
            new_gem: gem,
        }),
    ))
}

/// Merges the body's fields into the gem. `_id`/`id` are ignored.
///
/// `submissionDate` is NOT protected: a client can overwrite the original
/// submission timestamp through this route.
pub async fn update_gem(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<JsonObject>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = GemId::parse(&id)?;
    let changes = GemChanges::from_body(object_body(body)?);

    let outcome = state
        .store
        .update(id, changes)
        .await
        .map_err(store_error("Failed to update gem", Some(id)))?;

    match outcome {
        UpdateOutcome::NotFound => Err(AppError::not_found("Gem not found")),
        UpdateOutcome::Unchanged => Ok(Json(MessageResponse::new("No changes made to the gem"))),
        UpdateOutcome::Modified => {
            tracing::info!(gem_id = %id, "Gem updated");
            Ok(Json(MessageResponse::new("Gem updated successfully")))
        }
    }
}

pub async fn delete_gem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = GemId::parse(&id)?;

    let deleted = state
        .store
        .delete(id)
        .await
        .map_err(store_error("Failed to delete gem", Some(id)))?;

    if !deleted {
        return Err(AppError::not_found("Gem not found or already deleted"));
    }

    tracing::info!(gem_id = %id, "Gem deleted");
    Ok(Json(MessageResponse::new("Gem deleted successfully")))
}
