//! Notification handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::PaginatedResponse;
use crate::notification::{ListNotificationsQuery, Notification, NotificationService};

pub async fn list_notifications(
    State(service): State<Arc<NotificationService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<PaginatedResponse<Notification>>, ApiError> {
    let result = service.list_notifications(actor.user_id, &query).await?;
    Ok(Json(result))
}

pub async fn mark_read(
    State(service): State<Arc<NotificationService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = service.mark_read(id, actor.user_id).await?;
    Ok(Json(notification))
}
