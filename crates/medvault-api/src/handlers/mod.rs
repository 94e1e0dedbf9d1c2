pub mod documents;
pub mod download;
pub mod events;
pub mod health;
pub mod professionals;

use medvault_core::models::HealthEvent;
use medvault_core::AppError;
use uuid::Uuid;

use crate::auth::UserContext;
use crate::state::AppState;

/// Load an event the caller owns.
pub(crate) async fn owned_event(
    state: &AppState,
    user: &UserContext,
    event_id: Uuid,
) -> Result<HealthEvent, AppError> {
    let event = state
        .events
        .get(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !user.can_access(event.user_id) {
        return Err(AppError::Forbidden(format!(
            "Event {} belongs to another user",
            event_id
        )));
    }
    Ok(event)
}
