use axum::debug_handler;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use mfgsite_lib::account::ApprovalStatus;
use mfgsite_lib::ids;
use serde::{Deserialize, Serialize};

use crate::net::error;
use crate::notify::AccountEvent;
use crate::sec::authn::initiator::Initiator;
use crate::state::ArcShared;
use crate::user;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

fn parse_status(given: &str) -> Option<ApprovalStatus> {
    match given {
        "pending" => Some(ApprovalStatus::Pending),
        "approved" => Some(ApprovalStatus::Approved),
        "rejected" => Some(ApprovalStatus::Rejected),
        _ => None
    }
}

#[derive(Debug, Serialize)]
pub struct ListItem {
    #[serde(flatten)]
    pub user: user::User,
    pub status: ApprovalStatus,
}

impl From<user::User> for ListItem {
    fn from(user: user::User) -> Self {
        let status = user.status();

        ListItem { user, status }
    }
}

#[debug_handler]
pub async fn list_users(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Query(query): Query<ListQuery>,
) -> error::Result<impl IntoResponse> {
    initiator.require_admin()?;

    let status = match query.status.as_deref() {
        Some(given) => Some(parse_status(given).ok_or_else(|| error::Error::api((
            error::ApiErrorKind::InvalidStatus,
            "status must be one of pending, approved or rejected"
        )))?),
        None => None
    };

    let conn = state.pool().get().await?;

    let list: Vec<ListItem> = user::User::list_with_status(&conn, status)
        .await?
        .into_iter()
        .map(ListItem::from)
        .collect();

    Ok(axum::Json(list))
}

async fn decide(
    state: ArcShared,
    initiator: Initiator,
    user_id: ids::UserId,
    approved: bool,
) -> error::Result<axum::Json<ListItem>> {
    initiator.require_admin()?;

    let conn = state.pool().get().await?;

    let Some(updated) = user::User::set_approval(&conn, &user_id, approved).await? else {
        return Err(error::Error::api(error::ApiErrorKind::UserNotFound));
    };

    let item = ListItem::from(updated);

    tracing::info!(
        user_id,
        by = initiator.user.id,
        "account {}",
        item.status
    );

    state.account_events().publish(AccountEvent {
        user_id,
        status: item.status,
        by: initiator.user.id,
        at: item.user.approved_at.unwrap_or_else(Utc::now),
    });

    Ok(axum::Json(item))
}

#[debug_handler]
pub async fn approve(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(user_id): Path<ids::UserId>,
) -> error::Result<impl IntoResponse> {
    decide(state, initiator, user_id, true).await
}

#[debug_handler]
pub async fn reject(
    State(state): State<ArcShared>,
    initiator: Initiator,
    Path(user_id): Path<ids::UserId>,
) -> error::Result<impl IntoResponse> {
    decide(state, initiator, user_id, false).await
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_query_values() {
        assert_eq!(parse_status("pending"), Some(ApprovalStatus::Pending));
        assert_eq!(parse_status("approved"), Some(ApprovalStatus::Approved));
        assert_eq!(parse_status("rejected"), Some(ApprovalStatus::Rejected));
        assert_eq!(parse_status("Pending"), None);
        assert_eq!(parse_status(""), None);
    }
}
