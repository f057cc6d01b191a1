use async_trait::async_trait;
use axum::http::header::{HeaderMap, COOKIE};
use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use chrono::Utc;
use deadpool_postgres::GenericClient;
use mfgsite_lib::cookie::Cookies;

use crate::net::error;
use crate::sec::state::SessionInfo;
use crate::state::ArcShared;
use crate::user;

use super::session;

/// the signed in user making an api request
pub struct Initiator {
    pub user: user::User,
    pub session: session::Session,
}

impl Initiator {
    pub fn user(&self) -> &user::User {
        &self.user
    }

    pub fn require_admin(&self) -> error::Result<()> {
        if self.user.to_account().is_admin() {
            Ok(())
        } else {
            Err(error::Error::api(error::ApiErrorKind::PermissionDenied))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("session was not found")]
    SessionNotFound,

    #[error("session has expired")]
    SessionExpired(session::Session),

    #[error("user was not found")]
    UserNotFound(session::Session),

    #[error("no session cookie was found")]
    MechanismNotFound,

    #[error(transparent)]
    SessionDecode(#[from] session::DecodeError),

    #[error(transparent)]
    Query(#[from] user::QueryError),

    #[error(transparent)]
    Database(#[from] tokio_postgres::Error),
}

impl From<LookupError> for error::Error {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::SessionNotFound |
            LookupError::SessionExpired(_) |
            LookupError::UserNotFound(_) |
            LookupError::MechanismNotFound |
            LookupError::SessionDecode(_) => error::Error::api(error::ApiErrorKind::Unauthenticated),
            LookupError::Query(err) => err.into(),
            LookupError::Database(err) => err.into(),
        }
    }
}

pub async fn lookup_session_id(
    info: &SessionInfo,
    conn: &impl GenericClient,
    session_id: &str,
) -> Result<Initiator, LookupError> {
    let token = session::decode_base64(info, session_id)?;

    let Some(session) = session::Session::retrieve_token(conn, &token).await? else {
        return Err(LookupError::SessionNotFound);
    };

    if session.is_expired(&Utc::now()) {
        return Err(LookupError::SessionExpired(session));
    }

    if let Some(user) = user::User::query_with_id(conn, &session.user_id).await? {
        Ok(Initiator {
            user,
            session,
        })
    } else {
        Err(LookupError::UserNotFound(session))
    }
}

pub fn header_cookies(headers: &HeaderMap) -> Cookies {
    Cookies::parse(headers.get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok()))
}

pub async fn lookup_header_map(
    info: &SessionInfo,
    conn: &impl GenericClient,
    headers: &HeaderMap
) -> Result<Initiator, LookupError> {
    let cookies = header_cookies(headers);

    if let Some(found) = cookies.get(session::SESSION_COOKIE) {
        return lookup_session_id(info, conn, found).await;
    }

    Err(LookupError::MechanismNotFound)
}

/// only approved accounts make it through. role checks are left to the
/// handler
#[async_trait]
impl FromRequestParts<ArcShared> for Initiator {
    type Rejection = error::Error;

    async fn from_request_parts(parts: &mut Parts, state: &ArcShared) -> Result<Self, Self::Rejection> {
        let conn = state.pool().get().await?;

        let initiator = lookup_header_map(state.sec().session_info(), &conn, &parts.headers).await?;

        if !initiator.user.is_approved {
            return Err(error::Error::api(error::ApiErrorKind::ApprovalRequired));
        }

        Ok(initiator)
    }
}
