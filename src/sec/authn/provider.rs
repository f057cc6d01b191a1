//! postgres backed collaborators for the request gate

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use mfgsite_lib::account::{Account, Role};
use mfgsite_lib::cookie::{Cookies, SetCookie};
use mfgsite_lib::gate::{AccountStore, Resolved, SessionProvider};
use mfgsite_lib::ids;
use tokio_postgres::{Error as PgError};

use crate::sec::state::SessionInfo;

use super::session::{self, Session};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    Database(#[from] PgError),

    #[error(transparent)]
    Builder(#[from] session::BuilderError),
}

pub struct PgSessions {
    pool: Pool,
    info: Arc<SessionInfo>,
}

impl PgSessions {
    pub fn new(pool: Pool, info: Arc<SessionInfo>) -> Self {
        PgSessions { pool, info }
    }

    fn clear(&self) -> Resolved<Session> {
        Resolved::none().with_cookie(session::expire_session_cookie(&self.info))
    }
}

#[async_trait]
impl SessionProvider for PgSessions {
    type Session = Session;
    type Error = ResolveError;

    async fn resolve(&self, cookies: &Cookies) -> Result<Resolved<Session>, ResolveError> {
        let Some(session_id) = cookies.get(session::SESSION_COOKIE) else {
            return Ok(Resolved::none());
        };

        let token = match session::decode_base64(&self.info, session_id) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!("rejecting session cookie: {err}");

                return Ok(self.clear());
            }
        };

        let conn = self.pool.get().await?;

        let Some(mut session) = Session::retrieve_token(&conn, &token).await? else {
            tracing::debug!("session cookie does not match a stored session");

            return Ok(self.clear());
        };

        let now = Utc::now();

        if session.is_expired(&now) {
            return Ok(self.clear());
        }

        if session.refresh(&self.info, now)? {
            session.update_expires(&conn).await?;

            tracing::debug!(user_id = session.user_id, "refreshed session to {}", session.expires);

            let cookie = session::create_session_cookie(&self.info, &session);

            return Ok(Resolved::found(session).with_cookie(cookie));
        }

        Ok(Resolved::found(session))
    }

    async fn sign_out(&self, session: &Session) -> Result<Vec<SetCookie>, ResolveError> {
        let conn = self.pool.get().await?;

        Session::drop_token(&conn, &session.token).await?;

        Ok(vec![session::expire_session_cookie(&self.info)])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("unknown role value for user: {0}")]
    MalformedRole(i16),

    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    Database(#[from] PgError),
}

pub struct PgAccounts {
    pool: Pool,
}

impl PgAccounts {
    pub fn new(pool: Pool) -> Self {
        PgAccounts { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccounts {
    type Error = LookupError;

    async fn get_account(&self, user_id: ids::UserId) -> Result<Option<Account>, LookupError> {
        let conn = self.pool.get().await?;

        let Some(row) = conn.query_opt(
            "\
            select users.id, \
                   users.role, \
                   users.is_approved, \
                   users.approved_at \
            from users \
            where users.id = $1",
            &[&user_id]
        ).await? else {
            return Ok(None);
        };

        let role_int: i16 = row.get(1);
        let Some(role) = Role::from_i16(role_int) else {
            return Err(LookupError::MalformedRole(role_int));
        };

        Ok(Some(Account {
            id: row.get(0),
            role,
            is_approved: row.get(2),
            approved_at: row.get(3),
        }))
    }
}
