use chrono::{DateTime, Utc};
use deadpool_postgres::GenericClient;
use futures::TryStreamExt;
use mfgsite_lib::account::{Account, ApprovalStatus, Role};
use mfgsite_lib::ids;
use serde::Serialize;
use tokio_postgres::{Error as PgError, Row};

use crate::net::error;
use crate::sql;

/// constraint raised when an email is already registered
pub const EMAIL_UNIQUE: &str = "users_email_key";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown role value returned from database: {0}")]
    UnknownRole(i16),

    #[error(transparent)]
    Pg(#[from] PgError),
}

impl From<QueryError> for error::Error {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Pg(err) => err.into(),
            err => error::Error::new().source(err),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: ids::UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str = "\
    users.id, \
    users.email, \
    users.name, \
    users.role, \
    users.is_approved, \
    users.approved_at, \
    users.created, \
    users.updated";

impl User {
    fn from_row(row: &Row) -> Result<User, QueryError> {
        let role_int: i16 = row.get(3);
        let Some(role) = Role::from_i16(role_int) else {
            return Err(QueryError::UnknownRole(role_int));
        };

        Ok(User {
            id: row.get(0),
            email: row.get(1),
            name: row.get(2),
            role,
            is_approved: row.get(4),
            approved_at: row.get(5),
            created: row.get(6),
            updated: row.get(7),
        })
    }

    pub fn status(&self) -> ApprovalStatus {
        self.to_account().status()
    }

    pub fn to_account(&self) -> Account {
        Account {
            id: self.id,
            role: self.role,
            is_approved: self.is_approved,
            approved_at: self.approved_at,
        }
    }

    pub async fn query_with_id(conn: &impl GenericClient, id: &ids::UserId) -> Result<Option<User>, QueryError> {
        let query = format!("select {USER_COLUMNS} from users where users.id = $1");

        if let Some(row) = conn.query_opt(query.as_str(), &[id]).await? {
            Ok(Some(Self::from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn query_with_email(conn: &impl GenericClient, email: &str) -> Result<Option<User>, QueryError> {
        let query = format!("select {USER_COLUMNS} from users where users.email = $1");

        if let Some(row) = conn.query_opt(query.as_str(), &[&email]).await? {
            Ok(Some(Self::from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    /// new accounts always start as unapproved users
    pub async fn create(conn: &impl GenericClient, email: &str, name: &str) -> Result<User, QueryError> {
        let query = format!(
            "insert into users (email, name, role, is_approved, created) \
             values ($1, $2, $3, false, now()) \
             returning {}",
            USER_COLUMNS.replace("users.", "")
        );

        let row = conn.query_one(
            query.as_str(),
            &[&email, &name, &Role::User.as_i16()]
        ).await?;

        Self::from_row(&row)
    }

    pub async fn list_with_status(conn: &impl GenericClient, status: Option<ApprovalStatus>) -> Result<Vec<User>, QueryError> {
        let filter = match status {
            Some(ApprovalStatus::Pending) => "where not users.is_approved and users.approved_at is null",
            Some(ApprovalStatus::Approved) => "where users.is_approved",
            Some(ApprovalStatus::Rejected) => "where not users.is_approved and users.approved_at is not null",
            None => "",
        };
        let query = format!("select {USER_COLUMNS} from users {filter} order by users.created");
        let params: sql::ParamsVec = vec![];

        let result = conn.query_raw(query.as_str(), params).await?;

        futures::pin_mut!(result);

        let mut list = Vec::with_capacity(10);

        while let Some(row) = result.try_next().await? {
            list.push(Self::from_row(&row)?);
        }

        Ok(list)
    }

    /// records an approve or reject decision. approved_at is stamped either
    /// way so a rejected account can be told apart from a pending one
    pub async fn set_approval(
        conn: &impl GenericClient,
        id: &ids::UserId,
        approved: bool,
    ) -> Result<Option<User>, QueryError> {
        let query = format!(
            "update users \
             set is_approved = $2, approved_at = now(), updated = now() \
             where id = $1 \
             returning {}",
            USER_COLUMNS.replace("users.", "")
        );

        if let Some(row) = conn.query_opt(query.as_str(), &[id, &approved]).await? {
            Ok(Some(Self::from_row(&row)?))
        } else {
            Ok(None)
        }
    }
}
