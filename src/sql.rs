use tokio_postgres::{Error as PgError};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;

pub type ParamsVec<'a> = Vec<&'a (dyn ToSql + Sync)>;

/// name of the violated constraint if the error is a unique violation
pub fn unique_constraint_error(error: &PgError) -> Option<&str> {
    let Some(db_error) = error.as_db_error() else {
        return None;
    };

    if *db_error.code() == SqlState::UNIQUE_VIOLATION {
        db_error.constraint()
    } else {
        None
    }
}
