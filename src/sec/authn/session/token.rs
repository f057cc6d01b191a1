use rand::RngCore;
use tokio_postgres::{Error as PgError};
use deadpool_postgres::GenericClient;

use crate::net::error;

pub const SESSION_ID_BYTES: usize = 48;

#[derive(Debug, thiserror::Error)]
pub enum UniqueError {
    #[error(transparent)]
    Rand(#[from] rand::Error),

    #[error(transparent)]
    Pg(#[from] PgError),
}

impl From<UniqueError> for error::Error {
    fn from(err: UniqueError) -> error::Error {
        match err {
            UniqueError::Rand(e) => e.into(),
            UniqueError::Pg(e) => e.into(),
        }
    }
}

/// random bytes identifying a row in auth_session
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SessionToken([u8; SESSION_ID_BYTES]);

impl SessionToken {
    /// generates random tokens until one is found that is not already
    /// stored. gives up after the given number of attempts
    pub async fn unique(conn: &impl GenericClient, mut attempts: usize) -> Result<Option<Self>, UniqueError> {
        let mut rtn = [0; SESSION_ID_BYTES];

        while attempts > 0 {
            rand::thread_rng().try_fill_bytes(&mut rtn)?;

            let count = conn.execute(
                "select token from auth_session where token = $1",
                &[&rtn.as_slice()]
            ).await?;

            if count == 0 {
                return Ok(Some(SessionToken(rtn)));
            }

            attempts -= 1;
        }

        Ok(None)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsRef<[u8]> for SessionToken {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<[u8; SESSION_ID_BYTES]> for SessionToken {
    fn from(bytes: [u8; SESSION_ID_BYTES]) -> Self {
        SessionToken(bytes)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("data does not have the proper length")]
pub struct InvalidLength;

impl TryFrom<&[u8]> for SessionToken {
    type Error = InvalidLength;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        if let Ok(array) = slice.try_into() {
            Ok(SessionToken(array))
        } else {
            Err(InvalidLength)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slice_length() {
        assert!(SessionToken::try_from([1u8; SESSION_ID_BYTES].as_slice()).is_ok());
        assert!(SessionToken::try_from([1u8; SESSION_ID_BYTES - 1].as_slice()).is_err());
        assert!(SessionToken::try_from([1u8; SESSION_ID_BYTES + 1].as_slice()).is_err());
    }
}
