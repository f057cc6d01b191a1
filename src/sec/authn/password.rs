use argon2::Variant;
use deadpool_postgres::GenericClient;
use mfgsite_lib::ids;
use rand::RngCore;
use tokio_postgres::{Error as PgError};

use crate::net::error::Error as NetError;

pub const SALT_LEN: usize = 32;

pub type Salt = [u8; SALT_LEN];

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed creating password")]
    CreateFailed,

    #[error(transparent)]
    Rand(#[from] rand::Error),

    #[error(transparent)]
    Argon2(#[from] argon2::Error),

    #[error(transparent)]
    Db(#[from] PgError)
}

impl From<PasswordError> for NetError {
    fn from(err: PasswordError) -> Self {
        NetError::new().source(err)
    }
}

pub fn gen_salt() -> Result<Salt, rand::Error> {
    let mut salt = [0u8; SALT_LEN];

    rand::thread_rng().try_fill_bytes(&mut salt)?;

    Ok(salt)
}

pub fn gen_hash(password: &str, salt: &[u8]) -> Result<String, argon2::Error> {
    let mut config = argon2::Config::default();
    config.mem_cost = 19456;
    config.variant = Variant::Argon2id;

    argon2::hash_encoded(password.as_bytes(), salt, &config)
}

pub struct Password {
    pub user_id: ids::UserId,
    pub hash: String,
}

impl Password {
    pub async fn retrieve(
        conn: &impl GenericClient,
        user_id: &ids::UserId,
    ) -> Result<Option<Password>, PgError> {
        if let Some(row) = conn.query_opt(
            "\
            select auth_password.user_id, \
                   auth_password.hash \
            from auth_password \
            where auth_password.user_id = $1",
            &[user_id]
        ).await? {
            Ok(Some(Password {
                user_id: row.get(0),
                hash: row.get(1),
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn create(
        conn: &impl GenericClient,
        user_id: &ids::UserId,
        password: &str,
    ) -> Result<Self, PasswordError> {
        let salt = gen_salt()?;
        let hash = gen_hash(password, &salt)?;

        let result = conn.execute(
            "\
            insert into auth_password (user_id, hash, updated) values \
            ($1, $2, now())",
            &[user_id, &hash]
        ).await?;

        if result != 1 {
            return Err(PasswordError::CreateFailed);
        }

        Ok(Password {
            user_id: *user_id,
            hash,
        })
    }

    pub fn verify<C>(&self, check: C) -> Result<bool, PasswordError>
    where
        C: AsRef<[u8]>
    {
        Ok(argon2::verify_encoded(&self.hash, check.as_ref())?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let salt = gen_salt().unwrap();
        let hash = gen_hash("line-4-torque-spec", &salt).unwrap();

        assert!(hash.starts_with("$argon2id$"));

        let password = Password {
            user_id: 1,
            hash,
        };

        assert!(password.verify("line-4-torque-spec").unwrap());
        assert!(!password.verify("line-4-torque-spex").unwrap());
    }
}
