use base64::{Engine, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Utc};
use deadpool_postgres::GenericClient;
use mfgsite_lib::cookie::{SameSite, SetCookie};
use mfgsite_lib::gate::Subject;
use mfgsite_lib::ids;
use tokio_postgres::{Error as PgError};

use crate::net::error::Error as NetError;
use crate::sec::state::SessionInfo;

pub mod token;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("ran out of token attempts")]
    TokenAttempts,

    #[error("date time value overflowed")]
    UtcOverflow,

    #[error(transparent)]
    Pg(#[from] PgError),

    #[error(transparent)]
    Rand(#[from] rand::Error),
}

impl From<token::UniqueError> for BuilderError {
    fn from(err: token::UniqueError) -> Self {
        match err {
            token::UniqueError::Rand(err) => BuilderError::Rand(err),
            token::UniqueError::Pg(err) => BuilderError::Pg(err)
        }
    }
}

impl From<BuilderError> for NetError {
    fn from(err: BuilderError) -> NetError {
        match err {
            BuilderError::Pg(err) => err.into(),
            BuilderError::Rand(err) => err.into(),
            err => NetError::new().source(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: token::SessionToken,
    pub user_id: ids::UserId,
    pub dropped: bool,
    pub issued_on: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Session {
    pub async fn create(
        conn: &impl GenericClient,
        info: &SessionInfo,
        user_id: ids::UserId,
    ) -> Result<Session, BuilderError> {
        let issued_on = Utc::now();

        let Some(token) = token::SessionToken::unique(conn, 10).await? else {
            return Err(BuilderError::TokenAttempts);
        };

        let Some(expires) = issued_on.checked_add_signed(*info.duration()) else {
            return Err(BuilderError::UtcOverflow);
        };

        let _ = conn.execute(
            "\
            insert into auth_session (token, user_id, dropped, issued_on, expires) values \
            ($1, $2, false, $3, $4)",
            &[&token.as_slice(), &user_id, &issued_on, &expires]
        ).await?;

        Ok(Session {
            token,
            user_id,
            dropped: false,
            issued_on,
            expires,
        })
    }

    pub async fn retrieve_token(
        conn: &impl GenericClient,
        token: &token::SessionToken
    ) -> Result<Option<Session>, PgError> {
        if let Some(row) = conn.query_opt(
            "\
            select auth_session.user_id, \
                   auth_session.dropped, \
                   auth_session.issued_on, \
                   auth_session.expires \
            from auth_session \
            where auth_session.token = $1",
            &[&token.as_slice()]
        ).await? {
            Ok(Some(Session {
                token: token.clone(),
                user_id: row.get(0),
                dropped: row.get(1),
                issued_on: row.get(2),
                expires: row.get(3),
            }))
        } else {
            Ok(None)
        }
    }

    /// true if the session can no longer be used at the given time
    pub fn is_expired(&self, now: &DateTime<Utc>) -> bool {
        self.dropped || self.expires <= *now
    }

    /// pushes the expiration out by the configured duration if less than the
    /// refresh window remains. returns true if the expiration changed
    pub fn refresh(&mut self, info: &SessionInfo, now: DateTime<Utc>) -> Result<bool, BuilderError> {
        if self.expires - now >= *info.refresh() {
            return Ok(false);
        }

        let Some(expires) = now.checked_add_signed(*info.duration()) else {
            return Err(BuilderError::UtcOverflow);
        };

        self.expires = expires;

        Ok(true)
    }

    pub async fn update_expires(&self, conn: &impl GenericClient) -> Result<(), PgError> {
        let _ = conn.execute(
            "update auth_session set expires = $2 where token = $1",
            &[&self.token.as_slice(), &self.expires]
        ).await?;

        Ok(())
    }

    /// marks the session as dropped. dropping twice is not an error
    pub async fn drop_token(conn: &impl GenericClient, token: &token::SessionToken) -> Result<(), PgError> {
        let _ = conn.execute(
            "update auth_session set dropped = true where token = $1",
            &[&token.as_slice()]
        ).await?;

        Ok(())
    }
}

impl Subject for Session {
    fn user_id(&self) -> ids::UserId {
        self.user_id
    }
}

pub type Hash = blake3::Hash;

pub fn create_hash<T>(info: &SessionInfo, token: T) -> Hash
where
    T: AsRef<[u8]>
{
    blake3::keyed_hash(info.key(), token.as_ref())
}

pub fn encode_base64<T>(token: T, hash: Hash) -> String
where
    T: AsRef<[u8]>
{
    let token_ref = token.as_ref();
    let slice = hash.as_bytes();

    let mut joined = Vec::with_capacity(token_ref.len() + slice.len());
    joined.extend_from_slice(token_ref);
    joined.extend_from_slice(slice);

    URL_SAFE.encode(joined)
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("session id is not valid base64")]
    InvalidString,

    #[error("session id has an invalid length")]
    InvalidLength,

    #[error("session id hash does not match")]
    InvalidHash,
}

pub fn decode_base64<S>(
    info: &SessionInfo,
    session_id: S
) -> Result<token::SessionToken, DecodeError>
where
    S: AsRef<[u8]>
{
    let Ok(bytes) = URL_SAFE.decode(session_id) else {
        return Err(DecodeError::InvalidString);
    };

    if bytes.len() != token::SESSION_ID_BYTES + blake3::OUT_LEN {
        return Err(DecodeError::InvalidLength);
    }

    let (token_bytes, hash_bytes) = bytes.split_at(token::SESSION_ID_BYTES);

    let token = token::SessionToken::try_from(token_bytes)
        .map_err(|_| DecodeError::InvalidLength)?;
    let hash: [u8; blake3::OUT_LEN] = hash_bytes.try_into()
        .map_err(|_| DecodeError::InvalidLength)?;

    // blake3::Hash equality is constant time
    if blake3::Hash::from(hash) != create_hash(info, &token) {
        return Err(DecodeError::InvalidHash);
    }

    Ok(token)
}

pub fn create_session_cookie(info: &SessionInfo, session: &Session) -> SetCookie {
    let encoded_token = encode_base64(&session.token, create_hash(info, &session.token));

    let mut cookie = SetCookie::new(SESSION_COOKIE, encoded_token)
        .with_expires(session.expires)
        .with_path("/")
        .with_http_only(true)
        .with_secure(*info.secure())
        .with_same_site(SameSite::Strict);

    if let Some(domain) = info.domain() {
        cookie.set_domain(domain);
    }

    cookie
}

pub fn expire_session_cookie(info: &SessionInfo) -> SetCookie {
    let mut cookie = SetCookie::new(SESSION_COOKIE, "")
        .with_max_age(std::time::Duration::new(0, 0))
        .with_path("/")
        .with_http_only(true)
        .with_secure(*info.secure())
        .with_same_site(SameSite::Strict);

    if let Some(domain) = info.domain() {
        cookie.set_domain(domain);
    }

    cookie
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn info() -> SessionInfo {
        SessionInfo::new([7u8; blake3::KEY_LEN])
            .with_lifetime(Duration::hours(8), Duration::hours(1))
    }

    fn session(expires: DateTime<Utc>) -> Session {
        Session {
            token: token::SessionToken::from([3u8; token::SESSION_ID_BYTES]),
            user_id: 12,
            dropped: false,
            issued_on: Utc::now(),
            expires,
        }
    }

    #[test]
    fn encode_decode() {
        let info = info();
        let token = token::SessionToken::from([9u8; token::SESSION_ID_BYTES]);
        let encoded = encode_base64(&token, create_hash(&info, &token));

        let decoded = decode_base64(&info, &encoded).unwrap();

        assert_eq!(decoded, token);
    }

    #[test]
    fn decode_rejects_other_key() {
        let info = info();
        let other = SessionInfo::new([8u8; blake3::KEY_LEN]);
        let token = token::SessionToken::from([9u8; token::SESSION_ID_BYTES]);
        let encoded = encode_base64(&token, create_hash(&other, &token));

        assert!(matches!(decode_base64(&info, &encoded), Err(DecodeError::InvalidHash)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let info = info();

        assert!(matches!(decode_base64(&info, "not base64!!"), Err(DecodeError::InvalidString)));
        assert!(matches!(decode_base64(&info, URL_SAFE.encode([1u8; 10])), Err(DecodeError::InvalidLength)));
    }

    #[test]
    fn refresh_inside_window() {
        let info = info();
        let now = Utc::now();
        let mut session = session(now + Duration::minutes(30));

        assert!(session.refresh(&info, now).unwrap());
        assert_eq!(session.expires, now + Duration::hours(8));
    }

    #[test]
    fn refresh_outside_window() {
        let info = info();
        let now = Utc::now();
        let expires = now + Duration::hours(4);
        let mut session = session(expires);

        assert!(!session.refresh(&info, now).unwrap());
        assert_eq!(session.expires, expires);
    }

    #[test]
    fn expired_or_dropped() {
        let now = Utc::now();

        assert!(session(now - Duration::seconds(1)).is_expired(&now));
        assert!(!session(now + Duration::seconds(1)).is_expired(&now));

        let mut dropped = session(now + Duration::hours(1));
        dropped.dropped = true;

        assert!(dropped.is_expired(&now));
    }

    #[test]
    fn cookie_attributes() {
        let info = info().with_domain("mfg.example.com".into()).with_secure(false);
        let cookie = create_session_cookie(&info, &session(Utc::now() + Duration::hours(2)));
        let rendered = cookie.to_string();

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Domain=mfg.example.com"));
        assert!(!rendered.contains("Secure"));

        let expired = expire_session_cookie(&info);

        assert_eq!(expired.value(), "");
        assert_eq!(expired.max_age(), Some(&std::time::Duration::new(0, 0)));
    }
}
