use async_trait::async_trait;

use crate::account::Account;
use crate::cookie::{Cookies, SetCookie};
use crate::ids;

/// anything that resolves to the user a session was issued for
pub trait Subject {
    fn user_id(&self) -> ids::UserId;
}

pub struct Resolved<S> {
    pub session: Option<S>,
    /// cookie rewrites that have to ride on whatever response is sent back
    pub cookies: Vec<SetCookie>,
}

impl<S> Resolved<S> {
    pub fn none() -> Self {
        Resolved {
            session: None,
            cookies: Vec::new(),
        }
    }

    pub fn found(session: S) -> Self {
        Resolved {
            session: Some(session),
            cookies: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: SetCookie) -> Self {
        self.cookies.push(cookie);
        self
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Subject + Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// missing or malformed cookies are not an error, they resolve to no
    /// session
    async fn resolve(&self, cookies: &Cookies) -> Result<Resolved<Self::Session>, Self::Error>;

    /// invalidates the session and returns the cookies that clear it on the
    /// client
    async fn sign_out(&self, session: &Self::Session) -> Result<Vec<SetCookie>, Self::Error>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get_account(&self, user_id: ids::UserId) -> Result<Option<Account>, Self::Error>;
}
