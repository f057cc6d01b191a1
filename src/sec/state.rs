use std::sync::Arc;

use chrono::Duration;

use crate::error::{self, Context};
use crate::config;

/// hkdf info used to derive the key that signs session cookies
pub const SESSION_KEY_INFO: &[u8] = b"mfgsite/session";

#[derive(Debug)]
pub struct SessionInfo {
    key: [u8; blake3::KEY_LEN],
    domain: Option<String>,
    secure: bool,
    duration: Duration,
    refresh: Duration,
}

impl SessionInfo {
    pub fn new(key: [u8; blake3::KEY_LEN]) -> Self {
        SessionInfo {
            key,
            domain: None,
            secure: true,
            duration: Duration::days(7),
            refresh: Duration::days(1),
        }
    }

    pub fn from_config(config: &config::Config) -> error::Result<Self> {
        tracing::debug!("creating SessionInfo state");

        let mut key = [0u8; blake3::KEY_LEN];

        config.kdf.expand(SESSION_KEY_INFO, &mut key)?;

        let session = &config.settings.sec.session;
        let duration = Duration::from_std(session.duration)
            .context("sec.session.duration is too large")?;
        let refresh = Duration::from_std(session.refresh)
            .context("sec.session.refresh is too large")?;

        let mut info = SessionInfo::new(key)
            .with_secure(session.secure)
            .with_lifetime(duration, refresh);

        if let Some(domain) = &session.domain {
            info = info.with_domain(domain.clone());
        }

        Ok(info)
    }

    pub fn with_domain(mut self, domain: String) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_lifetime(mut self, duration: Duration, refresh: Duration) -> Self {
        self.duration = duration;
        self.refresh = refresh;
        self
    }

    pub fn key(&self) -> &[u8; blake3::KEY_LEN] {
        &self.key
    }

    pub fn domain(&self) -> Option<&String> {
        self.domain.as_ref()
    }

    pub fn secure(&self) -> &bool {
        &self.secure
    }

    /// how long a new or refreshed session stays valid
    pub fn duration(&self) -> &Duration {
        &self.duration
    }

    /// sessions with less than this remaining are extended on use
    pub fn refresh(&self) -> &Duration {
        &self.refresh
    }
}

#[derive(Debug, Clone)]
pub struct Sec {
    session_info: Arc<SessionInfo>,
}

impl Sec {
    pub fn from_config(config: &config::Config) -> error::Result<Sec> {
        tracing::debug!("creating Sec state");

        Ok(Sec {
            session_info: Arc::new(SessionInfo::from_config(config)?),
        })
    }

    pub fn session_info(&self) -> &Arc<SessionInfo> {
        &self.session_info
    }
}
