use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::{HeaderValue, InvalidHeaderValue, SET_COOKIE};
use http::StatusCode;
use axum_core::response::{IntoResponseParts, ResponseParts};

/// cookies sent by the client, in the order they were received. malformed
/// pairs are skipped instead of failing the whole header.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
}

impl Cookies {
    pub fn new() -> Self {
        Cookies { pairs: Vec::new() }
    }

    pub fn parse<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>
    {
        let mut pairs = Vec::new();

        for header in headers {
            for part in header.split(';') {
                let Some((name, value)) = part.split_once('=') else {
                    continue;
                };

                let name = name.trim();

                if name.is_empty() {
                    continue;
                }

                let value = value.trim().trim_matches('"');

                pairs.push((name.to_owned(), value.to_owned()));
            }
        }

        Cookies { pairs }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// first value found for the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    expires: Option<DateTime<Utc>>,
    max_age: Option<Duration>,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        SetCookie {
            name: name.into(),
            value: value.into(),
            expires: None,
            max_age: None,
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires(&self) -> Option<&DateTime<Utc>> {
        self.expires.as_ref()
    }

    pub fn max_age(&self) -> Option<&Duration> {
        self.max_age.as_ref()
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_domain<D>(mut self, domain: D) -> Self
    where
        D: Into<String>
    {
        self.domain = Some(domain.into());
        self
    }

    pub fn set_domain<D>(&mut self, domain: D)
    where
        D: Into<String>
    {
        self.domain = Some(domain.into());
    }

    pub fn with_path<P>(mut self, path: P) -> Self
    where
        P: Into<String>
    {
        self.path = Some(path.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

impl Display for SetCookie {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}={}", self.name, self.value)?;

        if let Some(expires) = &self.expires {
            write!(f, "; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT"))?;
        }

        if let Some(max_age) = &self.max_age {
            write!(f, "; Max-Age={}", max_age.as_secs())?;
        }

        if let Some(domain) = &self.domain {
            write!(f, "; Domain={}", domain)?;
        }

        if let Some(path) = &self.path {
            write!(f, "; Path={}", path)?;
        }

        if self.secure {
            f.write_str("; Secure")?;
        }

        if self.http_only {
            f.write_str("; HttpOnly")?;
        }

        if let Some(same_site) = &self.same_site {
            write!(f, "; SameSite={}", same_site.as_str())?;
        }

        Ok(())
    }
}

impl IntoResponseParts for SetCookie {
    type Error = (StatusCode, &'static str);

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let Ok(value) = self.to_header_value() else {
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "invalid set-cookie header value"));
        };

        res.headers_mut().append(SET_COOKIE, value);

        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_multiple_headers() {
        let cookies = Cookies::parse([
            "theme=dark; session_id=abc123",
            "lang=ko",
        ]);

        assert_eq!(cookies.get("session_id"), Some("abc123"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("lang"), Some("ko"));
        assert_eq!(cookies.get("missing"), None);
    }

    #[test]
    fn parse_skips_malformed() {
        let cookies = Cookies::parse([";;garbage; =nothing; ok=1; also\u{7f}"]);

        assert_eq!(cookies.get("ok"), Some("1"));
        assert_eq!(cookies.get(""), None);
        assert!(Cookies::parse(Vec::<&str>::new()).is_empty());
    }

    #[test]
    fn parse_first_value_wins() {
        let cookies = Cookies::parse(["session_id=first; session_id=second"]);

        assert_eq!(cookies.get("session_id"), Some("first"));
    }

    #[test]
    fn set_cookie_display() {
        let expires = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        let cookie = SetCookie::new("session_id", "token")
            .with_expires(expires)
            .with_path("/")
            .with_http_only(true)
            .with_secure(true)
            .with_same_site(SameSite::Strict);

        assert_eq!(
            cookie.to_string(),
            "session_id=token; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn set_cookie_expire() {
        let cookie = SetCookie::new("session_id", "")
            .with_max_age(Duration::new(0, 0))
            .with_domain("example.com");

        assert_eq!(cookie.to_string(), "session_id=; Max-Age=0; Domain=example.com");
    }
}
