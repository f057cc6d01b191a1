use url::form_urlencoded;

/// every path under this prefix requires the admin role regardless of the
/// configured admin only prefixes
pub const ADMIN_ROOT: &str = "/admin";

pub const VERIFIED_KEY: &str = "verified";
pub const VERIFIED_VALUE: &str = "true";
pub const MESSAGE_KEY: &str = "message";
pub const LEGACY_PENDING_VALUE: &str = "approval_pending";

const VERIFY_LANDING: [&str; 2] = ["/", "/dashboard"];

/// the prefix sets a request path is checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSets {
    pub protected: Vec<String>,
    pub admin_only: Vec<String>,
    pub auth: Vec<String>,
    pub reset_confirm: String,
}

impl Default for RouteSets {
    fn default() -> Self {
        RouteSets {
            protected: vec![
                "/dashboard".into(),
                "/projects".into(),
                "/admin".into(),
                "/gantt".into(),
                "/calendar".into(),
                "/notifications".into(),
            ],
            admin_only: vec![
                "/admin/users".into(),
                "/admin/reports".into(),
            ],
            auth: vec![
                "/login".into(),
                "/signup".into(),
                "/reset-password".into(),
            ],
            reset_confirm: "/reset-password/confirm".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    /// landing on `/` or `/dashboard` after email verification or with the
    /// legacy pending marker
    pub verification: bool,
    pub is_protected: bool,
    pub is_admin_only: bool,
    pub is_auth_page: bool,
    pub is_reset_confirm: bool,
}

impl RouteSets {
    pub fn classify(&self, path: &str, query: Option<&str>) -> Classification {
        let verification = VERIFY_LANDING.contains(&path) && query
            .map(has_verification_marker)
            .unwrap_or(false);

        let is_admin_only = path.starts_with(ADMIN_ROOT) ||
            starts_with_any(path, &self.admin_only);

        Classification {
            verification,
            is_protected: starts_with_any(path, &self.protected),
            is_admin_only,
            is_auth_page: starts_with_any(path, &self.auth),
            is_reset_confirm: !self.reset_confirm.is_empty() &&
                path.starts_with(self.reset_confirm.as_str()),
        }
    }
}

fn starts_with_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

fn has_verification_marker(query: &str) -> bool {
    form_urlencoded::parse(query.as_bytes()).any(|(key, value)| {
        (key == VERIFIED_KEY && value == VERIFIED_VALUE) ||
            (key == MESSAGE_KEY && value == LEGACY_PENDING_VALUE)
    })
}
