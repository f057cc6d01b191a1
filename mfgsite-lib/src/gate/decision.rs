use url::form_urlencoded;

use super::paths;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";

pub const REDIRECTED_FROM_KEY: &str = "redirectedFrom";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    ApprovalPending,
    ApprovalRejected,
    Unauthorized,
}

impl Message {
    pub fn as_str(&self) -> &'static str {
        match self {
            Message::ApprovalPending => "approval_pending",
            Message::ApprovalRejected => "approval_rejected",
            Message::Unauthorized => "unauthorized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReason {
    Verified,
    RedirectedFrom(String),
    ApprovalPending,
    ApprovalRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeReason {
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin(LoginReason),
    RedirectToHome(HomeReason),
    RedirectToDashboard,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// the `Location` a redirect sends the client to. `None` for `Allow`
    pub fn location(&self) -> Option<String> {
        match self {
            Decision::Allow => None,
            Decision::RedirectToLogin(reason) => {
                let mut query = form_urlencoded::Serializer::new(String::new());

                match reason {
                    LoginReason::Verified => {
                        query.append_pair(paths::VERIFIED_KEY, paths::VERIFIED_VALUE);
                    }
                    LoginReason::RedirectedFrom(path) => {
                        query.append_pair(REDIRECTED_FROM_KEY, path);
                    }
                    LoginReason::ApprovalPending => {
                        query.append_pair(paths::MESSAGE_KEY, Message::ApprovalPending.as_str());
                    }
                    LoginReason::ApprovalRejected => {
                        query.append_pair(paths::MESSAGE_KEY, Message::ApprovalRejected.as_str());
                    }
                }

                Some(format!("{LOGIN_PATH}?{}", query.finish()))
            }
            Decision::RedirectToHome(reason) => {
                let message = match reason {
                    HomeReason::Unauthorized => Message::Unauthorized,
                };

                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(paths::MESSAGE_KEY, message.as_str())
                    .finish();

                Some(format!("{HOME_PATH}?{query}"))
            }
            Decision::RedirectToDashboard => Some(DASHBOARD_PATH.to_owned()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn locations() {
        assert_eq!(Decision::Allow.location(), None);
        assert_eq!(
            Decision::RedirectToLogin(LoginReason::Verified).location().as_deref(),
            Some("/login?verified=true")
        );
        assert_eq!(
            Decision::RedirectToLogin(LoginReason::RedirectedFrom("/admin/users".into())).location().as_deref(),
            Some("/login?redirectedFrom=%2Fadmin%2Fusers")
        );
        assert_eq!(
            Decision::RedirectToLogin(LoginReason::ApprovalPending).location().as_deref(),
            Some("/login?message=approval_pending")
        );
        assert_eq!(
            Decision::RedirectToLogin(LoginReason::ApprovalRejected).location().as_deref(),
            Some("/login?message=approval_rejected")
        );
        assert_eq!(
            Decision::RedirectToHome(HomeReason::Unauthorized).location().as_deref(),
            Some("/?message=unauthorized")
        );
        assert_eq!(Decision::RedirectToDashboard.location().as_deref(), Some("/dashboard"));
    }

    #[test]
    fn redirected_from_is_encoded() {
        let decision = Decision::RedirectToLogin(LoginReason::RedirectedFrom("/projects/a b&c".into()));

        assert_eq!(
            decision.location().as_deref(),
            Some("/login?redirectedFrom=%2Fprojects%2Fa+b%26c")
        );
    }
}
