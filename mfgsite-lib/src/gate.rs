//! per request access decisions.
//!
//! the gate resolves the caller's session, classifies the requested path and,
//! when a rule needs it, looks up the caller's account. rules are checked in a
//! fixed order and the first one that matches decides the request:
//!
//! 1. `/` or `/dashboard` carrying a verification marker goes to the login page
//! 2. protected path without a session goes to the login page
//! 3. protected path with an unapproved account is signed out and sent to login
//! 4. admin only path without the admin role goes home
//! 5. auth page with a session goes to the dashboard
//! 6. everything else is allowed
//!
//! failures from the collaborators never allow a request that would otherwise
//! be redirected. cookie rewrites from the session provider are attached to
//! every outcome.

use crate::account::Account;
use crate::cookie::{Cookies, SetCookie};

pub mod paths;
pub mod decision;
pub mod provider;

pub use paths::{RouteSets, Classification};
pub use decision::{Decision, LoginReason, HomeReason, Message};
pub use provider::{Subject, Resolved, SessionProvider, AccountStore};

pub struct Request<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub cookies: &'a Cookies,
}

#[derive(Debug)]
pub struct Outcome {
    pub decision: Decision,
    pub cookies: Vec<SetCookie>,
}

enum AccountState {
    NoSession,
    Found(Account),
    Missing,
    Failed,
}

impl AccountState {
    fn is_approved(&self) -> bool {
        matches!(self, AccountState::Found(account) if account.is_approved)
    }

    fn is_rejected(&self) -> bool {
        matches!(self, AccountState::Found(account) if account.approved_at.is_some())
    }

    fn is_admin(&self) -> bool {
        matches!(self, AccountState::Found(account) if account.is_admin())
    }
}

pub struct Gate<P, A> {
    routes: RouteSets,
    sessions: P,
    accounts: A,
}

impl<P, A> Gate<P, A>
where
    P: SessionProvider,
    A: AccountStore,
{
    pub fn new(routes: RouteSets, sessions: P, accounts: A) -> Self {
        Gate {
            routes,
            sessions,
            accounts,
        }
    }

    pub fn routes(&self) -> &RouteSets {
        &self.routes
    }

    pub fn sessions(&self) -> &P {
        &self.sessions
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    pub async fn evaluate(&self, request: &Request<'_>) -> Outcome {
        let class = self.routes.classify(request.path, request.query);

        let Resolved { session, mut cookies } = match self.sessions.resolve(request.cookies).await {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!("failed to resolve session: {err}");

                Resolved::none()
            }
        };

        if class.verification {
            return Outcome {
                decision: Decision::RedirectToLogin(LoginReason::Verified),
                cookies,
            };
        }

        let account = match &session {
            Some(session) if class.is_protected || class.is_admin_only => {
                self.lookup_account(session.user_id()).await
            }
            _ => AccountState::NoSession,
        };

        if class.is_protected {
            let Some(session) = &session else {
                return Outcome {
                    decision: Decision::RedirectToLogin(
                        LoginReason::RedirectedFrom(request.path.to_owned())
                    ),
                    cookies,
                };
            };

            if !account.is_approved() {
                let reason = if account.is_rejected() {
                    LoginReason::ApprovalRejected
                } else {
                    LoginReason::ApprovalPending
                };

                match self.sessions.sign_out(session).await {
                    Ok(expired) => cookies.extend(expired),
                    Err(err) => {
                        tracing::warn!(
                            user_id = session.user_id(),
                            "failed to sign out unapproved session: {err}"
                        );
                    }
                }

                return Outcome {
                    decision: Decision::RedirectToLogin(reason),
                    cookies,
                };
            }
        }

        if class.is_admin_only && !account.is_admin() {
            return Outcome {
                decision: Decision::RedirectToHome(HomeReason::Unauthorized),
                cookies,
            };
        }

        if class.is_auth_page && !class.is_reset_confirm && session.is_some() {
            return Outcome {
                decision: Decision::RedirectToDashboard,
                cookies,
            };
        }

        Outcome {
            decision: Decision::Allow,
            cookies,
        }
    }

    async fn lookup_account(&self, user_id: crate::ids::UserId) -> AccountState {
        match self.accounts.get_account(user_id).await {
            Ok(Some(account)) => AccountState::Found(account),
            Ok(None) => {
                tracing::warn!(user_id, "no account found for session");

                AccountState::Missing
            }
            Err(err) => {
                tracing::warn!(user_id, "failed to retrieve account: {err}");

                AccountState::Failed
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::account::Role;
    use crate::ids::UserId;

    const SESSION_COOKIE: &str = "session_id";

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct Unavailable;

    struct FakeSession(UserId);

    impl Subject for FakeSession {
        fn user_id(&self) -> UserId {
            self.0
        }
    }

    /// session cookie value is the user id
    #[derive(Default)]
    struct FakeSessions {
        refresh: bool,
        fail: bool,
        sign_outs: AtomicUsize,
    }

    #[async_trait]
    impl SessionProvider for FakeSessions {
        type Session = FakeSession;
        type Error = Unavailable;

        async fn resolve(&self, cookies: &Cookies) -> Result<Resolved<FakeSession>, Unavailable> {
            if self.fail {
                return Err(Unavailable);
            }

            let Some(value) = cookies.get(SESSION_COOKIE) else {
                return Ok(Resolved::none());
            };

            let Ok(user_id) = value.parse::<UserId>() else {
                return Ok(Resolved::none()
                    .with_cookie(SetCookie::new(SESSION_COOKIE, "")));
            };

            let resolved = Resolved::found(FakeSession(user_id));

            if self.refresh {
                Ok(resolved.with_cookie(SetCookie::new(SESSION_COOKIE, value)))
            } else {
                Ok(resolved)
            }
        }

        async fn sign_out(&self, _session: &FakeSession) -> Result<Vec<SetCookie>, Unavailable> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);

            Ok(vec![SetCookie::new(SESSION_COOKIE, "")])
        }
    }

    #[derive(Default)]
    struct FakeAccounts {
        accounts: HashMap<UserId, Account>,
        fail: bool,
        lookups: AtomicUsize,
    }

    impl FakeAccounts {
        fn with(mut self, account: Account) -> Self {
            self.accounts.insert(account.id, account);
            self
        }
    }

    #[async_trait]
    impl AccountStore for FakeAccounts {
        type Error = Unavailable;

        async fn get_account(&self, user_id: UserId) -> Result<Option<Account>, Unavailable> {
            self.lookups.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                Err(Unavailable)
            } else {
                Ok(self.accounts.get(&user_id).cloned())
            }
        }
    }

    const PENDING: UserId = 1;
    const REJECTED: UserId = 2;
    const MEMBER: UserId = 3;
    const ADMIN: UserId = 4;

    fn accounts() -> FakeAccounts {
        let now = Utc::now();

        FakeAccounts::default()
            .with(Account { id: PENDING, role: Role::User, is_approved: false, approved_at: None })
            .with(Account { id: REJECTED, role: Role::User, is_approved: false, approved_at: Some(now) })
            .with(Account { id: MEMBER, role: Role::User, is_approved: true, approved_at: Some(now) })
            .with(Account { id: ADMIN, role: Role::Admin, is_approved: true, approved_at: Some(now) })
    }

    fn gate() -> Gate<FakeSessions, FakeAccounts> {
        Gate::new(RouteSets::default(), FakeSessions::default(), accounts())
    }

    fn session_for(user_id: UserId) -> Cookies {
        Cookies::new().with(SESSION_COOKIE, user_id.to_string())
    }

    async fn decide<P, A>(
        gate: &Gate<P, A>,
        path: &str,
        query: Option<&str>,
        cookies: &Cookies
    ) -> Outcome
    where
        P: SessionProvider,
        A: AccountStore,
    {
        gate.evaluate(&Request { path, query, cookies }).await
    }

    #[tokio::test]
    async fn unclassified_paths_allowed() {
        let gate = gate();

        for path in ["/", "/about", "/ping", "/api/auth/login"] {
            for cookies in [Cookies::new(), session_for(PENDING), session_for(MEMBER)] {
                let outcome = decide(&gate, path, None, &cookies).await;

                assert_eq!(outcome.decision, Decision::Allow, "path: {path}");
            }
        }

        assert_eq!(gate.accounts().lookups.load(Ordering::SeqCst), 0, "no lookups for public paths");
    }

    #[tokio::test]
    async fn protected_without_session() {
        let gate = gate();

        for path in ["/dashboard", "/projects/7", "/gantt", "/calendar", "/notifications", "/admin/users"] {
            let outcome = decide(&gate, path, Some("tab=2"), &Cookies::new()).await;

            assert_eq!(
                outcome.decision,
                Decision::RedirectToLogin(LoginReason::RedirectedFrom(path.to_owned())),
                "path: {path}"
            );
        }

        let outcome = decide(&gate, "/admin/users", None, &Cookies::new()).await;

        assert_eq!(
            outcome.decision.location().as_deref(),
            Some("/login?redirectedFrom=%2Fadmin%2Fusers")
        );
    }

    #[tokio::test]
    async fn pending_account_signed_out() {
        let gate = gate();

        let outcome = decide(&gate, "/projects", None, &session_for(PENDING)).await;

        assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::ApprovalPending));
        assert_eq!(outcome.decision.location().as_deref(), Some("/login?message=approval_pending"));
        assert_eq!(gate.sessions().sign_outs.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.cookies.len(), 1, "expired session cookie");
    }

    #[tokio::test]
    async fn rejected_account_signed_out() {
        let gate = gate();

        let outcome = decide(&gate, "/dashboard", None, &session_for(REJECTED)).await;

        assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::ApprovalRejected));
        assert_eq!(outcome.decision.location().as_deref(), Some("/login?message=approval_rejected"));
        assert_eq!(gate.sessions().sign_outs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unapproved_on_admin_path_is_approval_redirect() {
        let gate = gate();

        let outcome = decide(&gate, "/admin/users", None, &session_for(PENDING)).await;

        assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::ApprovalPending));
        assert_eq!(gate.accounts().lookups.load(Ordering::SeqCst), 1, "single lookup per request");
    }

    #[tokio::test]
    async fn admin_only_paths() {
        let gate = gate();

        for path in ["/admin", "/admin/users", "/admin/reports/weekly"] {
            let outcome = decide(&gate, path, None, &session_for(MEMBER)).await;

            assert_eq!(outcome.decision, Decision::RedirectToHome(HomeReason::Unauthorized), "path: {path}");
            assert_eq!(outcome.decision.location().as_deref(), Some("/?message=unauthorized"));

            let outcome = decide(&gate, path, None, &session_for(ADMIN)).await;

            assert_eq!(outcome.decision, Decision::Allow, "path: {path}");
        }

        assert_eq!(gate.sessions().sign_outs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn admin_only_prefix_outside_protected() {
        let routes = RouteSets {
            admin_only: vec!["/reports".into()],
            ..RouteSets::default()
        };
        let gate = Gate::new(routes, FakeSessions::default(), accounts());

        let outcome = decide(&gate, "/reports/weekly", None, &Cookies::new()).await;
        assert_eq!(outcome.decision, Decision::RedirectToHome(HomeReason::Unauthorized));

        let outcome = decide(&gate, "/reports/weekly", None, &session_for(ADMIN)).await;
        assert_eq!(outcome.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn approved_member_allowed() {
        let gate = gate();

        for path in ["/dashboard", "/projects/3", "/calendar"] {
            let outcome = decide(&gate, path, None, &session_for(MEMBER)).await;

            assert_eq!(outcome.decision, Decision::Allow, "path: {path}");
        }
    }

    #[tokio::test]
    async fn auth_pages_with_session() {
        let gate = gate();

        for path in ["/login", "/signup", "/reset-password"] {
            let outcome = decide(&gate, path, None, &session_for(MEMBER)).await;
            assert_eq!(outcome.decision, Decision::RedirectToDashboard, "path: {path}");

            let outcome = decide(&gate, path, None, &Cookies::new()).await;
            assert_eq!(outcome.decision, Decision::Allow, "path: {path}");
        }

        let outcome = decide(&gate, "/reset-password/confirm", Some("code=abc"), &session_for(MEMBER)).await;
        assert_eq!(outcome.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn verification_marker_first() {
        let gate = gate();

        for cookies in [Cookies::new(), session_for(PENDING), session_for(ADMIN)] {
            let outcome = decide(&gate, "/", Some("message=approval_pending"), &cookies).await;

            assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::Verified));
            assert_eq!(outcome.decision.location().as_deref(), Some("/login?verified=true"));

            let outcome = decide(&gate, "/dashboard", Some("verified=true"), &cookies).await;

            assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::Verified));
        }

        assert_eq!(gate.sessions().sign_outs.load(Ordering::SeqCst), 0);
        assert_eq!(gate.accounts().lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let failing = FakeAccounts {
            fail: true,
            ..accounts()
        };
        let gate = Gate::new(RouteSets::default(), FakeSessions::default(), failing);

        let outcome = decide(&gate, "/projects", None, &session_for(ADMIN)).await;
        assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::ApprovalPending));
        assert_eq!(gate.sessions().sign_outs.load(Ordering::SeqCst), 1);

        let outcome = decide(&gate, "/admin", None, &session_for(ADMIN)).await;
        assert!(!outcome.decision.is_allow());
    }

    #[tokio::test]
    async fn missing_account_fails_closed() {
        let gate = gate();

        let outcome = decide(&gate, "/dashboard", None, &session_for(99)).await;

        assert_eq!(outcome.decision, Decision::RedirectToLogin(LoginReason::ApprovalPending));
        assert_eq!(gate.sessions().sign_outs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_failure_is_no_session() {
        let sessions = FakeSessions {
            fail: true,
            ..FakeSessions::default()
        };
        let gate = Gate::new(RouteSets::default(), sessions, accounts());

        let outcome = decide(&gate, "/dashboard", None, &session_for(ADMIN)).await;
        assert_eq!(
            outcome.decision,
            Decision::RedirectToLogin(LoginReason::RedirectedFrom("/dashboard".into()))
        );

        let outcome = decide(&gate, "/login", None, &session_for(ADMIN)).await;
        assert_eq!(outcome.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn refresh_cookies_on_every_outcome() {
        let sessions = FakeSessions {
            refresh: true,
            ..FakeSessions::default()
        };
        let gate = Gate::new(RouteSets::default(), sessions, accounts());

        let allowed = decide(&gate, "/dashboard", None, &session_for(MEMBER)).await;
        assert!(allowed.decision.is_allow());
        assert_eq!(allowed.cookies.len(), 1);

        let redirected = decide(&gate, "/login", None, &session_for(MEMBER)).await;
        assert_eq!(redirected.decision, Decision::RedirectToDashboard);
        assert_eq!(redirected.cookies.len(), 1);

        let unauthorized = decide(&gate, "/admin", None, &session_for(MEMBER)).await;
        assert_eq!(unauthorized.cookies.len(), 1);

        let signed_out = decide(&gate, "/projects", None, &session_for(PENDING)).await;
        assert_eq!(signed_out.cookies.len(), 2, "refresh then expire");
        assert_eq!(signed_out.cookies[1].value(), "");
    }

    #[tokio::test]
    async fn malformed_cookie_is_no_session() {
        let gate = gate();
        let cookies = Cookies::parse(["session_id=not-a-number"]);

        let outcome = decide(&gate, "/calendar", None, &cookies).await;

        assert_eq!(
            outcome.decision,
            Decision::RedirectToLogin(LoginReason::RedirectedFrom("/calendar".into()))
        );
        assert_eq!(outcome.cookies.len(), 1, "stale cookie cleared");
    }

    #[tokio::test]
    async fn evaluation_is_repeatable() {
        let gate = gate();

        let cases = [
            ("/", None, Cookies::new()),
            ("/dashboard", None, Cookies::new()),
            ("/admin/users", None, session_for(MEMBER)),
            ("/admin/users", None, session_for(ADMIN)),
            ("/login", None, session_for(MEMBER)),
            ("/", Some("verified=true"), Cookies::new()),
        ];

        for (path, query, cookies) in cases {
            let first = decide(&gate, path, query, &cookies).await;
            let second = decide(&gate, path, query, &cookies).await;

            assert_eq!(first.decision, second.decision, "path: {path}");
        }
    }
}
