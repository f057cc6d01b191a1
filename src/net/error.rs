use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use strum::AsRefStr as StrumAsRefStr;
use tracing::Level;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumAsRefStr, Serialize)]
pub enum ApiErrorKind {
    InternalFailure,
    Timeout,
    NotFound,

    Unauthenticated,
    PermissionDenied,
    ApprovalRequired,
    AlreadyAuthenticated,
    InvalidCredentials,

    EmailExists,
    InvalidEmail,
    InvalidPassword,
    InvalidName,
    InvalidStatus,
    UserNotFound,
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

impl From<&ApiErrorKind> for StatusCode {
    fn from(kind: &ApiErrorKind) -> Self {
        match kind {
            ApiErrorKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiErrorKind::NotFound |
            ApiErrorKind::UserNotFound => StatusCode::NOT_FOUND,
            ApiErrorKind::AlreadyAuthenticated |
            ApiErrorKind::InvalidEmail |
            ApiErrorKind::InvalidPassword |
            ApiErrorKind::InvalidName |
            ApiErrorKind::InvalidStatus => StatusCode::BAD_REQUEST,
            ApiErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiErrorKind::PermissionDenied |
            ApiErrorKind::ApprovalRequired |
            ApiErrorKind::InvalidCredentials => StatusCode::FORBIDDEN,
            ApiErrorKind::EmailExists => StatusCode::CONFLICT,
        }
    }
}

/// the json body sent back to the client when a request fails
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(rename = "error")]
    kind: ApiErrorKind,
    #[serde(rename = "message", skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl ApiError {
    pub fn new() -> Self {
        ApiError {
            kind: ApiErrorKind::InternalFailure,
            msg: None,
        }
    }

    pub fn with_kind(mut self, kind: ApiErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_message<M>(mut self, msg: M) -> Self
    where
        M: Into<String>
    {
        self.msg = Some(msg.into());
        self
    }

    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.msg.as_deref()
    }
}

impl std::default::Default for ApiError {
    fn default() -> Self {
        ApiError::new()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(msg) = &self.msg {
            write!(f, ": {}", msg)?;
        }

        Ok(())
    }
}

impl From<ApiErrorKind> for ApiError {
    fn from(kind: ApiErrorKind) -> Self {
        ApiError {
            kind,
            msg: None
        }
    }
}

impl<M> From<(ApiErrorKind, M)> for ApiError
where
    M: Into<String>
{
    fn from((kind, msg): (ApiErrorKind, M)) -> Self {
        ApiError {
            kind,
            msg: Some(msg.into())
        }
    }
}

#[derive(Debug)]
pub struct Error {
    inner: ApiError,
    context: Option<String>,
    src: Option<BoxDynError>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new() -> Self {
        Error {
            inner: Default::default(),
            context: None,
            src: None,
        }
    }

    pub fn api<T>(value: T) -> Self
    where
        T: Into<ApiError>
    {
        Error {
            inner: value.into(),
            context: None,
            src: None
        }
    }

    pub fn kind(mut self, kind: ApiErrorKind) -> Self {
        self.inner = self.inner.with_kind(kind);
        self
    }

    pub fn message<M>(mut self, msg: M) -> Self
    where
        M: Into<String>
    {
        self.inner = self.inner.with_message(msg);
        self
    }

    pub fn context<C>(mut self, ctx: C) -> Self
    where
        C: Into<String>
    {
        self.context = Some(ctx.into());
        self
    }

    pub fn source<S>(mut self, src: S) -> Self
    where
        S: Into<BoxDynError>
    {
        self.src = Some(src.into());
        self
    }

    pub fn inner(&self) -> &ApiError {
        &self.inner
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.inner, &self.context, &self.src) {
            (inner, Some(cxt), Some(err)) => if f.alternate() {
                write!(f, "inner: {}\ncxt: {}\nerr: {:#?}", inner, cxt, err)
            } else {
                write!(f, "inner: {}\ncxt: {}\nerr: {:?}", inner, cxt, err)
            },
            (inner, Some(cxt), None) => write!(f, "inner: {}\ncxt: {}", inner, cxt),
            (inner, None, Some(err)) => if f.alternate() {
                write!(f, "inner: {}\nerr: {:#?}", inner, err)
            } else {
                write!(f, "inner: {}\nerr: {:?}", inner, err)
            },
            (inner, None, None) => write!(f, "inner: {}", inner)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_ref().map(|v| & **v as _)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        if let Some(err) = self.src.as_ref() {
            if let Some(cxt) = self.context.as_ref() {
                tracing::event!(
                    Level::ERROR,
                    "unhandled error when processing request: {cxt}\n{:#?}",
                    err
                );
            } else {
                tracing::event!(
                    Level::ERROR,
                    "unhandled error when processing request: {:#?}",
                    err
                );
            }
        }

        let status = StatusCode::from(self.inner.kind());

        (status, axum::Json(self.inner)).into_response()
    }
}

impl From<ApiError> for Error {
    fn from(api_err: ApiError) -> Self {
        Error {
            inner: api_err,
            context: None,
            src: None,
        }
    }
}

impl From<ApiErrorKind> for Error {
    fn from(kind: ApiErrorKind) -> Self {
        Error::api(kind)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_infallible: std::convert::Infallible) -> Self {
        Error::new()
            .source("Infallible. how did this happen")
    }
}

impl From<deadpool_postgres::HookErrorCause> for Error {
    fn from(err: deadpool_postgres::HookErrorCause) -> Self {
        use deadpool_postgres::HookErrorCause;

        match err {
            HookErrorCause::Backend(e) => Self::from(e),
            HookErrorCause::Message(msg) => Error::new()
                .source(msg),
            HookErrorCause::StaticMessage(msg) => Error::new()
                .source(msg.to_owned()),
        }
    }
}

impl From<deadpool_postgres::HookError> for Error {
    fn from(err: deadpool_postgres::HookError) -> Self {
        use deadpool_postgres::HookError;

        match err {
            HookError::Continue(Some(cause)) |
            HookError::Abort(cause) => Self::from(cause),
            HookError::Continue(None) => Error::new()
                .source("deadpool::managed::HookError::Continue with no cause"),
        }
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        use deadpool_postgres::PoolError;

        match err {
            PoolError::Backend(e) => Self::from(e),
            PoolError::PostCreateHook(e) |
            PoolError::PreRecycleHook(e) |
            PoolError::PostRecycleHook(e) => Self::from(e),
            _ => Error::new()
                .context("failed to retrieve database connection")
                .source(err)
        }
    }
}

macro_rules! simple_from {
    ($e:path) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .source(err)
            }
        }
    };
    ($e:path, $k:expr) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .kind($k)
                    .source(err)
            }
        }
    };
}

simple_from!(tokio_postgres::Error);
simple_from!(rand::Error);
simple_from!(argon2::Error);

use mfgsite_lib::context_trait;

context_trait!(Error);

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<BoxDynError>
{
    fn context<C>(self, cxt: C) -> std::result::Result<T, Error>
    where
        C: Into<String>
    {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Error::new()
                .context(cxt)
                .source(err))
        }
    }
}

impl<T> Context<T, ()> for std::option::Option<T> {
    fn context<C>(self, cxt: C) -> std::result::Result<T, Error>
    where
        C: Into<String>
    {
        match self {
            Some(v) => Ok(v),
            None => Err(Error::new()
                .context(cxt))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_status() {
        assert_eq!(StatusCode::from(&ApiErrorKind::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(StatusCode::from(&ApiErrorKind::ApprovalRequired), StatusCode::FORBIDDEN);
        assert_eq!(StatusCode::from(&ApiErrorKind::EmailExists), StatusCode::CONFLICT);
        assert_eq!(StatusCode::from(&ApiErrorKind::AlreadyAuthenticated), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_json() {
        let err = ApiError::from((ApiErrorKind::InvalidCredentials, "email or password is incorrect"));
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json, serde_json::json!({
            "error": "InvalidCredentials",
            "message": "email or password is incorrect"
        }));

        let json = serde_json::to_value(ApiError::from(ApiErrorKind::NotFound)).unwrap();

        assert_eq!(json, serde_json::json!({"error": "NotFound"}));
    }

    #[test]
    fn response_status_from_kind() {
        let res = Error::api(ApiErrorKind::PermissionDenied).into_response();

        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = Error::new()
            .context("failed to load")
            .source("broken")
            .into_response();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn context_on_failures() {
        let failed: std::result::Result<(), std::io::Error> = Err(std::io::Error::other("disk gone"));
        let err = failed.context("failed to commit new account").unwrap_err();

        assert_eq!(err.context.as_deref(), Some("failed to commit new account"));
        assert!(err.src.is_some());
        assert_eq!(err.inner().kind(), &ApiErrorKind::InternalFailure);

        let err = None::<u8>.context("missing value").unwrap_err();

        assert_eq!(err.context.as_deref(), Some("missing value"));
        assert!(err.src.is_none());
    }
}
