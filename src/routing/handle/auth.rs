use axum::debug_handler;
use axum::http::{StatusCode, HeaderMap};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use mfgsite_lib::validation;
use serde::Deserialize;

use crate::net::error::{self, Context};
use crate::sec::authn::initiator::{self, LookupError};
use crate::sec::authn::password::Password;
use crate::sec::authn::session;
use crate::sec::state::SessionInfo;
use crate::sql;
use crate::state::ArcShared;
use crate::user;

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[debug_handler]
pub async fn signup(
    State(state): State<ArcShared>,
    axum::Json(json): axum::Json<SignupBody>,
) -> error::Result<impl IntoResponse> {
    let email = json.email.trim();
    let name = json.name.trim();

    if !validation::email_valid(email) {
        return Err(error::Error::api(error::ApiErrorKind::InvalidEmail));
    }

    if !validation::name_valid(name) {
        return Err(error::Error::api(error::ApiErrorKind::InvalidName));
    }

    if !validation::password_valid(&json.password) {
        return Err(error::Error::api((
            error::ApiErrorKind::InvalidPassword,
            format!(
                "password must be {} to {} characters without control characters",
                validation::MIN_PASSWORD_CHARS,
                validation::MAX_PASSWORD_CHARS
            )
        )));
    }

    let mut conn = state.pool().get().await?;
    let transaction = conn.transaction()
        .await
        .context("failed to start signup transaction")?;

    let created = match user::User::create(&transaction, email, name).await {
        Ok(created) => created,
        Err(user::QueryError::Pg(err)) => {
            if let Some(constraint) = sql::unique_constraint_error(&err) {
                if constraint == user::EMAIL_UNIQUE {
                    return Err(error::Error::api(error::ApiErrorKind::EmailExists));
                }
            }

            return Err(err.into());
        }
        Err(err) => {
            return Err(err.into());
        }
    };

    Password::create(&transaction, &created.id, &json.password).await?;

    transaction.commit()
        .await
        .context("failed to commit new account")?;

    tracing::info!(user_id = created.id, "new account awaiting approval");

    Ok((
        StatusCode::CREATED,
        axum::Json(created)
    ))
}

/// an invalid or stale cookie does not block signing in again
fn allows_login(err: &LookupError) -> bool {
    matches!(
        err,
        LookupError::MechanismNotFound |
        LookupError::SessionNotFound |
        LookupError::SessionExpired(_) |
        LookupError::UserNotFound(_) |
        LookupError::SessionDecode(_)
    )
}

#[debug_handler]
pub async fn login(
    State(state): State<ArcShared>,
    headers: HeaderMap,
    axum::Json(json): axum::Json<LoginBody>,
) -> error::Result<impl IntoResponse> {
    let info = state.sec().session_info();
    let mut conn = state.pool().get().await?;

    match initiator::lookup_header_map(info, &conn, &headers).await {
        Ok(_) => {
            return Err(error::Error::api(
                error::ApiErrorKind::AlreadyAuthenticated
            ));
        },
        Err(err) => if !allows_login(&err) {
            return Err(err.into());
        }
    }

    let invalid = || error::Error::api((
        error::ApiErrorKind::InvalidCredentials,
        "email or password is incorrect"
    ));

    let Some(found) = user::User::query_with_email(&conn, json.email.trim()).await? else {
        return Err(invalid());
    };

    let Some(password) = Password::retrieve(&conn, &found.id).await? else {
        return Err(invalid());
    };

    if !password.verify(&json.password)? {
        return Err(invalid());
    }

    let transaction = conn.transaction()
        .await
        .context("failed to start session transaction")?;

    let created = session::Session::create(&transaction, info, found.id).await?;

    transaction.commit()
        .await
        .context("failed to commit new session")?;

    tracing::debug!(user_id = found.id, "created session");

    Ok((
        StatusCode::OK,
        session::create_session_cookie(info, &created),
        axum::Json(found)
    ))
}

#[debug_handler]
pub async fn logout(
    State(state): State<ArcShared>,
    headers: HeaderMap,
) -> error::Result<impl IntoResponse> {
    let info = state.sec().session_info();
    let conn = state.pool().get().await?;

    match initiator::lookup_header_map(info, &conn, &headers).await {
        Ok(found) => {
            session::Session::drop_token(&conn, &found.session.token).await?;

            tracing::debug!(user_id = found.user.id, "dropped session");
        }
        Err(err) => if !allows_login(&err) {
            return Err(err.into());
        }
    }

    Ok(signed_out(info))
}

fn signed_out(info: &SessionInfo) -> Response {
    (
        StatusCode::NO_CONTENT,
        session::expire_session_cookie(info),
        ()
    ).into_response()
}

#[cfg(test)]
mod test {
    use axum::http::header::SET_COOKIE;

    use super::*;

    #[test]
    fn stale_sessions_allow_login() {
        assert!(allows_login(&LookupError::MechanismNotFound));
        assert!(allows_login(&LookupError::SessionNotFound));
        assert!(allows_login(&LookupError::SessionDecode(session::DecodeError::InvalidHash)));
    }

    #[test]
    fn signed_out_clears_cookie() {
        let res = signed_out(&SessionInfo::new([3u8; blake3::KEY_LEN]));

        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();

        assert!(cookie.starts_with("session_id=;"), "cookie: {cookie}");
        assert!(cookie.contains("Max-Age=0"), "cookie: {cookie}");
    }
}
