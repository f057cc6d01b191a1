use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::BoxError;
use mfgsite_lib::gate::{Gate, SessionProvider, AccountStore};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::net::error;
use crate::net::layer::{request_id::RIDLayer, trace};
use crate::state::ArcShared;

mod gate;
mod handle;

async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::OK, "pong")
}

async fn not_found() -> error::Error {
    error::Error::api(error::ApiErrorKind::NotFound)
}

async fn handle_error(err: BoxError) -> error::Error {
    if err.is::<tower::timeout::error::Elapsed>() {
        error::Error::api(error::ApiErrorKind::Timeout)
    } else {
        error::Error::new()
            .context("unhandled middleware error")
            .source(err)
    }
}

fn pages<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static
{
    Router::new()
        .route("/", get(handle::pages::home))
        .route("/dashboard", get(handle::pages::dashboard))
        .route("/projects", get(handle::pages::projects))
        .route("/projects/:project_id", get(handle::pages::project))
        .route("/gantt", get(handle::pages::gantt))
        .route("/calendar", get(handle::pages::calendar))
        .route("/notifications", get(handle::pages::notifications))
        .route("/admin", get(handle::pages::admin))
        .route("/admin/users", get(handle::pages::admin_users))
        .route("/admin/reports", get(handle::pages::admin_reports))
        .route("/login", get(handle::pages::login))
        .route("/signup", get(handle::pages::signup))
        .route("/reset-password", get(handle::pages::reset_password))
        .route("/reset-password/confirm", get(handle::pages::reset_password_confirm))
}

/// adds the fallback and puts every request through the gate, including ones
/// that match no route. paths outside the configured prefixes pass through
/// untouched
fn gated<S, P, A>(router: Router<S>, request_gate: Arc<Gate<P, A>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    P: SessionProvider + 'static,
    A: AccountStore + 'static,
{
    router.fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            request_gate,
            gate::guard::<P, A>
        ))
}

/// json endpoints authorize themselves
fn api() -> Router<ArcShared> {
    Router::new()
        .route("/auth/signup", post(handle::auth::signup))
        .route("/auth/login", post(handle::auth::login))
        .route("/auth/logout", post(handle::auth::logout))
        .route("/admin/users", get(handle::admin::list_users))
        .route("/admin/users/:user_id/approve", post(handle::admin::approve))
        .route("/admin/users/:user_id/reject", post(handle::admin::reject))
}

pub fn routes(state: &ArcShared) -> Router {
    let router = Router::new()
        .merge(pages())
        .nest("/api", api())
        .route("/ping", get(ping));

    gated(router, state.gate().clone())
        .layer(ServiceBuilder::new()
            .layer(RIDLayer::new())
            .layer(TraceLayer::new_for_http()
                .make_span_with(trace::make_span_with)
                .on_request(trace::on_request)
                .on_response(trace::on_response)
                .on_failure(trace::on_failure))
            .layer(HandleErrorLayer::new(handle_error))
            .layer(TimeoutLayer::new(Duration::new(90, 0))))
        .with_state(state.clone())
}
