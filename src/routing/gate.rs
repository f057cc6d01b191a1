use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use mfgsite_lib::gate::{self, Gate, SessionProvider, AccountStore};

use crate::sec::authn::initiator::header_cookies;

/// runs a request through the gate. redirects are sent as 307 and any cookie
/// rewrites from the gate are attached to whatever response goes back,
/// redirect or not. a cookie the handler already set is left alone
pub async fn guard<P, A>(
    State(gate): State<Arc<Gate<P, A>>>,
    request: Request,
    next: Next,
) -> Response
where
    P: SessionProvider + 'static,
    A: AccountStore + 'static,
{
    let cookies = header_cookies(request.headers());
    let uri = request.uri().clone();

    let outcome = gate.evaluate(&gate::Request {
        path: uri.path(),
        query: uri.query(),
        cookies: &cookies,
    }).await;

    tracing::debug!(
        path = uri.path(),
        cookies = outcome.cookies.len(),
        "gate decision: {:?}",
        outcome.decision
    );

    let mut response = match outcome.decision.location() {
        Some(location) => Redirect::temporary(&location).into_response(),
        None => next.run(request).await,
    };

    let handler_set = response_cookie_names(&response);

    for cookie in outcome.cookies {
        if handler_set.iter().any(|name| name == cookie.name()) {
            tracing::debug!("handler already set \"{}\", dropping gate rewrite", cookie.name());
            continue;
        }

        match cookie.to_header_value() {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => {
                tracing::error!("failed to create set-cookie header for \"{}\": {err}", cookie.name());
            }
        }
    }

    response
}

fn response_cookie_names(response: &Response) -> Vec<String> {
    response.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('='))
        .map(|(name, _)| name.trim().to_owned())
        .collect()
}
