use std::task::{Context, Poll};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{Request, HeaderValue};
use tower::{Layer, Service};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// sequential id attached to every incoming request so log lines from the
/// same request can be grouped together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

impl RequestId {
    pub fn try_get<B>(req: &Request<B>) -> Option<&Self> {
        req.extensions().get()
    }

    pub fn id(&self) -> &u64 {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct RIDService<S> {
    inner: S,
    counter: Arc<AtomicU64>,
}

impl<S, B> Service<Request<B>> for RIDService<S>
where
    S: Service<Request<B>>
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let rid = RequestId(self.counter.fetch_add(1, Ordering::Relaxed));

        request.headers_mut().insert(REQUEST_ID_HEADER, HeaderValue::from(rid.0));
        request.extensions_mut().insert(rid);

        self.inner.call(request)
    }
}

#[derive(Debug, Clone)]
pub struct RIDLayer {
    counter: Arc<AtomicU64>,
}

impl RIDLayer {
    pub fn new() -> Self {
        RIDLayer {
            counter: Arc::new(AtomicU64::new(1))
        }
    }
}

impl<S> Layer<S> for RIDLayer {
    type Service = RIDService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RIDService {
            inner,
            counter: self.counter.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::convert::Infallible;

    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn ids_increment_per_request() {
        let layer = RIDLayer::new();
        let svc = layer.layer(tower::service_fn(|req: Request<()>| async move {
            let rid = RequestId::try_get(&req).copied();
            let header = req.headers().get(REQUEST_ID_HEADER).cloned();

            Ok::<_, Infallible>((rid, header))
        }));

        let (first, header) = svc.clone().oneshot(Request::new(())).await.unwrap();

        assert_eq!(first, Some(RequestId(1)));
        assert_eq!(header, Some(HeaderValue::from_static("1")));

        let (second, _) = svc.oneshot(Request::new(())).await.unwrap();

        assert_eq!(second, Some(RequestId(2)));
    }
}
