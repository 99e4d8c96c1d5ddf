use std::task::{Context, Poll};
use std::time::Instant;

use http::{HeaderValue, Method, Request, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::{info, info_span, Span};

use crate::id::{RequestId, REQUEST_ID_HEADER};

/// RequestIdLayer は axum Router に適用する Tower Layer で、
/// リクエストごとに RequestId を割り当て、開始・終了をログに記録する。
///
/// RequestId はリクエストエクステンションに格納され、
/// 同じ値がレスポンスの `x-request-id` ヘッダーで返される。
///
/// # 使用例
///
/// ```ignore
/// use asrp_correlation::RequestIdLayer;
///
/// let app = Router::new()
///     .route("/v1/orders", get(list_orders))
///     .layer(RequestIdLayer::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// RequestIdService は RequestIdLayer が生成する Tower Service。
#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = RequestIdFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let incoming = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        let request_id = RequestId::from_incoming(incoming);
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = info_span!(
            "http_request",
            request_id = %request_id,
            http.method = %method,
            http.path = %path,
        );
        req.extensions_mut().insert(request_id.clone());

        let inner = {
            let _entered = span.enter();
            info!("request started");
            self.inner.call(req)
        };

        RequestIdFuture {
            inner,
            request_id,
            method,
            path,
            start: Instant::now(),
            span,
        }
    }
}

pin_project! {
    /// RequestIdFuture はレスポンスにリクエスト ID を付与し、完了をログに記録する Future。
    pub struct RequestIdFuture<F> {
        #[pin]
        inner: F,
        request_id: RequestId,
        method: Method,
        path: String,
        start: Instant,
        span: Span,
    }
}

impl<F, ResBody, E> std::future::Future for RequestIdFuture<F>
where
    F: std::future::Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _entered = this.span.enter();
        match this.inner.poll(cx) {
            Poll::Ready(Ok(mut response)) => {
                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                info!(
                    http.method = %this.method,
                    http.path = %this.path,
                    http.status_code = response.status().as_u16(),
                    duration_ms = u64::try_from(this.start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "request completed"
                );
                Poll::Ready(Ok(response))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}
