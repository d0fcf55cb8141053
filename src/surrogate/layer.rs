//! Tower middleware that runs the projector on every primary response.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{Request, Response};
use tower::{Layer, Service};

use crate::http::request::RequestKind;
use crate::surrogate::projector::SurrogateKeyProjector;

/// Layer that applies [`SurrogateKeyProjector`] to responses.
///
/// Sub-requests pass through untouched. The layer never turns a response
/// into an error: whatever the inner service returns is returned.
#[derive(Clone, Debug)]
pub struct SurrogateKeyLayer {
    projector: SurrogateKeyProjector,
    trust_header: bool,
}

impl SurrogateKeyLayer {
    pub fn new(projector: SurrogateKeyProjector) -> Self {
        Self {
            projector,
            trust_header: false,
        }
    }

    /// Honour the client-visible `X-Sub-Request` header. Off by default.
    pub fn trust_sub_request_header(mut self, trust: bool) -> Self {
        self.trust_header = trust;
        self
    }
}

impl<S> Layer<S> for SurrogateKeyLayer {
    type Service = SurrogateKeyService<S>;

    fn layer(&self, service: S) -> Self::Service {
        SurrogateKeyService {
            inner: service,
            projector: self.projector.clone(),
            trust_header: self.trust_header,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SurrogateKeyService<S> {
    inner: S,
    projector: SurrogateKeyProjector,
    trust_header: bool,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SurrogateKeyService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let kind = RequestKind::classify(&req, self.trust_header);
        let projector = self.projector.clone();

        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let fut = inner.call(req);

        Box::pin(async move {
            let mut response = fut.await?;
            if kind.is_primary() {
                projector.project_response(&mut response);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use tower::{service_fn, ServiceExt};

    use crate::http::request::X_SUB_REQUEST;
    use crate::surrogate::fingerprint::fingerprint;
    use crate::surrogate::projector::tests::RecordingNotice;
    use crate::surrogate::projector::{CACHE_TAGS, MAX_HEADER_BYTES, SURROGATE_KEY};

    fn origin(tags: Option<String>) -> impl Service<
        Request<()>,
        Response = Response<()>,
        Error = Infallible,
        Future = impl Future<Output = Result<Response<()>, Infallible>> + Send,
    > + Clone {
        service_fn(move |_req: Request<()>| {
            let tags = tags.clone();
            async move {
                let mut response = Response::new(());
                if let Some(tags) = tags {
                    response
                        .headers_mut()
                        .insert(CACHE_TAGS.clone(), HeaderValue::from_str(&tags).unwrap());
                }
                Ok::<_, Infallible>(response)
            }
        })
    }

    fn layer() -> (SurrogateKeyLayer, Arc<RecordingNotice>) {
        let sink = Arc::new(RecordingNotice::default());
        let projector = SurrogateKeyProjector::new(sink.clone());
        (SurrogateKeyLayer::new(projector), sink)
    }

    #[tokio::test]
    async fn test_primary_response_gets_surrogate_key() {
        let (layer, sink) = layer();
        let service = layer.layer(origin(Some("node:1 node:2 node:3".into())));

        let response = service
            .oneshot(Request::builder().uri("/").body(()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[&SURROGATE_KEY], "node:1 node:2 node:3");
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_missing_tags_give_empty_surrogate_key() {
        let (layer, _) = layer();
        let service = layer.layer(origin(None));

        let response = service
            .oneshot(Request::builder().uri("/").body(()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[&SURROGATE_KEY], "");
    }

    #[tokio::test]
    async fn test_spoofed_sub_request_header_is_projected_by_default() {
        let (layer, sink) = layer();
        let service = layer.layer(origin(Some("node:1 node:2".into())));

        let request = Request::builder()
            .uri("/")
            .header(X_SUB_REQUEST.clone(), "1")
            .body(())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[&SURROGATE_KEY], "node:1 node:2");
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_trusted_sub_request_header_is_untouched() {
        let (layer, sink) = layer();
        let layer = layer.trust_sub_request_header(true);
        let tags = (0..6000).map(|i| format!("tag:{}", i)).collect::<Vec<_>>().join(" ");
        let service = layer.layer(origin(Some(tags)));

        let request = Request::builder()
            .uri("/fragment")
            .header(X_SUB_REQUEST.clone(), "1")
            .body(())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();

        assert!(response.headers().get(&SURROGATE_KEY).is_none());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_sub_request_extension_is_untouched() {
        let (layer, _) = layer();
        let service = layer.layer(origin(Some("node:1".into())));

        let mut request = Request::builder().uri("/").body(()).unwrap();
        request.extensions_mut().insert(RequestKind::SubRequest);
        let response = service.oneshot(request).await.unwrap();

        assert!(response.headers().get(&SURROGATE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_oversized_tags_are_fingerprinted_once_per_response() {
        let (layer, sink) = layer();
        let tags = (0..6000).map(|i| format!("tag:{}", i)).collect::<Vec<_>>().join(" ");
        assert!(tags.len() > MAX_HEADER_BYTES);
        let mut service = layer.layer(origin(Some(tags)));

        for expected_notices in 1..=2 {
            let response = service
                .ready()
                .await
                .unwrap()
                .call(Request::builder().uri("/").body(()).unwrap())
                .await
                .unwrap();

            let value = response.headers()[&SURROGATE_KEY].to_str().unwrap().to_string();
            let tokens: Vec<&str> = value.split(' ').collect();
            assert_eq!(tokens.len(), 6000);
            assert_eq!(tokens[0], fingerprint("tag:0").as_str());
            assert_eq!(tokens[5999], fingerprint("tag:5999").as_str());
            assert_eq!(sink.count(), expected_notices);
        }
    }
}
