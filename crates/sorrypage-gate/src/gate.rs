//! The sorry-page gate: an actix-web middleware that either hands each
//! request to the wrapped service untouched, or diverts it to the configured
//! redirect service and streams that service's response back.
//!
//! ```ignore
//! let gate = SorryPage::new(&SorryPageConfig::new(true, "http://sorry:8080"), "maintenance")?;
//! App::new().wrap(gate).default_service(web::to(origin));
//! ```

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpRequest, HttpResponse};
use futures::future::LocalBoxFuture;
use url::Url;

use crate::config::{parse_redirect_service, ConfigError, SorryPageConfig};
use crate::error::GateError;
use crate::liveness::{LivenessCheck, StaticFlag};
use crate::metrics::{REDIRECT_LATENCY, REQUESTS_TOTAL, UPSTREAM_ERRORS};
use crate::proxy::{build_client, forward, redirect_url, stream_body, DEFAULT_UPSTREAM_TIMEOUT};

/// Middleware factory. Construct once at startup, then `wrap` it around the
/// downstream service; clones share the HTTP client and liveness check.
#[derive(Clone)]
pub struct SorryPage {
    name: Arc<str>,
    redirect_url: Url,
    liveness: Arc<dyn LivenessCheck>,
    client: reqwest::Client,
}

impl std::fmt::Debug for SorryPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SorryPage")
            .field("name", &self.name)
            .field("redirect_url", &self.redirect_url.as_str())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl SorryPage {
    /// Validate `config` and build the gate. No network I/O happens here.
    pub fn new(config: &SorryPageConfig, name: impl Into<String>) -> Result<Self, ConfigError> {
        let redirect_url = parse_redirect_service(&config.redirect_service)?;
        let client = build_client(DEFAULT_UPSTREAM_TIMEOUT)?;
        let name: Arc<str> = Arc::from(name.into());

        tracing::info!(
            sorrypage = %name,
            enabled = config.enabled,
            redirect_service = %redirect_url,
            "sorrypage gate configured"
        );

        Ok(Self {
            name,
            redirect_url,
            liveness: Arc::new(StaticFlag(config.enabled)),
            client,
        })
    }

    /// Forward with a caller-supplied client (shared pool, custom timeouts).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Replace the static `enabled` flag with another predicate.
    pub fn with_liveness(mut self, liveness: impl LivenessCheck + 'static) -> Self {
        self.liveness = Arc::new(liveness);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    pub fn is_enabled(&self) -> bool {
        self.liveness.sorrypage_enabled()
    }

    async fn redirect(&self, req: &HttpRequest, payload: Payload) -> Result<HttpResponse, GateError> {
        let target = redirect_url(&self.redirect_url, req.uri().query());
        tracing::debug!(
            sorrypage = %self.name,
            method = %req.method(),
            path = %req.path(),
            target = %target,
            "diverting request to redirect service"
        );

        let body = stream_body(payload);

        let timer = REDIRECT_LATENCY.start_timer();
        let result = forward(&self.client, req, &target, body).await;
        timer.observe_duration();

        if result.is_err() {
            UPSTREAM_ERRORS.inc();
        }
        result
    }
}

impl<S, B> Transform<S, ServiceRequest> for SorryPage
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SorryPageMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SorryPageMiddleware {
            service,
            gate: Rc::new(self.clone()),
        }))
    }
}

pub struct SorryPageMiddleware<S> {
    service: S,
    gate: Rc<SorryPage>,
}

impl<S, B> Service<ServiceRequest> for SorryPageMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !self.gate.is_enabled() {
            REQUESTS_TOTAL.with_label_values(&["passthrough"]).inc();
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) });
        }

        REQUESTS_TOTAL.with_label_values(&["redirect"]).inc();
        let gate = Rc::clone(&self.gate);
        Box::pin(async move {
            let (http_req, payload) = req.into_parts();
            let res = match gate.redirect(&http_req, payload).await {
                Ok(resp) => ServiceResponse::new(http_req, resp),
                Err(e) => ServiceResponse::from_err(e, http_req),
            };
            Ok(res.map_into_right_body())
        })
    }
}
