use actix_web::body::SizedStream;
use actix_web::dev::Payload;
use actix_web::error::PayloadError;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use std::io;
use std::time::Duration;
use url::Url;

use crate::config::ConfigError;
use crate::error::GateError;

/// Maximum inbound body relayed to the origin (10 MB). Diverted requests
/// are streamed and not subject to it.
pub const MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default upstream connect and read timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunks buffered between the inbound payload and the upstream request.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// HTTP client used for forwarding. Upstream redirects are handed back to
/// the caller rather than followed.
///
/// `timeout` bounds connecting and each read, not the whole exchange, so a
/// long response body keeps streaming as long as data keeps arriving.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Hop-by-hop headers, dropped in both directions.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Target for a diverted request.
///
/// Scheme, host and path come from the redirect target; the inbound path is
/// discarded, not appended. The inbound query is kept and joined after any
/// query the redirect target already carries.
pub fn redirect_url(redirect: &Url, inbound_query: Option<&str>) -> Url {
    let mut url = redirect.clone();
    url.set_fragment(None);
    let query = join_query(redirect.query(), inbound_query);
    url.set_query(query.as_deref());
    url
}

/// Target for a passthrough request to the origin: the inbound path is
/// appended to the origin's base path.
pub fn origin_url(origin: &Url, inbound_path: &str, inbound_query: Option<&str>) -> Url {
    let mut url = origin.clone();
    url.set_fragment(None);
    let base = origin.path().trim_end_matches('/');
    let path = inbound_path.trim_start_matches('/');
    url.set_path(&format!("{}/{}", base, path));
    let query = join_query(origin.query(), inbound_query);
    url.set_query(query.as_deref());
    url
}

fn join_query(target: Option<&str>, inbound: Option<&str>) -> Option<String> {
    let target = target.filter(|q| !q.is_empty());
    let inbound = inbound.filter(|q| !q.is_empty());
    match (target, inbound) {
        (Some(t), Some(i)) => Some(format!("{}&{}", t, i)),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    }
}

/// `host[:port]` of a URL, as sent in the `Host` header.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Header names listed in `Connection`, which are hop-by-hop for this message.
fn connection_tokens<'a>(values: impl Iterator<Item = &'a [u8]>) -> Vec<String> {
    values
        .filter_map(|v| std::str::from_utf8(v).ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_hop_by_hop(name: &str, listed: &[String]) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name) || listed.iter().any(|l| l == name)
}

/// Drain an inbound body, enforcing [`MAX_REQUEST_BODY_SIZE`].
pub async fn read_body<S>(mut payload: S) -> Result<Bytes, GateError>
where
    S: Stream<Item = Result<Bytes, PayloadError>> + Unpin,
{
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| GateError::RequestBody(e.to_string()))?;
        if body.len() + chunk.len() > MAX_REQUEST_BODY_SIZE {
            return Err(GateError::PayloadTooLarge(MAX_REQUEST_BODY_SIZE));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Hand an inbound body to reqwest without buffering it.
///
/// The actix payload is `!Send`, so a task on the current arbiter pumps it
/// into a channel and reqwest owns the receiving end. The task stops as soon
/// as the upstream request is dropped. Returns `None` for bodiless requests.
pub fn stream_body(payload: Payload) -> Option<reqwest::Body> {
    if let Payload::None = payload {
        return None;
    }

    let (mut tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(BODY_CHANNEL_CAPACITY);
    actix_rt::spawn(async move {
        let mut payload = payload;
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::warn!(error = %e, "inbound request body interrupted");
                io::Error::other(e.to_string())
            });
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    Some(reqwest::Body::wrap_stream(rx))
}

/// Send `req` to `target` and stream the upstream response back as-is.
///
/// Status and end-to-end headers are copied untouched; only hop-by-hop
/// headers are dropped. The upstream body is never buffered.
pub async fn forward(
    client: &reqwest::Client,
    req: &HttpRequest,
    target: &Url,
    body: Option<reqwest::Body>,
) -> Result<HttpResponse, GateError> {
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes()).map_err(|_| {
        GateError::InvalidRequest(format!("unsupported HTTP method: {}", req.method()))
    })?;

    let listed = connection_tokens(
        req.headers()
            .get_all("connection")
            .map(|v| v.as_bytes()),
    );

    let mut headers = reqwest::header::HeaderMap::new();
    let mut forwarded_for: Vec<String> = Vec::new();
    for (name, value) in req.headers().iter() {
        let name = name.as_str();
        if is_hop_by_hop(name, &listed) || name == "host" || name == "content-length" {
            continue;
        }
        if name == "x-forwarded-for" {
            if let Ok(v) = value.to_str() {
                forwarded_for.push(v.to_string());
            }
            continue;
        }
        if let (Ok(n), Ok(v)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(n, v);
        }
    }

    let host = reqwest::header::HeaderValue::from_str(&authority(target))
        .map_err(|e| GateError::InvalidRequest(format!("invalid upstream host: {}", e)))?;
    headers.insert(reqwest::header::HOST, host);

    if let Some(peer) = req.peer_addr() {
        forwarded_for.push(peer.ip().to_string());
    }
    if !forwarded_for.is_empty() {
        if let Ok(v) = reqwest::header::HeaderValue::from_str(&forwarded_for.join(", ")) {
            headers.insert("x-forwarded-for", v);
        }
    }

    let mut request_builder = client.request(method, target.as_str()).headers(headers);
    if let Some(body) = body {
        request_builder = request_builder.body(body);
    }

    let response = request_builder.send().await.map_err(|e| {
        tracing::error!(error = %e, target = %target, "upstream request failed");
        GateError::Upstream(e.to_string())
    })?;

    Ok(stream_response(response))
}

fn stream_response(response: reqwest::Response) -> HttpResponse {
    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);

    let listed = connection_tokens(
        response
            .headers()
            .get_all(reqwest::header::CONNECTION)
            .iter()
            .map(|v| v.as_bytes()),
    );

    for (name, value) in response.headers().iter() {
        let name = name.as_str();
        // Content-Length is carried by the sized body below
        if is_hop_by_hop(name, &listed) || name == "content-length" {
            continue;
        }
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            builder.append_header((n, v));
        }
    }

    let content_length = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let stream = response.bytes_stream().map(|chunk| {
        chunk.map_err(|e| {
            tracing::error!(error = %e, "upstream response body interrupted");
            e
        })
    });

    match content_length {
        Some(len) => builder.body(SizedStream::new(len, Box::pin(stream))),
        None => builder.streaming(stream),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_url_replaces_path() {
        let redirect = Url::parse("http://sorry:8080/maintenance").unwrap();
        let url = redirect_url(&redirect, None);
        assert_eq!(url.as_str(), "http://sorry:8080/maintenance");

        let url = redirect_url(&redirect, Some("lang=en"));
        assert_eq!(url.as_str(), "http://sorry:8080/maintenance?lang=en");
    }

    #[test]
    fn test_redirect_url_joins_queries() {
        let redirect = Url::parse("https://sorry.example.com/page?site=shop").unwrap();
        let url = redirect_url(&redirect, Some("lang=en"));
        assert_eq!(url.query(), Some("site=shop&lang=en"));

        let url = redirect_url(&redirect, Some(""));
        assert_eq!(url.query(), Some("site=shop"));
    }

    #[test]
    fn test_origin_url_appends_path() {
        let origin = Url::parse("http://app:3000").unwrap();
        let url = origin_url(&origin, "/api/items", Some("page=2"));
        assert_eq!(url.as_str(), "http://app:3000/api/items?page=2");

        let origin = Url::parse("http://app:3000/v1/").unwrap();
        let url = origin_url(&origin, "/items", None);
        assert_eq!(url.as_str(), "http://app:3000/v1/items");
    }

    #[test]
    fn test_authority() {
        let url = Url::parse("http://sorry:8080/x").unwrap();
        assert_eq!(authority(&url), "sorry:8080");
        let url = Url::parse("https://sorry.example.com").unwrap();
        assert_eq!(authority(&url), "sorry.example.com");
        // Default ports are not repeated
        assert_eq!(authority(&Url::parse("http://sorry:80").unwrap()), "sorry");
    }

    #[test]
    fn test_hop_by_hop_headers() {
        let listed = connection_tokens(["keep-alive, X-Custom-Hop"].iter().map(|s| s.as_bytes()));
        assert_eq!(listed, vec!["keep-alive", "x-custom-hop"]);

        assert!(is_hop_by_hop("transfer-encoding", &[]));
        assert!(is_hop_by_hop("upgrade", &[]));
        assert!(is_hop_by_hop("x-custom-hop", &listed));
        assert!(!is_hop_by_hop("content-type", &listed));
        assert!(!is_hop_by_hop("set-cookie", &[]));
    }

    #[actix_rt::test]
    async fn test_read_body_concatenates_chunks() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, PayloadError>(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ]);
        let body = read_body(chunks).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[actix_rt::test]
    async fn test_read_body_enforces_limit() {
        let chunk = Bytes::from(vec![0u8; MAX_REQUEST_BODY_SIZE / 2 + 1]);
        let chunks = futures::stream::iter(vec![
            Ok::<_, PayloadError>(chunk.clone()),
            Ok(chunk),
        ]);
        let err = read_body(chunks).await.unwrap_err();
        assert!(matches!(err, GateError::PayloadTooLarge(_)));
    }

    #[actix_rt::test]
    async fn test_read_body_surfaces_payload_errors() {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(PayloadError::Incomplete(None)),
        ]);
        let err = read_body(chunks).await.unwrap_err();
        assert!(matches!(err, GateError::RequestBody(_)));
    }
}
