//! Stream relay for media and sub-playlists
//!
//! Forwards a GET to the upstream media host and streams the answer back
//! without buffering it. Client headers are passed on (minus credentials),
//! upstream headers are merged into the response.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use futures::{pin_mut, Stream, StreamExt};
use reqwest::Client;
use std::fmt;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::ProxyError;
use crate::services::metrics::RELAY_RESPONSES;

/// Maximum number of upstream error-body bytes kept and returned
pub const ERROR_BODY_LIMIT: usize = 8 * 1024;

/// Identifiers with this suffix address a sub-manifest next to the track
const ADAPTIVE_PLAYLIST_SUFFIX: &str = ".m3u8";

/// Inbound request headers that never reach the upstream host
const STRIPPED_REQUEST_HEADERS: [HeaderName; 3] = [
    header::AUTHORIZATION,
    header::PROXY_AUTHORIZATION,
    header::HOST,
];

/// Upstream headers owned by our own connection handling
const HOP_BY_HOP_HEADERS: [HeaderName; 2] = [header::CONNECTION, header::TRANSFER_ENCODING];

// reqwest 0.11 is built on http 0.2 while axum uses http 1.x
mod reqwest_header {
    pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
}

/// Resolved upstream URL for one relay request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    url: Url,
}

impl StreamTarget {
    /// Resolve a stored track URI against the identifier the client asked for
    ///
    /// Identifiers ending in `.m3u8` replace the last path segment of the track
    /// URI; anything else relays the track URI itself.
    pub fn resolve(track_uri: &str, id: Option<&str>) -> Result<Self, ProxyError> {
        match id {
            Some(id) if id.ends_with(ADAPTIVE_PLAYLIST_SUFFIX) => Self::sub_resource(track_uri, id),
            _ => Self::direct(track_uri),
        }
    }

    pub fn direct(track_uri: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(track_uri).map_err(|e| {
            error!("Invalid upstream URL: {}", e);
            ProxyError::internal(e)
        })?;
        Ok(Self { url })
    }

    /// Track URI with its final path segment replaced by `id`
    pub fn sub_resource(track_uri: &str, id: &str) -> Result<Self, ProxyError> {
        let Self { mut url } = Self::direct(track_uri)?;
        url.path_segments_mut()
            .map_err(|_| ProxyError::Internal(format!("cannot replace path segment of {}", track_uri)))?
            .pop()
            .push(id);
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Host and final segment only; stream paths carry backend credentials
impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        write!(
            f,
            "{}://{}/.../{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or(""),
            last
        )
    }
}

/// Add every name/value pair of `src` that `dst` does not already hold
///
/// Existing values are never overwritten: a new value under a known name is
/// appended, an identical pair is skipped.
pub fn merge_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        if dst.get_all(name).iter().any(|existing| existing == value) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Headers for the upstream request, derived from the client's
///
/// The outbound request starts empty, so the merge carries the client's
/// User-Agent over as-is.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();
    merge_headers(&mut outbound, &without(inbound, &STRIPPED_REQUEST_HEADERS));
    outbound
}

fn without(headers: &HeaderMap, excluded: &[HeaderName]) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !excluded.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn to_upstream_headers(headers: &HeaderMap) -> reqwest_header::HeaderMap {
    let mut converted = reqwest_header::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        match (
            reqwest_header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest_header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), Ok(value)) => {
                converted.append(name, value);
            }
            _ => debug!("Dropping unconvertible request header {}", name),
        }
    }
    converted
}

fn from_upstream_headers(headers: &reqwest_header::HeaderMap) -> HeaderMap {
    let mut converted = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        match (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), Ok(value)) => {
                converted.append(name, value);
            }
            _ => debug!("Dropping unconvertible response header {}", name),
        }
    }
    converted
}

/// Read at most `limit` bytes from a body stream
async fn read_prefix<S, B, E>(stream: S, limit: usize) -> Vec<u8>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    pin_mut!(stream);
    let mut captured = Vec::new();
    while captured.len() < limit {
        match stream.next().await {
            Some(Ok(chunk)) => {
                let chunk = chunk.as_ref();
                let take = chunk.len().min(limit - captured.len());
                captured.extend_from_slice(&chunk[..take]);
            }
            Some(Err(e)) => {
                debug!("Upstream error body read stopped: {}", e);
                break;
            }
            None => break,
        }
    }
    captured
}

/// Relays GET requests to upstream media hosts
#[derive(Clone)]
pub struct StreamRelay {
    client: Client,
}

impl StreamRelay {
    /// Client without timeout or transparent decompression: bytes pass
    /// through exactly as the upstream sent them
    pub fn new() -> Result<Self, ProxyError> {
        let client = Client::builder()
            .no_gzip()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| {
                error!("Failed to create HTTP client: {}", e);
                ProxyError::internal(e)
            })?;
        Ok(Self { client })
    }

    /// Perform the upstream request and build the client response
    pub async fn relay(
        &self,
        target: &StreamTarget,
        inbound: &HeaderMap,
    ) -> Result<Response, ProxyError> {
        let outbound = outbound_headers(inbound);

        let upstream = self
            .client
            .get(target.url().clone())
            .headers(to_upstream_headers(&outbound))
            .send()
            .await
            .map_err(|e| {
                error!("Relay request to {} failed: {}", target, e);
                RELAY_RESPONSES.with_label_values(&["connect_error"]).inc();
                ProxyError::internal(e)
            })?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .map_err(ProxyError::internal)?;
        let upstream_headers = from_upstream_headers(upstream.headers());

        if status.as_u16() >= 400 {
            warn!(
                "Upstream {} returned status {}; headers={:?}",
                target, status, upstream_headers
            );

            let captured = read_prefix(upstream.bytes_stream(), ERROR_BODY_LIMIT).await;
            if !captured.is_empty() {
                warn!(
                    "Upstream error body (truncated): {}",
                    String::from_utf8_lossy(&captured)
                );
            }

            // Framing headers describe the full upstream body, not the excerpt
            let mut response = Response::new(Body::from(captured));
            *response.status_mut() = status;
            merge_headers(
                response.headers_mut(),
                &without(
                    &upstream_headers,
                    &[
                        header::CONTENT_LENGTH,
                        header::TRANSFER_ENCODING,
                        header::CONNECTION,
                    ],
                ),
            );
            RELAY_RESPONSES.with_label_values(&["upstream_error"]).inc();
            return Ok(response);
        }

        debug!("Streaming {} ({})", target, status);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        merge_headers(
            response.headers_mut(),
            &without(&upstream_headers, &HOP_BY_HOP_HEADERS),
        );
        RELAY_RESPONSES.with_label_values(&["streamed"]).inc();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::get, Router};
    use std::sync::{Arc, Mutex};

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn values(map: &HeaderMap, name: &str) -> Vec<String> {
        map.get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_merge_existing_value_is_noop() {
        let mut dst = header_map(&[("accept", "text/html")]);
        merge_headers(&mut dst, &header_map(&[("accept", "text/html")]));
        assert_eq!(values(&dst, "accept"), vec!["text/html"]);
    }

    #[test]
    fn test_merge_appends_new_value_under_existing_name() {
        let mut dst = header_map(&[("accept", "text/html")]);
        merge_headers(
            &mut dst,
            &header_map(&[("accept", "text/html"), ("accept", "application/json")]),
        );
        assert_eq!(values(&dst, "accept"), vec!["text/html", "application/json"]);
    }

    #[test]
    fn test_merge_adds_new_names() {
        let mut dst = HeaderMap::new();
        merge_headers(&mut dst, &header_map(&[("x-one", "1"), ("x-two", "2")]));
        assert_eq!(values(&dst, "x-one"), vec!["1"]);
        assert_eq!(values(&dst, "x-two"), vec!["2"]);
    }

    #[test]
    fn test_outbound_strips_credentials() {
        let inbound = header_map(&[
            ("authorization", "Basic dXNlcjpwYXNz"),
            ("proxy-authorization", "Basic cHJveHk6cGFzcw=="),
            ("host", "proxy.example.com"),
            ("user-agent", "TiviMate/4.7"),
            ("range", "bytes=0-"),
        ]);
        let outbound = outbound_headers(&inbound);

        assert!(!outbound.contains_key(header::AUTHORIZATION));
        assert!(!outbound.contains_key(header::PROXY_AUTHORIZATION));
        assert!(!outbound.contains_key(header::HOST));
        assert_eq!(values(&outbound, "user-agent"), vec!["TiviMate/4.7"]);
        assert_eq!(values(&outbound, "range"), vec!["bytes=0-"]);
    }

    #[test]
    fn test_resolve_direct() {
        let target = StreamTarget::resolve("http://cdn.test/live/u/p/1.ts", Some("1.ts")).unwrap();
        assert_eq!(target.url().as_str(), "http://cdn.test/live/u/p/1.ts");

        let target = StreamTarget::resolve("http://cdn.test/a/b/index.m3u8", None).unwrap();
        assert_eq!(target.url().as_str(), "http://cdn.test/a/b/index.m3u8");
    }

    #[test]
    fn test_resolve_sub_playlist_replaces_last_segment() {
        let target = StreamTarget::resolve(
            "http://cdn.test/hls/chan/index.m3u8?token=abc",
            Some("chunklist_720.m3u8"),
        )
        .unwrap();
        assert_eq!(
            target.url().as_str(),
            "http://cdn.test/hls/chan/chunklist_720.m3u8?token=abc"
        );
    }

    #[test]
    fn test_resolve_invalid_uri_is_internal_error() {
        let err = StreamTarget::resolve("not a url", None).unwrap_err();
        assert!(matches!(err, ProxyError::Internal(_)));

        let err = StreamTarget::resolve("mailto:someone@example.com", Some("x.m3u8")).unwrap_err();
        assert!(matches!(err, ProxyError::Internal(_)));
    }

    #[test]
    fn test_display_hides_credentials() {
        let target = StreamTarget::direct("http://cdn.test/live/realuser/realpass/7.ts").unwrap();
        let shown = target.to_string();
        assert_eq!(shown, "http://cdn.test/.../7.ts");
    }

    #[tokio::test]
    async fn test_read_prefix_is_bounded() {
        let chunks: Vec<Result<Vec<u8>, String>> =
            vec![Ok(vec![b'a'; 5000]), Ok(vec![b'b'; 5000]), Ok(vec![b'c'; 5000])];
        let captured = read_prefix(futures::stream::iter(chunks), ERROR_BODY_LIMIT).await;

        assert_eq!(captured.len(), ERROR_BODY_LIMIT);
        assert_eq!(captured[4999], b'a');
        assert_eq!(captured[5000], b'b');
    }

    /// Local upstream that records request headers and serves canned bodies
    async fn spawn_upstream(seen: Arc<Mutex<Vec<HeaderMap>>>) -> String {
        let app = Router::new().route(
            "/media/:name",
            get(move |Path(name): Path<String>, headers: HeaderMap| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(headers);
                    match name.as_str() {
                        "broken.ts" => (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            [("x-upstream", "yes")],
                            "upstream error message".to_string(),
                        ),
                        "huge-error.ts" => (
                            StatusCode::BAD_GATEWAY,
                            [("x-upstream", "yes")],
                            "e".repeat(20_000),
                        ),
                        _ => (
                            StatusCode::OK,
                            [("x-upstream", "yes")],
                            format!("payload:{}", name),
                        ),
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_relay_streams_success() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_upstream(seen.clone()).await;
        let relay = StreamRelay::new().unwrap();

        let target = StreamTarget::direct(&format!("{}/media/1.ts", base)).unwrap();
        let response = relay
            .relay(&target, &header_map(&[("user-agent", "VLC/3.0")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(values(response.headers(), "x-upstream"), vec!["yes"]);
        assert_eq!(body_bytes(response).await, b"payload:1.ts");
        assert_eq!(
            values(&seen.lock().unwrap()[0], "user-agent"),
            vec!["VLC/3.0"]
        );
    }

    #[tokio::test]
    async fn test_relay_never_forwards_authorization() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_upstream(seen.clone()).await;
        let relay = StreamRelay::new().unwrap();

        let target = StreamTarget::direct(&format!("{}/media/2.ts", base)).unwrap();
        let inbound = header_map(&[
            ("authorization", "Bearer secret"),
            ("proxy-authorization", "Basic secret"),
            ("x-client", "kept"),
        ]);
        relay.relay(&target, &inbound).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen[0].contains_key(header::AUTHORIZATION));
        assert!(!seen[0].contains_key(header::PROXY_AUTHORIZATION));
        assert_eq!(values(&seen[0], "x-client"), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_relay_forwards_upstream_error() {
        let base = spawn_upstream(Arc::new(Mutex::new(Vec::new()))).await;
        let relay = StreamRelay::new().unwrap();

        let target = StreamTarget::direct(&format!("{}/media/broken.ts", base)).unwrap();
        let response = relay.relay(&target, &HeaderMap::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(values(response.headers(), "x-upstream"), vec!["yes"]);
        assert_eq!(body_bytes(response).await, b"upstream error message");
    }

    #[tokio::test]
    async fn test_relay_truncates_large_error_body() {
        let base = spawn_upstream(Arc::new(Mutex::new(Vec::new()))).await;
        let relay = StreamRelay::new().unwrap();

        let target = StreamTarget::direct(&format!("{}/media/huge-error.ts", base)).unwrap();
        let response = relay.relay(&target, &HeaderMap::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!response.headers().contains_key(header::CONTENT_LENGTH));
        let body = body_bytes(response).await;
        assert_eq!(body.len(), ERROR_BODY_LIMIT);
        assert!(body.iter().all(|b| *b == b'e'));
    }

    #[tokio::test]
    async fn test_relay_connection_failure_is_internal_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let relay = StreamRelay::new().unwrap();
        let target = StreamTarget::direct(&format!("http://{}/media/1.ts", addr)).unwrap();
        let err = relay.relay(&target, &HeaderMap::new()).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
