use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Method};
use pingora::{Error, ErrorType};
use pingora_core::{upstreams::peer::HttpPeer, Result};
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{FailToProxy, ProxyHttp, Session as PingoraSession};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServeMode;
use crate::headers::{is_websocket_upgrade, prepare_upstream_request, ForwardKind, REQUEST_ID_HEADER};
use crate::routes::Route;
use crate::static_files::{self, StaticFile, StaticFiles};
use crate::traits::UpstreamResolver;

pub const SERVER_NAME: &str = "devgate";

/// Per-request state
pub struct ProxyContext {
    pub request_id: String,
    pub start_time: Instant,
    pub method: String,
    pub path: String,
    pub client_ip: Option<String>,
    pub route: Option<Arc<Route>>,
    pub forward_kind: Option<ForwardKind>,
    pub upstream_url: Option<String>,
    pub served_static: bool,
    pub error_message: Option<String>,
}

impl ProxyContext {
    /// Where the request went, for the access log
    pub fn log_target(&self) -> String {
        if self.served_static {
            "static".to_string()
        } else {
            self.upstream_url.clone().unwrap_or_else(|| "-".to_string())
        }
    }

    pub fn log_error(&self) -> &str {
        self.error_message.as_deref().unwrap_or("-")
    }
}

/// Dev/preview server: proxies configured prefixes, serves static files otherwise
pub struct DevProxy {
    mode: ServeMode,
    resolver: Arc<dyn UpstreamResolver>,
    static_files: StaticFiles,
}

impl DevProxy {
    pub fn new(
        mode: ServeMode,
        resolver: Arc<dyn UpstreamResolver>,
        static_files: StaticFiles,
    ) -> Self {
        Self {
            mode,
            resolver,
            static_files,
        }
    }

    pub fn mode(&self) -> ServeMode {
        self.mode
    }

    pub fn static_files(&self) -> &StaticFiles {
        &self.static_files
    }

    /// Route for a request path, if it is proxied
    pub fn route_for(&self, path: &str) -> Option<Arc<Route>> {
        self.resolver.resolve_route(path)
    }

    fn client_ip(session: &PingoraSession) -> Option<String> {
        session
            .client_addr()
            .and_then(|addr| addr.as_inet())
            .map(|addr| addr.ip().to_string())
    }

    async fn write_plain_response(
        session: &mut PingoraSession,
        ctx: &ProxyContext,
        status: u16,
        body: &'static str,
    ) -> Result<()> {
        let mut resp = ResponseHeader::build(status, None)?;
        resp.insert_header(header::SERVER, SERVER_NAME)?;
        resp.insert_header(header::CONTENT_TYPE, "text/plain; charset=utf-8")?;
        resp.insert_header(header::CONTENT_LENGTH, body.len().to_string())?;
        resp.insert_header(header::CACHE_CONTROL, "private, no-store")?;
        resp.insert_header(REQUEST_ID_HEADER, ctx.request_id.as_str())?;

        session.write_response_header(Box::new(resp), false).await?;
        session
            .write_response_body(Some(Bytes::from_static(body.as_bytes())), true)
            .await?;
        Ok(())
    }

    /// Answer a request that matched no proxy rule from the static root
    async fn serve_static(&self, session: &mut PingoraSession, ctx: &mut ProxyContext) -> Result<()> {
        ctx.served_static = true;

        let method = session.req_header().method.clone();
        let file = if is_static_method(&method) {
            match self.static_files.load(&ctx.path).await {
                Ok(file) => file,
                Err(e) => {
                    error!("Failed to read static file for {}: {}", ctx.path, e);
                    ctx.error_message = Some(e.to_string());
                    return Self::write_plain_response(session, ctx, 500, "Internal Server Error")
                        .await;
                }
            }
        } else {
            None
        };

        let if_none_match = session
            .req_header()
            .headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok());

        let file = match (static_reply(&method, file.as_ref(), if_none_match), file) {
            (StaticReply::Serve, Some(file)) => file,
            (StaticReply::NotModified, Some(file)) => {
                debug!("ETag match - returning 304 Not Modified for: {}", ctx.path);
                let mut resp = ResponseHeader::build(StaticReply::NotModified.status(), None)?;
                resp.insert_header(header::ETAG, file.etag.as_str())?;
                resp.insert_header(header::CACHE_CONTROL, file.cache_control(&ctx.path))?;
                resp.insert_header(REQUEST_ID_HEADER, ctx.request_id.as_str())?;
                session.write_response_header(Box::new(resp), true).await?;
                return Ok(());
            }
            (reply, _) => {
                debug!("No static response for {} {}: {:?}", method, ctx.path, reply);
                return Self::write_plain_response(session, ctx, reply.status(), reply.reason())
                    .await;
            }
        };

        let cache_control = file.cache_control(&ctx.path);

        let accept_encoding = session
            .req_header()
            .headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok());
        let wants_gzip = static_files::accepts_gzip(accept_encoding)
            && static_files::should_compress_content(&file.content_type, file.content.len());

        let (body, compressed) = if wants_gzip {
            match static_files::compress_gzip(&file.content) {
                Ok(gz) if gz.len() < file.content.len() => (gz, true),
                Ok(_) => (file.content, false),
                Err(e) => {
                    warn!("Failed to compress {}: {}", ctx.path, e);
                    (file.content, false)
                }
            }
        } else {
            (file.content, false)
        };

        let mut resp = ResponseHeader::build(200, None)?;
        resp.insert_header(header::SERVER, SERVER_NAME)?;
        resp.insert_header(header::CONTENT_TYPE, file.content_type.as_str())?;
        resp.insert_header(header::CONTENT_LENGTH, body.len().to_string())?;
        resp.insert_header(header::ETAG, file.etag.as_str())?;
        resp.insert_header(header::CACHE_CONTROL, cache_control)?;
        resp.insert_header(REQUEST_ID_HEADER, ctx.request_id.as_str())?;
        if compressed {
            resp.insert_header(header::CONTENT_ENCODING, "gzip")?;
            resp.insert_header(header::VARY, "Accept-Encoding")?;
        }

        if method == Method::HEAD {
            session.write_response_header(Box::new(resp), true).await?;
        } else {
            session.write_response_header(Box::new(resp), false).await?;
            session
                .write_response_body(Some(Bytes::from(body)), true)
                .await?;
        }
        Ok(())
    }
}

/// Outcome of a request answered from the static root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticReply {
    Serve,
    NotModified,
    NotFound,
    MethodNotAllowed,
}

impl StaticReply {
    pub fn status(&self) -> u16 {
        match self {
            StaticReply::Serve => 200,
            StaticReply::NotModified => 304,
            StaticReply::NotFound => 404,
            StaticReply::MethodNotAllowed => 405,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            StaticReply::Serve => "OK",
            StaticReply::NotModified => "Not Modified",
            StaticReply::NotFound => "Not Found",
            StaticReply::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

fn is_static_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Decide how to answer an unproxied request given the file found for it
pub fn static_reply(
    method: &Method,
    file: Option<&StaticFile>,
    if_none_match: Option<&str>,
) -> StaticReply {
    if !is_static_method(method) {
        return StaticReply::MethodNotAllowed;
    }
    match file {
        None => StaticReply::NotFound,
        Some(file) if if_none_match == Some(file.etag.as_str()) => StaticReply::NotModified,
        Some(_) => StaticReply::Serve,
    }
}

/// Status sent downstream when proxying fails
pub fn upstream_error_status(etype: &ErrorType) -> u16 {
    match etype {
        ErrorType::HTTPStatus(code) => *code,
        _ => 502,
    }
}

fn upstream_error_body(status: u16) -> &'static str {
    if status == 502 {
        "Bad Gateway"
    } else {
        "Proxy Error"
    }
}

#[async_trait]
impl ProxyHttp for DevProxy {
    type CTX = ProxyContext;

    fn new_ctx(&self) -> Self::CTX {
        ProxyContext {
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            method: String::new(),
            path: String::new(),
            client_ip: None,
            route: None,
            forward_kind: None,
            upstream_url: None,
            served_static: false,
            error_message: None,
        }
    }

    async fn request_filter(
        &self,
        session: &mut PingoraSession,
        ctx: &mut Self::CTX,
    ) -> Result<bool>
    where
        Self::CTX: Send + Sync,
    {
        ctx.start_time = Instant::now();
        ctx.method = session.req_header().method.to_string();
        ctx.path = session.req_header().uri.path().to_string();
        ctx.client_ip = Self::client_ip(session);

        match self.route_for(&ctx.path) {
            Some(route) => {
                debug!(
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path,
                    prefix = %route.prefix,
                    websocket = is_websocket_upgrade(session.req_header()),
                    "Proxying request"
                );
                let path_and_query = session
                    .req_header()
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| ctx.path.clone());
                ctx.upstream_url = Some(route.upstream.forward_url(&path_and_query));
                ctx.route = Some(route);
                Ok(false)
            }
            None => {
                self.serve_static(session, ctx).await?;
                Ok(true)
            }
        }
    }

    async fn upstream_peer(
        &self,
        _session: &mut PingoraSession,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let route = ctx.route.as_ref().ok_or_else(|| {
            Error::explain(
                ErrorType::InternalError,
                format!("No proxy route for {}", ctx.path),
            )
        })?;
        route.upstream.peer().await
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut PingoraSession,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()>
    where
        Self::CTX: Send + Sync,
    {
        let Some(route) = ctx.route.clone() else {
            return Ok(());
        };

        let kind = prepare_upstream_request(
            upstream_request,
            &route,
            ctx.client_ip.as_deref(),
            &ctx.request_id,
        )?;
        if kind == ForwardKind::WebSocket {
            debug!(
                request_id = %ctx.request_id,
                "Tunnelling WebSocket upgrade to {}",
                route.upstream.origin
            );
        }
        ctx.forward_kind = Some(kind);
        Ok(())
    }

    fn fail_to_connect(
        &self,
        _session: &mut PingoraSession,
        peer: &HttpPeer,
        ctx: &mut Self::CTX,
        e: Box<Error>,
    ) -> Box<Error> {
        error!(
            "Failed to connect to upstream {:?} for {}: {}",
            peer, ctx.path, e
        );
        e
    }

    async fn fail_to_proxy(
        &self,
        session: &mut PingoraSession,
        e: &Error,
        ctx: &mut Self::CTX,
    ) -> FailToProxy
    where
        Self::CTX: Send + Sync,
    {
        error!(
            "Failed to proxy: {} | request_id={} method={} path={} upstream={}",
            e,
            ctx.request_id,
            ctx.method,
            ctx.path,
            ctx.upstream_url.as_deref().unwrap_or("none")
        );
        ctx.error_message = Some(e.to_string());

        let error_code = upstream_error_status(e.etype());

        // Headers may already be on the wire once a response started streaming
        if session.response_written().is_none() {
            let body = upstream_error_body(error_code);
            if let Err(write_err) =
                Self::write_plain_response(session, ctx, error_code, body).await
            {
                error!("Failed to write error response: {}", write_err);
            }
        }

        FailToProxy {
            error_code,
            can_reuse_downstream: false,
        }
    }

    async fn logging(
        &self,
        session: &mut PingoraSession,
        _e: Option<&Error>,
        ctx: &mut Self::CTX,
    ) where
        Self::CTX: Send + Sync,
    {
        let status = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(0);
        let elapsed_ms = ctx.start_time.elapsed().as_millis();

        let target = ctx.log_target();
        let websocket = ctx.forward_kind == Some(ForwardKind::WebSocket);

        info!(
            request_id = %ctx.request_id,
            mode = %self.mode,
            method = %ctx.method,
            path = %ctx.path,
            status = status,
            target = %target,
            websocket = websocket,
            elapsed_ms = elapsed_ms as u64,
            error = ctx.log_error(),
            "{} {} {}",
            ctx.method,
            ctx.path,
            status
        );
    }
}
