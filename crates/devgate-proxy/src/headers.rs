use http::header;
use pingora_core::Result;
use pingora_http::RequestHeader;

use crate::routes::Route;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// How a request travels to the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardKind {
    Http,
    WebSocket,
}

/// `Upgrade: websocket`, compared case-insensitively
pub fn is_websocket_upgrade(req: &RequestHeader) -> bool {
    req.headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|upgrade| upgrade.to_ascii_lowercase().contains("websocket"))
        .unwrap_or(false)
}

fn connection_requests_upgrade(req: &RequestHeader) -> bool {
    req.headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Rewrite the outbound request for a route.
///
/// Path and query are never touched. `changeOrigin` sets Host to the
/// target's host. Upgrade requests on rules without `ws` lose their
/// Upgrade/Connection headers and go upstream as plain HTTP.
pub fn prepare_upstream_request(
    req: &mut RequestHeader,
    route: &Route,
    client_ip: Option<&str>,
    request_id: &str,
) -> Result<ForwardKind> {
    let kind = if is_websocket_upgrade(req) {
        if route.rule.ws {
            ForwardKind::WebSocket
        } else {
            req.remove_header(&header::UPGRADE);
            if connection_requests_upgrade(req) {
                req.remove_header(&header::CONNECTION);
            }
            ForwardKind::Http
        }
    } else {
        ForwardKind::Http
    };

    if route.rule.change_origin {
        req.insert_header(header::HOST, route.upstream.host_header.as_str())?;
    }

    if let Some(ip) = client_ip {
        let forwarded = match req
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) if !existing.is_empty() => format!("{}, {}", existing, ip),
            _ => ip.to_string(),
        };
        req.insert_header(FORWARDED_FOR_HEADER, forwarded)?;
    }

    req.insert_header(REQUEST_ID_HEADER, request_id)?;

    Ok(kind)
}
