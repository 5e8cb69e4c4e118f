use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Query},
    http::{HeaderMap, Request, header},
};
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::handlers::common::UserQuery;

/// Opens one `request` span per call, tagged with the card being asked for.
#[derive(Debug, Clone, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let (user, theme) = match Query::<UserQuery>::try_from_uri(request.uri()) {
            Ok(Query(query)) => (query.user, query.theme),
            Err(_) => (None, None),
        };
        let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0.ip());
        let client = client_ip(request.headers(), peer).map_or_else(|| "-".to_string(), |ip| ip.to_string());
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = request.uri().path(),
            user = user.as_deref().unwrap_or("-"),
            theme = theme.as_deref().unwrap_or("-"),
            client = %client,
            user_agent = request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-"),
        )
    }
}

/// `CF-Connecting-IP`, then the first hop of `X-Forwarded-For`, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    ["cf-connecting-ip", "x-forwarded-for"]
        .into_iter()
        .filter_map(|name| headers.get(name)?.to_str().ok())
        .find_map(|value| value.split(',').next()?.trim().parse().ok())
        .or(peer)
}
