pub mod rate_limit;
pub mod request_log;

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

/// Peer address recorded by the listener, if the router was served with connect info.
pub fn client_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
