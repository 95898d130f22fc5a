use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace};
use regex::Regex;

/// Resolves the client's network origin for trial gating. The origin is one of the three trial
/// identity keys, so it is never read from the request body; it comes from, in decreasing order of
/// preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set in the configuration.
/// 3. The peer address of the connection itself.
///
/// Both header options are only safe behind a reverse proxy that overwrites the header; a
/// directly-exposed server must leave them off or trial claims become self-attested.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            // the header may carry a chain of proxies; the client is the first entry
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Trial origin taken from X-Forwarded-For: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        let re = Regex::new(r#"for=(?P<ip>[^;]+)"#).ok()?;
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| re.captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Trial origin taken from Forwarded header: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Trial origin taken from the peer address: {peer_addr:?}");
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}
