//! SSRF admission policy.
//!
//! Every URL passes through [`admit`] before any network I/O happens for
//! it. The guard refuses non-http(s) schemes, well-known local hostnames,
//! cloud metadata endpoints (unconditionally), IP literals in private
//! ranges, and hostnames that resolve to private addresses. DNS failure
//! does not refuse admission — the fetcher surfaces the transport error.

use std::net::IpAddr;

use url::{Host, Url};

use webharvest_shared::{HarvestError, Result};

/// Hostnames refused unless private targets are explicitly allowed.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "0.0.0.0"];

/// Cloud metadata endpoints, refused even when private targets are
/// allowed. Instance credentials live behind these.
const METADATA_HOSTS: &[&str] = &[
    "169.254.169.254",
    "metadata.google.internal",
    "metadata.goog",
];

/// Check a URL against the SSRF policy. `Ok(())` admits the URL for
/// fetching; errors carry the refusal reason.
pub async fn admit(url: &Url, allow_private: bool) -> Result<()> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HarvestError::policy(format!(
                "scheme {other:?} is not allowed"
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| HarvestError::policy("URL has no host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase();

    if !allow_private && LOCAL_HOSTS.contains(&host.as_str()) {
        return Err(HarvestError::policy(format!("local host {host:?}")));
    }

    if METADATA_HOSTS.contains(&host.as_str()) {
        return Err(HarvestError::policy(format!(
            "cloud metadata endpoint {host:?}"
        )));
    }

    match url.host() {
        Some(Host::Ipv4(ip)) => {
            if !allow_private && is_private_ip(&IpAddr::V4(ip)) {
                return Err(HarvestError::policy(format!("private IP {ip}")));
            }
        }
        Some(Host::Ipv6(ip)) => {
            if !allow_private && is_private_ip(&IpAddr::V6(ip)) {
                return Err(HarvestError::policy(format!("private IP {ip}")));
            }
        }
        Some(Host::Domain(domain)) => {
            if !allow_private {
                resolves_public(domain, url.port_or_known_default().unwrap_or(80)).await?;
            }
        }
        None => return Err(HarvestError::policy("URL has no host")),
    }

    Ok(())
}

/// Re-resolve a hostname and refuse if it points at a private address
/// (DNS rebinding defense). Resolution failure admits: unresolvable
/// names fail at fetch time with an honest transport error instead.
async fn resolves_public(domain: &str, port: u16) -> Result<()> {
    let addrs = match tokio::net::lookup_host((domain, port)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::debug!(domain, error = %e, "DNS resolution failed, admitting");
            return Ok(());
        }
    };

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(HarvestError::policy(format!(
                "host {domain:?} resolves to private IP {}",
                addr.ip()
            )));
        }
    }

    Ok(())
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
                // 240.0.0.0/4 (reserved)
                || v4.octets()[0] >= 240
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 (unique local)
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 (link local)
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}
