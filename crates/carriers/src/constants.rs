//! Carrier endpoint constants
//!
//! Base URLs per environment and token endpoint paths. These identify
//! the carriers' public API surfaces; the actual secrets (client
//! secrets, API keys) come from configuration.

/// FedEx Track API base URL.
pub fn fedex_base_url(sandbox: bool) -> &'static str {
    if sandbox {
        "https://apis-sandbox.fedex.com"
    } else {
        "https://apis.fedex.com"
    }
}

/// FedEx OAuth token endpoint path (client-credentials grant, form body).
pub const FEDEX_TOKEN_PATH: &str = "/oauth/token";

/// UPS Track API base URL.
pub fn ups_base_url(sandbox: bool) -> &'static str {
    if sandbox {
        "https://wwwcie.ups.com"
    } else {
        "https://onlinetools.ups.com"
    }
}

/// UPS OAuth token endpoint path (client-credentials grant, Basic auth).
pub const UPS_TOKEN_PATH: &str = "/security/v1/oauth/token";

/// UPS OAuth authorization endpoint path (authorization-code + PKCE).
pub const UPS_AUTHORIZE_PATH: &str = "/security/v1/oauth/authorize";

/// DHL eCommerce API base URL.
pub fn dhl_base_url(sandbox: bool) -> &'static str {
    if sandbox {
        "https://api-sandbox.dhlecs.com"
    } else {
        "https://api.dhlecs.com"
    }
}

/// DHL OAuth token endpoint path (client-credentials grant, form body).
pub const DHL_TOKEN_PATH: &str = "/auth/v4/accesstoken";

/// OnTrac tracking service base URL. Test and production are separate
/// service deployments rather than separate hosts.
pub fn ontrac_base_url(sandbox: bool) -> &'static str {
    if sandbox {
        "https://www.shipontrac.net/OnTracTestWebServices/OnTracServices.svc"
    } else {
        "https://www.shipontrac.net/OnTracWebServices/OnTracServices.svc"
    }
}

/// User-Agent sent to carriers that require one.
pub const USER_AGENT: &str = "track-api/0.1";
