//! Hosting platform inference for shielded sites.
//!
//! Detection is a fixed precedence chain over request metadata: edge request
//! id headers, `server` header substrings, and hostname suffixes. The first
//! platform whose signals match wins, so a request carrying a Vercel request
//! id classifies as Vercel even if its hostname points elsewhere. No network
//! calls are made.

use serde::{Deserialize, Serialize};

/// A supported hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformId {
    Vercel,
    Netlify,
    Webflow,
    Shopify,
    GithubPages,
    CloudflarePages,
    Firebase,
    Squarespace,
    Wix,
    Unknown,
}

/// Static cost and risk descriptor for a platform.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlatformConfig {
    pub display_name: &'static str,
    /// Approximate bandwidth cost per GB on this platform.
    pub cost_per_gb: f64,
    /// Per-request cost on platforms that bill invocations.
    pub cost_per_request: f64,
    pub common_paths: &'static [&'static str],
    /// Paths that attract scrapers or burn paid invocations.
    pub risky_paths: &'static [&'static str],
    pub description: &'static str,
}

const VERCEL: PlatformConfig = PlatformConfig {
    display_name: "Vercel",
    cost_per_gb: 0.40,
    cost_per_request: 0.0001,
    common_paths: &["/api/", "/_next/"],
    risky_paths: &["/api/"],
    description: "Vercel API routes and edge functions cost per invocation",
};

const NETLIFY: PlatformConfig = PlatformConfig {
    display_name: "Netlify",
    cost_per_gb: 0.20,
    cost_per_request: 0.0,
    common_paths: &["/.netlify/functions/", "/api/"],
    risky_paths: &["/.netlify/functions/"],
    description: "Netlify functions can be expensive when called by bots",
};

const WEBFLOW: PlatformConfig = PlatformConfig {
    display_name: "Webflow",
    cost_per_gb: 0.20,
    cost_per_request: 0.0,
    common_paths: &["/assets/", "/images/", ".css", ".js"],
    risky_paths: &["/assets/", "/images/", ".css", ".js"],
    description: "Webflow sites are often scraped for design inspiration",
};

const SHOPIFY: PlatformConfig = PlatformConfig {
    display_name: "Shopify",
    cost_per_gb: 0.15,
    cost_per_request: 0.0,
    common_paths: &["/products/", "/collections/", ".json"],
    risky_paths: &["/products/", "/collections/", ".json"],
    description: "Shopify stores are heavily scraped for product data",
};

const GITHUB_PAGES: PlatformConfig = PlatformConfig {
    display_name: "GitHub Pages",
    cost_per_gb: 0.0,
    cost_per_request: 0.0,
    common_paths: &[],
    risky_paths: &[],
    description: "GitHub Pages is free but has usage limits",
};

const CLOUDFLARE_PAGES: PlatformConfig = PlatformConfig {
    display_name: "Cloudflare Pages",
    cost_per_gb: 0.0,
    cost_per_request: 0.0,
    common_paths: &[],
    risky_paths: &[],
    description: "Cloudflare Pages is generous with free tier",
};

const FIREBASE: PlatformConfig = PlatformConfig {
    display_name: "Firebase Hosting",
    cost_per_gb: 0.15,
    cost_per_request: 0.0,
    common_paths: &[],
    risky_paths: &[],
    description: "Firebase Hosting bills egress bandwidth beyond the free tier",
};

const SQUARESPACE: PlatformConfig = PlatformConfig {
    display_name: "Squarespace",
    cost_per_gb: 0.20,
    cost_per_request: 0.0,
    common_paths: &[],
    risky_paths: &[],
    description: "Squarespace sites see heavy catalog and template scraping",
};

const WIX: PlatformConfig = PlatformConfig {
    display_name: "Wix",
    cost_per_gb: 0.20,
    cost_per_request: 0.0,
    common_paths: &[],
    risky_paths: &[],
    description: "Wix sites are scraped for templates and media assets",
};

const UNKNOWN: PlatformConfig = PlatformConfig {
    display_name: "Unknown Platform",
    cost_per_gb: 0.25,
    cost_per_request: 0.0,
    common_paths: &[],
    risky_paths: &[],
    description: "Unknown hosting platform",
};

impl PlatformId {
    /// All platforms the shield knows how to detect, in precedence order.
    pub fn all() -> &'static [PlatformId] {
        &[
            PlatformId::Vercel,
            PlatformId::Netlify,
            PlatformId::Webflow,
            PlatformId::Shopify,
            PlatformId::GithubPages,
            PlatformId::CloudflarePages,
            PlatformId::Firebase,
            PlatformId::Squarespace,
            PlatformId::Wix,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Vercel => "vercel",
            PlatformId::Netlify => "netlify",
            PlatformId::Webflow => "webflow",
            PlatformId::Shopify => "shopify",
            PlatformId::GithubPages => "github-pages",
            PlatformId::CloudflarePages => "cloudflare-pages",
            PlatformId::Firebase => "firebase",
            PlatformId::Squarespace => "squarespace",
            PlatformId::Wix => "wix",
            PlatformId::Unknown => "unknown",
        }
    }

    /// Static config lookup. Every variant has an entry; unknown platforms
    /// get the explicit default.
    pub fn config(&self) -> &'static PlatformConfig {
        match self {
            PlatformId::Vercel => &VERCEL,
            PlatformId::Netlify => &NETLIFY,
            PlatformId::Webflow => &WEBFLOW,
            PlatformId::Shopify => &SHOPIFY,
            PlatformId::GithubPages => &GITHUB_PAGES,
            PlatformId::CloudflarePages => &CLOUDFLARE_PAGES,
            PlatformId::Firebase => &FIREBASE,
            PlatformId::Squarespace => &SQUARESPACE,
            PlatformId::Wix => &WIX,
            PlatformId::Unknown => &UNKNOWN,
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "vercel" => PlatformId::Vercel,
            "netlify" => PlatformId::Netlify,
            "webflow" => PlatformId::Webflow,
            "shopify" => PlatformId::Shopify,
            "github-pages" => PlatformId::GithubPages,
            "cloudflare-pages" => PlatformId::CloudflarePages,
            "firebase" => PlatformId::Firebase,
            "squarespace" => PlatformId::Squarespace,
            "wix" => PlatformId::Wix,
            _ => PlatformId::Unknown,
        })
    }
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Infer the hosting platform from request metadata.
///
/// `headers` are the request headers as (name, value) pairs; `hostname` is
/// the host the request was addressed to. Checks run in a fixed precedence
/// order and the first match wins.
pub fn detect(hostname: &str, headers: &[(String, String)]) -> PlatformId {
    let hostname = hostname.to_lowercase();
    let server = header(headers, "server")
        .map(|v| v.to_lowercase())
        .unwrap_or_default();

    // Vercel
    if header(headers, "x-vercel-id").is_some()
        || server.contains("vercel")
        || hostname.contains("vercel.app")
        || hostname.contains("vercel.dev")
    {
        return PlatformId::Vercel;
    }

    // Netlify
    if header(headers, "x-nf-request-id").is_some()
        || server.contains("netlify")
        || hostname.contains("netlify.app")
        || hostname.contains("netlify.com")
    {
        return PlatformId::Netlify;
    }

    // Webflow
    if server.contains("webflow")
        || hostname.contains("webflow.io")
        || hostname.contains("webflow.com")
    {
        return PlatformId::Webflow;
    }

    // Shopify
    if header(headers, "x-shopify-shop-id").is_some()
        || header(headers, "x-shopify-request-id").is_some()
        || server.contains("shopify")
        || hostname.contains("shopify.com")
        || hostname.contains("myshopify.com")
    {
        return PlatformId::Shopify;
    }

    // GitHub Pages
    if server.contains("github") || hostname.contains("github.io") {
        return PlatformId::GithubPages;
    }

    // Cloudflare Pages
    if header(headers, "cf-ray").is_some()
        && (hostname.contains("pages.dev")
            || header(headers, "x-served-by")
                .map(|v| v.to_lowercase().contains("cloudflare"))
                .unwrap_or(false))
    {
        return PlatformId::CloudflarePages;
    }

    // Firebase Hosting
    if server.contains("firebase")
        || hostname.contains("firebase.app")
        || hostname.contains("firebaseapp.com")
    {
        return PlatformId::Firebase;
    }

    // Squarespace
    if server.contains("squarespace")
        || hostname.contains("squarespace.com")
        || header(headers, "x-contextual-id").is_some()
    {
        return PlatformId::Squarespace;
    }

    // Wix
    if server.contains("wix") || hostname.contains("wixsite.com") || hostname.contains("wix.com") {
        return PlatformId::Wix;
    }

    PlatformId::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn detects_vercel_by_request_id_header() {
        let h = headers(&[("x-vercel-id", "sfo1::abc123")]);
        assert_eq!(detect("example.com", &h), PlatformId::Vercel);
    }

    #[test]
    fn detects_netlify_by_hostname() {
        assert_eq!(
            detect("mysite.netlify.app", &[]),
            PlatformId::Netlify
        );
    }

    #[test]
    fn detects_shopify_by_shop_header() {
        let h = headers(&[("X-Shopify-Shop-Id", "12345")]);
        assert_eq!(detect("shop.example.com", &h), PlatformId::Shopify);
    }

    #[test]
    fn cloudflare_pages_needs_ray_and_corroboration() {
        // cf-ray alone proxies through Cloudflare; without a pages.dev
        // hostname or x-served-by it is not Cloudflare Pages.
        let ray_only = headers(&[("cf-ray", "8a1b2c3d4e5f-SJC")]);
        assert_eq!(detect("example.com", &ray_only), PlatformId::Unknown);

        let ray_and_host = headers(&[("cf-ray", "8a1b2c3d4e5f-SJC")]);
        assert_eq!(
            detect("mysite.pages.dev", &ray_and_host),
            PlatformId::CloudflarePages
        );
    }

    #[test]
    fn precedence_vercel_header_beats_netlify_hostname() {
        // A Vercel edge request id wins over a Netlify-looking hostname
        // because the chain checks Vercel first.
        let h = headers(&[("x-vercel-id", "iad1::xyz")]);
        assert_eq!(detect("mysite.netlify.app", &h), PlatformId::Vercel);
    }

    #[test]
    fn server_header_is_case_insensitive() {
        let h = headers(&[("Server", "Netlify Edge")]);
        assert_eq!(detect("example.com", &h), PlatformId::Netlify);
    }

    #[test]
    fn unmatched_host_is_unknown() {
        assert_eq!(detect("plain-site.example", &[]), PlatformId::Unknown);
    }

    #[test]
    fn config_table_covers_unknown() {
        let config = PlatformId::Unknown.config();
        assert_eq!(config.display_name, "Unknown Platform");
        assert_eq!(config.cost_per_gb, 0.25);
        assert!(config.risky_paths.is_empty());
    }

    #[test]
    fn vercel_bills_per_request() {
        let config = PlatformId::Vercel.config();
        assert!(config.cost_per_request > 0.0);
        assert!(config.risky_paths.contains(&"/api/"));
    }

    #[test]
    fn id_round_trips_through_str() {
        for platform in PlatformId::all() {
            let parsed: PlatformId = platform.as_str().parse().unwrap();
            assert_eq!(parsed, *platform);
        }
        let unknown: PlatformId = "somehost".parse().unwrap();
        assert_eq!(unknown, PlatformId::Unknown);
    }
}
