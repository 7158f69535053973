/// Known bot User-Agent tokens, scanned in order; the first hit decides.
///
/// Specific tool and crawler names come before the generic markers so that
/// "googlebot" resolves to the legitimate crawler entry rather than the bare
/// "bot" substring.
const KNOWN_BOTS: &[&str] = &[
    "scrapy",
    "python-requests",
    "curl",
    "wget",
    "httpx",
    "aiohttp",
    "selenium",
    "phantomjs",
    "puppeteer",
    "playwright",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "googlebot",
    "bingbot",
    "yandexbot",
    "baiduspider",
    "slackbot",
    "whatsapp",
    "telegram",
    "archive",
    "bot",
    "crawler",
    "spider",
    "scraper",
];

/// Crawlers that get the reduced legitimate-bot contribution: search engines
/// and social preview fetchers a site usually wants indexed by.
const LEGITIMATE_BOTS: &[&str] = &[
    "googlebot",
    "bingbot",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "whatsapp",
    "slackbot",
    "telegram",
];

/// Automation markers scanned independently of the known-bot tokens.
const SUSPICIOUS_PATTERNS: &[&str] = &[
    "headless",
    "automated",
    "script",
    "download",
    "fetch",
    "test",
    "monitor",
    "check",
    "scan",
    "probe",
];

/// Outcome of the known-bot token scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotToken {
    Legitimate(&'static str),
    Malicious(&'static str),
}

/// Scan a lowercased User-Agent for known bot tokens. Stops at the first
/// match; never double counts.
pub fn scan(ua_lower: &str) -> Option<BotToken> {
    for token in KNOWN_BOTS {
        if ua_lower.contains(token) {
            if LEGITIMATE_BOTS.contains(token) {
                return Some(BotToken::Legitimate(token));
            }
            return Some(BotToken::Malicious(token));
        }
    }
    None
}

/// First suspicious automation marker in a lowercased User-Agent, if any.
pub fn suspicious_pattern(ua_lower: &str) -> Option<&'static str> {
    SUSPICIOUS_PATTERNS
        .iter()
        .find(|pattern| ua_lower.contains(**pattern))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapy_is_malicious() {
        assert_eq!(scan("scrapy/2.9.0"), Some(BotToken::Malicious("scrapy")));
    }

    #[test]
    fn googlebot_is_legitimate() {
        assert_eq!(
            scan("mozilla/5.0 (compatible; googlebot/2.1; +http://www.google.com/bot.html)"),
            Some(BotToken::Legitimate("googlebot"))
        );
    }

    #[test]
    fn generic_bot_marker_is_malicious() {
        assert_eq!(scan("mycustombot/1.0"), Some(BotToken::Malicious("bot")));
    }

    #[test]
    fn scan_stops_at_first_token() {
        // Contains both "python-requests" and the generic "bot"; the scan
        // must report the earlier token only.
        assert_eq!(
            scan("python-requests robotics"),
            Some(BotToken::Malicious("python-requests"))
        );
    }

    #[test]
    fn browser_ua_matches_nothing() {
        let ua = "mozilla/5.0 (windows nt 10.0; win64; x64) applewebkit/537.36 \
                  (khtml, like gecko) chrome/120.0.0.0 safari/537.36";
        assert_eq!(scan(ua), None);
        assert_eq!(suspicious_pattern(ua), None);
    }

    #[test]
    fn headless_is_suspicious() {
        assert_eq!(suspicious_pattern("headlesschrome/120.0"), Some("headless"));
    }
}
