/// User-agent shape heuristics. All checks are independent and additive,
/// operating on the lowercased User-Agent string.
pub fn shape_score(ua_lower: &str) -> u32 {
    let mut score = 0;

    // Real browser UAs are long; very short strings are hand-rolled.
    if ua_lower.len() < 20 {
        score += 30;
    }

    // No product/version delimiter at all.
    if !ua_lower.contains('/') {
        score += 20;
    }

    // HTTP client libraries advertise their transport; browsers say Mozilla.
    if ua_lower.contains("http") && !ua_lower.contains("mozilla") {
        score += 40;
    }

    // Scripting-runtime tokens.
    if ua_lower.contains("python") {
        score += 50;
    }
    if ua_lower.contains("java") {
        score += 30;
    }
    if ua_lower.contains("go-http") {
        score += 40;
    }

    // Long strings of nothing but letters, digits and spaces carry none of
    // the punctuation a real UA accumulates.
    if ua_lower.len() > 30
        && ua_lower
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
    {
        score += 25;
    }

    score
}
