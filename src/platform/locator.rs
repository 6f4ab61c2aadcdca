//! Signature function lookup in the player script
//!
//! The candidates are tuned against a moving target: the player script's
//! obfuscation changes periodically, and when none of them matches any more
//! the lookup fails with [`ResolveError::CipherFunctionNotFound`]. That is
//! the point where the pattern list needs updating.

use crate::error::ResolveError;
use regex::Regex;
use tracing::debug;

/// Signature function candidates, most specific first
///
/// Generic `set(` patterns come late because they also match unrelated
/// helpers. Every pattern captures the function name as `sig`.
pub const FUNCTION_PATTERNS: &[(&str, &str)] = &[
    (
        "set with encodeURIComponent",
        r"\b[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
    (
        "generic set with encodeURIComponent",
        r"\b[a-zA-Z0-9]+\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
    (
        "two-character split assignment",
        r#"(?:\b|[^a-zA-Z0-9$])(?P<sig>[a-zA-Z0-9$]{2})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
    ),
    (
        "split assignment",
        r#"(?P<sig>[a-zA-Z0-9$]+)\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
    ),
    (
        "quoted signature key",
        r#"["']signature["']\s*,\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    ),
    ("sig fallback", r"\.sig\|\|(?P<sig>[a-zA-Z0-9$]+)\("),
    (
        "akamaized set",
        r"yt\.akamaized\.net/\)\s*\|\|\s*.*?\s*[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*(?:encodeURIComponent\s*\()?\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
    (
        "set",
        r"\b[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
    (
        "generic set",
        r"\b[a-zA-Z0-9]+\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
    (
        "set with wrapped call on a",
        r"\bc\s*&&\s*a\.set\([^,]+\s*,\s*\([^)]*\)\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
    (
        "set with wrapped call",
        r"\bc\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*\([^)]*\)\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\(",
    ),
];

/// Find the name of the signature function in the player script
pub fn locate(script_body: &str) -> Result<String, ResolveError> {
    debug!(
        "Searching for signature function in player script ({} chars)",
        script_body.len()
    );

    for (i, (name, pattern)) in FUNCTION_PATTERNS.iter().enumerate() {
        let regex = Regex::new(pattern)?;
        if let Some(function_name) = regex.captures(script_body).and_then(|c| c.name("sig")) {
            debug!(
                "Found signature function '{}' with pattern {} ({})",
                function_name.as_str(),
                i + 1,
                name
            );
            return Ok(function_name.as_str().to_string());
        }
    }

    Err(ResolveError::CipherFunctionNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        for (name, pattern) in FUNCTION_PATTERNS {
            assert!(Regex::new(pattern).is_ok(), "pattern '{}' must compile", name);
        }
    }

    #[test]
    fn test_locate_set_with_encode_uri_component() {
        let js = r#"var x=1;c&&d.set(b,encodeURIComponent(Qy(decodeURIComponent(c))));"#;
        assert_eq!(locate(js).unwrap(), "Qy");
    }

    #[test]
    fn test_locate_generic_set_with_encode_uri_component() {
        let js = r#"h.s&&e.set(h.sp,encodeURIComponent($Zk(decodeURIComponent(h.s))))"#;
        assert_eq!(locate(js).unwrap(), "$Zk");
    }

    #[test]
    fn test_locate_third_candidate_only() {
        let js = r#"var Bo={};Xy=function(a){a=a.split("");Bo.Rv(a,3);return a.join("")};"#;
        assert_eq!(locate(js).unwrap(), "Xy");
    }

    #[test]
    fn test_locate_split_assignment_long_name() {
        let js = r#";var Abc=function(a){a=a.split("");return a.join("")};"#;
        assert_eq!(locate(js).unwrap(), "Abc");
    }

    #[test]
    fn test_locate_quoted_signature_key() {
        let js = r#"f.set("signature",Kp(b));"#;
        assert_eq!(locate(js).unwrap(), "Kp");

        let js = r#"f.set('signature', Kp2(b));"#;
        assert_eq!(locate(js).unwrap(), "Kp2");
    }

    #[test]
    fn test_locate_sig_fallback() {
        let js = r#"var b=a.sig||Zz(a.s);"#;
        assert_eq!(locate(js).unwrap(), "Zz");
    }

    #[test]
    fn test_locate_priority_prefers_specific_pattern() {
        // The generic `set(` call comes first in the text but is tried last
        let js = concat!(
            r#"e&&f.set(g,Helper(h));"#,
            r#"c&&d.set(b,encodeURIComponent(Real(c)));"#
        );
        assert_eq!(locate(js).unwrap(), "Real");
    }

    #[test]
    fn test_locate_not_found() {
        let js = "function unrelated(){return 1}";
        assert!(matches!(
            locate(js),
            Err(ResolveError::CipherFunctionNotFound)
        ));
    }
}
