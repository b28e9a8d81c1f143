//! Redaction helpers for log output
//!
//! Credentials never reach a log line. URLs that may still carry userinfo go
//! through [`redact_url`]; free text such as upstream error snippets goes
//! through [`redact_sensitive`].

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

static USERINFO_REGEX: OnceLock<Regex> = OnceLock::new();
static API_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
static PASSWORD_REGEX: OnceLock<Regex> = OnceLock::new();

/// Placeholder written in place of secrets
pub const REDACTED: &str = "***";

/// Replace the userinfo segment of a URL with `***`
///
/// URLs without userinfo are returned unchanged. Strings that do not parse
/// as URLs are scrubbed textually so a malformed URL in an error message
/// cannot leak a password either.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.username().is_empty() && url.password().is_none() {
                return raw.to_string();
            }
            if url.set_username(REDACTED).is_ok() && url.set_password(None).is_ok() {
                url.to_string()
            } else {
                scrub_userinfo(raw)
            }
        }
        Err(_) => scrub_userinfo(raw),
    }
}

fn scrub_userinfo(raw: &str) -> String {
    let regex = USERINFO_REGEX
        .get_or_init(|| Regex::new(r"(://)[^/?#@\s]*@").expect("Valid regex pattern"));
    regex.replace_all(raw, format!("${{1}}{REDACTED}@")).into_owned()
}

/// Redact API keys, tokens and passwords from free text
pub fn redact_sensitive(input: &str) -> String {
    let api_key = API_KEY_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(api[_-]?key|apikey)[=:\s]+['"]?([a-zA-Z0-9_-]{10,})['"]?"#)
            .expect("Valid regex pattern")
    });
    let token = TOKEN_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(token|bearer)[=:\s]+['"]?([a-zA-Z0-9_.-]{10,})['"]?"#)
            .expect("Valid regex pattern")
    });
    let password = PASSWORD_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(password|passwd|pwd)[=:\s]+['"]?([^\s'"]{3,})['"]?"#)
            .expect("Valid regex pattern")
    });

    let mut result = api_key.replace_all(input, "$1=***").into_owned();
    result = token.replace_all(&result, "$1=***").into_owned();
    password.replace_all(&result, "$1=***").into_owned()
}
