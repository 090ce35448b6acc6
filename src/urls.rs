use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref HTTP_URL: Regex = Regex::new(r#"https?://[^\s'"`<>]+"#).unwrap();
}

/// Turn a planner-supplied URL into something navigable, or reject it.
///
/// Wrapping quotes/backticks are stripped, spaces are percent-encoded and stray
/// backslashes dropped. Anything without an http(s) scheme is rejected rather
/// than guessed at.
pub fn clean_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c| matches!(c, '`' | '\'' | '"')).trim();
    if trimmed.is_empty() || !trimmed.to_ascii_lowercase().starts_with("http") {
        return None;
    }

    let candidate = trimmed.replace(' ', "%20").replace('\\', "");
    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Some(candidate),
        _ => None,
    }
}

/// First `http(s)://` URL found anywhere in `text`, minus trailing sentence
/// punctuation.
pub fn find_http_url(text: &str) -> Option<&str> {
    HTTP_URL
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')']))
}

/// `<base>/login` without doubling the slash.
pub fn login_url(base: &str) -> String {
    format!("{}/login", base.trim_end_matches('/'))
}
