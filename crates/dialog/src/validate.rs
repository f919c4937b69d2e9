//! Free-text checks shared by the wizards.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub const MAX_TITLE_LEN: usize = 200;

static SAFE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\s\-.—–,!()]+$").expect("title pattern compiles"));

static URL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://\S+|www\.\S+)").expect("url pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRejection {
    Multiline,
    TooLong,
    Markup,
    DisallowedCharacters,
}

impl TitleRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Multiline => "title must be a single line",
            Self::TooLong => "title is longer than 200 characters",
            Self::Markup => "title must not contain markup",
            Self::DisallowedCharacters => "title contains disallowed characters",
        }
    }
}

/// Checks a user supplied title after decoding HTML entities, so `&lt;` and
/// `&#10;` are judged as the characters they stand for.
pub fn check_title(raw: &str) -> Result<(), TitleRejection> {
    let decoded = decode_entities(raw);
    if decoded.contains(['\n', '\r']) {
        return Err(TitleRejection::Multiline);
    }
    if decoded.chars().count() > MAX_TITLE_LEN {
        return Err(TitleRejection::TooLong);
    }
    if decoded.contains(['<', '>']) {
        return Err(TitleRejection::Markup);
    }
    if !SAFE_TITLE.is_match(&decoded) {
        return Err(TitleRejection::DisallowedCharacters);
    }
    Ok(())
}

pub fn is_valid_title(raw: &str) -> bool {
    check_title(raw).is_ok()
}

// Resolves the full HTML5 entity table. An unknown entity leaves the text as
// is, and the bare `&` then fails the charset.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape_with(raw, quick_xml::escape::resolve_html5_entity)
        .unwrap_or(Cow::Borrowed(raw))
}

/// Extracts the first link from a message. `www.` links get an `https://`
/// scheme; anything that still does not parse as a URL is ignored.
pub fn parse_url(text: &str) -> Option<String> {
    let token = URL_TOKEN.find(text)?.as_str();
    let link = if token.starts_with("www.") {
        format!("https://{token}")
    } else {
        token.to_string()
    };
    Url::parse(&link).ok()?;
    Some(link)
}
