//! Shell integration payload codec
//!
//! VS Code style sequences (OSC 633) escape their free-text arguments so that
//! `;` can be used as a separator: a backslash is written as `\\`, and `;`
//! plus every character at or below `0x20` is written as `\xHH`.
//!
//! ```text
//! "\"  -> "\\"
//! "\n" -> "\x0a"
//! ";"  -> "\x3b"
//! ```
//!
//! This module also holds the small parsers shared by the dialect handlers.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

/// SGR (color/style) sequences, the only escapes shells put in `Prompt`
static SGR_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid SGR regex"));

/// CSI, OSC and two-byte ESC sequences
static CONTROL_SEQUENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?:(?:\x1b\[|\x{9b})[=?>!]?[\d;:]*["$#'* ]?[a-zA-Z@^`{}|~])"#,
        r"|(?:(?:\x1b\]|\x{9d}).*?(?:\x1b\\|\x07|\x{9c}))",
        r"|(?:\x1b[ #%()*+\-./]?[a-zA-Z0-9|}~@])",
    ))
    .expect("valid control sequence regex")
});

/// Bash `\[ ... \]` non-printing prompt regions
static PROMPT_NON_PRINTABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\[.*?\\\]").expect("valid prompt regex"));

/// OSC 7 payloads we accept as a cwd report
static FILE_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^file://.*/").expect("valid file uri regex"));

/// Escape a message for use as an OSC 633 argument
pub fn encode(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' | '\0'..=' ' => out.push_str(&format!("\\x{:02x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`encode`]
///
/// Unknown or truncated escapes are copied through literally, so this never
/// fails on malformed input.
pub fn decode(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(idx) = rest.find('\\') {
        out.push_str(&rest[..idx]);
        let escape = &rest[idx..];

        if escape.starts_with("\\\\") {
            out.push('\\');
            rest = &escape[2..];
            continue;
        }

        if let Some(byte) = hex_escape(escape) {
            out.push(char::from(byte));
            rest = &escape[4..];
            continue;
        }

        out.push('\\');
        rest = &escape[1..];
    }

    out.push_str(rest);
    out
}

/// Parse `\xHH` at the start of `s` (the `x` and hex digits are case-insensitive)
fn hex_escape(s: &str) -> Option<u8> {
    let bytes = s.as_bytes();
    if bytes.len() < 4 || !matches!(bytes[1], b'x' | b'X') {
        return None;
    }
    let hex = s.get(2..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Result of splitting `key=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue<'a> {
    /// Text before the first `=` (the whole input when there is none)
    pub key: &'a str,
    /// Text after the first `=`; `None` means the input was not an assignment
    pub value: Option<&'a str>,
}

/// Split a property assignment at its first `=`
pub fn parse_key_value_assignment(message: &str) -> KeyValue<'_> {
    match message.split_once('=') {
        Some((key, value)) => KeyValue {
            key,
            value: Some(value),
        },
        None => KeyValue {
            key: message,
            value: None,
        },
    }
}

/// Properties of a buffer mark (`SetMark`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkProperties {
    /// Identifier used to reference the mark later
    pub id: Option<String>,
    /// Hidden marks are kept for internal reference but not decorated
    pub hidden: bool,
}

/// Parse the `[Id=<id>][;Hidden]` arguments of a `SetMark` sequence
pub fn parse_mark_sequence<S: AsRef<str>>(args: &[S]) -> MarkProperties {
    let mut props = MarkProperties::default();
    for arg in args {
        let arg = arg.as_ref();
        if arg.is_empty() {
            continue;
        }
        if arg == "Hidden" {
            props.hidden = true;
        }
        if let Some(id) = arg.strip_prefix("Id=") {
            props.id = Some(id.to_string());
        }
    }
    props
}

/// Remove SGR sequences (`ESC [ ... m`)
pub fn strip_sgr(value: &str) -> String {
    SGR_SEQUENCE.replace_all(value, "").into_owned()
}

/// Remove all escape sequences and bash non-printing regions from a prompt
pub fn remove_ansi_escape_codes_from_prompt(value: &str) -> String {
    let without_escapes = CONTROL_SEQUENCES.replace_all(value, "");
    PROMPT_NON_PRINTABLE
        .replace_all(&without_escapes, "")
        .into_owned()
}

/// Normalize a reported working directory
///
/// Strips one pair of wrapping quotes and uppercases a Windows drive letter.
pub fn sanitize_cwd(cwd: &str) -> String {
    let mut cwd = cwd;
    let quoted = cwd.len() >= 2
        && cwd.starts_with(['\'', '"'])
        && cwd.ends_with(['\'', '"']);
    if quoted {
        cwd = &cwd[1..cwd.len() - 1];
    }

    let mut chars = cwd.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_lowercase() => {
            let mut out = String::with_capacity(cwd.len());
            out.push(drive.to_ascii_uppercase());
            out.push_str(&cwd[1..]);
            out
        }
        _ => cwd.to_string(),
    }
}

/// Location reported by an OSC 7 `file://` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Osc7Location {
    /// Percent-decoded absolute path
    pub path: String,
    /// Host name, `None` for localhost or an empty authority
    pub hostname: Option<String>,
    /// User name when the authority had `user@host`
    pub username: Option<String>,
}

/// Parse an OSC 7 payload (`file://[user@]host/path`)
///
/// Returns `None` for other schemes or when no absolute path is present.
pub fn parse_osc7_url(url_str: &str) -> Option<Osc7Location> {
    if !FILE_URI.is_match(url_str) {
        return None;
    }

    if let Ok(url) = Url::parse(url_str) {
        if url.scheme() == "file" && url.path().starts_with('/') {
            let path = percent_decode_str(url.path())
                .decode_utf8_lossy()
                .into_owned();
            let username = Some(url.username())
                .filter(|u| !u.is_empty())
                .map(|u| percent_decode_str(u).decode_utf8_lossy().into_owned());
            return Some(Osc7Location {
                path,
                hostname: remote_host(url.host_str()),
                username,
            });
        }
    }

    // Url rejects some hosts shells happily emit (e.g. underscores); fall
    // back to splitting the authority by hand.
    let mut remainder = url_str.strip_prefix("file://")?;
    if let Some(idx) = remainder.find(['?', '#']) {
        remainder = &remainder[..idx];
    }
    let slash = remainder.find('/')?;
    let (authority, path_part) = remainder.split_at(slash);
    let (user, host) = match authority.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, authority),
    };
    let path = percent_decode_str(path_part)
        .decode_utf8_lossy()
        .into_owned();
    if !path.starts_with('/') {
        return None;
    }

    Some(Osc7Location {
        path,
        hostname: remote_host(host.split(':').next()),
        username: user
            .map(|u| percent_decode_str(u).decode_utf8_lossy().into_owned())
            .filter(|u| !u.is_empty()),
    })
}

fn remote_host(host: Option<&str>) -> Option<String> {
    host.filter(|h| !h.is_empty() && !h.eq_ignore_ascii_case("localhost"))
        .map(str::to_string)
}
