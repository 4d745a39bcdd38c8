//! Text framing for tiddler files.
//!
//! A tiddler file is a block of `key: value` header lines, one blank line,
//! then the raw body:
//!
//! ```text
//! creator: john
//! modifier: jane
//! created: 20130119150632
//! modified: 20130119151021
//! type: text/x-markdown
//! tags: foo [[bar baz]]
//! field0: value
//! server.write: 01HQ3K9W6ZT8V4N2XG5R7YB0CD
//!
//! lorem ipsum
//! ```
//!
//! Core headers come first in a fixed order, followed by one line per
//! custom field sorted by key, then the write id. Tags are space-joined, and a tag containing a
//! space is wrapped in `[[...]]`. Only the first blank line separates header
//! from body, so bodies may contain blank lines of their own.

use ulid::Ulid;

use crate::model::{Tiddler, TiddlerFields};
use crate::storage::error::{StoreError, StoreResult};

const CREATOR: &str = "creator";
const MODIFIER: &str = "modifier";
const CREATED: &str = "created";
const MODIFIED: &str = "modified";
const TYPE: &str = "type";
const TAGS: &str = "tags";

const CORE_HEADERS: &[&str] = &[CREATOR, MODIFIER, CREATED, MODIFIED, TYPE, TAGS];

/// fields with this prefix are computed by the server and never stored
pub const SERVER_FIELD_PREFIX: &str = "server.";

/// unique per write, so every put changes the file; dropped on decode
const WRITE_ID: &str = "server.write";

/// Serialize a tiddler's metadata followed by `body`.
///
/// `body` is passed separately so a binary tiddler can be framed around a
/// marker while its payload goes elsewhere. Each call stamps a fresh write
/// id, so two encodings of the same tiddler never compare equal and git
/// always records a put as a change.
pub fn encode_tiddler(tiddler: &Tiddler, body: &[u8]) -> StoreResult<Vec<u8>> {
    let mut header = String::new();
    push_header(&mut header, CREATOR, &tiddler.creator)?;
    push_header(&mut header, MODIFIER, &tiddler.modifier)?;
    push_header(&mut header, CREATED, &tiddler.created)?;
    push_header(&mut header, MODIFIED, &tiddler.modified)?;
    if let Some(content_type) = tiddler.content_type.as_deref() {
        push_header(&mut header, TYPE, content_type)?;
    }
    push_header(&mut header, TAGS, &tags_as_string(&tiddler.tags)?)?;

    for (key, value) in &tiddler.fields {
        if key.starts_with(SERVER_FIELD_PREFIX) {
            continue;
        }
        validate_field_key(key)?;
        push_header(&mut header, key, value)?;
    }
    push_header(&mut header, WRITE_ID, &Ulid::new().to_string())?;

    header.push('\n');
    let mut out = header.into_bytes();
    out.extend_from_slice(body);
    Ok(out)
}

fn push_header(out: &mut String, key: &str, value: &str) -> StoreResult<()> {
    if value.contains(|c: char| c == '\n' || c == '\r') {
        return Err(StoreError::invalid_name(key, "header value contains a line break"));
    }
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
    Ok(())
}

fn validate_field_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::invalid_name(key, "field name cannot be empty"));
    }
    if key.contains(|c: char| c == ':' || c == '\n' || c == '\r') {
        return Err(StoreError::invalid_name(key, "field name contains ':' or a line break"));
    }
    if CORE_HEADERS.contains(&key) {
        return Err(StoreError::invalid_name(key, "field name shadows a core header"));
    }
    Ok(())
}

/// Parse a tiddler file. `path` is only used in error messages.
pub fn decode_tiddler(bytes: &[u8], bag: &str, title: &str, path: &str) -> StoreResult<Tiddler> {
    let (header, body) = split_frame(bytes)
        .ok_or_else(|| StoreError::malformed(path, "missing blank line after header"))?;
    let header = std::str::from_utf8(header)
        .map_err(|_| StoreError::malformed(path, "header is not utf-8"))?;

    let mut tiddler = Tiddler::new(title, bag);
    let mut fields = TiddlerFields::new();

    for line in header.lines() {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| StoreError::malformed(path, format!("bad header line {:?}", line)))?;
        let value = value.strip_prefix(' ').unwrap_or(value);
        match key {
            CREATOR => tiddler.creator = value.to_string(),
            MODIFIER => tiddler.modifier = value.to_string(),
            CREATED => tiddler.created = value.to_string(),
            MODIFIED => tiddler.modified = value.to_string(),
            TYPE => tiddler.content_type = Some(value.to_string()).filter(|t| !t.is_empty()),
            TAGS => tiddler.tags = string_to_tags(value),
            _ if key.starts_with(SERVER_FIELD_PREFIX) => {}
            _ => {
                fields.insert(key.to_string(), value.to_string());
            }
        }
    }

    tiddler.fields = fields;
    tiddler.text = body.to_vec();
    Ok(tiddler)
}

/// Split at the first blank line: `(header, body)`.
fn split_frame(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(body) = bytes.strip_prefix(b"\n") {
        return Some((&bytes[..0], body));
    }
    let pos = bytes.windows(2).position(|w| w == b"\n\n")?;
    Some((&bytes[..pos], &bytes[pos + 2..]))
}

/// Join tags, bracketing any that contain spaces.
pub fn tags_as_string(tags: &[String]) -> StoreResult<String> {
    let mut parts = Vec::with_capacity(tags.len());
    for tag in tags {
        if tag.is_empty() {
            continue;
        }
        if tag.contains("]]") {
            return Err(StoreError::invalid_name(tag, "tag contains ']]'"));
        }
        if tag.contains(' ') || tag.starts_with("[[") {
            parts.push(format!("[[{}]]", tag));
        } else {
            parts.push(tag.clone());
        }
    }
    Ok(parts.join(" "))
}

/// Inverse of [`tags_as_string`].
pub fn string_to_tags(input: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut rest = input.trim_start_matches(' ');

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("[[") {
            match after.find("]]") {
                Some(end) => {
                    tags.push(after[..end].to_string());
                    rest = &after[end + 2..];
                }
                None => {
                    tags.push(after.to_string());
                    rest = "";
                }
            }
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            tags.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start_matches(' ');
    }

    tags
}
