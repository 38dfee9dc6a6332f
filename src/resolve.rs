//! Resource path resolution: segments after the API prefix become an item
//! locator, a sub-element kind, and a sub-element name.

use crate::accessor::SubElementKind;
use crate::escape::unescape;

/// Outcome of path resolution. Never an error: existence checks belong to the
/// repository call, not to parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Unescaped repository path; empty addresses the root.
    pub locator: String,
    /// Reserved kind marker, or empty for the node itself.
    pub kind_segment: String,
    /// Unescaped sub-element name; empty addresses the container.
    pub sub_element: String,
}

/// Walk path segments, accumulating the locator until a reserved kind marker
/// appears. The marker becomes the kind and the following segment (if any)
/// the sub-element name; segments past that belong to nested operations and
/// are not consumed here. With an empty locator, a leading marker addresses
/// the root's own sub-elements rather than a literal path component.
pub fn resolve_segments<'a, I>(segments: I) -> ResolvedAddress
where
    I: IntoIterator<Item = &'a str>,
{
    let mut locator_parts: Vec<String> = Vec::new();
    let mut kind_segment = String::new();
    let mut sub_element = String::new();
    let mut iter = segments.into_iter().filter(|s| !s.is_empty());

    while let Some(segment) = iter.next() {
        let segment = segment.trim_start_matches('/');
        if segment.is_empty() {
            continue;
        }
        if SubElementKind::is_reserved(segment) {
            kind_segment = segment.to_string();
            if let Some(name) = iter.next() {
                sub_element = unescape(name.trim_start_matches('/'));
            }
            break;
        }
        locator_parts.push(unescape(segment));
    }

    ResolvedAddress {
        locator: locator_parts.join("/"),
        kind_segment,
        sub_element,
    }
}

/// Resolve a raw slash-separated path (the tail of a byPath URI).
pub fn resolve_path(path: &str) -> ResolvedAddress {
    resolve_segments(path.split('/'))
}

/// Split the sub-path tail of a by-identifier URI (`{kind}[/{name}]`) into a
/// kind marker and an unescaped sub-element name.
pub fn split_sub_path(rest: &str) -> (String, String) {
    let mut parts = rest.split('/').filter(|s| !s.is_empty());
    let kind = parts.next().unwrap_or("").to_string();
    let name = parts.next().map(unescape).unwrap_or_default();
    (kind, name)
}
