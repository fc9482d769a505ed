//! Accept-header negotiation for response rendering.
//!
//! ```
//! use girder_core::content_negotiation::{Accept, MediaType, negotiate_media_type};
//!
//! let accept = Accept::parse("text/html, application/json;q=0.9");
//! let available = vec![MediaType::json(), MediaType::html()];
//! assert_eq!(negotiate_media_type(&accept, &available), Some(&MediaType::html()));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;

/// Represents a media type (MIME type) without parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub type_: String,
    pub subtype: String,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            subtype: subtype.into(),
        }
    }

    pub fn json() -> Self {
        Self::new("application", "json")
    }

    pub fn html() -> Self {
        Self::new("text", "html")
    }

    pub fn xml() -> Self {
        Self::new("application", "xml")
    }

    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type, ignoring any parameters.
    pub fn parse(s: &str) -> Option<Self> {
        let type_subtype = s.split(';').next()?.trim();
        let (type_, subtype) = type_subtype.split_once('/')?;
        let (type_, subtype) = (type_.trim(), subtype.trim());
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }
        Some(Self::new(type_.to_lowercase(), subtype.to_lowercase()))
    }

    /// Check if this media type matches another (considering wildcards).
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    fn specificity(&self) -> u8 {
        let mut score = 0u8;
        if self.type_ != "*" {
            score += 2;
        }
        if self.subtype != "*" {
            score += 1;
        }
        score
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

/// Represents a parsed `Accept` header with quality values.
#[derive(Debug, Clone, Default)]
pub struct Accept {
    /// Media types with their quality values, sorted by preference.
    pub media_types: Vec<(MediaType, f32)>,
}

impl Accept {
    /// An Accept header that accepts anything.
    pub fn new() -> Self {
        Self {
            media_types: vec![(MediaType::any(), 1.0)],
        }
    }

    /// Parse an Accept header string.
    pub fn parse(header: &str) -> Self {
        let mut media_types: Vec<(MediaType, f32)> = header
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let (media_part, quality) = Self::extract_quality(part);
                MediaType::parse(media_part).map(|mt| (mt, quality))
            })
            .collect();

        // Quality first, then specificity
        media_types.sort_by(|a, b| match b.1.partial_cmp(&a.1) {
            Some(Ordering::Equal) | None => b.0.specificity().cmp(&a.0.specificity()),
            Some(ord) => ord,
        });

        Self { media_types }
    }

    fn extract_quality(s: &str) -> (&str, f32) {
        let mut parts = s.split(';');
        let media_part = parts.next().unwrap_or(s);
        let quality = parts
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
            .and_then(|(_, q)| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        (media_part, quality)
    }

    pub fn accepts(&self, media_type: &MediaType) -> bool {
        self.quality_for(media_type) > 0.0
    }

    /// Quality of the most specific entry matching `media_type`.
    pub fn quality_for(&self, media_type: &MediaType) -> f32 {
        self.media_types
            .iter()
            .filter(|(mt, _)| mt.matches(media_type))
            .max_by_key(|(mt, _)| mt.specificity())
            .map(|(_, q)| *q)
            .unwrap_or(0.0)
    }
}

/// Pick the best of `available` for the client's preferences.
///
/// Ties keep the earlier entry of `available`, so list the default first.
pub fn negotiate_media_type<'a>(accept: &Accept, available: &'a [MediaType]) -> Option<&'a MediaType> {
    let mut best: Option<(&'a MediaType, f32)> = None;

    for candidate in available {
        let quality = accept.quality_for(candidate);
        if quality <= 0.0 {
            continue;
        }
        match best {
            Some((_, best_q)) if quality <= best_q => {}
            _ => best = Some((candidate, quality)),
        }
    }

    best.map(|(mt, _)| mt)
}

/// Server-wide allow-list of response formats.
///
/// Stored as a bitmask: JSON=1, HTML=2, XML=4 (reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptFormats(u8);

impl AcceptFormats {
    pub const JSON: AcceptFormats = AcceptFormats(1);
    pub const HTML: AcceptFormats = AcceptFormats(2);
    pub const XML: AcceptFormats = AcceptFormats(4);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: AcceptFormats) -> bool {
        self.0 & other.0 == other.0
    }

    /// Media types this server may produce, JSON first so that it wins ties
    pub fn media_types(&self) -> Vec<MediaType> {
        let mut available = Vec::with_capacity(2);
        if self.contains(Self::JSON) {
            available.push(MediaType::json());
        }
        if self.contains(Self::HTML) {
            available.push(MediaType::html());
        }
        available
    }
}

impl BitOr for AcceptFormats {
    type Output = AcceptFormats;

    fn bitor(self, rhs: Self) -> Self::Output {
        AcceptFormats(self.0 | rhs.0)
    }
}

impl Default for AcceptFormats {
    fn default() -> Self {
        Self::HTML | Self::JSON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sorted_by_quality() {
        let accept = Accept::parse("text/plain;q=0.5, application/json, */*;q=0.1");
        assert_eq!(accept.media_types[0].0, MediaType::json());
        assert_eq!(accept.media_types.last().unwrap().0, MediaType::any());
    }

    #[test]
    fn test_wildcard_prefers_first_available() {
        let available = AcceptFormats::default().media_types();
        let best = negotiate_media_type(&Accept::parse("*/*"), &available);
        assert_eq!(best, Some(&MediaType::json()));
    }

    #[test]
    fn test_browser_accept_prefers_html() {
        let accept = Accept::parse("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");
        let available = AcceptFormats::default().media_types();
        assert_eq!(negotiate_media_type(&accept, &available), Some(&MediaType::html()));
    }

    #[test]
    fn test_html_not_allowed() {
        let accept = Accept::parse("text/html");
        let available = AcceptFormats::JSON.media_types();
        assert_eq!(negotiate_media_type(&accept, &available), None);
    }

    #[test]
    fn test_accept_formats_bits() {
        let formats = AcceptFormats::default();
        assert_eq!(formats.bits(), 3);
        assert!(formats.contains(AcceptFormats::HTML));
        assert!(!formats.contains(AcceptFormats::XML));
    }
}
