//! Route path patterns.
//!
//! Grammar: `/`-separated segments. A segment is a literal, a `{name}`
//! parameter matching `[A-Za-z0-9_-]+`, or a trailing `**` matching zero or
//! more remaining segments.
//!
//! Request paths are matched segment by segment after percent-decoding, the
//! same view the router's path extractor hands to handlers.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use percent_encoding::percent_decode_str;

use super::PolicyError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Rest,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Orders patterns from least to most specific.
///
/// Compared field by field: fixed segments (literals and params), then
/// literals alone, then whether the pattern is exact (no `**`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    fixed: usize,
    literals: usize,
    exact: bool,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        if !raw.starts_with('/') {
            return Err(PolicyError::InvalidPattern(raw.to_string(), "must start with '/'"));
        }
        let parts = split_path(raw);
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if *part == "**" {
                if i + 1 != parts.len() {
                    return Err(PolicyError::InvalidPattern(
                        raw.to_string(),
                        "'**' is only allowed as the last segment",
                    ));
                }
                Segment::Rest
            } else if part.starts_with('{') && part.ends_with('}') && part.len() > 2 {
                Segment::Param
            } else if part.contains(['{', '}', '*']) {
                return Err(PolicyError::InvalidPattern(
                    raw.to_string(),
                    "malformed segment",
                ));
            } else {
                Segment::Literal((*part).to_string())
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decoded parameter values if `path` matches, in pattern order.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<Cow<'p, str>>> {
        self.captures_with(path, is_param_value)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Like [`matches`](Self::matches) but with parameters accepting any
    /// non-empty segment, the way the router matches them.
    pub fn matches_shape(&self, path: &str) -> bool {
        self.captures_with(path, |_| true).is_some()
    }

    fn captures_with<'p>(
        &self,
        path: &'p str,
        accept: impl Fn(&str) -> bool,
    ) -> Option<Vec<Cow<'p, str>>> {
        let mut parts = decoded_segments(path)?.into_iter();
        let mut params = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Rest => return Some(params),
                Segment::Literal(lit) => {
                    if parts.next()? != lit.as_str() {
                        return None;
                    }
                }
                Segment::Param => {
                    let value = parts.next()?;
                    if !accept(&value) {
                        return None;
                    }
                    params.push(value);
                }
            }
        }
        parts.next().is_none().then_some(params)
    }

    pub fn specificity(&self) -> Specificity {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let params = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Param))
            .count();
        Specificity {
            fixed: literals + params,
            literals,
            exact: !self.segments.contains(&Segment::Rest),
        }
    }

    /// Compare by specificity; `Greater` means `self` wins.
    pub fn cmp_specificity(&self, other: &Self) -> Ordering {
        self.specificity().cmp(&other.specificity())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a path into non-empty segments. `/` and `` yield no segments;
/// trailing and doubled slashes are ignored.
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Percent-decoded segments of a request path, or `None` when a segment
/// decodes to invalid UTF-8 or hides a `/`.
fn decoded_segments(path: &str) -> Option<Vec<Cow<'_, str>>> {
    split_path(path)
        .into_iter()
        .map(|raw| {
            let segment = percent_decode_str(raw).decode_utf8().ok()?;
            (!segment.is_empty() && !segment.contains('/')).then_some(segment)
        })
        .collect()
}

/// Whether every segment of `path` decodes cleanly.
pub fn is_well_formed(path: &str) -> bool {
    decoded_segments(path).is_some()
}

fn is_param_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn literal_pattern_matches_exactly() {
        let pat = p("/api/artworks");
        assert!(pat.matches("/api/artworks"));
        assert!(pat.matches("/api/artworks/"));
        assert!(!pat.matches("/api/artworks/1"));
        assert!(!pat.matches("/api"));
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let pat = p("/");
        assert!(pat.matches("/"));
        assert!(!pat.matches("/health"));
    }

    #[test]
    fn rest_matches_zero_or_more_segments() {
        let pat = p("/api/cart/**");
        assert!(pat.matches("/api/cart"));
        assert!(pat.matches("/api/cart/items/3"));
        assert!(!pat.matches("/api/carts"));
    }

    #[test]
    fn param_accepts_restricted_charset() {
        let pat = p("/api/artworks/{id}");
        assert_eq!(pat.captures("/api/artworks/abc-12_X").unwrap(), vec!["abc-12_X"]);
        assert!(!pat.matches("/api/artworks/a.b"));
        assert!(!pat.matches("/api/artworks/%20"));
        assert!(pat.matches_shape("/api/artworks/a.b"));
        assert!(!pat.matches("/api/artworks"));
        assert!(!pat.matches("/api/artworks/1/images"));
    }

    #[test]
    fn params_and_literals_are_compared_decoded() {
        let pat = p("/api/artworks/{id}");
        assert_eq!(pat.captures("/api/artworks/A%42").unwrap(), vec!["AB"]);
        assert!(p("/api/orders/{id}").matches("/api/%6Frders/4%32"));
        assert!(p("/api/cart/**").matches("/api/c%61rt/items"));
    }

    #[test]
    fn undecodable_paths_match_nothing() {
        assert!(!is_well_formed("/api/artworks/a%2Fb"));
        assert!(!is_well_formed("/api/artworks/%FF"));
        assert!(is_well_formed("/api/artworks/A%42"));
        assert!(!p("/api/artworks/**").matches("/api/artworks/a%2Fb"));
        assert!(!p("/api/artworks/{id}").matches_shape("/api/artworks/%FF"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(PathPattern::parse("api/x").is_err());
        assert!(PathPattern::parse("/api/**/x").is_err());
        assert!(PathPattern::parse("/api/{}").is_err());
        assert!(PathPattern::parse("/api/x*").is_err());
    }

    #[test]
    fn specificity_prefers_literals_then_exact() {
        let my = p("/api/artworks/my-artworks");
        let id = p("/api/artworks/{id}");
        let rest = p("/api/artworks/**");
        let orders_id = p("/api/orders/{id}");
        let orders = p("/api/orders/**");
        assert_eq!(my.cmp_specificity(&id), Ordering::Greater);
        assert_eq!(id.cmp_specificity(&rest), Ordering::Greater);
        assert_eq!(orders_id.cmp_specificity(&orders), Ordering::Greater);
        assert_eq!(
            p("/api/dashboard/admin/**").cmp_specificity(&p("/api/dashboard/**")),
            Ordering::Greater
        );
    }
}
