//! Route path computation and Express-style path patterns.

use crate::error::{DbscopeError, Result};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashMap;

/// Joins route segments into a single path.
///
/// Absent and empty segments are dropped. When a segment starts with `/`, every
/// segment before the last such one is discarded, so an absolute method route
/// overrides the prefix and controller route. The remaining segments are
/// joined with `/` and one doubled separator is collapsed.
pub fn compute_route(segments: &[Option<&str>]) -> String {
    let segments: Vec<&str> = segments
        .iter()
        .flatten()
        .copied()
        .filter(|segment| !segment.is_empty())
        .collect();

    let start = segments
        .iter()
        .rposition(|segment| segment.starts_with('/'))
        .unwrap_or(0);

    segments[start..].join("/").replacen("//", "/", 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param {
        name: String,
        optional: bool,
        prefix: Option<char>,
    },
}

/// A compiled route such as `/api/db/tables/:schema?.:table?`.
///
/// Parameters are `:name`, optionally followed by `?`. A `/` or `.` directly in
/// front of a parameter belongs to it, so an optional parameter swallows its
/// separator when missing.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    keys: Vec<String>,
    mount: String,
}

impl RoutePattern {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;

        let mut expression = String::from("^");
        let mut keys = Vec::new();
        for token in &tokens {
            match token {
                Token::Literal(text) => expression.push_str(&regex::escape(text)),
                Token::Param {
                    name,
                    optional,
                    prefix,
                } => {
                    let class = if *prefix == Some('.') { "[^/.]+?" } else { "[^/]+?" };
                    let prefix = prefix.map(|c| regex::escape(&c.to_string())).unwrap_or_default();
                    if *optional {
                        expression.push_str(&format!("(?:{prefix}({class}))?"));
                    } else {
                        expression.push_str(&format!("{prefix}({class})"));
                    }
                    keys.push(name.clone());
                }
            }
        }
        expression.push_str("/?$");

        let regex = Regex::new(&expression).map_err(|e| DbscopeError::InvalidRoute {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;

        let mount = mount_point(&tokens);

        Ok(Self {
            source: source.to_string(),
            regex,
            keys,
            mount,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn has_params(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Matches a request path, returning the captured parameters.
    ///
    /// Optional parameters that did not participate are left out of the map.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let params = self
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                captures
                    .get(i + 1)
                    .map(|m| (key.clone(), percent_decode(m.as_str())))
            })
            .collect();
        Some(params)
    }

    /// Paths under which the pattern is mounted on the axum router.
    ///
    /// Static routes mount as-is and with a trailing slash. Parameterised
    /// routes mount a catch-all below their static prefix, plus the prefix
    /// itself (with and without the slash) when the pattern accepts it. The
    /// catch-all never matches an empty remainder.
    pub fn mount_paths(&self) -> Vec<String> {
        if !self.has_params() {
            return with_trailing_slash(ensure_leading_slash(&self.source));
        }

        let base = ensure_leading_slash(&self.mount);
        let mut paths = Vec::with_capacity(3);
        if base == "/" {
            if self.regex.is_match("/") {
                paths.push(base);
            }
            paths.push("/{*__rest}".to_string());
            return paths;
        }

        let slashed = format!("{base}/");
        if self.regex.is_match(&base) {
            paths.push(base.clone());
        }
        if self.regex.is_match(&slashed) {
            paths.push(slashed.clone());
        }
        paths.push(format!("{slashed}{{*__rest}}"));
        paths
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' {
            literal.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(DbscopeError::InvalidRoute {
                pattern: source.to_string(),
                message: "parameter without a name".to_string(),
            });
        }

        let optional = chars.next_if_eq(&'?').is_some();
        let prefix = match literal.chars().last() {
            Some(sep @ ('/' | '.')) => {
                literal.pop();
                Some(sep)
            }
            _ => None,
        };
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(Token::Param {
            name,
            optional,
            prefix,
        });
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

/// The longest leading run of whole static segments.
fn mount_point(tokens: &[Token]) -> String {
    let Some(Token::Literal(text)) = tokens.first() else {
        return String::new();
    };
    match tokens.get(1) {
        Some(Token::Param {
            prefix: Some('/'), ..
        }) => text.clone(),
        Some(_) => match text.rfind('/') {
            Some(idx) => text[..idx].to_string(),
            None => String::new(),
        },
        None => text.clone(),
    }
}

fn with_trailing_slash(path: String) -> Vec<String> {
    if path.ends_with('/') {
        return vec![path];
    }
    let slashed = format!("{path}/");
    vec![path, slashed]
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn percent_decode(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compute_route_joins_segments() {
        assert_eq!(
            compute_route(&[Some("api"), Some("db"), Some("execute")]),
            "api/db/execute"
        );
        assert_eq!(
            compute_route(&[Some("/"), Some("api"), Some("db"), Some("execute")]),
            "/api/db/execute"
        );
    }

    #[test]
    fn test_compute_route_absolute_method_route_wins() {
        assert_eq!(
            compute_route(&[Some("api"), Some("db"), Some("/override")]),
            "/override"
        );
        assert_eq!(
            compute_route(&[Some("/"), Some("api"), Some("db"), Some("/override")]),
            "/override"
        );
    }

    #[test]
    fn test_compute_route_drops_empty_segments() {
        assert_eq!(
            compute_route(&[Some("/"), Some(""), None, Some("calculator"), Some("add")]),
            "/calculator/add"
        );
        assert_eq!(compute_route(&[None, Some("")]), "");
    }

    #[test]
    fn test_static_pattern() {
        let pattern = RoutePattern::parse("/api/db/connection").unwrap();
        assert!(!pattern.has_params());
        assert_eq!(
            pattern.mount_paths(),
            vec!["/api/db/connection".to_string(), "/api/db/connection/".to_string()]
        );
        assert!(pattern.matches("/api/db/connection").is_some());
        assert!(pattern.matches("/api/db/connection/").is_some());
        assert!(pattern.matches("/api/db/connections").is_none());
    }

    #[test]
    fn test_optional_dotted_params() {
        let pattern = RoutePattern::parse("/api/db/tables/:schema?.:table?").unwrap();

        let params = pattern.matches("/api/db/tables").unwrap();
        assert!(params.is_empty());

        let params = pattern.matches("/api/db/tables/public").unwrap();
        assert_eq!(params.get("schema").map(String::as_str), Some("public"));
        assert_eq!(params.get("table"), None);

        let params = pattern.matches("/api/db/tables/public.users").unwrap();
        assert_eq!(params.get("schema").map(String::as_str), Some("public"));
        assert_eq!(params.get("table").map(String::as_str), Some("users"));

        assert!(pattern.matches("/api/db/tables/public/users").is_none());
    }

    #[test]
    fn test_optional_pattern_mounts_base_and_wildcard() {
        let pattern = RoutePattern::parse("/api/db/tables/:schema?.:table?").unwrap();
        assert_eq!(
            pattern.mount_paths(),
            vec![
                "/api/db/tables".to_string(),
                "/api/db/tables/".to_string(),
                "/api/db/tables/{*__rest}".to_string()
            ]
        );
    }

    #[test]
    fn test_required_param_mounts_wildcard_only() {
        let pattern = RoutePattern::parse("/items/:id").unwrap();
        assert_eq!(pattern.mount_paths(), vec!["/items/{*__rest}".to_string()]);
        assert_eq!(
            pattern.matches("/items/42").unwrap().get("id").map(String::as_str),
            Some("42")
        );
        assert!(pattern.matches("/items").is_none());
    }

    #[test]
    fn test_param_values_are_percent_decoded() {
        let pattern = RoutePattern::parse("/items/:id").unwrap();
        let params = pattern.matches("/items/my%20table").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("my table"));

        let params = pattern.matches("/items/caf%C3%A9").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("café"));

        let params = pattern.matches("/items/bad%FF").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("bad%FF"));
    }

    #[test]
    fn test_unnamed_param_is_rejected() {
        let err = RoutePattern::parse("/items/:").unwrap_err();
        assert!(err.is_startup_fatal());
    }
}
