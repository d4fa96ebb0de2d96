use crate::error::{DbscopeError, Result};
use axum::routing::MethodFilter;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// HTTP verbs a handler method can be bound to.
///
/// Declaration order is the order in which method-name prefixes are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn method_filter(self) -> MethodFilter {
        match self {
            HttpVerb::Get => MethodFilter::GET,
            HttpVerb::Post => MethodFilter::POST,
            HttpVerb::Put => MethodFilter::PUT,
            HttpVerb::Patch => MethodFilter::PATCH,
            HttpVerb::Delete => MethodFilter::DELETE,
        }
    }

    pub fn upper(self) -> String {
        self.as_ref().to_ascii_uppercase()
    }
}

/// Derives a verb from the leading part of a handler method name.
///
/// `get_tables` and `getTables` resolve to `Get`, `post_execute` to `Post`.
pub fn verb_from_method_name(method: &str) -> Option<HttpVerb> {
    let lowered = method.to_lowercase();
    HttpVerb::iter().find(|verb| lowered.starts_with(verb.as_ref()))
}

/// Like [`verb_from_method_name`], failing with a registration error.
pub fn resolve_verb(controller: &str, method: &str) -> Result<HttpVerb> {
    verb_from_method_name(method).ok_or_else(|| DbscopeError::UnresolvableVerb {
        controller: controller.to_string(),
        method: method.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_verb_from_method_name() {
        assert_eq!(verb_from_method_name("getTables"), Some(HttpVerb::Get));
        assert_eq!(verb_from_method_name("get_tables"), Some(HttpVerb::Get));
        assert_eq!(verb_from_method_name("postExecute"), Some(HttpVerb::Post));
        assert_eq!(verb_from_method_name("PUT_item"), Some(HttpVerb::Put));
        assert_eq!(verb_from_method_name("patchUser"), Some(HttpVerb::Patch));
        assert_eq!(verb_from_method_name("delete_row"), Some(HttpVerb::Delete));
        assert_eq!(verb_from_method_name("execute"), None);
        assert_eq!(verb_from_method_name("add"), None);
    }

    #[test]
    fn test_resolve_verb_failure() {
        let err = resolve_verb("CalculatorController", "add").unwrap_err();
        assert!(err.is_startup_fatal());
        assert!(err.to_string().contains("CalculatorController.add"));
    }

    #[test]
    fn test_verb_display_and_parse() {
        assert_eq!(HttpVerb::Delete.to_string(), "delete");
        assert_eq!(HttpVerb::Post.upper(), "POST");
        assert_eq!(HttpVerb::from_str("PATCH").unwrap(), HttpVerb::Patch);
    }
}
