//! Request methods and path normalization.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// == Method ==
/// Methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method string is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(pub String);

impl fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported method: {}", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

impl FromStr for Method {
    type Err = UnsupportedMethod;

    /// Parses a method name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

// == Path Normalization ==
/// Strips every leading and trailing `/` from `path`.
///
/// `"/api/data/"` and `"api/data"` both normalize to `"api/data"`; the root
/// path normalizes to the empty string. Matching is otherwise exact and
/// case-sensitive.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("Post".parse::<Method>(), Ok(Method::Post));
        assert_eq!("PUT".parse::<Method>(), Ok(Method::Put));
        assert_eq!("delete".parse::<Method>(), Ok(Method::Delete));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            "PATCH".parse::<Method>(),
            Err(UnsupportedMethod("PATCH".into()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for method in Method::ALL {
            assert_eq!(method.to_string().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/data"), "api/data");
        assert_eq!(normalize_path("//api/data//"), "api/data");
        assert_eq!(normalize_path("api/data"), "api/data");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path("/Api/Data"), "Api/Data");
    }
}
