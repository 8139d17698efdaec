//! Route matching: `(method, path)` to a route id plus path parameters.

use std::collections::HashMap;

use axum::http::Method;
use percent_encoding::percent_decode_str;

use crate::error::Error;

/// Stable identity of a registered route; indexes the execution plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(pub usize);

/// A successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: RouteId,
    pub params: HashMap<String, String>,
}

/// Maps a method and path to a registered route.
pub trait RouteMatcher: Send + Sync + 'static {
    fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch>;
}

type InnerRouter = matchit::Router<RouteId>;

/// [`RouteMatcher`] backed by one `matchit` tree per method.
///
/// Patterns use `:name` for a segment parameter and `*name` for the rest of
/// the path. Matching is slash-sensitive.
#[derive(Default)]
pub struct MatchitRouter {
    routes: HashMap<Method, InnerRouter>,
    len: usize,
}

impl MatchitRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, path: &str, route: RouteId) -> Result<(), Error> {
        let pattern = to_matchit_pattern(path);
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(pattern, route)
            .map_err(|e| Error::RouteRegistration {
                method: method.to_string(),
                path: path.to_string(),
                message: e.to_string(),
            })?;
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl RouteMatcher for MatchitRouter {
    fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(key, value)| {
                let value = percent_decode_str(value).decode_utf8_lossy().into_owned();
                (key.to_string(), value)
            })
            .collect();
        Some(RouteMatch {
            route: *matched.value,
            params,
        })
    }
}

impl std::fmt::Debug for MatchitRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchitRouter")
            .field("methods", &self.routes.keys().collect::<Vec<_>>())
            .field("len", &self.len)
            .finish()
    }
}

fn to_matchit_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*') {
                let name = if name.is_empty() { "wildcard" } else { name };
                format!("{{*{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins path parts with exactly one slash between segments.
///
/// A trailing slash on the last part is kept.
pub fn join_paths<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let parts: Vec<&str> = parts.into_iter().collect();
    let trailing = parts
        .iter()
        .rev()
        .find(|part| !part.is_empty())
        .is_some_and(|part| part.ends_with('/'));

    let segments: Vec<&str> = parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.is_empty() {
        return "/".to_string();
    }
    let mut path = format!("/{}", segments.join("/"));
    if trailing {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_slashes() {
        assert_eq!(join_paths(["/app", "/item/:id"]), "/app/item/:id");
        assert_eq!(join_paths(["app/", "item"]), "/app/item");
        assert_eq!(join_paths(["//app//", "//item//"]), "/app/item/");
        assert_eq!(join_paths(["/app", ""]), "/app");
        assert_eq!(join_paths(["", "/"]), "/");
        assert_eq!(join_paths(["/app", "hello/"]), "/app/hello/");
    }

    #[test]
    fn translates_patterns() {
        assert_eq!(to_matchit_pattern("/item/:id"), "/item/{id}");
        assert_eq!(to_matchit_pattern("/files/*path"), "/files/{*path}");
        assert_eq!(to_matchit_pattern("/plain"), "/plain");
    }

    #[test]
    fn matches_by_method_and_decodes_params() {
        let mut router = MatchitRouter::new();
        router.insert(Method::GET, "/app/item/:id", RouteId(0)).unwrap();
        router.insert(Method::POST, "/app/item", RouteId(1)).unwrap();
        router.insert(Method::GET, "/app/hello", RouteId(2)).unwrap();

        let matched = router.match_route(&Method::GET, "/app/item/hello%20world").unwrap();
        assert_eq!(matched.route, RouteId(0));
        assert_eq!(matched.params["id"], "hello world");

        assert_eq!(router.match_route(&Method::POST, "/app/item").unwrap().route, RouteId(1));
        assert!(router.match_route(&Method::DELETE, "/app/item").is_none());
        assert!(router.match_route(&Method::GET, "/app/hello/").is_none());
        assert_eq!(router.len(), 3);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut router = MatchitRouter::new();
        router.insert(Method::GET, "/a/:id", RouteId(0)).unwrap();
        assert!(matches!(
            router.insert(Method::GET, "/a/:id", RouteId(1)),
            Err(Error::RouteRegistration { .. })
        ));
    }
}
