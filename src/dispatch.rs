//! Route tables.
//!
//! Two levels, mirroring how groups are mounted:
//!
//! - [`Dispatcher`]: one radix tree per HTTP method, owned privately by a
//!   [`Router`](crate::Router). Routes are stored under their *full* path.
//! - [`Mux`]: the root table. Each group's dispatcher is mounted at the
//!   group's full prefix plus a trailing `/`; a request goes to the most
//!   specific mounted prefix that covers its path, then through that
//!   group's tree. A `{name}` segment in a prefix matches any one segment
//!   and is captured by the group's routes like any other path parameter.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use http::header::{ALLOW, HeaderValue, LOCATION};
use matchit::Router as MatchitRouter;

use crate::error::ConfigError;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// A group's private route table.
#[derive(Default)]
pub(crate) struct Dispatcher {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    /// The path exists under other methods.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Dispatcher {
    pub(crate) fn insert(
        &mut self,
        method: Method,
        path: &str,
        handler: BoxedHandler,
    ) -> Result<(), ConfigError> {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .map_err(|e| ConfigError::RouteConflict {
                method: method.to_string(),
                path: path.to_owned(),
                reason: e.to_string(),
            })
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Lookup {
        if let Some(found) = self.find(method, path) {
            return found;
        }
        // A GET route also answers HEAD.
        if method == Method::Head {
            if let Some(found) = self.find(Method::Get, path) {
                return found;
            }
        }

        let mut allowed: Vec<Method> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| *m)
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        allowed.sort();
        Lookup::MethodNotAllowed(allowed)
    }

    fn find(&self, method: Method, path: &str) -> Option<Lookup> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(Lookup::Found(handler, params))
    }
}

// ── Mux ───────────────────────────────────────────────────────────────────────

/// One segment of a group prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    /// `{name}`: any single non-empty segment.
    Wildcard,
}

impl Segment {
    fn accepts(&self, segment: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == segment,
            Self::Wildcard => !segment.is_empty(),
        }
    }
}

/// Splits a group prefix into segments.
///
/// `None` unless the prefix is empty or `/seg[/seg..]` where every segment
/// is non-empty and is either plain text or a whole `{name}` wildcard.
/// Catch-all `{*name}` segments are not allowed in a prefix.
pub(crate) fn parse_prefix(prefix: &str) -> Option<Vec<Segment>> {
    if prefix.is_empty() {
        return Some(Vec::new());
    }
    prefix.strip_prefix('/')?.split('/').map(parse_segment).collect()
}

fn parse_segment(segment: &str) -> Option<Segment> {
    if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let plain = !name.is_empty() && !name.contains(['{', '}', '*']);
        return plain.then_some(Segment::Wildcard);
    }
    let plain = !segment.is_empty() && !segment.contains(['{', '}']);
    plain.then(|| Segment::Literal(segment.to_owned()))
}

/// The root dispatch table: every group mounted at its full prefix.
///
/// Produced by [`Server::mount`](crate::Server::mount). The server drives it
/// for every request; tests can drive it directly with
/// [`Mux::dispatch`].
#[derive(Default)]
pub struct Mux {
    mounts: Vec<Mount>,
}

struct Mount {
    prefix: String,
    segments: Vec<Segment>,
    table: Dispatcher,
}

impl Mount {
    /// Whether `path` lies strictly below this mount's `prefix/`.
    fn covers(&self, path: &str) -> bool {
        let Some(mut rest) = path.strip_prefix('/') else {
            return false;
        };
        for segment in &self.segments {
            let Some((head, tail)) = rest.split_once('/') else {
                return false;
            };
            if !segment.accepts(head) {
                return false;
            }
            rest = tail;
        }
        true
    }

    /// More segments first, then more literal segments.
    fn specificity(&self) -> (usize, usize) {
        let literals = self.segments.iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        (self.segments.len(), literals)
    }
}

impl Mux {
    /// Attaches `table` so that every path under `full_prefix + "/"` reaches it.
    pub(crate) fn mount(&mut self, full_prefix: &str, table: Dispatcher) -> Result<(), ConfigError> {
        let segments = parse_prefix(full_prefix)
            .ok_or_else(|| ConfigError::InvalidPrefix(full_prefix.to_owned()))?;
        // `/users/{id}` and `/users/{uid}` cover the same paths.
        if self.mounts.iter().any(|m| m.segments == segments) {
            return Err(ConfigError::DuplicatePrefix(full_prefix.to_owned()));
        }
        self.mounts.push(Mount { prefix: format!("{full_prefix}/"), segments, table });
        Ok(())
    }

    /// Mounted subtree prefixes (each ending in `/`), in mount order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|m| m.prefix.as_str())
    }

    fn find(&self, path: &str) -> Option<&Dispatcher> {
        self.mounts.iter()
            .filter(|m| m.covers(path))
            .max_by_key(|m| m.specificity())
            .map(|m| &m.table)
    }

    /// Routes one request and produces one response.
    ///
    /// - path is a mounted prefix without its trailing slash → `301` to the
    ///   slash form, query kept
    /// - no mounted prefix or no matching route → `404`
    /// - path registered under other methods only → `405` with `Allow`
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let Some(table) = self.find(&req.path) else {
            let slashed = format!("{}/", req.path);
            if !req.path.ends_with('/') && self.find(&slashed).is_some() {
                return redirect(&slashed, req.query());
            }
            return not_found();
        };
        match table.lookup(req.method, &req.path) {
            Lookup::Found(handler, params) => {
                req.params = params;
                handler.call(req).await
            }
            Lookup::MethodNotAllowed(allowed) => method_not_allowed(&allowed),
            Lookup::NotFound => not_found(),
        }
    }
}

fn not_found() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text("404 page not found")
}

fn redirect(path: &str, query: Option<&str>) -> Response {
    let location = match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_owned(),
    };
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION.as_str(), &location)
        .no_body()
}

pub(crate) fn method_not_allowed(allowed: &[Method]) -> Response {
    let mut res = Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .text("Method Not Allowed");
    if !allowed.is_empty() {
        let list = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
        if let Ok(value) = HeaderValue::from_str(&list) {
            res.headers_mut().insert(ALLOW, value);
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;

    fn named(name: &'static str) -> BoxedHandler {
        (move |req: Request| async move {
            format!("{name}:{}", req.param("id").unwrap_or("-"))
        })
        .into_boxed_handler()
    }

    fn body(res: &Response) -> &str {
        std::str::from_utf8(res.body()).unwrap()
    }

    #[test]
    fn duplicate_route_is_a_config_error() {
        let mut table = Dispatcher::default();
        table.insert(Method::Get, "/v1/users", named("a")).unwrap();
        let err = table.insert(Method::Get, "/v1/users", named("b")).unwrap_err();
        assert!(matches!(err, ConfigError::RouteConflict { .. }), "{err:?}");
        // Same path under another method is fine.
        table.insert(Method::Post, "/v1/users", named("c")).unwrap();
    }

    #[test]
    fn duplicate_prefix_is_a_config_error() {
        let mut mux = Mux::default();
        mux.mount("/v1", Dispatcher::default()).unwrap();
        assert_eq!(
            mux.mount("/v1", Dispatcher::default()),
            Err(ConfigError::DuplicatePrefix("/v1".into()))
        );
    }

    #[tokio::test]
    async fn longest_prefix_wins() {
        let mut outer = Dispatcher::default();
        outer.insert(Method::Get, "/internal/status", named("outer")).unwrap();
        let mut inner = Dispatcher::default();
        inner.insert(Method::Get, "/internal/admin/settings", named("inner")).unwrap();

        let mut mux = Mux::default();
        mux.mount("/internal", outer).unwrap();
        mux.mount("/internal/admin", inner).unwrap();

        let res = mux.dispatch(Request::new(Method::Get, "/internal/admin/settings")).await;
        assert_eq!(body(&res), "inner:-");
        let res = mux.dispatch(Request::new(Method::Get, "/internal/status")).await;
        assert_eq!(body(&res), "outer:-");
        let res = mux.dispatch(Request::new(Method::Get, "/elsewhere")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let mut table = Dispatcher::default();
        table.insert(Method::Get, "/v1/users/{id}", named("user")).unwrap();
        let mut mux = Mux::default();
        mux.mount("/v1", table).unwrap();

        let res = mux.dispatch(Request::new(Method::Get, "/v1/users/42")).await;
        assert_eq!(body(&res), "user:42");
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_allow() {
        let mut table = Dispatcher::default();
        table.insert(Method::Get, "/v1/users", named("list")).unwrap();
        table.insert(Method::Post, "/v1/users", named("create")).unwrap();
        let mut mux = Mux::default();
        mux.mount("/v1", table).unwrap();

        let res = mux.dispatch(Request::new(Method::Delete, "/v1/users")).await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[ALLOW], "GET, POST");
    }

    #[tokio::test]
    async fn head_falls_back_to_get() {
        let mut table = Dispatcher::default();
        table.insert(Method::Get, "/v1/hello", named("hello")).unwrap();
        let mut mux = Mux::default();
        mux.mount("/v1", table).unwrap();

        let res = mux.dispatch(Request::new(Method::Head, "/v1/hello")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wildcard_prefix_covers_any_segment() {
        let mut table = Dispatcher::default();
        table.insert(Method::Get, "/users/{id}/posts", named("posts")).unwrap();
        let mut mux = Mux::default();
        mux.mount("/users/{id}", table).unwrap();

        let res = mux.dispatch(Request::new(Method::Get, "/users/42/posts")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(body(&res), "posts:42");

        let res = mux.dispatch(Request::new(Method::Get, "/users//posts")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn literal_prefix_beats_wildcard_of_same_depth() {
        let mut me = Dispatcher::default();
        me.insert(Method::Get, "/users/me/posts", named("me")).unwrap();
        let mut any = Dispatcher::default();
        any.insert(Method::Get, "/users/{id}/posts", named("any")).unwrap();

        let mut mux = Mux::default();
        mux.mount("/users/{id}", any).unwrap();
        mux.mount("/users/me", me).unwrap();

        let res = mux.dispatch(Request::new(Method::Get, "/users/me/posts")).await;
        assert_eq!(body(&res), "me:-");
        let res = mux.dispatch(Request::new(Method::Get, "/users/7/posts")).await;
        assert_eq!(body(&res), "any:7");
    }

    #[test]
    fn wildcard_prefixes_differing_only_in_name_collide() {
        let mut mux = Mux::default();
        mux.mount("/users/{id}", Dispatcher::default()).unwrap();
        assert_eq!(
            mux.mount("/users/{uid}", Dispatcher::default()),
            Err(ConfigError::DuplicatePrefix("/users/{uid}".into()))
        );
    }

    #[test]
    fn prefix_segments() {
        assert_eq!(parse_prefix(""), Some(vec![]));
        assert_eq!(
            parse_prefix("/users/{id}"),
            Some(vec![Segment::Literal("users".into()), Segment::Wildcard])
        );
        for bad in ["v1", "/", "/v1/", "/a//b", "/files/{*rest}", "/x{id}", "/{}", "/{a}b"] {
            assert_eq!(parse_prefix(bad), None, "{bad}");
        }
    }

    #[tokio::test]
    async fn bare_prefix_redirects_to_slash_form() {
        let mut mux = Mux::default();
        mux.mount("/v1", Dispatcher::default()).unwrap();

        let mut req = Request::new(Method::Get, "/v1");
        req.query = Some("page=2".into());
        let res = mux.dispatch(req).await;
        assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers()[LOCATION], "/v1/?page=2");
        assert!(res.body().is_empty());

        let res = mux.dispatch(Request::new(Method::Get, "/v2")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }
}
