//! Per-request context — the mutable state middleware and handlers share.
//!
//! A [`Context`] is created by the dispatcher for every request and dropped
//! when the response is produced. It layers onto the parsed [`Request`]:
//!
//! - the pathname and [`Query`] parsed from the request target,
//! - [`PathParams`], filled in once a route matches,
//! - the JSON body, filled in by [`JsonBody`](crate::middleware::JsonBody),
//! - a typed [`Extensions`] map for anything else a middleware wants to hand
//!   to later stages.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use serde::de::DeserializeOwned;

use crate::Request;
use crate::http::Method;

/// Type-erased request extensions map — used to inject per-request state
/// into later stages without them knowing about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type if any.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// Path parameters extracted from the matched route, e.g. `id → "42"` for
/// pattern `/dummies/:id` and path `/dummies/42`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. A later binding of the same name wins.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A single query parameter: one value, or every value of a repeated key in
/// order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryValue {
    /// The first value.
    pub fn first(&self) -> &str {
        match self {
            Self::Single(v) => v,
            Self::Multiple(vs) => vs.first().map_or("", String::as_str),
        }
    }

    /// All values in order of appearance.
    pub fn all(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                *self = Self::Multiple(vec![std::mem::take(first), value]);
            }
            Self::Multiple(vs) => vs.push(value),
        }
    }
}

/// Parsed query string.
///
/// `+` decodes to a space and percent escapes are decoded; an escape that does
/// not decode to UTF-8 is kept verbatim. A key without `=` maps to the empty
/// string. Repeated keys collect into [`QueryValue::Multiple`].
///
/// # Examples
///
/// ```
/// use waypoint::context::{Query, QueryValue};
///
/// let query = Query::parse("tag=a&tag=b&name=hello+world&flag");
/// assert_eq!(query.get("name"), Some("hello world"));
/// assert_eq!(query.get("flag"), Some(""));
/// assert_eq!(
///     query.value("tag"),
///     Some(&QueryValue::Multiple(vec!["a".into(), "b".into()]))
/// );
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Query {
    map: HashMap<String, QueryValue>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let mut map: HashMap<String, QueryValue> = HashMap::new();

        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (key, value) = (decode_component(key), decode_component(value));

            match map.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    map.insert(key, QueryValue::Single(value));
                }
            }
        }

        Self { map }
    }

    /// The first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(QueryValue::first)
    }

    pub fn value(&self, key: &str) -> Option<&QueryValue> {
        self.map.get(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Splits a request target into `(pathname, query)`.
///
/// Absolute-form targets (`http://host/path`) are reduced to their path, and a
/// `#fragment` is dropped.
fn split_target(target: &str) -> (&str, &str) {
    let target = target.split_once('#').map_or(target, |(before, _)| before);

    let target = ["http://", "https://"]
        .iter()
        .find_map(|scheme| target.strip_prefix(*scheme))
        .map_or(target, |rest| rest.find('/').map_or("", |slash| &rest[slash..]));

    target.split_once('?').unwrap_or((target, ""))
}

/// Per-request state shared by every middleware and the matched handler.
#[derive(Debug)]
pub struct Context {
    request: Request,
    pathname: String,
    query: Query,
    params: PathParams,
    body: Option<serde_json::Value>,
    extensions: Extensions,
}

impl Context {
    /// Create a context from a request, parsing its target into pathname and query.
    pub fn new(request: Request) -> Self {
        let (pathname, raw_query) = split_target(request.target());
        let pathname = pathname.to_owned();
        let query = Query::parse(raw_query);

        Self {
            request,
            pathname,
            query,
            params: PathParams::new(),
            body: None,
            extensions: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// The request path without query string, exactly as sent (not percent-decoded).
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Parameters bound by the matched route. Empty until routing happens.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// The deserialized JSON body, if the body reader ran and succeeded.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: serde_json::Value) {
        self.body = Some(body);
    }

    /// Deserialize the parsed JSON body into `T`.
    ///
    /// Returns `None` when no body was parsed.
    pub fn body_as<T>(&self) -> Option<Result<T, serde_json::Error>>
    where
        T: DeserializeOwned,
    {
        self.body.clone().map(serde_json::from_value)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
