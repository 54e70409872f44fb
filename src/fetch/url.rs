//! URL composition: path params, base URL and query string

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// `:name` placeholders in a URL template. A colon followed by a digit or a
/// slash (ports, `://`) is not a placeholder.
static PATH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid path token regex"));

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid scheme regex"));

/// A path or query parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

/// Parameters keyed by name, ordered so serialization is stable
pub type Params = BTreeMap<String, ParamValue>;

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Str(s) => write!(f, "{}", s),
            ParamValue::List(items) => {
                let joined: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(v: $t) -> Self {
                ParamValue::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i32, i64, u32, u64, usize);

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Build a `Params` map from `(key, value)` pairs
pub fn params<K, V, I>(pairs: I) -> Params
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Whether the URL already carries a scheme (`https://...`)
pub fn has_scheme(url: &str) -> bool {
    SCHEME.is_match(url)
}

/// Replace every `:key` token with the URI-encoded value from `params`.
/// Tokens without a value are left verbatim.
pub fn substitute_path_params(template: &str, params: &Params) -> String {
    PATH_TOKEN
        .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => urlencoding::encode(&value.to_string()).into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Join `base` and `path` with exactly one slash
pub fn join_base(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Encode query params as `application/x-www-form-urlencoded`.
/// Null values are skipped, lists repeat the key once per element.
pub fn query_string(query: &Params) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        match value {
            ParamValue::Null => {}
            ParamValue::List(items) => {
                for item in items {
                    serializer.append_pair(key, &item.to_string());
                }
            }
            other => {
                serializer.append_pair(key, &other.to_string());
            }
        }
    }
    serializer.finish()
}

/// Build the final request URL from a template
pub fn build_url(
    template: &str,
    base_url: &str,
    use_base_url: bool,
    params: &Params,
    query: &Params,
) -> String {
    let mut url = substitute_path_params(template, params);

    if use_base_url && !has_scheme(&url) {
        url = join_base(base_url, &url);
    }

    let qs = query_string(query);
    if !qs.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&qs);
    }

    url
}
