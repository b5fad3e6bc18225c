//! # Origins and URL Parameters
//!
//! Helpers used to compare execution-context origins, to read the
//! `parent`/`rpctoken` parameters a container passes to its gadgets, and to
//! percent-encode payloads for the address-fragment transport.
//!
//! Origins are the ASCII serialization of the URL's tuple origin:
//! `scheme://host[:port]`, lowercase, userinfo stripped, with the default
//! port of `http`/`https` dropped.

use crate::errors::CodecError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;
use std::collections::HashMap;
use url::{form_urlencoded, Origin, Url};

/// Bytes `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Canonical `scheme://host[:port]` for `url`.
///
/// Scheme-less input (`//host/...` or `host/...`) inherits `default_scheme`.
/// Empty or unparseable input yields an empty origin, which never equals a
/// real one.
#[must_use]
pub fn origin_of(url: &str, default_scheme: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let absolute = if url.starts_with("//") {
        format!("{default_scheme}:{url}")
    } else if !url.contains("://") {
        format!("{default_scheme}://{url}")
    } else {
        url.to_string()
    };

    match Url::parse(&absolute).map(|parsed| parsed.origin()) {
        Ok(origin @ Origin::Tuple(..)) => origin.ascii_serialization(),
        _ => String::new(),
    }
}

/// Scheme of an absolute URL (`"https"` for `https://a/b`).
#[must_use]
pub fn scheme_of(url: &str) -> Option<&str> {
    let scheme_len = Url::parse(url).ok()?.scheme().len();
    url.get(..scheme_len)
}

/// Prefix a scheme-relative `//host/...` URL with `scheme`.
#[must_use]
pub fn absolutize(url: &str, scheme: &str) -> String {
    if url.starts_with("//") {
        format!("{scheme}:{url}")
    } else {
        url.to_string()
    }
}

/// Resolve a possibly relative parent relay URL against the `parent`
/// parameter handed to the gadget.
///
/// - absolute or scheme-relative input is returned unchanged
/// - path-relative input is appended to the directory of `parent`
/// - host-relative input (`/x`) is appended to the origin of `parent`
/// - without a usable `parent` the input is returned unchanged
#[must_use]
pub fn resolve_relay_url(relay: &str, parent: Option<&str>, default_scheme: &str) -> String {
    if relay.starts_with("http://") || relay.starts_with("https://") || relay.starts_with("//") {
        return relay.to_string();
    }
    let Some(parent) = parent.filter(|p| !p.is_empty()) else {
        return relay.to_string();
    };
    Url::parse(&absolutize(parent, default_scheme))
        .and_then(|base| base.join(relay))
        .map_or_else(|_| relay.to_string(), String::from)
}

/// Parse `key=value` pairs from both the query and the fragment of `url`.
///
/// Values are percent-decoded with `+` read as a space. When a key appears
/// in both, the fragment wins. Undecodable escapes are kept verbatim.
#[must_use]
pub fn url_params(url: &str) -> HashMap<String, String> {
    let (query, fragment) = match Url::parse(url) {
        Ok(parsed) => (
            parsed.query().unwrap_or_default().to_string(),
            parsed.fragment().unwrap_or_default().to_string(),
        ),
        Err(_) => {
            let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
            let query = rest.split_once('?').map_or("", |(_, query)| query);
            (query.to_string(), fragment.to_string())
        }
    };

    form_urlencoded::parse(query.as_bytes())
        .chain(form_urlencoded::parse(fragment.as_bytes()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Percent-encode everything except the `encodeURIComponent` unreserved set.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Reverse of [`percent_encode`]. Rejects truncated escapes and non-UTF-8.
pub fn percent_decode(input: &str) -> Result<String, CodecError> {
    for (offset, _) in input.match_indices('%') {
        let escape = input.get(offset + 1..offset + 3);
        if !escape.is_some_and(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit())) {
            return Err(CodecError::MalformedFragment(format!(
                "bad escape at offset {offset}"
            )));
        }
    }
    percent_decode_str(input)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| CodecError::MalformedFragment(e.to_string()))
}
