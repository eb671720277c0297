//! Cookie seam between the session manager and the HTTP layer
//!
//! The manager only needs to read one named cookie from a request and append
//! one `Set-Cookie` header to a response. Both sides are traits so that any
//! request/response type can be plugged in; implementations for the `http`
//! crate types are provided.

use crate::config::CookieConfig;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request, Response};
use tracing::warn;

/// Read access to request cookies
pub trait CookieSource {
    /// Value of the first cookie called `name`, if the request carries one
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Write access to response cookies
pub trait CookieSink {
    /// Appends a serialized `Set-Cookie` value
    fn set_cookie(&mut self, cookie: String);
}

/// Finds `name` in a `Cookie` header value (`a=1; b=2`)
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim();
        Some(
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value),
        )
    })
}

/// Serializes the session cookie for `value` according to `config`
pub fn build_set_cookie(config: &CookieConfig, value: &str) -> String {
    let mut cookie = format!("{}={}; Path={}", config.name, value, config.path);

    if let Some(ref domain) = config.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if let Some(max_age) = config.max_age_secs {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if config.secure {
        cookie.push_str("; Secure");
    }
    if config.http_only {
        cookie.push_str("; HttpOnly");
    }
    if let Some(same_site) = config.same_site {
        cookie.push_str("; SameSite=");
        cookie.push_str(same_site.as_str());
    }

    cookie
}

impl CookieSource for HeaderMap {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| parse_cookie(header, name))
            .map(str::to_string)
    }
}

impl<B> CookieSource for Request<B> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.headers().cookie(name)
    }
}

impl<T: CookieSource + ?Sized> CookieSource for &T {
    fn cookie(&self, name: &str) -> Option<String> {
        (**self).cookie(name)
    }
}

impl CookieSink for HeaderMap {
    fn set_cookie(&mut self, cookie: String) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                self.append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping unencodable Set-Cookie header"),
        }
    }
}

impl<B> CookieSink for Response<B> {
    fn set_cookie(&mut self, cookie: String) {
        self.headers_mut().set_cookie(cookie);
    }
}
