use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    Any,
    Only(Vec<HeaderValue>),
}

impl AllowList {
    /// A list containing `"*"` allows anything.
    pub fn parse<S: AsRef<str>>(items: &[S]) -> anyhow::Result<Self> {
        let items: Vec<&str> = items
            .iter()
            .map(|item| item.as_ref().trim())
            .filter(|item| !item.is_empty())
            .collect();

        if items.contains(&WILDCARD) {
            return Ok(AllowList::Any);
        }

        items
            .into_iter()
            .map(|item| {
                HeaderValue::from_str(item).with_context(|| format!("invalid CORS value {item:?}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map(AllowList::Only)
    }

    fn allows(&self, value: &HeaderValue) -> bool {
        match self {
            AllowList::Any => true,
            AllowList::Only(values) => values
                .iter()
                .any(|allowed| allowed.as_bytes().eq_ignore_ascii_case(value.as_bytes())),
        }
    }

    fn header_value(&self) -> HeaderValue {
        match self {
            AllowList::Any => HeaderValue::from_static(WILDCARD),
            AllowList::Only(values) => {
                let joined = values
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .collect::<Vec<_>>()
                    .join(", ");
                // every element came from a valid HeaderValue
                HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static(""))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    pub allow_origins: AllowList,
    pub allow_credentials: bool,
    pub allow_methods: AllowList,
    pub allow_headers: AllowList,
    pub max_age: Duration,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl CorsPolicy {
    /// Any origin, any method, any header, credentials allowed.
    pub fn permissive() -> Self {
        Self {
            allow_origins: AllowList::Any,
            allow_credentials: true,
            allow_methods: AllowList::Any,
            allow_headers: AllowList::Any,
            max_age: Duration::from_secs(600),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            allow_origins: AllowList::parse(&config.cors_allow_origins)
                .context("--cors-allow-origins")?,
            allow_credentials: config.cors_allow_credentials,
            allow_methods: AllowList::parse(&config.cors_allow_methods)
                .context("--cors-allow-methods")?,
            allow_headers: AllowList::parse(&config.cors_allow_headers)
                .context("--cors-allow-headers")?,
            max_age: config.cors_max_age(),
        })
    }

    /// Writes the cross-origin headers for a response to a request that
    /// carried `origin` (and a cookie, if `credentialed`).
    pub fn decorate(&self, origin: Option<&HeaderValue>, credentialed: bool, headers: &mut HeaderMap) {
        match &self.allow_origins {
            AllowList::Any => match origin {
                // browsers reject a wildcard origin on credentialed requests
                Some(origin) if credentialed && self.allow_credentials => {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                    headers.append(header::VARY, HeaderValue::from_static("Origin"));
                }
                _ => {
                    headers.insert(
                        header::ACCESS_CONTROL_ALLOW_ORIGIN,
                        HeaderValue::from_static(WILDCARD),
                    );
                }
            },
            AllowList::Only(_) => {
                if let Some(origin) = origin.filter(|origin| self.allow_origins.allows(origin)) {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                }
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
            }
        }

        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.header_value(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            self.allow_headers.header_value(),
        );
    }

    /// Answers a preflight request without reaching the router. Preflights
    /// never carry cookies, so with credentials allowed the requested origin,
    /// method and headers are mirrored in place of wildcards.
    fn preflight(&self, request_headers: &HeaderMap) -> Response {
        let origin = request_headers.get(header::ORIGIN);
        let method = request_headers.get(header::ACCESS_CONTROL_REQUEST_METHOD);
        let requested_headers = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS);

        let rejection = if origin.is_some_and(|origin| !self.allow_origins.allows(origin)) {
            tracing::debug!(?origin, "rejecting preflight from disallowed origin");
            Some("Disallowed CORS origin")
        } else if method.is_some_and(|method| !self.allow_methods.allows(method)) {
            tracing::debug!(?method, "rejecting preflight for disallowed method");
            Some("Disallowed CORS method")
        } else if requested_headers.is_some_and(|requested| !self.allows_headers(requested)) {
            tracing::debug!(?requested_headers, "rejecting preflight for disallowed headers");
            Some("Disallowed CORS headers")
        } else {
            None
        };

        let mut response = match rejection {
            Some(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            None => StatusCode::OK.into_response(),
        };
        let headers = response.headers_mut();
        self.decorate(origin, self.allow_credentials, headers);
        if self.allow_credentials {
            if let (AllowList::Any, Some(method)) = (&self.allow_methods, method) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, method.clone());
            }
            if let (AllowList::Any, Some(requested)) = (&self.allow_headers, requested_headers) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(self.max_age.as_secs()),
        );
        response
    }

    fn allows_headers(&self, requested: &HeaderValue) -> bool {
        let AllowList::Only(_) = &self.allow_headers else {
            return true;
        };
        let Ok(requested) = requested.to_str() else {
            return false;
        };
        requested
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .all(|name| {
                HeaderValue::from_str(name)
                    .map(|name| self.allow_headers.allows(&name))
                    .unwrap_or(false)
            })
    }
}

fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request.headers().contains_key(header::ORIGIN)
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Middleware applying `policy` to every response.
pub async fn apply_policy(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    if is_preflight(&request) {
        return policy.preflight(request.headers());
    }

    let origin = request.headers().get(header::ORIGIN).cloned();
    let credentialed = request.headers().contains_key(header::COOKIE);

    let mut response = next.run(request).await;
    policy.decorate(origin.as_ref(), credentialed, response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restricted() -> CorsPolicy {
        CorsPolicy {
            allow_origins: AllowList::parse(&["https://app.example"]).unwrap(),
            allow_credentials: false,
            allow_methods: AllowList::parse(&["GET", "OPTIONS"]).unwrap(),
            allow_headers: AllowList::parse(&["content-type"]).unwrap(),
            max_age: Duration::from_secs(60),
        }
    }

    #[test]
    fn wildcard_anywhere_in_list_allows_everything() {
        assert_eq!(AllowList::parse(&["GET", "*"]).unwrap(), AllowList::Any);
        assert!(matches!(
            AllowList::parse(&["GET", " POST "]).unwrap(),
            AllowList::Only(values) if values.len() == 2
        ));
    }

    #[test]
    fn rejects_values_that_cannot_be_headers() {
        assert!(AllowList::parse(&["https://bad\nexample"]).is_err());
    }

    #[test]
    fn permissive_policy_writes_wildcards() {
        let mut headers = HeaderMap::new();
        CorsPolicy::permissive().decorate(None, false, &mut headers);

        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }

    #[test]
    fn credentialed_request_gets_its_origin_mirrored() {
        let origin = HeaderValue::from_static("https://shop.example");
        let mut headers = HeaderMap::new();
        CorsPolicy::permissive().decorate(Some(&origin), true, &mut headers);

        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://shop.example"
        );
        assert_eq!(headers[header::VARY], "Origin");
    }

    #[test]
    fn restricted_policy_only_echoes_listed_origins() {
        let policy = restricted();

        let mut headers = HeaderMap::new();
        let allowed = HeaderValue::from_static("https://app.example");
        policy.decorate(Some(&allowed), false, &mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());

        let mut headers = HeaderMap::new();
        let other = HeaderValue::from_static("https://evil.example");
        policy.decorate(Some(&other), false, &mut headers);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn preflight_checks_origin_and_method() {
        let policy = restricted();

        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example"));
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("GET"),
        );
        let response = policy.preflight(&headers);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "60");

        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("DELETE"),
        );
        assert_eq!(policy.preflight(&headers).status(), StatusCode::BAD_REQUEST);

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.example"));
        assert_eq!(policy.preflight(&headers).status(), StatusCode::BAD_REQUEST);

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example"));
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("GET"),
        );
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("Content-Type, x-forbidden"),
        );
        let response = policy.preflight(&headers);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );

        headers.insert(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        assert_eq!(policy.preflight(&headers).status(), StatusCode::OK);
    }

    #[test]
    fn preflight_without_credentials_keeps_wildcards() {
        let policy = CorsPolicy {
            allow_credentials: false,
            ..CorsPolicy::permissive()
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example"));
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("GET"),
        );
        headers.insert(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("x-custom"),
        );
        let response = policy.preflight(&headers);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }
}
