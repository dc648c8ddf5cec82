use crate::error::{Error, Result};
use indexmap::IndexMap;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION,
};
use reqwest::{redirect, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::instrument;
use url::Url;

pub const DEFAULT_REDIRECT_LIMIT: usize = 10;

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Credentials applied to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Self::Basic { username, password } => {
                format!("Basic {}", base64::encode(format!("{username}:{password}")))
            }
            Self::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
        }
    }
}

/// Request payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Serialized as JSON, content type forced to `application/json`.
    Json(serde_json::Value),
    /// Sent verbatim with whatever content type the caller set.
    Raw(String),
    /// URL encoded form fields.
    Form(Vec<(String, String)>),
}

impl Body {
    fn encode(&self) -> Result<String> {
        match self {
            Self::Json(value) => serde_json::to_string(value)
                .map_err(|err| Error::unsupported_shape("", err.to_string())),
            Self::Raw(raw) => Ok(raw.clone()),
            Self::Form(fields) => Ok(url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub body: Option<Body>,
    pub redirect_limit: Option<usize>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: IndexMap::new(),
            body: None,
            redirect_limit: None,
        }
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the client's redirect budget for this request only.
    pub fn redirect_limit(mut self, limit: usize) -> Self {
        self.redirect_limit = Some(limit);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Success,
    Redirect,
    Error,
}

#[derive(Clone, Debug)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Response {
    pub fn classify(&self) -> Classification {
        if self.status.is_success() {
            Classification::Success
        } else if self.status.is_redirection() {
            Classification::Redirect
        } else {
            Classification::Error
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The URL which finally answered, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|err| Error::Decode {
            url: self.url.clone(),
            reason: err.to_string(),
        })
    }

    fn location(&self, method: &Method) -> Result<Url> {
        let invalid = |reason: String| Error::InvalidRedirect {
            method: method.clone(),
            url: self.url.clone(),
            code: self.status,
            reason,
        };

        let location = self
            .headers
            .get(LOCATION)
            .ok_or_else(|| invalid("missing location header".to_string()))?
            .to_str()
            .map_err(|err| invalid(err.to_string()))?;

        self.url
            .join(location)
            .map_err(|err| invalid(format!("{location}: {err}")))
    }
}

#[derive(Clone, Debug)]
pub struct HttpClientBuilder {
    auth: Option<Auth>,
    session_cookie: Option<String>,
    headers: IndexMap<String, String>,
    redirect_limit: usize,
    timeout: Option<Duration>,
    insecure_tls: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            auth: None,
            session_cookie: None,
            headers: IndexMap::new(),
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            timeout: None,
            insecure_tls: false,
        }
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn basic_auth<U: Into<String>, P: Into<String>>(self, username: U, password: P) -> Self {
        self.auth(Auth::Basic {
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn bearer_token<T: Into<String>>(self, token: T) -> Self {
        self.auth(Auth::Bearer(token.into()))
    }

    /// Attach the session cookie of a clustered (cloud) server to every request.
    ///
    /// Cloud nodes don't share session state, so without the cookie a read right
    /// after a write may hit a node which hasn't seen the write yet.
    pub fn cloud<C: Into<String>>(mut self, cookie: C) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn redirect_limit(mut self, limit: usize) -> Self {
        self.redirect_limit = limit;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn insecure_tls(mut self, insecure_tls: bool) -> Self {
        self.insecure_tls = insecure_tls;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        if matches!(&self.session_cookie, Some(cookie) if cookie.trim().is_empty()) {
            return Err(Error::Config("cloud session cookie must not be empty".into()));
        }

        let mut client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(self.insecure_tls);
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        let client = client
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient {
            client,
            auth: self.auth,
            session_cookie: self.session_cookie,
            headers: self.headers,
            redirect_limit: self.redirect_limit,
        })
    }
}

/// An authenticated HTTP client, following redirects on its own.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    auth: Option<Auth>,
    session_cookie: Option<String>,
    headers: IndexMap<String, String>,
    redirect_limit: usize,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub fn is_cloud(&self) -> bool {
        self.session_cookie.is_some()
    }

    /// Execute a request, following redirects until the budget is used up.
    ///
    /// Each hop re-issues the same method, headers and body. With a budget of `n`
    /// the original call plus at most `n` hops are sent. Any status other than
    /// 2xx/3xx is returned as [`Error::HttpStatus`].
    #[instrument(skip_all, err, fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let headers = self.headers_for(&request)?;
        let payload = request.body.as_ref().map(Body::encode).transpose()?;
        let Request {
            method,
            mut url,
            redirect_limit,
            ..
        } = request;
        let budget = redirect_limit.unwrap_or(self.redirect_limit);
        let mut remaining = budget;

        loop {
            let response = self
                .send(&method, &url, &headers, payload.as_deref())
                .await?;

            match response.classify() {
                Classification::Success => return Ok(response),
                Classification::Redirect => {
                    if remaining == 0 {
                        return Err(Error::TooManyRedirects {
                            method,
                            url,
                            budget,
                        });
                    }
                    let location = response.location(&method)?;
                    log::debug!("Following redirect ({}): {url} -> {location}", response.status);
                    remaining -= 1;
                    url = location;
                }
                Classification::Error => {
                    log::debug!(
                        "HTTP error: method={method} url={url} request_body={:?} code={} body={}",
                        payload,
                        response.status.as_u16(),
                        response.body
                    );
                    return Err(Error::HttpStatus {
                        method,
                        url,
                        code: response.status,
                        message: response
                            .status
                            .canonical_reason()
                            .unwrap_or_default()
                            .to_string(),
                        body: response.body,
                    });
                }
            }
        }
    }

    pub async fn get(&self, url: Url) -> Result<Response> {
        self.execute(Request::new(Method::GET, url)).await
    }

    /// Fetch and decode a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.execute(Request::new(Method::GET, url).header(ACCEPT.as_str(), APPLICATION_JSON))
            .await?
            .json()
    }

    pub async fn post(&self, url: Url, body: Body) -> Result<Response> {
        self.execute(Request::new(Method::POST, url).body(body))
            .await
    }

    pub async fn put(&self, url: Url, body: Body) -> Result<Response> {
        self.execute(Request::new(Method::PUT, url).body(body)).await
    }

    pub async fn delete(&self, url: Url) -> Result<Response> {
        self.execute(Request::new(Method::DELETE, url)).await
    }

    fn headers_for(&self, request: &Request) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (name, value) in self.headers.iter().chain(request.headers.iter()) {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                Error::InvalidHeader {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            headers.insert(name.clone(), header_value(name.as_str(), value)?);
        }

        if let Some(auth) = &self.auth {
            let mut value = header_value(AUTHORIZATION.as_str(), &auth.header_value())?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(cookie) = &self.session_cookie {
            let mut value = header_value(COOKIE.as_str(), cookie)?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        match &request.body {
            Some(Body::Json(_)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            }
            Some(Body::Form(_)) if !headers.contains_key(CONTENT_TYPE) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
            }
            _ => {}
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        payload: Option<&str>,
    ) -> Result<Response> {
        log::debug!("execute - method = {method}, url = {url}");

        let transport = |source| Error::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        };

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(payload) = payload {
            log::debug!("execute - body = {payload}");
            request = request.body(payload.to_string());
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(transport)?;

        log::debug!("execute - received response = {status}, body = {body}");

        Ok(Response {
            url: url.clone(),
            status,
            headers,
            body,
        })
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| Error::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    })
}
