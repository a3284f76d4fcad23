//! HTTP 傳輸邊界。
//!
//! 協議引擎只需要能發出 GET、HEAD 與 POST 並取回狀態碼、標頭與原始內容的傳輸層。
//! 預設實作使用 `reqwest` 的阻塞式客戶端，並關閉自動重新導向；
//! [`MockTransport`] 依照預先排好的回應作答，適合測試。

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Mutex,
    time::Duration,
};

use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION},
    redirect::Policy,
    Method, StatusCode,
};
use serde::Serialize;
use thiserror::Error;

/// JWS 請求內容的媒體類型。
pub const JOSE_JSON: &str = "application/jose+json";

/// 傳輸層錯誤，皆為網路層面的失敗，不包含伺服器回傳的錯誤狀態碼。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("No scripted response for {method} {url}")]
    Unscripted { method: Method, url: String },
    #[error("Transport lock poisoned")]
    LockPoisoned,
}

type Result<T> = std::result::Result<T, TransportError>;

/// 送往 CA 的單一 HTTP 請求。
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    /// 以 `application/jose+json` 送出 JWS 的 POST 請求。
    pub fn post_jose(url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut request = Self::new(Method::POST, url);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JOSE_JSON));
        request.body = Some(body);
        request
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// 追加一個標頭。
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// CA 回傳的回應。
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 建立沒有標頭與內容的回應，狀態碼不合法時視為 500。
    pub fn new(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// 追加標頭，名稱或值不合法時忽略。
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// 以 JSON 序列化內容；序列化失敗時內容保持為空。
    pub fn with_json<T: Serialize>(self, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.with_body(body)
    }

    /// 取得字串形式的標頭值。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// 協議引擎所依賴的 HTTP 客戶端介面。
pub trait HttpClient: Send + Sync + fmt::Debug {
    /// 發出請求並回傳回應。非 2xx 狀態碼不是錯誤，由呼叫端判讀。
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// 以 `reqwest` 阻塞式客戶端實作的傳輸層。
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 建立傳輸層。
    ///
    /// # 參數
    ///
    /// - `user_agent`: 送出的 `User-Agent`。
    /// - `timeout`: 單一請求的逾時，`None` 表示使用 `reqwest` 的預設值。
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().map_err(TransportError::Build)?,
        })
    }
}

impl HttpClient for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        tracing::debug!("{} {}", method, url);

        let mut builder = self.client.request(method.clone(), url.as_str()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(|source| TransportError::Request {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?
            .to_vec();

        tracing::debug!("{} {} -> {}", method, url, status);
        tracing::trace!("Response body: {}", String::from_utf8_lossy(&body));

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// 依照預先排定的回應作答的傳輸層，並記錄所有收到的請求。
///
/// 同一個方法與 URL 可以排入多個回應，依序取出；用完後再次請求會回傳
/// [`TransportError::Unscripted`]。
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<(Method, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 為指定方法與 URL 排入一個回應。
    pub fn respond(&self, method: Method, url: &str, response: HttpResponse) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry((method, url.to_string()))
                .or_default()
                .push_back(response);
        }
        self
    }

    /// 目前為止收到的所有請求，依送出順序排列。
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// 計算送往指定方法與 URL 的請求數量。
    pub fn count(&self, method: &Method, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }
}

impl HttpClient for MockTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = (request.method.clone(), request.url.clone());
        self.requests
            .lock()
            .map_err(|_| TransportError::LockPoisoned)?
            .push(request);

        self.responses
            .lock()
            .map_err(|_| TransportError::LockPoisoned)?
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .ok_or(TransportError::Unscripted {
                method: key.0,
                url: key.1,
            })
    }
}
