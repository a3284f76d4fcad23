use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::transport::{HttpClient, HttpRequest, TransportError};

/// 表示處理目錄操作時可能發生的錯誤類型。
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// 取得目錄時的網路錯誤。
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    /// 目錄端點回傳非 2xx 狀態碼。
    #[error("Directory {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    /// 目錄內容不是 JSON 物件。
    #[error("Directory {url} is not a JSON object: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// 目錄中沒有指定名稱的資源，或其值不是字串。
    #[error("Directory has no resource named '{name}'")]
    MissingResource { name: String },
}

/// 簡化目錄操作結果的型別。
type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// CA 的目錄文件：資源名稱到絕對 URL 的對應。
///
/// 內容原樣保存，未知的成員也會保留；只有字串成員可以被解析為 URL。
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    resources: Map<String, Value>,
}

impl Directory {
    pub const NEW_NONCE: &'static str = "newNonce";
    pub const NEW_ACCOUNT: &'static str = "newAccount";
    pub const NEW_ORDER: &'static str = "newOrder";

    /// 從 JSON 內容解析目錄。
    ///
    /// # 參數
    ///
    /// - `url`: 目錄 URL，僅用於錯誤訊息。
    /// - `body`: 回應內容。
    pub fn from_slice(url: &str, body: &[u8]) -> DirectoryResult<Self> {
        let resources = serde_json::from_slice(body).map_err(|source| DirectoryError::Json {
            url: url.to_string(),
            source,
        })?;
        Ok(Self { resources })
    }

    /// 取得資源名稱對應的 URL。
    pub fn resolve(&self, name: &str) -> DirectoryResult<&str> {
        self.resources
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| DirectoryError::MissingResource {
                name: name.to_string(),
            })
    }

    /// `meta.termsOfService`，CA 未提供時為 `None`。
    pub fn terms_of_service(&self) -> Option<&str> {
        self.resources
            .get("meta")
            .and_then(|meta| meta.get("termsOfService"))
            .and_then(Value::as_str)
    }

    /// 原始的目錄成員。
    pub fn resources(&self) -> &Map<String, Value> {
        &self.resources
    }
}

/// 取得並快取目錄的解析器。
///
/// 第一次解析時對目錄 URL 發出 GET，之後都只查詢快取，快取不會失效。
/// 並行的第一次解析只會發出一個請求；若取得失敗則不快取，下次解析會重試。
#[derive(Debug)]
pub struct DirectoryResolver {
    url: String,
    cell: OnceCell<Directory>,
}

impl DirectoryResolver {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cell: OnceCell::new(),
        }
    }

    /// 目錄 URL。
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 取得目錄，必要時向 CA 取得。
    pub fn directory(&self, transport: &dyn HttpClient) -> DirectoryResult<&Directory> {
        self.cell.get_or_try_init(|| self.fetch(transport))
    }

    /// 將資源名稱解析為 URL。
    pub fn resolve(&self, transport: &dyn HttpClient, name: &str) -> DirectoryResult<String> {
        Ok(self.directory(transport)?.resolve(name)?.to_string())
    }

    fn fetch(&self, transport: &dyn HttpClient) -> DirectoryResult<Directory> {
        tracing::debug!("Fetching directory from {}", self.url);
        let response = transport.execute(HttpRequest::get(self.url.as_str()))?;
        if !response.is_success() {
            return Err(DirectoryError::Status {
                url: self.url.clone(),
                status: response.status.as_u16(),
            });
        }
        Directory::from_slice(&self.url, &response.body)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::transport::{HttpResponse, MockTransport};

    const DIR_URL: &str = "https://ca/directory";

    fn directory_body() -> serde_json::Value {
        json!({
            "newNonce": "https://ca/new-nonce",
            "newAccount": "https://ca/new-acct",
            "newOrder": "https://ca/new-order",
            "meta": { "termsOfService": "https://ca/terms" }
        })
    }

    #[test]
    fn test_resolves_two_names_with_one_fetch() {
        let mock = MockTransport::new();
        mock.respond(
            Method::GET,
            DIR_URL,
            HttpResponse::new(200).with_json(&directory_body()),
        );
        let resolver = DirectoryResolver::new(DIR_URL);

        assert_eq!(
            resolver.resolve(&mock, Directory::NEW_NONCE).unwrap(),
            "https://ca/new-nonce"
        );
        assert_eq!(
            resolver.resolve(&mock, Directory::NEW_ORDER).unwrap(),
            "https://ca/new-order"
        );
        assert_eq!(mock.count(&Method::GET, DIR_URL), 1);
    }

    #[test]
    fn test_non_string_members_are_not_resolvable() {
        let body = serde_json::to_vec(&directory_body()).unwrap();
        let directory = Directory::from_slice(DIR_URL, &body).unwrap();

        assert!(matches!(
            directory.resolve("meta"),
            Err(DirectoryError::MissingResource { name }) if name == "meta"
        ));
        assert!(directory.resolve("revokeCert").is_err());
        assert_eq!(directory.terms_of_service(), Some("https://ca/terms"));
    }

    #[test]
    fn test_concurrent_first_resolve_fetches_once() {
        let mock = MockTransport::new();
        mock.respond(
            Method::GET,
            DIR_URL,
            HttpResponse::new(200).with_json(&directory_body()),
        );
        let resolver = DirectoryResolver::new(DIR_URL);

        let resolve = || resolver.resolve(&mock, Directory::NEW_ORDER);
        let resolved: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(resolve)).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for url in resolved {
            assert_eq!(url.unwrap(), "https://ca/new-order");
        }
        assert_eq!(mock.count(&Method::GET, DIR_URL), 1);
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let mock = MockTransport::new();
        mock.respond(Method::GET, DIR_URL, HttpResponse::new(503))
            .respond(
                Method::GET,
                DIR_URL,
                HttpResponse::new(200).with_json(&directory_body()),
            );
        let resolver = DirectoryResolver::new(DIR_URL);

        assert!(matches!(
            resolver.resolve(&mock, Directory::NEW_ACCOUNT),
            Err(DirectoryError::Status { status: 503, .. })
        ));
        assert_eq!(
            resolver.resolve(&mock, Directory::NEW_ACCOUNT).unwrap(),
            "https://ca/new-acct"
        );
    }

    #[test]
    fn test_non_json_body_is_rejected() {
        let mock = MockTransport::new();
        mock.respond(
            Method::GET,
            DIR_URL,
            HttpResponse::new(200).with_body("<html></html>"),
        );
        let resolver = DirectoryResolver::new(DIR_URL);

        assert!(matches!(
            resolver.resolve(&mock, Directory::NEW_NONCE),
            Err(DirectoryError::Json { .. })
        ));
    }
}
