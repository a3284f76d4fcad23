use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{payload::Identifier, problem::Problem};

/// 訂單狀態，目前支援的狀態有 pending、ready、processing、valid 與 invalid。
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// 訂單快照。狀態只從伺服器讀取，要更新就重新取得一份新的訂單。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    /// 訂單 URL，取自 `Location` 標頭，不在內容中
    #[serde(skip)]
    pub url: String,
    /// 訂單當前狀態
    pub status: OrderStatus,
    /// 過期時間
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// 證書主題（Domain）識別符
    pub identifiers: Vec<Identifier>,
    /// 授權 URL 列表
    pub authorizations: Vec<String>,
    /// 最終確認 URL
    pub finalize: String,
    /// 憑證 URL（僅在有效時存在）
    #[serde(default)]
    pub certificate: Option<String>,
    /// 訂單失敗時伺服器附上的錯誤
    #[serde(default)]
    pub error: Option<Problem>,
}

impl Order {
    /// 解析訂單內容。
    ///
    /// # 參數
    ///
    /// - `url`: 訂單 URL。
    /// - `body`: 回應內容。
    pub fn from_slice(url: &str, body: &[u8]) -> serde_json::Result<Self> {
        let mut order: Self = serde_json::from_slice(body)?;
        order.url = url.to_owned();
        Ok(order)
    }

    /// 訂單 URL 的最後一段路徑，可作為本地識別碼。
    pub fn id(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    /// 訂單中所有識別項的值。
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(|i| i.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{
        "status": "pending",
        "expires": "2024-03-08T00:00:00Z",
        "identifiers": [
            { "type": "dns", "value": "example.com" },
            { "type": "dns", "value": "www.example.com" }
        ],
        "authorizations": ["https://ca/authz/1", "https://ca/authz/2"],
        "finalize": "https://ca/order/1/finalize"
    }"#;

    #[test]
    fn test_parse_order() {
        let order = Order::from_slice("https://ca/order/1", BODY).unwrap();

        assert_eq!(order.url, "https://ca/order/1");
        assert_eq!(order.id(), "1");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.authorizations.len(), 2);
        assert_eq!(order.finalize, "https://ca/order/1/finalize");
        assert_eq!(
            order.domains().collect::<Vec<_>>(),
            ["example.com", "www.example.com"]
        );
        assert!(order.certificate.is_none());
        assert!(order.error.is_none());
    }

    #[test]
    fn test_parse_invalid_order_with_error() {
        let body = br#"{
            "status": "invalid",
            "identifiers": [{ "type": "dns", "value": "example.com" }],
            "authorizations": [],
            "finalize": "https://ca/order/2/finalize",
            "error": {
                "type": "urn:ietf:params:acme:error:unauthorized",
                "detail": "Authorization failed"
            }
        }"#;

        let order = Order::from_slice("https://ca/order/2", body).unwrap();
        assert_eq!(order.status, OrderStatus::Invalid);
        assert!(order.expires.is_none());
        assert_eq!(
            order.error.and_then(|e| e.acme_error().map(str::to_string)),
            Some("unauthorized".to_string())
        );
    }

    #[test]
    fn test_missing_finalize_is_rejected() {
        let body = br#"{"status":"pending","identifiers":[],"authorizations":[]}"#;
        assert!(Order::from_slice("https://ca/order/3", body).is_err());
    }
}
