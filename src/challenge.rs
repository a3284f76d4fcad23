use std::fmt;

use chrono::{DateTime, Utc};
use openssl::sha::sha256;
use serde::{Deserialize, Serialize};

use crate::{base64::Base64, problem::Problem};

/// 表示 ACME 挑戰的類型，可用於選擇相應的驗證策略。
///
/// 未知的類型原樣保存在 [`ChallengeType::Other`]。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChallengeType {
    Http01,
    Dns01,
    TlsAlpn01,
    Other(String),
}

impl ChallengeType {
    /// 返回挑戰類型對應的字串表示。
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http01 => "http-01",
            Self::Dns01 => "dns-01",
            Self::TlsAlpn01 => "tls-alpn-01",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ChallengeType {
    fn from(s: &str) -> Self {
        match s {
            "http-01" => Self::Http01,
            "dns-01" => Self::Dns01,
            "tls-alpn-01" => Self::TlsAlpn01,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 挑戰狀態，由伺服器決定，本地不做狀態轉換。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

impl ChallengeStatus {
    /// 判斷該狀態是否為終結狀態，即無法再進行狀態轉換。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Valid | Self::Invalid)
    }
}

/// 伺服器回傳的挑戰物件。
#[derive(Debug, Deserialize)]
pub(crate) struct ChallengeResponse {
    #[serde(rename = "type")]
    challenge_type: String,
    url: String,
    status: ChallengeStatus,
    token: String,
    #[serde(default)]
    validated: Option<DateTime<Utc>>,
    #[serde(default)]
    error: Option<Problem>,
}

/// 表示一個 ACME 驗證挑戰，包含驗證所需的各項資料。
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    /// 驗證挑戰的類型
    pub challenge_type: ChallengeType,
    /// 當前挑戰狀態
    pub status: ChallengeStatus,
    /// 驗證挑戰的 URL
    pub url: String,
    /// 挑戰 token
    pub token: String,
    /// 呼叫端需要公開的值，見 [`challenge_value`]
    pub value: String,
    /// 驗證成功的時間
    pub validated: Option<DateTime<Utc>>,
    /// 驗證失敗時伺服器附上的錯誤
    pub error: Option<Problem>,
}

impl Challenge {
    /// 以帳戶金鑰的 thumbprint 建立挑戰並推導 `value`。
    pub(crate) fn from_response(response: ChallengeResponse, thumbprint: &str) -> Self {
        let challenge_type = ChallengeType::from(response.challenge_type.as_str());
        let value = challenge_value(&challenge_type, &response.token, thumbprint);

        Self {
            challenge_type,
            status: response.status,
            url: response.url,
            token: response.token,
            value,
            validated: response.validated,
            error: response.error,
        }
    }

    /// 從單一挑戰的 JSON 內容建立挑戰。
    pub fn from_slice(body: &[u8], thumbprint: &str) -> Result<Self, serde_json::Error> {
        let response: ChallengeResponse = serde_json::from_slice(body)?;
        Ok(Self::from_response(response, thumbprint))
    }

    /// HTTP-01 驗證文件的路徑；其他類型回傳 `None`。
    pub fn http_path(&self) -> Option<String> {
        (self.challenge_type == ChallengeType::Http01)
            .then(|| format!("/.well-known/acme-challenge/{}", self.token))
    }

    /// DNS-01 的 TXT 記錄名稱，萬用字元前綴會被移除。
    pub fn dns_record_name(domain: &str) -> String {
        format!("_acme-challenge.{}", domain.trim_start_matches("*."))
    }
}

/// `token.thumbprint` 形式的 key authorization。
pub fn key_authorization(token: &str, thumbprint: &str) -> String {
    format!("{}.{}", token, thumbprint)
}

/// 推導挑戰需要公開的值。
///
/// `http-01` 直接使用 key authorization，其餘類型使用其 SHA-256 摘要的
/// Base64 URL 編碼（無填充）。
pub fn challenge_value(challenge_type: &ChallengeType, token: &str, thumbprint: &str) -> String {
    let key_auth = key_authorization(token, thumbprint);
    match challenge_type {
        ChallengeType::Http01 => key_auth,
        _ => Base64::new(sha256(key_auth.as_bytes())).base64_url(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "evaGxfADs6pSRb2LAv9IZf17Dt3juxGJ-PCt92wr-oA";
    const THUMBPRINT: &str = "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs";

    #[test]
    fn test_http01_value_is_key_authorization() {
        assert_eq!(
            challenge_value(&ChallengeType::Http01, TOKEN, THUMBPRINT),
            format!("{}.{}", TOKEN, THUMBPRINT)
        );
    }

    #[test]
    fn test_dns01_value_is_hashed_key_authorization() {
        let value = challenge_value(&ChallengeType::Dns01, TOKEN, THUMBPRINT);
        let expected = Base64::new(sha256(format!("{}.{}", TOKEN, THUMBPRINT).as_bytes()));

        assert_eq!(value, expected.base64_url());
        assert_eq!(value.len(), 43);
        assert!(!value.contains('='));
        assert!(!value.contains('+') && !value.contains('/'));
    }

    #[test]
    fn test_unknown_type_is_kept_and_hashed() {
        let body = br#"{
            "type": "onion-csr-01",
            "url": "https://ca/chall/7",
            "status": "pending",
            "token": "tok"
        }"#;

        let challenge = Challenge::from_slice(body, "tp").unwrap();
        assert_eq!(
            challenge.challenge_type,
            ChallengeType::Other("onion-csr-01".to_string())
        );
        assert_eq!(challenge.challenge_type.as_str(), "onion-csr-01");
        assert_eq!(
            challenge.value,
            challenge_value(&ChallengeType::Dns01, "tok", "tp")
        );
        assert_eq!(challenge.http_path(), None);
    }

    #[test]
    fn test_parse_validated_challenge() {
        let body = br#"{
            "type": "http-01",
            "url": "https://ca/chall/1",
            "status": "valid",
            "token": "tok",
            "validated": "2024-03-01T12:00:00Z"
        }"#;

        let challenge = Challenge::from_slice(body, "tp").unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Valid);
        assert!(challenge.status.is_terminal());
        assert_eq!(challenge.value, "tok.tp");
        assert_eq!(
            challenge.http_path().as_deref(),
            Some("/.well-known/acme-challenge/tok")
        );
        assert_eq!(
            challenge.validated.map(|t| t.to_rfc3339()),
            Some("2024-03-01T12:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_dns_record_name_strips_wildcard() {
        assert_eq!(
            Challenge::dns_record_name("*.example.com"),
            "_acme-challenge.example.com"
        );
        assert_eq!(
            Challenge::dns_record_name("www.example.com"),
            "_acme-challenge.www.example.com"
        );
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let body = br#"{"type":"dns-01","url":"https://ca/chall/2","status":"pending"}"#;
        let err = Challenge::from_slice(body, "tp").unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let body = br#"{"type":"dns-01","url":"u","status":"bogus","token":"t"}"#;
        assert!(Challenge::from_slice(body, "tp").is_err());
    }
}
