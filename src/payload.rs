use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::base64::Base64;

/// 載荷驗證失敗的原因。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Contact information is required")]
    MissingContact,
    #[error("Terms of service must be agreed")]
    TermsNotAgreed,
    #[error("At least one identifier is required")]
    NoIdentifiers,
    #[error("Identifier type must be 'dns', got '{0}'")]
    UnsupportedIdentifierType(String),
    #[error("Identifier value cannot be empty")]
    EmptyIdentifier,
    #[error("CSR cannot be empty")]
    EmptyCsr,
}

/// 所有 API 載荷必須實作的功能。
pub trait PayloadT: Serialize {
    /// 將載荷轉換成 JSON 字串。
    fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 將載荷轉為 JSON 後以 [`Base64`] 包裝，作為 JWS 的 `payload` 欄位。
    fn to_base64(&self) -> Result<Base64, serde_json::Error> {
        Ok(Base64::new(self.to_json_string()?))
    }

    /// 在送出前檢查載荷內容。
    fn validate(&self) -> Result<(), PayloadError>;
}

/// 建立新帳戶的載荷。
///
/// 欄位順序為 `termsOfServiceAgreed`、`contact`。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewAccountPayload {
    #[serde(rename = "termsOfServiceAgreed")]
    terms_of_service_agreed: bool,
    contact: Vec<String>,
}

impl NewAccountPayload {
    /// 建立一個已同意服務條款的 `NewAccountPayload`。
    ///
    /// `email` 會自動補上 `mailto:` 前綴，若已包含則不重複補充。
    pub fn new(email: &str) -> Self {
        let contact = if email.starts_with("mailto:") {
            vec![email.to_string()]
        } else {
            vec![format!("mailto:{}", email)]
        };

        NewAccountPayload {
            terms_of_service_agreed: true,
            contact,
        }
    }
}

impl PayloadT for NewAccountPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        if self
            .contact
            .iter()
            .all(|c| c.trim_start_matches("mailto:").is_empty())
        {
            return Err(PayloadError::MissingContact);
        }
        if !self.terms_of_service_agreed {
            return Err(PayloadError::TermsNotAgreed);
        }
        Ok(())
    }
}

/// 訂單中的識別項，目前只使用 `dns` 類型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl Identifier {
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            type_: "dns".to_string(),
            value: value.into(),
        }
    }
}

/// 建立新訂單的載荷，每個域名對應一個識別項。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewOrderPayload {
    pub identifiers: Vec<Identifier>,
}

impl NewOrderPayload {
    pub fn new<S: AsRef<str>>(domains: &[S]) -> Self {
        let identifiers = domains
            .iter()
            .map(|domain| Identifier::dns(domain.as_ref()))
            .collect();

        NewOrderPayload { identifiers }
    }
}

impl PayloadT for NewOrderPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.identifiers.is_empty() {
            return Err(PayloadError::NoIdentifiers);
        }
        for identifier in &self.identifiers {
            if identifier.type_ != "dns" {
                return Err(PayloadError::UnsupportedIdentifierType(
                    identifier.type_.clone(),
                ));
            }
            if identifier.value.is_empty() {
                return Err(PayloadError::EmptyIdentifier);
            }
        }
        Ok(())
    }
}

/// 通知 CA 挑戰回應已就緒的載荷，內容為空物件 `{}`。
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ChallengeResponsePayload {}

impl PayloadT for ChallengeResponsePayload {
    fn validate(&self) -> Result<(), PayloadError> {
        Ok(())
    }
}

/// 最終化訂單的載荷，`csr` 為 DER 格式 CSR 的 Base64 URL 編碼。
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeOrderPayload {
    csr: String,
}

impl FinalizeOrderPayload {
    pub fn new(csr_der: &[u8]) -> Self {
        FinalizeOrderPayload {
            csr: Base64::new(csr_der).base64_url(),
        }
    }
}

impl PayloadT for FinalizeOrderPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.csr.is_empty() {
            return Err(PayloadError::EmptyCsr);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_payload_json() {
        let payload = NewAccountPayload::new("test@example.com");
        assert_eq!(
            payload.to_json_string().unwrap(),
            r#"{"termsOfServiceAgreed":true,"contact":["mailto:test@example.com"]}"#
        );
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_new_account_payload_keeps_existing_prefix() {
        let payload = NewAccountPayload::new("mailto:ops@example.com");
        assert_eq!(payload.contact, vec!["mailto:ops@example.com"]);
    }

    #[test]
    fn test_new_account_payload_requires_contact() {
        assert_eq!(
            NewAccountPayload::new("").validate(),
            Err(PayloadError::MissingContact)
        );
    }

    #[test]
    fn test_new_order_payload_json() {
        let payload = NewOrderPayload::new(&["example.com"]);
        assert_eq!(
            payload.to_json_string().unwrap(),
            r#"{"identifiers":[{"type":"dns","value":"example.com"}]}"#
        );
    }

    #[test]
    fn test_new_order_payload_validation() {
        let empty: [&str; 0] = [];
        assert_eq!(
            NewOrderPayload::new(&empty).validate(),
            Err(PayloadError::NoIdentifiers)
        );
        assert_eq!(
            NewOrderPayload::new(&["example.com", ""]).validate(),
            Err(PayloadError::EmptyIdentifier)
        );
    }

    #[test]
    fn test_challenge_response_payload_is_empty_object() {
        assert_eq!(
            ChallengeResponsePayload::default().to_json_string().unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_finalize_payload_encodes_der() {
        let payload = FinalizeOrderPayload::new(&[0x30, 0x82, 0xFF]);
        assert_eq!(payload.to_json_string().unwrap(), r#"{"csr":"MIL_"}"#);
        assert_eq!(
            FinalizeOrderPayload::new(&[]).validate(),
            Err(PayloadError::EmptyCsr)
        );
    }
}
