//! JSON Web Signature（Flattened JSON Serialization）的建構與解析。
//!
//! ACME 的每個已簽名請求都是一個 `{"protected", "payload", "signature"}` 物件：
//! 帳戶建立時以 JWK 模式簽名，其餘請求都以帳戶 URL 作為 `kid`。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    base64::{Base64, DecodeError},
    key_pair::KeyPair,
    nonce::Nonce,
    protection::{KeyBinding, ProtectedHeader, ProtectionError},
    signature::{create_signature, SignatureError},
};

/// 建立或解析 JWS 時的錯誤。
#[derive(Error, Debug)]
pub enum JwsError {
    #[error("Protection error: {0}")]
    Protection(#[from] ProtectionError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] DecodeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, JwsError>;

/// 已簽名的 JWS 信封，三個欄位皆為 Base64 URL 編碼。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Jws {
    protected: String,
    payload: String,
    signature: String,
}

impl Jws {
    /// 以已編碼的三個部分組成 `Jws`。
    pub fn new(header_b64: &Base64, payload_b64: &Base64, signature_b64: &Base64) -> Self {
        Jws {
            protected: header_b64.base64_url(),
            payload: payload_b64.base64_url(),
            signature: signature_b64.base64_url(),
        }
    }

    /// 以內嵌 JWK 的保護頭簽名，僅用於建立帳戶。
    ///
    /// # 參數
    ///
    /// - `payload`: 已編碼的載荷；`None` 表示 POST-as-GET，`payload` 欄位為空字串。
    /// - `url`: 請求目標。
    /// - `key_pair`: 帳戶金鑰對。
    /// - `nonce`: 本次請求消耗的 nonce。
    pub fn sign_jwk(
        payload: Option<&Base64>,
        url: &str,
        key_pair: &KeyPair,
        nonce: &Nonce,
    ) -> Result<Self> {
        let binding = KeyBinding::Jwk(key_pair.jwk().clone());
        Self::sign(payload, url, key_pair, nonce, binding)
    }

    /// 以帳戶 URL 作為 `kid` 的保護頭簽名。
    ///
    /// 參數與 [`Jws::sign_jwk`] 相同，另加 `account_url`。
    pub fn sign_kid(
        payload: Option<&Base64>,
        url: &str,
        key_pair: &KeyPair,
        nonce: &Nonce,
        account_url: &str,
    ) -> Result<Self> {
        let binding = KeyBinding::Kid(account_url.to_string());
        Self::sign(payload, url, key_pair, nonce, binding)
    }

    fn sign(
        payload: Option<&Base64>,
        url: &str,
        key_pair: &KeyPair,
        nonce: &Nonce,
        binding: KeyBinding,
    ) -> Result<Self> {
        let header = ProtectedHeader::new(key_pair.algorithm(), binding, nonce, url).to_base64()?;
        let empty = Base64::new("");
        let payload = payload.unwrap_or(&empty);
        let signature = create_signature(&header, payload, key_pair)?;

        Ok(Self::new(&header, payload, &signature))
    }

    pub fn protected(&self) -> &str {
        &self.protected
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// 解碼受保護標頭。
    pub fn decode_protected(&self) -> Result<ProtectedHeader> {
        let raw = Base64::from_url(&self.protected)?;
        Ok(serde_json::from_slice(raw.as_bytes())?)
    }

    /// 解碼載荷；POST-as-GET 請求回傳 `None`。
    pub fn decode_payload(&self) -> Result<Option<serde_json::Value>> {
        if self.payload.is_empty() {
            return Ok(None);
        }
        let raw = Base64::from_url(&self.payload)?;
        Ok(Some(serde_json::from_slice(raw.as_bytes())?))
    }

    /// 序列化為請求內容。
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use openssl::{hash::MessageDigest, sign::Verifier};
    use serde_json::json;

    use super::*;
    use crate::payload::{NewOrderPayload, PayloadT};

    fn verify(jws: &Jws, key_pair: &KeyPair) -> bool {
        let input = format!("{}.{}", jws.protected(), jws.payload());
        let signature = Base64::from_url(jws.signature()).unwrap();
        let public_key = key_pair.public_key();
        let mut verifier = Verifier::new(MessageDigest::sha256(), public_key).unwrap();
        verifier.update(input.as_bytes()).unwrap();
        verifier.verify(signature.as_bytes()).unwrap()
    }

    #[test]
    fn test_jwk_mode_round_trip() {
        let key_pair = KeyPair::generate(2048).unwrap();
        let nonce = Nonce::from("abc");
        let payload = Base64::new(r#"{"termsOfServiceAgreed":true}"#);

        let jws = Jws::sign_jwk(Some(&payload), "https://ca/new-acct", &key_pair, &nonce).unwrap();

        let header = jws.decode_protected().unwrap();
        assert_eq!(header.jwk.as_ref(), Some(key_pair.jwk()));
        assert_eq!(header.kid, None);
        assert_eq!(header.nonce, "abc");
        assert_eq!(header.url, "https://ca/new-acct");
        assert_eq!(
            jws.decode_payload().unwrap(),
            Some(json!({"termsOfServiceAgreed": true}))
        );
        assert!(verify(&jws, &key_pair));
    }

    #[test]
    fn test_kid_mode_round_trip() {
        let key_pair = KeyPair::generate(2048).unwrap();
        let nonce = Nonce::from("n-2");
        let payload = NewOrderPayload::new(&["example.com"]).to_base64().unwrap();

        let jws = Jws::sign_kid(
            Some(&payload),
            "https://ca/new-order",
            &key_pair,
            &nonce,
            "https://ca/acct/1",
        )
        .unwrap();

        let header = jws.decode_protected().unwrap();
        assert_eq!(header.kid.as_deref(), Some("https://ca/acct/1"));
        assert!(header.jwk.is_none());
        assert_eq!(
            jws.decode_payload().unwrap(),
            Some(json!({"identifiers": [{"type": "dns", "value": "example.com"}]}))
        );
        assert!(verify(&jws, &key_pair));
    }

    #[test]
    fn test_post_as_get_has_empty_payload() {
        let key_pair = KeyPair::generate(2048).unwrap();
        let nonce = Nonce::from("n-3");

        let jws = Jws::sign_kid(None, "https://ca/authz/9", &key_pair, &nonce, "https://ca/acct/1")
            .unwrap();

        assert_eq!(jws.payload(), "");
        assert_eq!(jws.decode_payload().unwrap(), None);
        assert!(verify(&jws, &key_pair));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let key_pair = KeyPair::generate(2048).unwrap();
        let nonce = Nonce::from("n-4");
        let jws = Jws::sign_kid(
            Some(&Base64::new("{}")),
            "https://ca/chall/1",
            &key_pair,
            &nonce,
            "https://ca/acct/1",
        )
        .unwrap();

        let tampered = Jws {
            payload: Base64::new(r#"{"x":1}"#).base64_url(),
            ..jws
        };
        assert!(!verify(&tampered, &key_pair));
    }

    #[test]
    fn test_envelope_field_names() {
        let jws = Jws::new(&Base64::new("h"), &Base64::new("p"), &Base64::new("s"));
        assert_eq!(
            jws.to_json().unwrap(),
            r#"{"protected":"aA","payload":"cA","signature":"cw"}"#
        );
    }
}
