use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{base64::Base64, jwk::Jwk, nonce::Nonce, signature::SignatureAlgorithm};

/// 產生保護頭時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// JSON 序列化錯誤
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, ProtectionError>;

/// 保護頭用來識別簽名金鑰的方式。
///
/// 建立帳戶時尚無帳戶 URL，只能內嵌完整 JWK；之後的請求都以帳戶 URL 作為 `kid`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyBinding {
    Jwk(Jwk),
    Kid(String),
}

/// JWS 的受保護標頭。
///
/// 序列化結果依序為 `alg`、`jwk` 或 `kid`、`nonce`、`url`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    /// 簽章演算法
    pub alg: SignatureAlgorithm,
    /// 內嵌的公開金鑰，僅用於建立帳戶
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
    /// 帳戶 URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// 防重放 nonce
    pub nonce: String,
    /// 請求目標 URL
    pub url: String,
}

impl ProtectedHeader {
    /// 建立保護頭。
    ///
    /// # 參數
    ///
    /// - `alg`: 簽章演算法。
    /// - `binding`: 填入 `jwk` 或 `kid` 欄位。
    /// - `nonce`: 本次請求消耗的 nonce。
    /// - `url`: 請求目標，必須與實際送出的 URL 相同。
    pub fn new(
        alg: SignatureAlgorithm,
        binding: KeyBinding,
        nonce: &Nonce,
        url: impl Into<String>,
    ) -> Self {
        let (jwk, kid) = match binding {
            KeyBinding::Jwk(jwk) => (Some(jwk), None),
            KeyBinding::Kid(kid) => (None, Some(kid)),
        };

        Self {
            alg,
            jwk,
            kid,
            nonce: nonce.as_str().to_string(),
            url: url.into(),
        }
    }

    /// 序列化後以 [`Base64`] 包裝，作為 JWS 的 `protected` 欄位。
    pub fn to_base64(&self) -> Result<Base64> {
        Ok(Base64::new(serde_json::to_vec(self)?))
    }
}
