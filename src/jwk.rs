use openssl::{
    pkey::{PKey, Public},
    sha::sha256,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::base64::Base64;

/// JWK 相關操作的錯誤類型。
#[derive(Debug, Error)]
pub enum JwkError {
    /// 不支援的金鑰類型。
    #[error("Unsupported key type: {0:?}")]
    UnsupportedKeyType(openssl::pkey::Id),
    /// 金鑰轉換失敗。
    #[error("Failed to convert key: {0}")]
    KeyConversion(#[from] openssl::error::ErrorStack),
    /// 序列化錯誤。
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, JwkError>;

/// RSA 公鑰的 JSON Web Key 表示。
///
/// 欄位宣告順序即為 RFC 7638 規定的字典序 `e`、`kty`、`n`，
/// 因此直接序列化即得到計算 thumbprint 所需的標準 JSON。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    e: String,
    kty: String,
    n: String,
}

impl Jwk {
    const KTY_RSA: &'static str = "RSA";

    /// 從公鑰取出模數與指數，並以無填充的 Base64 URL 編碼建立 JWK。
    ///
    /// # 錯誤
    ///
    /// 公鑰不是 RSA 時回傳 [`JwkError::UnsupportedKeyType`]。
    pub fn from_public_key(pub_key: &PKey<Public>) -> Result<Self> {
        if pub_key.id() != openssl::pkey::Id::RSA {
            return Err(JwkError::UnsupportedKeyType(pub_key.id()));
        }
        let rsa = pub_key.rsa()?;

        Ok(Self::from_components(&rsa.e().to_vec(), &rsa.n().to_vec()))
    }

    /// 以大端序的指數與模數位元組建立 JWK。
    pub fn from_components(e: &[u8], n: &[u8]) -> Self {
        Self {
            e: Base64::new(e).base64_url(),
            kty: Self::KTY_RSA.to_string(),
            n: Base64::new(n).base64_url(),
        }
    }

    pub fn e(&self) -> &str {
        &self.e
    }

    pub fn kty(&self) -> &str {
        &self.kty
    }

    pub fn n(&self) -> &str {
        &self.n
    }

    /// 標準化的 JSON 表示：鍵依 `e, kty, n` 排列且無空白。
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 計算 RFC 7638 的 SHA-256 thumbprint，並以 Base64 URL 編碼回傳。
    pub fn thumbprint(&self) -> Result<String> {
        let digest = sha256(self.to_canonical_json()?.as_bytes());
        Ok(Base64::new(digest).base64_url())
    }
}
