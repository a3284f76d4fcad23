use std::{fs, io, path::Path};

use openssl::{
    error::ErrorStack,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
};
use thiserror::Error;

use crate::{
    jwk::{Jwk, JwkError},
    signature::{SignatureAlgorithm, SignatureError},
};

/// 金鑰載入與轉換時的錯誤列舉。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Failed to parse key: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("Failed to read key file: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported key type: {0:?}")]
    UnsupportedAlgorithm(Id),
    #[error("JWK error: {0}")]
    Jwk(#[from] JwkError),
}

/// 本模組使用的結果類型。
type Result<T> = std::result::Result<T, KeyError>;

/// 帳戶使用的非對稱金鑰對。
///
/// 載入時即計算公開 JWK 與其 thumbprint，之後每次推導挑戰值都重複使用，
/// 不再重新雜湊。
#[derive(Debug, Clone)]
pub struct KeyPair {
    pri_key: PKey<Private>,
    pub_key: PKey<Public>,
    jwk: Jwk,
    thumbprint: String,
}

impl KeyPair {
    /// 預設的 RSA 金鑰位數。
    pub const DEFAULT_BITS: u32 = 2048;

    /// 從 PEM 格式（PKCS#1 或 PKCS#8）的私鑰建立金鑰對。
    ///
    /// # 錯誤
    ///
    /// PEM 格式錯誤時回傳 [`KeyError::OpenSSL`]；
    /// 金鑰不是 RSA 時回傳 [`KeyError::UnsupportedAlgorithm`]。
    pub fn from_pem(pri_key_pem: &[u8]) -> Result<Self> {
        let pri_key = PKey::private_key_from_pem(pri_key_pem)?;
        Self::from_private_key(pri_key)
    }

    /// 從檔案讀取 PEM 私鑰。
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_pem(&data)
    }

    /// 產生新的 RSA 金鑰對。
    ///
    /// # 參數
    ///
    /// - `bits`: 金鑰長度，一般使用 [`KeyPair::DEFAULT_BITS`]。
    pub fn generate(bits: u32) -> Result<Self> {
        let rsa = Rsa::generate(bits)?;
        Self::from_private_key(PKey::from_rsa(rsa)?)
    }

    fn from_private_key(pri_key: PKey<Private>) -> Result<Self> {
        let pub_key = Self::derive_public_key(&pri_key)?;
        let jwk = Jwk::from_public_key(&pub_key)?;
        let thumbprint = jwk.thumbprint()?;

        Ok(Self {
            pri_key,
            pub_key,
            jwk,
            thumbprint,
        })
    }

    /// 根據私鑰派生出對應的公鑰。
    fn derive_public_key(pri_key: &PKey<Private>) -> Result<PKey<Public>> {
        match pri_key.id() {
            Id::RSA => {
                let rsa = pri_key.rsa()?;
                let pub_rsa =
                    Rsa::from_public_components(rsa.n().to_owned()?, rsa.e().to_owned()?)?;
                Ok(PKey::from_rsa(pub_rsa)?)
            }
            other => Err(KeyError::UnsupportedAlgorithm(other)),
        }
    }

    /// 以 PKCS#8 PEM 匯出私鑰，供呼叫端自行保存。
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.pri_key.private_key_to_pem_pkcs8()?)
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.pri_key
    }

    pub fn public_key(&self) -> &PKey<Public> {
        &self.pub_key
    }

    /// 公開的 JWK 表示。
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// 載入時計算好的 JWK thumbprint。
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::RS256
    }

    /// 以 RS256 對訊息簽名。
    pub fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SignatureError> {
        self.algorithm().sign(message, self)
    }

    /// 金鑰的位元長度，例如 2048。
    pub fn bits(&self) -> u32 {
        self.pri_key.bits()
    }
}
