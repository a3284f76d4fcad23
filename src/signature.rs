use openssl::{hash::MessageDigest, sign::Signer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{base64::Base64, key_pair::KeyPair};

/// 簽名操作可能遇到的錯誤類型。
#[derive(Debug, Error)]
pub enum SignatureError {
    /// 底層 OpenSSL 簽名失敗，例如金鑰狀態無效。
    #[error("Signing error: {0}")]
    Signing(#[from] openssl::error::ErrorStack),
}

/// JWS 的簽名演算法，目前帳戶金鑰僅支援 RSA。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 搭配 SHA-256。
    RS256,
}

impl SignatureAlgorithm {
    fn digest(&self) -> MessageDigest {
        match self {
            Self::RS256 => MessageDigest::sha256(),
        }
    }

    /// 以指定金鑰對資料進行簽名。
    pub fn sign(&self, data: &[u8], key_pair: &KeyPair) -> Result<Vec<u8>, SignatureError> {
        let mut signer = Signer::new(self.digest(), key_pair.private_key())?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }
}

/// 根據已編碼的 header 與 payload 產生 JWS 簽名。
///
/// 簽名輸入為 `base64url(protected) + "." + base64url(payload)`；
/// payload 為空字串時（POST-as-GET）輸入以 `.` 結尾。
///
/// # 參數
///
/// - `header_b64`: 受保護標頭。
/// - `payload_b64`: 載荷，可以為空。
/// - `key_pair`: 帳戶金鑰對。
///
/// # 回傳
///
/// 成功時回傳簽名的 [`Base64`]；失敗時回傳 [`SignatureError`]。
pub fn create_signature(
    header_b64: &Base64,
    payload_b64: &Base64,
    key_pair: &KeyPair,
) -> Result<Base64, SignatureError> {
    let signing_input = format!("{}.{}", header_b64.base64_url(), payload_b64.base64_url());
    let signature = key_pair
        .algorithm()
        .sign(signing_input.as_bytes(), key_pair)?;

    Ok(Base64::new(signature))
}
