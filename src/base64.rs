//! ACME 所使用的 Base64 URL 安全編碼（無填充）封裝。

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use thiserror::Error;

/// Base64 解碼時可能發生的錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// 輸入字串不是合法的 Base64 URL 編碼。
    #[error("Invalid base64url input: {0}")]
    Invalid(String),
}

/// 持有原始位元組，並提供 JWS 所需的編碼形式。
///
/// # 示例
///
/// ```
/// # use racme_engine::base64::Base64;
/// let b64 = Base64::new("Hello, World!");
/// assert_eq!(b64.base64_url(), "SGVsbG8sIFdvcmxkIQ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64 {
    raw: Vec<u8>,
}

impl Base64 {
    /// 以任何可轉為位元組切片的資料建立實例。
    pub fn new<T: AsRef<[u8]>>(input: T) -> Self {
        Self {
            raw: input.as_ref().to_vec(),
        }
    }

    /// 從 URL 安全且無填充的字串解碼。
    ///
    /// 空字串代表空的資料，這正是 POST-as-GET 請求中 `payload` 的形式。
    ///
    /// # 錯誤
    ///
    /// 字串含有非法字元或長度不正確時回傳 [`DecodeError::Invalid`]。
    pub fn from_url(url_encoded: &str) -> Result<Self, DecodeError> {
        let raw = URL_SAFE_NO_PAD
            .decode(url_encoded)
            .map_err(|e| DecodeError::Invalid(e.to_string()))?;
        Ok(Self { raw })
    }

    /// 回傳 URL 安全、無 `=` 填充的編碼字串。
    pub fn base64_url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.raw)
    }

    /// 回傳標準（含填充）的編碼字串。
    pub fn standard(&self) -> String {
        STANDARD.encode(&self.raw)
    }

    /// 原始位元組。
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }
}
