//! ACME 帳戶的本地表示。
//!
//! 帳戶由電子郵件、帳戶金鑰與伺服器指派的帳戶 URL 組成。帳戶 URL 在註冊成功前為
//! `None`，註冊後只會被設定一次，之後作為所有 KID 模式請求的 `kid`。

use crate::key_pair::KeyPair;

/// 表示 ACME 帳戶的結構體。
#[derive(Debug, Clone)]
pub struct Account {
    /// 帳戶所屬電子郵件地址。
    pub email: String,
    url: Option<String>,
    key: KeyPair,
}

impl Account {
    /// 建立尚未註冊的帳戶。
    pub fn new(email: &str, key: KeyPair) -> Self {
        Account {
            email: email.to_string(),
            url: None,
            key,
        }
    }

    /// 以先前保存的帳戶 URL 還原已註冊的帳戶，不會發出任何請求。
    pub fn with_url(email: &str, key: KeyPair, url: &str) -> Self {
        Account {
            email: email.to_string(),
            url: Some(url.to_string()),
            key,
        }
    }

    /// 帳戶 URL，尚未註冊時為 `None`。
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// KID 模式使用的金鑰識別碼，即帳戶 URL。
    pub fn kid(&self) -> Option<&str> {
        self.url()
    }

    pub fn is_registered(&self) -> bool {
        self.url.is_some()
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// 帳戶金鑰的 JWK thumbprint。
    pub fn thumbprint(&self) -> &str {
        self.key.thumbprint()
    }

    /// 設定帳戶 URL；已設定時保持原值並回傳 `false`。
    pub(crate) fn set_url(&mut self, url: &str) -> bool {
        if self.url.is_some() {
            return false;
        }
        self.url = Some(url.to_string());
        true
    }
}
