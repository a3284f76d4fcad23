use std::fmt;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 回應中攜帶新 nonce 的標頭名稱。
pub const REPLAY_NONCE: &str = "replay-nonce";

/// 取得 nonce 時可能發生的錯誤。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NonceError {
    /// 重新取得一次後仍然沒有可用的 nonce。
    #[error("No Replay-Nonce available after refreshing from {url}")]
    Unavailable { url: String },
}

/// 伺服器發出的一次性防重放 token，內容不透明。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Nonce {
    fn from(value: &str) -> Self {
        Nonce(value.to_string())
    }
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Nonce(value)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 持有目前唯一一個 nonce。
///
/// nonce 被嵌入下一個簽名請求時即被取走，之後由該請求的回應標頭取代，
/// 不論回應狀態碼為何。同一個 nonce 不會被使用兩次。
#[derive(Debug, Default)]
pub struct NonceTracker {
    current: Option<Nonce>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 目前持有的 nonce，不會取走。
    pub fn current(&self) -> Option<&Nonce> {
        self.current.as_ref()
    }

    /// 取走目前的 nonce 以供簽名使用。
    ///
    /// 若目前沒有 nonce，會呼叫一次 `refresh`（通常是對 `newNonce` 發出 HEAD，
    /// 並把回應交給 [`NonceTracker::observe`]），之後仍沒有 nonce 則回傳
    /// [`NonceError::Unavailable`]。
    ///
    /// # 參數
    ///
    /// - `refresh_url`: 用於錯誤訊息的 `newNonce` URL。
    /// - `refresh`: 補充 nonce 的動作。
    pub fn consume<E, F>(&mut self, refresh_url: &str, refresh: F) -> Result<Nonce, E>
    where
        F: FnOnce(&mut Self) -> Result<(), E>,
        E: From<NonceError>,
    {
        if let Some(nonce) = self.current.take() {
            return Ok(nonce);
        }

        tracing::debug!("No nonce held, refreshing from {}", refresh_url);
        refresh(self)?;

        self.current.take().ok_or_else(|| {
            NonceError::Unavailable {
                url: refresh_url.to_string(),
            }
            .into()
        })
    }

    /// 從回應標頭讀取 `Replay-Nonce` 並覆寫目前的值。
    ///
    /// 錯誤回應同樣攜帶有效的 nonce，因此呼叫端必須對每個回應都呼叫此方法。
    /// 標頭不存在或不是合法字串時保持原狀。
    pub fn observe(&mut self, headers: &HeaderMap) -> Option<&Nonce> {
        match headers.get(REPLAY_NONCE).map(|v| v.to_str()) {
            Some(Ok(value)) => self.current = Some(Nonce::from(value)),
            Some(Err(_)) => tracing::warn!("Ignoring non-ASCII Replay-Nonce header"),
            None => {}
        }
        self.current.as_ref()
    }
}
