use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    challenge::{Challenge, ChallengeResponse, ChallengeType},
    payload::Identifier,
};

/// 授權狀態，由伺服器決定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    identifier: Identifier,
    status: AuthorizationStatus,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
    #[serde(default)]
    wildcard: bool,
    #[serde(default)]
    challenges: Vec<ChallengeResponse>,
}

/// 單一識別項的授權快照，獨佔其挑戰並保留伺服器給出的順序。
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    /// 授權 URL
    pub url: String,
    /// 識別項的值（域名，萬用字元訂單時不含 `*.`）
    pub identifier: String,
    pub status: AuthorizationStatus,
    pub expires: Option<DateTime<Utc>>,
    pub wildcard: bool,
    pub challenges: Vec<Challenge>,
}

impl Authorization {
    /// 解析授權內容並推導每個挑戰的值。
    ///
    /// # 參數
    ///
    /// - `url`: 取得此授權的 URL。
    /// - `body`: 回應內容。
    /// - `thumbprint`: 帳戶金鑰的 thumbprint。
    pub fn from_slice(url: &str, body: &[u8], thumbprint: &str) -> serde_json::Result<Self> {
        let response: AuthorizationResponse = serde_json::from_slice(body)?;

        Ok(Self {
            url: url.to_string(),
            identifier: response.identifier.value,
            status: response.status,
            expires: response.expires,
            wildcard: response.wildcard,
            challenges: response
                .challenges
                .into_iter()
                .map(|c| Challenge::from_response(c, thumbprint))
                .collect(),
        })
    }

    /// 取得指定類型的第一個挑戰。
    pub fn challenge(&self, challenge_type: &ChallengeType) -> Option<&Challenge> {
        self.challenges
            .iter()
            .find(|c| &c.challenge_type == challenge_type)
    }
}
