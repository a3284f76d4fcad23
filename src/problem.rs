use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payload::Identifier;

/// CA 回傳的錯誤文件（RFC 7807，媒體類型 `application/problem+json`）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// 錯誤類型 URN，例如 `urn:ietf:params:acme:error:badNonce`
    #[serde(rename = "type", default)]
    pub problem_type: Option<String>,
    /// 人類可讀的說明
    #[serde(default)]
    pub detail: Option<String>,
    /// 伺服器附上的 HTTP 狀態碼
    #[serde(default)]
    pub status: Option<u16>,
    /// 針對個別識別項的子錯誤
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subproblems: Vec<Subproblem>,
}

/// 針對單一識別項的子錯誤。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subproblem {
    #[serde(rename = "type", default)]
    pub problem_type: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub identifier: Option<Identifier>,
}

impl Problem {
    const ACME_ERROR_PREFIX: &'static str = "urn:ietf:params:acme:error:";

    /// 嘗試把回應內容解析為錯誤文件；內容不是錯誤文件時回傳 `None`。
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let problem: Problem = serde_json::from_slice(body).ok()?;
        if problem.problem_type.is_none() && problem.detail.is_none() {
            return None;
        }
        Some(problem)
    }

    /// 去掉 ACME 前綴後的錯誤名稱，例如 `badNonce`。
    pub fn acme_error(&self) -> Option<&str> {
        self.problem_type
            .as_deref()
            .and_then(|t| t.strip_prefix(Self::ACME_ERROR_PREFIX))
    }

    pub fn is_bad_nonce(&self) -> bool {
        self.acme_error() == Some("badNonce")
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.problem_type.as_deref().unwrap_or("unknown problem");
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", kind, detail)?,
            None => write!(f, "{}", kind)?,
        }
        for sub in &self.subproblems {
            let target = sub
                .identifier
                .as_ref()
                .map(|i| i.value.as_str())
                .unwrap_or("?");
            write!(
                f,
                "; {} ({})",
                sub.detail.as_deref().unwrap_or("no detail"),
                target
            )?;
        }
        Ok(())
    }
}
