use chrono::{DateTime, Duration, Utc};
use openssl::{asn1::Asn1Time, x509::X509};
use thiserror::Error;

/// 證書相關操作可能出現的錯誤類型
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Failed to parse certificate: {0}")]
    Parse(#[from] openssl::error::ErrorStack),
    #[error("PEM chain contains no certificate")]
    EmptyChain,
    #[error("Invalid expiration timestamp")]
    InvalidTimestamp,
}

/// 自定義結果型別，錯誤類型為 `CertificateError`
type Result<T> = std::result::Result<T, CertificateError>;

/// 下載得到的憑證鏈，第一張為葉憑證。
#[derive(Debug, Clone)]
pub struct Certificate {
    chain: Vec<X509>,
}

impl Certificate {
    /// 從 PEM 格式的憑證鏈建立 `Certificate`。
    pub fn from_pem(pem: &str) -> Result<Self> {
        let chain = X509::stack_from_pem(pem.as_bytes())?;
        if chain.is_empty() {
            return Err(CertificateError::EmptyChain);
        }
        Ok(Certificate { chain })
    }

    /// 葉憑證。
    pub fn leaf(&self) -> &X509 {
        &self.chain[0]
    }

    /// 完整的憑證鏈，包含葉憑證。
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    /// 葉憑證的到期時間。
    pub fn not_after(&self) -> Result<DateTime<Utc>> {
        let epoch = Asn1Time::from_unix(0)?;
        let diff = epoch.diff(self.leaf().not_after())?;
        let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
        DateTime::from_timestamp(seconds, 0).ok_or(CertificateError::InvalidTimestamp)
    }

    /// 判斷證書是否應該進行續約
    ///
    /// 剩餘有效時間少於 `threshold_days` 天（或已過期）時回傳 `true`。
    pub fn should_renew(&self, threshold_days: u32) -> Result<bool> {
        let remaining = self.not_after()? - Utc::now();
        tracing::debug!(
            "Certificate expires in {} hours, renewal threshold {} days",
            remaining.num_hours(),
            threshold_days
        );
        Ok(remaining < Duration::days(i64::from(threshold_days)))
    }
}
