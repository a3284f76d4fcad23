use openssl::{
    hash::MessageDigest,
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509Req},
};
use thiserror::Error;

use crate::{key_pair::KeyPair, order::Order};

/// 用於描述建立 CSR（證書簽名請求）過程中可能發生的錯誤。
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("Openssl error: {0}")]
    Openssl(#[from] openssl::error::ErrorStack),
    #[error("No SAN entries")]
    NoSanEntries,
}

type Result<T> = std::result::Result<T, CsrError>;

/// 表示一個 CSR 建構器，用於生成包含主體替代名稱 (SAN) 擴展的證書簽名請求。
///
/// # 範例
///
/// ```
/// use racme_engine::{csr::Csr, key_pair::KeyPair};
///
/// let key_pair = KeyPair::generate(2048).unwrap();
/// let csr = Csr::new()
///     .add_san("example.com")
///     .build(&key_pair)
///     .unwrap();
/// assert!(!csr.to_der().unwrap().is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct Csr {
    san_entries: Vec<String>,
}

impl Csr {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以訂單中的每個識別項作為 SAN。
    pub fn for_order(order: &Order) -> Self {
        order
            .domains()
            .fold(Self::new(), |csr, domain| csr.add_san(domain))
    }

    /// 新增一個 DNS 主體替代名稱 (SAN)，重複的名稱會被忽略。
    pub fn add_san(mut self, dns_name: &str) -> Self {
        if !self.san_entries.iter().any(|e| e == dns_name) {
            self.san_entries.push(dns_name.to_string());
        }
        self
    }

    pub fn san_entries(&self) -> &[String] {
        &self.san_entries
    }

    /// 以指定的金鑰對簽署 CSR。
    ///
    /// 該金鑰應為憑證金鑰，而不是帳戶金鑰。沒有任何 SAN 時回傳
    /// [`CsrError::NoSanEntries`]。
    pub fn build(self, key_pair: &KeyPair) -> Result<X509Req> {
        if self.san_entries.is_empty() {
            return Err(CsrError::NoSanEntries);
        }

        let mut req_builder = X509Req::builder()?;

        let mut san_builder = SubjectAlternativeName::new();
        for entry in &self.san_entries {
            san_builder.dns(entry);
        }
        let san_extension = san_builder.build(&req_builder.x509v3_context(None))?;

        let mut stack = Stack::new()?;
        stack.push(san_extension)?;
        req_builder.add_extensions(&stack)?;

        req_builder.set_pubkey(key_pair.private_key())?;
        req_builder.sign(key_pair.private_key(), MessageDigest::sha256())?;

        Ok(req_builder.build())
    }
}
