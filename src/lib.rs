//! # ACME Protocol Engine
//!
//! 本庫實作 ACME 協議（RFC 8555）的客戶端核心，用於與 Let's Encrypt 等 CA 交互：
//!
//! - **金鑰**（`key_pair`、`jwk`、`signature`）：載入或產生 RSA 帳戶金鑰，推導公開 JWK 與其 thumbprint。
//! - **目錄**（`directory`）：取得並快取 CA 的資源 URL 對應。
//! - **Nonce**（`nonce`）：保存最近一次的防重放 nonce，每個請求消耗一個。
//! - **簽名**（`protection`、`jws`、`payload`）：以 JWK 或 KID 模式建立 JWS 請求。
//! - **流程**（`client`）：帳戶註冊、訂單、授權與挑戰、最終化以及憑證下載。
//! - **實體**（`account`、`order`、`authorization`、`challenge`、`problem`）：伺服器回應的快照。
//! - **憑證工具**（`csr`、`certificate`）：為訂單建立 CSR、檢查下載的憑證。
//!
//! 發布挑戰回應（HTTP 文件或 DNS TXT 記錄）、輪詢狀態與保存資料由呼叫端負責。
//!
//! ## 示例
//!
//! ```no_run
//! use racme_engine::{AcmeClientBuilder, ChallengeType, KeyPair, OrderStatus, client::LETS_ENCRYPT_STAGING};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AcmeClientBuilder::new()
//!         .directory_url(LETS_ENCRYPT_STAGING)
//!         .build()?;
//!
//!     // 1. 註冊帳戶，保存 account.url() 與金鑰以便下次還原
//!     let key = KeyPair::generate(KeyPair::DEFAULT_BITS)?;
//!     let account = client.register_account("user@example.com", key)?;
//!
//!     // 2. 建立訂單並取得授權
//!     let order = client.create_order(&account, &["example.com"])?;
//!     for authz in client.authorize(&account, &order)? {
//!         let challenge = authz.challenge(&ChallengeType::Http01).ok_or("no http-01")?;
//!         // 將 challenge.value 公開在 challenge.http_path() 後通知 CA
//!         client.respond_to_challenge(&account, challenge)?;
//!     }
//!
//!     // 3. 訂單進入 ready 後提交 CSR，進入 valid 後下載憑證
//!     let order = client.fetch_order(&account, &order.url)?;
//!     if order.status == OrderStatus::Ready {
//!         let cert_key = KeyPair::generate(KeyPair::DEFAULT_BITS)?;
//!         let csr = racme_engine::csr::Csr::for_order(&order).build(&cert_key)?;
//!         client.finalize_order(&account, &order, &csr.to_der()?)?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod authorization;
pub mod base64;
pub mod certificate;
pub mod challenge;
pub mod client;
pub mod csr;
pub mod directory;
pub mod jwk;
pub mod jws;
pub mod key_pair;
pub mod nonce;
pub mod order;
pub mod payload;
pub mod problem;
pub mod protection;
pub mod signature;
pub mod transport;

pub use account::Account;
pub use authorization::{Authorization, AuthorizationStatus};
pub use challenge::{Challenge, ChallengeStatus, ChallengeType};
pub use client::{AcmeClient, AcmeClientBuilder, AcmeError};
pub use key_pair::KeyPair;
pub use order::{Order, OrderStatus};
