//! ACME 協議流程：帳戶註冊、訂單、授權、挑戰、最終化與憑證下載。
//!
//! 每個已簽名的交換都依照相同步驟進行：取得 nonce、建立 JWS、送出請求、
//! 從回應（不論成功與否）記錄新的 nonce，最後才解讀回應內容。
//! nonce 追蹤器在整個交換期間都被鎖住，同一個客戶端同時只會有一個已簽名請求在進行。

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use reqwest::header::{HeaderValue, ACCEPT};
use thiserror::Error;

use crate::{
    account::Account,
    authorization::Authorization,
    base64::Base64,
    challenge::Challenge,
    csr::CsrError,
    directory::{Directory, DirectoryError, DirectoryResolver},
    jws::{Jws, JwsError},
    key_pair::{KeyError, KeyPair},
    nonce::{Nonce, NonceError, NonceTracker},
    order::{Order, OrderStatus},
    payload::{
        ChallengeResponsePayload, FinalizeOrderPayload, NewAccountPayload, NewOrderPayload,
        PayloadError, PayloadT,
    },
    problem::Problem,
    transport::{HttpClient, HttpRequest, HttpResponse, ReqwestTransport, TransportError},
};

/// Let's Encrypt 正式環境的目錄 URL。
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt 測試環境的目錄 URL。
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

const PEM_CERTIFICATE_CHAIN: &str = "application/pem-certificate-chain";

/// 協議流程中可能發生的錯誤。
#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Signing error: {0}")]
    Signing(#[from] JwsError),
    #[error("No nonce available from {url}")]
    NonceUnavailable { url: String },
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("{url} returned HTTP {status}{}", describe_problem(.problem))]
    Protocol {
        url: String,
        status: u16,
        problem: Option<Problem>,
    },
    #[error("Unexpected response body from {url}: {source}")]
    Deserialization {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Response from {url} has no {name} header")]
    MissingHeader { url: String, name: &'static str },
    #[error("Account has no URL yet, register it first")]
    AccountNotRegistered,
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),
    #[error("Order is {status:?}, expected ready")]
    OrderNotReady { status: OrderStatus },
    #[error("Order is not valid or has no certificate URL")]
    OrderNotValid,
    #[error("Failed to fetch authorization {url}: {source}")]
    Authorization {
        url: String,
        #[source]
        source: Box<AcmeError>,
    },
    #[error("CSR error: {0}")]
    Csr(#[from] CsrError),
    #[error("Nonce lock poisoned")]
    LockPoisoned,
}

impl From<NonceError> for AcmeError {
    fn from(err: NonceError) -> Self {
        match err {
            NonceError::Unavailable { url } => AcmeError::NonceUnavailable { url },
        }
    }
}

fn describe_problem(problem: &Option<Problem>) -> String {
    problem
        .as_ref()
        .map(|p| format!(": {}", p))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, AcmeError>;

/// 用於構建 [`AcmeClient`] 實例的構造器，採用 builder 模式。
#[derive(Debug)]
pub struct AcmeClientBuilder {
    directory_url: String,
    user_agent: String,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn HttpClient>>,
}

impl AcmeClientBuilder {
    const DEFAULT_USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// 創建一個新的 [`AcmeClientBuilder`] 實例，並設置預設值。
    ///
    /// 預設值包括：
    /// - ACME 目錄 URL：[`LETS_ENCRYPT_PRODUCTION`]
    /// - User-Agent：`racme-engine/<版本>`
    /// - 單一請求逾時：30 秒
    pub fn new() -> Self {
        AcmeClientBuilder {
            directory_url: LETS_ENCRYPT_PRODUCTION.to_string(),
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
            timeout: Some(Self::DEFAULT_TIMEOUT),
            transport: None,
        }
    }

    /// 設置 ACME 目錄 URL。
    pub fn directory_url(mut self, directory_url: &str) -> Self {
        self.directory_url = directory_url.to_string();
        self
    }

    /// 設置 User-Agent，使用自訂傳輸層時不生效。
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// 設置單一請求逾時，`None` 表示使用 `reqwest` 的預設值。
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 使用自訂的傳輸層取代預設的 `reqwest` 客戶端。
    pub fn transport(mut self, transport: Arc<dyn HttpClient>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 根據當前的配置構建 [`AcmeClient`] 實例。
    ///
    /// 不會發出任何請求，目錄在第一次需要時才取得。
    pub fn build(self) -> Result<AcmeClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.user_agent, self.timeout)?),
        };

        Ok(AcmeClient {
            transport,
            directory: DirectoryResolver::new(self.directory_url),
            nonce: Mutex::new(NonceTracker::new()),
        })
    }
}

impl Default for AcmeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 簽名時識別金鑰的方式。
#[derive(Clone, Copy)]
enum Signer<'a> {
    Jwk,
    Kid(&'a str),
}

/// 與單一 CA 互動的客戶端。
///
/// # 範例
///
/// ```no_run
/// use racme_engine::{
///     challenge::ChallengeType,
///     client::{AcmeClientBuilder, LETS_ENCRYPT_STAGING},
///     key_pair::KeyPair,
/// };
///
/// fn main() -> Result<(), racme_engine::client::AcmeError> {
///     let client = AcmeClientBuilder::new()
///         .directory_url(LETS_ENCRYPT_STAGING)
///         .build()?;
///
///     let key = KeyPair::generate(KeyPair::DEFAULT_BITS)?;
///     let account = client.register_account("admin@example.com", key)?;
///     let order = client.create_order(&account, &["example.com"])?;
///
///     for authz in client.authorize(&account, &order)? {
///         if let Some(challenge) = authz.challenge(&ChallengeType::Dns01) {
///             println!(
///                 "{} TXT {}",
///                 racme_engine::challenge::Challenge::dns_record_name(&authz.identifier),
///                 challenge.value
///             );
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct AcmeClient {
    transport: Arc<dyn HttpClient>,
    directory: DirectoryResolver,
    nonce: Mutex<NonceTracker>,
}

impl AcmeClient {
    /// 以預設設定建立指向指定目錄的客戶端。
    pub fn new(directory_url: &str) -> Result<Self> {
        AcmeClientBuilder::new().directory_url(directory_url).build()
    }

    /// 取得 CA 的目錄，第一次呼叫時會向 CA 取得。
    pub fn directory(&self) -> Result<&Directory> {
        Ok(self.directory.directory(self.transport.as_ref())?)
    }

    /// 以新的金鑰註冊帳戶並回傳帶有帳戶 URL 的 [`Account`]。
    ///
    /// 若 CA 上已有同一把金鑰的帳戶，CA 會回傳既有帳戶的 URL。
    pub fn register_account(&self, email: &str, key: KeyPair) -> Result<Account> {
        let mut account = Account::new(email, key);
        self.register(&mut account)?;
        Ok(account)
    }

    /// 對既有的 [`Account`] 執行註冊交換。
    ///
    /// 帳戶 URL 只在尚未設定時才從 `Location` 標頭寫入。
    pub fn register(&self, account: &mut Account) -> Result<()> {
        let url = self.resolve(Directory::NEW_ACCOUNT)?;
        let payload = encode(&NewAccountPayload::new(&account.email))?;
        let response = self.post(account, Signer::Jwk, &url, Some(&payload), None)?;

        match response.location() {
            Some(location) => {
                if account.set_url(location) {
                    tracing::info!("Registered account {} at {}", account.email, location);
                }
            }
            None if !account.is_registered() => {
                return Err(AcmeError::MissingHeader {
                    url,
                    name: "Location",
                })
            }
            None => {}
        }
        Ok(())
    }

    /// 為指定域名建立新訂單。
    pub fn create_order<S: AsRef<str>>(&self, account: &Account, domains: &[S]) -> Result<Order> {
        let kid = require_kid(account)?;
        let payload = encode(&NewOrderPayload::new(domains))?;
        let url = self.resolve(Directory::NEW_ORDER)?;
        let response = self.post(account, Signer::Kid(kid), &url, Some(&payload), None)?;

        let order_url = response
            .location()
            .ok_or_else(|| AcmeError::MissingHeader {
                url: url.clone(),
                name: "Location",
            })?;
        let order = parse(order_url, Order::from_slice(order_url, &response.body))?;

        tracing::info!(
            "Created order {} for {} identifier(s)",
            order.url,
            order.identifiers.len()
        );
        Ok(order)
    }

    /// 重新取得訂單的最新快照。
    pub fn fetch_order(&self, account: &Account, url: &str) -> Result<Order> {
        let response = self.post_as_get(account, url, None)?;
        parse(url, Order::from_slice(url, &response.body))
    }

    /// 取得單一授權並推導其所有挑戰的值。
    pub fn fetch_authorization(&self, account: &Account, url: &str) -> Result<Authorization> {
        let response = self.post_as_get(account, url, None)?;
        parse(
            url,
            Authorization::from_slice(url, &response.body, account.thumbprint()),
        )
    }

    /// 依序取得訂單的每一個授權。
    ///
    /// 任何一個失敗都會中止整批，錯誤中帶有失敗的授權 URL。
    pub fn authorize(&self, account: &Account, order: &Order) -> Result<Vec<Authorization>> {
        order
            .authorizations
            .iter()
            .map(|url| {
                self.fetch_authorization(account, url)
                    .map_err(|source| AcmeError::Authorization {
                        url: url.clone(),
                        source: Box::new(source),
                    })
            })
            .collect()
    }

    /// 重新取得單一挑戰的最新快照。
    pub fn fetch_challenge(&self, account: &Account, url: &str) -> Result<Challenge> {
        let response = self.post_as_get(account, url, None)?;
        parse(
            url,
            Challenge::from_slice(&response.body, account.thumbprint()),
        )
    }

    /// 通知 CA 挑戰回應已經公開，回傳 CA 回覆的挑戰快照，不等待驗證完成。
    pub fn respond_to_challenge(
        &self,
        account: &Account,
        challenge: &Challenge,
    ) -> Result<Challenge> {
        let kid = require_kid(account)?;
        let payload = encode(&ChallengeResponsePayload::default())?;
        let response = self.post(
            account,
            Signer::Kid(kid),
            &challenge.url,
            Some(&payload),
            None,
        )?;

        tracing::info!(
            "Responded to {} challenge at {}",
            challenge.challenge_type,
            challenge.url
        );
        parse(
            &challenge.url,
            Challenge::from_slice(&response.body, account.thumbprint()),
        )
    }

    /// 以 DER 格式的 CSR 最終化訂單。
    ///
    /// 訂單狀態必須為 `ready`，否則不會送出請求。
    pub fn finalize_order(
        &self,
        account: &Account,
        order: &Order,
        csr_der: &[u8],
    ) -> Result<Order> {
        if order.status != OrderStatus::Ready {
            return Err(AcmeError::OrderNotReady {
                status: order.status,
            });
        }
        let kid = require_kid(account)?;
        let payload = encode(&FinalizeOrderPayload::new(csr_der))?;
        let response = self.post(
            account,
            Signer::Kid(kid),
            &order.finalize,
            Some(&payload),
            None,
        )?;

        let finalized = parse(&order.finalize, Order::from_slice(&order.url, &response.body))?;
        tracing::info!("Finalized order {}, now {:?}", order.url, finalized.status);
        Ok(finalized)
    }

    /// 下載訂單的 PEM 憑證鏈。
    ///
    /// 訂單狀態必須為 `valid` 且帶有憑證 URL。
    pub fn download_certificate(&self, account: &Account, order: &Order) -> Result<String> {
        let url = match (&order.status, &order.certificate) {
            (OrderStatus::Valid, Some(url)) => url,
            _ => return Err(AcmeError::OrderNotValid),
        };
        let response = self.post_as_get(account, url, Some(PEM_CERTIFICATE_CHAIN))?;

        tracing::info!("Downloaded certificate for order {}", order.url);
        Ok(response.text())
    }

    fn resolve(&self, name: &str) -> Result<String> {
        Ok(self.directory.resolve(self.transport.as_ref(), name)?)
    }

    fn post_as_get(
        &self,
        account: &Account,
        url: &str,
        accept: Option<&'static str>,
    ) -> Result<HttpResponse> {
        let kid = require_kid(account)?;
        self.post(account, Signer::Kid(kid), url, None, accept)
    }

    /// 執行一次已簽名的交換。
    ///
    /// 回應的 `Replay-Nonce` 在檢查狀態碼之前就被記錄。非 2xx 回應轉為
    /// [`AcmeError::Protocol`]。
    fn post(
        &self,
        account: &Account,
        signer: Signer<'_>,
        url: &str,
        payload: Option<&Base64>,
        accept: Option<&'static str>,
    ) -> Result<HttpResponse> {
        let mut tracker = self.nonce.lock().map_err(|_| AcmeError::LockPoisoned)?;
        let nonce = self.consume_nonce(&mut tracker)?;

        let jws = match signer {
            Signer::Jwk => Jws::sign_jwk(payload, url, account.key(), &nonce)?,
            Signer::Kid(kid) => Jws::sign_kid(payload, url, account.key(), &nonce, kid)?,
        };

        let mut request = HttpRequest::post_jose(url, jws.to_json()?.into_bytes());
        if let Some(accept) = accept {
            request = request.with_header(ACCEPT, HeaderValue::from_static(accept));
        }

        let response = self.transport.execute(request)?;
        tracker.observe(&response.headers);
        drop(tracker);

        if !response.is_success() {
            let problem = Problem::from_body(&response.body);
            tracing::warn!(
                "POST {} failed with HTTP {}{}",
                url,
                response.status,
                describe_problem(&problem)
            );
            return Err(AcmeError::Protocol {
                url: url.to_string(),
                status: response.status.as_u16(),
                problem,
            });
        }
        Ok(response)
    }

    /// 取走目前的 nonce，沒有時對 `newNonce` 發出一次 HEAD。
    ///
    /// HEAD 回應非 2xx 且沒有帶 nonce 時回傳 [`AcmeError::Protocol`]，保留狀態碼。
    fn consume_nonce(&self, tracker: &mut NonceTracker) -> Result<Nonce> {
        let new_nonce_url = self.resolve(Directory::NEW_NONCE)?;
        tracker.consume::<AcmeError, _>(&new_nonce_url, |tracker| {
            let response = self
                .transport
                .execute(HttpRequest::head(new_nonce_url.as_str()))?;
            if tracker.observe(&response.headers).is_none() && !response.is_success() {
                let problem = Problem::from_body(&response.body);
                tracing::warn!(
                    "HEAD {} failed with HTTP {}{}",
                    new_nonce_url,
                    response.status,
                    describe_problem(&problem)
                );
                return Err(AcmeError::Protocol {
                    url: new_nonce_url.clone(),
                    status: response.status.as_u16(),
                    problem,
                });
            }
            Ok(())
        })
    }
}

fn require_kid(account: &Account) -> Result<&str> {
    account.kid().ok_or(AcmeError::AccountNotRegistered)
}

fn encode<P: PayloadT>(payload: &P) -> Result<Base64> {
    payload.validate()?;
    payload
        .to_base64()
        .map_err(|err| AcmeError::Signing(JwsError::Json(err)))
}

fn parse<T>(url: &str, parsed: serde_json::Result<T>) -> Result<T> {
    parsed.map_err(|source| AcmeError::Deserialization {
        url: url.to_string(),
        source,
    })
}
