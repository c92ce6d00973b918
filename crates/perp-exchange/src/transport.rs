//! 재시도하는 REST 전송 계층.
//!
//! 논리 작업 하나를 최대 N번의 순차적 시도로 실행합니다. 서명 요청은
//! 시도마다 새 타임스탬프와 새 서명으로 다시 만들어집니다. 이전 시도의
//! 서명을 재전송하면 네트워크 장애가 일시적이었더라도 거래소가 거부합니다.
//!
//! 시도 결과 처리:
//! - 성공: 응답 본문을 역직렬화해 반환
//! - 재시도 불가 에러 (잔고 부족, 인증 실패 등): 즉시 반환
//! - 시계 오차 거부: 시계 재동기화 후 대기 없이 재시도
//! - 기타 일시적 에러: 백오프 후 재시도
//! - 마지막 시도 실패: `RetriesExhausted`로 원본 에러를 감싸 반환

use crate::clock::ClockSync;
use crate::error::ExchangeError;
use crate::retry::{CallOptions, RetryConfig};
use crate::signer::{build_query, RequestSigner};
use crate::traits::ExchangeResult;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// HTTP 실패 응답(상태 코드, 본문)을 거래소 에러로 변환하는 함수.
pub type ErrorDecoder = fn(u16, &str) -> ExchangeError;

/// 요청 인증 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// 공개 엔드포인트
    Public,
    /// 서명 필요 (API 키 헤더 + 서명)
    Signed,
}

struct Credentials {
    header: &'static str,
    api_key: String,
    signer: Arc<dyn RequestSigner>,
}

/// 재시도하는 REST 전송 계층.
pub struct RestTransport {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    clock: ClockSync,
    retry: RetryConfig,
    decode_error: ErrorDecoder,
}

impl fmt::Debug for RestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestTransport")
            .field("base_url", &self.base_url)
            .field("has_credentials", &self.has_credentials())
            .field("retry", &self.retry)
            .finish()
    }
}

impl RestTransport {
    /// 공개 요청만 가능한 전송 계층을 생성합니다.
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        clock: ClockSync,
        retry: RetryConfig,
        decode_error: ErrorDecoder,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            clock,
            retry,
            decode_error,
        }
    }

    /// 서명 요청에 사용할 자격증명을 설정합니다.
    pub fn with_credentials(
        mut self,
        header: &'static str,
        api_key: impl Into<String>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        self.credentials = Some(Credentials {
            header,
            api_key: api_key.into(),
            signer,
        });
        self
    }

    /// 서명 요청이 가능한지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| !c.api_key.is_empty())
    }

    /// 시계 동기화기.
    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    /// 재시도 설정.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// 공개 GET 요청.
    pub async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        options: CallOptions,
    ) -> ExchangeResult<T> {
        self.request(Method::GET, endpoint, params, Auth::Public, options)
            .await
    }

    /// 서명된 GET 요청.
    pub async fn signed_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        options: CallOptions,
    ) -> ExchangeResult<T> {
        self.request(Method::GET, endpoint, params, Auth::Signed, options)
            .await
    }

    /// 서명된 POST 요청.
    pub async fn signed_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        options: CallOptions,
    ) -> ExchangeResult<T> {
        self.request(Method::POST, endpoint, params, Auth::Signed, options)
            .await
    }

    /// 서명된 DELETE 요청.
    pub async fn signed_delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        options: CallOptions,
    ) -> ExchangeResult<T> {
        self.request(Method::DELETE, endpoint, params, Auth::Signed, options)
            .await
    }

    /// 재시도 정책에 따라 요청을 실행합니다.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
        auth: Auth,
        options: CallOptions,
    ) -> ExchangeResult<T> {
        let max_attempts = self.retry.attempts(&options);
        let mut attempt = 1;

        loop {
            let err = match self.attempt(&method, endpoint, params, auth, attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(%method, endpoint, attempt, error = %err, "Request failed (not retryable)");
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(%method, endpoint, attempts = attempt, error = %err, "Request failed, retries exhausted");
                return Err(ExchangeError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            if err.is_clock_drift() {
                warn!(endpoint, attempt, error = %err, "Clock drift rejected request, resyncing");
                if let Err(sync_err) = self.clock.sync().await {
                    warn!(error = %sync_err, "Clock resync failed before retry");
                }
            } else {
                let delay = self.retry.backoff_for(attempt);
                warn!(
                    endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            attempt += 1;
        }
    }

    /// 단일 시도. 서명 요청은 여기서 매번 새로 만듭니다.
    async fn attempt<T: DeserializeOwned>(
        &self,
        method: &Method,
        endpoint: &str,
        params: &[(&str, String)],
        auth: Auth,
        attempt: u32,
    ) -> ExchangeResult<T> {
        let request = match auth {
            Auth::Public => self.build_public(method, endpoint, params),
            Auth::Signed => self.build_signed(method, endpoint, params).await?,
        };

        let timeout = self.retry.timeout_for(attempt);
        debug!(%method, endpoint, attempt, timeout_ms = timeout.as_millis() as u64, "Sending request");

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, ExchangeError>((status, body))
        };

        let (status, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| {
                ExchangeError::Timeout(format!(
                    "{} {} exceeded {}ms",
                    method,
                    endpoint,
                    timeout.as_millis()
                ))
            })??;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!(endpoint, error = %e, body = %body, "Failed to parse response");
                ExchangeError::ParseError(e.to_string())
            })
        } else {
            Err((self.decode_error)(status.as_u16(), &body))
        }
    }

    fn build_public(&self, method: &Method, endpoint: &str, params: &[(&str, String)]) -> RequestBuilder {
        let query = build_query(params);
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query)
        };
        self.client.request(method.clone(), url)
    }

    async fn build_signed(
        &self,
        method: &Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<RequestBuilder> {
        let credentials = self
            .credentials
            .as_ref()
            .filter(|c| !c.api_key.is_empty())
            .ok_or_else(|| {
                ExchangeError::Configuration(format!(
                    "API credentials are required for {}",
                    endpoint
                ))
            })?;

        self.clock.ensure_synced().await?;
        let signed = credentials.signer.sign(params, self.clock.now_ms())?;
        let url = format!("{}{}", self.base_url, endpoint);

        let builder = if *method == Method::POST || *method == Method::PUT {
            self.client
                .request(method.clone(), url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(signed.encode())
        } else {
            self.client
                .request(method.clone(), format!("{}?{}", url, signed.encode()))
        };

        Ok(builder.header(credentials.header, &credentials.api_key))
    }
}
