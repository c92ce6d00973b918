//! 비공개 엔드포인트 요청 서명.
//!
//! 서명은 입력(파라미터, 타임스탬프, 수신 윈도우)의 순수 함수입니다.
//! 타임스탬프가 매번 바뀌므로 결과를 재사용하지 않고 시도마다 새로 만듭니다.

use crate::error::ExchangeError;
use crate::traits::ExchangeResult;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// 서명된 요청 (한 번의 시도에만 유효).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// 서명 대상 쿼리 문자열 (타임스탬프, 수신 윈도우 포함)
    pub query: String,
    /// 16진수 서명
    pub signature: String,
    /// 서명에 사용된 타임스탬프
    pub timestamp_ms: i64,
}

impl SignedRequest {
    /// 전송용 쿼리 문자열 (`query&signature=...`).
    pub fn encode(&self) -> String {
        if self.query.is_empty() {
            format!("signature={}", self.signature)
        } else {
            format!("{}&signature={}", self.query, self.signature)
        }
    }
}

/// 요청 서명기.
pub trait RequestSigner: Send + Sync {
    /// 파라미터와 타임스탬프로 서명된 요청을 만듭니다.
    fn sign(&self, params: &[(&str, String)], timestamp_ms: i64) -> ExchangeResult<SignedRequest>;
}

/// 파라미터에서 쿼리 문자열 생성 (입력 순서 유지).
pub fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 서명기 (Binance 방식).
///
/// 파라미터 뒤에 `recvWindow`, `timestamp`를 붙인 쿼리 문자열 전체를
/// 계정 시크릿으로 서명합니다.
pub struct HmacSha256Signer {
    secret: SecretString,
    recv_window_ms: u64,
}

impl HmacSha256Signer {
    /// 새 서명기를 생성합니다.
    pub fn new(secret: SecretString, recv_window_ms: u64) -> Self {
        Self {
            secret,
            recv_window_ms,
        }
    }

    /// 수신 윈도우 (밀리초).
    pub fn recv_window_ms(&self) -> u64 {
        self.recv_window_ms
    }

    fn hmac_hex(&self, payload: &str) -> ExchangeResult<String> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(ExchangeError::Configuration(
                "API secret is not configured".to_string(),
            ));
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ExchangeError::Configuration(format!("invalid API secret: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for HmacSha256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSha256Signer")
            .field("secret", &"***REDACTED***")
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}

impl RequestSigner for HmacSha256Signer {
    fn sign(&self, params: &[(&str, String)], timestamp_ms: i64) -> ExchangeResult<SignedRequest> {
        let mut all_params = params.to_vec();
        all_params.push(("recvWindow", self.recv_window_ms.to_string()));
        all_params.push(("timestamp", timestamp_ms.to_string()));

        let query = build_query(&all_params);
        let signature = self.hmac_hex(&query)?;

        Ok(SignedRequest {
            query,
            signature,
            timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_signer() -> HmacSha256Signer {
        HmacSha256Signer::new(
            SecretString::from(
                "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".to_string(),
            ),
            5000,
        )
    }

    #[test]
    fn test_sign_matches_reference_vector() {
        let params = vec![
            ("symbol", "LTCBTC".to_string()),
            ("side", "BUY".to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", "1".to_string()),
            ("price", "0.1".to_string()),
        ];

        let signed = doc_signer().sign(&params, 1499827319559).unwrap();
        assert_eq!(
            signed.query,
            "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559"
        );
        assert_eq!(
            signed.signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
        assert!(signed.encode().ends_with(
            "&signature=c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        ));
    }

    #[test]
    fn test_signature_changes_with_timestamp() {
        let signer = doc_signer();
        let params = vec![("symbol", "BTCUSDT".to_string())];
        let a = signer.sign(&params, 1_000).unwrap();
        let b = signer.sign(&params, 1_001).unwrap();
        assert_ne!(a.signature, b.signature);
        assert_eq!(signer.sign(&params, 1_000).unwrap(), a);
    }

    #[test]
    fn test_empty_secret_is_configuration_error() {
        let signer = HmacSha256Signer::new(SecretString::from(String::new()), 5000);
        let err = signer.sign(&[], 1).unwrap_err();
        assert!(matches!(err, ExchangeError::Configuration(_)));
        assert!(!format!("{:?}", doc_signer()).contains("NhqPtmdS"));
    }
}
