use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use fleet_errors::{FleetError, FleetResult};
use tracing::debug;

use crate::headers::RequestHeaders;

/// 通过签名与时间窗口校验的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRequest {
    pub service: String,
    /// base64 公钥，作为身份登记处的查询键
    pub identity: String,
    pub epoch: i64,
}

/// 服务端校验器，只负责时间窗口和签名数学
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    max_skew_seconds: i64,
}

impl Verifier {
    pub fn new(max_skew_seconds: i64) -> Self {
        Self { max_skew_seconds }
    }

    pub fn max_skew_seconds(&self) -> i64 {
        self.max_skew_seconds
    }

    pub fn verify(&self, headers: &RequestHeaders) -> FleetResult<VerifiedRequest> {
        self.verify_at(headers, Utc::now().timestamp())
    }

    /// 以给定的当前时间校验，窗口为闭区间 `[now - skew, now + skew]`
    pub fn verify_at(&self, headers: &RequestHeaders, now: i64) -> FleetResult<VerifiedRequest> {
        if headers.service.trim().is_empty() {
            return Err(FleetError::auth("服务名为空"));
        }

        let epoch = parse_epoch(&headers.epoch)?;
        let skew = epoch
            .checked_sub(now)
            .and_then(i64::checked_abs)
            .ok_or_else(|| FleetError::auth("时间戳超出范围"))?;
        if skew > self.max_skew_seconds {
            debug!(
                epoch,
                now,
                max_skew = self.max_skew_seconds,
                "请求时间戳超出允许窗口"
            );
            return Err(FleetError::auth(format!(
                "请求时间戳 {epoch} 超出允许窗口 ±{}s",
                self.max_skew_seconds
            )));
        }

        let public_key = decode_public_key(&headers.identity)?;
        let signature = decode_signature(&headers.signature)?;

        public_key
            .verify_strict(headers.epoch.as_bytes(), &signature)
            .map_err(|_| FleetError::auth("签名校验失败"))?;

        Ok(VerifiedRequest {
            service: headers.service.clone(),
            identity: headers.identity.clone(),
            epoch,
        })
    }
}

fn parse_epoch(raw: &str) -> FleetResult<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FleetError::auth("epoch 必须是十进制Unix秒"));
    }
    raw.parse::<i64>()
        .map_err(|_| FleetError::auth("epoch 超出范围"))
}

/// 解码 base64 公钥，用于请求校验与身份登记
pub fn decode_public_key(identity: &str) -> FleetResult<VerifyingKey> {
    let bytes = general_purpose::STANDARD
        .decode(identity)
        .map_err(|_| FleetError::auth("identity 不是有效的base64"))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| FleetError::auth("identity 长度无效"))?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| FleetError::auth("identity 不是有效的Ed25519公钥"))
}

fn decode_signature(signature: &str) -> FleetResult<Signature> {
    let bytes = general_purpose::STANDARD
        .decode(signature)
        .map_err(|_| FleetError::auth("signature 不是有效的base64"))?;
    let bytes: [u8; SIGNATURE_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| FleetError::auth("signature 长度无效"))?;
    Ok(Signature::from_bytes(&bytes))
}
