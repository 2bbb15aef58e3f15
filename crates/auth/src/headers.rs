use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use fleet_errors::{FleetError, FleetResult};
use serde::{Deserialize, Serialize};

pub const HEADER_SERVICE: &str = "service";
pub const HEADER_IDENTITY: &str = "identity";
pub const HEADER_EPOCH: &str = "epoch";
pub const HEADER_SIGNATURE: &str = "signature";

/// 签名请求头集合，与传输层无关
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeaders {
    pub service: String,
    /// base64 编码的 Ed25519 公钥
    pub identity: String,
    /// 十进制 Unix 秒，即被签名的原文
    pub epoch: String,
    /// base64 编码的签名
    pub signature: String,
}

impl RequestHeaders {
    pub fn build(
        service: &str,
        public_key: &VerifyingKey,
        epoch_seconds: i64,
        signature: &Signature,
    ) -> Self {
        Self {
            service: service.to_string(),
            identity: general_purpose::STANDARD.encode(public_key.as_bytes()),
            epoch: epoch_seconds.to_string(),
            signature: general_purpose::STANDARD.encode(signature.to_bytes()),
        }
    }

    pub fn to_pairs(&self) -> [(&'static str, &str); 4] {
        [
            (HEADER_SERVICE, self.service.as_str()),
            (HEADER_IDENTITY, self.identity.as_str()),
            (HEADER_EPOCH, self.epoch.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }

    /// 从任意键值对中提取四个认证头，键名大小写不敏感，未知键忽略
    pub fn from_pairs<'a, I>(pairs: I) -> FleetResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut service = None;
        let mut identity = None;
        let mut epoch = None;
        let mut signature = None;

        for (key, value) in pairs {
            let slot = match key.to_ascii_lowercase().as_str() {
                HEADER_SERVICE => &mut service,
                HEADER_IDENTITY => &mut identity,
                HEADER_EPOCH => &mut epoch,
                HEADER_SIGNATURE => &mut signature,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }

        let require = |value: Option<String>, name: &str| {
            value.ok_or_else(|| FleetError::auth(format!("缺少请求头: {name}")))
        };

        Ok(Self {
            service: require(service, HEADER_SERVICE)?,
            identity: require(identity, HEADER_IDENTITY)?,
            epoch: require(epoch, HEADER_EPOCH)?,
            signature: require(signature, HEADER_SIGNATURE)?,
        })
    }
}
