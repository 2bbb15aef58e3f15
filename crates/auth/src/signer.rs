use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use fleet_errors::{FleetError, FleetResult};
use rand::Rng;
use tracing::{info, warn};

use crate::headers::RequestHeaders;
use crate::keys::{encode_key_pair, parse_key_pair, KeySource};

/// 客户端签名器
pub struct Signer {
    service: String,
    signing_key: SigningKey,
    ephemeral: bool,
}

impl Signer {
    pub fn new(service: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            service: service.into(),
            signing_key,
            ephemeral: false,
        }
    }

    /// 临时生成密钥对；该身份无法被服务端识别为已登记的 Agent
    pub fn generate(service: impl Into<String>) -> Self {
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        rand::rng().fill(&mut seed);
        Self {
            service: service.into(),
            signing_key: SigningKey::from_bytes(&seed),
            ephemeral: true,
        }
    }

    pub fn from_source(service: impl Into<String>, source: &KeySource) -> FleetResult<Self> {
        let service = service.into();
        match source {
            KeySource::Provided(material) => Ok(Self::new(service, parse_key_pair(material)?)),
            KeySource::Environment(var) => {
                let material = std::env::var(var).map_err(|_| {
                    FleetError::config_error(format!("环境变量 {var} 未设置或不是有效的UTF-8"))
                })?;
                let signer = Self::new(service, parse_key_pair(&material)?);
                info!("已从环境变量 {} 加载Agent密钥", var);
                Ok(signer)
            }
            KeySource::Ephemeral => {
                let signer = Self::generate(service);
                warn!(
                    identity = %signer.identity(),
                    "使用临时生成的密钥对, 服务端不会将其识别为已登记身份"
                );
                Ok(signer)
            }
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// base64 编码的公钥，即 `identity` 头的值
    pub fn identity(&self) -> String {
        general_purpose::STANDARD.encode(self.public_key().as_bytes())
    }

    /// Ed25519 确定性签名
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn sign_request_at(&self, epoch_seconds: i64) -> RequestHeaders {
        let signature = self.sign(epoch_seconds.to_string().as_bytes());
        RequestHeaders::build(&self.service, &self.public_key(), epoch_seconds, &signature)
    }

    pub fn sign_request(&self) -> RequestHeaders {
        self.sign_request_at(Utc::now().timestamp())
    }

    /// 导出 `b64pub:b64priv`，可写入 `FLEET_SVC_KEY`
    pub fn export_key_pair(&self) -> String {
        encode_key_pair(&self.signing_key)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("service", &self.service)
            .field("identity", &self.identity())
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}
