use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use fleet_errors::{FleetError, FleetResult};

/// Agent 密钥来源，显式区分三种路径，不做隐式回退
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// `b64pub:b64priv` 形式的密钥材料
    Provided(String),
    /// 从指定环境变量读取 `b64pub:b64priv`
    Environment(String),
    /// 临时生成的密钥对
    Ephemeral,
}

impl KeySource {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, KeySource::Ephemeral)
    }
}

/// 解析 `b64pub:b64priv`
///
/// 私钥可以是 32 字节种子，也可以是 64 字节的 `seed || pubkey` 形式。
pub fn parse_key_pair(material: &str) -> FleetResult<SigningKey> {
    let parts: Vec<&str> = material.trim().split(':').collect();
    if parts.len() != 2 {
        return Err(FleetError::config_error(
            "密钥格式无效, 期望 b64PubKey:b64PrivKey",
        ));
    }

    let public = general_purpose::STANDARD
        .decode(parts[0])
        .map_err(|e| FleetError::config_error(format!("公钥不是有效的base64: {e}")))?;
    let private = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|e| FleetError::config_error(format!("私钥不是有效的base64: {e}")))?;

    let public: [u8; PUBLIC_KEY_LENGTH] = public
        .as_slice()
        .try_into()
        .map_err(|_| FleetError::config_error(format!("公钥长度必须为 {PUBLIC_KEY_LENGTH} 字节")))?;
    let public = VerifyingKey::from_bytes(&public)
        .map_err(|e| FleetError::config_error(format!("公钥无效: {e}")))?;

    let seed: [u8; SECRET_KEY_LENGTH] = match private.len() {
        SECRET_KEY_LENGTH => private.as_slice().try_into().map_err(|_| {
            FleetError::config_error("私钥长度无效")
        })?,
        64 => {
            if private[SECRET_KEY_LENGTH..] != public.as_bytes()[..] {
                return Err(FleetError::config_error("私钥中内嵌的公钥与公钥不一致"));
            }
            private[..SECRET_KEY_LENGTH]
                .try_into()
                .map_err(|_| FleetError::config_error("私钥长度无效"))?
        }
        n => {
            return Err(FleetError::config_error(format!(
                "私钥长度必须为 32 或 64 字节, 实际 {n}"
            )))
        }
    };

    let signing_key = SigningKey::from_bytes(&seed);
    if signing_key.verifying_key() != public {
        return Err(FleetError::config_error("公钥与私钥不匹配"));
    }

    Ok(signing_key)
}

/// 导出为 `b64pub:b64priv`，私钥使用 64 字节 keypair 形式
pub fn encode_key_pair(signing_key: &SigningKey) -> String {
    format!(
        "{}:{}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes()),
        general_purpose::STANDARD.encode(signing_key.to_keypair_bytes())
    )
}
