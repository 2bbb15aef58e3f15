//! 请求认证协议
//!
//! Agent 使用 Ed25519 私钥对当前 Unix 秒级时间戳的十进制字符串签名，
//! 通过 `service` / `identity` / `epoch` / `signature` 四个头部携带到服务端。
//! 服务端校验时间窗口与签名；公钥是否属于该服务由身份登记处负责。

pub mod headers;
pub mod keys;
pub mod signer;
pub mod verifier;

pub use headers::{
    RequestHeaders, HEADER_EPOCH, HEADER_IDENTITY, HEADER_SERVICE, HEADER_SIGNATURE,
};
pub use keys::{encode_key_pair, parse_key_pair, KeySource};
pub use signer::Signer;
pub use verifier::{decode_public_key, VerifiedRequest, Verifier};
