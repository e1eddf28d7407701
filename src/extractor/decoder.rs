//! 直链混淆解码。
//!
//! 站点的内部接口不直接返回文件直链，而是返回 base64 包装的 XOR 密文，
//! 密钥按小时桶（floor(timestamp/3600)）派生，时间戳随响应一并下发。
//! 这只是反爬混淆而非真正的加密，解码是一个无副作用的纯函数。

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 token: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded url is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// 用时间戳派生的小时桶密钥对 token 做循环 XOR，还原明文 URL。
pub fn decrypt_url(encrypted_b64: &str, timestamp: i64) -> Result<String, DecodeError> {
    let raw = BASE64.decode(encrypted_b64)?;
    let plain = xor_with_key(&raw, &derive_key(timestamp));
    Ok(String::from_utf8(plain)?)
}

fn derive_key(timestamp: i64) -> String {
    format!("SECRET_KEY_{}", timestamp.div_euclid(3600))
}

fn xor_with_key(data: &[u8], key: &str) -> Vec<u8> {
    let key = key.as_bytes();
    data.iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % key.len()])
        .collect()
}
