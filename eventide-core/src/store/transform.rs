//! 载荷编解码钩子：压缩与加密
//!
//! 两者都以 JSON 值进、JSON 值出；默认实现输出 base64 文本，
//! 因此编码后的记录仍可原样 JSON 导出。
//!
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};

/// 可插拔的载荷变换
pub trait PayloadCodec: Send + Sync {
    fn encode(&self, data: &Value) -> anyhow::Result<Value>;

    fn decode(&self, data: &Value) -> anyhow::Result<Value>;
}

fn encoded_text(data: &Value) -> anyhow::Result<&str> {
    data.as_str()
        .ok_or_else(|| anyhow::anyhow!("encoded payload must be a string"))
}

/// gzip + base64
#[derive(Debug, Clone, Default)]
pub struct GzipCodec {
    level: Compression,
}

impl GzipCodec {
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl PayloadCodec for GzipCodec {
    fn encode(&self, data: &Value) -> anyhow::Result<Value> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        serde_json::to_writer(&mut encoder, data)?;
        encoder.flush()?;
        let bytes = encoder.finish()?;
        Ok(Value::String(STANDARD.encode(bytes)))
    }

    fn decode(&self, data: &Value) -> anyhow::Result<Value> {
        let bytes = STANDARD.decode(encoded_text(data)?)?;
        let mut json = String::new();
        GzDecoder::new(bytes.as_slice()).read_to_string(&mut json)?;
        Ok(serde_json::from_str(&json)?)
    }
}

const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305，密钥取口令的 SHA-256；输出 base64(nonce || ciphertext)
#[derive(Clone)]
pub struct ChaChaCipher {
    cipher: ChaCha20Poly1305,
}

impl ChaChaCipher {
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(passphrase.as_bytes()).into();
        Self {
            cipher: ChaCha20Poly1305::new(&key.into()),
        }
    }
}

impl fmt::Debug for ChaChaCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChaChaCipher(..)")
    }
}

impl PayloadCodec for ChaChaCipher {
    fn encode(&self, data: &Value) -> anyhow::Result<Value> {
        let plaintext = serde_json::to_vec(data)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        chacha20poly1305::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| anyhow::anyhow!("encryption failed"))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(Value::String(STANDARD.encode(combined)))
    }

    fn decode(&self, data: &Value) -> anyhow::Result<Value> {
        let combined = STANDARD.decode(encoded_text(data)?)?;
        if combined.len() < NONCE_LEN {
            anyhow::bail!("ciphertext shorter than nonce");
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow::anyhow!("decryption failed"))?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
