//! # imgsig 署名・検証ケイパビリティ
//!
//! ペイロードへの署名と署名検証を抽象化するトレイトと、その具象実装を提供する。
//! 署名アルゴリズムの演算そのものは `ed25519-dalek` / `p256` に委譲する。
//!
//! ## 署名アルゴリズム
//! | 鍵種別 | アルゴリズム | 署名形式 |
//! |--------|------------|---------|
//! | `ed25519` | Ed25519 | 64バイト（生） |
//! | `ecdsa-p256` | ECDSA P-256 + SHA-256 | ASN.1 DER |
//!
//! ダイジェスト計算には SHA-256 を使用する。

pub mod keys;

use sha2::{Digest, Sha256};

pub use keys::ecdsa_p256::{EcdsaP256Signer, EcdsaP256Verifier};
pub use keys::ed25519::{Ed25519Signer, Ed25519Verifier};
pub use keys::{KeyAlgorithm, PrivateKey, PublicKey};

/// ケイパビリティが返すエラー。具象実装ごとに任意のエラー型を包める。
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 署名の形式が不正（長さ・DERエンコーディング）
    #[error("署名の形式が不正です: {0}")]
    MalformedSignature(String),
    /// 署名検証エラー
    #[error("署名検証に失敗しました")]
    SignatureVerifyError,
    /// 鍵のデコードエラー
    #[error("鍵のデコードに失敗しました: {0}")]
    InvalidKey(String),
    /// 未対応の鍵種別
    #[error("未対応の鍵種別: {0}")]
    UnsupportedAlgorithm(String),
}

/// ペイロードに署名するケイパビリティ。
///
/// ローカル鍵、リモートKMS、ハードウェアトークン等、鍵の保管方法を問わず実装できる。
/// 決定的な署名であることは要求しない。
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// ペイロードのバイト列に署名し、署名バイト列を返す。
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CapabilityError>;
}

/// 署名を検証するケイパビリティ。
///
/// 署名がペイロードのバイト列そのものを認証しない場合は必ずエラーを返すこと。
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    /// ペイロードと署名の組を検証する。成功時は `Ok(())`。
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), CapabilityError>;
}

#[async_trait::async_trait]
impl<S: Signer + ?Sized> Signer for std::sync::Arc<S> {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        (**self).sign(payload).await
    }
}

#[async_trait::async_trait]
impl<V: Verifier + ?Sized> Verifier for std::sync::Arc<V> {
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), CapabilityError> {
        (**self).verify(payload, signature).await
    }
}

/// SHA-256ハッシュ計算。
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// コンテンツダイジェストを `sha256:<hex>` 形式で返す。
pub fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(sha256(data)))
}
