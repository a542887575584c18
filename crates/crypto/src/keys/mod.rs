//! # 署名鍵・検証鍵
//!
//! 鍵種別ごとの [`Signer`] / [`Verifier`] 実装と、鍵種別をまとめて扱う列挙型を提供する。
//! 各鍵種別はサブモジュールとして配置される。
//!
//! ## 対応鍵種別
//!
//! | 鍵種別 | サブモジュール | 秘密鍵 | 公開鍵 |
//! |--------|--------------|--------|--------|
//! | `ed25519` | [`ed25519`] | 32バイト | 32バイト |
//! | `ecdsa-p256` | [`ecdsa_p256`] | 32バイト スカラー | SEC1 圧縮点 (33バイト) |
//!
//! ## 鍵ファイル形式
//! `<鍵種別>:<hex>` の1行テキスト。例: `ed25519:9d61b19d...`

pub mod ecdsa_p256;
pub mod ed25519;

use std::fmt;
use std::str::FromStr;

use crate::{CapabilityError, CryptoError, Signer, Verifier};

use self::ecdsa_p256::{EcdsaP256Signer, EcdsaP256Verifier};
use self::ed25519::{Ed25519Signer, Ed25519Verifier};

/// 鍵種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyAlgorithm {
    /// Ed25519
    #[default]
    Ed25519,
    /// ECDSA P-256 (SHA-256)
    EcdsaP256,
}

impl KeyAlgorithm {
    /// 鍵ファイルやコマンドライン引数で使う識別子。
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::EcdsaP256 => "ecdsa-p256",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "ecdsa-p256" => Ok(KeyAlgorithm::EcdsaP256),
            other => Err(CryptoError::UnsupportedAlgorithm(other.into())),
        }
    }
}

/// 鍵ファイルの1行を `(鍵種別, 鍵バイト列)` に分解する。
fn decode_key_file(text: &str) -> Result<(KeyAlgorithm, Vec<u8>), CryptoError> {
    let (algorithm, encoded) = text
        .trim()
        .split_once(':')
        .ok_or_else(|| CryptoError::InvalidKey("`<鍵種別>:<hex>` 形式ではありません".into()))?;
    let algorithm: KeyAlgorithm = algorithm.parse()?;
    let bytes = hex::decode(encoded)
        .map_err(|e| CryptoError::InvalidKey(format!("hexデコードに失敗: {e}")))?;
    Ok((algorithm, bytes))
}

/// 署名用の秘密鍵。鍵種別を問わず [`Signer`] として使える。
#[derive(Debug, Clone)]
pub enum PrivateKey {
    /// Ed25519秘密鍵
    Ed25519(Ed25519Signer),
    /// ECDSA P-256秘密鍵
    EcdsaP256(EcdsaP256Signer),
}

impl PrivateKey {
    /// 指定した鍵種別の秘密鍵をOS乱数から生成する。
    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => PrivateKey::Ed25519(Ed25519Signer::generate()),
            KeyAlgorithm::EcdsaP256 => PrivateKey::EcdsaP256(EcdsaP256Signer::generate()),
        }
    }

    /// 鍵種別
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PrivateKey::EcdsaP256(_) => KeyAlgorithm::EcdsaP256,
        }
    }

    /// 対応する公開鍵を返す。
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(signer) => PublicKey::Ed25519(signer.verifier()),
            PrivateKey::EcdsaP256(signer) => PublicKey::EcdsaP256(signer.verifier()),
        }
    }

    /// 鍵ファイル形式（`<鍵種別>:<hex>`）にエンコードする。
    pub fn to_key_file(&self) -> String {
        let bytes = match self {
            PrivateKey::Ed25519(signer) => signer.to_bytes(),
            PrivateKey::EcdsaP256(signer) => signer.to_bytes(),
        };
        format!("{}:{}", self.algorithm(), hex::encode(bytes))
    }

    /// 鍵ファイル形式からデコードする。
    pub fn from_key_file(text: &str) -> Result<Self, CryptoError> {
        let (algorithm, bytes) = decode_key_file(text)?;
        match algorithm {
            KeyAlgorithm::Ed25519 => Ed25519Signer::from_bytes(&bytes).map(PrivateKey::Ed25519),
            KeyAlgorithm::EcdsaP256 => {
                EcdsaP256Signer::from_bytes(&bytes).map(PrivateKey::EcdsaP256)
            }
        }
    }
}

#[async_trait::async_trait]
impl Signer for PrivateKey {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        match self {
            PrivateKey::Ed25519(signer) => signer.sign(payload).await,
            PrivateKey::EcdsaP256(signer) => signer.sign(payload).await,
        }
    }
}

/// 検証用の公開鍵。鍵種別を問わず [`Verifier`] として使える。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// Ed25519公開鍵
    Ed25519(Ed25519Verifier),
    /// ECDSA P-256公開鍵
    EcdsaP256(EcdsaP256Verifier),
}

impl PublicKey {
    /// 鍵種別
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            PublicKey::EcdsaP256(_) => KeyAlgorithm::EcdsaP256,
        }
    }

    /// 鍵ファイル形式（`<鍵種別>:<hex>`）にエンコードする。
    pub fn to_key_file(&self) -> String {
        let bytes = match self {
            PublicKey::Ed25519(verifier) => verifier.to_bytes(),
            PublicKey::EcdsaP256(verifier) => verifier.to_bytes(),
        };
        format!("{}:{}", self.algorithm(), hex::encode(bytes))
    }

    /// 鍵ファイル形式からデコードする。
    pub fn from_key_file(text: &str) -> Result<Self, CryptoError> {
        let (algorithm, bytes) = decode_key_file(text)?;
        match algorithm {
            KeyAlgorithm::Ed25519 => Ed25519Verifier::from_bytes(&bytes).map(PublicKey::Ed25519),
            KeyAlgorithm::EcdsaP256 => {
                EcdsaP256Verifier::from_bytes(&bytes).map(PublicKey::EcdsaP256)
            }
        }
    }
}

#[async_trait::async_trait]
impl Verifier for PublicKey {
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), CapabilityError> {
        match self {
            PublicKey::Ed25519(verifier) => verifier.verify(payload, signature).await,
            PublicKey::EcdsaP256(verifier) => verifier.verify(payload, signature).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 鍵種別の文字列表現の往復を確認
    #[test]
    fn test_key_algorithm_names() {
        for algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::EcdsaP256] {
            assert_eq!(algorithm.as_str().parse::<KeyAlgorithm>().unwrap(), algorithm);
        }
        assert!(matches!(
            "rsa-2048".parse::<KeyAlgorithm>(),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    /// 鍵ファイルに書き出した鍵で署名・検証できることを両鍵種別で確認
    #[tokio::test]
    async fn test_key_file_roundtrip() {
        for algorithm in [KeyAlgorithm::Ed25519, KeyAlgorithm::EcdsaP256] {
            let key = PrivateKey::generate(algorithm);
            let private_text = key.to_key_file();
            let public_text = key.public_key().to_key_file();
            assert!(private_text.starts_with(&format!("{algorithm}:")));

            let key = PrivateKey::from_key_file(&format!("{private_text}\n")).unwrap();
            let public = PublicKey::from_key_file(&public_text).unwrap();
            assert_eq!(public, key.public_key());

            let signature = key.sign(b"payload").await.unwrap();
            assert!(public.verify(b"payload", &signature).await.is_ok());
            assert!(public.verify(b"other", &signature).await.is_err());
        }
    }

    /// 鍵種別の異なる公開鍵では検証できないことを確認
    #[tokio::test]
    async fn test_cross_algorithm_rejected() {
        let ed = PrivateKey::generate(KeyAlgorithm::Ed25519);
        let p256_key = PrivateKey::generate(KeyAlgorithm::EcdsaP256);

        let signature = ed.sign(b"payload").await.unwrap();
        assert!(p256_key.public_key().verify(b"payload", &signature).await.is_err());
    }

    /// 不正な鍵ファイルが拒否されることを確認
    #[test]
    fn test_invalid_key_files() {
        assert!(matches!(
            PrivateKey::from_key_file("no-separator"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            PrivateKey::from_key_file("ed25519:zz"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            PrivateKey::from_key_file("ed25519:0011"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            PublicKey::from_key_file("dsa:0011"),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }
}
