//! # Ed25519 署名・検証
//!
//! 署名は64バイトの生バイト列。検証には `verify_strict` を用い、
//! 小位数成分を含む公開鍵や非正規な署名を拒否する。

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};

use crate::{CapabilityError, CryptoError, Signer, Verifier};

/// Ed25519秘密鍵による署名ケイパビリティ。
#[derive(Clone)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

// 秘密鍵をログに出さない
impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("signing_key", &"***SECRET***")
            .finish()
    }
}

impl Ed25519Signer {
    /// 既存の秘密鍵から構築する。
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// OS乱数から秘密鍵を生成する。
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// 32バイトの秘密鍵から構築する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Ed25519秘密鍵は32バイトである必要があります (実際: {})",
                bytes.len()
            ))
        })?;
        Ok(Self::new(SigningKey::from_bytes(&bytes)))
    }

    /// 秘密鍵のバイト列
    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// 対応する検証ケイパビリティを返す。
    pub fn verifier(&self) -> Ed25519Verifier {
        Ed25519Verifier::new(self.signing_key.verifying_key())
    }
}

#[async_trait::async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        Ok(self.signing_key.sign(payload).to_bytes().to_vec())
    }
}

/// Ed25519公開鍵による検証ケイパビリティ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519Verifier {
    verifying_key: VerifyingKey,
}

impl Ed25519Verifier {
    /// 既存の公開鍵から構築する。
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// 32バイトの公開鍵から構築する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Ed25519公開鍵は32バイトである必要があります (実際: {})",
                bytes.len()
            ))
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("Ed25519公開鍵が不正です: {e}")))?;
        Ok(Self::new(verifying_key))
    }

    /// 公開鍵のバイト列
    pub fn to_bytes(&self) -> Vec<u8> {
        self.verifying_key.to_bytes().to_vec()
    }
}

#[async_trait::async_trait]
impl Verifier for Ed25519Verifier {
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), CapabilityError> {
        let signature = Signature::from_slice(signature)
            .map_err(|_| CryptoError::MalformedSignature(format!(
                "Ed25519署名は64バイトである必要があります (実際: {})",
                signature.len()
            )))?;
        self.verifying_key
            .verify_strict(payload, &signature)
            .map_err(|_| CryptoError::SignatureVerifyError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 署名→検証のラウンドトリップテスト
    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let signer = Ed25519Signer::generate();
        let signature = signer.sign(b"imgsig test message").await.unwrap();
        assert_eq!(signature.len(), 64);

        assert!(signer
            .verifier()
            .verify(b"imgsig test message", &signature)
            .await
            .is_ok());
    }

    /// 不正なメッセージで署名検証が失敗することを確認
    #[tokio::test]
    async fn test_sign_verify_wrong_message() {
        let signer = Ed25519Signer::generate();
        let signature = signer.sign(b"correct message").await.unwrap();

        let err = signer
            .verifier()
            .verify(b"wrong message", &signature)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CryptoError>(),
            Some(CryptoError::SignatureVerifyError)
        ));
    }

    /// 長さの不正な署名が形式エラーになることを確認
    #[tokio::test]
    async fn test_malformed_signature() {
        let signer = Ed25519Signer::generate();
        let err = signer
            .verifier()
            .verify(b"message", &[0u8; 10])
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CryptoError>(),
            Some(CryptoError::MalformedSignature(_))
        ));
    }

    /// 同じ秘密鍵バイト列から同じ公開鍵が得られることを確認
    #[test]
    fn test_from_bytes() {
        let signer = Ed25519Signer::generate();
        let restored = Ed25519Signer::from_bytes(&signer.to_bytes()).unwrap();
        assert_eq!(restored.verifier(), signer.verifier());

        assert!(Ed25519Signer::from_bytes(&[0u8; 31]).is_err());
        assert!(Ed25519Verifier::from_bytes(&[0u8; 33]).is_err());
    }
}
