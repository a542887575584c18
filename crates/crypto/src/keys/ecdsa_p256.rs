//! # ECDSA P-256 署名・検証
//!
//! ECDSA P-256 + SHA-256。署名はASN.1 DERエンコーディングで受け渡す。
//! 公開鍵はSEC1圧縮形式（33バイト）で保存する。

use p256::ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::{CapabilityError, CryptoError, Signer, Verifier};

/// ECDSA P-256秘密鍵による署名ケイパビリティ。
#[derive(Clone)]
pub struct EcdsaP256Signer {
    signing_key: SigningKey,
}

impl std::fmt::Debug for EcdsaP256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaP256Signer")
            .field("signing_key", &"***SECRET***")
            .finish()
    }
}

impl EcdsaP256Signer {
    /// 既存の秘密鍵から構築する。
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// OS乱数から秘密鍵を生成する。
    pub fn generate() -> Self {
        Self::new(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// 32バイトのスカラー値から構築する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("P-256秘密鍵が不正です: {e}")))?;
        Ok(Self::new(signing_key))
    }

    /// 秘密鍵のバイト列（32バイト）
    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// 対応する検証ケイパビリティを返す。
    pub fn verifier(&self) -> EcdsaP256Verifier {
        EcdsaP256Verifier::new(self.signing_key.verifying_key().clone())
    }
}

#[async_trait::async_trait]
impl Signer for EcdsaP256Signer {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        let signature: Signature = self.signing_key.sign(payload);
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

/// ECDSA P-256公開鍵による検証ケイパビリティ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaP256Verifier {
    verifying_key: VerifyingKey,
}

impl EcdsaP256Verifier {
    /// 既存の公開鍵から構築する。
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// SEC1エンコードされた公開鍵（圧縮・非圧縮どちらも可）から構築する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying_key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("P-256公開鍵が不正です: {e}")))?;
        Ok(Self::new(verifying_key))
    }

    /// SEC1圧縮形式の公開鍵バイト列
    pub fn to_bytes(&self) -> Vec<u8> {
        self.verifying_key.to_encoded_point(true).as_bytes().to_vec()
    }
}

#[async_trait::async_trait]
impl Verifier for EcdsaP256Verifier {
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<(), CapabilityError> {
        let signature = Signature::from_der(signature)
            .map_err(|e| CryptoError::MalformedSignature(format!("DER署名のパースに失敗: {e}")))?;
        self.verifying_key
            .verify(payload, &signature)
            .map_err(|_| CryptoError::SignatureVerifyError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 署名→検証のラウンドトリップテスト（DER形式であることも確認）
    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let signer = EcdsaP256Signer::generate();
        let signature = signer.sign(b"imgsig test message").await.unwrap();
        // DER SEQUENCE
        assert_eq!(signature[0], 0x30);

        assert!(signer
            .verifier()
            .verify(b"imgsig test message", &signature)
            .await
            .is_ok());
    }

    /// 別の鍵の公開鍵では検証に失敗することを確認
    #[tokio::test]
    async fn test_wrong_key() {
        let signer = EcdsaP256Signer::generate();
        let other = EcdsaP256Signer::generate();
        let signature = signer.sign(b"message").await.unwrap();

        let err = other.verifier().verify(b"message", &signature).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CryptoError>(),
            Some(CryptoError::SignatureVerifyError)
        ));
    }

    /// DERでない署名が形式エラーになることを確認
    #[tokio::test]
    async fn test_malformed_signature() {
        let signer = EcdsaP256Signer::generate();
        let err = signer
            .verifier()
            .verify(b"message", &[0xffu8; 64])
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CryptoError>(),
            Some(CryptoError::MalformedSignature(_))
        ));
    }

    /// 鍵バイト列からの復元を確認
    #[test]
    fn test_from_bytes() {
        let signer = EcdsaP256Signer::generate();
        let restored = EcdsaP256Signer::from_bytes(&signer.to_bytes()).unwrap();
        assert_eq!(restored.verifier(), signer.verifier());

        let public = signer.verifier().to_bytes();
        assert_eq!(public.len(), 33);
        assert_eq!(EcdsaP256Verifier::from_bytes(&public).unwrap(), signer.verifier());

        assert!(EcdsaP256Signer::from_bytes(&[0u8; 32]).is_err());
    }
}
