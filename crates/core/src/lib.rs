//! # imgsig Core
//!
//! コンテナイメージ署名の構築と検証を実装する。
//!
//! ## 処理フロー
//! 署名:
//! 1. イメージ識別子とクレームからペイロードを構築する
//! 2. 注入された [`Signer`] でペイロードに署名する
//! 3. 署名したバイト列そのものと署名を組で返す
//!
//! 検証:
//! 1. 注入された [`Verifier`] で署名を検証する（ペイロードの中身はまだ解釈しない）
//! 2. 検証に成功した場合のみペイロードをパースする
//! 3. イメージ識別子とクレームを返す
//!
//! どちらも単発の処理で、状態を持たず、再試行もしない。

pub mod context;
pub mod payload;

use serde::Serialize;

pub use context::{Cancellation, SignContext};
pub use imgsig_crypto::{CapabilityError, Signer, Verifier};
pub use imgsig_types::{Claims, ImageDigest, SignedPayload, VerifiedPayload, COSIGN_SIGNATURE_TYPE};
pub use payload::{
    build_payload, claims_from_serializable, parse_payload, PayloadError, MAX_CLAIMS_DEPTH,
};

/// 署名・検証のエラー型。
/// いずれの場合も部分的な結果は返さない。
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// ペイロードの構築に失敗（クレームがエンコードできない）
    #[error("ペイロードの構築に失敗しました: {0}")]
    PayloadConstruction(#[source] PayloadError),
    /// 署名ケイパビリティが失敗
    #[error("ペイロードへの署名に失敗しました: {0}")]
    Signing(#[source] CapabilityError),
    /// 署名が不正、または検証ケイパビリティが失敗
    #[error("署名検証に失敗しました: {0}")]
    Verification(#[source] CapabilityError),
    /// 検証済みペイロードのデコードに失敗
    #[error("イメージペイロードのデコードに失敗しました: {0}")]
    Decoding(#[source] PayloadError),
    /// ケイパビリティ呼び出し中のキャンセル・期限超過
    #[error("処理が中断されました: {0}")]
    Cancelled(#[source] Cancellation),
}

/// イメージに署名する。
///
/// 返却される `payload` は署名したバイト列そのもの。呼び出し側は
/// `payload` と `signature` を組で受け渡し、検証前に再シリアライズしてはならない。
pub async fn sign_image<S: Signer + ?Sized>(
    ctx: &SignContext,
    signer: &S,
    image: &ImageDigest,
    claims: Option<&Claims>,
) -> Result<SignedPayload, SignatureError> {
    let payload = build_payload(image, claims).map_err(SignatureError::PayloadConstruction)?;
    tracing::debug!(image = %image, payload_len = payload.len(), "署名ペイロードを構築しました");

    let signature = ctx
        .run(signer.sign(&payload))
        .await
        .map_err(SignatureError::Cancelled)?
        .map_err(SignatureError::Signing)?;
    tracing::debug!(image = %image, signature_len = signature.len(), "ペイロードに署名しました");

    Ok(SignedPayload { payload, signature })
}

/// 任意のシリアライズ可能な値をクレームとしてイメージに署名する。
///
/// クレームへの変換に失敗した場合は署名ケイパビリティを呼び出さない。
pub async fn sign_image_with<S, T>(
    ctx: &SignContext,
    signer: &S,
    image: &ImageDigest,
    claims: &T,
) -> Result<SignedPayload, SignatureError>
where
    S: Signer + ?Sized,
    T: Serialize + ?Sized,
{
    let claims = claims_from_serializable(claims).map_err(SignatureError::PayloadConstruction)?;
    sign_image(ctx, signer, image, claims.as_ref()).await
}

/// イメージ署名を検証し、署名されていたイメージ識別子とクレームを返す。
///
/// 署名検証はペイロードのパースより必ず先に行う。
/// 検証済みでも中身が壊れているペイロードは [`SignatureError::Decoding`] で拒否する。
pub async fn verify_image_signature<V: Verifier + ?Sized>(
    ctx: &SignContext,
    verifier: &V,
    payload: &[u8],
    signature: &[u8],
) -> Result<VerifiedPayload, SignatureError> {
    ctx.run(verifier.verify(payload, signature))
        .await
        .map_err(SignatureError::Cancelled)?
        .map_err(|e| {
            tracing::warn!(error = %e, "署名検証に失敗しました");
            SignatureError::Verification(e)
        })?;

    let (image, claims) = parse_payload(payload).map_err(|e| {
        tracing::warn!(error = %e, "検証済みペイロードのデコードに失敗しました");
        SignatureError::Decoding(e)
    })?;
    tracing::debug!(image = %image, "イメージ署名を検証しました");

    Ok(VerifiedPayload { image, claims })
}
