//! # ペイロードの構築とパース
//!
//! イメージ識別子とクレームを simple signing 形式のJSONバイト列に変換し、
//! 逆方向にもロスなく復元する。
//!
//! 署名・検証されるのはここで生成したバイト列そのもの。
//! 同じ入力からは常に同じバイト列を生成する（構造体のフィールド順 + キー順のMap）。

use imgsig_types::{Claims, ImageDigest, ImageDigestError, SimpleSigning, COSIGN_SIGNATURE_TYPE};
use serde::Serialize;
use serde_json::Value;

/// ペイロード全体で許容するJSONのネストの深さ。
/// `serde_json` のパーサは128段目で再帰上限エラーになるため、それ未満に収める。
pub const MAX_PAYLOAD_DEPTH: usize = 127;

/// クレームセットに許容するネストの深さ（クレームのオブジェクト自体を1段とする）。
/// ペイロードのルートオブジェクトの1段を除いた値。
pub const MAX_CLAIMS_DEPTH: usize = MAX_PAYLOAD_DEPTH - 1;

/// ペイロード処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// JSONへのシリアライズに失敗
    #[error("ペイロードのエンコードに失敗: {0}")]
    Encoding(#[source] serde_json::Error),
    /// クレームがJSONオブジェクトにならない
    #[error("クレームはJSONオブジェクトである必要があります (実際: {0})")]
    ClaimsNotObject(&'static str),
    /// JSONとして不正、または必須フィールドの欠落
    #[error("ペイロードのデコードに失敗: {0}")]
    Decoding(#[source] serde_json::Error),
    /// イメージ識別子が不正（ダイジェスト欠落等）
    #[error("ペイロードのイメージ識別子が不正: {0}")]
    InvalidImage(#[source] ImageDigestError),
    /// 種別タグがイメージ署名のものでない
    #[error("未知のペイロード種別: {0:?}")]
    UnknownType(String),
    /// クレームのネストが深すぎてパースで復元できない
    #[error("クレームのネストが深すぎます (深さ: {depth}, 上限: {max})")]
    ClaimsTooDeep {
        /// クレームのネストの深さ
        depth: usize,
        /// 上限
        max: usize,
    },
    /// `docker-reference` が正規化されていない（タグ付き等）
    #[error("docker-reference が正規形ではありません: {0:?}")]
    NonCanonicalReference(String),
}

/// イメージ識別子とクレームから署名対象のペイロードバイト列を構築する。
///
/// [`parse_payload`] で復元できないほど深いクレームは署名前に拒否する。
pub fn build_payload(image: &ImageDigest, claims: Option<&Claims>) -> Result<Vec<u8>, PayloadError> {
    if let Some(claims) = claims {
        let depth = claims_depth(claims);
        if depth > MAX_CLAIMS_DEPTH {
            return Err(PayloadError::ClaimsTooDeep {
                depth,
                max: MAX_CLAIMS_DEPTH,
            });
        }
    }
    let simple = SimpleSigning::new(image, claims.cloned());
    serde_json::to_vec(&simple).map_err(PayloadError::Encoding)
}

/// ペイロードバイト列からイメージ識別子とクレームを取り出す。
///
/// 種別タグが [`COSIGN_SIGNATURE_TYPE`] でないペイロードは拒否する。
pub fn parse_payload(bytes: &[u8]) -> Result<(ImageDigest, Option<Claims>), PayloadError> {
    let simple: SimpleSigning = serde_json::from_slice(bytes).map_err(PayloadError::Decoding)?;

    if simple.critical.signature_type != COSIGN_SIGNATURE_TYPE {
        return Err(PayloadError::UnknownType(simple.critical.signature_type));
    }

    let reference = simple.critical.identity.docker_reference;
    let image = ImageDigest::new(reference.as_str(), simple.critical.image.docker_manifest_digest)
        .map_err(PayloadError::InvalidImage)?;

    // 署名されたバイト列と異なる識別子は返さない
    if image.repository() != reference {
        return Err(PayloadError::NonCanonicalReference(reference));
    }

    Ok((image, simple.optional))
}

/// クレームセットのネストの深さ。クレームのオブジェクト自体を1段と数える。
fn claims_depth(claims: &Claims) -> usize {
    1 + claims.values().map(value_depth).max().unwrap_or(0)
}

/// 配列・オブジェクトのネストの深さ。スカラー値は0。
fn value_depth(value: &Value) -> usize {
    let mut max = 0;
    let mut stack = vec![(value, 1)];
    while let Some((value, depth)) = stack.pop() {
        match value {
            Value::Array(items) => {
                max = max.max(depth);
                stack.extend(items.iter().map(|item| (item, depth + 1)));
            }
            Value::Object(map) => {
                max = max.max(depth);
                stack.extend(map.values().map(|item| (item, depth + 1)));
            }
            _ => {}
        }
    }
    max
}

/// 任意のシリアライズ可能な値をクレームセットに変換する。
///
/// `null`（`None` 等）はクレーム無しとして扱う。
/// オブジェクト以外の値や、文字列以外のキーを持つマップはエラーになる。
pub fn claims_from_serializable<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Option<Claims>, PayloadError> {
    match serde_json::to_value(value).map_err(PayloadError::Encoding)? {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::Bool(_) => Err(PayloadError::ClaimsNotObject("bool")),
        Value::Number(_) => Err(PayloadError::ClaimsNotObject("number")),
        Value::String(_) => Err(PayloadError::ClaimsNotObject("string")),
        Value::Array(_) => Err(PayloadError::ClaimsNotObject("array")),
    }
}
