//! # imgsig 共有型定義
//!
//! コンテナイメージ署名で扱うデータ構造をRust構造体として提供する。
//!
//! ## ワイヤフォーマット (simple signing)
//! ```json
//! {
//!   "critical": {
//!     "identity": {"docker-reference": "example.com/repo"},
//!     "image": {"docker-manifest-digest": "sha256:..."},
//!     "type": "cosign container image signature"
//!   },
//!   "optional": {"build-id": "123"}
//! }
//! ```
//! `optional`（クレーム）が無い場合は `null` としてシリアライズされる。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 署名ペイロードの種別タグ。
/// 他のペイロードスキーマと区別するための固定文字列。
pub const COSIGN_SIGNATURE_TYPE: &str = "cosign container image signature";

/// クレームセット。文字列キーと任意のJSON値の対応。
///
/// `serde_json::Map` は既定でキー順（BTreeMap）に並ぶため、
/// 同じ入力からは常に同じバイト列が得られる。
pub type Claims = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// イメージ識別子
// ---------------------------------------------------------------------------

/// イメージ識別子の検証エラー。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageDigestError {
    /// リポジトリ名が空
    #[error("リポジトリ名が空です")]
    EmptyRepository,
    /// リポジトリ名に使用できない文字が含まれている
    #[error("リポジトリ名に不正な文字が含まれています: {0:?}")]
    InvalidRepository(String),
    /// ダイジェストが空（未解決の参照）
    #[error("ダイジェストが指定されていません")]
    MissingDigest,
    /// `<algorithm>:<hex>` 形式でない
    #[error("ダイジェストの形式が不正です: {0:?}")]
    MalformedDigest(String),
    /// 未対応のハッシュアルゴリズム
    #[error("未対応のダイジェストアルゴリズム: {0}")]
    UnsupportedAlgorithm(String),
    /// hex部の長さがアルゴリズムと一致しない
    #[error("{algorithm} ダイジェストは {expected} 桁のhexである必要があります (実際: {actual})")]
    DigestLength {
        /// アルゴリズム名
        algorithm: String,
        /// 期待するhex桁数
        expected: usize,
        /// 実際のhex桁数
        actual: usize,
    },
    /// hex部に小文字16進数以外が含まれている
    #[error("ダイジェストのhex部が不正です: {0:?}")]
    InvalidHex(String),
}

/// 対応するダイジェストアルゴリズムとhex桁数。
const DIGEST_ALGORITHMS: &[(&str, usize)] = &[("sha256", 64), ("sha384", 96), ("sha512", 128)];

/// ダイジェストで固定されたイメージ参照（リポジトリ名 + コンテンツダイジェスト）。
///
/// 構築時に必ず検証されるため、この型の値は常に空でないダイジェストを持つ。
/// 等価性は構造的（リポジトリ名とダイジェストの両方が一致すること）。
///
/// テキスト形式は `name@algorithm:hex`。serdeでもこの文字列として扱う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageDigest {
    repository: String,
    digest: String,
}

impl ImageDigest {
    /// リポジトリ名とダイジェストから識別子を構築する。
    ///
    /// リポジトリ名にタグ（`repo:tag`）が付いている場合は取り除く。
    /// ダイジェストで固定された参照ではタグは意味を持たないため。
    pub fn new(
        repository: impl Into<String>,
        digest: impl Into<String>,
    ) -> Result<Self, ImageDigestError> {
        let repository = strip_tag(&repository.into()).to_string();
        let digest = digest.into();
        validate_repository(&repository)?;
        validate_digest(&digest)?;
        Ok(Self { repository, digest })
    }

    /// リポジトリ名（例: `example.com/repo`）
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// コンテンツダイジェスト（例: `sha256:abc...`）
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// ダイジェストのアルゴリズム部（例: `sha256`）
    pub fn algorithm(&self) -> &str {
        self.digest
            .split_once(':')
            .map(|(algorithm, _)| algorithm)
            .unwrap_or_default()
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.digest)
    }
}

impl FromStr for ImageDigest {
    type Err = ImageDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (repository, digest) = s.rsplit_once('@').ok_or(ImageDigestError::MissingDigest)?;
        Self::new(repository, digest)
    }
}

impl TryFrom<String> for ImageDigest {
    type Error = ImageDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageDigest> for String {
    fn from(value: ImageDigest) -> Self {
        value.to_string()
    }
}

/// `registry:port/repo:tag` からタグ部分を取り除く。
/// 最後の `/` より後ろにある `:` だけをタグ区切りとみなす。
/// `/` の無い `host:5000` のように `:` の後ろが数字だけの場合はポートとして残す。
fn strip_tag(reference: &str) -> &str {
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    let Some(i) = reference[name_start..].find(':') else {
        return reference;
    };
    let suffix = &reference[name_start + i + 1..];
    if name_start == 0 && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
        return reference;
    }
    &reference[..name_start + i]
}

fn validate_repository(repository: &str) -> Result<(), ImageDigestError> {
    if repository.is_empty() {
        return Err(ImageDigestError::EmptyRepository);
    }
    if repository
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '@')
    {
        return Err(ImageDigestError::InvalidRepository(repository.to_string()));
    }
    Ok(())
}

fn validate_digest(digest: &str) -> Result<(), ImageDigestError> {
    if digest.is_empty() {
        return Err(ImageDigestError::MissingDigest);
    }
    let (algorithm, hex) = digest
        .split_once(':')
        .ok_or_else(|| ImageDigestError::MalformedDigest(digest.to_string()))?;
    if algorithm.is_empty() || hex.is_empty() {
        return Err(ImageDigestError::MalformedDigest(digest.to_string()));
    }

    let expected = DIGEST_ALGORITHMS
        .iter()
        .find(|(name, _)| *name == algorithm)
        .map(|(_, len)| *len)
        .ok_or_else(|| ImageDigestError::UnsupportedAlgorithm(algorithm.to_string()))?;

    if hex.len() != expected {
        return Err(ImageDigestError::DigestLength {
            algorithm: algorithm.to_string(),
            expected,
            actual: hex.len(),
        });
    }
    if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(ImageDigestError::InvalidHex(hex.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// simple signing ペイロード構造
// ---------------------------------------------------------------------------

/// 署名対象となるペイロード全体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleSigning {
    /// 検証者が必ず解釈しなければならない部分
    pub critical: Critical,
    /// 任意のクレーム（無い場合は `null`）
    pub optional: Option<Claims>,
}

/// ペイロードの必須部分。フィールド順がそのままJSONのキー順になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critical {
    /// 署名対象のリポジトリ
    pub identity: Identity,
    /// 署名対象のマニフェストダイジェスト
    pub image: Image,
    /// 種別タグ（[`COSIGN_SIGNATURE_TYPE`]）
    #[serde(rename = "type")]
    pub signature_type: String,
}

/// `critical.identity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// リポジトリ名
    #[serde(rename = "docker-reference")]
    pub docker_reference: String,
}

/// `critical.image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// マニフェストダイジェスト
    #[serde(rename = "docker-manifest-digest")]
    pub docker_manifest_digest: String,
}

impl SimpleSigning {
    /// イメージ識別子とクレームからペイロード構造を組み立てる。
    pub fn new(image: &ImageDigest, claims: Option<Claims>) -> Self {
        Self {
            critical: Critical {
                identity: Identity {
                    docker_reference: image.repository().to_string(),
                },
                image: Image {
                    docker_manifest_digest: image.digest().to_string(),
                },
                signature_type: COSIGN_SIGNATURE_TYPE.to_string(),
            },
            optional: claims,
        }
    }
}

// ---------------------------------------------------------------------------
// 署名・検証の結果
// ---------------------------------------------------------------------------

/// 署名結果。ペイロードと署名は必ず組で受け渡す。
///
/// `payload` は署名されたバイト列そのもの。検証前に再シリアライズしてはならない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// 署名対象のペイロードバイト列
    pub payload: Vec<u8>,
    /// 署名バイト列（検証者のみが解釈する）
    pub signature: Vec<u8>,
}

/// 検証結果。署名検証とペイロードのパースの両方に成功した場合のみ得られる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedPayload {
    /// 署名対象のイメージ
    pub image: ImageDigest,
    /// ペイロードに含まれていたクレーム
    pub claims: Option<Claims>,
}
