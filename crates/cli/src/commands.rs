//! # サブコマンド実装
//!
//! - `generate-key-pair`: 鍵ペアを生成して `<prefix>.key` / `<prefix>.pub` に保存
//! - `sign`: イメージに署名し、ペイロードと署名（Base64）をファイルに保存
//! - `verify`: ペイロードと署名を検証し、イメージ識別子とクレームを返す
//! - `digest`: ローカルファイルの `sha256:<hex>` ダイジェストを計算

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use clap::Args;
use tokio_util::sync::CancellationToken;

use imgsig_core::{
    sign_image, verify_image_signature, Claims, ImageDigest, SignContext, VerifiedPayload,
};
use imgsig_crypto::{KeyAlgorithm, PrivateKey, PublicKey};

use crate::config::CliConfig;

/// Base64エンジン（Standard）
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// `key=value` 形式のクレーム引数をパースする。
pub fn parse_claim(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("クレームは key=value 形式で指定してください: {arg:?}")),
    }
}

/// `generate-key-pair` の引数
#[derive(Debug, Clone, Args)]
pub struct GenerateKeyPairArgs {
    /// 鍵種別（ed25519 | ecdsa-p256）
    #[arg(long, default_value = "ed25519", value_parser = parse_algorithm)]
    pub algorithm: KeyAlgorithm,
    /// 出力ファイルのプレフィックス
    #[arg(long, default_value = "imgsig")]
    pub out: PathBuf,
}

fn parse_algorithm(s: &str) -> Result<KeyAlgorithm, imgsig_crypto::CryptoError> {
    s.parse()
}

/// `sign` の引数
#[derive(Debug, Clone, Args)]
pub struct SignArgs {
    /// 署名対象のイメージ（`name@sha256:<hex>`）
    #[arg(long)]
    pub image: String,
    /// 追加するクレーム（`key=value`、複数指定可）
    #[arg(long = "claim", value_parser = parse_claim)]
    pub claims: Vec<(String, String)>,
    /// クレームを記述したJSONオブジェクトのファイル
    #[arg(long)]
    pub claims_json: Option<PathBuf>,
    /// ペイロードの出力先
    #[arg(long)]
    pub payload_out: PathBuf,
    /// 署名（Base64）の出力先
    #[arg(long)]
    pub signature_out: PathBuf,
}

/// `verify` の引数
#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// ペイロードファイル
    #[arg(long)]
    pub payload: PathBuf,
    /// 署名（Base64）ファイル
    #[arg(long)]
    pub signature: PathBuf,
}

/// `digest` の引数
#[derive(Debug, Clone, Args)]
pub struct DigestArgs {
    /// ダイジェストを計算するファイル
    pub file: PathBuf,
}

/// 鍵ペアを生成して保存する。保存した `(秘密鍵, 公開鍵)` のパスを返す。
///
/// 既存の鍵ファイルは上書きしない。どちらかが既に存在する場合はエラーになる。
pub fn generate_key_pair(args: &GenerateKeyPairArgs) -> anyhow::Result<(PathBuf, PathBuf)> {
    let private_path = args.out.with_extension("key");
    let public_path = args.out.with_extension("pub");

    let mut private_file = create_key_file(&private_path, 0o600)
        .with_context(|| format!("秘密鍵ファイルを作成できません: {}", private_path.display()))?;
    let mut public_file = match create_key_file(&public_path, 0o644) {
        Ok(file) => file,
        Err(e) => {
            drop(private_file);
            let _ = fs::remove_file(&private_path);
            return Err(e).with_context(|| {
                format!("公開鍵ファイルを作成できません: {}", public_path.display())
            });
        }
    };

    let key = PrivateKey::generate(args.algorithm);
    private_file
        .write_all(key.to_key_file().as_bytes())
        .with_context(|| format!("秘密鍵の書き込みに失敗: {}", private_path.display()))?;
    public_file
        .write_all(key.public_key().to_key_file().as_bytes())
        .with_context(|| format!("公開鍵の書き込みに失敗: {}", public_path.display()))?;

    tracing::info!(
        algorithm = %args.algorithm,
        private_key = %private_path.display(),
        public_key = %public_path.display(),
        "鍵ペアを生成しました"
    );
    Ok((private_path, public_path))
}

/// 鍵ファイルを新規作成する。unixでは作成時点から `mode` の権限になる。
fn create_key_file(path: &Path, mode: u32) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

/// JSONファイルと `key=value` 引数からクレームを組み立てる。
/// 同じキーは `key=value` 引数が優先される。どちらも無ければ `None`。
pub fn collect_claims(
    claims_json: Option<&Path>,
    pairs: &[(String, String)],
) -> anyhow::Result<Option<Claims>> {
    let mut claims = match claims_json {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("クレームファイルの読み込みに失敗: {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("クレームファイルのパースに失敗: {}", path.display()))?;
            match value {
                serde_json::Value::Object(map) => Some(map),
                _ => anyhow::bail!(
                    "クレームファイルはJSONオブジェクトである必要があります: {}",
                    path.display()
                ),
            }
        }
        None => None,
    };

    if !pairs.is_empty() {
        let map = claims.get_or_insert_with(Claims::new);
        for (key, value) in pairs {
            map.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
    }
    Ok(claims)
}

fn signing_context(config: &CliConfig, cancel: &CancellationToken) -> SignContext {
    SignContext::new()
        .with_cancellation(cancel.clone())
        .with_timeout(config.timeout)
}

/// イメージに署名し、ペイロードと署名をファイルに保存する。
pub async fn sign(
    config: &CliConfig,
    cancel: &CancellationToken,
    args: &SignArgs,
) -> anyhow::Result<()> {
    let key_path = config.require_private_key()?;
    let key_text = fs::read_to_string(key_path)
        .with_context(|| format!("秘密鍵の読み込みに失敗: {}", key_path.display()))?;
    let key = PrivateKey::from_key_file(&key_text)?;

    let image: ImageDigest = args
        .image
        .parse()
        .with_context(|| format!("イメージ参照が不正です: {}", args.image))?;
    let claims = collect_claims(args.claims_json.as_deref(), &args.claims)?;

    let ctx = signing_context(config, cancel);
    let signed = sign_image(&ctx, &key, &image, claims.as_ref()).await?;

    fs::write(&args.payload_out, &signed.payload)
        .with_context(|| format!("ペイロードの書き込みに失敗: {}", args.payload_out.display()))?;
    fs::write(&args.signature_out, b64().encode(&signed.signature))
        .with_context(|| format!("署名の書き込みに失敗: {}", args.signature_out.display()))?;

    tracing::info!(
        image = %image,
        algorithm = %key.algorithm(),
        payload = %args.payload_out.display(),
        signature = %args.signature_out.display(),
        "イメージに署名しました"
    );
    Ok(())
}

/// ペイロードと署名を検証する。
pub async fn verify(
    config: &CliConfig,
    cancel: &CancellationToken,
    args: &VerifyArgs,
) -> anyhow::Result<VerifiedPayload> {
    let key_path = config.require_public_key()?;
    let key_text = fs::read_to_string(key_path)
        .with_context(|| format!("公開鍵の読み込みに失敗: {}", key_path.display()))?;
    let public_key = PublicKey::from_key_file(&key_text)?;

    let payload = fs::read(&args.payload)
        .with_context(|| format!("ペイロードの読み込みに失敗: {}", args.payload.display()))?;
    let signature_text = fs::read_to_string(&args.signature)
        .with_context(|| format!("署名の読み込みに失敗: {}", args.signature.display()))?;
    let signature = b64()
        .decode(signature_text.trim())
        .context("署名のBase64デコードに失敗")?;

    let ctx = signing_context(config, cancel);
    let verified = verify_image_signature(&ctx, &public_key, &payload, &signature).await?;

    tracing::info!(image = %verified.image, "署名を検証しました");
    Ok(verified)
}

/// ファイルのダイジェストを計算する。
pub fn digest(args: &DigestArgs) -> anyhow::Result<String> {
    let bytes = fs::read(&args.file)
        .with_context(|| format!("ファイルの読み込みに失敗: {}", args.file.display()))?;
    Ok(imgsig_crypto::sha256_digest(&bytes))
}
