//! # imgsig CLI
//!
//! コンテナイメージ署名の生成・検証を行うコマンドラインツール。
//!
//! ```text
//! imgsig generate-key-pair --algorithm ed25519 --out cosign
//! imgsig --key cosign.key sign --image example.com/repo@sha256:<hex> \
//!     --claim build-id=123 --payload-out payload.json --signature-out payload.sig
//! imgsig --public-key cosign.pub verify --payload payload.json --signature payload.sig
//! imgsig digest ./manifest.json
//! ```
//!
//! Ctrl-C を受けると実行中の署名・検証をキャンセルする。

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::commands::{DigestArgs, GenerateKeyPairArgs, SignArgs, VerifyArgs};
use crate::config::{CliConfig, ConfigFlags};

#[derive(Debug, Parser)]
#[command(name = "imgsig", version, about = "コンテナイメージ署名ツール")]
struct Cli {
    /// 署名用秘密鍵ファイル（環境変数 IMGSIG_KEY）
    #[arg(long = "key", global = true)]
    private_key: Option<PathBuf>,

    /// 検証用公開鍵ファイル（環境変数 IMGSIG_PUB）
    #[arg(long, global = true)]
    public_key: Option<PathBuf>,

    /// 署名・検証の期限（秒、環境変数 IMGSIG_TIMEOUT_SECS）
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 鍵ペアを生成する
    GenerateKeyPair(GenerateKeyPairArgs),
    /// イメージに署名する
    Sign(SignArgs),
    /// イメージ署名を検証する
    Verify(VerifyArgs),
    /// ファイルのダイジェストを計算する
    Digest(DigestArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = CliConfig::from_env(ConfigFlags {
        private_key: cli.private_key,
        public_key: cli.public_key,
        timeout_secs: cli.timeout_secs,
    })?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("中断を受け付けました");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::GenerateKeyPair(args) => {
            let (private_key, public_key) = commands::generate_key_pair(&args)?;
            println!("{}", private_key.display());
            println!("{}", public_key.display());
        }
        Command::Sign(args) => {
            commands::sign(&config, &cancel, &args).await?;
        }
        Command::Verify(args) => {
            let verified = commands::verify(&config, &cancel, &args).await?;
            println!("{}", serde_json::to_string_pretty(&verified)?);
        }
        Command::Digest(args) => {
            println!("{}", commands::digest(&args)?);
        }
    }

    Ok(())
}
