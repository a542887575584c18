//! # CLI設定
//!
//! コマンドライン引数と環境変数から設定を組み立てる。
//! 引数で明示された値が環境変数より優先される。
//!
//! | 環境変数 | 用途 | 既定値 |
//! |---------|------|--------|
//! | `IMGSIG_KEY` | 署名用秘密鍵ファイル | なし |
//! | `IMGSIG_PUB` | 検証用公開鍵ファイル | なし |
//! | `IMGSIG_TIMEOUT_SECS` | 署名・検証の期限（秒） | 30 |

use std::path::{Path, PathBuf};
use std::time::Duration;

/// 秘密鍵ファイルパスの環境変数名
pub const ENV_PRIVATE_KEY: &str = "IMGSIG_KEY";
/// 公開鍵ファイルパスの環境変数名
pub const ENV_PUBLIC_KEY: &str = "IMGSIG_PUB";
/// 期限（秒）の環境変数名
pub const ENV_TIMEOUT_SECS: &str = "IMGSIG_TIMEOUT_SECS";
/// 期限の既定値（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 鍵ファイルが引数でも環境変数でも指定されていない
    #[error("{flag} または環境変数 {env} で鍵ファイルを指定してください")]
    MissingKey {
        /// コマンドライン引数名
        flag: &'static str,
        /// 環境変数名
        env: &'static str,
    },
    /// 期限の値が数値でない
    #[error("IMGSIG_TIMEOUT_SECS の値が不正です: {0:?}")]
    InvalidTimeout(String),
}

/// コマンドラインで明示された設定値
#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    /// `--key`
    pub private_key: Option<PathBuf>,
    /// `--public-key`
    pub public_key: Option<PathBuf>,
    /// `--timeout-secs`
    pub timeout_secs: Option<u64>,
}

/// 解決済みのCLI設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// 署名用秘密鍵ファイル
    pub private_key: Option<PathBuf>,
    /// 検証用公開鍵ファイル
    pub public_key: Option<PathBuf>,
    /// 署名・検証ケイパビリティ呼び出しの期限
    pub timeout: Duration,
}

impl CliConfig {
    /// プロセスの環境変数を使って設定を解決する。
    pub fn from_env(flags: ConfigFlags) -> Result<Self, ConfigError> {
        Self::resolve(flags, |name| std::env::var(name).ok())
    }

    /// 引数と環境変数の参照関数から設定を解決する。
    pub fn resolve(
        flags: ConfigFlags,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let private_key = flags
            .private_key
            .or_else(|| lookup(ENV_PRIVATE_KEY).map(PathBuf::from));
        let public_key = flags
            .public_key
            .or_else(|| lookup(ENV_PUBLIC_KEY).map(PathBuf::from));

        let timeout_secs = match flags.timeout_secs {
            Some(secs) => secs,
            None => match lookup(ENV_TIMEOUT_SECS) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout(value))?,
                None => DEFAULT_TIMEOUT_SECS,
            },
        };

        Ok(Self {
            private_key,
            public_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// 署名用秘密鍵ファイル（未指定ならエラー）
    pub fn require_private_key(&self) -> Result<&Path, ConfigError> {
        self.private_key.as_deref().ok_or(ConfigError::MissingKey {
            flag: "--key",
            env: ENV_PRIVATE_KEY,
        })
    }

    /// 検証用公開鍵ファイル（未指定ならエラー）
    pub fn require_public_key(&self) -> Result<&Path, ConfigError> {
        self.public_key.as_deref().ok_or(ConfigError::MissingKey {
            flag: "--public-key",
            env: ENV_PUBLIC_KEY,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    /// 何も指定しない場合は既定の期限になり、鍵は未指定エラーになることを確認
    #[test]
    fn test_defaults() {
        let config = CliConfig::resolve(ConfigFlags::default(), env(&[])).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(matches!(
            config.require_private_key(),
            Err(ConfigError::MissingKey { flag: "--key", .. })
        ));
        assert!(matches!(
            config.require_public_key(),
            Err(ConfigError::MissingKey { flag: "--public-key", .. })
        ));
    }

    /// 環境変数から値が読まれることを確認
    #[test]
    fn test_env_values() {
        let config = CliConfig::resolve(
            ConfigFlags::default(),
            env(&[
                (ENV_PRIVATE_KEY, "/keys/signer.key"),
                (ENV_PUBLIC_KEY, "/keys/signer.pub"),
                (ENV_TIMEOUT_SECS, "5"),
            ]),
        )
        .unwrap();

        assert_eq!(config.require_private_key().unwrap(), Path::new("/keys/signer.key"));
        assert_eq!(config.require_public_key().unwrap(), Path::new("/keys/signer.pub"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    /// 引数が環境変数より優先されることを確認
    #[test]
    fn test_flags_override_env() {
        let flags = ConfigFlags {
            private_key: Some(PathBuf::from("cli.key")),
            public_key: None,
            timeout_secs: Some(1),
        };
        let config = CliConfig::resolve(
            flags,
            env(&[(ENV_PRIVATE_KEY, "env.key"), (ENV_TIMEOUT_SECS, "not-a-number")]),
        )
        .unwrap();

        assert_eq!(config.require_private_key().unwrap(), Path::new("cli.key"));
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    /// 数値でない期限がエラーになることを確認
    #[test]
    fn test_invalid_timeout() {
        let err = CliConfig::resolve(ConfigFlags::default(), env(&[(ENV_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(v) if v == "soon"));
    }
}
