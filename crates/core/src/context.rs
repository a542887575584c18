//! # 中断コンテキスト
//!
//! 署名・検証ケイパビリティの呼び出しに渡すキャンセルトークンと期限。
//! ケイパビリティはネットワークやハードウェアを待つ可能性があるため、
//! 呼び出しを期限・キャンセルと競争させ、先に発火した方で打ち切る。

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 中断の理由。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancellation {
    /// キャンセルトークンが発火した
    #[error("キャンセルされました")]
    Cancelled,
    /// 期限を過ぎた
    #[error("期限を超過しました")]
    DeadlineExceeded,
}

/// ケイパビリティ呼び出しのコンテキスト。
///
/// 既定値は「キャンセルされない・期限なし」。
#[derive(Debug, Clone, Default)]
pub struct SignContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl SignContext {
    /// キャンセルも期限もないコンテキストを作る。
    pub fn new() -> Self {
        Self::default()
    }

    /// 外部のキャンセルトークンに紐付ける。
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 絶対時刻の期限を設定する。
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 現在時刻からの相対時間で期限を設定する。
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// キャンセルトークン
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 期限（設定されている場合）
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 現時点で既に中断されていないか確認する。
    pub fn check(&self) -> Result<(), Cancellation> {
        if self.cancel.is_cancelled() {
            return Err(Cancellation::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(Cancellation::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// `future` をキャンセル・期限と競争させる。
    ///
    /// 既に中断されている場合は `future` を一度もpollせずに返す。
    /// 中断した場合 `future` はdropされる。
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Cancellation> {
        self.check()?;

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancellation::Cancelled),
            _ = expired => Err(Cancellation::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}
