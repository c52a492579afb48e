//! チャンネル設定

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// `BufferedChannel` の設定
///
/// 省略したフィールドはデフォルト値になる（`#[serde(default)]`）。
///
/// ```toml
/// buffer_size = 524288
/// max_chunk_size = 65536
/// idle_flush_timeout_ms = 500
/// # flush_threshold を省略すると buffer_size / 4
/// # high_water_mark を省略するとバッファは上限なしで伸びる
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// バッファの初期容量
    pub buffer_size: usize,
    /// 未送信バイトがこれ以上になったら flush する（`None` なら buffer_size / 4）
    pub flush_threshold: Option<usize>,
    /// 1 回のトランスポート書き込みの最大バイト数
    pub max_chunk_size: usize,
    /// 未送信バイトがこの時間残っていたら flush する
    pub idle_flush_timeout_ms: u64,
    /// 未送信バイトをこの値以下に保つ。越える追記は拒否する（`None` なら無制限）
    pub high_water_mark: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            buffer_size: 512 * 1024,
            flush_threshold: None,
            max_chunk_size: 64 * 1024,
            idle_flush_timeout_ms: 500,
            high_water_mark: None,
        }
    }
}

impl ChannelConfig {
    /// 実際に使う flush 閾値
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold.unwrap_or(self.buffer_size / 4).max(1)
    }

    pub fn idle_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_flush_timeout_ms)
    }

    /// # エラー
    /// - `ChannelError::InvalidConfig`: 0 のサイズ / タイムアウト、
    ///   または flush 閾値より小さい high-water mark
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.buffer_size == 0 {
            return Err(ChannelError::InvalidConfig("buffer_size must be positive"));
        }
        if self.flush_threshold == Some(0) {
            return Err(ChannelError::InvalidConfig("flush_threshold must be positive"));
        }
        if self.max_chunk_size == 0 {
            return Err(ChannelError::InvalidConfig("max_chunk_size must be positive"));
        }
        if self.idle_flush_timeout_ms == 0 {
            return Err(ChannelError::InvalidConfig(
                "idle_flush_timeout_ms must be positive",
            ));
        }
        if let Some(limit) = self.high_water_mark {
            if limit < self.flush_threshold() {
                return Err(ChannelError::InvalidConfig(
                    "high_water_mark must not be below flush_threshold",
                ));
            }
        }
        Ok(())
    }
}
