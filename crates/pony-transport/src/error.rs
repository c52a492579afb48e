//! pony-transport エラー型

use std::io;

use thiserror::Error;

/// トランスポート層の失敗
///
/// セッションにとって致命的な唯一のエラー。チャンネルは再送せずに閉じる。
/// 失敗フックや待機中の呼び出し元へ配るため `Clone` にしている。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 書き込み / shutdown の I/O エラー
    #[error("transport i/o error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    /// すでに閉じたトランスポートへの送信
    #[error("transport is closed")]
    Closed,
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// チャンネル操作のエラー（呼び出し元へ同期的に返す）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// 閉じたチャンネルへの操作
    #[error("buffered channel is closed")]
    Closed,

    /// 未送信バイトが high-water mark に達している
    #[error("buffered channel is full: {buffered} bytes buffered, limit {limit}")]
    Backpressure { buffered: usize, limit: usize },

    /// tokio ランタイムの外で spawn しようとした
    #[error("no tokio runtime available to drive the channel")]
    NoRuntime,

    /// 設定値が不正
    #[error("invalid channel config: {0}")]
    InvalidConfig(&'static str),

    /// トランスポートの失敗でチャンネルが閉じた
    #[error("channel closed after transport failure: {0}")]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        assert_eq!(
            err,
            TransportError::Io {
                kind: io::ErrorKind::BrokenPipe,
                message: "peer gone".into()
            }
        );
    }

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::Backpressure {
            buffered: 10,
            limit: 8,
        };
        assert_eq!(
            err.to_string(),
            "buffered channel is full: 10 bytes buffered, limit 8"
        );
    }
}
