//! 下位トランスポートの抽象

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// 信頼性のない単一の双方向ストリーム（WebSocket、TCP など）への送信口
///
/// `send` の完了はチャンクが下位層に受け取られたことを意味する。
/// 自動再接続はこの層では行わない。
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// チャンクを 1 つ送る
    ///
    /// # エラー
    /// 失敗したらチャンネルはその場で閉じ、セッションは破棄される。
    async fn send(&self, chunk: Bytes) -> Result<(), TransportError>;

    /// トランスポートを閉じる
    async fn close(&self) -> Result<(), TransportError>;
}
