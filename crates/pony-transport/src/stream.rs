//! `AsyncWrite` 上のトランスポート

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::transport::Transport;

/// 任意の `AsyncWrite`（ソケットの書き込み側など）を `Transport` にする
///
/// - `send`: `write_all` の後に `flush`
/// - `close`: `shutdown` して書き込み側を手放す。以降の `send` は `TransportError::Closed`
pub struct StreamTransport<W> {
    writer: Mutex<Option<W>>,
}

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        StreamTransport {
            writer: Mutex::new(Some(writer)),
        }
    }

    /// 書き込み側を取り出す（閉じていれば `None`）
    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Transport for StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, chunk: Bytes) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(&chunk).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let writer = self.writer.lock().await.take();
        match writer {
            Some(mut writer) => {
                writer.shutdown().await?;
                Ok(())
            }
            // 二重 close は何もしない
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_writes_through_to_reader() {
        let (client, mut server) = tokio::io::duplex(64);
        let transport = StreamTransport::new(client);

        transport.send(Bytes::from_static(b"hello ")).await.unwrap();
        transport.send(Bytes::from_static(b"world")).await.unwrap();
        transport.close().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello world");
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let transport = StreamTransport::new(client);
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(
            transport.send(Bytes::from_static(b"x")).await,
            Err(TransportError::Closed)
        );
        assert!(transport.into_inner().is_none());
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_is_io_error() {
        let (client, server) = tokio::io::duplex(8);
        drop(server);
        let transport = StreamTransport::new(client);

        let err = transport.send(Bytes::from_static(b"payload")).await.unwrap_err();
        assert!(matches!(err, TransportError::Io { .. }));
    }

    #[tokio::test]
    async fn test_into_inner_returns_open_writer() {
        let (client, mut server) = tokio::io::duplex(64);
        let transport = StreamTransport::new(client);
        transport.send(Bytes::from_static(b"ab")).await.unwrap();

        let mut writer = transport.into_inner().unwrap();
        writer.write_all(b"cd").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"abcd");
    }
}
