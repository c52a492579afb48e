//! テスト用トランスポート
//!
//! `test-util` フィーチャで他クレートのテストからも使える。

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::transport::Transport;

/// 送られたチャンクを記録するトランスポート
///
/// - `failing_on(n)`: n 回目（1 始まり）の `send` を `BrokenPipe` で失敗させる
/// - `gated()`: `release` されるまで `send` を止めておく
#[derive(Default)]
pub struct RecordingTransport {
    chunks: Mutex<Vec<Bytes>>,
    send_calls: AtomicUsize,
    close_calls: AtomicUsize,
    fail_on: Option<usize>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(send_number: usize) -> Self {
        RecordingTransport {
            fail_on: Some(send_number),
            ..Self::default()
        }
    }

    pub fn gated() -> Self {
        RecordingTransport {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// 止めている `send` を `sends` 回分通す
    pub fn release(&self, sends: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(sends);
        }
    }

    /// 受け取ったチャンク（順序どおり）
    pub fn chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().clone()
    }

    /// 受け取った全バイトを連結したもの
    pub fn received(&self) -> Vec<u8> {
        self.chunks.lock().concat()
    }

    /// 失敗したものも含めた `send` 呼び出し回数
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chunk: Bytes) -> Result<(), TransportError> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| TransportError::Closed)?;
            permit.forget();
        }
        let number = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(number) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated send failure").into());
        }
        self.chunks.lock().push(chunk);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
