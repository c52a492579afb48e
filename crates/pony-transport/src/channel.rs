//! 自動 flush バッファ付きチャンネル
//!
//! ## スレッド構成
//!
//! ```text
//! producer（同期）         driver タスク                  delivery タスク（flush ごと）
//! ─────────────────        ─────────────────────────      ──────────────────────────
//! append / flush ──lock──▶ Inner ◀──lock── idle タイマー
//!        │                   ▲                            chunk を順に Transport::send
//!        └─ 閾値超え: ここで flush 開始 ─────spawn─────────▶ │
//!                            └──── FlushSucceeded / FlushFailed (mpsc) ◀──┘
//! ```
//!
//! - 共有状態 `Inner` は `parking_lot::Mutex` 1 つで守る。flush の開始はロック内で
//!   バッファを `split().freeze()` するので、追記中の領域を送ることはない。
//! - 送信完了はイベントとして driver に届く。送信中の flush は常に最大 1 つ。
//! - 状態は `watch` で公開し、`flush_and_wait` / `closed` がそれを待つ。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, warn};

use crate::chunk::Chunker;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, TransportError};
use crate::transport::Transport;

/// トランスポート失敗時に 1 度だけ呼ばれるフック
pub type FailureHook = Box<dyn FnOnce(TransportError) + Send + 'static>;

/// チャンネルの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// 未送信バイトなし
    Idle,
    /// 未送信バイトあり、flush 待ち
    Accumulating,
    /// flush がトランスポートへ送信中
    FlushPending,
    /// 終端状態
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Accumulating => "accumulating",
            ChannelState::FlushPending => "flush-pending",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// チャンネルの累積統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub bytes_appended: u64,
    pub bytes_flushed: u64,
    pub flushes_started: u64,
    pub flushes_completed: u64,
    pub chunks_sent: u64,
}

/// driver タスクへのイベント
#[derive(Debug)]
enum ChannelEvent {
    /// バッファが空から非空になった（idle タイマーの再計算）
    Armed,
    FlushSucceeded {
        flush_id: u64,
        bytes: usize,
        chunks: usize,
    },
    FlushFailed {
        flush_id: u64,
        error: TransportError,
    },
    Close,
}

/// `watch` で公開する状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChannelStatus {
    state: ChannelState,
    /// 未送信バイトも送信中の flush もない
    drained: bool,
}

struct Inner {
    buffer: BytesMut,
    state: ChannelState,
    next_flush_id: u64,
    in_flight: Option<u64>,
    /// 送信中に flush() が呼ばれた
    flush_requested: bool,
    /// バッファが空でなくなった時刻（idle タイマーの起点）
    accumulating_since: Option<Instant>,
    failure: Option<TransportError>,
    on_failure: Option<FailureHook>,
    stats: ChannelStats,
}

struct Shared {
    flush_threshold: usize,
    high_water_mark: Option<usize>,
    idle_timeout: Duration,
    chunker: Chunker,
    transport: Arc<dyn Transport>,
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    status: watch::Sender<ChannelStatus>,
    runtime: Handle,
}

/// 自動 flush バッファ付きチャンネル
///
/// 追記はプロデューサのスレッドで同期的に行い、ネットワーク I/O を待たない。
/// flush の条件は 3 つ:
/// - 未送信バイトが `flush_threshold` 以上になった（追記の呼び出し内で開始）
/// - `flush()` / `flush_and_wait()` が呼ばれた
/// - 未送信バイトが `idle_flush_timeout` の間残っていた
///
/// drop すると `close()` と同じく閉じる。
pub struct BufferedChannel {
    shared: Arc<Shared>,
}

impl BufferedChannel {
    /// 現在の tokio ランタイム上にチャンネルを起動する
    ///
    /// # エラー
    /// - `ChannelError::NoRuntime`: ランタイムの外から呼ばれた
    /// - `ChannelError::InvalidConfig`: 設定が不正
    pub fn spawn(config: ChannelConfig, transport: Arc<dyn Transport>) -> Result<Self, ChannelError> {
        let handle = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        Self::spawn_on(&handle, config, transport)
    }

    /// 指定したランタイム上にチャンネルを起動する（ランタイム外のスレッドからも呼べる）
    pub fn spawn_on(
        handle: &Handle,
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ChannelError> {
        config.validate()?;

        let (events, receiver) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ChannelStatus {
            state: ChannelState::Idle,
            drained: true,
        });

        let shared = Arc::new(Shared {
            flush_threshold: config.flush_threshold(),
            high_water_mark: config.high_water_mark,
            idle_timeout: config.idle_flush_timeout(),
            chunker: Chunker::new(config.max_chunk_size),
            transport,
            inner: Mutex::new(Inner {
                buffer: BytesMut::with_capacity(config.buffer_size),
                state: ChannelState::Idle,
                next_flush_id: 1,
                in_flight: None,
                flush_requested: false,
                accumulating_since: None,
                failure: None,
                on_failure: None,
                stats: ChannelStats::default(),
            }),
            events,
            status,
            runtime: handle.clone(),
        });

        handle.spawn(drive(Arc::clone(&shared), receiver));
        debug!(
            flush_threshold = shared.flush_threshold,
            max_chunk_size = shared.chunker.max_chunk_size(),
            idle_ms = config.idle_flush_timeout_ms,
            "buffered channel started"
        );
        Ok(BufferedChannel { shared })
    }

    /// トランスポート失敗時のフックを登録する
    ///
    /// すでに失敗して閉じていれば、その場で呼ぶ。
    pub fn on_failure<F>(&self, hook: F)
    where
        F: FnOnce(TransportError) + Send + 'static,
    {
        let mut inner = self.shared.inner.lock();
        match inner.failure.clone() {
            Some(failure) => {
                drop(inner);
                hook(failure);
            }
            None => inner.on_failure = Some(Box::new(hook)),
        }
    }

    /// バイト列を追記する
    pub fn append(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.append_with(|buffer| {
            buffer.extend_from_slice(bytes);
            Ok::<_, ChannelError>(())
        })
    }

    /// バッファへ直接書き込む
    ///
    /// `write` がエラーを返したら、その呼び出しで書いたバイトは取り消す。
    /// 1 レコードが途中まで書かれた状態で送られることはない。
    ///
    /// `write` はチャンネルのロックを保持したまま呼ばれる。中からこのチャンネルの
    /// メソッドを呼ぶとデッドロックするので、バッファへ書くだけにすること。
    ///
    /// # エラー
    /// - `ChannelError::Closed` / `ChannelError::Transport`: 閉じている
    /// - `ChannelError::Backpressure`: high-water mark に達している、
    ///   またはこの追記で越える（書いたバイトは取り消す）
    /// - `write` が返したエラー
    pub fn append_with<T, E, F>(&self, write: F) -> Result<T, E>
    where
        F: FnOnce(&mut BytesMut) -> Result<T, E>,
        E: From<ChannelError>,
    {
        let mut inner = self.shared.inner.lock();
        if inner.state == ChannelState::Closed {
            return Err(closed_error(&inner).into());
        }
        if let Some(limit) = self.shared.high_water_mark {
            let buffered = inner.buffer.len();
            if buffered >= limit {
                return Err(ChannelError::Backpressure { buffered, limit }.into());
            }
        }

        let mark = inner.buffer.len();
        let value = match write(&mut inner.buffer) {
            Ok(value) => value,
            Err(err) => {
                inner.buffer.truncate(mark);
                return Err(err);
            }
        };
        if let Some(limit) = self.shared.high_water_mark {
            // 1 回の追記で上限を越えるなら丸ごと取り消す
            if inner.buffer.len() > limit {
                inner.buffer.truncate(mark);
                return Err(ChannelError::Backpressure {
                    buffered: mark,
                    limit,
                }
                .into());
            }
        }

        let appended = inner.buffer.len() - mark;
        if appended == 0 {
            return Ok(value);
        }
        inner.stats.bytes_appended += appended as u64;

        if mark == 0 {
            inner.accumulating_since = Some(Instant::now());
            let _ = self.shared.events.send(ChannelEvent::Armed);
        }
        if inner.in_flight.is_none() {
            if inner.buffer.len() >= self.shared.flush_threshold {
                self.shared.start_flush(&mut inner);
            } else {
                inner.state = ChannelState::Accumulating;
            }
        }
        self.shared.publish(&inner);
        Ok(value)
    }

    /// 未送信バイトの flush を要求する
    ///
    /// 送信中の flush があれば、その完了後に続けて flush する。完了は待たない。
    pub fn flush(&self) -> Result<(), ChannelError> {
        let mut inner = self.shared.inner.lock();
        if inner.state == ChannelState::Closed {
            return Err(closed_error(&inner));
        }
        if inner.in_flight.is_some() {
            inner.flush_requested = true;
        } else if !inner.buffer.is_empty() {
            self.shared.start_flush(&mut inner);
            self.shared.publish(&inner);
        }
        Ok(())
    }

    /// flush して、未送信バイトがすべてトランスポートに届くまで待つ
    ///
    /// # エラー
    /// 待っている間に閉じたら `ChannelError::Closed`、失敗で閉じたら `ChannelError::Transport`
    pub async fn flush_and_wait(&self) -> Result<(), ChannelError> {
        let mut status = self.shared.status.subscribe();
        self.flush()?;
        let closed = match status
            .wait_for(|s| s.drained || s.state == ChannelState::Closed)
            .await
        {
            Ok(s) => s.state == ChannelState::Closed,
            Err(_) => true,
        };
        if closed {
            Err(closed_error(&self.shared.inner.lock()))
        } else {
            Ok(())
        }
    }

    /// チャンネルを閉じる
    ///
    /// 未送信バイトは捨てる。送信中の flush は中断せず、その結果は捨てる。
    /// トランスポートの `close()` は driver タスクが呼ぶ。
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state == ChannelState::Closed {
            return;
        }
        let discarded = inner.buffer.len();
        inner.state = ChannelState::Closed;
        inner.buffer = BytesMut::new();
        inner.accumulating_since = None;
        inner.flush_requested = false;
        self.shared.publish(&inner);
        drop(inner);

        debug!(discarded, "buffered channel closed");
        let _ = self.shared.events.send(ChannelEvent::Close);
    }

    /// `Closed` になるまで待つ
    pub async fn closed(&self) {
        let mut status = self.shared.status.subscribe();
        let _ = status.wait_for(|s| s.state == ChannelState::Closed).await;
    }

    pub fn state(&self) -> ChannelState {
        self.shared.inner.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    /// 未送信バイト数（送信中の flush は含まない）
    pub fn buffered(&self) -> usize {
        self.shared.inner.lock().buffer.len()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.inner.lock().stats
    }
}

impl Drop for BufferedChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BufferedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("BufferedChannel")
            .field("state", &inner.state)
            .field("buffered", &inner.buffer.len())
            .field("in_flight", &inner.in_flight)
            .finish()
    }
}

fn closed_error(inner: &Inner) -> ChannelError {
    match &inner.failure {
        Some(failure) => ChannelError::Transport(failure.clone()),
        None => ChannelError::Closed,
    }
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        self.status.send_replace(ChannelStatus {
            state: inner.state,
            drained: inner.buffer.is_empty() && inner.in_flight.is_none(),
        });
    }

    /// バッファ全体を凍結して delivery タスクへ渡す（ロック内で呼ぶ）
    fn start_flush(&self, inner: &mut Inner) {
        let flush_id = inner.next_flush_id;
        inner.next_flush_id += 1;

        let payload = inner.buffer.split().freeze();
        let bytes = payload.len();
        let chunks = self.chunker.split(payload);

        inner.in_flight = Some(flush_id);
        inner.state = ChannelState::FlushPending;
        inner.flush_requested = false;
        inner.accumulating_since = None;
        inner.stats.flushes_started += 1;

        debug!(flush_id, bytes, chunks = chunks.len(), "flush started");
        self.runtime.spawn(deliver(
            Arc::clone(&self.transport),
            self.events.clone(),
            flush_id,
            chunks,
        ));
    }

    /// idle タイマーの期限（送信中の flush がある間はなし）
    fn idle_deadline(&self) -> Option<Instant> {
        let inner = self.inner.lock();
        if inner.state == ChannelState::Closed || inner.in_flight.is_some() {
            return None;
        }
        inner.accumulating_since.map(|since| since + self.idle_timeout)
    }

    fn on_idle_timeout(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed || inner.in_flight.is_some() {
            return;
        }
        if inner.buffer.is_empty() {
            inner.accumulating_since = None;
            return;
        }
        debug!(bytes = inner.buffer.len(), "idle timeout elapsed");
        self.start_flush(&mut inner);
        self.publish(&inner);
    }

    fn on_flush_succeeded(&self, flush_id: u64, bytes: usize, chunks: usize) {
        let mut inner = self.inner.lock();
        if inner.in_flight != Some(flush_id) {
            warn!(flush_id, in_flight = ?inner.in_flight, "completion for unknown flush ignored");
            return;
        }
        inner.in_flight = None;
        inner.stats.flushes_completed += 1;
        inner.stats.bytes_flushed += bytes as u64;
        inner.stats.chunks_sent += chunks as u64;
        debug!(flush_id, bytes, chunks, "flush completed");

        if inner.state != ChannelState::Closed {
            // 送信中に溜まった分は次のサイクルへ
            let pending = inner.buffer.len();
            if pending > 0 && (pending >= self.flush_threshold || inner.flush_requested) {
                self.start_flush(&mut inner);
            } else {
                inner.flush_requested = false;
                inner.state = if pending == 0 {
                    ChannelState::Idle
                } else {
                    ChannelState::Accumulating
                };
            }
        }
        self.publish(&inner);
    }

    /// # 戻り値
    /// この失敗でチャンネルを閉じたら true（すでに閉じていて結果を捨てたら false）
    fn on_flush_failed(&self, flush_id: u64, failure: &TransportError) -> bool {
        let mut inner = self.inner.lock();
        if inner.in_flight == Some(flush_id) {
            inner.in_flight = None;
        }
        if inner.state == ChannelState::Closed {
            debug!(flush_id, error = %failure, "flush failed after close, discarded");
            self.publish(&inner);
            return false;
        }

        error!(flush_id, error = %failure, "flush failed, closing channel");
        inner.state = ChannelState::Closed;
        inner.failure = Some(failure.clone());
        inner.buffer = BytesMut::new();
        inner.accumulating_since = None;
        inner.flush_requested = false;
        self.publish(&inner);
        true
    }

    async fn close_transport(&self) {
        match self.transport.close().await {
            Ok(()) => debug!("transport closed"),
            Err(err) => warn!(error = %err, "failed to close transport"),
        }
    }
}

/// driver タスク: idle タイマーと完了イベントを処理し、閉じたらトランスポートを閉じる
async fn drive(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
    let mut closing = false;
    loop {
        let deadline = if closing { None } else { shared.idle_deadline() };
        let event = match deadline {
            Some(deadline) => tokio::select! {
                event = events.recv() => event,
                () = time::sleep_until(deadline) => {
                    shared.on_idle_timeout();
                    continue;
                }
            },
            None => events.recv().await,
        };
        let Some(event) = event else { break };

        match event {
            ChannelEvent::Armed => {}
            ChannelEvent::FlushSucceeded {
                flush_id,
                bytes,
                chunks,
            } => shared.on_flush_succeeded(flush_id, bytes, chunks),
            ChannelEvent::FlushFailed { flush_id, error } => {
                if shared.on_flush_failed(flush_id, &error) {
                    shared.close_transport().await;
                    let hook = shared.inner.lock().on_failure.take();
                    if let Some(hook) = hook {
                        hook(error);
                    }
                    return;
                }
            }
            ChannelEvent::Close => closing = true,
        }

        if closing && shared.inner.lock().in_flight.is_none() {
            break;
        }
    }
    shared.close_transport().await;
}

/// delivery タスク: チャンクを順に送り、結果を driver へ知らせる
async fn deliver(
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    flush_id: u64,
    chunks: Vec<Bytes>,
) {
    let bytes = chunks.iter().map(Bytes::len).sum();
    let count = chunks.len();
    for chunk in chunks {
        if let Err(error) = transport.send(chunk).await {
            let _ = events.send(ChannelEvent::FlushFailed { flush_id, error });
            return;
        }
    }
    let _ = events.send(ChannelEvent::FlushSucceeded {
        flush_id,
        bytes,
        chunks: count,
    });
}
