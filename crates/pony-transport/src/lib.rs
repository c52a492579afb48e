//! # pony-transport
//!
//! プロデューサの同期的な書き込みと、遅いかもしれない非同期トランスポートを
//! 切り離す自動 flush バッファ。
//!
//! ## 構成
//!
//! ```text
//! producer ──append──▶ BufferedChannel ──flush──▶ Chunker ──chunk──▶ Transport
//!                         │    ▲                                 │
//!                         │    └── FlushSucceeded / FlushFailed ─┘
//!                         ▼
//!                    driver タスク（idle タイマー、完了イベントの処理）
//! ```
//!
//! ## 状態遷移
//!
//! ```text
//! Idle ──最初の append──▶ Accumulating ──閾値 / flush() / idle タイマー──▶ FlushPending
//!  ▲                                                                      │
//!  └───────────────────────── 送信完了 ───────────────────────────────────┘
//!
//! FlushPending ──送信失敗──▶ Closed（終端、再送なし）
//! 任意の状態   ──close()──▶ Closed
//! ```
//!
//! 同時に送信中の flush は最大 1 つ。送信中に追記されたバイトは次のサイクルで送る。
//! トランスポートへ届くバイト順は追記順と常に一致する。

pub mod channel;
pub mod chunk;
pub mod config;
pub mod error;
pub mod stream;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use channel::{BufferedChannel, ChannelState, ChannelStats, FailureHook};
pub use chunk::Chunker;
pub use config::ChannelConfig;
pub use error::{ChannelError, TransportError};
pub use stream::StreamTransport;
pub use transport::Transport;
