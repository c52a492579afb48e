//! # pony-pusher
//!
//! セッション単位でタグ付きレコードをエンコードし、自動 flush バッファへ流す。
//!
//! ## 内部アーキテクチャ
//!
//! ```text
//! Pusher
//!   ├── WireEncoder     (pony-pusher)    - (tag, value) → [tag][payload]
//!   │     ├── StringDictionary (pony-dictionary) - 頻出文字列を 2 バイト参照に
//!   │     └── JsonGenerator    (pony-json)       - JSON 文書をバッファへ直接書く
//!   └── BufferedChannel (pony-transport) - 閾値 / 明示 / idle で flush、チャンク分割して送信
//! ```
//!
//! `WireReader` は同じ規則の逆変換で、ワイヤ契約の検証とツール用。
//!
//! ## エラーの扱い
//!
//! - `EncodeError::ProtocolMismatch`: タグの宣言型と値が合わない。ログに残し、何も書かない
//! - `EncodeError::PayloadTooLarge`: short string の上限超え。呼び出し元が JSON 文書に切り替える
//! - `EncodeError::Generator`: 文書の組み立て手順の誤り
//! - トランスポートの失敗だけがセッションにとって致命的で、`Session::on_destroy` が呼ばれる

pub mod config;
pub mod encoder;
pub mod error;
pub mod pusher;
pub mod reader;
pub mod value;

pub use config::PusherConfig;
pub use encoder::{DocumentGenerator, WireEncoder};
pub use error::{ConfigError, EncodeError, ReadError};
pub use pusher::{Pusher, Session};
pub use reader::{Decoded, Record, StringForm, WireReader};
pub use value::Value;

pub use pony_dictionary::StringDictionary;
pub use pony_model::ServerToClientModel;
pub use pony_transport::{ChannelConfig, ChannelState, ChannelStats, Transport};
