//! # pony-model
//!
//! サーバー → ターミナル同期プロトコルのタグ表とマーカーバイト。
//!
//! ## レコードの Wire Format
//!
//! ```text
//! [tag: u8][payload...]
//!
//! payload はタグの宣言型で決まる:
//!   NULL          : なし
//!   BOOLEAN       : [BooleanModel: u8]
//!   BYTE/SHORT/INT: 1/2/4 バイト BE
//!   LONG/DOUBLE   : [charset: u8][len: u8][10進テキスト] または [0x02][index: u16 BE]
//!   STRING_*      : [charset: u8][len: u16 BE][bytes]    または [0x02][index: u16 BE]
//!   JSON          : [len: i32 BE][UTF-8 JSON]
//! ```
//!
//! タグ表はプロセス内で不変。新しいタグは末尾に追記する。

pub mod error;
pub mod model;
pub mod registry;
pub mod value_type;

pub use error::ModelError;
pub use model::ServerToClientModel;
pub use registry::{TagEntry, TagRegistry};
pub use value_type::{BooleanModel, CharsetModel, ValueType};

/// short string の最大バイト数（2 バイト長）
pub const MAX_SHORT_STRING_LEN: usize = u16::MAX as usize;

/// LONG / DOUBLE テキストの最大バイト数（1 バイト長）
pub const MAX_NUMBER_TEXT_LEN: usize = u8::MAX as usize;

/// JSON 文書の最大バイト数（4 バイト符号付き長）
pub const MAX_DOCUMENT_LEN: usize = i32::MAX as usize;
