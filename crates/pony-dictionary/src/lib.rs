//! # pony-dictionary
//!
//! 既知文字列の辞書（文字列 → 2 バイトインデックス）。
//!
//! UI プロトコルは少数のフィールド名・定数文字列を大量に繰り返すので、
//! 辞書に載っている文字列は生バイトの代わりに `[0x02][index: u16 BE]` で送る。
//! これが主な圧縮手段になる。
//!
//! ## ライフサイクル
//!
//! ```text
//! 起動時: 改行区切りのソースから一度だけ構築（読めなければ空の辞書で続行）
//! 以降  : Arc<StringDictionary> として全エンコーダで読み取り専用に共有
//! 接続時: snapshot() の JSON を予約タグで最初に送り、端末側が参照を解決できるようにする
//! ```

pub mod dictionary;

pub use dictionary::StringDictionary;

/// スナップショット JSON のキー
pub const SNAPSHOT_KEY: &str = "dictio";

/// 2 バイトインデックスで参照できる最大エントリ数
pub const MAX_ENTRIES: usize = u16::MAX as usize + 1;
