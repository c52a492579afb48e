//! pony-pusher エラー型

use std::path::PathBuf;

use thiserror::Error;

use pony_json::GeneratorError;
use pony_model::{ModelError, ServerToClientModel, ValueType};
use pony_transport::ChannelError;

/// エンコードのエラー
///
/// どのエラーでも、そのレコードのバイトはバッファに残らない。
#[derive(Debug, Error)]
pub enum EncodeError {
    /// タグの宣言型で表せない値（呼び出し側の不具合）
    #[error("tag {tag} is declared {expected:?} but a {found} value was supplied")]
    ProtocolMismatch {
        tag: ServerToClientModel,
        expected: ValueType,
        found: &'static str,
    },

    /// short string / 数値テキスト / 文書の長さ上限超え
    #[error("payload of {len} bytes for tag {tag} exceeds the {limit}-byte limit, send it as a JSON document instead")]
    PayloadTooLarge {
        tag: ServerToClientModel,
        len: usize,
        limit: usize,
    },

    /// JSON 文書の組み立て誤り / 非有限値
    #[error("json document error: {0}")]
    Generator(#[from] GeneratorError),

    /// チャンネルが閉じている、または満杯
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// `WireReader` のエラー
#[derive(Debug, Error)]
pub enum ReadError {
    /// 未登録のタグ序数 / 未知のマーカーバイト
    #[error(transparent)]
    Model(#[from] ModelError),

    /// レコードの途中で入力が尽きた
    #[error("record truncated at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    /// 辞書にないインデックス
    #[error("dictionary index {index} is not in the dictionary ({len} entries)")]
    UnknownDictionaryIndex { index: u16, len: usize },

    /// 文字列が UTF-8 でない
    #[error("invalid utf-8 text at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// 数値テキストが読めない
    #[error("invalid {kind} text {text:?}")]
    InvalidNumber { kind: &'static str, text: String },

    /// 負の文書長
    #[error("negative document length {0}")]
    NegativeLength(i32),

    /// JSON 文書が読めない
    #[error("invalid json document: {0}")]
    Json(#[from] serde_json::Error),
}

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ChannelError),
}
