//! pony-model エラー型

use thiserror::Error;

/// タグ表・マーカーバイトのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// 登録数を超えるタグ序数（デコーダ側でストリーム破損を検出する唯一の箇所）
    #[error("tag ordinal {ordinal} out of range ({count} tags registered)")]
    OutOfRange { ordinal: u16, count: usize },

    /// タグ表の序数が宣言順と一致しない（起動時検証）
    #[error("tag registry is not contiguous: {tag} declares ordinal {ordinal} at position {position}")]
    NonContiguous {
        tag: &'static str,
        ordinal: u16,
        position: usize,
    },

    /// 1 バイトのタグ値に収まらない序数
    #[error("tag {tag} has ordinal {ordinal}, which does not fit the 1-byte tag field")]
    OrdinalTooWide { tag: &'static str, ordinal: u16 },

    /// 未知のマーカーバイト
    #[error("unknown {kind} marker byte 0x{byte:02x}")]
    UnknownMarker { kind: &'static str, byte: u8 },
}
