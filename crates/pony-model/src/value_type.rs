//! 値の型とマーカーバイト
//!
//! ## Short string の Wire Format
//! ```text
//! [charset: u8][length: u16 BE][bytes...]      (ASCII / UTF-8)
//! [charset: u8 = 0x02][index: u16 BE]          (辞書参照)
//! ```
//! LONG / DOUBLE は同じ形で長さが 1 バイト（`[charset][length: u8][bytes]`）。

use crate::error::ModelError;

/// タグごとに固定されたプリミティブ型
///
/// エンコーダは渡された値の実行時型ではなく、この宣言型で分岐する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    /// タグバイトのみ
    Null,
    /// 1 バイト（`BooleanModel`）
    Boolean,
    /// 1 バイト
    Byte,
    /// 2 バイト BE
    Short,
    /// 4 バイト BE
    Integer,
    /// 10 進テキスト（1 バイト長の short string）
    Long,
    /// 10 進テキスト（1 バイト長の short string）
    Double,
    /// 2 バイト長の short string（ASCII 想定）
    StringAscii,
    /// 2 バイト長の short string
    StringUtf8,
    /// 4 バイト長の JSON 文書
    Json,
}

impl ValueType {
    /// 文字列 / 数値テキストとして short string 経路で送る型か
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ValueType::Long | ValueType::Double | ValueType::StringAscii | ValueType::StringUtf8
        )
    }

    /// 固定長ペイロードのバイト数（可変長なら `None`）
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ValueType::Null => Some(0),
            ValueType::Boolean | ValueType::Byte => Some(1),
            ValueType::Short => Some(2),
            ValueType::Integer => Some(4),
            _ => None,
        }
    }
}

/// BOOLEAN ペイロードの番兵値
///
/// 生の 0/1 ではなく専用の値を使い、欠落したバイトと区別できるようにする。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BooleanModel {
    False = 0x02,
    True = 0x03,
}

impl BooleanModel {
    pub fn from_bool(value: bool) -> Self {
        if value {
            BooleanModel::True
        } else {
            BooleanModel::False
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, ModelError> {
        match byte {
            0x02 => Ok(BooleanModel::False),
            0x03 => Ok(BooleanModel::True),
            _ => Err(ModelError::UnknownMarker { kind: "boolean", byte }),
        }
    }

    pub fn as_bool(self) -> bool {
        self == BooleanModel::True
    }
}

/// short string 先頭の文字セット / 辞書参照マーカー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CharsetModel {
    /// 全文字が 1 バイト
    Ascii = 0x00,
    /// マルチバイト文字を含む UTF-8
    Utf8 = 0x01,
    /// 続く 2 バイトが辞書インデックス
    StringDictionary = 0x02,
}

impl CharsetModel {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, ModelError> {
        match byte {
            0x00 => Ok(CharsetModel::Ascii),
            0x01 => Ok(CharsetModel::Utf8),
            0x02 => Ok(CharsetModel::StringDictionary),
            _ => Err(ModelError::UnknownMarker { kind: "charset", byte }),
        }
    }
}
