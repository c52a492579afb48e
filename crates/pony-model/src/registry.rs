//! タグ表の起動時検証
//!
//! 序数は `ServerToClientModel` に明示的に書かれているが、宣言順と一致しない
//! 序数や 1 バイトに収まらない序数はワイヤ契約を壊す。組み込みのタグ表は
//! コンパイル時に検証済みで、`TagRegistry` は序数 → 型の対応表を実行時に
//! 引きたい側（デコーダやツール）のためのもの。

use crate::error::ModelError;
use crate::model::ServerToClientModel;
use crate::value_type::ValueType;

/// 序数 → 型の対応 1 件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEntry {
    pub tag: ServerToClientModel,
    pub ordinal: u16,
    pub value_type: ValueType,
}

/// 検証済みのタグ表
#[derive(Debug, Clone)]
pub struct TagRegistry {
    entries: Vec<TagEntry>,
}

impl TagRegistry {
    /// タグ表を構築し、検証する
    ///
    /// # エラー
    /// - `ModelError::NonContiguous`: i 番目のタグの序数が i でない
    /// - `ModelError::OrdinalTooWide`: 序数が 1 バイトのタグ値を超える
    pub fn new() -> Result<Self, ModelError> {
        let entries: Vec<TagEntry> = ServerToClientModel::ALL
            .iter()
            .map(|&tag| TagEntry {
                tag,
                ordinal: tag.ordinal(),
                value_type: tag.value_type(),
            })
            .collect();

        let registry = TagRegistry { entries };
        registry.validate()?;
        Ok(registry)
    }

    /// 序数の連続性と幅を確認する
    pub fn validate(&self) -> Result<(), ModelError> {
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.ordinal as usize != position {
                return Err(ModelError::NonContiguous {
                    tag: entry.tag.name(),
                    ordinal: entry.ordinal,
                    position,
                });
            }
            if entry.ordinal > u8::MAX as u16 {
                return Err(ModelError::OrdinalTooWide {
                    tag: entry.tag.name(),
                    ordinal: entry.ordinal,
                });
            }
        }
        Ok(())
    }

    /// 序数 → タグ
    pub fn tag_from_ordinal(&self, ordinal: u16) -> Result<ServerToClientModel, ModelError> {
        self.entries
            .get(ordinal as usize)
            .map(|entry| entry.tag)
            .ok_or(ModelError::OutOfRange {
                ordinal,
                count: self.entries.len(),
            })
    }

    /// タグ → 宣言型（全域関数）
    pub fn type_of(&self, tag: ServerToClientModel) -> ValueType {
        tag.value_type()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }
}
