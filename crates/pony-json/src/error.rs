//! pony-json エラー型

use thiserror::Error;

use crate::generator::Scope;

/// ジェネレータのエラー
///
/// `IllegalState` と `NonFiniteNumber` は呼び出し側のプログラミングミスで、
/// 回復せずにそのまま呼び出し元へ返す。
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// 現在のネスト位置では呼べない操作
    #[error("illegal generator call `{method}` in {scope:?} scope")]
    IllegalState { method: &'static str, scope: Scope },

    /// NaN / Infinity は JSON で表現できない
    #[error("non-finite number {0} cannot be represented in JSON")]
    NonFiniteNumber(f64),

    /// シンクへの書き込み失敗
    #[error("failed to write generated JSON: {0}")]
    Io(#[from] std::io::Error),
}
