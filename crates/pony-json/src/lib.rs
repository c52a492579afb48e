//! # pony-json
//!
//! 中間の文書ツリーを作らずに JSON テキストを直接シンクへ書き出すジェネレータ。
//!
//! 構造化値はプリミティブなフィールドからその場で組み立てられることが多く、
//! エンコードのホットパスでツリー確保のコストを払わないためのもの。
//!
//! ## 使い方
//!
//! ```
//! use pony_json::JsonGenerator;
//!
//! let mut json = JsonGenerator::new(Vec::new());
//! json.start_object()?
//!     .write_key("id")?.write_i32(7)?
//!     .write_key("tags")?.start_array()?.write_str("a")?.write_null()?.end()?
//!     .end()?;
//! json.finish()?;
//! assert_eq!(json.into_inner(), br#"{"id":7,"tags":["a",null]}"#);
//! # Ok::<(), pony_json::GeneratorError>(())
//! ```

pub mod error;
pub mod generator;
pub mod number;

pub use error::GeneratorError;
pub use generator::{JsonGenerator, Scope};
pub use number::NumberText;

/// 内部バッファのバイト数（これを超えるとシンクへ書き出す）
pub const BUFFER_SIZE: usize = 4096;
