//! (tag, value) → `[tag][payload]` のエンコーダ
//!
//! ## ペイロード
//!
//! ```text
//! NULL           : なし
//! BOOLEAN        : [0x02 = false | 0x03 = true]
//! BYTE/SHORT/INT : 1 / 2 / 4 バイト BE
//! LONG/DOUBLE    : 10 進テキストを short string として（長さは 1 バイト）
//! STRING_*       : [0x02][index: u16 BE]                 辞書にある場合
//!                  [0x00 | 0x01][len: u16 BE][bytes]     ASCII / UTF-8
//! JSON           : [len: i32 BE][JSON テキスト]          長さは書き終えてから埋める
//! ```
//!
//! 分岐は値の実行時型ではなくタグの宣言型で行う。

use std::sync::Arc;

use bytes::buf::Writer;
use bytes::{BufMut, BytesMut};
use tracing::{debug, error};

use pony_dictionary::StringDictionary;
use pony_json::number::{format_f64, format_i64};
use pony_json::{GeneratorError, JsonGenerator};
use pony_model::{
    BooleanModel, CharsetModel, ServerToClientModel, ValueType, MAX_DOCUMENT_LEN,
    MAX_NUMBER_TEXT_LEN, MAX_SHORT_STRING_LEN,
};

use crate::error::EncodeError;
use crate::value::Value;

/// `encode_document_into` のクロージャが受け取るジェネレータ
pub type DocumentGenerator<'a> = JsonGenerator<Writer<&'a mut BytesMut>>;

/// short string の長さフィールドの幅
#[derive(Debug, Clone, Copy)]
enum LengthPrefix {
    U8,
    U16,
}

/// ワイヤエンコーダ
///
/// 辞書を共有するだけで状態を持たないので、セッション間で使い回せる。
#[derive(Debug, Clone)]
pub struct WireEncoder {
    dictionary: Arc<StringDictionary>,
}

impl WireEncoder {
    pub fn new(dictionary: Arc<StringDictionary>) -> Self {
        WireEncoder { dictionary }
    }

    pub fn dictionary(&self) -> &StringDictionary {
        &self.dictionary
    }

    /// レコードを 1 つ `buf` の末尾に書く
    ///
    /// # エラー
    /// - `EncodeError::ProtocolMismatch`: 値がタグの宣言型に合わない（error ログを出す）
    /// - `EncodeError::PayloadTooLarge`: short string の長さ上限を超えた
    /// - `EncodeError::Generator`: JSON 文書に非有限値が含まれる
    ///
    /// エラー時は `buf` を呼び出し前の長さに戻す。
    pub fn encode_into(
        &self,
        buf: &mut BytesMut,
        tag: ServerToClientModel,
        value: &Value<'_>,
    ) -> Result<(), EncodeError> {
        debug!(tag = %tag, kind = value.kind(), "encode");
        let mark = buf.len();
        let result = self.write_record(buf, tag, value);
        if let Err(err) = &result {
            buf.truncate(mark);
            if let EncodeError::ProtocolMismatch { expected, found, .. } = err {
                error!(tag = %tag, expected = ?expected, found, "protocol mismatch, record dropped");
            }
        }
        result
    }

    /// JSON 文書レコードをジェネレータで直接組み立てる
    ///
    /// `build` はちょうど 1 つの値（通常はオブジェクト）を書くこと。
    ///
    /// # エラー
    /// - `EncodeError::ProtocolMismatch`: タグが JSON 型でない
    /// - `EncodeError::Generator`: 組み立て手順の誤り、または値が 1 つで閉じていない
    pub fn encode_document_into<F>(
        &self,
        buf: &mut BytesMut,
        tag: ServerToClientModel,
        build: F,
    ) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut DocumentGenerator<'_>) -> Result<(), GeneratorError>,
    {
        debug!(tag = %tag, kind = "document", "encode");
        if tag.value_type() != ValueType::Json {
            let err = mismatch(tag, "document");
            error!(tag = %tag, expected = ?tag.value_type(), "protocol mismatch, record dropped");
            return Err(err);
        }

        let mark = buf.len();
        buf.put_u8(tag.tag_byte());
        let result = write_document(buf, tag, build);
        if result.is_err() {
            buf.truncate(mark);
        }
        result
    }

    fn write_record(
        &self,
        buf: &mut BytesMut,
        tag: ServerToClientModel,
        value: &Value<'_>,
    ) -> Result<(), EncodeError> {
        let found = value.kind();
        buf.put_u8(tag.tag_byte());

        match tag.value_type() {
            ValueType::Null => match value {
                Value::Null => Ok(()),
                _ => Err(mismatch(tag, found)),
            },
            ValueType::Boolean => match *value {
                Value::Bool(b) => {
                    buf.put_u8(BooleanModel::from_bool(b).value());
                    Ok(())
                }
                _ => Err(mismatch(tag, found)),
            },
            ValueType::Byte => match *value {
                Value::Byte(b) => {
                    buf.put_u8(b);
                    Ok(())
                }
                _ => Err(mismatch(tag, found)),
            },
            ValueType::Short => {
                let v = value.as_i16().ok_or_else(|| mismatch(tag, found))?;
                buf.put_i16(v);
                Ok(())
            }
            ValueType::Integer => {
                let v = value.as_i32().ok_or_else(|| mismatch(tag, found))?;
                buf.put_i32(v);
                Ok(())
            }
            ValueType::Long => {
                let v = value.as_i64().ok_or_else(|| mismatch(tag, found))?;
                let text = format_i64(v);
                self.write_text(buf, tag, text.as_str(), MAX_NUMBER_TEXT_LEN, LengthPrefix::U8)
            }
            ValueType::Double => {
                let v = value.as_f64().ok_or_else(|| mismatch(tag, found))?;
                // 非有限値は NaN / Infinity / -Infinity のテキストになる
                let text = format_f64(v);
                self.write_text(buf, tag, text.as_str(), MAX_NUMBER_TEXT_LEN, LengthPrefix::U8)
            }
            ValueType::StringAscii | ValueType::StringUtf8 => match *value {
                Value::Str(s) => {
                    self.write_text(buf, tag, s, MAX_SHORT_STRING_LEN, LengthPrefix::U16)
                }
                // null は空文字列
                Value::Null => {
                    buf.put_u8(CharsetModel::Ascii.value());
                    buf.put_u16(0);
                    Ok(())
                }
                _ => Err(mismatch(tag, found)),
            },
            ValueType::Json => match *value {
                Value::Json(doc) => write_document(buf, tag, |json| json.write_document(doc)),
                _ => Err(mismatch(tag, found)),
            },
        }
    }

    /// short string を書く（辞書にあれば 2 バイト参照）
    fn write_text(
        &self,
        buf: &mut BytesMut,
        tag: ServerToClientModel,
        text: &str,
        limit: usize,
        prefix: LengthPrefix,
    ) -> Result<(), EncodeError> {
        if let Some(index) = self.dictionary.lookup(text) {
            buf.put_u8(CharsetModel::StringDictionary.value());
            buf.put_u16(index);
            return Ok(());
        }

        let bytes = text.as_bytes();
        if bytes.len() > limit {
            return Err(EncodeError::PayloadTooLarge {
                tag,
                len: bytes.len(),
                limit,
            });
        }

        // バイト長 == 文字数 なら ASCII
        let charset = if text.is_ascii() {
            CharsetModel::Ascii
        } else {
            CharsetModel::Utf8
        };
        buf.put_u8(charset.value());
        match prefix {
            LengthPrefix::U8 => buf.put_u8(bytes.len() as u8),
            LengthPrefix::U16 => buf.put_u16(bytes.len() as u16),
        }
        buf.put_slice(bytes);
        Ok(())
    }
}

/// `[len: i32 BE][JSON]` を書く。長さはジェネレータが書き終えてから埋める。
fn write_document<F>(buf: &mut BytesMut, tag: ServerToClientModel, build: F) -> Result<(), EncodeError>
where
    F: FnOnce(&mut DocumentGenerator<'_>) -> Result<(), GeneratorError>,
{
    let len_at = buf.len();
    buf.put_i32(0);
    let start = buf.len();

    {
        // BytesMut は伸長するので中間バッファは挟まない
        let mut json = JsonGenerator::unbuffered((&mut *buf).writer());
        build(&mut json)?;
        json.finish()?;
    }

    let len = buf.len() - start;
    if len > MAX_DOCUMENT_LEN {
        return Err(EncodeError::PayloadTooLarge {
            tag,
            len,
            limit: MAX_DOCUMENT_LEN,
        });
    }
    buf[len_at..start].copy_from_slice(&(len as i32).to_be_bytes());
    Ok(())
}

fn mismatch(tag: ServerToClientModel, found: &'static str) -> EncodeError {
    EncodeError::ProtocolMismatch {
        tag,
        expected: tag.value_type(),
        found,
    }
}
