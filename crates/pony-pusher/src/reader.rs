//! ワイヤバイト列のデコーダ
//!
//! `WireEncoder` の逆変換。端末側のデコーダと同じ規則でレコード列を読み、
//! ワイヤ契約の検証やキャプチャの解析に使う。

use pony_dictionary::StringDictionary;
use pony_model::{BooleanModel, CharsetModel, ServerToClientModel, ValueType};

use crate::error::ReadError;

/// short string がどの形で送られていたか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringForm {
    /// 辞書参照（インデックス）
    Dictionary(u16),
    Ascii,
    Utf8,
}

/// デコードした値
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Null,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Double(f64),
    Text { text: String, form: StringForm },
    Json(serde_json::Value),
}

/// 1 レコード
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub tag: ServerToClientModel,
    pub value: Decoded,
}

/// レコード列のリーダー
///
/// `Iterator` として使える。エラーを返した後は `None` を返し続ける
/// （レコード境界を見失っているため）。
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    dictionary: &'a StringDictionary,
    failed: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8], dictionary: &'a StringDictionary) -> Self {
        WireReader {
            bytes,
            pos: 0,
            dictionary,
            failed: false,
        }
    }

    /// 読み終えたバイト数
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// 次のレコードを読む（入力の終わりなら `Ok(None)`）
    ///
    /// # エラー
    /// - `ReadError::Model`: 未登録のタグ、未知のマーカーバイト
    /// - `ReadError::Truncated`: レコードの途中で入力が尽きた
    /// - その他、辞書参照・テキスト・数値・JSON の不正
    pub fn next_record(&mut self) -> Result<Option<Record>, ReadError> {
        if self.pos == self.bytes.len() {
            return Ok(None);
        }
        let tag = ServerToClientModel::from_raw(self.u8()? as u16)?;
        let value = match tag.value_type() {
            ValueType::Null => Decoded::Null,
            ValueType::Boolean => Decoded::Bool(BooleanModel::from_byte(self.u8()?)?.as_bool()),
            ValueType::Byte => Decoded::Byte(self.u8()?),
            ValueType::Short => Decoded::Short(i16::from_be_bytes(self.array()?)),
            ValueType::Integer => Decoded::Int(i32::from_be_bytes(self.array()?)),
            ValueType::Long => {
                let (text, _) = self.short_string(true)?;
                let value = text.parse::<i64>().map_err(|_| ReadError::InvalidNumber {
                    kind: "long",
                    text: text.clone(),
                })?;
                Decoded::Long(value)
            }
            ValueType::Double => {
                let (text, _) = self.short_string(true)?;
                Decoded::Double(parse_double(&text)?)
            }
            ValueType::StringAscii | ValueType::StringUtf8 => {
                let (text, form) = self.short_string(false)?;
                Decoded::Text { text, form }
            }
            ValueType::Json => {
                let len = i32::from_be_bytes(self.array()?);
                if len < 0 {
                    return Err(ReadError::NegativeLength(len));
                }
                let body = self.take(len as usize)?;
                Decoded::Json(serde_json::from_slice(body)?)
            }
        };
        Ok(Some(Record { tag, value }))
    }

    /// `[charset][len][bytes]` または `[0x02][index]`
    fn short_string(&mut self, byte_length: bool) -> Result<(String, StringForm), ReadError> {
        let form = match CharsetModel::from_byte(self.u8()?)? {
            CharsetModel::StringDictionary => {
                let index = u16::from_be_bytes(self.array()?);
                let text = self
                    .dictionary
                    .get(index)
                    .ok_or(ReadError::UnknownDictionaryIndex {
                        index,
                        len: self.dictionary.len(),
                    })?;
                return Ok((text.to_owned(), StringForm::Dictionary(index)));
            }
            CharsetModel::Ascii => StringForm::Ascii,
            CharsetModel::Utf8 => StringForm::Utf8,
        };

        let len = if byte_length {
            self.u8()? as usize
        } else {
            u16::from_be_bytes(self.array()?) as usize
        };
        let offset = self.pos;
        let raw = self.take(len)?;
        let text = std::str::from_utf8(raw).map_err(|_| ReadError::InvalidUtf8 { offset })?;
        Ok((text.to_owned(), form))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let available = self.bytes.len() - self.pos;
        if available < len {
            return Err(ReadError::Truncated {
                offset: self.pos,
                needed: len - available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

impl Iterator for WireReader<'_> {
    type Item = Result<Record, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn parse_double(text: &str) -> Result<f64, ReadError> {
    match text {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        _ => text.parse::<f64>().map_err(|_| ReadError::InvalidNumber {
            kind: "double",
            text: text.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pony_model::ModelError;

    fn read_all(bytes: &[u8], dictionary: &StringDictionary) -> Vec<Result<Record, ReadError>> {
        WireReader::new(bytes, dictionary).collect()
    }

    #[test]
    fn test_reads_mixed_records() {
        let dictionary = StringDictionary::from_lines(["left", "right"]);
        let mut bytes = vec![ServerToClientModel::Heartbeat.tag_byte()];
        bytes.extend_from_slice(&[ServerToClientModel::WordWrap.tag_byte(), 0x03]);
        bytes.extend_from_slice(&[ServerToClientModel::PutStyleKey.tag_byte(), 0x02, 0x00, 0x01]);
        bytes.extend_from_slice(&[ServerToClientModel::Text.tag_byte(), 0x00, 0x00, 0x02, b'h', b'i']);
        bytes.extend_from_slice(&[ServerToClientModel::Date.tag_byte(), 0x00, 0x02, b'4', b'2']);

        let records: Vec<Record> = read_all(&bytes, &dictionary)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[1].value, Decoded::Bool(true));
        assert_eq!(
            records[2].value,
            Decoded::Text {
                text: "right".into(),
                form: StringForm::Dictionary(1)
            }
        );
        assert_eq!(
            records[3].value,
            Decoded::Text {
                text: "hi".into(),
                form: StringForm::Ascii
            }
        );
        assert_eq!(records[4].value, Decoded::Long(42));
    }

    #[test]
    fn test_out_of_range_tag() {
        let dictionary = StringDictionary::empty();
        let results = read_all(&[0xFF], &dictionary);
        assert!(matches!(
            results.as_slice(),
            [Err(ReadError::Model(ModelError::OutOfRange { ordinal: 255, .. }))]
        ));
    }

    #[test]
    fn test_truncated_record_stops_iteration() {
        let dictionary = StringDictionary::empty();
        let bytes = [ServerToClientModel::WidgetId.tag_byte(), 0x00, 0x01];
        let mut reader = WireReader::new(&bytes, &dictionary);
        assert!(matches!(
            reader.next(),
            Some(Err(ReadError::Truncated { offset: 1, needed: 2 }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_unknown_markers() {
        let dictionary = StringDictionary::empty();
        let bad_bool = [ServerToClientModel::WordWrap.tag_byte(), 0x01];
        assert!(matches!(
            read_all(&bad_bool, &dictionary).as_slice(),
            [Err(ReadError::Model(ModelError::UnknownMarker { kind: "boolean", .. }))]
        ));

        let bad_index = [ServerToClientModel::Text.tag_byte(), 0x02, 0x00, 0x05];
        assert!(matches!(
            read_all(&bad_index, &dictionary).as_slice(),
            [Err(ReadError::UnknownDictionaryIndex { index: 5, len: 0 })]
        ));
    }

    #[test]
    fn test_double_spellings() {
        assert!(parse_double("NaN").unwrap().is_nan());
        assert_eq!(parse_double("-Infinity").unwrap(), f64::NEG_INFINITY);
        assert_eq!(parse_double("1e300").unwrap(), 1e300);
        assert!(matches!(parse_double("abc"), Err(ReadError::InvalidNumber { kind: "double", .. })));
    }

    #[test]
    fn test_json_record() {
        let dictionary = StringDictionary::empty();
        let body = br#"{"k":[1,2]}"#;
        let mut bytes = vec![ServerToClientModel::Native.tag_byte()];
        bytes.extend_from_slice(&(body.len() as i32).to_be_bytes());
        bytes.extend_from_slice(body);

        let mut reader = WireReader::new(&bytes, &dictionary);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.value, Decoded::Json(serde_json::json!({"k": [1, 2]})));
        assert_eq!(reader.remaining(), 0);
        assert!(reader.next_record().unwrap().is_none());
    }
}
