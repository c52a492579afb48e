//! JSON ジェネレータ本体
//!
//! ## ネスト位置の管理
//!
//! ```text
//! current: 現在のフレーム (scope, first)
//! stack  : 外側のフレーム
//!
//! start_object / start_array → current を push して新しいフレームへ
//! write_key                  → current を push して Field フレームへ（値を 1 つ書くと pop）
//! end                        → ']' / '}' を書いて pop
//! ```
//!
//! 値を書く前に「ここに値を書けるか」を確認し、書けなければ即座に
//! `GeneratorError::IllegalState` を返す。区切りのカンマは各フレームの
//! 2 番目以降の要素の前にだけ書く。

use std::fmt;
use std::io::Write;

use serde_json::{Map, Number, Value};

use crate::error::GeneratorError;
use crate::number::{format_f64, format_i64, format_u64};
use crate::BUFFER_SIZE;

/// ネストの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 文書の外（トップレベル）
    None,
    /// オブジェクト内でキー待ち
    Object,
    /// 配列内
    Array,
    /// キーを書いた直後で値待ち
    Field,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    scope: Scope,
    first: bool,
}

impl Frame {
    const TOP: Frame = Frame {
        scope: Scope::None,
        first: true,
    };

    fn fresh(scope: Scope) -> Self {
        Frame { scope, first: true }
    }
}

type Result<T> = std::result::Result<T, GeneratorError>;

/// ストリーミング JSON ジェネレータ
///
/// 出力は固定長の再利用バッファ（`BUFFER_SIZE`）に溜め、溢れる前にシンクへ書き出す。
/// 大きな文書もメモリ上に全体を持たずに流れる。シンク自体が伸長するメモリバッファ
/// なら `unbuffered` で中間バッファを省ける。
pub struct JsonGenerator<W: Write> {
    sink: W,
    buf: Box<[u8]>,
    len: usize,
    current: Frame,
    stack: Vec<Frame>,
}

impl<W: Write> JsonGenerator<W> {
    pub fn new(sink: W) -> Self {
        JsonGenerator {
            sink,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            len: 0,
            current: Frame::TOP,
            stack: Vec::new(),
        }
    }

    /// 中間バッファを持たず、書いたバイトをそのままシンクへ渡す
    pub fn unbuffered(sink: W) -> Self {
        JsonGenerator {
            sink,
            buf: Box::default(),
            len: 0,
            current: Frame::TOP,
            stack: Vec::new(),
        }
    }

    // ===== 文書単位の書き込み =====

    /// 任意の値を 1 つの文書として書き、シンクへ書き出す
    pub fn write_document(&mut self, value: &Value) -> Result<()> {
        self.begin_document("write_document")?;
        self.write_value(value)?;
        self.flush()
    }

    /// オブジェクトを 1 つの文書として書く
    pub fn write_object(&mut self, fields: &Map<String, Value>) -> Result<()> {
        self.begin_document("write_object")?;
        self.start_object()?;
        for (name, value) in fields {
            self.write_field(name, value)?;
        }
        self.end()?;
        self.flush()
    }

    /// 配列を 1 つの文書として書く
    pub fn write_array(&mut self, elements: &[Value]) -> Result<()> {
        self.begin_document("write_array")?;
        self.start_array()?;
        for element in elements {
            self.write_value(element)?;
        }
        self.end()?;
        self.flush()
    }

    // ===== 逐次 API =====

    pub fn start_object(&mut self) -> Result<&mut Self> {
        self.check_container_position("start_object")?;
        self.write_comma()?;
        self.push_byte(b'{')?;
        self.stack.push(self.current);
        self.current = Frame::fresh(Scope::Object);
        Ok(self)
    }

    pub fn start_array(&mut self) -> Result<&mut Self> {
        self.check_container_position("start_array")?;
        self.write_comma()?;
        self.push_byte(b'[')?;
        self.stack.push(self.current);
        self.current = Frame::fresh(Scope::Array);
        Ok(self)
    }

    /// フィールド名を書く。次に書く値がこのフィールドの値になる。
    pub fn write_key(&mut self, name: &str) -> Result<&mut Self> {
        if self.current.scope != Scope::Object {
            return Err(self.illegal("write_key"));
        }
        self.write_comma()?;
        self.write_escaped(name)?;
        self.push_byte(b':')?;
        self.stack.push(self.current);
        self.current = Frame::fresh(Scope::Field);
        Ok(self)
    }

    /// `name: value` を書く（value は入れ子でもよい）
    pub fn write_field(&mut self, name: &str, value: &Value) -> Result<&mut Self> {
        self.write_key(name)?;
        self.write_value(value)?;
        Ok(self)
    }

    /// 配列要素を 1 つ書く
    pub fn write_element(&mut self, value: &Value) -> Result<&mut Self> {
        if self.current.scope != Scope::Array {
            return Err(self.illegal("write_element"));
        }
        self.write_value(value)?;
        Ok(self)
    }

    /// 現在のオブジェクト / 配列を閉じる
    pub fn end(&mut self) -> Result<&mut Self> {
        let close = match self.current.scope {
            Scope::Object => b'}',
            Scope::Array => b']',
            // トップレベル、またはキーの値がまだない
            Scope::None | Scope::Field => return Err(self.illegal("end")),
        };
        self.push_byte(close)?;
        self.current = self.stack.pop().unwrap_or(Frame::TOP);
        self.pop_field();
        Ok(self)
    }

    pub fn write_null(&mut self) -> Result<&mut Self> {
        self.scalar("write_null", b"null")
    }

    pub fn write_bool(&mut self, value: bool) -> Result<&mut Self> {
        let text: &[u8] = if value { b"true" } else { b"false" };
        self.scalar("write_bool", text)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<&mut Self> {
        self.scalar("write_i32", format_i64(value as i64).as_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<&mut Self> {
        self.scalar("write_i64", format_i64(value).as_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.scalar("write_u64", format_u64(value).as_bytes())
    }

    /// # エラー
    /// - `GeneratorError::NonFiniteNumber`: NaN / ±Infinity
    pub fn write_f64(&mut self, value: f64) -> Result<&mut Self> {
        if !value.is_finite() {
            return Err(GeneratorError::NonFiniteNumber(value));
        }
        self.scalar("write_f64", format_f64(value).as_bytes())
    }

    pub fn write_str(&mut self, value: &str) -> Result<&mut Self> {
        self.check_value_position("write_str")?;
        self.write_comma()?;
        self.write_escaped(value)?;
        self.pop_field();
        Ok(self)
    }

    /// 値を 1 つ書く（現在位置で値が書ける場合のみ）
    pub fn write_value(&mut self, value: &Value) -> Result<&mut Self> {
        match value {
            Value::Null => self.write_null()?,
            Value::Bool(b) => self.write_bool(*b)?,
            Value::Number(n) => self.write_number(n)?,
            Value::String(s) => self.write_str(s)?,
            Value::Array(items) => {
                self.start_array()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.end()?
            }
            Value::Object(fields) => {
                self.start_object()?;
                for (name, field) in fields {
                    self.write_field(name, field)?;
                }
                self.end()?
            }
        };
        Ok(self)
    }

    /// トップレベルの文書が 1 つ書き終わっているか
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && self.current.scope == Scope::None && !self.current.first
    }

    /// 現在のネストの深さ
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// 文書が閉じていることを確認してシンクへ書き出す
    pub fn finish(&mut self) -> Result<()> {
        if !self.is_complete() {
            return Err(self.illegal("finish"));
        }
        self.flush()
    }

    /// バッファをシンクへ書き出す
    pub fn flush(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.sink.flush()?;
        Ok(())
    }

    /// シンクを取り出す（未書き出しのバッファは捨てる。先に `flush` すること）
    pub fn into_inner(self) -> W {
        self.sink
    }

    // ===== 位置の検査 =====

    fn begin_document(&mut self, method: &'static str) -> Result<()> {
        if !self.stack.is_empty() || self.current.scope != Scope::None {
            return Err(self.illegal(method));
        }
        self.current = Frame::TOP;
        Ok(())
    }

    fn check_value_position(&self, method: &'static str) -> Result<()> {
        let allowed = match self.current.scope {
            Scope::Array | Scope::Field => true,
            Scope::None => self.current.first,
            // キーなしの値
            Scope::Object => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(self.illegal(method))
        }
    }

    fn check_container_position(&self, method: &'static str) -> Result<()> {
        self.check_value_position(method)
    }

    fn illegal(&self, method: &'static str) -> GeneratorError {
        GeneratorError::IllegalState {
            method,
            scope: self.current.scope,
        }
    }

    fn write_number(&mut self, n: &Number) -> Result<&mut Self> {
        if let Some(i) = n.as_i64() {
            self.write_i64(i)
        } else if let Some(u) = n.as_u64() {
            self.write_u64(u)
        } else {
            self.write_f64(n.as_f64().unwrap_or(f64::NAN))
        }
    }

    fn scalar(&mut self, method: &'static str, text: &[u8]) -> Result<&mut Self> {
        self.check_value_position(method)?;
        self.write_comma()?;
        self.push_bytes(text)?;
        self.pop_field();
        Ok(self)
    }

    /// Field フレームは値を 1 つ書いたら閉じる
    fn pop_field(&mut self) {
        if self.current.scope == Scope::Field {
            self.current = self.stack.pop().unwrap_or(Frame::TOP);
        }
    }

    fn write_comma(&mut self) -> Result<()> {
        if !self.current.first && self.current.scope != Scope::Field {
            self.push_byte(b',')?;
        }
        self.current.first = false;
        Ok(())
    }

    // ===== 文字列エスケープ =====

    /// 印字可能 ASCII（'"' と '\\' を除く）はそのまま、それ以外はエスケープする
    fn write_escaped(&mut self, s: &str) -> Result<()> {
        self.push_byte(b'"')?;
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            // エスケープ不要な区間をまとめて書く
            let begin = i;
            while i < bytes.len() && is_plain(bytes[i]) {
                i += 1;
            }
            if begin < i {
                self.push_bytes(&bytes[begin..i])?;
            }
            if i == bytes.len() {
                break;
            }

            let b = bytes[i];
            match b {
                b'"' => self.push_bytes(b"\\\"")?,
                b'\\' => self.push_bytes(b"\\\\")?,
                b'\n' => self.push_bytes(b"\\n")?,
                b'\r' => self.push_bytes(b"\\r")?,
                b'\t' => self.push_bytes(b"\\t")?,
                0x08 => self.push_bytes(b"\\b")?,
                0x0C => self.push_bytes(b"\\f")?,
                _ if b < 0x80 => self.push_unicode_escape(b as u16)?,
                _ => {
                    // i は常に文字境界
                    let c = s[i..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER);
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        self.push_unicode_escape(*unit)?;
                    }
                    i += c.len_utf8();
                    continue;
                }
            }
            i += 1;
        }
        self.push_byte(b'"')
    }

    fn push_unicode_escape(&mut self, unit: u16) -> Result<()> {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let escaped = [
            b'\\',
            b'u',
            HEX[(unit >> 12) as usize & 0xF],
            HEX[(unit >> 8) as usize & 0xF],
            HEX[(unit >> 4) as usize & 0xF],
            HEX[unit as usize & 0xF],
        ];
        self.push_bytes(&escaped)
    }

    // ===== バッファ =====

    fn push_byte(&mut self, b: u8) -> Result<()> {
        if self.buf.is_empty() {
            self.sink.write_all(&[b])?;
            return Ok(());
        }
        if self.len == self.buf.len() {
            self.flush_buffer()?;
        }
        self.buf[self.len] = b;
        self.len += 1;
        Ok(())
    }

    fn push_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        if self.buf.is_empty() {
            self.sink.write_all(bytes)?;
            return Ok(());
        }
        while !bytes.is_empty() {
            if self.len == self.buf.len() {
                self.flush_buffer()?;
            }
            let n = (self.buf.len() - self.len).min(bytes.len());
            self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
            self.len += n;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> std::io::Result<()> {
        if self.len > 0 {
            self.sink.write_all(&self.buf[..self.len])?;
            self.len = 0;
        }
        Ok(())
    }
}

impl<W: Write> fmt::Debug for JsonGenerator<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonGenerator")
            .field("scope", &self.current.scope)
            .field("depth", &self.stack.len())
            .field("buffered", &self.len)
            .finish()
    }
}

fn is_plain(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) && b != b'"' && b != b'\\'
}
