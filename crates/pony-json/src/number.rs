//! ヒープ確保なしの数値テキスト化
//!
//! ジェネレータと LONG / DOUBLE タグのワイヤエンコードで共有する。

use core::fmt::{self, Write};

/// 指数表記に切り替える閾値（これより長い 10 進表記は `{:e}` で書き直す）
pub const MAX_PLAIN_DOUBLE_LEN: usize = 24;

const CAPACITY: usize = 32;

/// スタック上の小さなテキストバッファ
#[derive(Clone, Copy)]
pub struct NumberText {
    buf: [u8; CAPACITY],
    len: usize,
}

impl NumberText {
    fn new() -> Self {
        NumberText {
            buf: [0u8; CAPACITY],
            len: 0,
        }
    }

    fn from_static(s: &'static str) -> Self {
        let mut text = Self::new();
        text.buf[..s.len()].copy_from_slice(s.as_bytes());
        text.len = s.len();
        text
    }

    pub fn as_str(&self) -> &str {
        // 書き込みは fmt 経由の &str のみなので常に UTF-8
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Write for NumberText {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > CAPACITY {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

impl fmt::Debug for NumberText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NumberText").field(&self.as_str()).finish()
    }
}

/// i64 の 10 進表記
pub fn format_i64(value: i64) -> NumberText {
    let mut text = NumberText::new();
    // 最長 20 バイトなので失敗しない
    let _ = write!(text, "{}", value);
    text
}

/// u64 の 10 進表記
pub fn format_u64(value: u64) -> NumberText {
    let mut text = NumberText::new();
    let _ = write!(text, "{}", value);
    text
}

/// f64 の最短往復表記
///
/// 非有限値はブラウザ側の `parseFloat` が読める `NaN` / `Infinity` / `-Infinity`。
/// JSON に書く場合は呼び出し側で事前に弾くこと。
pub fn format_f64(value: f64) -> NumberText {
    if value.is_nan() {
        return NumberText::from_static("NaN");
    }
    if value.is_infinite() {
        return NumberText::from_static(if value > 0.0 { "Infinity" } else { "-Infinity" });
    }

    let mut text = NumberText::new();
    if write!(text, "{}", value).is_err() || text.len > MAX_PLAIN_DOUBLE_LEN {
        text.len = 0;
        // 指数表記は最長でも "-1.7976931348623157e308" の 23 バイト
        let _ = write!(text, "{:e}", value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(format_i64(0).as_str(), "0");
        assert_eq!(format_i64(-42).as_str(), "-42");
        assert_eq!(format_i64(i64::MIN).as_str(), "-9223372036854775808");
        assert_eq!(format_u64(u64::MAX).as_str(), "18446744073709551615");
    }

    #[test]
    fn test_doubles_plain() {
        assert_eq!(format_f64(1.5).as_str(), "1.5");
        assert_eq!(format_f64(1.0).as_str(), "1");
        assert_eq!(format_f64(-0.25).as_str(), "-0.25");
    }

    #[test]
    fn test_doubles_switch_to_exponent() {
        assert_eq!(format_f64(1e300).as_str(), "1e300");
        assert_eq!(format_f64(5e-324).as_str(), "5e-324");
        assert!(format_f64(f64::MAX).len() <= MAX_PLAIN_DOUBLE_LEN);
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(format_f64(f64::NAN).as_str(), "NaN");
        assert_eq!(format_f64(f64::INFINITY).as_str(), "Infinity");
        assert_eq!(format_f64(f64::NEG_INFINITY).as_str(), "-Infinity");
    }

    #[test]
    fn test_doubles_parse_back_exactly() {
        for v in [0.1, 1.0 / 3.0, 123456.789e-20, -2.2250738585072014e-308, f64::MAX, f64::MIN_POSITIVE] {
            let text = format_f64(v);
            assert_eq!(text.as_str().parse::<f64>().unwrap(), v, "{}", text.as_str());
        }
    }
}
