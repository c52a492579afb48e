//! エンコードする値

/// `encode` に渡す値
///
/// タグの宣言型より狭い整数は広げて受け付ける（`Byte` → `Short` など）。
/// それ以外の組み合わせは `EncodeError::ProtocolMismatch`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(&'a str),
    Json(&'a serde_json::Value),
}

impl<'a> Value<'a> {
    /// ログ・エラー用の種別名
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Json(_) => "json",
        }
    }

    pub(crate) fn as_i16(&self) -> Option<i16> {
        match *self {
            Value::Byte(v) => Some(v as i16),
            Value::Short(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int(v) => Some(v),
            _ => self.as_i16().map(i32::from),
        }
    }

    pub(crate) fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Long(v) => Some(v),
            _ => self.as_i32().map(i64::from),
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            // i32 までは f64 で正確に表せる
            _ => self.as_i32().map(f64::from),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value<'_> {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}

impl From<i16> for Value<'_> {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Str(v)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(v: &'a String) -> Self {
        Value::Str(v.as_str())
    }
}

impl<'a> From<&'a serde_json::Value> for Value<'a> {
    fn from(v: &'a serde_json::Value) -> Self {
        Value::Json(v)
    }
}
