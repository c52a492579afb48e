//! 文字列辞書の実装

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{MAX_ENTRIES, SNAPSHOT_KEY};

/// 不変の文字列辞書
///
/// 構築後は挿入できない。インデックスはプロセスの寿命の間安定。
#[derive(Debug, Clone)]
pub struct StringDictionary {
    /// インデックス順の文字列
    strings: Vec<String>,
    /// 文字列 → インデックス
    index: HashMap<String, u16>,
    /// 最長エントリのバイト数（これより長い候補はハッシュを引かずに不一致）
    max_length: usize,
    /// 端末に送るスナップショット `{"dictio": [...]}`
    snapshot: Value,
}

impl StringDictionary {
    /// 空の辞書
    pub fn empty() -> Self {
        Self::from_lines(core::iter::empty::<String>())
    }

    /// 順序付きの文字列列から辞書を構築する
    ///
    /// 同じ文字列が複数回現れた場合は後のインデックスが有効になる。
    /// 2 バイトで参照できない 65536 件目以降は捨てる。
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut strings: Vec<String> = lines.into_iter().map(Into::into).collect();
        if strings.len() > MAX_ENTRIES {
            warn!(
                entries = strings.len(),
                kept = MAX_ENTRIES,
                "string dictionary too large for 2-byte indices, truncating"
            );
            strings.truncate(MAX_ENTRIES);
        }

        let mut index = HashMap::with_capacity(strings.len());
        let mut max_length = 0;
        for (i, s) in strings.iter().enumerate() {
            index.insert(s.clone(), i as u16);
            max_length = max_length.max(s.len());
        }

        let snapshot = serde_json::json!({ SNAPSHOT_KEY: strings });

        StringDictionary {
            strings,
            index,
            max_length,
            snapshot,
        }
    }

    /// 改行区切りテキストから構築する（`\r\n` も可）
    pub fn parse(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    /// ファイルから構築する
    ///
    /// 読めない場合も起動を止めず、空の辞書を返す（すべての文字列が生バイトで送られるだけ）。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let dictionary = Self::parse(&text);
                debug!(path = %path.display(), entries = dictionary.len(), "string dictionary loaded");
                dictionary
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "string dictionary unavailable, using an empty one");
                Self::empty()
            }
        }
    }

    /// 文字列のインデックスを引く
    ///
    /// 最長エントリより長い文字列はハッシュ表を引かずに `None`。
    pub fn lookup(&self, s: &str) -> Option<u16> {
        if s.len() > self.max_length {
            return None;
        }
        self.index.get(s).copied()
    }

    /// インデックスから文字列を引く（デコード側）
    pub fn get(&self, index: u16) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// 端末に送るスナップショット文書
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }
}

impl Default for StringDictionary {
    fn default() -> Self {
        Self::empty()
    }
}
