//! Pusher 設定
//!
//! ```toml
//! dictionary_path = "string.dictionary"
//!
//! [channel]
//! buffer_size = 524288
//! max_chunk_size = 65536
//! idle_flush_timeout_ms = 500
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pony_dictionary::StringDictionary;
use pony_transport::ChannelConfig;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PusherConfig {
    /// バッファ付きチャンネルの設定
    pub channel: ChannelConfig,
    /// 文字列辞書ファイル（1 行 1 エントリ）。`None` なら空の辞書
    pub dictionary_path: Option<PathBuf>,
}

impl PusherConfig {
    /// TOML テキストから読み込んで検証する
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PusherConfig = toml::from_str(text)?;
        config.channel.validate()?;
        Ok(config)
    }

    /// TOML ファイルから読み込む
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// 辞書を読み込む（読めなければ空の辞書、起動は止めない）
    pub fn dictionary(&self) -> Arc<StringDictionary> {
        let dictionary = match &self.dictionary_path {
            Some(path) => StringDictionary::load(path),
            None => StringDictionary::empty(),
        };
        Arc::new(dictionary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_is_default() {
        let config = PusherConfig::from_toml_str("").unwrap();
        assert_eq!(config, PusherConfig::default());
        assert!(config.dictionary().is_empty());
    }

    #[test]
    fn test_partial_channel_table() {
        let config = PusherConfig::from_toml_str(
            r#"
            dictionary_path = "/etc/pony/string.dictionary"

            [channel]
            buffer_size = 4096
            idle_flush_timeout_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.channel.buffer_size, 4096);
        assert_eq!(config.channel.flush_threshold(), 1024);
        assert_eq!(config.channel.max_chunk_size, 64 * 1024);
        assert_eq!(config.channel.idle_flush_timeout_ms, 50);
        assert_eq!(
            config.dictionary_path.as_deref(),
            Some(Path::new("/etc/pony/string.dictionary"))
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PusherConfig::from_toml_str("[channel]\nmax_chunk_size = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PusherConfig::from_toml_str("[channel]\nbuffer_size = \"big\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file_and_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let dict_path = dir.path().join("string.dictionary");
        std::fs::write(&dict_path, "display\nnone\n").unwrap();

        let config_path = dir.path().join("pusher.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "dictionary_path = {:?}", dict_path.to_string_lossy()).unwrap();
        drop(file);

        let config = PusherConfig::load(&config_path).unwrap();
        let dictionary = config.dictionary();
        assert_eq!(dictionary.len(), 2);
        assert_eq!(dictionary.lookup("none"), Some(1));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            PusherConfig::load("/nonexistent/pusher.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_missing_dictionary_is_empty() {
        let config = PusherConfig {
            dictionary_path: Some(PathBuf::from("/nonexistent/string.dictionary")),
            ..PusherConfig::default()
        };
        assert!(config.dictionary().is_empty());
    }
}
