//! セッション単位の Pusher
//!
//! エンコーダとバッファ付きチャンネルを束ね、セッションの最初のレコードとして
//! 辞書スナップショットを送る。

use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, error};

use pony_dictionary::StringDictionary;
use pony_json::GeneratorError;
use pony_model::{ServerToClientModel, ValueType};
use pony_transport::{BufferedChannel, ChannelConfig, ChannelError, ChannelState, ChannelStats, Transport};

use crate::config::PusherConfig;
use crate::encoder::{DocumentGenerator, WireEncoder};
use crate::error::EncodeError;
use crate::value::Value;

/// Pusher を所有するセッション
///
/// トランスポートが失敗すると `on_destroy` が 1 度だけ呼ばれる。
pub trait Session: Send + Sync + 'static {
    fn on_destroy(&self);
}

/// セッションのレコード送信口
pub struct Pusher {
    encoder: WireEncoder,
    channel: BufferedChannel,
}

impl Pusher {
    /// チャンネルを起動し、辞書スナップショットを最初のレコードとして書く
    ///
    /// # 引数
    /// - `config`: チャンネル設定
    /// - `transport`: 下位トランスポート
    /// - `dictionary`: プロセス共通の文字列辞書
    /// - `session`: トランスポート失敗時に破棄されるセッション
    ///
    /// # エラー
    /// - `EncodeError::Channel`: ランタイムがない、設定が不正
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        dictionary: Arc<StringDictionary>,
        session: Arc<dyn Session>,
    ) -> Result<Self, EncodeError> {
        let channel = BufferedChannel::spawn(config, transport)?;
        channel.on_failure(move |err| {
            error!(error = %err, "can't write on the transport, destroying the session");
            session.on_destroy();
        });

        let pusher = Pusher {
            encoder: WireEncoder::new(dictionary),
            channel,
        };
        pusher.encode_string_dictionary()?;
        debug!(entries = pusher.dictionary().len(), "pusher started");
        Ok(pusher)
    }

    /// `PusherConfig` から起動する（辞書は設定のパスから読む）
    pub fn from_config(
        config: &PusherConfig,
        transport: Arc<dyn Transport>,
        session: Arc<dyn Session>,
    ) -> Result<Self, EncodeError> {
        Self::new(config.channel.clone(), transport, config.dictionary(), session)
    }

    /// レコードを 1 つ書く
    ///
    /// # エラー
    /// - `EncodeError::ProtocolMismatch` / `EncodeError::PayloadTooLarge`: 何も書かれない
    /// - `EncodeError::Channel`: チャンネルが閉じている、または満杯
    pub fn encode<'v>(
        &self,
        tag: ServerToClientModel,
        value: impl Into<Value<'v>>,
    ) -> Result<(), EncodeError> {
        let value = value.into();
        if tag.value_type() == ValueType::Json {
            return self.append_staged(|buf| self.encoder.encode_into(buf, tag, &value));
        }
        self.channel
            .append_with(|buf| self.encoder.encode_into(buf, tag, &value))
    }

    /// JSON 文書レコードをジェネレータで組み立てて書く
    ///
    /// `build` はチャンネルのロックの外で呼ばれるので、中からこの `Pusher` を
    /// 使ってもよい（その場合のレコードはこの文書より前に並ぶ）。
    pub fn encode_document<F>(&self, tag: ServerToClientModel, build: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut DocumentGenerator<'_>) -> Result<(), GeneratorError>,
    {
        self.append_staged(|buf| self.encoder.encode_document_into(buf, tag, build))
    }

    /// ロックの外で 1 レコードを組み立て、まとめて追記する
    ///
    /// JSON の直列化中に driver の完了処理を止めないため。
    fn append_staged<F>(&self, write: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut BytesMut) -> Result<(), EncodeError>,
    {
        let mut staged = BytesMut::new();
        write(&mut staged)?;
        self.channel.append(&staged)?;
        Ok(())
    }

    /// 辞書スナップショット `{"dictio": [...]}` を予約タグで書く
    pub fn encode_string_dictionary(&self) -> Result<(), EncodeError> {
        let snapshot = self.encoder.dictionary().snapshot();
        self.encode(ServerToClientModel::StringDictionary, Value::Json(snapshot))
    }

    /// 未送信のレコードを flush する（トランザクションの終わりなど）
    pub fn flush(&self) -> Result<(), ChannelError> {
        self.channel.flush()
    }

    /// flush して、トランスポートに届くまで待つ
    pub async fn flush_and_wait(&self) -> Result<(), ChannelError> {
        self.channel.flush_and_wait().await
    }

    /// チャンネルを閉じる（未送信のレコードは捨てる）
    pub fn close(&self) {
        self.channel.close();
    }

    /// 閉じるまで待つ
    pub async fn closed(&self) {
        self.channel.closed().await;
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    pub fn dictionary(&self) -> &StringDictionary {
        self.encoder.dictionary()
    }
}
