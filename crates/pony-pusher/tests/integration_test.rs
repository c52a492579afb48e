//! エンコーダ → チャンネル → トランスポート → リーダー の結合テスト

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use proptest::prelude::*;
use serde_json::json;
use tokio::io::AsyncReadExt;

use pony_model::{CharsetModel, TagRegistry, ValueType, MAX_SHORT_STRING_LEN};
use pony_pusher::{
    ChannelConfig, ChannelState, Decoded, EncodeError, Pusher, ServerToClientModel, Session,
    StringDictionary, StringForm, Value, WireEncoder, WireReader,
};
use pony_transport::testing::RecordingTransport;
use pony_transport::{BufferedChannel, StreamTransport};

// ===== ヘルパー =====

#[derive(Default)]
struct TestSession {
    destroyed: AtomicUsize,
}

impl Session for TestSession {
    fn on_destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn encode_one(encoder: &WireEncoder, tag: ServerToClientModel, value: Value<'_>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encoder.encode_into(&mut buf, tag, &value).unwrap();
    buf.to_vec()
}

fn decode_one(bytes: &[u8], dictionary: &StringDictionary) -> Decoded {
    let mut reader = WireReader::new(bytes, dictionary);
    let record = reader.next_record().unwrap().unwrap();
    assert_eq!(reader.remaining(), 0, "レコードの後ろにバイトが残っている");
    record.value
}

fn test_config() -> ChannelConfig {
    ChannelConfig {
        buffer_size: 1024,
        flush_threshold: Some(256),
        max_chunk_size: 64,
        idle_flush_timeout_ms: 500,
        high_water_mark: None,
    }
}

// ===== タグ表 =====

#[test]
fn test_registry_round_trip_for_every_tag() {
    let registry = TagRegistry::new().unwrap();
    for &tag in ServerToClientModel::ALL {
        let found = registry.tag_from_ordinal(tag.ordinal()).unwrap();
        assert_eq!(found, tag);
        assert_eq!(registry.type_of(found), tag.value_type());
    }
    assert!(registry.tag_from_ordinal(ServerToClientModel::COUNT as u16).is_err());
}

// ===== 文字列 =====

proptest! {
    #[test]
    fn prop_dictionary_strings_use_reference_form(
        words in prop::collection::vec("[a-z]{1,12}", 1..32),
        pick in any::<prop::sample::Index>(),
    ) {
        let dictionary = Arc::new(StringDictionary::from_lines(words.iter().cloned()));
        let encoder = WireEncoder::new(dictionary.clone());
        let word = pick.get(&words);

        let bytes = encode_one(&encoder, ServerToClientModel::Text, Value::Str(word));
        prop_assert_eq!(bytes.len(), 4);
        prop_assert_eq!(bytes[1], CharsetModel::StringDictionary.value());

        match decode_one(&bytes, &dictionary) {
            Decoded::Text { text, form } => {
                prop_assert_eq!(&text, word);
                prop_assert!(matches!(form, StringForm::Dictionary(_)));
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn prop_raw_strings_round_trip(s in "\\PC{0,64}") {
        let dictionary = Arc::new(StringDictionary::empty());
        let encoder = WireEncoder::new(dictionary.clone());

        for tag in [ServerToClientModel::Text, ServerToClientModel::PutStyleKey] {
            let bytes = encode_one(&encoder, tag, Value::Str(&s));
            let expected_form = if s.chars().all(|c| c.len_utf8() == 1) {
                StringForm::Ascii
            } else {
                StringForm::Utf8
            };
            prop_assert_eq!(
                decode_one(&bytes, &dictionary),
                Decoded::Text { text: s.clone(), form: expected_form }
            );
        }
    }

    #[test]
    fn prop_long_round_trip(v in any::<i64>()) {
        let dictionary = Arc::new(StringDictionary::empty());
        let encoder = WireEncoder::new(dictionary.clone());
        let bytes = encode_one(&encoder, ServerToClientModel::Time, Value::Long(v));
        prop_assert_eq!(decode_one(&bytes, &dictionary), Decoded::Long(v));
    }

    #[test]
    fn prop_double_round_trip(v in prop::num::f64::ANY) {
        let dictionary = Arc::new(StringDictionary::empty());
        let encoder = WireEncoder::new(dictionary.clone());
        let bytes = encode_one(&encoder, ServerToClientModel::Left, Value::Double(v));
        prop_assert!(bytes.len() <= 3 + 255);

        match decode_one(&bytes, &dictionary) {
            Decoded::Double(d) if v.is_nan() => prop_assert!(d.is_nan()),
            Decoded::Double(d) => prop_assert_eq!(d.to_bits(), v.to_bits()),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn prop_json_documents_round_trip(
        keys in prop::collection::vec("[a-zA-Z_]{1,8}", 0..8),
        text in "\\PC{0,32}",
        n in any::<i64>(),
    ) {
        let mut object = serde_json::Map::new();
        for (i, key) in keys.iter().enumerate() {
            object.insert(key.clone(), json!([i, text.clone(), n, null, i % 2 == 0]));
        }
        let doc = serde_json::Value::Object(object);

        let dictionary = Arc::new(StringDictionary::empty());
        let encoder = WireEncoder::new(dictionary.clone());
        let bytes = encode_one(&encoder, ServerToClientModel::Native, Value::Json(&doc));
        prop_assert_eq!(decode_one(&bytes, &dictionary), Decoded::Json(doc));
    }
}

#[test]
fn test_oversized_short_string_is_rejected() {
    let encoder = WireEncoder::new(Arc::new(StringDictionary::empty()));
    // 文字数は上限以下でもバイト数で判定する
    let s = "é".repeat(MAX_SHORT_STRING_LEN / 2 + 1);
    let mut buf = BytesMut::new();
    let err = encoder
        .encode_into(&mut buf, ServerToClientModel::Text, &Value::Str(&s))
        .unwrap_err();
    assert!(matches!(err, EncodeError::PayloadTooLarge { .. }));
    assert!(buf.is_empty());

    // 同じ内容は JSON 文書なら送れる
    let doc = json!({ "text": s });
    encoder
        .encode_into(&mut buf, ServerToClientModel::Native, &Value::Json(&doc))
        .unwrap();
    assert_eq!(buf[0], ServerToClientModel::Native.tag_byte());
}

#[test]
fn test_every_tag_accepts_a_value_of_its_declared_type() {
    let dictionary = Arc::new(StringDictionary::empty());
    let encoder = WireEncoder::new(dictionary.clone());
    let doc = json!({"k": 1});

    for &tag in ServerToClientModel::ALL {
        let value = match tag.value_type() {
            ValueType::Null => Value::Null,
            ValueType::Boolean => Value::Bool(true),
            ValueType::Byte => Value::Byte(1),
            ValueType::Short => Value::Short(2),
            ValueType::Integer => Value::Int(3),
            ValueType::Long => Value::Long(4),
            ValueType::Double => Value::Double(5.5),
            ValueType::StringAscii | ValueType::StringUtf8 => Value::Str("six"),
            ValueType::Json => Value::Json(&doc),
        };
        let bytes = encode_one(&encoder, tag, value);
        let mut reader = WireReader::new(&bytes, &dictionary);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.tag, tag);
    }
}

// ===== パイプライン =====

#[tokio::test]
async fn test_pusher_stream_decodes_in_order() {
    let transport = Arc::new(RecordingTransport::new());
    let dictionary = Arc::new(StringDictionary::from_lines(["gwt-Label", "display"]));
    let session = Arc::new(TestSession::default());
    let pusher = Pusher::new(test_config(), transport.clone(), dictionary.clone(), session.clone()).unwrap();

    pusher.encode(ServerToClientModel::CreateContext, 1i32).unwrap();
    pusher.encode(ServerToClientModel::AddStyleName, "gwt-Label").unwrap();
    pusher.encode(ServerToClientModel::Text, "こんにちは").unwrap();
    pusher.encode(ServerToClientModel::Width, 120.5).unwrap();
    pusher
        .encode_document(ServerToClientModel::Native, |json| {
            json.start_object()?
                .write_key("rows")?
                .start_array()?
                .write_i32(1)?
                .write_i32(2)?
                .end()?
                .end()?;
            Ok(())
        })
        .unwrap();
    pusher.encode(ServerToClientModel::End, Value::Null).unwrap();
    pusher.flush_and_wait().await.unwrap();

    let received = transport.received();
    let records: Vec<_> = WireReader::new(&received, &dictionary)
        .collect::<Result<_, _>>()
        .unwrap();
    let tags: Vec<_> = records.iter().map(|r| r.tag).collect();
    assert_eq!(
        tags,
        vec![
            ServerToClientModel::StringDictionary,
            ServerToClientModel::CreateContext,
            ServerToClientModel::AddStyleName,
            ServerToClientModel::Text,
            ServerToClientModel::Width,
            ServerToClientModel::Native,
            ServerToClientModel::End,
        ]
    );
    assert_eq!(
        records[2].value,
        Decoded::Text {
            text: "gwt-Label".into(),
            form: StringForm::Dictionary(0)
        }
    );
    assert_eq!(records[4].value, Decoded::Double(120.5));
    assert_eq!(records[5].value, Decoded::Json(json!({"rows": [1, 2]})));
    // チャンクは上限以下
    assert!(transport.chunks().iter().all(|c| c.len() <= 64));
    assert_eq!(session.destroyed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_large_volume_flushes_by_threshold_and_keeps_order() {
    let transport = Arc::new(RecordingTransport::new());
    let dictionary = Arc::new(StringDictionary::empty());
    let pusher = Pusher::new(
        test_config(),
        transport.clone(),
        dictionary.clone(),
        Arc::new(TestSession::default()),
    )
    .unwrap();

    for i in 0..500 {
        pusher.encode(ServerToClientModel::Index, i as i32).unwrap();
        if i % 50 == 0 {
            tokio::task::yield_now().await;
        }
    }
    pusher.flush_and_wait().await.unwrap();
    assert!(pusher.stats().flushes_completed > 1);

    let received = transport.received();
    let values: Vec<i32> = WireReader::new(&received, &dictionary)
        .skip(1)
        .map(|r| match r.unwrap().value {
            Decoded::Int(v) => v,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(values, (0..500).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_low_traffic_session_flushes_on_idle_timer() {
    let transport = Arc::new(RecordingTransport::new());
    let pusher = Pusher::new(
        test_config(),
        transport.clone(),
        Arc::new(StringDictionary::empty()),
        Arc::new(TestSession::default()),
    )
    .unwrap();

    pusher.encode(ServerToClientModel::Heartbeat, Value::Null).unwrap();
    assert!(transport.received().is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(501)).await;
    assert!(!transport.received().is_empty());
    assert_eq!(pusher.state(), ChannelState::Idle);
}

#[tokio::test]
async fn test_transport_failure_is_session_fatal() {
    let transport = Arc::new(RecordingTransport::failing_on(1));
    let session = Arc::new(TestSession::default());
    let pusher = Pusher::new(
        test_config(),
        transport.clone(),
        Arc::new(StringDictionary::empty()),
        session.clone(),
    )
    .unwrap();

    let payload = "x".repeat(300);
    pusher.encode(ServerToClientModel::Html, payload.as_str()).unwrap();
    pusher.closed().await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }

    assert_eq!(pusher.state(), ChannelState::Closed);
    assert_eq!(session.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(transport.close_calls(), 1);
    assert!(matches!(
        pusher.encode(ServerToClientModel::Heartbeat, Value::Null),
        Err(EncodeError::Channel(_))
    ));
}

#[tokio::test]
async fn test_three_max_chunks_arrive_as_three_ordered_writes() {
    let transport = Arc::new(RecordingTransport::new());
    let mut config = test_config();
    config.flush_threshold = Some(10_000);
    let channel = BufferedChannel::spawn(config, transport.clone()).unwrap();

    let data: Vec<u8> = (0..192u32).map(|i| (i % 251) as u8).collect();
    channel.append(&data).unwrap();
    channel.flush_and_wait().await.unwrap();

    let chunks = transport.chunks();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.len() <= 64));
    assert_eq!(transport.received(), data);
}

#[tokio::test]
async fn test_stream_transport_end_to_end() {
    let (client, mut server) = tokio::io::duplex(4096);
    let dictionary = Arc::new(StringDictionary::from_lines(["px"]));
    let pusher = Pusher::new(
        test_config(),
        Arc::new(StreamTransport::new(client)),
        dictionary.clone(),
        Arc::new(TestSession::default()),
    )
    .unwrap();

    pusher.encode(ServerToClientModel::Unit, 3u8).unwrap();
    pusher.encode(ServerToClientModel::CellWidth, "px").unwrap();
    pusher.flush_and_wait().await.unwrap();
    pusher.close();

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.unwrap();

    let values: Vec<Decoded> = WireReader::new(&received, &dictionary)
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(values.len(), 3);
    assert_eq!(values[1], Decoded::Byte(3));
    assert_eq!(
        values[2],
        Decoded::Text {
            text: "px".into(),
            form: StringForm::Dictionary(0)
        }
    );
}
