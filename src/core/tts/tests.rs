//! Tests for the synthesis transport.
//!
//! - Configuration handling
//! - Outgoing message encoding
//! - Incoming frame decoder chain
//! - Error classification

use super::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde_json::{Value, json};
use std::time::Duration;

// =============================================================================
// Configuration Tests
// =============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SynthesisConfig::new("key", "voice");
        assert_eq!(config.ws_url, FISH_TTS_WS_URL);
        assert_eq!(config.http_url, FISH_TTS_HTTP_URL);
        assert_eq!(config.streaming_format, AudioFormat::Mp3);
        assert_eq!(config.fallback_format, AudioFormat::Mp3);
        assert_eq!(config.mp3_bitrate, 128);
        assert_eq!(config.latency, LatencyMode::Normal);
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_missing_credentials() {
        assert!(matches!(
            SynthesisConfig::new("", "voice").validate(),
            Err(SynthesisError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SynthesisConfig::new("key", "  ").validate(),
            Err(SynthesisError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validation_rejects_out_of_range_sampling() {
        let mut config = SynthesisConfig::new("key", "voice");
        config.temperature = 1.5;
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::new("key", "voice");
        config.top_p = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config =
            SynthesisConfig::new("key", "voice").with_stream_idle_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audio_format_roundtrip() {
        for format in [
            AudioFormat::Mp3,
            AudioFormat::Wav,
            AudioFormat::Opus,
            AudioFormat::Pcm,
        ] {
            assert_eq!(format.as_str().parse::<AudioFormat>().unwrap(), format);
        }
        assert_eq!("MPEG".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("flac".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_latency_mode_parse() {
        assert_eq!("normal".parse::<LatencyMode>().unwrap(), LatencyMode::Normal);
        assert_eq!(
            "Balanced".parse::<LatencyMode>().unwrap(),
            LatencyMode::Balanced
        );
        assert!("instant".parse::<LatencyMode>().is_err());
    }
}

// =============================================================================
// Outgoing Message Tests
// =============================================================================

mod outgoing_tests {
    use super::*;
    use crate::core::tts::messages::StartRequest;

    fn decode(bytes: &[u8]) -> Value {
        rmp_serde::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_start_message_encoding() {
        let config = SynthesisConfig::new("key", "voice-123");
        let message = OutgoingMessage::Start {
            request: StartRequest::from_config(&config),
        };
        let value = decode(&message.encode().unwrap());

        assert_eq!(value["event"], "start");
        let request = &value["request"];
        assert_eq!(request["text"], "");
        assert_eq!(request["reference_id"], "voice-123");
        assert_eq!(request["format"], "mp3");
        assert_eq!(request["latency"], "normal");
        let temperature = request["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
        let top_p = request["top_p"].as_f64().unwrap();
        assert!((top_p - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_text_and_stop_encoding() {
        let text = decode(&OutgoingMessage::Text { text: "Hello." }.encode().unwrap());
        assert_eq!(text, json!({"event": "text", "text": "Hello."}));

        let stop = decode(&OutgoingMessage::Stop.encode().unwrap());
        assert_eq!(stop, json!({"event": "stop"}));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(OutgoingMessage::Stop.event_name(), "stop");
        assert_eq!(OutgoingMessage::Text { text: "" }.event_name(), "text");
    }
}

// =============================================================================
// Decoder Chain Tests
// =============================================================================

mod decoder_tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct AudioFrame<'a> {
        event: &'a str,
        #[serde(with = "serde_bytes")]
        audio: &'a [u8],
    }

    fn msgpack<T: Serialize>(value: &T) -> Bytes {
        Bytes::from(rmp_serde::to_vec_named(value).unwrap())
    }

    #[test]
    fn test_msgpack_audio_frame() {
        let frame = msgpack(&AudioFrame {
            event: "audio",
            audio: &[1, 2, 3, 4],
        });
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.tier, DecodeTier::MessagePack);
        assert_eq!(
            decoded.event,
            ProviderEvent::Audio(Bytes::from_static(&[1, 2, 3, 4]))
        );
    }

    #[test]
    fn test_msgpack_finish_and_log() {
        let finish = msgpack(&json!({"event": "finish", "reason": "stop"}));
        assert_eq!(
            decode_frame(&finish).unwrap().event,
            ProviderEvent::Finish {
                reason: Some("stop".to_string())
            }
        );

        let log = msgpack(&json!({"event": "log", "message": "warming up"}));
        let decoded = decode_frame(&log).unwrap();
        assert_eq!(decoded.tier, DecodeTier::MessagePack);
        assert_eq!(decoded.event, ProviderEvent::Log("warming up".to_string()));
    }

    #[test]
    fn test_finish_with_error_reason_is_an_error() {
        let frame = msgpack(&json!({"event": "finish", "reason": "error"}));
        assert!(matches!(
            decode_frame(&frame).unwrap().event,
            ProviderEvent::Error(_)
        ));
    }

    #[test]
    fn test_json_frame_with_base64_audio() {
        let payload = json!({"event": "audio", "audio": BASE64.encode([9u8, 8, 7])});
        let frame = Bytes::from(payload.to_string());
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.tier, DecodeTier::Json);
        assert_eq!(
            decoded.event,
            ProviderEvent::Audio(Bytes::from_static(&[9, 8, 7]))
        );
    }

    #[test]
    fn test_json_error_event() {
        let frame = Bytes::from(json!({"event": "error", "message": "quota"}).to_string());
        assert_eq!(
            decode_frame(&frame).unwrap().event,
            ProviderEvent::Error("quota".to_string())
        );
    }

    #[test]
    fn test_undecodable_binary_is_raw_audio() {
        // MPEG frame sync followed by arbitrary payload
        let frame = Bytes::from_static(&[0xFF, 0xFB, 0x90, 0x64, 0x00, 0x01]);
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.tier, DecodeTier::Raw);
        assert_eq!(decoded.event, ProviderEvent::Audio(frame));
    }

    #[test]
    fn test_unknown_event_is_not_audio() {
        let frame = msgpack(&json!({"event": "heartbeat"}));
        assert_eq!(
            decode_frame(&frame).unwrap().event,
            ProviderEvent::Unknown("heartbeat".to_string())
        );
    }

    #[test]
    fn test_empty_frame_decodes_to_nothing() {
        assert!(decode_frame(&Bytes::new()).is_none());
    }
}

// =============================================================================
// Error Classification Tests
// =============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_cancellation_never_falls_back() {
        assert!(!SynthesisError::Cancelled.triggers_fallback());
    }

    #[test]
    fn test_transport_failures_fall_back() {
        for error in [
            SynthesisError::ConnectionFailed("refused".into()),
            SynthesisError::NoAudio,
            SynthesisError::Timeout(Duration::from_secs(1)),
            SynthesisError::ProviderError("boom".into()),
            SynthesisError::NetworkError("reset".into()),
        ] {
            assert!(error.triggers_fallback(), "{error} should fall back");
        }
    }

    #[test]
    fn test_upstream_status_display() {
        let error = SynthesisError::UpstreamStatus {
            status: 402,
            body: "payment required".into(),
        };
        assert_eq!(
            error.to_string(),
            "Upstream returned status 402: payment required"
        );
    }
}
