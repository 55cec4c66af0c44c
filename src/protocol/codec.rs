// ! Wire codec
// !
// ! Pure encode/decode between message types and JSON bytes. Messages are
// ! self-delimiting; framing belongs to the transport owned by the sandbox
// ! launcher. The codec performs no I/O and keeps no state.

use crate::core::error::{HostError, HostResult};
use crate::protocol::messages::{HostToPlugin, PluginToHost};

/// Encode a host message for the wire
pub fn encode(message: &HostToPlugin) -> HostResult<Vec<u8>> {
    serde_json::to_vec(message)
        .map_err(|e| HostError::serialization(format!("failed to encode host message: {e}")))
}

/// Decode an inbound frame payload into a plugin message
///
/// A rejected frame carries the raw payload in the error so callers can
/// render what the plugin actually sent.
pub fn decode(payload: &[u8]) -> HostResult<PluginToHost> {
    serde_json::from_slice(payload).map_err(|e| HostError::decoding(payload, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_progress() {
        let original = PluginToHost::EmitProgress {
            message: "halfway".to_string(),
        };
        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, original);
        // Round-trip stability: re-encoding the decoded value yields the
        // same logical frame.
        let reencoded = serde_json::to_vec(&decoded).unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&reencoded).unwrap(),
            serde_json::from_slice::<serde_json::Value>(&bytes).unwrap()
        );
    }

    #[test]
    fn test_decode_failure_keeps_payload() {
        let garbage = b"\x00\x01 not json";
        match decode(garbage) {
            Err(HostError::DecodingPluginOutputFailed { payload, .. }) => {
                assert_eq!(payload, garbage.to_vec());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_variant_fails() {
        let unknown = br#"{"launchMissiles":{}}"#;
        assert!(decode(unknown).is_err());
    }

    #[test]
    fn test_encode_error_response() {
        let message = HostToPlugin::ErrorResponse {
            error: "request not implemented: build".to_string(),
        };
        let bytes = encode(&message).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json["errorResponse"]["error"],
            "request not implemented: build"
        );
    }
}
