//! Inbound envelope decoding.

use puente_protocol::ServerMessage;

use crate::error::ClientError;

/// Decode a raw frame into a typed message.
///
/// The parse runs in two steps (raw text, then typed) so an unrecognized
/// tag can be told apart from an undecodable payload: the former is a
/// warning, the latter a recoverable error. Neither closes the session.
pub(crate) fn decode(raw: &str) -> Result<ServerMessage, ClientError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ClientError::Malformed(e.to_string()))?;
    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);
    match serde_json::from_value::<ServerMessage>(value) {
        Ok(ServerMessage::Unknown) => {
            Err(ClientError::UnknownType(tag.unwrap_or_else(|| "<missing>".into())))
        }
        Ok(message) => Ok(message),
        Err(error) => Err(ClientError::Malformed(match tag {
            Some(tag) => format!("{tag}: {error}"),
            None => error.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_message() {
        let message = decode(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert!(matches!(message, ServerMessage::ServerError { .. }));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let error = decode("not json at all").unwrap_err();
        assert!(matches!(error, ClientError::Malformed(_)));
    }

    #[test]
    fn unknown_tag_is_a_warning_not_malformed() {
        let error = decode(r#"{"type":"telemetria","data":{}}"#).unwrap_err();
        match error {
            ClientError::UnknownType(tag) => assert_eq!(tag, "telemetria"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn known_tag_with_bad_payload_is_malformed() {
        // respuesta_cruce requires a data object.
        let error = decode(r#"{"type":"respuesta_cruce"}"#).unwrap_err();
        match error {
            ClientError::Malformed(detail) => assert!(detail.contains("respuesta_cruce")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_tag_is_malformed() {
        let error = decode(r#"{"payload":1}"#).unwrap_err();
        assert!(matches!(error, ClientError::Malformed(_)));
    }
}
