//! Response messages emitted through the Connector.
//!
//! Each message is one of five kinds, discriminated by a `message_type`
//! tag. Debug chunks travel with the provisional and blocking responses;
//! the non-blocking final response omits them because they were already
//! delivered with the provisional acknowledgement.

use serde::Serialize;
use serde_json::Value;

/// One outbound message, tagged by kind.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ResponseMessage {
    /// Early acknowledgement of a non-blocking request.
    Provisional {
        /// Transaction the acknowledgement belongs to.
        transaction_id: String,
        /// Debug chunks forwarded from the request envelope.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        debug: Vec<Value>,
    },

    /// Final response to a blocking request.
    BlockingResponse {
        /// Transaction the response belongs to.
        transaction_id: String,
        /// Results document produced by the action.
        results: Value,
        /// Debug chunks forwarded from the request envelope.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        debug: Vec<Value>,
    },

    /// Final response to a non-blocking request.
    NonBlockingResponse {
        /// Transaction the response belongs to.
        transaction_id: String,
        /// Agent-assigned job identifier.
        job_id: String,
        /// Results document produced by the action.
        results: Value,
    },

    /// Application-level error reply.
    PxpError {
        /// Transaction the failed request belongs to.
        transaction_id: String,
        /// Request id assigned by the sender.
        id: String,
        /// Human-readable failure description.
        description: String,
    },

    /// Transport-level error reply referring only to a message id.
    PcpError {
        /// Id of the message that could not be interpreted.
        id: String,
        /// Human-readable failure description.
        description: String,
    },
}

impl ResponseMessage {
    /// Returns the message-kind name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Provisional { .. } => "provisional response",
            Self::BlockingResponse { .. } => "blocking response",
            Self::NonBlockingResponse { .. } => "non-blocking response",
            Self::PxpError { .. } => "PXP error",
            Self::PcpError { .. } => "PCP error",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn messages_are_tagged_by_kind() {
        let message = ResponseMessage::BlockingResponse {
            transaction_id: "t1".into(),
            results: json!({"y": "hi"}),
            debug: Vec::new(),
        };
        let encoded = serde_json::to_value(&message).expect("serialise");
        assert_eq!(
            encoded.get("message_type").and_then(Value::as_str),
            Some("blocking_response")
        );
        assert_eq!(encoded.get("results"), Some(&json!({"y": "hi"})));
    }

    #[test]
    fn empty_debug_chunks_are_omitted() {
        let message = ResponseMessage::Provisional {
            transaction_id: "t1".into(),
            debug: Vec::new(),
        };
        let encoded = serde_json::to_value(&message).expect("serialise");
        assert!(encoded.get("debug").is_none());
    }

    #[test]
    fn forwarded_debug_chunks_are_carried() {
        let message = ResponseMessage::Provisional {
            transaction_id: "t1".into(),
            debug: vec![json!({"hops": []})],
        };
        let encoded = serde_json::to_value(&message).expect("serialise");
        assert_eq!(
            encoded.get("debug").and_then(Value::as_array).map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn non_blocking_response_has_no_debug_field() {
        let message = ResponseMessage::NonBlockingResponse {
            transaction_id: "t2".into(),
            job_id: "j1".into(),
            results: Value::Null,
        };
        let encoded = serde_json::to_value(&message).expect("serialise");
        assert!(encoded.get("debug").is_none());
        assert_eq!(encoded.get("job_id").and_then(Value::as_str), Some("j1"));
    }
}
