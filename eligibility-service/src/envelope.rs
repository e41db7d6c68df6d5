//! Event envelope shared by every upstream and downstream topic.
//!
//! The inner payload is Any-style: a type URL naming the concrete event plus
//! its serialized body. Serialization of the body is JSON.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[doc(hidden)]
#[macro_export]
macro_rules! __type_url_prefix {
    () => {
        "type.googleapis.com/energy.smartbooking.v1."
    };
}

pub const TYPE_URL_PREFIX: &str = crate::__type_url_prefix!();

/// A concrete event that can travel inside an envelope.
pub trait TypedPayload: Serialize + DeserializeOwned {
    const TYPE_URL: &'static str;
}

/// Implements [`TypedPayload`] with a type URL derived from the event name.
#[macro_export]
macro_rules! typed_payload {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $crate::envelope::TypedPayload for $ty {
                const TYPE_URL: &'static str =
                    concat!($crate::__type_url_prefix!(), stringify!($ty));
            }
        )+
    };
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("payload {type_url} could not be decoded: {source}")]
    Payload {
        type_url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyPayload {
    pub type_url: String,
    pub value: serde_json::Value,
}

impl AnyPayload {
    pub fn pack<T: TypedPayload>(event: &T) -> Result<Self, DecodeError> {
        Ok(Self {
            type_url: T::TYPE_URL.to_string(),
            value: serde_json::to_value(event).map_err(DecodeError::Encode)?,
        })
    }

    pub fn is<T: TypedPayload>(&self) -> bool {
        self.type_url == T::TYPE_URL
    }

    pub fn unpack<T: TypedPayload>(&self) -> Result<T, DecodeError> {
        serde_json::from_value(self.value.clone()).map_err(|source| DecodeError::Payload {
            type_url: self.type_url.clone(),
            source,
        })
    }

    /// Short event name, i.e. the type URL without its package prefix.
    pub fn type_name(&self) -> &str {
        self.type_url.rsplit('.').next().unwrap_or(&self.type_url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub sender: String,
    #[serde(default)]
    pub payload: Option<AnyPayload>,
}

impl Envelope {
    pub fn wrap<T: TypedPayload>(
        sender: &str,
        occurred_at: OffsetDateTime,
        event: &T,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            occurred_at,
            sender: sender.to_string(),
            payload: Some(AnyPayload::pack(event)?),
        })
    }

    /// The inner payload, or `None` for an envelope that carries nothing and must be skipped.
    pub fn inner(&self) -> Option<&AnyPayload> {
        self.payload
            .as_ref()
            .filter(|payload| !payload.type_url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        occupancy_id: String,
    }

    typed_payload!(Ping);

    #[test]
    fn type_url_is_namespaced() {
        assert_eq!(Ping::TYPE_URL, format!("{TYPE_URL_PREFIX}Ping"));
    }

    #[test]
    fn wrapped_event_unpacks_to_the_same_value() {
        let ping = Ping {
            occupancy_id: "occ-1".to_string(),
        };
        let env = Envelope::wrap("tests", datetime!(2024-03-01 12:00:00 UTC), &ping).unwrap();

        let inner = env.inner().unwrap();
        assert!(inner.is::<Ping>());
        assert_eq!(inner.type_name(), "Ping");
        assert_eq!(inner.unpack::<Ping>().unwrap(), ping);
    }

    #[test]
    fn empty_payloads_are_not_exposed() {
        let mut env = Envelope::wrap("tests", datetime!(2024-03-01 12:00:00 UTC), &Ping {
            occupancy_id: "occ-1".to_string(),
        })
        .unwrap();
        env.payload = Some(AnyPayload {
            type_url: String::new(),
            value: serde_json::Value::Null,
        });
        assert!(env.inner().is_none());

        env.payload = None;
        assert!(env.inner().is_none());
    }

    #[test]
    fn envelope_parses_from_json_without_payload() {
        let raw = r#"{
            "id": "6f1c2d9e-8a4b-4c6d-9e2f-1a2b3c4d5e6f",
            "created_at": "2024-03-01T12:00:00Z",
            "occurred_at": "2024-03-01T11:59:00Z",
            "sender": "upstream"
        }"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert!(env.payload.is_none());
        assert_eq!(env.sender, "upstream");
    }

    #[test]
    fn bad_body_is_a_decode_error() {
        let any = AnyPayload {
            type_url: Ping::TYPE_URL.to_string(),
            value: serde_json::json!({"unexpected": true}),
        };
        assert!(matches!(any.unpack::<Ping>(), Err(DecodeError::Payload { .. })));
    }
}
