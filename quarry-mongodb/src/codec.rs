//! Document encoding.
//!
//! [`DocumentCodec`] turns any `Serialize` value into a BSON [`Document`].
//! Field names follow serde, so `#[serde(rename = "...")]` controls the
//! stored key exactly as it controls the JSON key.
//!
//! Protobuf generated types do not map onto BSON by themselves. The
//! adapter modules below are meant for `#[serde(with = "...")]`:
//!
//! - [`timestamp`] / [`timestamp_opt`]: `prost_types::Timestamp` as a BSON datetime
//! - [`object_id_hex`] / [`object_id_hex_opt`]: a hex `String` as a BSON ObjectId
//!
//! ```rust,ignore
//! use prost_types::Timestamp;
//! use quarry_mongodb::codec;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Order {
//!     #[serde(rename = "_id", with = "codec::object_id_hex")]
//!     id: String,
//!     #[serde(rename = "createdAt", with = "codec::timestamp")]
//!     created_at: Timestamp,
//! }
//!
//! let codec = DocumentCodec::new();
//! let doc = codec.transform(&order)?;
//! ```

use bson::{DeserializerOptions, Document, SerializerOptions};
use prost_types::Timestamp;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{MongoError, MongoResult};

/// Encoder/decoder configuration shared by everything that writes documents.
///
/// Build one at startup and hand it to the [`Manager`](crate::Manager)
/// (or any other component) instead of relying on a global.
#[derive(Debug, Clone, Default)]
pub struct DocumentCodec {
    human_readable: Option<bool>,
}

impl DocumentCodec {
    /// Create a codec with the bson crate's default representation.
    ///
    /// Chain the setters below to adjust it:
    ///
    /// ```
    /// use quarry_mongodb::DocumentCodec;
    ///
    /// let codec = DocumentCodec::new().human_readable(false);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `Serialize` and `Deserialize` implementations see a human
    /// readable format.
    pub fn human_readable(mut self, enabled: bool) -> Self {
        self.human_readable = Some(enabled);
        self
    }

    /// Encode a value into a document.
    ///
    /// Fails if the value does not serialize to a document (e.g. a bare
    /// integer) or a field cannot be represented in BSON.
    pub fn transform<T>(&self, value: &T) -> MongoResult<Document>
    where
        T: Serialize + ?Sized,
    {
        let options = SerializerOptions::builder()
            .human_readable(self.human_readable)
            .build();
        bson::to_document_with_options(value, options).map_err(MongoError::from)
    }

    /// Decode a document into a value.
    pub fn decode<T: DeserializeOwned>(&self, document: Document) -> MongoResult<T> {
        let options = DeserializerOptions::builder()
            .human_readable(self.human_readable)
            .build();
        bson::from_document_with_options(document, options).map_err(MongoError::from)
    }
}

fn timestamp_to_datetime(ts: &Timestamp) -> bson::DateTime {
    let millis = ts
        .seconds
        .saturating_mul(1_000)
        .saturating_add(i64::from(ts.nanos) / 1_000_000);
    bson::DateTime::from_millis(millis)
}

fn datetime_to_timestamp(dt: bson::DateTime) -> Timestamp {
    let millis = dt.timestamp_millis();
    Timestamp {
        seconds: millis.div_euclid(1_000),
        nanos: (millis.rem_euclid(1_000) * 1_000_000) as i32,
    }
}

/// `prost_types::Timestamp` stored as a BSON datetime (millisecond precision).
pub mod timestamp {
    use prost_types::Timestamp;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the timestamp as a BSON datetime.
    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        super::timestamp_to_datetime(ts).serialize(serializer)
    }

    /// Read a BSON datetime into a timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        bson::DateTime::deserialize(deserializer).map(super::datetime_to_timestamp)
    }
}

/// Optional `prost_types::Timestamp` stored as a BSON datetime or null.
pub mod timestamp_opt {
    use prost_types::Timestamp;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the timestamp as a BSON datetime, or null when absent.
    pub fn serialize<S: Serializer>(
        ts: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        ts.as_ref()
            .map(super::timestamp_to_datetime)
            .serialize(serializer)
    }

    /// Read a BSON datetime or null into an optional timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        Option::<bson::DateTime>::deserialize(deserializer)
            .map(|dt| dt.map(super::datetime_to_timestamp))
    }
}

/// Hex string id stored as a BSON ObjectId.
///
/// An empty string is stored as null and read back as an empty string.
pub mod object_id_hex {
    use bson::oid::ObjectId;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the hex string as an ObjectId, or null when empty.
    pub fn serialize<S: Serializer>(hex: &str, serializer: S) -> Result<S::Ok, S::Error> {
        if hex.is_empty() {
            return serializer.serialize_none();
        }
        ObjectId::parse_str(hex)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }

    /// Read an ObjectId or null into a hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let oid = Option::<ObjectId>::deserialize(deserializer)?;
        Ok(oid.map(|oid| oid.to_hex()).unwrap_or_default())
    }
}

/// Optional hex string id stored as a BSON ObjectId or null.
pub mod object_id_hex_opt {
    use bson::oid::ObjectId;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the hex string as an ObjectId, or null when absent.
    pub fn serialize<S: Serializer>(hex: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match hex {
            Some(hex) => ObjectId::parse_str(hex)
                .map_err(S::Error::custom)?
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Read an ObjectId or null into an optional hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Option::<ObjectId>::deserialize(deserializer).map(|oid| oid.map(|oid| oid.to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::{Bson, doc};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Shipment {
        carrier: String,
        #[serde(rename = "dispatchedAt", with = "crate::codec::timestamp")]
        dispatched_at: Timestamp,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        #[serde(rename = "_id", with = "crate::codec::object_id_hex")]
        id: String,
        #[serde(rename = "customer_name")]
        customer: String,
        #[serde(rename = "createdAt", with = "crate::codec::timestamp")]
        created_at: Timestamp,
        #[serde(rename = "cancelledAt", with = "crate::codec::timestamp_opt", default)]
        cancelled_at: Option<Timestamp>,
        shipment: Shipment,
    }

    fn order() -> Order {
        Order {
            id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
            customer: "Ada".to_string(),
            created_at: Timestamp {
                seconds: 1_700_000_000,
                nanos: 250_000_000,
            },
            cancelled_at: None,
            shipment: Shipment {
                carrier: "postal".to_string(),
                dispatched_at: Timestamp {
                    seconds: 1_700_000_600,
                    nanos: 0,
                },
            },
        }
    }

    #[test]
    fn test_transform_uses_serde_names() {
        let doc = DocumentCodec::new().transform(&order()).unwrap();

        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["_id", "customer_name", "createdAt", "cancelledAt", "shipment"]
        );

        let shipment = doc.get_document("shipment").unwrap();
        assert!(shipment.contains_key("dispatchedAt"));
        assert!(!shipment.contains_key("dispatched_at"));
    }

    #[test]
    fn test_transform_protobuf_fields() {
        let doc = DocumentCodec::new().transform(&order()).unwrap();

        assert_eq!(
            doc.get("_id"),
            Some(&Bson::ObjectId(
                ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap()
            ))
        );
        assert_eq!(
            doc.get_datetime("createdAt").unwrap().timestamp_millis(),
            1_700_000_000_250
        );
        assert_eq!(doc.get("cancelledAt"), Some(&Bson::Null));

        let shipment = doc.get_document("shipment").unwrap();
        assert_eq!(
            shipment.get_datetime("dispatchedAt").unwrap().timestamp_millis(),
            1_700_000_600_000
        );
    }

    #[test]
    fn test_decode_inverts_transform() {
        let codec = DocumentCodec::new();
        let doc = codec.transform(&order()).unwrap();
        let decoded: Order = codec.decode(doc).unwrap();
        assert_eq!(decoded, order());
    }

    #[test]
    fn test_transform_non_document_fails() {
        let err = DocumentCodec::new().transform(&42_i32).unwrap_err();
        assert!(err.is_serialization_error());
    }

    #[test]
    fn test_invalid_object_id_fails() {
        let mut order = order();
        order.id = "not-hex".to_string();
        let err = DocumentCodec::new().transform(&order).unwrap_err();
        assert!(err.is_serialization_error());
    }

    #[test]
    fn test_empty_object_id_is_null() {
        let mut order = order();
        order.id = String::new();

        let codec = DocumentCodec::new();
        let doc = codec.transform(&order).unwrap();
        assert_eq!(doc.get("_id"), Some(&Bson::Null));

        let decoded: Order = codec.decode(doc).unwrap();
        assert_eq!(decoded.id, "");
    }

    #[test]
    fn test_decode_missing_field_fails() {
        let err = DocumentCodec::new()
            .decode::<Order>(doc! { "customer_name": "Ada" })
            .unwrap_err();
        assert!(err.is_serialization_error());
    }

    #[test]
    fn test_pre_epoch_timestamp() {
        let ts = datetime_to_timestamp(bson::DateTime::from_millis(-1_500));
        assert_eq!(ts.seconds, -2);
        assert_eq!(ts.nanos, 500_000_000);
        assert_eq!(timestamp_to_datetime(&ts).timestamp_millis(), -1_500);
    }

    #[test]
    fn test_human_readable_forwarded_to_serializer() {
        struct Format;

        impl Serialize for Format {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                use serde::ser::SerializeMap;
                let readable = serializer.is_human_readable();
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("readable", &readable)?;
                map.end()
            }
        }

        let compact = DocumentCodec::new().human_readable(false);
        assert_eq!(compact.transform(&Format).unwrap(), doc! { "readable": false });

        let readable = DocumentCodec::new().human_readable(true);
        assert_eq!(readable.transform(&Format).unwrap(), doc! { "readable": true });
    }
}
