//! Record mapping for the dual-column (plaintext / `_enc`) schema.

use serde::{Deserialize, Serialize};

use crate::{envelope::Envelope, fields::encrypted_column_name_for};

/// Column name → value, as exchanged with the data store.
pub type Columns = serde_json::Map<String, serde_json::Value>;

/// One row of a record table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub columns: Columns,
}

impl Record {
    pub fn new(id: impl Into<String>, columns: Columns) -> Self {
        Self {
            id: id.into(),
            columns,
        }
    }

    /// String value of `column`, if present and a string.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(serde_json::Value::as_str)
    }
}

/// The authoritative stored form of one sensitive attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Only the legacy plaintext column is populated.
    Plaintext(String),
    /// The `_enc` column holds a well-formed envelope.
    Encrypted(Envelope),
    /// The `_enc` column is populated but is not an envelope. Still authoritative.
    Malformed(String),
}

impl Attribute {
    /// Resolve `attribute` from a row: a non-empty `_enc` value wins, otherwise
    /// a non-empty legacy value, otherwise nothing.
    pub fn resolve(columns: &Columns, attribute: &str) -> Option<Self> {
        let encrypted = columns
            .get(&encrypted_column_name_for(attribute))
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty());

        if let Some(raw) = encrypted {
            return Some(match raw.parse::<Envelope>() {
                Ok(envelope) => Self::Encrypted(envelope),
                Err(_) => Self::Malformed(raw.to_string()),
            });
        }

        columns
            .get(attribute)
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(|value| Self::Plaintext(value.to_string()))
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::Plaintext(_))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::traits::IV_LEN, serde_json::json};

    fn columns(value: serde_json::Value) -> Columns {
        value.as_object().unwrap().clone()
    }

    fn envelope_text() -> String {
        Envelope::new([0x01; IV_LEN], vec![0xAA; 20]).to_string()
    }

    #[test]
    fn encrypted_column_wins_over_plaintext() {
        let row = columns(json!({ "phone": "0301234", "phone_enc": envelope_text() }));
        let attr = Attribute::resolve(&row, "phone").unwrap();
        assert!(matches!(attr, Attribute::Encrypted(_)));
        assert!(attr.is_encrypted());
    }

    #[test]
    fn plaintext_is_fallback() {
        let row = columns(json!({ "phone": "0301234", "phone_enc": null }));
        assert_eq!(
            Attribute::resolve(&row, "phone"),
            Some(Attribute::Plaintext("0301234".into()))
        );
    }

    #[test]
    fn empty_encrypted_column_falls_back() {
        let row = columns(json!({ "phone": "0301234", "phone_enc": "" }));
        assert_eq!(
            Attribute::resolve(&row, "phone"),
            Some(Attribute::Plaintext("0301234".into()))
        );
    }

    #[test]
    fn garbage_in_encrypted_column_is_still_authoritative() {
        let row = columns(json!({ "phone": "0301234", "phone_enc": "garbage" }));
        assert_eq!(
            Attribute::resolve(&row, "phone"),
            Some(Attribute::Malformed("garbage".into()))
        );
    }

    #[test]
    fn nothing_stored_resolves_to_none() {
        assert_eq!(Attribute::resolve(&columns(json!({})), "phone"), None);
        let blank = columns(json!({ "phone": "   ", "phone_enc": null }));
        assert_eq!(Attribute::resolve(&blank, "phone"), None);
        let numeric = columns(json!({ "phone": 12345 }));
        assert_eq!(Attribute::resolve(&numeric, "phone"), None);
    }

    #[test]
    fn record_text_accessor() {
        let record = Record::new("r1", columns(json!({ "a": "x", "b": 1 })));
        assert_eq!(record.text("a"), Some("x"));
        assert_eq!(record.text("b"), None);
        assert_eq!(record.text("c"), None);
    }
}
