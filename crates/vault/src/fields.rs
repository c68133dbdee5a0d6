//! Which attributes of which record types are sensitive.
//!
//! Adding a sensitive field is a one-line change to [`RecordKind::sensitive_fields`];
//! every read path, write path and migration pass picks it up from here.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Suffix of the ciphertext column paired with each sensitive attribute.
pub const ENCRYPTED_SUFFIX: &str = "_enc";

/// Record types that carry sensitive attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Children,
    EmergencyContacts,
    Contacts,
}

impl RecordKind {
    /// Every kind, in migration order.
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Children,
        RecordKind::EmergencyContacts,
        RecordKind::Contacts,
    ];

    /// Storage table for this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Children => "children",
            Self::EmergencyContacts => "emergency_contacts",
            Self::Contacts => "contacts",
        }
    }

    /// Sensitive attributes, in processing order.
    pub fn sensitive_fields(self) -> &'static [&'static str] {
        match self {
            Self::Children => &[
                "passport_number",
                "insurance_number",
                "allergies",
                "health_notes",
            ],
            Self::EmergencyContacts => &["phone", "address", "notes"],
            Self::Contacts => &["phone", "email", "address"],
        }
    }

    /// Whether `column` is a sensitive attribute or its ciphertext counterpart.
    pub fn is_storage_column(self, column: &str) -> bool {
        self.sensitive_fields().iter().any(|field| {
            *field == column
                || column
                    .strip_prefix(field)
                    .is_some_and(|rest| rest == ENCRYPTED_SUFFIX)
        })
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.table() == s)
            .ok_or_else(|| format!("unknown record kind: {s}"))
    }
}

/// Name of the ciphertext column for `attribute`.
pub fn encrypted_column_name_for(attribute: &str) -> String {
    format!("{attribute}{ENCRYPTED_SUFFIX}")
}
