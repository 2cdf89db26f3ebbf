//! Metadata records: fixed core fields plus an open bag of dynamic fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{DataValue, Metadata};
use crate::error::{Result, VdsError};

pub const FIELD_FINGERPRINT: &str = "fingerprint";
pub const FIELD_COLLECTION: &str = "collection";
pub const FIELD_SLOT_ID: &str = "slot_id";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";
pub const FIELD_LAST_ACCESSED_AT: &str = "last_accessed_at";
pub const FIELD_SOURCE: &str = "source";
pub const FIELD_STATUS: &str = "status";

/// Keys that map onto [`MetadataRecord`] fields rather than the dynamic bag.
pub const CORE_FIELDS: [&str; 8] = [
    FIELD_FINGERPRINT,
    FIELD_COLLECTION,
    FIELD_SLOT_ID,
    FIELD_CREATED_AT,
    FIELD_UPDATED_AT,
    FIELD_LAST_ACCESSED_AT,
    FIELD_SOURCE,
    FIELD_STATUS,
];

pub const DEFAULT_SOURCE: &str = "unknown";

pub fn is_core_field(key: &str) -> bool {
    CORE_FIELDS.contains(&key)
}

/// Lifecycle state mirrored from the vector side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    SoftDeleted,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::SoftDeleted => write!(f, "soft_deleted"),
        }
    }
}

impl FromStr for RecordStatus {
    type Err = VdsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(RecordStatus::Active),
            "soft_deleted" | "deleted" => Ok(RecordStatus::SoftDeleted),
            other => Err(VdsError::invalid_argument(format!(
                "unknown record status '{other}'"
            ))),
        }
    }
}

/// One metadata record, keyed by fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub fingerprint: String,
    pub collection: Option<String>,
    pub slot_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub source: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub fields: Metadata,
}

impl MetadataRecord {
    /// A fresh record with default core fields and no dynamic fields.
    pub fn new(fingerprint: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            collection: None,
            slot_id: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            source: DEFAULT_SOURCE.to_string(),
            status: RecordStatus::Active,
            fields: Metadata::new(),
        }
    }

    /// Build a record from caller data, splitting core from dynamic fields.
    ///
    /// `created_at` may be supplied (for imports); `updated_at` is always
    /// stamped with `now`. A `fingerprint` key must match `fingerprint`.
    pub fn from_data(fingerprint: &str, data: Metadata, now: DateTime<Utc>) -> Result<Self> {
        let mut record = Self::new(fingerprint, now);
        for (key, value) in data {
            match key.as_str() {
                FIELD_FINGERPRINT => {
                    if value.as_text() != Some(fingerprint) {
                        return Err(VdsError::invalid_argument(format!(
                            "metadata fingerprint does not match '{fingerprint}'"
                        )));
                    }
                }
                FIELD_CREATED_AT => record.created_at = expect_timestamp(&key, &value)?,
                FIELD_UPDATED_AT => {
                    return Err(VdsError::invalid_argument(
                        "updated_at is maintained by the metadata store",
                    ));
                }
                _ => record.apply(&key, value)?,
            }
        }
        Ok(record)
    }

    /// Merge `updates` into the record.
    ///
    /// Every key is validated before anything is written, so a rejected
    /// update leaves the record unchanged.
    pub fn apply_updates(&mut self, updates: Metadata, now: DateTime<Utc>) -> Result<()> {
        let mut staged = self.clone();
        for (key, value) in updates {
            match key.as_str() {
                FIELD_FINGERPRINT | FIELD_CREATED_AT | FIELD_UPDATED_AT => {
                    return Err(VdsError::invalid_argument(format!(
                        "'{key}' cannot be updated"
                    )));
                }
                _ => staged.apply(&key, value)?,
            }
        }
        staged.updated_at = now;
        *self = staged;
        Ok(())
    }

    /// Set one mutable field. `Null` clears optional fields and dynamic keys.
    fn apply(&mut self, key: &str, value: DataValue) -> Result<()> {
        match key {
            FIELD_COLLECTION => {
                self.collection = match value {
                    DataValue::Null => None,
                    other => Some(expect_text(key, &other)?.to_string()),
                };
            }
            FIELD_SLOT_ID => {
                self.slot_id = match value {
                    DataValue::Null => None,
                    other => Some(expect_slot(key, &other)?),
                };
            }
            FIELD_LAST_ACCESSED_AT => {
                self.last_accessed_at = match value {
                    DataValue::Null => None,
                    other => Some(expect_timestamp(key, &other)?),
                };
            }
            FIELD_SOURCE => {
                self.source = match value {
                    DataValue::Null => DEFAULT_SOURCE.to_string(),
                    other => expect_text(key, &other)?.to_string(),
                };
            }
            FIELD_STATUS => {
                self.status = expect_text(key, &value)?.parse()?;
            }
            _ => {
                if value.is_null() {
                    self.fields.remove(key);
                } else {
                    self.fields.insert(key.to_string(), value);
                }
            }
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Value of a core or dynamic field by name.
    pub fn get(&self, key: &str) -> Option<DataValue> {
        match key {
            FIELD_FINGERPRINT => Some(DataValue::from(self.fingerprint.as_str())),
            FIELD_COLLECTION => self.collection.as_deref().map(DataValue::from),
            FIELD_SLOT_ID => self.slot_id.and_then(|slot| DataValue::try_from(slot).ok()),
            FIELD_CREATED_AT => Some(DataValue::DateTime(self.created_at)),
            FIELD_UPDATED_AT => Some(DataValue::DateTime(self.updated_at)),
            FIELD_LAST_ACCESSED_AT => self.last_accessed_at.map(DataValue::DateTime),
            FIELD_SOURCE => Some(DataValue::from(self.source.as_str())),
            FIELD_STATUS => Some(DataValue::from(self.status.to_string())),
            _ => self.fields.get(key).cloned(),
        }
    }

    /// Flatten core and dynamic fields into one mapping.
    pub fn to_map(&self) -> Metadata {
        let mut map = self.fields.clone();
        for key in CORE_FIELDS {
            if let Some(value) = self.get(key) {
                map.insert(key.to_string(), value);
            }
        }
        map
    }
}

fn type_error(key: &str, expected: &str, value: &DataValue) -> VdsError {
    VdsError::invalid_argument(format!(
        "core field '{key}' expects {expected}, got {}",
        value.type_name()
    ))
}

fn expect_text<'a>(key: &str, value: &'a DataValue) -> Result<&'a str> {
    value.as_text().ok_or_else(|| type_error(key, "string", value))
}

fn expect_slot(key: &str, value: &DataValue) -> Result<u64> {
    value
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| type_error(key, "non-negative int64", value))
}

/// Accepts a datetime value or an RFC 3339 string.
fn expect_timestamp(key: &str, value: &DataValue) -> Result<DateTime<Utc>> {
    if let Some(dt) = value.as_datetime() {
        return Ok(dt);
    }
    value
        .as_text()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| type_error(key, "datetime", value))
}
