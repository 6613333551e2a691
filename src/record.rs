// 🚗 Canonical Record - the source of truth for one registration
//
// "Plate is the KEY (lookup), id is IDENTITY (never changes)"
//
// The indexes only ever hold keys into this table. The one duplicated
// value is expiration_date, mirrored into the ExpirationQueue.

use crate::error::{RegistryError, RegistryResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Calendar format used for every date entering or leaving the registry
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// OWNER + VEHICLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub first_name: String,
    pub last_name: String,
    /// Driver's license number - keys the OwnerIndex
    pub license_number: String,
}

impl Owner {
    pub fn new(first_name: &str, last_name: &str, license_number: &str) -> Self {
        Owner {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            license_number: license_number.to_string(),
        }
    }

    /// "First Last" - the name stored alongside the plates in the OwnerIndex
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    /// Passenger, Commercial, Motorcycle, ...
    pub classification: String,
    pub vin: String,
}

impl Vehicle {
    pub fn new(
        make: &str,
        model: &str,
        year: u16,
        color: &str,
        classification: &str,
        vin: &str,
    ) -> Self {
        Vehicle {
            make: make.to_string(),
            model: model.to_string(),
            year,
            color: color.to_string(),
            classification: classification.to_string(),
            vin: vin.to_string(),
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    /// Lookup key - immutable after creation
    pub plate: String,

    pub owner: Owner,
    pub vehicle: Vehicle,

    pub registration_date: NaiveDate,
    pub expiration_date: NaiveDate,

    /// When this record entered the registry
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(
        plate: &str,
        vehicle: Vehicle,
        owner: Owner,
        registration_date: NaiveDate,
        expiration_date: NaiveDate,
    ) -> Self {
        Record {
            id: uuid::Uuid::new_v4().to_string(),
            plate: plate.to_string(),
            owner,
            vehicle,
            registration_date,
            expiration_date,
            created_at: Utc::now(),
        }
    }

    /// Current value of an updatable field
    pub fn field(&self, field: RecordField) -> FieldValue {
        match field {
            RecordField::OwnerFirstName => FieldValue::Text(self.owner.first_name.clone()),
            RecordField::OwnerLastName => FieldValue::Text(self.owner.last_name.clone()),
            RecordField::VehicleMake => FieldValue::Text(self.vehicle.make.clone()),
            RecordField::VehicleModel => FieldValue::Text(self.vehicle.model.clone()),
            RecordField::VehicleYear => FieldValue::Year(self.vehicle.year),
            RecordField::VehicleColor => FieldValue::Text(self.vehicle.color.clone()),
            RecordField::VehicleClassification => {
                FieldValue::Text(self.vehicle.classification.clone())
            }
            RecordField::VehicleVin => FieldValue::Text(self.vehicle.vin.clone()),
            RecordField::RegistrationDate => FieldValue::Date(self.registration_date),
            RecordField::ExpirationDate => FieldValue::Date(self.expiration_date),
        }
    }

    /// Write a field, returning the previous value.
    ///
    /// The value kind is checked before anything is written, so a rejected
    /// update leaves the record untouched.
    pub fn set_field(
        &mut self,
        field: RecordField,
        value: FieldValue,
    ) -> RegistryResult<FieldValue> {
        let previous = self.field(field);

        match (field, value) {
            (RecordField::OwnerFirstName, FieldValue::Text(v)) => self.owner.first_name = v,
            (RecordField::OwnerLastName, FieldValue::Text(v)) => self.owner.last_name = v,
            (RecordField::VehicleMake, FieldValue::Text(v)) => self.vehicle.make = v,
            (RecordField::VehicleModel, FieldValue::Text(v)) => self.vehicle.model = v,
            (RecordField::VehicleYear, FieldValue::Year(v)) => self.vehicle.year = v,
            (RecordField::VehicleColor, FieldValue::Text(v)) => self.vehicle.color = v,
            (RecordField::VehicleClassification, FieldValue::Text(v)) => {
                self.vehicle.classification = v
            }
            (RecordField::VehicleVin, FieldValue::Text(v)) => self.vehicle.vin = v,
            (RecordField::RegistrationDate, FieldValue::Date(v)) => self.registration_date = v,
            (RecordField::ExpirationDate, FieldValue::Date(v)) => self.expiration_date = v,
            (field, value) => {
                return Err(RegistryError::InvalidFieldValue {
                    field: field.path().to_string(),
                    value: value.to_string(),
                })
            }
        }

        Ok(previous)
    }
}

// ============================================================================
// UPDATABLE FIELDS
// ============================================================================

/// Closed set of fields an update may target.
///
/// Plate and owner license number are identity and are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordField {
    OwnerFirstName,
    OwnerLastName,
    VehicleMake,
    VehicleModel,
    VehicleYear,
    VehicleColor,
    VehicleClassification,
    VehicleVin,
    RegistrationDate,
    /// The only field mirrored into an index (the ExpirationQueue)
    ExpirationDate,
}

impl RecordField {
    pub const ALL: [RecordField; 10] = [
        RecordField::OwnerFirstName,
        RecordField::OwnerLastName,
        RecordField::VehicleMake,
        RecordField::VehicleModel,
        RecordField::VehicleYear,
        RecordField::VehicleColor,
        RecordField::VehicleClassification,
        RecordField::VehicleVin,
        RecordField::RegistrationDate,
        RecordField::ExpirationDate,
    ];

    /// Dotted path as typed at the menu
    pub fn path(&self) -> &'static str {
        match self {
            RecordField::OwnerFirstName => "owner.first_name",
            RecordField::OwnerLastName => "owner.last_name",
            RecordField::VehicleMake => "vehicle.make",
            RecordField::VehicleModel => "vehicle.model",
            RecordField::VehicleYear => "vehicle.year",
            RecordField::VehicleColor => "vehicle.color",
            RecordField::VehicleClassification => "vehicle.classification",
            RecordField::VehicleVin => "vehicle.vin_number",
            RecordField::RegistrationDate => "registration_date",
            RecordField::ExpirationDate => "expiration_date",
        }
    }

    /// Whether `value` is the kind of value this field stores
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            RecordField::VehicleYear => matches!(value, FieldValue::Year(_)),
            RecordField::RegistrationDate | RecordField::ExpirationDate => {
                matches!(value, FieldValue::Date(_))
            }
            _ => matches!(value, FieldValue::Text(_)),
        }
    }

    /// Parse a raw string into the value kind this field stores
    pub fn parse_value(&self, raw: &str) -> RegistryResult<FieldValue> {
        let invalid = || RegistryError::InvalidFieldValue {
            field: self.path().to_string(),
            value: raw.to_string(),
        };

        match self {
            RecordField::VehicleYear => raw
                .trim()
                .parse()
                .map(FieldValue::Year)
                .map_err(|_| invalid()),
            RecordField::RegistrationDate | RecordField::ExpirationDate => {
                NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                    .map(FieldValue::Date)
                    .map_err(|_| invalid())
            }
            _ => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

impl FromStr for RecordField {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        // "vin" is accepted alongside the legacy "vin_number"
        if path == "vehicle.vin" {
            return Ok(RecordField::VehicleVin);
        }
        RecordField::ALL
            .iter()
            .copied()
            .find(|field| field.path() == path)
            .ok_or_else(|| RegistryError::InvalidFieldPath(s.to_string()))
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Year(u16),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Year(year) => write!(f, "{}", year),
            FieldValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

// ============================================================================
// RECORD TABLE
// ============================================================================

/// Plain plate → record store.
///
/// No consistency obligations of its own; the RegistryCoordinator keeps
/// the indexes in step with it.
#[derive(Debug, Default)]
pub struct RecordTable {
    records: HashMap<String, Record>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, plate: &str) -> Option<&Record> {
        self.records.get(plate)
    }

    pub fn get_mut(&mut self, plate: &str) -> Option<&mut Record> {
        self.records.get_mut(plate)
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.records.contains_key(plate)
    }

    /// Insert or overwrite
    pub fn set(&mut self, plate: &str, record: Record) {
        self.records.insert(plate.to_string(), record);
    }

    pub fn delete(&mut self, plate: &str) -> Option<Record> {
        self.records.remove(plate)
    }

    /// Write one field of a stored record, returning the previous value
    pub fn field_mutate(
        &mut self,
        plate: &str,
        field: RecordField,
        value: FieldValue,
    ) -> RegistryResult<FieldValue> {
        self.records
            .get_mut(plate)
            .ok_or_else(|| RegistryError::PlateNotFound(plate.to_string()))?
            .set_field(field, value)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// All plates, sorted
    pub fn plates(&self) -> Vec<String> {
        let mut plates: Vec<String> = self.records.keys().cloned().collect();
        plates.sort();
        plates
    }
}

// ============================================================================
// TESTS
// ============================================================================
