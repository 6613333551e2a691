// 📥 CSV Import - bootstrap a registry from a registrations file
//
// Header:
// Plate,FirstName,LastName,LicenseNumber,Make,Model,Year,Color,Classification,VIN,RegistrationDate,ExpirationDate
//
// Dates are %Y-%m-%d. A malformed row fails the whole load with its line
// number; a row the registry rejects (duplicate plate, ...) is only counted.

use crate::error::RegistryError;
use crate::record::{Owner, Vehicle, DATE_FORMAT};
use crate::registry::RegistryCoordinator;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// One CSV row, as written in the file
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRow {
    #[serde(rename = "Plate")]
    pub plate: String,

    #[serde(rename = "FirstName")]
    pub first_name: String,

    #[serde(rename = "LastName")]
    pub last_name: String,

    #[serde(rename = "LicenseNumber")]
    pub license_number: String,

    #[serde(rename = "Make")]
    pub make: String,

    #[serde(rename = "Model")]
    pub model: String,

    #[serde(rename = "Year")]
    pub year: u16,

    #[serde(rename = "Color")]
    pub color: String,

    #[serde(rename = "Classification")]
    pub classification: String,

    #[serde(rename = "VIN")]
    pub vin: String,

    #[serde(rename = "RegistrationDate")]
    pub registration_date: String,

    #[serde(rename = "ExpirationDate")]
    pub expiration_date: String,
}

/// A row with its dates parsed, ready for `add_vehicle`
#[derive(Debug, Clone)]
pub struct Registration {
    pub plate: String,
    pub owner: Owner,
    pub vehicle: Vehicle,
    pub registration_date: NaiveDate,
    pub expiration_date: NaiveDate,
}

impl RegistrationRow {
    pub fn into_registration(self) -> Result<Registration> {
        let registration_date = parse_date(&self.registration_date)
            .with_context(|| format!("Bad RegistrationDate for {}", self.plate))?;
        let expiration_date = parse_date(&self.expiration_date)
            .with_context(|| format!("Bad ExpirationDate for {}", self.plate))?;

        Ok(Registration {
            owner: Owner::new(&self.first_name, &self.last_name, &self.license_number),
            vehicle: Vehicle::new(
                &self.make,
                &self.model,
                self.year,
                &self.color,
                &self.classification,
                &self.vin,
            ),
            plate: self.plate,
            registration_date,
            expiration_date,
        })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("Expected {} date, got '{}'", DATE_FORMAT, raw))
}

/// Read every registration from a CSV file
pub fn load_registrations(csv_path: &Path) -> Result<Vec<Registration>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut registrations = Vec::new();

    for (index, result) in rdr.deserialize().enumerate() {
        // Line 1 is the header
        let line = index + 2;
        let row: RegistrationRow =
            result.with_context(|| format!("Failed to deserialize line {}", line))?;
        let registration = row
            .into_registration()
            .with_context(|| format!("Invalid registration on line {}", line))?;
        registrations.push(registration);
    }

    debug!(path = %csv_path.display(), rows = registrations.len(), "registrations loaded");
    Ok(registrations)
}

/// Outcome of feeding registrations into a registry
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub added: usize,
    pub rejected: Vec<(String, RegistryError)>,
}

/// Add each registration; rejected ones are collected, not fatal
pub fn import_into(
    registry: &mut RegistryCoordinator,
    registrations: Vec<Registration>,
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for reg in registrations {
        match registry.add_vehicle(
            &reg.plate,
            reg.vehicle,
            reg.owner,
            reg.registration_date,
            reg.expiration_date,
        ) {
            Ok(()) => summary.added += 1,
            Err(err) => summary.rejected.push((reg.plate, err)),
        }
    }

    info!(
        added = summary.added,
        rejected = summary.rejected.len(),
        "import finished"
    );
    summary
}

/// Load a CSV straight into a fresh registry
pub fn load_registry(csv_path: &Path) -> Result<(RegistryCoordinator, ImportSummary)> {
    let registrations = load_registrations(csv_path)?;
    let mut registry = RegistryCoordinator::new();
    let summary = import_into(&mut registry, registrations);
    Ok((registry, summary))
}
