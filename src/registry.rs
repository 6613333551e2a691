// 🗂️ Registry Coordinator - one record set, three indexes
//
// Canonical table:   plate → Record            (source of truth)
// OwnerIndex:        license → owner + plates   (AVL tree)
// PlateIndex:        plate prefixes             (trie)
// ExpirationQueue:   (expiration, plate)        (min-heap)
//
// Every mutation validates first, then touches the table and the indexes
// in a fixed order. A plate is either registered everywhere or nowhere.

use crate::error::{RegistryError, RegistryResult};
use crate::expiration_queue::{ExpirationQueue, HeapEntry};
use crate::owner_index::{OwnerEntry, OwnerIndex};
use crate::plate_index::PlateIndex;
use crate::record::{FieldValue, Owner, Record, RecordField, RecordTable, Vehicle};
use chrono::NaiveDate;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct RegistryCoordinator {
    records: RecordTable,
    owners: OwnerIndex,
    plates: PlateIndex,
    expirations: ExpirationQueue,
}

impl RegistryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.records.contains(plate)
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Register a new vehicle.
    ///
    /// Order: canonical record, PlateIndex, ExpirationQueue, OwnerIndex.
    /// Nothing is touched if the plate is empty or already registered.
    pub fn add_vehicle(
        &mut self,
        plate: &str,
        vehicle: Vehicle,
        owner: Owner,
        registration_date: NaiveDate,
        expiration_date: NaiveDate,
    ) -> RegistryResult<()> {
        if plate.is_empty() {
            warn!("rejected registration with empty plate");
            return Err(RegistryError::EmptyPlate);
        }
        if self.records.contains(plate) {
            warn!(plate, "rejected duplicate registration");
            return Err(RegistryError::DuplicatePlate(plate.to_string()));
        }

        let license_number = owner.license_number.clone();
        let owner_name = owner.full_name();
        // Latest registration wins: the license holder's other records
        // take this name before the plate joins the owner node.
        let renamed = self.sync_owner_name(&owner);
        let record = Record::new(plate, vehicle, owner, registration_date, expiration_date);

        self.records.set(plate, record);
        self.plates.insert(plate);
        self.expirations.add(plate, expiration_date);
        self.owners.insert(&license_number, &owner_name, plate);

        if renamed > 0 {
            debug!(
                owner = %license_number,
                renamed,
                name = %owner_name,
                "owner renamed on earlier plates"
            );
        }

        debug!(plate, owner = %license_number, expires = %expiration_date, "vehicle registered");
        Ok(())
    }

    /// Update one field of a registration, returning the previous value.
    ///
    /// Two fields have side-effects beyond the record:
    ///
    /// - `ExpirationDate`: the queue entry is moved in a single step before
    ///   the canonical date is written, so a rejected update leaves both the
    ///   old record and the old entry in place.
    /// - `OwnerFirstName` / `OwnerLastName`: the new name is copied to every
    ///   record held under the same license and to the owner node.
    pub fn update_field(
        &mut self,
        plate: &str,
        field: RecordField,
        value: FieldValue,
    ) -> RegistryResult<FieldValue> {
        if !self.records.contains(plate) {
            warn!(plate, field = %field, "update on unknown plate");
            return Err(RegistryError::PlateNotFound(plate.to_string()));
        }
        if !field.accepts(&value) {
            warn!(plate, field = %field, value = %value, "update with wrong value kind");
            return Err(RegistryError::InvalidFieldValue {
                field: field.path().to_string(),
                value: value.to_string(),
            });
        }

        if let (RecordField::ExpirationDate, Some(date)) = (field, value.as_date()) {
            if self.expirations.replace(plate, date).is_none() {
                // Queue lost track of a registered plate; re-add so it converges
                warn!(plate, "expiration entry missing, re-adding");
                self.expirations.add(plate, date);
            }
        }

        let previous = self.records.field_mutate(plate, field, value)?;

        if matches!(field, RecordField::OwnerFirstName | RecordField::OwnerLastName) {
            if let Some(owner) = self.records.get(plate).map(|r| r.owner.clone()) {
                let renamed = self.sync_owner_name(&owner);
                debug!(plate, owner = %owner.license_number, renamed, "owner name propagated");
            }
        }

        debug!(plate, field = %field, previous = %previous, "registration updated");
        Ok(previous)
    }

    /// Update by dotted path and raw string, as typed at the menu
    pub fn update_field_path(
        &mut self,
        plate: &str,
        path: &str,
        raw_value: &str,
    ) -> RegistryResult<FieldValue> {
        let field: RecordField = path.parse()?;
        let value = field.parse_value(raw_value)?;
        self.update_field(plate, field, value)
    }

    /// Remove a registration from every index, then from the table.
    ///
    /// The owner's license number is read before the record is dropped.
    pub fn remove_vehicle(&mut self, plate: &str) -> RegistryResult<Record> {
        let license_number = match self.records.get(plate) {
            Some(record) => record.owner.license_number.clone(),
            None => {
                warn!(plate, "remove on unknown plate");
                return Err(RegistryError::PlateNotFound(plate.to_string()));
            }
        };

        if let Err(err) = self.owners.remove(&license_number, plate) {
            warn!(plate, error = %err, "owner index out of step during remove");
        }
        if !self.plates.remove(plate) {
            warn!(plate, "plate index out of step during remove");
        }
        if self.expirations.remove(plate).is_none() {
            warn!(plate, "expiration queue out of step during remove");
        }

        let record = self
            .records
            .delete(plate)
            .ok_or_else(|| RegistryError::PlateNotFound(plate.to_string()))?;

        debug!(plate, owner = %license_number, "vehicle removed");
        Ok(record)
    }

    /// Remove and return the soonest-expiring registration (all indexes).
    ///
    /// A queue head with no record behind it is dropped and the next entry
    /// tried, so one stale entry cannot stall extraction.
    pub fn extract_next_expiring(&mut self) -> Option<Record> {
        while let Some(entry) = self.expirations.peek_next() {
            let plate = entry.plate.clone();
            match self.remove_vehicle(&plate) {
                Ok(record) => return Some(record),
                Err(err) => {
                    warn!(plate = %plate, error = %err, "dropping orphaned expiration entry");
                    self.expirations.remove(&plate);
                }
            }
        }
        None
    }

    /// Give every record under `owner.license_number`, and the owner node,
    /// this owner's name. Returns how many records changed.
    fn sync_owner_name(&mut self, owner: &Owner) -> usize {
        let plates = match self.owners.find_by_owner(&owner.license_number) {
            Some(entry) => entry.plates,
            None => return 0,
        };

        let mut renamed = 0;
        for plate in &plates {
            match self.records.get_mut(plate) {
                Some(record)
                    if record.owner.first_name != owner.first_name
                        || record.owner.last_name != owner.last_name =>
                {
                    record.owner.first_name = owner.first_name.clone();
                    record.owner.last_name = owner.last_name.clone();
                    renamed += 1;
                }
                Some(_) => {}
                None => warn!(plate = %plate, "owner index lists a plate with no record"),
            }
        }

        self.owners.rename(&owner.license_number, &owner.full_name());
        renamed
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn find_by_plate(&self, plate: &str) -> RegistryResult<&Record> {
        self.records
            .get(plate)
            .ok_or_else(|| RegistryError::PlateNotFound(plate.to_string()))
    }

    /// Plates starting with `prefix`, ascending. Empty prefix → empty.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<String> {
        self.plates.search_by_prefix(prefix)
    }

    pub fn peek_next_expiring(&self) -> Option<&HeapEntry> {
        self.expirations.peek_next()
    }

    pub fn find_by_owner(&self, license_number: &str) -> RegistryResult<OwnerEntry> {
        self.owners
            .find_by_owner(license_number)
            .ok_or_else(|| RegistryError::OwnerNotFound(license_number.to_string()))
    }

    /// Full expiration order, soonest first
    pub fn expiring_in_order(&self) -> Vec<HeapEntry> {
        self.expirations.sorted()
    }

    pub fn expiring_before(&self, cutoff: NaiveDate) -> Vec<HeapEntry> {
        self.expirations.expiring_before(cutoff)
    }

    /// Owners in license-number order
    pub fn owners(&self) -> Vec<OwnerEntry> {
        self.owners.owners()
    }

    /// Unordered
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    // ========================================================================
    // CONSISTENCY
    // ========================================================================

    /// Re-derive the cross-index invariant; returns every violation found.
    pub fn verify_consistency(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for record in self.records.iter() {
            let plate = &record.plate;

            if !self.plates.search_by_prefix(plate).contains(plate) {
                violations.push(format!("{}: missing from plate index", plate));
            }

            match self.expirations.expiration_of(plate) {
                Some(date) if date == record.expiration_date => {}
                Some(date) => violations.push(format!(
                    "{}: queue has {} but record has {}",
                    plate, date, record.expiration_date
                )),
                None => violations.push(format!("{}: missing from expiration queue", plate)),
            }

            let license = &record.owner.license_number;
            match self.owners.find_by_owner(license) {
                Some(entry) => {
                    let held = entry.plates.iter().filter(|p| *p == plate).count();
                    if held != 1 {
                        violations.push(format!(
                            "{}: listed {} times under owner {}",
                            plate, held, license
                        ));
                    }
                    let name = record.owner.full_name();
                    if entry.owner_name != name {
                        violations.push(format!(
                            "{}: record names '{}' but owner {} is indexed as '{}'",
                            plate, name, license, entry.owner_name
                        ));
                    }
                }
                None => violations.push(format!("{}: owner {} not in owner index", plate, license)),
            }
        }

        // Conversely, nothing indexed without a canonical record
        if self.plates.len() != self.records.len() {
            violations.push(format!(
                "plate index holds {} plates, table holds {}",
                self.plates.len(),
                self.records.len()
            ));
        }
        for entry in self.expirations.iter() {
            if !self.records.contains(&entry.plate) {
                violations.push(format!("{}: queued but not registered", entry.plate));
            }
        }
        for owner in self.owners.owners() {
            for plate in &owner.plates {
                let belongs = self
                    .records
                    .get(plate)
                    .map_or(false, |r| r.owner.license_number == owner.license_number);
                if !belongs {
                    violations.push(format!(
                        "{}: listed under owner {} without a matching record",
                        plate, owner.license_number
                    ));
                }
            }
        }

        if let Err(err) = self.owners.check_invariants() {
            violations.push(format!("owner index: {}", err));
        }

        violations
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn car() -> Vehicle {
        Vehicle::new("Honda", "Civic", 2020, "Silver", "Passenger", "2HGFC2F59LH000001")
    }

    fn jane() -> Owner {
        Owner::new("Jane", "Doe", "DL1")
    }

    fn add(registry: &mut RegistryCoordinator, plate: &str, owner: Owner, expires: &str) {
        registry
            .add_vehicle(plate, car(), owner, date("2023-01-01"), date(expires))
            .unwrap();
    }

    #[test]
    fn test_scenario_add_update_remove() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");
        add(&mut registry, "ABC456", jane(), "2023-12-01");

        let owner = registry.find_by_owner("DL1").unwrap();
        assert_eq!(owner.owner_name, "Jane Doe");
        assert_eq!(owner.plates, vec!["ABC123", "ABC456"]);
        assert_eq!(
            registry.peek_next_expiring(),
            Some(&HeapEntry::new("ABC456", date("2023-12-01")))
        );

        registry
            .update_field_path("ABC456", "expiration_date", "2025-01-01")
            .unwrap();
        assert_eq!(
            registry.peek_next_expiring(),
            Some(&HeapEntry::new("ABC123", date("2024-01-15")))
        );

        registry.remove_vehicle("ABC123").unwrap();
        assert_eq!(registry.find_by_prefix("ABC"), vec!["ABC456"]);
        assert_eq!(registry.find_by_owner("DL1").unwrap().plates, vec!["ABC456"]);
        assert!(registry.verify_consistency().is_empty());
    }

    #[test]
    fn test_duplicate_plate_rejected_without_side_effects() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        let result = registry.add_vehicle(
            "ABC123",
            car(),
            Owner::new("John", "Roe", "DL2"),
            date("2023-01-01"),
            date("2020-01-01"),
        );

        assert_eq!(result, Err(RegistryError::DuplicatePlate("ABC123".to_string())));
        assert!(registry.find_by_owner("DL2").is_err());
        assert_eq!(registry.peek_next_expiring().unwrap().expiration_date, date("2024-01-15"));
        assert_eq!(registry.find_by_prefix("ABC123"), vec!["ABC123"]);
        assert!(registry.verify_consistency().is_empty());
    }

    #[test]
    fn test_empty_plate_rejected() {
        let mut registry = RegistryCoordinator::new();
        let result =
            registry.add_vehicle("", car(), jane(), date("2023-01-01"), date("2024-01-01"));

        assert_eq!(result, Err(RegistryError::EmptyPlate));
        assert!(registry.is_empty());
        assert!(registry.owners().is_empty());
    }

    #[test]
    fn test_update_non_indexed_field() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        let previous = registry
            .update_field("ABC123", RecordField::VehicleColor, FieldValue::Text("Red".to_string()))
            .unwrap();

        assert_eq!(previous, FieldValue::Text("Silver".to_string()));
        assert_eq!(registry.find_by_plate("ABC123").unwrap().vehicle.color, "Red");
        assert_eq!(registry.expiring_in_order().len(), 1);
    }

    #[test]
    fn test_update_errors_leave_state_untouched() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        assert_eq!(
            registry.update_field_path("NOPE", "vehicle.color", "Red"),
            Err(RegistryError::PlateNotFound("NOPE".to_string()))
        );
        assert_eq!(
            registry.update_field_path("ABC123", "vehicle.wings", "2"),
            Err(RegistryError::InvalidFieldPath("vehicle.wings".to_string()))
        );
        assert!(matches!(
            registry.update_field_path("ABC123", "expiration_date", "next week"),
            Err(RegistryError::InvalidFieldValue { .. })
        ));
        assert!(matches!(
            registry.update_field("ABC123", RecordField::ExpirationDate, FieldValue::Year(2030)),
            Err(RegistryError::InvalidFieldValue { .. })
        ));

        assert_eq!(registry.find_by_plate("ABC123").unwrap().expiration_date, date("2024-01-15"));
        assert_eq!(registry.peek_next_expiring().unwrap().expiration_date, date("2024-01-15"));
        assert!(registry.verify_consistency().is_empty());
    }

    #[test]
    fn test_remove_unknown_plate() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        assert_eq!(
            registry.remove_vehicle("XYZ999").map(|r| r.plate),
            Err(RegistryError::PlateNotFound("XYZ999".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_last_plate_drops_owner() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        let removed = registry.remove_vehicle("ABC123").unwrap();

        assert_eq!(removed.owner.license_number, "DL1");
        assert_eq!(
            registry.find_by_owner("DL1"),
            Err(RegistryError::OwnerNotFound("DL1".to_string()))
        );
        assert!(registry.find_by_prefix("A").is_empty());
        assert!(registry.peek_next_expiring().is_none());
        assert!(registry.verify_consistency().is_empty());
    }

    #[test]
    fn test_extract_next_expiring_removes_everywhere() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");
        add(&mut registry, "XYZ789", Owner::new("John", "Roe", "DL2"), "2023-12-01");

        let record = registry.extract_next_expiring().unwrap();

        assert_eq!(record.plate, "XYZ789");
        assert!(!registry.contains("XYZ789"));
        assert!(registry.find_by_owner("DL2").is_err());
        assert!(registry.verify_consistency().is_empty());

        registry.extract_next_expiring().unwrap();
        assert!(registry.extract_next_expiring().is_none());
    }

    #[test]
    fn test_expiring_before_cutoff() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "AAA111", jane(), "2024-01-15");
        add(&mut registry, "BBB222", jane(), "2023-06-01");
        add(&mut registry, "CCC333", jane(), "2025-01-01");

        let plates: Vec<String> = registry
            .expiring_before(date("2024-06-01"))
            .into_iter()
            .map(|e| e.plate)
            .collect();

        assert_eq!(plates, vec!["BBB222", "AAA111"]);
    }

    #[test]
    fn test_owners_listed_in_license_order() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "P1", Owner::new("C", "C", "DL3"), "2024-01-01");
        add(&mut registry, "P2", Owner::new("A", "A", "DL1"), "2024-01-01");
        add(&mut registry, "P3", Owner::new("B", "B", "DL2"), "2024-01-01");

        let licenses: Vec<String> = registry
            .owners()
            .into_iter()
            .map(|o| o.license_number)
            .collect();
        assert_eq!(licenses, vec!["DL1", "DL2", "DL3"]);
    }

    #[test]
    fn test_verify_consistency_detects_divergence() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        // Simulate an index drifting away from the table
        registry.expirations.remove("ABC123");
        registry.plates.insert("GHOST1");

        let violations = registry.verify_consistency();
        assert!(violations.iter().any(|v| v.contains("missing from expiration queue")));
        assert!(violations.iter().any(|v| v.contains("plate index holds 2")));
    }

    #[test]
    fn test_owner_name_update_reaches_index_and_sibling_records() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");
        add(&mut registry, "ABC456", jane(), "2023-12-01");

        let previous = registry
            .update_field_path("ABC123", "owner.last_name", "Smith")
            .unwrap();

        assert_eq!(previous, FieldValue::Text("Doe".to_string()));
        assert_eq!(registry.find_by_owner("DL1").unwrap().owner_name, "Jane Smith");
        assert_eq!(registry.find_by_plate("ABC456").unwrap().owner.full_name(), "Jane Smith");
        assert!(registry.verify_consistency().is_empty());
    }

    #[test]
    fn test_new_name_on_existing_license_wins() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");
        add(&mut registry, "ABC456", Owner::new("John", "Roe", "DL1"), "2023-12-01");

        let owner = registry.find_by_owner("DL1").unwrap();
        assert_eq!(owner.owner_name, "John Roe");
        assert_eq!(owner.plates, vec!["ABC123", "ABC456"]);
        assert_eq!(registry.find_by_plate("ABC123").unwrap().owner.full_name(), "John Roe");
        assert!(registry.verify_consistency().is_empty());
    }

    #[test]
    fn test_verify_consistency_detects_owner_name_drift() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");

        registry.owners.rename("DL1", "Someone Else");

        let violations = registry.verify_consistency();
        assert_eq!(violations.len(), 1, "{:?}", violations);
        assert!(violations[0].contains("indexed as 'Someone Else'"));
    }

    #[test]
    fn test_extract_skips_orphaned_queue_head() {
        let mut registry = RegistryCoordinator::new();
        add(&mut registry, "ABC123", jane(), "2024-01-15");
        registry.expirations.add("GHOST1", date("2020-01-01"));

        let record = registry.extract_next_expiring().unwrap();

        assert_eq!(record.plate, "ABC123");
        assert!(registry.peek_next_expiring().is_none());
        assert!(registry.extract_next_expiring().is_none());
    }
}
