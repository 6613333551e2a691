// 🔒 Shared Registry - reader/writer access from several threads
//
// A mutation touches up to four structures, so each one holds the write
// lock for its whole duration. Queries share the read lock and hand back
// owned values, never references into the locked state.

use crate::error::RegistryResult;
use crate::expiration_queue::HeapEntry;
use crate::owner_index::OwnerEntry;
use crate::record::{FieldValue, Owner, Record, RecordField, Vehicle};
use crate::registry::RegistryCoordinator;
use chrono::NaiveDate;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, warn};

#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<RegistryCoordinator>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock is recovered, but a writer may have died between two
    // of the four structures, so the registry is re-checked and any
    // divergence logged.
    fn read(&self) -> RwLockReadGuard<'_, RegistryCoordinator> {
        self.inner.read().unwrap_or_else(|poisoned| {
            let guard = poisoned.into_inner();
            report_poisoned(&guard);
            guard
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryCoordinator> {
        self.inner.write().unwrap_or_else(|poisoned| {
            let guard = poisoned.into_inner();
            report_poisoned(&guard);
            guard
        })
    }

    /// Run several reads against one consistent view
    pub fn with_read<T>(&self, f: impl FnOnce(&RegistryCoordinator) -> T) -> T {
        f(&self.read())
    }

    /// Run several mutations as one exclusive step
    pub fn with_write<T>(&self, f: impl FnOnce(&mut RegistryCoordinator) -> T) -> T {
        f(&mut self.write())
    }

    // ========================================================================
    // MUTATIONS (write lock)
    // ========================================================================

    pub fn add_vehicle(
        &self,
        plate: &str,
        vehicle: Vehicle,
        owner: Owner,
        registration_date: NaiveDate,
        expiration_date: NaiveDate,
    ) -> RegistryResult<()> {
        self.write()
            .add_vehicle(plate, vehicle, owner, registration_date, expiration_date)
    }

    pub fn update_field(
        &self,
        plate: &str,
        field: RecordField,
        value: FieldValue,
    ) -> RegistryResult<FieldValue> {
        self.write().update_field(plate, field, value)
    }

    pub fn update_field_path(
        &self,
        plate: &str,
        path: &str,
        raw_value: &str,
    ) -> RegistryResult<FieldValue> {
        self.write().update_field_path(plate, path, raw_value)
    }

    pub fn remove_vehicle(&self, plate: &str) -> RegistryResult<Record> {
        self.write().remove_vehicle(plate)
    }

    pub fn extract_next_expiring(&self) -> Option<Record> {
        self.write().extract_next_expiring()
    }

    // ========================================================================
    // QUERIES (read lock)
    // ========================================================================

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn find_by_plate(&self, plate: &str) -> RegistryResult<Record> {
        self.read().find_by_plate(plate).cloned()
    }

    pub fn find_by_prefix(&self, prefix: &str) -> Vec<String> {
        self.read().find_by_prefix(prefix)
    }

    pub fn peek_next_expiring(&self) -> Option<HeapEntry> {
        self.read().peek_next_expiring().cloned()
    }

    pub fn find_by_owner(&self, license_number: &str) -> RegistryResult<OwnerEntry> {
        self.read().find_by_owner(license_number)
    }

    pub fn expiring_in_order(&self) -> Vec<HeapEntry> {
        self.read().expiring_in_order()
    }

    pub fn verify_consistency(&self) -> Vec<String> {
        self.read().verify_consistency()
    }
}

fn report_poisoned(registry: &RegistryCoordinator) {
    let violations = registry.verify_consistency();
    if violations.is_empty() {
        warn!("registry lock poisoned, indexes still consistent");
        return;
    }
    error!(count = violations.len(), "registry lock poisoned mid-mutation");
    for violation in &violations {
        error!(%violation, "index divergence");
    }
}

impl From<RegistryCoordinator> for SharedRegistry {
    fn from(registry: RegistryCoordinator) -> Self {
        SharedRegistry {
            inner: Arc::new(RwLock::new(registry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn vehicle() -> Vehicle {
        Vehicle::new("Ford", "F-150", 2018, "Black", "Commercial", "1FTFW1E50JFA00001")
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SharedRegistry::new();
        let other = registry.clone();

        registry
            .add_vehicle(
                "TRK001",
                vehicle(),
                Owner::new("Sam", "Lee", "DL7"),
                date("2023-01-01"),
                date("2024-01-01"),
            )
            .unwrap();

        assert_eq!(other.len(), 1);
        assert_eq!(other.find_by_plate("TRK001").unwrap().vehicle.make, "Ford");
    }

    #[test]
    fn test_concurrent_writers_stay_consistent() {
        let registry = SharedRegistry::new();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let plate = format!("T{}P{:02}", t, i);
                        registry
                            .add_vehicle(
                                &plate,
                                vehicle(),
                                Owner::new("Owner", "Thread", &format!("DL{}", t)),
                                date("2023-01-01"),
                                date("2024-01-01") + chrono::Duration::days(i),
                            )
                            .unwrap();
                        if i % 5 == 0 {
                            registry.remove_vehicle(&plate).unwrap();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 4 * 40);
        assert!(registry.verify_consistency().is_empty());
        assert_eq!(registry.find_by_owner("DL2").unwrap().plates.len(), 40);
    }

    #[test]
    fn test_poisoned_lock_keeps_serving() {
        let registry = SharedRegistry::new();
        registry
            .add_vehicle(
                "TRK001",
                vehicle(),
                Owner::new("Sam", "Lee", "DL7"),
                date("2023-01-01"),
                date("2024-01-01"),
            )
            .unwrap();

        let writer = registry.clone();
        let result = thread::spawn(move || {
            writer.with_write(|r| {
                r.remove_vehicle("TRK001").unwrap();
                panic!("writer died mid-batch");
            })
        })
        .join();

        assert!(result.is_err());
        assert!(registry.is_empty());
        assert!(registry.verify_consistency().is_empty());
        assert!(registry.find_by_owner("DL7").is_err());
    }

    #[test]
    fn test_with_read_sees_one_view() {
        let registry = SharedRegistry::new();
        registry
            .add_vehicle(
                "TRK001",
                vehicle(),
                Owner::new("Sam", "Lee", "DL7"),
                date("2023-01-01"),
                date("2024-01-01"),
            )
            .unwrap();

        let (count, next) = registry.with_read(|r| {
            (r.len(), r.peek_next_expiring().map(|e| e.plate.clone()))
        });

        assert_eq!(count, 1);
        assert_eq!(next.as_deref(), Some("TRK001"));
    }
}
