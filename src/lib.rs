// Vehicle Registry - Core Library
// One canonical record set, three indexes kept in step by a coordinator

pub mod error;
pub mod record;
pub mod owner_index;    // AVL tree: license number → owner + plates
pub mod plate_index;    // Trie: plate prefixes
pub mod expiration_queue; // Min-heap: soonest expiration
pub mod registry;       // Coordinator over table + indexes
pub mod shared;         // Reader/writer wrapper for concurrent callers
pub mod import;         // CSV bootstrap

// Re-export commonly used types
pub use error::{RegistryError, RegistryResult};
pub use record::{
    FieldValue, Owner, Record, RecordField, RecordTable, Vehicle, DATE_FORMAT,
};
pub use owner_index::{OwnerEntry, OwnerIndex};
pub use plate_index::PlateIndex;
pub use expiration_queue::{ExpirationQueue, HeapEntry};
pub use registry::RegistryCoordinator;
pub use shared::SharedRegistry;
pub use import::{
    import_into, load_registrations, load_registry, ImportSummary, Registration, RegistrationRow,
};
