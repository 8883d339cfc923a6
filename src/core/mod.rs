pub mod comparator;
pub mod engine;
pub mod listing;
pub mod scanner;

pub use comparator::{diff, DiffResult, FileIndex};
pub use engine::{ReconcileStats, Reconciler, SyncEngine, SyncPlan, SyncReport};
pub use listing::{parse_entries, parse_listing, RemoteEntry};
pub use scanner::FileScanner;
