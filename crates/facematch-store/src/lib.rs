//! facematch-store: SQLite persistence for enrolled identities and the
//! recognition ledger.
//!
//! Both halves share one injected [`Database`] handle.

pub mod db;
pub mod ledger;
pub mod store;

pub use db::Database;
pub use ledger::RecognitionLedger;
pub use store::DescriptorStore;
