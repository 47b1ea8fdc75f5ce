//! Chain storage seam.
//!
//! The ledger / state-transition engine lives behind [`ChainStore`]. The node
//! only validates, inserts and walks blocks through it.

pub mod chain;
pub mod error;

pub use chain::ChainStore;
pub use error::StoreError;
