//! Optimistic updates: apply locally, send, and undo on failure.

pub mod clock;
pub mod ledger;
pub mod mutation;

pub use clock::FieldClock;
pub use ledger::{Ledger, Pending};
pub use mutation::Mutation;
