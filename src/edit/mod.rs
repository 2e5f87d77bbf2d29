//! Inline edit controller: per-field editors, autosave debounce, row
//! identity across id swaps, and the per-task save guard.

pub mod debounce;
pub mod field_editor;
pub mod rows;
pub mod validate;

pub use debounce::{DebounceState, Debouncer};
pub use field_editor::{EditState, FieldEditor};
pub use rows::{Row, RowKey, RowRegistry, SaveGuard};
pub use validate::{ValidationError, validate_name};
