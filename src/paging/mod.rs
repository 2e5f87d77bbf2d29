//! Rendering decisions for long sections and the shared scroll container.

pub mod loader;
pub mod window;

pub use loader::{PageLoader, ScrollAnchor, next_section_to_load};
pub use window::{Line, SectionLayout, Window, flatten};
