//! SeaORM entity definitions for the siphon progress schema.

pub mod page_status;
pub mod prelude;
pub mod sync_error;
pub mod sync_page;
pub mod sync_window;
