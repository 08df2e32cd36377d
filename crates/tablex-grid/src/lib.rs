//! TableX Grid - client-side controller for a paged, filtered table view
//!
//! Turns filter, sort and paging interactions into a [`QueryDescriptor`], keeps a
//! remote row source in sync with it, and computes which rows are visible.
//!
//! - `operators` - Which filter operators each column variant accepts
//! - `FilterList` / `SortList` - The clause lists the user edits
//! - `PaginationWindow` - Page index/size, persisted per data source
//! - `build_descriptor` - Pure combination of the above
//! - `Viewport` - Virtualized render window
//! - `SyncLayer` - Descriptor-keyed fetching with last-issued-wins ordering
//! - `TableController` - One per table view, owns all of the above
//!
//! [`QueryDescriptor`]: tablex_core::QueryDescriptor

mod builder;
mod controller;
mod debounce;
mod filter_list;
pub mod operators;
mod pagination;
mod persist;
mod settings;
mod sort_list;
mod sync;
mod viewport;

pub use builder::*;
pub use controller::*;
pub use debounce::*;
pub use filter_list::*;
pub use operators::{default_operator_for, operators_for};
pub use pagination::*;
pub use persist::*;
pub use settings::*;
pub use sort_list::*;
pub use sync::*;
pub use viewport::*;
