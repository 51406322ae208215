//! Data providers: paged, sorted access to records or collections
//!
//! - `pagination`: `Pagination`
//! - `sort`: `Sort`, `SortAttribute`
//! - `provider`: the `DataProvider` trait and its cached state
//! - `active`: `ActiveDataProvider` over an `ActiveQuery`
//! - `array`: `ArrayDataProvider` over an in-memory collection

pub mod active;
pub mod array;
pub mod pagination;
pub mod provider;
pub mod sort;

pub use active::ActiveDataProvider;
pub use array::ArrayDataProvider;
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE};
pub use provider::{AttributeAccess, DataProvider, KeySelector, ProviderState};
pub use sort::{Sort, SortAttribute};
