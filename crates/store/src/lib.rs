//! Price series store adapters.
//!
//! Both adapters implement [`common::PriceStore`]; callers hold an
//! `Arc<dyn PriceStore>` and never see which one is behind it.

pub mod memory;
pub mod postgres;

pub use memory::MemoryPriceStore;
pub use postgres::PgPriceStore;
