pub mod models;
pub mod providers;

pub use verge_catalog as catalog;
