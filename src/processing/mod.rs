//! Batch transforms over the persisted tables.

pub mod clean;
pub mod resample;

pub const CODE_COLUMN: &str = "StockCode";
pub const DATE_COLUMN: &str = "Date";
pub const CLOSE_COLUMN: &str = "Close";
pub const RETURN_COLUMN: &str = "Return";

pub use self::clean::clean;
pub use self::resample::resample;
