pub mod audit;
pub mod product;
pub mod serial;

pub use audit::{AuditEntry, action};
pub use product::Product;
pub use serial::{MAX_SERIAL_LEN, SerialRecord, SerialStatus, normalize_serial};
