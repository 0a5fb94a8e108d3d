pub mod error;
pub mod record;

pub use error::{CrudError, Result, TransportError, TransportResponse};
pub use record::{field, layered, merge_into, record_id, row_id};
