//! Remote data access: HTTP transport and page walking.

pub mod paginator;
pub mod transport;

pub use paginator::{Paginator, PaginatorConfig, StopReason};
pub use transport::{HttpTransport, Transport, TransportConfig};
