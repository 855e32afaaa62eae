//! Domain value types shared by the services and handlers.

pub mod lenient;
pub mod order_status;
pub mod tracking;

pub use order_status::OrderStatus;
pub use tracking::TrackingParameters;
