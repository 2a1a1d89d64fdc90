//! Order aggregate and related types.

mod aggregate;
mod commands;
mod state;
mod value_objects;

pub use aggregate::{Order, OrderParts};
pub use commands::{OrderRequest, RequestedItem};
pub use state::OrderStatus;
pub use value_objects::{Money, OrderLine, ShippingAddress};
