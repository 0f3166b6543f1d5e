//! Domain entities and their row-level SQL.
//!
//! `Order` is the aggregate that crosses the wire and the cache boundary;
//! `delivery`, `payment` and `items` rows are joined to it by `order_uid`.
//! Everything is owned by value — deep copies cross the cache/DB boundary.

pub mod delivery;
pub mod item;
pub mod order;
pub mod payment;

pub use delivery::Delivery;
pub use item::Item;
pub use order::{Order, OrderRow};
pub use payment::Payment;
