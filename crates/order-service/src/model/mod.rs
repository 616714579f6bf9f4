//! Order domain model.
//!
//! An [`Order`] owns exactly one [`Delivery`] and one [`Payment`] and an ordered list of
//! [`Item`]s. Sub-objects have no identity of their own; an order is always replaced
//! wholesale, never patched.

pub mod order;

pub use order::{Delivery, Item, Order, Payment};
