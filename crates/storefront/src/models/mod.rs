//! Domain models for the storefront.

pub mod cart;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{AnonymousCart, AnonymousCartEntry, CartIdentity, CartLine, CartRow};
pub use product::{NewProduct, Product};
pub use session::{CurrentUser, session_keys};
pub use user::User;
