//! Business logic services.
//!
//! Services own the rules; repositories own the SQL; routes own HTTP.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod uploads;
