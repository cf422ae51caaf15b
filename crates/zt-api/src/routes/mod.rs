//! API Routes

pub mod assessment;
pub mod health;
pub mod reports;
