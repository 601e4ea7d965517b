//! Data models for WattGuard

mod alert;
mod reading;

pub use alert::*;
pub use reading::*;
