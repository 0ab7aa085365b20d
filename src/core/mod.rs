//! Domain logic: coercion, risk bands, weekly statistics and the external
//! prediction and recommendation services.

pub mod ai;
pub mod data;
pub mod prediction;
pub mod risk;
pub mod stats;
