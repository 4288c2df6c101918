// Commission: graduated/flat sale commission, rental commission, agent settings.
// The calculator and tier table are pure; settings.rs owns all persistence.

pub mod calculator;
pub mod handlers;
pub mod settings;
pub mod tiers;
