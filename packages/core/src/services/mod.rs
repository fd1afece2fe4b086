//! HTTP clients for the external APIs.

pub mod bluesky;
pub mod food_alerts;

#[cfg(test)]
pub mod mock;
