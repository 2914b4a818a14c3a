//! Concrete [`IoProvider`](crate::cog::provider::IoProvider) implementations

#[cfg(feature = "rpi")]
pub mod rpi;
