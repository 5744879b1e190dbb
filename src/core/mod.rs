//! The core module holds everything needed to pick an adapter and create a device on it.

pub mod adapter;
pub mod app_info;
pub mod debug;
pub mod device;
pub mod error;
pub mod extension;
pub mod instance;
pub mod queue;
