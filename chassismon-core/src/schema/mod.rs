//! Command schemas for chassis management output
//!
//! Each submodule pairs one management command with the [`ParseConfig`] that
//! turns its output into a typed record.
//!
//! [`ParseConfig`]: crate::parser::ParseConfig

pub mod nic_config;
pub mod power_budget;
pub mod sdr;
pub mod sensor_info;
pub mod sys_info;

pub use nic_config::NicConfig;
pub use power_budget::{PowerBudgetInfo, ServerPower};
pub use sdr::SensorRecord;
pub use sensor_info::{CableInfo, PowerSupplyInfo, Sensor, SensorInfo};
pub use sys_info::SysInfo;
