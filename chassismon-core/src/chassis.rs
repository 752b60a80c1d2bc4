//! Typed chassis commands over a managed session

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ChassisError, ChassisResult};
use crate::parser::{ParseConfig, ParseContext};
use crate::schema::{NicConfig, PowerBudgetInfo, SensorInfo, SysInfo};
use crate::schema::{nic_config, power_budget, sensor_info, sys_info};
use crate::session::{Connector, SessionManager};

/// Chassis data the poller consumes
#[async_trait]
pub trait ChassisSource: Send + Sync {
    /// Fan, temperature, supply and cable tables
    async fn sensor_info(&self) -> ChassisResult<SensorInfo>;

    /// Per-slot power allocation
    async fn power_budget_info(&self) -> ChassisResult<PowerBudgetInfo>;

    /// Management NIC of the blade in `slot`
    async fn nic_config(&self, slot: u32) -> ChassisResult<NicConfig>;
}

/// Runs chassis commands through a [`SessionManager`] and parses the output
pub struct ChassisClient<C: Connector> {
    session: Arc<SessionManager<C>>,
    ctx: ParseContext,
}

impl<C: Connector> ChassisClient<C> {
    /// Creates a client; `ctx` supplies the controller's time zone
    pub const fn new(session: Arc<SessionManager<C>>, ctx: ParseContext) -> Self {
        Self { session, ctx }
    }

    /// The underlying session
    pub fn session(&self) -> &Arc<SessionManager<C>> {
        &self.session
    }

    async fn run<T: Default>(&self, command: &str, config: &ParseConfig<T>) -> ChassisResult<T> {
        let ctx = self.ctx;
        self.session
            .run_command(command, |output| {
                config
                    .parse(output, &ctx)
                    .map_err(|source| ChassisError::Parse {
                        command: command.to_string(),
                        source,
                    })
            })
            .await
    }

    /// `racadm getsysinfo`
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Transport`] or [`ChassisError::Parse`].
    pub async fn get_sys_info(&self) -> ChassisResult<SysInfo> {
        self.run(sys_info::COMMAND, sys_info::config()).await
    }

    /// `racadm getsensorinfo`
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Transport`] or [`ChassisError::Parse`].
    pub async fn get_sensor_info(&self) -> ChassisResult<SensorInfo> {
        self.run(sensor_info::COMMAND, sensor_info::config()).await
    }

    /// `racadm getpbinfo`
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Transport`] or [`ChassisError::Parse`].
    pub async fn get_power_budget_info(&self) -> ChassisResult<PowerBudgetInfo> {
        self.run(power_budget::COMMAND, power_budget::config()).await
    }

    /// `racadm getniccfg -m server-<slot>`
    ///
    /// # Errors
    ///
    /// Returns [`ChassisError::Transport`] or [`ChassisError::Parse`].
    pub async fn get_nic_config(&self, slot: u32) -> ChassisResult<NicConfig> {
        self.run(&nic_config::command(slot), nic_config::config()).await
    }
}

#[async_trait]
impl<C: Connector> ChassisSource for ChassisClient<C> {
    async fn sensor_info(&self) -> ChassisResult<SensorInfo> {
        self.get_sensor_info().await
    }

    async fn power_budget_info(&self) -> ChassisResult<PowerBudgetInfo> {
        self.get_power_budget_info().await
    }

    async fn nic_config(&self, slot: u32) -> ChassisResult<NicConfig> {
        self.get_nic_config(slot).await
    }
}
