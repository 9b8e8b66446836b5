//! Forge API service implementations.

pub mod bim360;
pub mod data_management;
pub mod design_automation;
pub mod model_derivative;

pub use bim360::Bim360Service;
pub use data_management::DataManagementService;
pub use design_automation::{
    build_activity_config, ActivityConfig, ActivityRequest, DesignAutomationId, DesignAutomationService, EngineKind,
};
pub use model_derivative::ModelDerivativeService;

use crate::errors::{ForgeError, ForgeResult};

/// Rejects empty path parameters before any request is made.
pub(crate) fn require(name: &str, value: &str) -> ForgeResult<()> {
    if value.is_empty() {
        return Err(ForgeError::request(format!("{} is required", name)));
    }
    Ok(())
}
