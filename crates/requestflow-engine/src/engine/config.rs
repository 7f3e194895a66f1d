use serde::{Deserialize, Serialize};

/// Engine-wide defaults. Deserializable so hosts can keep it in their own
/// config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Approvals needed when an approval node sets none.
    pub default_required_approvals: u32,
    /// Task title when an approval node sets none.
    pub default_task_title: String,
    /// User id recorded on audit entries that have no acting user.
    pub system_user_id: String,
    /// Run [`validate_flow`](crate::validate::validate_flow) before
    /// starting a request and reject flows with errors.
    pub validate_on_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_required_approvals: 1,
            default_task_title: "Approval Required".to_string(),
            system_user_id: "system".to_string(),
            validate_on_start: true,
        }
    }
}
