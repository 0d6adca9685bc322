//! Task state change events, as delivered by the container scheduler.

use serde::{Deserialize, Serialize};

/// Status value of a task that is up.
pub const RUNNING: &str = "RUNNING";

const ENI_ATTACHMENT: &str = "eni";
const NETWORK_INTERFACE_ID: &str = "networkInterfaceId";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateChange {
    pub cluster_arn: String,
    pub task_arn: String,
    pub last_status: String,
    pub desired_status: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub details: Vec<AttachmentDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDetail {
    pub name: String,
    pub value: String,
}

impl TaskStateChange {
    /// Both the observed and the desired status are RUNNING.
    pub fn is_running(&self) -> bool {
        self.last_status == RUNNING && self.desired_status == RUNNING
    }

    /// The network interface id of the task's `eni` attachment.
    pub fn network_interface_id(&self) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| a.kind == ENI_ATTACHMENT)?
            .details
            .iter()
            .find(|d| d.name == NETWORK_INTERFACE_ID)
            .map(|d| d.value.as_str())
    }
}
