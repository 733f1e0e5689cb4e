use serde::{Deserialize, Serialize};

/// Finish-to-Start, Start-to-Start, Finish-to-Finish, Start-to-Finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    #[serde(rename = "FS")]
    FinishToStart,
    #[serde(rename = "SS")]
    StartToStart,
    #[serde(rename = "FF")]
    FinishToFinish,
    #[serde(rename = "SF")]
    StartToFinish,
}

impl Default for LinkType {
    fn default() -> Self {
        Self::FinishToStart
    }
}

/// A predecessor link stored on the successor task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub predecessor_id: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    /// Signed working days.
    pub lag: i32,
}

impl Dependency {
    pub fn new(predecessor_id: impl Into<String>, link_type: LinkType, lag: i32) -> Self {
        Self { predecessor_id: predecessor_id.into(), link_type, lag }
    }
}
