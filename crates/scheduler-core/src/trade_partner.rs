use serde::{Deserialize, Serialize};

/// A trade partner (subcontractor) that can be assigned to tasks for
/// display purposes. Assignment is display-only and never affects CPM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePartner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl TradePartner {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            contact: None,
            phone: None,
            email: None,
            color: None,
            notes: String::new(),
        }
    }
}
