use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, Username};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: NodeId,
    pub username: Username,
    #[serde(default)]
    pub logged_in: bool,
}
