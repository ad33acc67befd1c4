//! Response shapes of the task-board API.
//!
//! Required fields are required: a response missing one fails to decode and
//! surfaces as a parse error rather than a half-filled record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityAccount {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub user: RemoteUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub accounts: Vec<IdentityAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    pub board: Board,
    #[serde(default)]
    pub column: Option<Column>,
    #[serde(default)]
    pub assignees: Vec<RemoteUser>,
}

impl Card {
    /// Context for a focus on this card, with the titles frozen as of now.
    pub fn focus_context(&self, previous_elapsed: u64) -> crate::timer::FocusContext {
        crate::timer::FocusContext {
            card_id: self.id.clone(),
            card_title: self.title.clone(),
            card_number: self.number,
            board_id: self.board.id.clone(),
            board_name: self.board.name.clone(),
            notes: None,
            previous_elapsed,
        }
    }
}
