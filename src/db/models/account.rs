use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Locally cached credentials for one remote account.
///
/// `id` is the account slug, so re-adding an account lands on the same row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    pub id: String,
    pub token: String,
    pub slug: String,
    pub user_id: String,
    pub name: String,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub token: String,
    pub slug: String,
    pub user_id: String,
    pub name: String,
}

impl NewAccount {
    pub fn account_id(&self) -> String {
        account_id_for_slug(&self.slug)
    }
}

/// Slugs arrive as `/123456` from the identity endpoint; the id drops the slashes.
pub fn account_id_for_slug(slug: &str) -> String {
    slug.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_for_slug_variants() {
        assert_eq!(account_id_for_slug("/897362094"), "897362094");
        assert_eq!(account_id_for_slug("897362094"), "897362094");
    }
}
