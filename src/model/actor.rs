// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use super::account::Account;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A human (or bot) recipient/sender, reachable through one or more
/// [`Account`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default = "Uuid::new_v4")]
    pub userid: Uuid,
    pub name: String,
    #[serde(deserialize_with = "one_or_many_accounts")]
    pub account: Vec<Account>,
}

fn one_or_many_accounts<'de, D>(deserializer: D) -> Result<Vec<Account>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Account),
        Many(Vec<Account>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(a) => Ok(vec![a]),
        OneOrMany::Many(v) => Ok(v),
    }
}

impl Actor {
    pub fn new(name: impl Into<String>, account: Account) -> Self {
        Self {
            userid: Uuid::new_v4(),
            name: name.into(),
            account: vec![account],
        }
    }

    /// Every Actor must carry at least one Account; this asserts the
    /// invariant for callers that just deserialized one off the wire.
    pub fn is_valid(&self) -> bool {
        !self.account.is_empty() && !self.name.is_empty()
    }

    pub fn primary_account(&self) -> Option<&Account> {
        self.account.first()
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}: {}>", self.name, self.userid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_uuid_when_absent() {
        let actor: Actor = serde_json::from_value(serde_json::json!({
            "name": "A",
            "account": {"provider": "dummy", "address": "a@x.test"}
        }))
        .unwrap();
        assert!(actor.is_valid());
    }

    #[test]
    fn rejects_missing_account_at_validation_time() {
        let account = Account {
            provider: "dummy".into(),
            enabled: true,
            address: vec![],
            number: vec![],
            userid: String::new(),
            attributes: Default::default(),
        };
        let mut actor = Actor::new("A", account);
        actor.account.clear();
        assert!(!actor.is_valid());
    }
}
