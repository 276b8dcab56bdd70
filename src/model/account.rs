// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One channel an [`Actor`](super::actor::Actor) is reachable on.
///
/// `address` and `number` accept either a single string or a list in the
/// wire format; both are normalized to a `Vec` once parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "one_or_many")]
    pub address: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub number: Vec<String>,
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

fn default_provider() -> String {
    "dummy".to_string()
}

fn default_enabled() -> bool {
    true
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        None,
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => Ok(vec![s]),
        Some(OneOrMany::Many(v)) => Ok(v),
        Some(OneOrMany::None) | None => Ok(Vec::new()),
    }
}

impl Account {
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = vec![address.into()];
    }

    pub fn primary_address(&self) -> Option<&str> {
        self.address.first().map(String::as_str)
    }

    pub fn primary_number(&self) -> Option<&str> {
        self.number.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_string_address() {
        let account: Account = serde_json::from_value(serde_json::json!({
            "provider": "email",
            "address": "a@x.test"
        }))
        .unwrap();
        assert_eq!(account.address, vec!["a@x.test".to_string()]);
    }

    #[test]
    fn accepts_address_list() {
        let account: Account = serde_json::from_value(serde_json::json!({
            "provider": "email",
            "address": ["a@x.test", "b@x.test"]
        }))
        .unwrap();
        assert_eq!(account.address.len(), 2);
    }

    #[test]
    fn defaults_are_lenient() {
        let account: Account = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(account.provider, "dummy");
        assert!(account.enabled);
        assert!(account.address.is_empty());
    }
}
