// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct GetBlockResponse {
    pub block_height: u64,
    pub block_time: Option<i64>,
    pub blockhash: String,
    pub parent_slot: u64,
    pub previous_blockhash: String,
    pub rewards: Option<Value>,
    pub transactions: Vec<GetTransactionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetTransactionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    pub meta: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    /// The raw transaction and its encoding: `[base64, "base64"]`.
    pub transaction: (String, &'static str),
    /// Version number for versioned messages, the string `"legacy"`
    /// otherwise.
    pub version: Value,
}

/// Recursively rewrite every object key to lowerCamelCase.
///
/// Applied exactly once, to the complete result. Idempotent, so keys that
/// earlier stages already renamed pass through unchanged.
pub fn rewrite_keys_lower_camel(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (to_lower_camel_case(&key), rewrite_keys_lower_camel(value)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(rewrite_keys_lower_camel).collect())
        }
        other => other,
    }
}

// snake_case and PascalCase to lowerCamelCase.
fn to_lower_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upcase_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upcase_next = !out.is_empty();
            continue;
        }
        if out.is_empty() {
            out.extend(ch.to_lowercase());
        } else if upcase_next {
            out.extend(ch.to_uppercase());
            upcase_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_styles_normalize() {
        assert_eq!(to_lower_camel_case("post_balance"), "postBalance");
        assert_eq!(to_lower_camel_case("BlockHeight"), "blockHeight");
        assert_eq!(to_lower_camel_case("blockhash"), "blockhash");
        assert_eq!(to_lower_camel_case("rewardType"), "rewardType");
        assert_eq!(to_lower_camel_case("_leading"), "leading");
    }

    #[test]
    fn rewrite_recurses_through_objects_and_arrays() {
        let rewritten = rewrite_keys_lower_camel(json!({
            "parent_slot": 1,
            "transactions": [{"block_time": null, "meta": {"pre_balances": [1]}}],
        }));
        assert_eq!(
            rewritten,
            json!({
                "parentSlot": 1,
                "transactions": [{"blockTime": null, "meta": {"preBalances": [1]}}],
            })
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_keys_lower_camel(json!({"reward_type": {"post_balance": 2}}));
        let twice = rewrite_keys_lower_camel(once.clone());
        assert_eq!(once, twice);
    }

    fn keys_are_lower_camel(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.iter().all(|(key, value)| {
                key.chars().next().is_some_and(|c| c.is_ascii_lowercase())
                    && key.chars().all(|c| c.is_ascii_alphanumeric())
                    && keys_are_lower_camel(value)
            }),
            Value::Array(items) => items.iter().all(keys_are_lower_camel),
            _ => true,
        }
    }

    #[test]
    fn every_response_key_is_lower_camel() {
        let response = GetBlockResponse {
            block_height: 0,
            block_time: Some(1),
            blockhash: "h".into(),
            parent_slot: 3,
            previous_blockhash: String::new(),
            rewards: Some(json!([{"rewardType": "Fee", "postBalance": 1, "commission": null}])),
            transactions: vec![GetTransactionResponse {
                block_time: None,
                meta: None,
                slot: None,
                transaction: ("AAEC".into(), "base64"),
                version: json!("legacy"),
            }],
        };
        let value = rewrite_keys_lower_camel(serde_json::to_value(response).unwrap());
        assert!(keys_are_lower_camel(&value));
    }
}
