use std::collections::BTreeSet;

use msgsync_common::protocol::jsonrpc::{is_supported_protocol_version, SUPPORTED_PROTOCOL_VERSIONS};
use msgsync_common::protocol::rpc_methods::{PUSH_METHODS, REQUEST_METHODS};

fn load_contract() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/rpc-methods.json");
    let content = std::fs::read_to_string(path).expect("contract file should be readable");
    serde_json::from_str(&content).expect("contract file should be valid JSON")
}

fn contract_set<'a>(contract: &'a serde_json::Value, key: &str) -> BTreeSet<&'a str> {
    contract[key]
        .as_array()
        .unwrap_or_else(|| panic!("{key} should be an array"))
        .iter()
        .map(|v| v.as_str().expect("method should be a string"))
        .collect()
}

#[test]
fn request_methods_match_contract() {
    let contract = load_contract();
    let expected = contract_set(&contract, "request_methods");
    let actual: BTreeSet<&str> = REQUEST_METHODS.iter().copied().collect();
    assert_eq!(actual.len(), REQUEST_METHODS.len(), "REQUEST_METHODS has duplicates");
    assert_eq!(actual, expected, "REQUEST_METHODS diverged from contract");
}

#[test]
fn push_methods_match_contract() {
    let contract = load_contract();
    let expected = contract_set(&contract, "push_methods");
    let actual: BTreeSet<&str> = PUSH_METHODS.iter().copied().collect();
    assert_eq!(actual, expected, "PUSH_METHODS diverged from contract");
}

#[test]
fn rpc_protocol_versions_match_contract() {
    let contract = load_contract();
    let expected: Vec<&str> = contract["rpc_protocol_versions"]
        .as_array()
        .expect("rpc_protocol_versions should be an array")
        .iter()
        .map(|v| v.as_str().expect("version should be a string"))
        .collect();

    assert_eq!(SUPPORTED_PROTOCOL_VERSIONS, &expected[..], "SUPPORTED_PROTOCOL_VERSIONS diverged from contract");
    assert!(expected.iter().all(|version| is_supported_protocol_version(version)));
    assert!(!is_supported_protocol_version("msgsync-rpc.v0"));
}

#[test]
fn no_overlap_between_requests_and_pushes() {
    let requests: BTreeSet<&str> = REQUEST_METHODS.iter().copied().collect();
    let pushes: BTreeSet<&str> = PUSH_METHODS.iter().copied().collect();
    let overlap: Vec<&&str> = requests.intersection(&pushes).collect();
    assert!(overlap.is_empty(), "methods appear as both request and push: {overlap:?}");
}
