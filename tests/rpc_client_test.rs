use donly::adapters::JsonRpcClient;
use donly::domain::chain::LogFilter;
use donly::domain::ports::ChainClient;
use donly::DonlyError;
use alloy_primitives::{Address, B256};
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_block_number_parses_hex_quantity() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .json_body_partial(r#"{"jsonrpc":"2.0","method":"eth_blockNumber"}"#);
            then.status(200)
                .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x1b4" }));
        })
        .await;

    let client = JsonRpcClient::new(server.url("/")).unwrap();
    assert_eq!(client.block_number().await.unwrap(), 436);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_object_becomes_rpc_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "insufficient funds" }
            }));
        })
        .await;

    let client = JsonRpcClient::new(server.url("/")).unwrap();
    match client.accounts().await {
        Err(DonlyError::RpcError { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "insufficient funds");
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_receipt_is_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .json_body_partial(r#"{"method":"eth_getTransactionReceipt"}"#);
            then.status(200)
                .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
        })
        .await;

    let client = JsonRpcClient::new(server.url("/")).unwrap();
    let receipt = client
        .transaction_receipt(B256::repeat_byte(0xab))
        .await
        .unwrap();
    assert!(receipt.is_none());
}

#[tokio::test]
async fn test_http_failure_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500).body("node crashed");
        })
        .await;

    let client = JsonRpcClient::new(server.url("/")).unwrap();
    let err = client.chain_id().await.unwrap_err();
    assert!(matches!(err, DonlyError::RpcError { code: 500, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_get_logs_sends_hex_range() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .json_body_partial(r#"{"method":"eth_getLogs"}"#)
                .body_contains(r#""fromBlock":"0xa""#)
                .body_contains(r#""toBlock":"0x14""#);
            then.status(200)
                .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": [] }));
        })
        .await;

    let client = JsonRpcClient::new(server.url("/")).unwrap();
    let logs = client
        .get_logs(&LogFilter::new(Address::repeat_byte(0x11), 10, 20))
        .await
        .unwrap();
    assert!(logs.is_empty());
    mock.assert_async().await;
}
