use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};

/// `eth_estimateGas` / `eth_sendTransaction` 的交易參數
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// 1 成功，0 revert；舊節點可能不回傳
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s != U64::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: U64,
    pub to_block: U64,
    pub address: Address,
}

impl LogFilter {
    pub fn new(address: Address, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block: U64::from(from_block),
            to_block: U64::from(to_block),
            address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub log_index: Option<U64>,
    #[serde(default)]
    pub removed: bool,
}

impl ChainLog {
    pub fn block(&self) -> u64 {
        self.block_number.map_or(0, |n| n.to::<u64>())
    }

    /// 事件唯一識別：`<tx_hash>:<log_index>`
    pub fn event_id(&self) -> String {
        let tx = self.transaction_hash.unwrap_or_default();
        let index = self.log_index.map_or(0, |n| n.to::<u64>());
        format!("{:#x}:{}", tx, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_filter_serializes_hex_quantities() {
        let filter = LogFilter::new(Address::ZERO, 16, 255);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["fromBlock"], "0x10");
        assert_eq!(value["toBlock"], "0xff");
    }

    #[test]
    fn test_receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "blockNumber": "0x5",
            "contractAddress": null,
            "status": "0x0"
        }))
        .unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.block_number, Some(U64::from(5)));
    }

    #[test]
    fn test_event_id() {
        let log: ChainLog = serde_json::from_value(json!({
            "address": "0x0000000000000000000000000000000000000001",
            "topics": [],
            "data": "0x",
            "blockNumber": "0x2",
            "transactionHash": format!("0x{}", "ab".repeat(32)),
            "logIndex": "0x3"
        }))
        .unwrap();
        assert_eq!(log.event_id(), format!("0x{}:3", "ab".repeat(32)));
        assert_eq!(log.block(), 2);
    }
}
