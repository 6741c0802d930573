use crate::domain::chain::ChainLog;
use crate::utils::error::{DonlyError, Result};
use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::{sol, SolEvent};

sol! {
    event WishAdded(string indexed userUUID, string wishUUID, uint256 price);
    event WishCompleted(string indexed userUUID, string wishUUID, uint256 price);
    event WishDeleted(string indexed userUUID, string wishUUID, uint256 accumulatedAmount);
    event DonationReceived(string streamerUUID, string wishUUID, string donorUsername, string message, uint256 amount);
}

/// 已解碼的合約事件；indexed string 只留下 keccak256 雜湊
#[derive(Debug, Clone, PartialEq)]
pub enum ContractEvent {
    WishAdded {
        user_topic: B256,
        wish_uuid: String,
        price: U256,
    },
    WishCompleted {
        user_topic: B256,
        wish_uuid: String,
        price: U256,
    },
    WishDeleted {
        user_topic: B256,
        wish_uuid: String,
        accumulated_amount: U256,
    },
    DonationReceived {
        streamer_uuid: String,
        wish_uuid: String,
        donor_username: String,
        message: String,
        amount: U256,
    },
}

impl ContractEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WishAdded { .. } => "WishAdded",
            Self::WishCompleted { .. } => "WishCompleted",
            Self::WishDeleted { .. } => "WishDeleted",
            Self::DonationReceived { .. } => "DonationReceived",
        }
    }

    pub fn wish_uuid(&self) -> &str {
        match self {
            Self::WishAdded { wish_uuid, .. }
            | Self::WishCompleted { wish_uuid, .. }
            | Self::WishDeleted { wish_uuid, .. }
            | Self::DonationReceived { wish_uuid, .. } => wish_uuid,
        }
    }
}

/// 不認得的 topic 回傳 `Ok(None)`
pub fn decode_log(log: &ChainLog) -> Result<Option<ContractEvent>> {
    let Some(signature) = log.topics.first() else {
        return Ok(None);
    };
    let topics = log.topics.iter().copied();
    let data = log.data.as_ref();

    let event = if *signature == WishAdded::SIGNATURE_HASH {
        let e = WishAdded::decode_raw_log(topics, data).map_err(decode_error("WishAdded"))?;
        ContractEvent::WishAdded {
            user_topic: e.userUUID,
            wish_uuid: e.wishUUID,
            price: e.price,
        }
    } else if *signature == WishCompleted::SIGNATURE_HASH {
        let e =
            WishCompleted::decode_raw_log(topics, data).map_err(decode_error("WishCompleted"))?;
        ContractEvent::WishCompleted {
            user_topic: e.userUUID,
            wish_uuid: e.wishUUID,
            price: e.price,
        }
    } else if *signature == WishDeleted::SIGNATURE_HASH {
        let e = WishDeleted::decode_raw_log(topics, data).map_err(decode_error("WishDeleted"))?;
        ContractEvent::WishDeleted {
            user_topic: e.userUUID,
            wish_uuid: e.wishUUID,
            accumulated_amount: e.accumulatedAmount,
        }
    } else if *signature == DonationReceived::SIGNATURE_HASH {
        let e = DonationReceived::decode_raw_log(topics, data)
            .map_err(decode_error("DonationReceived"))?;
        ContractEvent::DonationReceived {
            streamer_uuid: e.streamerUUID,
            wish_uuid: e.wishUUID,
            donor_username: e.donorUsername,
            message: e.message,
            amount: e.amount,
        }
    } else {
        return Ok(None);
    };
    Ok(Some(event))
}

fn decode_error(event: &'static str) -> impl Fn(alloy_sol_types::Error) -> DonlyError {
    move |e| DonlyError::contract(format!("failed to decode {}: {}", event, e))
}

/// indexed string 在 topic 中的值
pub fn indexed_string_topic(value: &str) -> B256 {
    keccak256(value.as_bytes())
}

/// wei 轉 POL（18 位小數）
pub fn wei_to_pol(wei: U256) -> f64 {
    wei.to_string().parse::<f64>().unwrap_or(0.0) / 1e18
}
