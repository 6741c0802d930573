use crate::domain::chain::{ChainLog, LogFilter, TransactionReceipt, TransactionRequest};
use crate::domain::model::{
    BlockchainEvent, DonationEvent, History, StaticFile, User, Wish, WishStatus,
};
use crate::utils::error::Result;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use futures_util::stream::BoxStream;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 重複的 telegram_id 或錢包地址回傳 `AlreadyExists`
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<User>>;
    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>>;
    async fn update_user(&self, user: &User) -> Result<()>;
}

#[async_trait]
pub trait WishRepository: Send + Sync {
    async fn create_wish(&self, wish: &Wish) -> Result<()>;
    async fn get_wish(&self, uuid: &str) -> Result<Option<Wish>>;
    async fn get_wishes_by_status(&self, streamer_uuid: &str, status: WishStatus)
        -> Result<Vec<Wish>>;
    async fn update_wish(&self, wish: &Wish) -> Result<()>;
    /// 只有目前狀態為 `from` 時才更新，回傳是否有更新
    async fn transition_status(&self, uuid: &str, from: WishStatus, to: WishStatus)
        -> Result<bool>;
    /// 只累加 active 的願望，回傳是否有更新
    async fn add_pol_amount(&self, uuid: &str, amount: f64) -> Result<bool>;
}

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn add_history(&self, history: &History) -> Result<()>;
    /// `page` 從 1 開始，依時間新到舊
    async fn get_history(&self, streamer_uuid: &str, page: u32, page_size: u32)
        -> Result<Vec<History>>;
}

#[async_trait]
pub trait StaticFileRepository: Send + Sync {
    async fn save_file(&self, file: &StaticFile) -> Result<()>;
    async fn get_file(&self, id: &str) -> Result<Option<StaticFile>>;
}

#[async_trait]
pub trait BlockchainRepository: Send + Sync {
    async fn get_last_processed_block(&self) -> Result<Option<u64>>;
    async fn save_last_processed_block(&self, block: u64) -> Result<()>;
    /// 回傳 `true` 表示第一次記錄；已存在則不覆寫
    async fn save_event(&self, event: &BlockchainEvent) -> Result<bool>;
    async fn has_event(&self, id: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
pub trait DonationEventBus: Send + Sync {
    async fn publish(&self, event: &DonationEvent) -> Result<()>;
    /// 只收到指定直播主的事件
    fn subscribe(&self, streamer_uuid: &str) -> BoxStream<'static, DonationEvent>;
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;
    async fn block_number(&self) -> Result<u64>;
    async fn get_code(&self, address: Address) -> Result<Bytes>;
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<ChainLog>>;
    async fn accounts(&self) -> Result<Vec<Address>>;
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256>;
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>>;
}
