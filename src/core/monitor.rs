use crate::core::contract::{decode_log, indexed_string_topic, wei_to_pol, ContractEvent};
use crate::core::donation_service::{DonationService, NewDonation};
use crate::domain::chain::{ChainLog, LogFilter};
use crate::domain::model::{BlockchainEvent, WishStatus};
use crate::domain::ports::{BlockchainRepository, ChainClient, WishRepository};
use crate::utils::error::Result;
use alloy_primitives::{Address, B256};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 50_000;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub contract: Address,
    pub poll_interval: Duration,
    pub max_block_range: u64,
}

/// 追蹤合約事件，同步願望狀態與捐款
pub struct ChainMonitor {
    chain: Arc<dyn ChainClient>,
    wishes: Arc<dyn WishRepository>,
    blockchain: Arc<dyn BlockchainRepository>,
    donations: Arc<DonationService>,
    config: MonitorConfig,
}

impl ChainMonitor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wishes: Arc<dyn WishRepository>,
        blockchain: Arc<dyn BlockchainRepository>,
        donations: Arc<DonationService>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            chain,
            wishes,
            blockchain,
            donations,
            config,
        }
    }

    /// 儲存的最後區塊；沒有紀錄或讀取失敗時從目前區塊開始
    pub async fn resume_point(&self) -> Result<u64> {
        match self.blockchain.get_last_processed_block().await {
            Ok(Some(block)) => return Ok(block),
            Ok(None) => debug!("No processed block stored yet"),
            Err(e) => warn!("Failed to read last processed block: {}", e),
        }
        self.chain.block_number().await
    }

    /// 處理 `last` 之後的新區塊，每處理完一段就更新 `last`
    pub async fn poll(&self, last: &mut u64) -> Result<()> {
        let head = self.chain.block_number().await?;
        if head <= *last {
            return Ok(());
        }

        if *last <= 1 {
            if let Err(e) = self.blockchain.save_last_processed_block(head).await {
                warn!("Failed to save last processed block: {}", e);
            }
            *last = head;
            info!("⏩ Skipping historical blocks, continuing from {}", head);
            return Ok(());
        }

        let range = self.config.max_block_range.max(1);
        let mut from = *last + 1;
        debug!("Processing blocks {}..={}", from, head);

        while from <= head {
            let end = (from + range - 1).min(head);
            let mut logs = self
                .chain
                .get_logs(&LogFilter::new(self.config.contract, from, end))
                .await?;
            logs.sort_by_key(|l| (l.block(), l.log_index.map(|i| i.to::<u64>())));

            for log in &logs {
                if let Err(e) = self.process_log(log).await {
                    error!("❌ Failed to process log {}: {}", log.event_id(), e);
                }
            }

            if let Err(e) = self.blockchain.save_last_processed_block(end).await {
                warn!("Failed to save last processed block: {}", e);
            }
            *last = end;
            from = end + 1;
        }
        Ok(())
    }

    async fn process_log(&self, log: &ChainLog) -> Result<()> {
        if log.removed {
            return Ok(());
        }
        let Some(event) = decode_log(log)? else {
            return Ok(());
        };
        if self.blockchain.has_event(&log.event_id()).await? {
            debug!("Event {} already processed, skipping", log.event_id());
            return Ok(());
        }

        let user_uuid = match &event {
            ContractEvent::DonationReceived { streamer_uuid, .. } => streamer_uuid.clone(),
            _ => self
                .wishes
                .get_wish(event.wish_uuid())
                .await?
                .map(|w| w.streamer_uuid)
                .unwrap_or_default(),
        };

        let record = BlockchainEvent {
            id: log.event_id(),
            block_number: log.block(),
            tx_hash: log
                .transaction_hash
                .map(|h| format!("{:#x}", h))
                .unwrap_or_default(),
            event_type: event.name().to_string(),
            user_uuid,
            wish_uuid: event.wish_uuid().to_string(),
            processed_at: Utc::now(),
        };

        match event {
            // 轉換成功後才記錄；區塊進度仍照常前進，只有重新處理該段區塊時才會再套用
            ContractEvent::WishAdded {
                user_topic,
                wish_uuid,
                ..
            } => {
                self.transition(&wish_uuid, user_topic, WishStatus::Pending, WishStatus::Active)
                    .await?;
                self.record(&record).await
            }
            ContractEvent::WishCompleted {
                user_topic,
                wish_uuid,
                ..
            } => {
                self.transition(&wish_uuid, user_topic, WishStatus::Active, WishStatus::Complete)
                    .await?;
                self.record(&record).await
            }
            ContractEvent::WishDeleted {
                user_topic,
                wish_uuid,
                ..
            } => {
                self.transition(&wish_uuid, user_topic, WishStatus::Active, WishStatus::Deleted)
                    .await?;
                self.record(&record).await
            }
            // 捐款先佔住事件 id，入帳失敗也不會重複累加
            ContractEvent::DonationReceived {
                streamer_uuid,
                wish_uuid,
                donor_username,
                message,
                amount,
            } => {
                if !self.blockchain.save_event(&record).await? {
                    debug!("Event {} already processed, skipping", record.id);
                    return Ok(());
                }
                self.donations
                    .record_donation(NewDonation {
                        streamer_uuid,
                        wish_uuid: Some(wish_uuid),
                        donor_username: Some(donor_username),
                        message: Some(message),
                        amount: wei_to_pol(amount),
                    })
                    .await?;
                Ok(())
            }
        }
    }

    async fn record(&self, record: &BlockchainEvent) -> Result<()> {
        self.blockchain.save_event(record).await?;
        Ok(())
    }

    async fn transition(
        &self,
        wish_uuid: &str,
        user_topic: B256,
        from: WishStatus,
        to: WishStatus,
    ) -> Result<()> {
        let Some(wish) = self.wishes.get_wish(wish_uuid).await? else {
            warn!("Wish {} from contract event not found", wish_uuid);
            return Ok(());
        };
        if indexed_string_topic(&wish.streamer_uuid) != user_topic {
            warn!(
                "Wish {} belongs to {}, but the event names another user",
                wish_uuid, wish.streamer_uuid
            );
            return Ok(());
        }
        if wish.status != from {
            warn!(
                "Wish {} is not {} (current status: {}), skipping",
                wish_uuid, from, wish.status
            );
            return Ok(());
        }
        if self.wishes.transition_status(wish_uuid, from, to).await? {
            info!("✅ Wish {} is now {}", wish_uuid, to);
        } else {
            warn!("Wish {} changed concurrently, status not updated", wish_uuid);
        }
        Ok(())
    }

    /// 定期輪詢，直到 shutdown 送出訊號
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut last = self.resume_point().await?;
        info!(
            "🔭 Monitoring contract {} from block {}",
            self.config.contract, last
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("🛑 Chain monitor stopped at block {}", last);
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll(&mut last).await {
                        error!("❌ Failed to process new blocks: {}", e);
                    }
                }
            }
        }
    }
}
