use crate::domain::model::{DonationEvent, History, HistoryKind};
use crate::domain::ports::{DonationEventBus, HistoryRepository, WishRepository};
use crate::utils::error::Result;
use chrono::Utc;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct NewDonation {
    pub streamer_uuid: String,
    pub wish_uuid: Option<String>,
    pub donor_username: Option<String>,
    pub message: Option<String>,
    pub amount: f64,
}

pub struct DonationService {
    wishes: Arc<dyn WishRepository>,
    history: Arc<dyn HistoryRepository>,
    bus: Arc<dyn DonationEventBus>,
}

impl DonationService {
    pub fn new(
        wishes: Arc<dyn WishRepository>,
        history: Arc<dyn HistoryRepository>,
        bus: Arc<dyn DonationEventBus>,
    ) -> Self {
        Self {
            wishes,
            history,
            bus,
        }
    }

    pub fn subscribe(&self, streamer_uuid: &str) -> BoxStream<'static, DonationEvent> {
        self.bus.subscribe(streamer_uuid)
    }

    /// 累加願望金額、寫入 donate 紀錄並推送即時事件
    pub async fn record_donation(&self, donation: NewDonation) -> Result<DonationEvent> {
        let wish_uuid = donation.wish_uuid.filter(|w| !w.is_empty());
        if let Some(wish) = &wish_uuid {
            if !self.wishes.add_pol_amount(wish, donation.amount).await? {
                warn!("Wish {} is not active, donation not credited to it", wish);
            }
        }

        let now = Utc::now();
        let donor_username = donation.donor_username.filter(|u| !u.is_empty());
        let message = donation.message.filter(|m| !m.is_empty());

        self.history
            .add_history(&History {
                id: Uuid::new_v4().to_string(),
                streamer_uuid: donation.streamer_uuid.clone(),
                kind: HistoryKind::Donate,
                username: donor_username.clone(),
                datetime: now,
                amount: donation.amount,
                wish_uuid: wish_uuid.clone(),
                message: message.clone(),
            })
            .await?;

        let event = DonationEvent {
            uuid: Uuid::new_v4().to_string(),
            streamer_uuid: donation.streamer_uuid,
            donor_username,
            amount: donation.amount,
            wish_uuid,
            message,
            datetime: now,
        };
        self.bus.publish(&event).await?;

        info!(
            "💸 Donation of {} POL to {} recorded",
            event.amount, event.streamer_uuid
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BroadcastEventBus, SqliteStore};
    use crate::domain::model::{Wish, WishStatus};
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_donation_credits_wish_and_notifies() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let bus = Arc::new(BroadcastEventBus::default());
        let service = DonationService::new(store.clone(), store.clone(), bus.clone());

        let now = Utc::now();
        store
            .create_wish(&Wish {
                uuid: "w1".into(),
                streamer_uuid: "s1".into(),
                wish_url: None,
                name: "mic".into(),
                description: None,
                image: "i".into(),
                pol_target: 10.0,
                pol_amount: 1.0,
                is_priority: false,
                status: WishStatus::Active,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let mut stream = service.subscribe("s1");
        service
            .record_donation(NewDonation {
                streamer_uuid: "s1".into(),
                wish_uuid: Some("w1".into()),
                donor_username: Some("fan".into()),
                message: Some(String::new()),
                amount: 2.0,
            })
            .await
            .unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.donor_username.as_deref(), Some("fan"));
        assert!(event.message.is_none());

        let wish = store.get_wish("w1").await.unwrap().unwrap();
        assert!((wish.pol_amount - 3.0).abs() < f64::EPSILON);

        let history = store.get_history("s1", 1, 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, HistoryKind::Donate);
    }

    #[tokio::test]
    async fn test_donation_without_wish_still_recorded() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let bus = Arc::new(BroadcastEventBus::default());
        let service = DonationService::new(store.clone(), store.clone(), bus);

        let event = service
            .record_donation(NewDonation {
                streamer_uuid: "s1".into(),
                amount: 0.5,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(event.wish_uuid.is_none());
        assert_eq!(store.get_history("s1", 1, 20).await.unwrap().len(), 1);
    }
}
