use crate::domain::model::DonationEvent;
use crate::domain::ports::DonationEventBus;
use crate::utils::error::Result;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

/// 行程內的捐款事件廣播
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<DonationEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl DonationEventBus for BroadcastEventBus {
    async fn publish(&self, event: &DonationEvent) -> Result<()> {
        // 沒有訂閱者時 send 會失敗，事件直接丟棄
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!(
                "📣 Donation event {} delivered to {} subscriber(s)",
                event.uuid, receivers
            ),
            Err(_) => debug!("No subscribers for donation event {}", event.uuid),
        }
        Ok(())
    }

    fn subscribe(&self, streamer_uuid: &str) -> BoxStream<'static, DonationEvent> {
        let streamer = streamer_uuid.to_string();
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(move |item| {
                let matched = match item {
                    Ok(event) if event.streamer_uuid == streamer => Some(event),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(
                            "⚠️ Donation stream for {} lagged, skipped {} event(s)",
                            streamer, skipped
                        );
                        None
                    }
                };
                async move { matched }
            })
            .boxed()
    }
}
