use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::value_objects::events::DomainEvent;

#[async_trait]
#[automock]
pub trait DomainEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}
