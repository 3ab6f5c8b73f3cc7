//! AMQP implementation of `TaskPublisher`, using `lapin` in publisher-confirm
//! mode against the `checks.tasks` topic exchange.

use std::time::Duration;

use async_trait::async_trait;
use beacon_schemas::{SchedulerError, SchedulerResult};
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::types::{AMQPValue, FieldTable, LongLongInt, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{error, warn};

use crate::{RetryPolicy, TaskEnvelope, TaskPublisher};

pub struct AmqpPublisher {
    channel: Channel,
    exchange: String,
    publish_timeout: Duration,
    retry: RetryPolicy,
}

impl AmqpPublisher {
    pub async fn connect(
        url: &str,
        exchange: &str,
        publish_timeout: Duration,
        retry: RetryPolicy,
    ) -> SchedulerResult<Self> {
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp connect: {e}")))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp channel: {e}")))?;

        // Confirm mode is mandatory: publish() below awaits the ack.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp confirm_select: {e}")))?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp exchange_declare: {e}")))?;

        Ok(Self {
            channel,
            exchange: exchange.to_string(),
            publish_timeout,
            retry,
        })
    }

    fn headers(envelope: &TaskEnvelope) -> FieldTable {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from("task_id"),
            AMQPValue::LongString(envelope.task_id.to_string().into()),
        );
        headers.insert(
            ShortString::from("check_id"),
            AMQPValue::LongString(envelope.check_id.to_string().into()),
        );
        headers.insert(
            ShortString::from("tenant_id"),
            AMQPValue::LongString(envelope.tenant_id.clone().into()),
        );
        headers.insert(
            ShortString::from("priority"),
            AMQPValue::LongInt(envelope.priority),
        );
        headers.insert(
            ShortString::from("scheduled_at"),
            AMQPValue::LongLongInt(
                envelope
                    .scheduled_at
                    .timestamp_nanos_opt()
                    .unwrap_or_default() as LongLongInt,
            ),
        );
        headers
    }

    async fn publish_once(&self, envelope: &TaskEnvelope) -> SchedulerResult<()> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| SchedulerError::internal(format!("serialize task envelope: {e}")))?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_headers(Self::headers(envelope));

        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &envelope.routing_key(),
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp basic_publish: {e}")))?;

        let outcome = tokio::time::timeout(self.publish_timeout, confirm.await)
            .await
            .map_err(|_| SchedulerError::Unavailable("publish confirm timed out".into()))?
            .map_err(|e| SchedulerError::Unavailable(format!("amqp confirm wait: {e}")))?;

        if outcome.is_ack() {
            Ok(())
        } else {
            Err(SchedulerError::Unavailable("broker returned nack".into()))
        }
    }
}

#[async_trait]
impl TaskPublisher for AmqpPublisher {
    async fn publish(&self, envelope: &TaskEnvelope) -> SchedulerResult<()> {
        let mut last_err = None;
        for attempt in 1..=self.retry.attempts {
            match self.publish_once(envelope).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        task_id = %envelope.task_id,
                        attempt,
                        error = %e,
                        "publish attempt failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt < self.retry.attempts {
                        tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }
        error!(task_id = %envelope.task_id, "publish exhausted all retry attempts");
        Err(last_err.unwrap_or_else(|| SchedulerError::Unavailable("publish failed".into())))
    }
}
