//! AMQP-backed `ResultSource`: consumes `scheduler.results`, bound to the
//! `checks.results` topic exchange, with a bounded prefetch.

use async_trait::async_trait;
use beacon_schemas::{SchedulerError, SchedulerResult, TaskResult};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::warn;

use crate::source::{ResultDelivery, ResultSource};

pub const RESULTS_EXCHANGE: &str = "checks.results";
pub const RESULTS_QUEUE: &str = "scheduler.results";

pub struct AmqpResultSource {
    channel: Channel,
    consumer: Consumer,
}

impl AmqpResultSource {
    pub async fn connect(url: &str, prefetch: u16) -> SchedulerResult<Self> {
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp connect: {e}")))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp channel: {e}")))?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp basic_qos: {e}")))?;

        channel
            .exchange_declare(
                RESULTS_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp exchange_declare: {e}")))?;

        channel
            .queue_declare(
                RESULTS_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp queue_declare: {e}")))?;

        channel
            .queue_bind(
                RESULTS_QUEUE,
                RESULTS_EXCHANGE,
                "check.result.#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp queue_bind: {e}")))?;

        let consumer = channel
            .basic_consume(
                RESULTS_QUEUE,
                "beacon-reconciler",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp basic_consume: {e}")))?;

        Ok(Self { channel, consumer })
    }
}

struct AmqpDelivery {
    channel: Channel,
    delivery_tag: lapin::acker::Acker,
    result: TaskResult,
}

#[async_trait]
impl ResultDelivery for AmqpDelivery {
    fn result(&self) -> &TaskResult {
        &self.result
    }

    async fn ack(self: Box<Self>) -> SchedulerResult<()> {
        self.delivery_tag
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp ack: {e}")))
    }

    async fn nack(self: Box<Self>) -> SchedulerResult<()> {
        self.delivery_tag
            .nack(BasicNackOptions {
                requeue: true,
                ..BasicNackOptions::default()
            })
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("amqp nack: {e}")))
    }
}

#[async_trait]
impl ResultSource for AmqpResultSource {
    async fn next(&mut self) -> SchedulerResult<Box<dyn ResultDelivery>> {
        loop {
            let delivery = self
                .consumer
                .next()
                .await
                .ok_or_else(|| SchedulerError::Unavailable("amqp consumer stream ended".into()))?
                .map_err(|e| SchedulerError::Unavailable(format!("amqp delivery error: {e}")))?;

            match serde_json::from_slice::<TaskResult>(&delivery.data) {
                Ok(result) => {
                    return Ok(Box::new(AmqpDelivery {
                        channel: self.channel.clone(),
                        delivery_tag: delivery.acker,
                        result,
                    }))
                }
                Err(e) => {
                    // Poison message: ack + log + drop, never propagated
                    // as an error that would otherwise tear down the whole
                    // reconcile loop over one malformed delivery.
                    warn!(error = %e, "dropping malformed task result payload");
                    if let Err(ack_err) = delivery.acker.ack(BasicAckOptions::default()).await {
                        warn!(error = %ack_err, "failed to ack poison message");
                    }
                    continue;
                }
            }
        }
    }
}
