//! RabbitMQ transport: lapin driven synchronously from a private current-thread tokio runtime.

use std::time::Duration;

use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::uri::AMQPUri;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use log::debug;
use tokio::runtime::Runtime;

use super::transport::{Confirm, Transport, TransportError};
use crate::BrokerSettings;

/// Persistent delivery mode (survives broker restart once the queue is durable).
const DELIVERY_MODE_PERSISTENT: u8 = 2;
const CONTENT_TYPE_JSON: &str = "application/json";
const CLOSE_REPLY_OK: u16 = 200;

pub struct AmqpTransport {
    uri: AMQPUri,
    connect_timeout: Duration,
    runtime: Runtime,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl AmqpTransport {
    pub fn new(settings: &BrokerSettings) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::Other(format!("build tokio runtime: {e}")))?;
        Ok(Self {
            uri: amqp_uri(settings),
            connect_timeout: settings.connect_timeout,
            runtime,
            connection: None,
            channel: None,
        })
    }
}

/// Build the URI field by field so credentials never need percent-encoding.
fn amqp_uri(settings: &BrokerSettings) -> AMQPUri {
    let mut uri = AMQPUri::default();
    uri.authority.host = settings.host.clone();
    uri.authority.port = settings.port;
    uri.authority.userinfo.username = settings.username.clone();
    uri.authority.userinfo.password = settings.password.clone();
    uri.vhost = settings.vhost.clone();
    uri.query.heartbeat = Some(settings.heartbeat_secs);
    uri.query.connection_timeout = Some(settings.connect_timeout.as_millis() as u64);
    uri
}

async fn open_confirm_channel(
    uri: AMQPUri,
    queue: &str,
) -> Result<(Connection, Channel), lapin::Error> {
    let connection = Connection::connect_uri(uri, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await?;
    Ok((connection, channel))
}

async fn publish_and_wait(
    channel: &Channel,
    queue: &str,
    payload: &[u8],
) -> Result<Confirmation, lapin::Error> {
    let properties = BasicProperties::default()
        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
        .with_content_type(CONTENT_TYPE_JSON.into());
    channel
        .basic_publish(
            "",
            queue,
            BasicPublishOptions {
                mandatory: true,
                ..Default::default()
            },
            payload,
            properties,
        )
        .await?
        .await
}

impl Transport for AmqpTransport {
    fn open(&mut self, queue: &str) -> Result<(), TransportError> {
        self.close();
        let opened = self.runtime.block_on(tokio::time::timeout(
            self.connect_timeout,
            open_confirm_channel(self.uri.clone(), queue),
        ));
        let (connection, channel) =
            opened.map_err(|_| TransportError::ConnectTimeout(self.connect_timeout))??;
        self.connection = Some(connection);
        self.channel = Some(channel);
        Ok(())
    }

    fn publish(
        &mut self,
        queue: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Confirm, TransportError> {
        let channel = self.channel.as_ref().ok_or(TransportError::NotOpen)?;
        let confirmed = self.runtime.block_on(tokio::time::timeout(
            timeout,
            publish_and_wait(channel, queue, payload),
        ));
        let confirmation = confirmed.map_err(|_| TransportError::ConfirmTimeout(timeout))??;
        Ok(match confirmation {
            Confirmation::Ack(None) => Confirm::Ack,
            Confirmation::Ack(Some(_)) => Confirm::Returned,
            Confirmation::Nack(_) => Confirm::Nack,
            // Confirm mode is always selected on open; a missing confirm is not an ack.
            Confirmation::NotRequested => Confirm::Nack,
        })
    }

    fn is_alive(&mut self) -> bool {
        match (&self.connection, &self.channel) {
            (Some(conn), Some(channel)) => conn.status().connected() && channel.status().connected(),
            _ => false,
        }
    }

    fn close(&mut self) {
        self.channel = None;
        let Some(connection) = self.connection.take() else {
            return;
        };
        if !connection.status().connected() {
            return;
        }
        let closed = self.runtime.block_on(tokio::time::timeout(
            self.connect_timeout,
            connection.close(CLOSE_REPLY_OK, "scan finished"),
        ));
        match closed {
            Ok(Ok(())) => debug!("AMQP connection closed"),
            Ok(Err(e)) => debug!("AMQP close returned error: {}", e),
            Err(_) => debug!("AMQP close timed out; dropping connection"),
        }
    }
}
