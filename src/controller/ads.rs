//! A TwinCAT controller reached over ADS through an AMS router.
//!
//! The `ads` client is blocking, so every request runs on the blocking pool and the one TCP
//! connection is shared behind a mutex. Symbols are written by name and observed through ADS
//! device notifications, one per subscribed symbol.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use ::ads::notif::{Attributes, TransmissionMode};
use ::ads::{AmsAddr, Client, Device, Source, Timeouts};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

use super::config::{AmsNetId, ConnectionConfig};
use super::error::ControllerError;
use super::{Connector, Controller, ControllerState, Notification, NotificationStream};

// ADS index groups for symbol access.
const GET_SYMHANDLE_BYNAME: u32 = 0xF003;
const RW_SYMVAL_BYHANDLE: u32 = 0xF005;
const RELEASE_SYMHANDLE: u32 = 0xF006;

/// Buffered notifications between the blocking receiver and the async stream.
const NOTIFICATION_BUFFER: usize = 256;

/// Opens [`AdsController`] connections through the AMS router at `router` (`host:port`).
#[derive(Debug, Clone)]
pub struct AdsConnector {
    router: String,
}

impl AdsConnector {
    pub fn new(router: impl Into<String>) -> Self {
        Self {
            router: router.into(),
        }
    }

    /// The router on the local machine, where TwinCAT and most ADS routers listen.
    pub fn local() -> Self {
        Self::new(format!("127.0.0.1:{}", ::ads::PORT))
    }

    pub fn router(&self) -> &str {
        &self.router
    }
}

impl Connector for AdsConnector {
    type Controller = AdsController;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<AdsController>, ControllerError> {
        let router = self.router.clone();
        let timeout = config.timeout;

        let client = tokio::task::spawn_blocking(move || {
            Client::new(router.as_str(), Timeouts::new(timeout), Source::Auto)
        })
        .await
        .map_err(|_| ControllerError::ConnectionClosed)?
        .map_err(|err| {
            warn!(router = %self.router, error = %err, "ADS router refused the connection");
            ControllerError::Unreachable {
                net_id: config.ams_net_id,
            }
        })?;

        debug!(router = %self.router, ams_net_id = %config.ams_net_id, "ADS client connected");

        Ok(Arc::new(AdsController {
            client: Arc::new(Mutex::new(client)),
            ams_net_id: config.ams_net_id,
            ams_port: config.ams_port,
            timeout,
        }))
    }
}

/// A connection to one ADS device, usually a PLC runtime port.
pub struct AdsController {
    client: Arc<Mutex<Client>>,
    ams_net_id: AmsNetId,
    ams_port: u16,
    timeout: Duration,
}

impl std::fmt::Debug for AdsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsController")
            .field("ams_net_id", &self.ams_net_id)
            .field("ams_port", &self.ams_port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn ams_addr(net_id: AmsNetId, port: u16) -> AmsAddr {
    AmsAddr::new(::ads::AmsNetId::from(net_id.0), port)
}

fn lock(client: &Mutex<Client>) -> MutexGuard<'_, Client> {
    client.lock().expect("ads client lock poisoned")
}

impl AdsController {
    /// Run `request` against the device on the blocking pool.
    async fn request<T, F>(&self, symbol: &str, request: F) -> Result<T, ControllerError>
    where
        T: Send + 'static,
        F: FnOnce(Device<'_>) -> ::ads::Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let addr = ams_addr(self.ams_net_id, self.ams_port);

        tokio::task::spawn_blocking(move || request(lock(&client).device(addr)))
            .await
            .map_err(|_| ControllerError::ConnectionClosed)?
            .map_err(|err| ControllerError::Io {
                symbol: symbol.to_string(),
                reason: err.to_string(),
            })
    }
}

impl Controller for AdsController {
    async fn read_state(&self) -> Result<ControllerState, ControllerError> {
        let (state, _device_state) = self.request("<state>", |device| device.get_state()).await?;
        Ok(ControllerState::from_code(state as u16))
    }

    async fn write_bool(&self, name: &str, value: bool) -> Result<(), ControllerError> {
        let symbol = name.to_string();

        self.request(name, move |device| {
            let handle = symbol_handle(&device, &symbol)?;
            let written = device.write(RW_SYMVAL_BYHANDLE, handle, &[u8::from(value)]);
            release_handle(&device, handle);
            written
        })
        .await
    }

    async fn subscribe(&self, names: &[String]) -> Result<NotificationStream, ControllerError> {
        let wanted = names.to_vec();
        let timeout = self.timeout;

        // Register everything first so a bad symbol fails the subscription up front.
        let (handles, initial) = self
            .request("<subscribe>", move |device| {
                let attributes = Attributes::new(
                    1,
                    TransmissionMode::ServerOnChange,
                    Duration::ZERO,
                    Duration::ZERO,
                );
                let mut handles = Vec::with_capacity(wanted.len());
                let mut initial = Vec::with_capacity(wanted.len());

                for name in wanted {
                    let symbol = symbol_handle(&device, &name)?;
                    let mut value = [0_u8; 1];
                    device.read(RW_SYMVAL_BYHANDLE, symbol, &mut value)?;
                    let notification =
                        device.add_notification(RW_SYMVAL_BYHANDLE, symbol, &attributes)?;

                    initial.push(Notification {
                        name: name.clone(),
                        value: decode_bool(&value),
                        timestamp: SystemTime::now(),
                    });
                    handles.push(Registration {
                        name,
                        symbol,
                        notification,
                    });
                }

                Ok((handles, initial))
            })
            .await?;

        debug!(symbols = handles.len(), "ADS device notifications registered");

        let (sender, receiver) = mpsc::channel(NOTIFICATION_BUFFER.max(initial.len()));
        for notification in initial {
            // The receiver is still in scope.
            let _ = sender.try_send(notification);
        }

        let client = Arc::clone(&self.client);
        let (net_id, port) = (self.ams_net_id, self.ams_port);
        tokio::task::spawn_blocking(move || {
            forward_notifications(client, ams_addr(net_id, port), handles, sender, timeout);
        });

        Ok(Box::pin(ReceiverStream::new(receiver)))
    }
}

/// A symbol observed through a device notification.
#[derive(Debug)]
struct Registration {
    name: String,
    symbol: u32,
    notification: u32,
}

/// Pass notifications on until the stream is dropped or the connection fails, then unregister.
fn forward_notifications(
    client: Arc<Mutex<Client>>,
    addr: AmsAddr,
    registrations: Vec<Registration>,
    sender: mpsc::Sender<Notification>,
    poll: Duration,
) {
    let names: HashMap<u32, &str> = registrations
        .iter()
        .map(|registration| (registration.notification, registration.name.as_str()))
        .collect();
    let channel = lock(&client).get_notification_channel();

    while !sender.is_closed() {
        let batch = match channel.recv_timeout(poll) {
            Ok(batch) => batch,
            Err(err) if err.is_timeout() => continue,
            Err(_) => {
                debug!("ADS notification channel closed");
                break;
            }
        };

        for sample in batch.samples() {
            let Some(name) = names.get(&sample.handle) else {
                continue;
            };
            trace!(symbol = *name, "ADS notification");

            let notification = Notification {
                name: (*name).to_string(),
                value: decode_bool(sample.data),
                timestamp: SystemTime::now(),
            };
            if sender.blocking_send(notification).is_err() {
                break;
            }
        }
    }

    let client = lock(&client);
    let device = client.device(addr);
    for registration in &registrations {
        if let Err(err) = device.delete_notification(registration.notification) {
            debug!(symbol = %registration.name, error = %err, "Failed to delete ADS notification");
        }
        release_handle(&device, registration.symbol);
    }
}

fn symbol_handle(device: &Device<'_>, name: &str) -> ::ads::Result<u32> {
    let mut handle = [0_u8; 4];
    device.write_read(GET_SYMHANDLE_BYNAME, 0, name.as_bytes(), &mut handle)?;
    Ok(u32::from_le_bytes(handle))
}

fn release_handle(device: &Device<'_>, handle: u32) {
    if let Err(err) = device.write(RELEASE_SYMHANDLE, 0, &handle.to_le_bytes()) {
        debug!(handle, error = %err, "Failed to release ADS symbol handle");
    }
}

/// A PLC `BOOL` is one byte, anything but zero is true.
fn decode_bool(data: &[u8]) -> bool {
    data.first().is_some_and(|byte| *byte != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::config::DEFAULT_AMS_NET_ID;

    #[test]
    fn test_decode_bool() {
        assert!(decode_bool(&[1]));
        assert!(decode_bool(&[0xFF]));
        assert!(!decode_bool(&[0]));
        assert!(!decode_bool(&[]));
    }

    #[tokio::test]
    async fn test_refused_router_is_unreachable() {
        // Nothing listens on the TCP port multiplexer port.
        let connector = AdsConnector::new("127.0.0.1:1");
        let config = ConnectionConfig::builder()
            .timeout(Duration::from_millis(200))
            .build();

        match connector.connect(&config).await {
            Err(ControllerError::Unreachable { net_id }) => assert_eq!(net_id, DEFAULT_AMS_NET_ID),
            other => panic!("expected unreachable, got {other:?}"),
        }
    }

    #[test]
    fn test_local_router_address() {
        assert_eq!(AdsConnector::local().router(), "127.0.0.1:48898");
    }
}
