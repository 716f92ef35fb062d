//! High-level sensor interface

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::sync::MutexGuard;
use tracing::{debug, info};

use zfmrust_core::Command;
use zfmrust_transport::SerialTransport;
use zfmrust_types::params::{baud_to_int, packet_size_to_int};
use zfmrust_types::{
    BaudRate, BufferId, ImageBuffer, PacketSize, ParameterId, Response, SecurityLevel, StatusCode,
    SystemParameters, Value, NOTEPAD_PAGE_COUNT, NOTEPAD_PAGE_SIZE,
};

use crate::config::SensorConfig;
use crate::connection::{self, LinkState, ReadyFuture, Shared, TransportFactory};
use crate::dispatcher::{Ack, Dispatcher};
use crate::error::{Error, Result};

/// Pages of the template index table (256 slots each)
const INDEX_TABLE_PAGES: u8 = 4;

/// Fingerprint sensor session
///
/// Owns the serial link through a background supervisor that authenticates
/// on (re)connect and re-establishes the session automatically. Clones
/// share the same session.
///
/// # Examples
///
/// ```no_run
/// use zfmrust::{Sensor, SensorConfig};
///
/// #[tokio::main]
/// async fn main() -> zfmrust::Result<()> {
///     let sensor = Sensor::new(SensorConfig::new("/dev/ttyUSB0"));
///     sensor.wait_ready().await?;
///
///     let response = sensor.image_capture().await?;
///     println!("capture: {}", response.code());
///
///     sensor.stop().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Sensor {
    shared: Arc<Shared>,
    handle: Arc<parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl Sensor {
    /// Start a session on the configured serial port
    ///
    /// Spawns the connection supervisor; must be called within a Tokio
    /// runtime. The session keeps reconnecting until [`Sensor::stop`].
    pub fn new(config: SensorConfig) -> Self {
        let shared = Arc::new(Shared::new(config));
        let factory_shared = shared.clone();
        let factory: TransportFactory = Box::new(move || {
            Box::new(SerialTransport::new(
                factory_shared.config.port.clone(),
                factory_shared.baud_rate.load(Ordering::Acquire),
            ))
        });
        Self::spawn_with(shared, factory)
    }

    /// Start a session over transports produced by `factory`
    ///
    /// The supervisor calls the factory once per connection attempt.
    pub fn with_transport(config: SensorConfig, factory: TransportFactory) -> Self {
        Self::spawn_with(Arc::new(Shared::new(config)), factory)
    }

    fn spawn_with(shared: Arc<Shared>, factory: TransportFactory) -> Self {
        let handle = connection::spawn(shared.clone(), factory);
        Self {
            shared,
            handle: Arc::new(parking_lot::Mutex::new(Some(handle))),
        }
    }

    /// Current connection state
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Wait until the session is authenticated and ready
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.shared.state_tx.subscribe();
        let cancel = self.shared.cancel.clone();
        let state = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::ConnectionClosed),
            result = rx.wait_for(|s| matches!(*s, LinkState::Ready | LinkState::Stopped)) => {
                match result {
                    Ok(state) => *state,
                    Err(_) => return Err(Error::ConnectionClosed),
                }
            }
        };
        match state {
            LinkState::Ready => Ok(()),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Register a listener invoked on every transition into `Ready`
    ///
    /// Listeners run exactly once per transition, synchronously in the
    /// supervisor task, in registration order. Use this to re-drive a
    /// workflow each time the device becomes available.
    pub fn on_ready<F>(&self, listener: F)
    where
        F: Fn() -> ReadyFuture + Send + Sync + 'static,
    {
        self.shared.listeners.lock().push(Arc::new(listener));
    }

    /// Shut the session down
    ///
    /// Cancels any in-flight exchange (it fails with
    /// [`Error::ConnectionClosed`]), closes the port, clears all ready
    /// listeners and stops reconnecting.
    pub async fn stop(&self) {
        info!("stopping sensor session");
        self.shared.cancel.cancel();
        if let Some(mut dispatcher) = self.shared.link.lock().await.take() {
            dispatcher.shutdown().await;
        }
        self.shared.listeners.lock().clear();
        self.shared.set_state(LinkState::Stopped);
    }

    /// Wait for the supervisor to finish (after [`Sensor::stop`])
    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // System operations

    /// Handshake with the device
    pub async fn handshake(&self) -> Result<Response> {
        let ack = self.exchange(Command::Handshake, &[]).await?;
        Ok(Response::Plain {
            succeeded: ack.code.is_handshake_success(),
            code: ack.code,
        })
    }

    /// Verify the configured password
    pub async fn password_verify(&self) -> Result<Response> {
        let password = self.shared.password.load(Ordering::Acquire);
        let ack = self
            .exchange(Command::PasswordVerify, &password.to_be_bytes())
            .await?;
        Ok(plain(ack))
    }

    /// Change the device password
    pub async fn password_set(&self, password: u32) -> Result<Response> {
        let ack = self
            .exchange(Command::PasswordSet, &password.to_be_bytes())
            .await?;
        if ack.code.is_success() {
            // Future handshakes must use the new secret
            self.shared.password.store(password, Ordering::Release);
        }
        Ok(plain(ack))
    }

    /// Change the device address
    pub async fn address_set(&self, address: u32) -> Result<Response> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = dispatcher
            .command(Command::AddressSet, &address.to_be_bytes())
            .await;
        let ack = self.flag_link_failure(result, epoch)?;
        if ack.code.is_success() {
            dispatcher.set_address(address);
            self.shared.address.store(address, Ordering::Release);
        }
        Ok(plain(ack))
    }

    /// Read the system parameter block
    pub async fn parameters_get(&self) -> Result<Response> {
        let ack = self.exchange(Command::ParametersGet, &[]).await?;
        if !ack.code.is_success() {
            return Ok(plain(ack));
        }
        let params = SystemParameters::deserialize(&ack.payload).ok_or_else(|| {
            Error::Core(zfmrust_core::Error::FrameMalformed(
                "undecodable parameter block".into(),
            ))
        })?;
        Ok(Response::WithValue {
            succeeded: true,
            code: ack.code,
            value: Value::Parameters(params),
        })
    }

    /// Write one parameter register
    pub async fn parameters_set(&self, parameter: ParameterId, value: u8) -> Result<Response> {
        let ack = self
            .exchange(Command::ParametersSet, &[parameter as u8, value])
            .await?;
        Ok(plain(ack))
    }

    /// Change the device baudrate
    ///
    /// The port speed follows on the next reconnect cycle, which reopens
    /// the port at the new rate.
    pub async fn set_baud_rate(&self, baud_rate: BaudRate) -> Result<Response> {
        let response = self
            .parameters_set(ParameterId::BaudRate, baud_rate.as_code())
            .await?;
        if response.succeeded() {
            self.shared
                .baud_rate
                .store(baud_to_int(baud_rate), Ordering::Release);
        }
        Ok(response)
    }

    /// Change the matching security level
    pub async fn set_security(&self, level: SecurityLevel) -> Result<Response> {
        self.parameters_set(ParameterId::Security, level.as_code())
            .await
    }

    /// Change the negotiated data packet size
    pub async fn set_packet_size(&self, packet_size: PacketSize) -> Result<Response> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = dispatcher
            .command(
                Command::ParametersSet,
                &[ParameterId::PacketSize as u8, packet_size.as_code()],
            )
            .await;
        let ack = self.flag_link_failure(result, epoch)?;
        if ack.code.is_success() {
            let bytes = packet_size_to_int(packet_size) as usize;
            dispatcher.set_packet_size(bytes);
            self.shared.packet_size.store(bytes, Ordering::Release);
        }
        Ok(plain(ack))
    }

    /// Switch the sensor backlight on or off
    pub async fn backlight(&self, enable: bool) -> Result<Response> {
        let command = if enable {
            Command::BacklightOn
        } else {
            Command::BacklightOff
        };
        Ok(plain(self.exchange(command, &[]).await?))
    }

    // Image operations

    /// Capture the finger image into the image buffer
    pub async fn image_capture(&self) -> Result<Response> {
        Ok(plain(self.exchange(Command::ImageCapture, &[]).await?))
    }

    /// Capture without lighting the backlight
    pub async fn image_capture_free(&self) -> Result<Response> {
        Ok(plain(self.exchange(Command::ImageCaptureFree, &[]).await?))
    }

    /// Check whether a finger is on the sensor window
    pub async fn finger_pressed(&self) -> Result<bool> {
        let ack = self.exchange(Command::ImageCaptureFree, &[]).await?;
        Ok(ack.code.is_success())
    }

    /// Wait until the finger is pressed (or released)
    ///
    /// Polls the sensor every `poll` until its presence state matches
    /// `present`. Fails with [`Error::DeadlineExpired`] when the optional
    /// overall deadline passes, and with [`Error::ConnectionClosed`] when
    /// the session is stopped while waiting.
    pub async fn wait_finger(
        &self,
        present: bool,
        poll: Duration,
        deadline: Option<Duration>,
    ) -> Result<()> {
        let started = tokio::time::Instant::now();
        loop {
            if self.finger_pressed().await? == present {
                return Ok(());
            }
            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    return Err(Error::DeadlineExpired);
                }
            }
            let cancel = self.shared.cancel.clone();
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::ConnectionClosed),
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// Extract features from the captured image into a buffer
    pub async fn image_convert(&self, buffer: BufferId) -> Result<Response> {
        Ok(plain(
            self.exchange(Command::ImageConvert, &[buffer.as_byte()])
                .await?,
        ))
    }

    /// Send an image from the host into the device image buffer
    pub async fn image_upload(&self, image: &[u8]) -> Result<Response> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = async {
            let ack = dispatcher.command(Command::ImageUpload, &[]).await?;
            if !ack.code.is_success() {
                return Ok(plain(ack));
            }
            dispatcher.upload(image).await?;
            Ok(plain(ack))
        }
        .await;
        self.flag_link_failure(result, epoch)
    }

    /// Read the captured image from the device
    pub async fn image_download(&self) -> Result<Response> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = async {
            let ack = dispatcher.command(Command::ImageDownload, &[]).await?;
            if !ack.code.is_success() {
                return Ok(plain(ack));
            }
            let data = dispatcher.download().await?;
            Ok(Response::WithValue {
                succeeded: true,
                code: ack.code,
                value: Value::Image(ImageBuffer::new(data)),
            })
        }
        .await;
        self.flag_link_failure(result, epoch)
    }

    // Template operations

    /// Compare buffer 1 against buffer 2 directly
    pub async fn match_1_1(&self) -> Result<Response> {
        let ack = self.exchange(Command::TemplateMatch, &[]).await?;
        Ok(Response::MatchResult {
            succeeded: ack.code.is_success(),
            code: ack.code,
            index: -1,
            score: read_u16(&ack.payload),
        })
    }

    /// Search the whole template library for the buffer contents
    pub async fn match_1_n(&self, buffer: BufferId) -> Result<Response> {
        self.search(Command::TemplateSearch, buffer).await
    }

    /// Library search using the device's fast algorithm
    pub async fn match_1_n_fast(&self, buffer: BufferId) -> Result<Response> {
        self.search(Command::TemplateSearchFast, buffer).await
    }

    async fn search(&self, command: Command, buffer: BufferId) -> Result<Response> {
        // Whole-library span; the device clamps the page count to its
        // actual capacity
        let mut args = Vec::with_capacity(5);
        args.push(buffer.as_byte());
        args.extend_from_slice(&0u16.to_be_bytes());
        args.extend_from_slice(&u16::MAX.to_be_bytes());

        let ack = self.exchange(command, &args).await?;
        if ack.code.is_success() && ack.payload.len() >= 4 {
            Ok(Response::MatchResult {
                succeeded: true,
                code: ack.code,
                index: u16::from_be_bytes([ack.payload[0], ack.payload[1]]) as i32,
                score: u16::from_be_bytes([ack.payload[2], ack.payload[3]]),
            })
        } else {
            Ok(Response::MatchResult {
                succeeded: false,
                code: ack.code,
                index: -1,
                score: 0,
            })
        }
    }

    /// Merge buffers 1 and 2 into a template
    pub async fn template_create(&self) -> Result<Response> {
        Ok(plain(self.exchange(Command::TemplateCreate, &[]).await?))
    }

    /// Store the buffer contents in the template library
    ///
    /// Without an explicit index the first free slot of the index table is
    /// used. On success the chosen index is reported in the response
    /// value; a full library yields `ERROR_DATABASE_FULL`.
    pub async fn template_save(&self, buffer: BufferId, index: Option<u16>) -> Result<Response> {
        let index = match index {
            Some(index) => index,
            None => match self.free_index().await? {
                Some(index) => index,
                None => {
                    return Ok(Response::Plain {
                        succeeded: false,
                        code: StatusCode::DatabaseFull,
                    });
                }
            },
        };

        let mut args = vec![buffer.as_byte()];
        args.extend_from_slice(&index.to_be_bytes());

        let ack = self.exchange(Command::TemplateSave, &args).await?;
        if ack.code.is_success() {
            debug!(index, "template stored");
            Ok(Response::WithValue {
                succeeded: true,
                code: ack.code,
                value: Value::Integer(index as u32),
            })
        } else {
            Ok(plain(ack))
        }
    }

    /// Find the first clear slot in the index table
    async fn free_index(&self) -> Result<Option<u16>> {
        for page in 0..INDEX_TABLE_PAGES {
            let ack = self.exchange(Command::TemplateIndex, &[page]).await?;
            if !ack.code.is_success() {
                continue;
            }
            for (byte_pos, byte) in ack.payload.iter().enumerate() {
                if *byte != 0xFF {
                    let bit = (0..8u16).find(|b| (*byte >> b) & 1 == 0).unwrap_or(0);
                    return Ok(Some(page as u16 * 256 + byte_pos as u16 * 8 + bit));
                }
            }
        }
        Ok(None)
    }

    /// Load a stored template into a buffer
    pub async fn template_load(&self, buffer: BufferId, index: u16) -> Result<Response> {
        let mut args = vec![buffer.as_byte()];
        args.extend_from_slice(&index.to_be_bytes());
        Ok(plain(self.exchange(Command::TemplateLoad, &args).await?))
    }

    /// Read the buffer contents from the device
    pub async fn template_download(&self, buffer: BufferId) -> Result<Response> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = async {
            let ack = dispatcher
                .command(Command::TemplateDownload, &[buffer.as_byte()])
                .await?;
            if !ack.code.is_success() {
                return Ok(plain(ack));
            }
            let data = dispatcher.download().await?;
            Ok(Response::WithValue {
                succeeded: true,
                code: ack.code,
                value: Value::Bytes(data),
            })
        }
        .await;
        self.flag_link_failure(result, epoch)
    }

    /// Send template data from the host into a buffer
    pub async fn template_upload(&self, buffer: BufferId, data: &[u8]) -> Result<Response> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = async {
            let ack = dispatcher
                .command(Command::TemplateUpload, &[buffer.as_byte()])
                .await?;
            if !ack.code.is_success() {
                return Ok(plain(ack));
            }
            dispatcher.upload(data).await?;
            Ok(plain(ack))
        }
        .await;
        self.flag_link_failure(result, epoch)
    }

    /// Delete `count` templates starting at `index`
    pub async fn template_delete(&self, index: u16, count: u16) -> Result<Response> {
        let mut args = Vec::with_capacity(4);
        args.extend_from_slice(&index.to_be_bytes());
        args.extend_from_slice(&count.to_be_bytes());
        Ok(plain(self.exchange(Command::TemplateDelete, &args).await?))
    }

    /// Clear the whole template library
    pub async fn template_empty(&self) -> Result<Response> {
        Ok(plain(self.exchange(Command::TemplateEmpty, &[]).await?))
    }

    /// Count stored templates
    pub async fn template_count(&self) -> Result<Response> {
        let ack = self.exchange(Command::TemplateCount, &[]).await?;
        if ack.code.is_success() && ack.payload.len() >= 2 {
            Ok(Response::WithValue {
                succeeded: true,
                code: ack.code,
                value: Value::Integer(read_u16(&ack.payload) as u32),
            })
        } else {
            Ok(plain(ack))
        }
    }

    /// Read one page of the template index table
    ///
    /// `frame_payload` carries the raw occupancy bitmask; `data` expands
    /// it to one byte per slot (0 free, 1 occupied).
    pub async fn template_index(&self, page: u8) -> Result<Response> {
        if page >= INDEX_TABLE_PAGES {
            return Err(Error::InvalidIndexPage(page));
        }
        let ack = self.exchange(Command::TemplateIndex, &[page]).await?;
        if !ack.code.is_success() {
            return Ok(plain(ack));
        }
        let mut data = BytesMut::with_capacity(ack.payload.len() * 8);
        for byte in ack.payload.iter() {
            for bit in 0..8 {
                data.put_u8((byte >> bit) & 1);
            }
        }
        Ok(Response::WithData {
            succeeded: true,
            code: ack.code,
            frame_payload: ack.payload,
            data: data.freeze(),
        })
    }

    // Extras

    /// Write one notepad page
    pub async fn notepad_set(&self, page: u8, data: &[u8]) -> Result<Response> {
        if page >= NOTEPAD_PAGE_COUNT {
            return Err(Error::InvalidNotepadPage(page));
        }
        if data.len() > NOTEPAD_PAGE_SIZE {
            return Err(Error::NotepadDataTooLong(data.len()));
        }
        // Short writes are zero-padded to the full page
        let mut args = vec![0u8; 1 + NOTEPAD_PAGE_SIZE];
        args[0] = page;
        args[1..1 + data.len()].copy_from_slice(data);
        Ok(plain(self.exchange(Command::NotepadSet, &args).await?))
    }

    /// Read one notepad page
    pub async fn notepad_get(&self, page: u8) -> Result<Response> {
        if page >= NOTEPAD_PAGE_COUNT {
            return Err(Error::InvalidNotepadPage(page));
        }
        let ack = self.exchange(Command::NotepadGet, &[page]).await?;
        if ack.code.is_success() {
            Ok(Response::WithValue {
                succeeded: true,
                code: ack.code,
                value: Value::Bytes(ack.payload),
            })
        } else {
            Ok(plain(ack))
        }
    }

    /// Ask the device for a random number
    pub async fn generate_random(&self) -> Result<Response> {
        let ack = self.exchange(Command::GenerateRandom, &[]).await?;
        if ack.code.is_success() && ack.payload.len() >= 4 {
            let value = u32::from_be_bytes([
                ack.payload[0],
                ack.payload[1],
                ack.payload[2],
                ack.payload[3],
            ]);
            Ok(Response::WithValue {
                succeeded: true,
                code: ack.code,
                value: Value::Integer(value),
            })
        } else {
            Ok(plain(ack))
        }
    }

    // Helpers

    async fn lock_link(&self) -> Result<MutexGuard<'_, Option<Dispatcher>>> {
        let cancel = self.shared.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::ConnectionClosed),
            guard = self.shared.link.lock() => Ok(guard),
        }
    }

    async fn exchange(&self, command: Command, args: &[u8]) -> Result<Ack> {
        let mut guard = self.lock_link().await?;
        let dispatcher = guard.as_mut().ok_or(Error::NotReady)?;
        let epoch = dispatcher.epoch();
        let result = dispatcher.command(command, args).await;
        self.flag_link_failure(result, epoch)
    }

    /// Turn a link-level failure into `ConnectionLost` and wake the
    /// supervisor; the in-flight operation is never resumed
    fn flag_link_failure<T>(&self, result: Result<T>, epoch: u64) -> Result<T> {
        match result {
            Err(e) if e.is_link_failure() => {
                self.shared.report_lost(epoch);
                Err(Error::ConnectionLost)
            }
            other => other,
        }
    }
}

fn plain(ack: Ack) -> Response {
    Response::Plain {
        succeeded: ack.code.is_success(),
        code: ack.code,
    }
}

fn read_u16(payload: &[u8]) -> u16 {
    if payload.len() >= 2 {
        u16::from_be_bytes([payload[0], payload[1]])
    } else {
        0
    }
}
