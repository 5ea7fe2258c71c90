//! Connection supervisor
//!
//! The supervisor owns the device session. It runs as a single tokio task
//! that consumes [`Event`]s from one channel: results of device calls, timer
//! expiries, stream payloads, presence notifications and user commands all
//! arrive there, so session state is only ever touched from one place.
//!
//! Every session gets a fresh epoch. Timers and background calls carry the
//! epoch they were started in, and anything reporting back for an older
//! epoch is dropped. Tearing a session down therefore only has to bump the
//! epoch and abort what is still running.
//!
//! ```text
//!   connect ──ok──▶ Connected ──▶ polling timer ─┐
//!      │                     └──▶ event stream ──┼──▶ StateSynchronizer
//!      │                          + watchdog     │
//!      ▼ transient                               ▼ failure
//!   reconnect timer ◀──────────── teardown ◀─────┘
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use nanoleaf_api::{ApiError, DeviceApi, DeviceInfo, EventCallback, EventStreamHandle, StreamPayload};
use nanoleaf_discovery::{
    parse_location, Availability, Notification, NotificationHub, NotificationListener, SubscriptionId,
};
use nanoleaf_state::objects::{provision_adapter, CONNECTION_STATE};
use nanoleaf_state::{DeviceProfile, StateSynchronizer, RHYTHM_DEVICE};
use state_store::{ChangeEvent, ListenerId, StateStore};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::commands::{log_api_error, CommandError, CommandSerializer, DeviceCall, PendingCommand};
use crate::config::{AdapterConfig, Intervals};
use crate::error::{AdapterError, Result};
use crate::session::{ConnectFailure, ConnectionState, ErrorTracker, KeepAlive, Transition, UpdateMode};

const TRANSITION_CAPACITY: usize = 64;

/// Messages processed by the supervisor task
#[derive(Debug)]
enum Event {
    /// The reconnect timer fired
    Connect { epoch: u64, is_reconnect: bool },
    ConnectFinished {
        epoch: u64,
        is_reconnect: bool,
        result: std::result::Result<DeviceInfo, ApiError>,
    },
    PollDue { epoch: u64 },
    PollFinished {
        epoch: u64,
        result: std::result::Result<DeviceInfo, ApiError>,
    },
    StreamStarted {
        epoch: u64,
        result: std::result::Result<EventStreamHandle, ApiError>,
    },
    Stream {
        epoch: u64,
        result: std::result::Result<StreamPayload, ApiError>,
    },
    Presence { epoch: u64, notification: Notification },
    IdentityResolved {
        epoch: u64,
        usn: String,
        device_host: String,
        addresses: std::result::Result<Vec<IpAddr>, String>,
    },
    WatchdogExpired { epoch: u64 },
    StateChanged { epoch: u64, event: ChangeEvent },
    CommandSettled {
        epoch: u64,
        command: PendingCommand,
        call: DeviceCall,
        result: std::result::Result<Option<String>, ApiError>,
    },
    Shutdown,
}

/// Everything that only lives while a device is connected
struct Session {
    sync: StateSynchronizer,
    mode: UpdateMode,
    /// `usn` of the device once a notification has been correlated with it
    identity: Option<String>,
    stream: Option<EventStreamHandle>,
    hub_subscriptions: Vec<SubscriptionId>,
    store_listeners: Vec<ListenerId>,
    poll_timer: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl Session {
    fn profile(&self) -> &DeviceProfile {
        self.sync.profile()
    }
}

/// Keeps a [`StateStore`] in sync with one controller
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use nanoleaf_adapter::{AdapterConfig, Supervisor};
/// use nanoleaf_api::OpenApiClient;
/// use state_store::StateStore;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AdapterConfig::new("192.168.1.40", "token");
/// let client = OpenApiClient::new(&config.host, config.port, &config.auth_token, config.intervals().request_timeout)?;
///
/// let mut handle = Supervisor::new(config, Arc::new(client), StateStore::new())?.spawn();
/// handle.wait().await?;
/// # Ok(())
/// # }
/// ```
pub struct Supervisor {
    config: AdapterConfig,
    device: Arc<dyn DeviceApi>,
    store: StateStore,
    hub: NotificationHub,
    bind_listener: bool,
}

impl Supervisor {
    pub fn new(config: AdapterConfig, device: Arc<dyn DeviceApi>, store: StateStore) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            device,
            store,
            hub: NotificationHub::new(),
            bind_listener: true,
        })
    }

    /// Use an externally fed hub instead of binding the multicast listener
    pub fn with_notification_hub(mut self, hub: NotificationHub) -> Self {
        self.hub = hub;
        self.bind_listener = false;
        self
    }

    /// Start the supervisor task
    ///
    /// Transitions can be observed from the returned handle as long as it is
    /// subscribed before the runtime polls the new task.
    pub fn spawn(self) -> SupervisorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);

        let runtime = Runtime {
            intervals: self.config.intervals(),
            config: self.config,
            device: self.device,
            store: self.store,
            hub: self.hub,
            bind_listener: self.bind_listener,
            listener: None,
            tx: tx.clone(),
            rx,
            state_tx,
            transitions: transitions.clone(),
            epoch: 0,
            session: None,
            commands: CommandSerializer::new(),
            errors: ErrorTracker::default(),
            reconnect_timer: None,
        };
        let task = tokio::spawn(runtime.run());

        SupervisorHandle {
            events: tx,
            state: state_rx,
            transitions,
            task: Some(task),
        }
    }
}

/// Control and observation of a running supervisor
///
/// Dropping the handle shuts the supervisor down.
pub struct SupervisorHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<ConnectionState>,
    transitions: broadcast::Sender<Transition>,
    task: Option<JoinHandle<Result<()>>>,
}

impl SupervisorHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that always holds the latest [`ConnectionState`]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Ask the supervisor to tear down the session and stop
    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the supervisor to stop
    ///
    /// Returns the terminal error when the supervisor stopped on its own.
    /// Cancelling the returned future leaves the handle usable.
    pub async fn wait(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown();
        }
    }
}

/// State owned by the supervisor task
struct Runtime {
    config: AdapterConfig,
    intervals: Intervals,
    device: Arc<dyn DeviceApi>,
    store: StateStore,
    hub: NotificationHub,
    bind_listener: bool,
    listener: Option<NotificationListener>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    state_tx: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<Transition>,
    epoch: u64,
    session: Option<Session>,
    commands: CommandSerializer,
    errors: ErrorTracker,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl Runtime {
    async fn run(mut self) -> Result<()> {
        provision_adapter(&self.store);
        self.set_connected(false);

        tracing::info!("Connecting to '{}'...", self.endpoint());
        self.set_state(ConnectionState::Connecting);
        self.start_connect(false);

        let outcome = loop {
            let Some(event) = self.rx.recv().await else {
                break Ok(());
            };
            match self.handle(event) {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.stop();
        outcome
    }

    /// Process one event; `Ok(false)` ends the loop
    fn handle(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Shutdown => {
                tracing::info!("Stopping connection to '{}'", self.endpoint());
                return Ok(false);
            }
            Event::Connect { epoch, is_reconnect } => {
                if epoch == self.epoch && self.session.is_none() {
                    self.start_connect(is_reconnect);
                }
            }
            Event::ConnectFinished {
                epoch,
                is_reconnect,
                result,
            } => {
                if epoch == self.epoch && self.session.is_none() {
                    match result {
                        Ok(info) => self.on_connected(info, is_reconnect),
                        Err(e) => self.on_connect_failed(e, is_reconnect)?,
                    }
                }
            }
            Event::PollDue { epoch } => {
                if self.is_current(epoch) {
                    self.start_poll();
                }
            }
            Event::PollFinished { epoch, result } => {
                if self.is_current(epoch) {
                    self.on_poll_finished(result);
                }
            }
            Event::StreamStarted { epoch, result } => {
                if self.is_current(epoch) {
                    self.on_stream_started(result);
                }
            }
            Event::Stream { epoch, result } => {
                if self.is_current(epoch) {
                    self.on_stream(result);
                }
            }
            Event::Presence { epoch, notification } => {
                if self.is_current(epoch) {
                    self.on_presence(notification);
                }
            }
            Event::IdentityResolved {
                epoch,
                usn,
                device_host,
                addresses,
            } => {
                if self.is_current(epoch) {
                    self.on_identity_resolved(usn, &device_host, addresses);
                }
            }
            Event::WatchdogExpired { epoch } => {
                if self.is_current(epoch) {
                    self.session_lost("No ssdp:alive detected".to_string(), None);
                }
            }
            Event::StateChanged { epoch, event } => {
                if self.is_current(epoch) {
                    self.on_state_changed(&event);
                }
            }
            Event::CommandSettled {
                epoch,
                command,
                call,
                result,
            } => {
                if self.is_current(epoch) {
                    self.on_command_settled(command, call, result);
                }
            }
        }
        Ok(true)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.session.is_some()
    }

    // ---- connection state --------------------------------------------------

    fn set_state(&self, to: ConnectionState) {
        let from = *self.state_tx.borrow();
        if from == to {
            return;
        }
        tracing::debug!("Connection state {} -> {}", from, to);
        self.state_tx.send_replace(to);
        let _ = self.transitions.send(Transition { from, to });
    }

    fn set_connected(&self, connected: bool) {
        if let Err(e) = self.store.set_state(CONNECTION_STATE, connected, true) {
            tracing::warn!("Cannot update '{}': {}", CONNECTION_STATE, e);
        }
    }

    // ---- connect -----------------------------------------------------------

    fn start_connect(&self, is_reconnect: bool) {
        let device = Arc::clone(&self.device);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = device.get_info().await;
            let _ = tx.send(Event::ConnectFinished {
                epoch,
                is_reconnect,
                result,
            });
        });
    }

    fn schedule_reconnect(&mut self, is_reconnect: bool) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        let delay = self.intervals.reconnect;
        tracing::debug!("Connect timer started with {} ms", delay.as_millis());
        self.reconnect_timer = Some(self.after(delay, move |epoch| Event::Connect { epoch, is_reconnect }));
    }

    /// Send `make(epoch)` to the loop after `delay`
    fn after<F>(&self, delay: Duration, make: F) -> JoinHandle<()>
    where
        F: FnOnce(u64) -> Event + Send + 'static,
    {
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(make(epoch));
        })
    }

    fn on_connected(&mut self, info: DeviceInfo, is_reconnect: bool) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.errors.reset();

        let verb = if is_reconnect { "Reconnected" } else { "Connected" };
        tracing::info!("{} to '{}'", verb, self.endpoint());

        let profile = DeviceProfile::resolve(&info.model);
        let mode = UpdateMode::select(&profile, &info.firmware_version, &self.config, &self.intervals);
        let mode = self.ensure_listener(mode);

        let sync = StateSynchronizer::new(self.store.clone(), profile);
        sync.provision(&info);

        self.epoch += 1;
        self.set_connected(true);
        self.set_state(ConnectionState::Connected);

        sync.apply_snapshot(&info);

        self.session = Some(Session {
            sync,
            mode,
            identity: None,
            stream: None,
            hub_subscriptions: Vec::new(),
            store_listeners: Vec::new(),
            poll_timer: None,
            watchdog: None,
        });
        self.subscribe_commands();
        self.start_updates(&info);
    }

    fn on_connect_failed(&mut self, err: ApiError, is_reconnect: bool) -> Result<()> {
        let retry = self.intervals.reconnect.as_secs();
        match ConnectFailure::classify(err) {
            ConnectFailure::PermissionDenied(status) => {
                let message = format!(
                    "{}, Permission denied, please check authorization token!",
                    ApiError::Http(status).format_error()
                );
                tracing::error!("{}", message);
                self.set_state(ConnectionState::Disconnected);
                Err(AdapterError::Authorization(message))
            }
            ConnectFailure::Protocol(status) => {
                let message = format!(
                    "{}, Cannot connect to '{}'. Stopping...",
                    ApiError::Http(status).format_error(),
                    self.endpoint()
                );
                tracing::error!("{}", message);
                self.set_state(ConnectionState::Disconnected);
                Err(AdapterError::Protocol(message))
            }
            ConnectFailure::InvalidDeviceInfo(reason) => {
                tracing::error!(
                    "Invalid device info received from '{}': {}. Cannot detect device. Please check device!",
                    self.endpoint(),
                    reason
                );
                self.set_state(ConnectionState::Disconnected);
                Err(AdapterError::InvalidDeviceInfo(reason))
            }
            ConnectFailure::Transient(err) => {
                let message = format!(
                    "{}, Cannot connect to '{}'. Retry in {}s intervals...",
                    err.format_error(),
                    self.endpoint(),
                    retry
                );
                if self.errors.should_report(&err, is_reconnect) {
                    tracing::error!("{}", message);
                } else {
                    tracing::debug!("{}", message);
                }
                self.set_state(ConnectionState::Reconnecting);
                self.schedule_reconnect(is_reconnect);
                Ok(())
            }
        }
    }

    /// Bind the notification listener when the mode needs one
    ///
    /// Falls back to keep-alive polling if the multicast port is unavailable.
    fn ensure_listener(&mut self, mode: UpdateMode) -> UpdateMode {
        if mode.watchdog_window().is_none() || !self.bind_listener || self.listener.is_some() {
            return mode;
        }
        match NotificationListener::bind(self.hub.clone(), self.config.interface) {
            Ok(listener) => {
                self.listener = Some(listener);
                mode
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot listen for SSDP notifications ({}), falling back to keep-alive polling",
                    e
                );
                UpdateMode::EventStream {
                    keep_alive: KeepAlive::Polling {
                        interval: self.intervals.keep_alive_polling,
                    },
                }
            }
        }
    }

    // ---- session -----------------------------------------------------------

    fn subscribe_commands(&mut self) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        for pattern in [format!("{}.*", session.profile().device_name), format!("{}.*", RHYTHM_DEVICE)] {
            let tx = self.tx.clone();
            let id = self.store.subscribe(&pattern, move |event| {
                if !event.state.ack {
                    let _ = tx.send(Event::StateChanged {
                        epoch,
                        event: event.clone(),
                    });
                }
            });
            session.store_listeners.push(id);
        }
    }

    fn start_updates(&mut self, info: &DeviceInfo) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let mode = session.mode;
        let profile = *session.profile();

        match mode {
            UpdateMode::Polling { interval } => {
                tracing::debug!("Polling mode with {} ms interval started", interval.as_millis());
            }
            UpdateMode::EventStream { keep_alive } => {
                tracing::debug!(
                    "Event stream mode for {} with firmware {} started, keep-alive: {:?}",
                    profile.name,
                    info.firmware_version,
                    keep_alive
                );
                self.start_stream(&profile);
            }
        }

        if let Some(interval) = mode.poll_interval() {
            self.arm_poll(interval);
        }
        if mode.watchdog_window().is_some() {
            self.subscribe_presence(&profile, epoch);
            self.arm_watchdog();
        }
    }

    fn start_stream(&self, profile: &DeviceProfile) {
        let device = Arc::clone(&self.device);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let domains = profile.event_domains();

        let stream_tx = self.tx.clone();
        let on_event: EventCallback = Arc::new(move |result: nanoleaf_api::Result<StreamPayload>| {
            let _ = stream_tx.send(Event::Stream { epoch, result });
        });

        tokio::spawn(async move {
            let result = device.start_events(&domains, on_event).await;
            let _ = tx.send(Event::StreamStarted { epoch, result });
        });
    }

    fn subscribe_presence(&mut self, profile: &DeviceProfile, epoch: u64) {
        let mut ids = Vec::new();
        for kind in [Availability::Alive, Availability::Update, Availability::ByeBye] {
            let tx = self.tx.clone();
            ids.push(self.hub.subscribe(kind, profile.service_type, move |notification| {
                let _ = tx.send(Event::Presence {
                    epoch,
                    notification: notification.clone(),
                });
            }));
        }
        if let Some(session) = self.session.as_mut() {
            session.hub_subscriptions = ids;
        }
    }

    fn arm_poll(&mut self, interval: Duration) {
        let timer = self.after(interval, |epoch| Event::PollDue { epoch });
        if let Some(session) = self.session.as_mut() {
            if let Some(previous) = session.poll_timer.replace(timer) {
                previous.abort();
            }
        }
    }

    fn arm_watchdog(&mut self) {
        let Some(window) = self.session.as_ref().and_then(|s| s.mode.watchdog_window()) else {
            return;
        };
        let timer = self.after(window, |epoch| Event::WatchdogExpired { epoch });
        if let Some(session) = self.session.as_mut() {
            if let Some(previous) = session.watchdog.replace(timer) {
                previous.abort();
            }
        }
    }

    fn start_poll(&self) {
        let device = Arc::clone(&self.device);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = device.get_info().await;
            let _ = tx.send(Event::PollFinished { epoch, result });
        });
    }

    fn on_poll_finished(&mut self, result: std::result::Result<DeviceInfo, ApiError>) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let mode = session.mode;

        match result {
            Ok(info) => {
                if mode.applies_snapshots() {
                    session.sync.apply_snapshot(&info);
                }
                if let Some(interval) = mode.poll_interval() {
                    self.arm_poll(interval);
                }
            }
            Err(e) => {
                tracing::debug!("Updating states failed: {}", e.format_error());
                let reason = e.format_error();
                self.session_lost(reason, Some(e));
            }
        }
    }

    fn on_stream_started(&mut self, result: std::result::Result<EventStreamHandle, ApiError>) {
        match result {
            Ok(handle) => {
                tracing::debug!("SSE subscription started, listening...");
                if let Some(session) = self.session.as_mut() {
                    session.stream = Some(handle);
                }
            }
            Err(e) => {
                let reason = format!("Event stream failed: {}", e.format_error());
                self.session_lost(reason, Some(e));
            }
        }
    }

    fn on_stream(&mut self, result: std::result::Result<StreamPayload, ApiError>) {
        match result {
            Ok(payload) => {
                tracing::debug!(
                    "SSE event received: id {} with {} events",
                    payload.event_id,
                    payload.events.len()
                );
                if let Some(session) = self.session.as_ref() {
                    session.sync.apply_delta(&payload);
                }
                self.arm_watchdog();
            }
            Err(e) => {
                let reason = format!("Event stream failed: {}", e.format_error());
                self.session_lost(reason, Some(e));
            }
        }
    }

    // ---- keep-alive --------------------------------------------------------

    fn on_presence(&mut self, notification: Notification) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        if notification.kind == Availability::ByeBye {
            let matches = session
                .identity
                .as_deref()
                .map_or(true, |identity| identity == notification.usn);
            if matches {
                self.session_lost("ssdp:byebye from device received".to_string(), None);
            }
            return;
        }

        if let Some(identity) = session.identity.as_deref() {
            if identity == notification.usn {
                tracing::debug!("'{}' matched nanoleaf device UUID! Keep alive...", notification.usn);
                self.arm_watchdog();
            }
            return;
        }

        let Some(location) = notification.location.as_deref() else {
            tracing::debug!("Notification from {} without location ignored", notification.address);
            return;
        };
        let Some((host, _port)) = parse_location(location) else {
            tracing::debug!("Invalid location '{}' received from device.", location);
            return;
        };
        let device_host = host.unwrap_or_else(|| notification.address.to_string());

        if self.config.host.parse::<Ipv4Addr>().is_ok() {
            if device_host == self.config.host {
                self.confirm_identity(notification.usn);
            }
            return;
        }

        self.resolve_identity(notification.usn, device_host);
    }

    /// Look up the configured host name and compare it with a notification's host
    fn resolve_identity(&self, usn: String, device_host: String) {
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let host = self.config.host.clone();
        let port = self.config.port;
        tokio::spawn(async move {
            let addresses = tokio::net::lookup_host((host.as_str(), port))
                .await
                .map(|addrs| addrs.map(|addr| addr.ip()).collect())
                .map_err(|e| e.to_string());
            let _ = tx.send(Event::IdentityResolved {
                epoch,
                usn,
                device_host,
                addresses,
            });
        });
    }

    fn on_identity_resolved(
        &mut self,
        usn: String,
        device_host: &str,
        addresses: std::result::Result<Vec<IpAddr>, String>,
    ) {
        match addresses {
            Ok(addresses) => {
                if addresses.iter().any(|addr| addr.to_string() == device_host) {
                    self.confirm_identity(usn);
                }
            }
            Err(e) => {
                tracing::error!("Error while looking up DNS '{}'. Error: {}", self.config.host, e);
            }
        }
    }

    fn confirm_identity(&mut self, usn: String) {
        tracing::debug!("'{}' matched nanoleaf device host! Keep alive...", usn);
        if let Some(session) = self.session.as_mut() {
            session.identity = Some(usn);
        }
        self.arm_watchdog();
    }

    // ---- commands ----------------------------------------------------------

    fn on_state_changed(&mut self, event: &ChangeEvent) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(command) = PendingCommand::from_change(event, session.profile().device_name) else {
            return;
        };
        tracing::debug!("State '{}' changed to '{}', queued", command.id, command.value);
        let next = self.commands.enqueue(command);
        self.dispatch(next);
    }

    /// Send the first valid command starting at `next`
    fn dispatch(&mut self, mut next: Option<PendingCommand>) {
        let Some(device_name) = self.session.as_ref().map(|s| s.profile().device_name) else {
            return;
        };

        while let Some(command) = next {
            match DeviceCall::prepare(&command, &self.store, device_name) {
                Ok(call) => {
                    self.send_command(command, call);
                    return;
                }
                Err(CommandError::Ignored(name)) => {
                    tracing::trace!("State '{}' is only read by other commands", name);
                }
                Err(e @ CommandError::Unknown(_)) => tracing::warn!("{}", e),
                Err(e) => tracing::error!("{}", e),
            }
            next = self.commands.next();
        }
    }

    fn send_command(&self, command: PendingCommand, call: DeviceCall) {
        let device = Arc::clone(&self.device);
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = call.execute(device.as_ref()).await;
            let _ = tx.send(Event::CommandSettled {
                epoch,
                command,
                call,
                result,
            });
        });
    }

    fn on_command_settled(
        &mut self,
        command: PendingCommand,
        call: DeviceCall,
        result: std::result::Result<Option<String>, ApiError>,
    ) {
        match result {
            Ok(response) => {
                tracing::debug!("OpenAPI: {}", call.describe());
                self.acknowledge(&command, response);
            }
            Err(e) => log_api_error(
                &format!(
                    "OpenAPI: Error while sending '{}' with value '{}'",
                    command.state_name, command.value
                ),
                &e,
            ),
        }
        let next = self.commands.next();
        self.dispatch(next);
    }

    /// Confirm the stored value of a command that the device accepted
    ///
    /// Acks whatever the state holds now, which may be newer than what was sent.
    fn acknowledge(&self, command: &PendingCommand, response: Option<String>) {
        if let Some(state) = self.store.get_state(&command.id) {
            if let Err(e) = self.store.set_state(&command.id, state.val, true) {
                tracing::warn!("Cannot acknowledge '{}': {}", command.id, e);
            }
        }
        if let Some(response) = response {
            let id = format!("{}Response", command.id);
            if let Err(e) = self.store.set_state(&id, response, true) {
                tracing::warn!("Cannot store response in '{}': {}", id, e);
            }
        }
    }

    // ---- teardown ----------------------------------------------------------

    /// Handle a failure of an established session
    fn session_lost(&mut self, reason: String, cause: Option<ApiError>) {
        tracing::warn!(
            "Connection to '{}' lost, {}. Try to reconnect...",
            self.endpoint(),
            reason
        );
        self.teardown_session();
        match cause {
            Some(err) => self.errors.record(&err),
            None => self.errors.reset(),
        }

        self.set_connected(false);
        self.set_state(ConnectionState::Disconnected);
        self.set_state(ConnectionState::Reconnecting);
        self.schedule_reconnect(true);
    }

    /// Stop every session activity and invalidate in-flight results
    fn teardown_session(&mut self) {
        let dropped = self.commands.clear();
        if dropped > 0 {
            tracing::debug!("{} queued commands dropped", dropped);
        }
        self.epoch += 1;

        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Some(mut stream) = session.stream.take() {
            stream.stop();
        }
        for id in session.hub_subscriptions.drain(..) {
            self.hub.unsubscribe(id);
        }
        for id in session.store_listeners.drain(..) {
            self.store.unsubscribe(id);
        }
        for timer in [session.poll_timer.take(), session.watchdog.take()].into_iter().flatten() {
            timer.abort();
        }
    }

    fn stop(&mut self) {
        self.teardown_session();
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.listener = None;
        self.set_connected(false);
        self.set_state(ConnectionState::Disconnected);
    }
}
