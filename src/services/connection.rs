use crate::error::{Error, Result};
use crate::messages::{ConnectionCommand, ConnectionState};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Mocked helmet link
///
/// This service:
/// - Owns the ConnectionState and publishes it on a watch channel
/// - Arms a single one-shot timer on `connect()` and completes the link when it fires
/// - Flips instantly between Connected and Disconnected on `toggle()`
pub struct ConnectionLink {
    cmd_rx: mpsc::Receiver<ConnectionCommand>,
    state_tx: watch::Sender<ConnectionState>,
    connect_delay: Duration,
    deadline: Option<Instant>,
}

impl ConnectionLink {
    pub fn new(
        connect_delay: Duration,
        cmd_rx: mpsc::Receiver<ConnectionCommand>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            cmd_rx,
            state_tx,
            connect_delay,
            deadline: None,
        }
    }

    /// Create the link, spawn it, and return its handle
    pub fn spawn(connect_delay: Duration) -> ConnectionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(10);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let link = Self::new(connect_delay, cmd_rx, state_tx);
        tokio::spawn(link.run());
        ConnectionHandle::new(cmd_tx, state_rx)
    }

    pub async fn run(mut self) {
        loop {
            // select! evaluates disabled branches too, so never unwrap here
            let deadline = self.deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },

                _ = tokio::time::sleep_until(deadline), if self.deadline.is_some() => {
                    self.deadline = None;
                    self.set_state(ConnectionState::Connected);
                    tracing::info!("Helmet connected");
                }
            }
        }

        tracing::debug!("Connection link stopped");
    }

    fn handle_command(&mut self, cmd: ConnectionCommand) {
        let (reply, state) = match cmd {
            ConnectionCommand::Connect(reply) => (reply, self.connect()),
            ConnectionCommand::Toggle(reply) => (reply, self.toggle()),
            ConnectionCommand::Disconnect(reply) => (reply, self.disconnect()),
        };
        let _ = reply.send(state);
    }

    fn connect(&mut self) -> ConnectionState {
        let state = *self.state_tx.borrow();
        if state != ConnectionState::Disconnected {
            tracing::debug!("connect: already {:?}, ignoring", state);
            return state;
        }

        tracing::info!("Connecting to helmet ({:?})", self.connect_delay);
        self.deadline = Some(Instant::now() + self.connect_delay);
        self.set_state(ConnectionState::Connecting)
    }

    fn toggle(&mut self) -> ConnectionState {
        let next = match *self.state_tx.borrow() {
            ConnectionState::Disconnected => ConnectionState::Connected,
            ConnectionState::Connecting | ConnectionState::Connected => {
                ConnectionState::Disconnected
            }
        };

        tracing::info!("Toggling helmet link to {:?}", next);
        self.deadline = None;
        self.set_state(next)
    }

    fn disconnect(&mut self) -> ConnectionState {
        if self.deadline.take().is_some() {
            tracing::debug!("disconnect: pending connect cancelled");
        }
        self.set_state(ConnectionState::Disconnected)
    }

    fn set_state(&self, state: ConnectionState) -> ConnectionState {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        state
    }

    #[cfg(test)]
    fn is_connect_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Handle for communicating with the ConnectionLink
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<ConnectionCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<ConnectionCommand>, state: watch::Receiver<ConnectionState>) -> Self {
        Self { tx, state }
    }

    /// Delayed policy: Disconnected -> Connecting -> Connected
    pub async fn connect(&self) -> Result<ConnectionState> {
        self.request(ConnectionCommand::Connect).await
    }

    /// Instant policy: Connected <-> Disconnected
    pub async fn toggle(&self) -> Result<ConnectionState> {
        self.request(ConnectionCommand::Toggle).await
    }

    pub async fn disconnect(&self) -> Result<ConnectionState> {
        self.request(ConnectionCommand::Disconnect).await
    }

    pub fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    async fn request(
        &self,
        cmd: impl FnOnce(oneshot::Sender<ConnectionState>) -> ConnectionCommand,
    ) -> Result<ConnectionState> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(cmd(reply))
            .await
            .map_err(|_| Error::ServiceStopped("connection"))?;

        rx.await.map_err(|_| Error::ServiceStopped("connection"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn test_connect_completes_after_delay() {
        let link = ConnectionLink::spawn(DELAY);
        assert_eq!(link.current(), ConnectionState::Disconnected);

        assert_eq!(link.connect().await.unwrap(), ConnectionState::Connecting);

        let mut state = link.subscribe();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_connecting_keeps_original_timer() {
        let link = ConnectionLink::spawn(DELAY);
        let start = Instant::now();

        link.connect().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(link.connect().await.unwrap(), ConnectionState::Connecting);

        let mut state = link.subscribe();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        // a re-armed timer would have fired at 3s
        assert!(start.elapsed() < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_connected_is_noop() {
        let link = ConnectionLink::spawn(DELAY);
        link.connect().await.unwrap();
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(link.current(), ConnectionState::Connected);

        let mut state = link.subscribe();
        state.mark_unchanged();
        assert_eq!(link.connect().await.unwrap(), ConnectionState::Connected);
        assert!(!state.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_does_not_rearm() {
        let (_tx, cmd_rx) = mpsc::channel(1);
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        let mut link = ConnectionLink::new(DELAY, cmd_rx, state_tx);

        link.connect();
        let armed = link.deadline;
        assert!(link.is_connect_pending());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(link.connect(), ConnectionState::Connecting);
        assert_eq!(link.deadline, armed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_is_instant() {
        let link = ConnectionLink::spawn(DELAY);
        assert_eq!(link.toggle().await.unwrap(), ConnectionState::Connected);
        assert_eq!(link.current(), ConnectionState::Connected);
        assert_eq!(link.toggle().await.unwrap(), ConnectionState::Disconnected);
        assert_eq!(link.current(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_cancels_pending_connect() {
        let link = ConnectionLink::spawn(DELAY);
        link.connect().await.unwrap();
        assert_eq!(link.toggle().await.unwrap(), ConnectionState::Disconnected);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(link.current(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_connect() {
        let link = ConnectionLink::spawn(DELAY);
        link.connect().await.unwrap();
        assert_eq!(
            link.disconnect().await.unwrap(),
            ConnectionState::Disconnected
        );

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(link.current(), ConnectionState::Disconnected);

        // a fresh connect works again afterwards
        assert_eq!(link.connect().await.unwrap(), ConnectionState::Connecting);
    }
}
