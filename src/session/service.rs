// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusteringProjection, Gesture, GridClusterLayer, GridSettings};
use crate::config::Config;
use crate::controller::{AppState, ControllerEvent, InteractionController, Outcome};
use crate::error::{MapLoadError, SessionError};
use crate::registry::models::{Coordinate, MarkerId};
use crate::session::view::{SessionStatus, SessionView};
use crate::store::{RemoteStore, RemoteWriter, Subscription};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub collection: String,
    pub center: Coordinate,
    pub zoom: u8,
    pub grid: GridSettings,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.collection.clone(),
            center: config.default_center(),
            zoom: config.default_zoom,
            grid: config.grid_settings(),
        }
    }
}

/// Request to the session loop
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Event(ControllerEvent),
    /// Gesture on a marker handle, routed through the gesture dispatch table
    Gesture { marker_id: MarkerId, gesture: Gesture },
}

struct Envelope {
    command: SessionCommand,
    reply: oneshot::Sender<Outcome>,
}

/// Cloneable access to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: Option<mpsc::Sender<Envelope>>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    pub async fn dispatch(&self, command: SessionCommand) -> Result<Outcome, SessionError> {
        let Some(ref commands) = self.commands else {
            let reason = match &self.view.borrow().status {
                SessionStatus::Failed(reason) => reason.clone(),
                _ => "session not started".to_string(),
            };
            return Err(SessionError::Unavailable(reason));
        };

        let (reply, outcome) = oneshot::channel();
        commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| SessionError::Stopped)?;
        outcome.await.map_err(|_| SessionError::Stopped)
    }

    pub async fn event(&self, event: ControllerEvent) -> Result<Outcome, SessionError> {
        self.dispatch(SessionCommand::Event(event)).await
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Owner of the session loop task
pub struct Session {
    handle: SessionHandle,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Session {
    /// Subscribe to the store and start the loop. A failed subscription
    /// yields a session stuck in `SessionStatus::Failed`.
    pub async fn start(store: Arc<dyn RemoteStore>, settings: SessionSettings) -> Self {
        let writer = RemoteWriter::new(Arc::clone(&store), settings.collection.clone());
        Self::start_with_writer(store, writer, settings).await
    }

    pub async fn start_with_writer(
        store: Arc<dyn RemoteStore>,
        writer: RemoteWriter,
        settings: SessionSettings,
    ) -> Self {
        let subscription = match store.subscribe(&settings.collection).await {
            Ok(subscription) => subscription,
            Err(e) => return Self::failed(&e, settings),
        };

        let (view_tx, view_rx) = watch::channel(SessionView::initial(settings.center, settings.zoom, settings.grid));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let mut session_loop = SessionLoop {
            state: AppState::new(),
            controller: InteractionController::new(writer),
            projection: ClusteringProjection::new(GridClusterLayer::new(settings.grid)),
            status: SessionStatus::Loading,
            settings,
            view_tx,
        };
        session_loop.refresh();

        let task = tokio::spawn(session_loop.run(subscription, command_rx, shutdown_rx));
        info!("Session started");

        Self {
            handle: SessionHandle {
                commands: Some(command_tx),
                view: view_rx,
            },
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Session whose map view failed to load; never retried
    pub fn failed(err: &MapLoadError, settings: SessionSettings) -> Self {
        error!(error = %err, "Error loading map view");

        let mut view = SessionView::initial(settings.center, settings.zoom, settings.grid);
        view.status = SessionStatus::Failed(err.to_string());
        let (_, view_rx) = watch::channel(view);

        Self {
            handle: SessionHandle {
                commands: None,
                view: view_rx,
            },
            shutdown: None,
            task: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the loop and release the remote subscription
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
    }
}

struct SessionLoop {
    state: AppState,
    controller: InteractionController,
    projection: ClusteringProjection<GridClusterLayer>,
    status: SessionStatus,
    settings: SessionSettings,
    view_tx: watch::Sender<SessionView>,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut subscription: Subscription,
        mut commands: mpsc::Receiver<Envelope>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut subscribed = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Session shutdown requested");
                    break;
                }
                snapshot = subscription.next(), if subscribed => match snapshot {
                    Some(snapshot) => {
                        self.apply(ControllerEvent::RemoteSnapshot(snapshot));
                    }
                    None => {
                        warn!("Remote subscription closed, continuing with local state");
                        subscribed = false;
                    }
                },
                envelope = commands.recv() => match envelope {
                    Some(Envelope { command, reply }) => {
                        let outcome = self.execute(command);
                        let _ = reply.send(outcome);
                    }
                    None => break,
                },
            }
        }

        subscription.cancel();
        info!("Session stopped");
    }

    fn execute(&mut self, command: SessionCommand) -> Outcome {
        match command {
            SessionCommand::Event(event) => self.apply(event),
            SessionCommand::Gesture { marker_id, gesture } => {
                match self.projection.dispatch().resolve(marker_id, gesture) {
                    Some(event) => self.apply(event),
                    None => {
                        debug!(marker_id, "Gesture on unbound marker handle ignored");
                        Outcome::Ignored
                    }
                }
            }
        }
    }

    fn apply(&mut self, event: ControllerEvent) -> Outcome {
        if self.status == SessionStatus::Loading {
            self.status = SessionStatus::Ready;
        }
        let outcome = self.controller.handle(&mut self.state, event);
        self.refresh();
        outcome
    }

    /// Re-project if needed and publish a fresh view
    fn refresh(&mut self) {
        self.projection.sync(&self.state.registry);

        let layer = self.projection.layer();
        let view = SessionView {
            status: self.status.clone(),
            mode: self.state.mode,
            center: self.settings.center,
            zoom: self.settings.zoom,
            markers: self.state.registry.markers().to_vec(),
            max_id: self.state.registry.max_id(),
            handles: layer.handles().to_vec(),
            clusters: layer.clusters(self.settings.zoom),
            grid: self.settings.grid,
            revision: self.state.registry.revision(),
        };
        self.view_tx.send_replace(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Mode;
    use crate::registry::models::{Marker, QuestRecord};
    use crate::store::MemoryStore;
    use crate::test_helpers::{test_settings, wait_for_view};

    fn point(v: f64) -> Coordinate {
        Coordinate::new(v, v)
    }

    async fn start(store: &MemoryStore) -> Session {
        Session::start(Arc::new(store.clone()), test_settings()).await
    }

    #[tokio::test]
    async fn test_first_snapshot_makes_session_ready() {
        let store = MemoryStore::new();
        let session = start(&store).await;

        let view = wait_for_view(&session.handle(), |v| v.status == SessionStatus::Ready).await;
        assert!(view.markers.is_empty());
        assert_eq!(view.mode, Mode::Move);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_records_hydrate_with_sequential_ids() {
        let store = MemoryStore::new();
        store.insert_raw("quests", "-Nx1", QuestRecord::new(point(1.0))).await;
        store.insert_raw("quests", "-Nx2", QuestRecord::new(point(2.0))).await;
        store.insert_raw("quests", "-Nx3", QuestRecord::new(point(3.0))).await;

        let session = start(&store).await;
        let view = wait_for_view(&session.handle(), |v| v.markers.len() == 3).await;

        let ids: Vec<MarkerId> = view.markers.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(view.max_id, 3);
        assert_eq!(view.handles.len(), 3);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_place_marker_through_session() {
        let store = MemoryStore::new();
        let session = start(&store).await;
        let handle = session.handle();
        wait_for_view(&handle, |v| v.status == SessionStatus::Ready).await;

        assert_eq!(
            handle.event(ControllerEvent::ToggleMode).await.unwrap(),
            Outcome::ModeChanged(Mode::SetMarker)
        );
        let outcome = handle.event(ControllerEvent::MapClick(Some(point(1.0)))).await.unwrap();
        assert_eq!(outcome, Outcome::Added(Marker::new(1, point(1.0))));

        let view = handle.view();
        assert_eq!(view.mode, Mode::SetMarker);
        assert_eq!(view.markers, vec![Marker::new(1, point(1.0))]);
        assert_eq!(view.handles[0].label, "1");

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_click_gesture_deletes_marker() {
        let store = MemoryStore::new();
        store.insert_raw("quests", "1", QuestRecord::new(point(1.0))).await;
        let session = start(&store).await;
        let handle = session.handle();
        wait_for_view(&handle, |v| v.markers.len() == 1).await;

        let outcome = handle
            .dispatch(SessionCommand::Gesture { marker_id: 1, gesture: Gesture::Click })
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Removed(1));

        let view = handle.view();
        assert!(view.markers.is_empty());
        assert!(view.handles.is_empty());
        assert_eq!(view.max_id, 0);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_gesture_on_unknown_marker_is_ignored() {
        let store = MemoryStore::new();
        let session = start(&store).await;
        let handle = session.handle();

        let outcome = handle
            .dispatch(SessionCommand::Gesture {
                marker_id: 42,
                gesture: Gesture::DragEnd { position: Some(point(1.0)) },
            })
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert!(store.record("quests", 42).await.is_none());

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_change_reaches_view() {
        let store = MemoryStore::new();
        let session = start(&store).await;
        let handle = session.handle();
        wait_for_view(&handle, |v| v.status == SessionStatus::Ready).await;

        store.insert_raw("quests", "7", QuestRecord::new(point(7.0))).await;
        let view = wait_for_view(&handle, |v| v.markers.len() == 1).await;
        assert_eq!(view.markers[0], Marker::new(1, point(7.0)));
        assert_eq!(view.clusters.len(), 1);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_session_rejects_commands() {
        let err = MapLoadError::Subscribe {
            path: "quests".to_string(),
            reason: "401 Unauthorized".to_string(),
        };
        let session = Session::failed(&err, test_settings());
        let handle = session.handle();

        assert!(handle.view().is_failed());
        let result = handle.event(ControllerEvent::ToggleMode).await;
        assert!(matches!(result, Err(SessionError::Unavailable(reason)) if reason.contains("401")));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop_and_releases_subscription() {
        let store = MemoryStore::new();
        let session = start(&store).await;
        let handle = session.handle();
        wait_for_view(&handle, |v| v.status == SessionStatus::Ready).await;
        assert_eq!(store.subscriber_count(), 1);

        session.shutdown().await;
        let result = handle.event(ControllerEvent::ToggleMode).await;
        assert!(matches!(result, Err(SessionError::Stopped)));

        // the aborted reader drops its receiver on the next runtime turn
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while store.subscriber_count() > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription still held after shutdown");
    }
}
