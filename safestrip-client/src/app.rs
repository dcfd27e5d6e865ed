use std::sync::Arc;

use safestrip_api::models::{Device, Id, Workspace};

use crate::api::BackendApi;
use crate::bridge::SyncBridge;
use crate::directory::{Directory, DirectoryError};
use crate::identity::{AuthError, IdentityProvider};
use crate::session::SessionMirror;
use crate::simulator::{OutletBank, SimulatorHandle};
use crate::storage::{UiState, UiStateStore};
use crate::view::{DashboardView, Screen, ViewController, ViewEvent, ViewModel};

/// Ties the session bridge, view controller, directory and simulator
/// together the way the dashboard screens drive them.
pub struct App {
    identity: Arc<dyn IdentityProvider>,
    bridge: SyncBridge,
    mirror: SessionMirror,
    directory: Directory,
    view: ViewController,
    simulator: Option<SimulatorHandle>,
    store: Option<UiStateStore>,
    ui_state: UiState,
}

impl App {
    /// Mounts the session bridge, so this needs a running tokio runtime.
    pub fn new(identity: Arc<dyn IdentityProvider>, api: Arc<dyn BackendApi>) -> Self {
        Self::with_bridge(SyncBridge::mount(identity), api)
    }

    /// Builds on an already mounted bridge, for callers that need the
    /// mirror before the API client exists.
    pub fn with_bridge(bridge: SyncBridge, api: Arc<dyn BackendApi>) -> Self {
        let mirror = bridge.mirror();

        Self {
            identity: bridge.provider().clone(),
            bridge,
            mirror,
            directory: Directory::new(api),
            view: ViewController::new(),
            simulator: None,
            store: None,
            ui_state: UiState::default(),
        }
    }

    /// Restores persisted UI state from `store` and keeps it updated.
    pub async fn with_store(mut self, store: UiStateStore) -> Self {
        self.ui_state = store.load().await.unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable ui state: {}", e);
            UiState::default()
        });
        self.store = Some(store);
        self
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn mirror(&self) -> SessionMirror {
        self.mirror.clone()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn screen(&self) -> &Screen {
        self.view.screen()
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui_state
    }

    pub fn selected_workspace_id(&self) -> Option<Id> {
        self.view.selection().and_then(|selection| selection.workspace_id)
    }

    /// Renders the current view model with the directory locked for reading.
    pub async fn render<T>(&self, f: impl FnOnce(ViewModel<'_>) -> T) -> T {
        let cache = self.directory.read().await;
        f(self.view.resolve(&cache))
    }

    /// Feeds the mirrored session into the view controller. Entering the
    /// dashboard loads it; leaving it forgets the directory.
    pub async fn sync_session(&mut self) -> bool {
        let state = self.mirror.snapshot();
        let was_authenticated = self.view.screen().is_authenticated();

        let changed = self.view.sync_session(&state);
        self.settle();

        if changed {
            match (was_authenticated, self.view.screen().is_authenticated()) {
                (false, true) => {
                    if let Err(e) = self.load_dashboard().await {
                        tracing::warn!("dashboard load failed: {}", e);
                    }
                }
                (true, false) => self.directory.reset().await,
                _ => {}
            }
        }

        changed
    }

    /// Waits for the next session write and applies it. Returns `false`
    /// once the bridge is gone.
    pub async fn next_session_change(&mut self) -> bool {
        if !self.mirror.changed().await {
            return false;
        }
        self.sync_session().await;
        true
    }

    pub async fn sign_out(&mut self) -> Result<(), AuthError> {
        let result = self.bridge.sign_out().await;
        self.sync_session().await;
        result
    }

    pub fn open_settings(&mut self) -> bool {
        self.apply(ViewEvent::OpenSettings)
    }

    pub fn close_settings(&mut self) -> bool {
        self.apply(ViewEvent::CloseSettings)
    }

    /// Loads workspaces and selects the remembered one, or the newest.
    pub async fn load_dashboard(&mut self) -> Result<(), DirectoryError> {
        let first = self.directory.load().await?;

        let remembered = match self.ui_state.last_workspace_id {
            Some(id) if Some(id) != first => {
                let known = self.directory.read().await.workspace(id).is_some();
                known.then_some(id)
            }
            _ => None,
        };

        match (remembered, first) {
            (Some(id), _) => self.select_workspace(id).await,
            (None, Some(id)) => {
                self.focus_workspace(id).await;
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// Selects a known workspace, then fetches its devices. The selection
    /// holds even when the fetch fails.
    pub async fn select_workspace(&mut self, workspace_id: Id) -> Result<(), DirectoryError> {
        if self.directory.read().await.workspace(workspace_id).is_none() {
            return Err(DirectoryError::WorkspaceNotFound(workspace_id));
        }

        self.focus_workspace(workspace_id).await;

        self.directory.list_devices_for_workspace(workspace_id).await?;
        Ok(())
    }

    /// Creates a workspace and selects it. A new workspace has no devices
    /// yet, so nothing else is fetched.
    pub async fn create_workspace(&mut self, name: &str) -> Result<Workspace, DirectoryError> {
        let workspace = self.directory.create_workspace(name).await?;
        self.focus_workspace(workspace.id).await;
        Ok(workspace)
    }

    /// Creates a device under the selected workspace.
    pub async fn create_device(
        &mut self,
        name: &str,
        label: Option<&str>,
    ) -> Result<Device, DirectoryError> {
        let workspace_id = self
            .selected_workspace_id()
            .ok_or(DirectoryError::NoWorkspaceSelected)?;

        self.directory.create_device(workspace_id, name, label).await
    }

    /// Opens the detail view with a fresh outlet simulation.
    pub fn open_device(&mut self, device_id: Id) -> bool {
        let changed = self.apply(ViewEvent::OpenDevice(device_id));

        if changed {
            self.simulator = Some(SimulatorHandle::start());
        }
        changed
    }

    pub fn back_to_devices(&mut self) -> bool {
        self.apply(ViewEvent::BackToDevices)
    }

    pub fn outlets(&self) -> Option<OutletBank> {
        self.simulator.as_ref().map(SimulatorHandle::snapshot)
    }

    pub fn toggle_outlet(&self, outlet_id: u8) -> Option<bool> {
        self.simulator.as_ref()?.toggle_power(outlet_id)
    }

    fn apply(&mut self, event: ViewEvent) -> bool {
        let changed = self.view.apply(event);
        self.settle();
        changed
    }

    /// Stops the simulator once the detail view is gone.
    fn settle(&mut self) {
        let in_detail = matches!(
            self.view.screen(),
            Screen::Dashboard(dashboard) if dashboard.view == DashboardView::DeviceDetail
        );

        if !in_detail {
            self.simulator = None;
        }
    }

    async fn focus_workspace(&mut self, workspace_id: Id) {
        self.apply(ViewEvent::SelectWorkspace(workspace_id));
        self.remember(workspace_id).await;
    }

    async fn remember(&mut self, workspace_id: Id) {
        if self.ui_state.last_workspace_id == Some(workspace_id) {
            return;
        }
        self.ui_state.last_workspace_id = Some(workspace_id);

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.ui_state).await {
                tracing::warn!("failed to persist ui state: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use uuid::Uuid;

    use super::*;
    use crate::directory::tests::FakeBackend;
    use crate::identity::MemoryIdentity;
    use crate::view::Dashboard;

    async fn signed_in_app(backend: Arc<FakeBackend>) -> (App, Arc<MemoryIdentity>) {
        let identity = Arc::new(MemoryIdentity::new().signed_in_as("ops@safestrip.app", "hunter22"));
        let mut app = App::new(identity.clone(), backend);

        app.mirror().initialized().await;
        app.sync_session().await;

        (app, identity)
    }

    #[tokio::test]
    async fn test_starts_loading_then_unauthenticated() {
        let identity = Arc::new(MemoryIdentity::new());
        let mut app = App::new(identity, Arc::new(FakeBackend::default()));
        assert_eq!(app.screen(), &Screen::Loading);

        app.mirror().initialized().await;
        app.sync_session().await;

        assert_eq!(app.screen(), &Screen::Unauthenticated);
        assert!(app.render(|model| model == ViewModel::SignIn).await);
    }

    #[tokio::test]
    async fn test_entering_dashboard_selects_first_workspace() {
        let backend = Arc::new(
            FakeBackend::default()
                .with_workspace("Kitchen")
                .with_workspace("Garage"),
        );
        let kitchen = backend.workspaces.lock().unwrap()[0].id;

        let (app, _) = signed_in_app(backend).await;

        assert_eq!(app.selected_workspace_id(), Some(kitchen));
        let name = app
            .render(|model| match model {
                ViewModel::DeviceList { workspace, .. } => workspace.map(|w| w.name.clone()),
                _ => None,
            })
            .await;
        assert_eq!(name.as_deref(), Some("Kitchen"));
    }

    #[tokio::test]
    async fn test_create_workspace_is_first_and_selected() {
        let backend = Arc::new(FakeBackend::default().with_workspace("Garage"));
        let (mut app, _) = signed_in_app(backend).await;

        let kitchen = app.create_workspace("Kitchen").await.unwrap();

        assert_eq!(app.selected_workspace_id(), Some(kitchen.id));
        assert_eq!(app.ui_state().last_workspace_id, Some(kitchen.id));
        let cache = app.directory().snapshot().await;
        assert_eq!(cache.first_workspace().map(|w| w.name.as_str()), Some("Kitchen"));
    }

    #[tokio::test]
    async fn test_create_workspace_succeeds_while_devices_fail() {
        let backend = Arc::new(FakeBackend::default());
        let (mut app, _) = signed_in_app(backend.clone()).await;
        backend.fail_devices.store(true, Ordering::SeqCst);

        let kitchen = app.create_workspace("Kitchen").await.unwrap();

        assert_eq!(app.selected_workspace_id(), Some(kitchen.id));
        assert_eq!(backend.workspaces.lock().unwrap().len(), 1);
        assert_eq!(app.directory().error().await, None);
    }

    #[tokio::test]
    async fn test_dashboard_selects_first_workspace_when_devices_fail() {
        let backend = Arc::new(FakeBackend::default().with_workspace("Kitchen"));
        let kitchen = backend.workspaces.lock().unwrap()[0].id;
        backend.fail_devices.store(true, Ordering::SeqCst);

        let (app, _) = signed_in_app(backend).await;

        assert_eq!(app.selected_workspace_id(), Some(kitchen));
        assert_eq!(app.directory().error().await.as_deref(), Some("Failed to load devices"));
        let shown = app
            .render(|model| match model {
                ViewModel::DeviceList { workspace, devices, .. } => {
                    workspace.map(|w| w.id) == Some(kitchen) && devices.is_empty()
                }
                _ => false,
            })
            .await;
        assert!(shown);
    }

    #[tokio::test]
    async fn test_create_device_needs_selection() {
        let (mut app, _) = signed_in_app(Arc::new(FakeBackend::default())).await;

        let err = app.create_device("Desk strip", None).await.unwrap_err();
        assert!(matches!(err, DirectoryError::NoWorkspaceSelected));

        app.create_workspace("Office").await.unwrap();
        let device = app.create_device("Desk strip", Some("A1")).await.unwrap();
        assert_eq!(device.device_label.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_unknown_device_falls_back_and_goes_back() {
        let backend = Arc::new(FakeBackend::default().with_workspace("Kitchen"));
        let (mut app, _) = signed_in_app(backend).await;

        assert!(app.open_device(Uuid::new_v4()));
        let back = app
            .render(|model| {
                assert_eq!(model, ViewModel::DeviceNotFound);
                model.back_action()
            })
            .await;

        app.back_to_devices();
        assert_eq!(back, Some(ViewEvent::BackToDevices));
        assert!(matches!(
            app.screen(),
            Screen::Dashboard(Dashboard {
                view: DashboardView::DeviceList,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_simulator_lives_with_detail_view() {
        let (mut app, _) = signed_in_app(Arc::new(FakeBackend::default())).await;
        app.create_workspace("Office").await.unwrap();
        let device = app.create_device("Desk strip", None).await.unwrap();

        assert!(app.outlets().is_none());
        app.open_device(device.id);
        assert_eq!(app.outlets().map(|bank| bank.outlets().len()), Some(4));
        assert_eq!(app.toggle_outlet(3), Some(true));

        app.open_settings();
        assert!(app.outlets().is_none());
        app.close_settings();
        assert!(app.selected_workspace_id().is_some());

        app.open_device(device.id);
        let bank = app.outlets().unwrap();
        assert!(!bank.outlet(3).unwrap().power_on);
    }

    #[tokio::test]
    async fn test_sign_out_from_detail_resets_everything() {
        let backend = Arc::new(FakeBackend::default().with_workspace("Kitchen"));
        let (mut app, identity) = signed_in_app(backend).await;
        app.open_device(Uuid::new_v4());

        app.sign_out().await.unwrap();

        assert_eq!(app.screen(), &Screen::Unauthenticated);
        assert!(app.outlets().is_none());
        assert!(app.directory().snapshot().await.workspaces().is_empty());

        identity
            .sign_in_with_password(&safestrip_api::models::Credentials {
                email: "ops@safestrip.app".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();
        while !app.mirror().is_signed_in() {
            assert!(app.next_session_change().await);
        }
        app.sync_session().await;

        match app.screen() {
            Screen::Dashboard(dashboard) => assert_eq!(dashboard.view, DashboardView::DeviceList),
            other => panic!("unexpected screen {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remembered_workspace_is_preferred() {
        let backend = Arc::new(
            FakeBackend::default()
                .with_workspace("Kitchen")
                .with_workspace("Garage"),
        );
        let garage = backend.workspaces.lock().unwrap()[1].id;
        let path = std::env::temp_dir()
            .join(format!("safestrip-{}", Uuid::new_v4()))
            .join("ui.json");
        let store = UiStateStore::new(&path);
        store
            .save(&UiState {
                last_workspace_id: Some(garage),
            })
            .await
            .unwrap();

        let identity = Arc::new(MemoryIdentity::new().signed_in_as("ops@safestrip.app", "hunter22"));
        let mut app = App::new(identity, backend).with_store(store).await;
        app.mirror().initialized().await;
        app.sync_session().await;

        assert_eq!(app.selected_workspace_id(), Some(garage));
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
