//! Screen selection as an explicit state machine.
//!
//! [`ViewController::apply`] is the only transition function. Rendering
//! code asks [`ViewController::resolve`] for a [`ViewModel`] against the
//! current directory contents.

use safestrip_api::models::{Device, Id, Workspace};

use crate::directory::DirectoryCache;
use crate::session::SessionState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub workspace_id: Option<Id>,
    pub device_id: Option<Id>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DashboardView {
    #[default]
    DeviceList,
    DeviceDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dashboard {
    pub view: DashboardView,
    pub selection: Selection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Loading,
    Unauthenticated,
    Dashboard(Dashboard),
    /// Keeps the dashboard selection so closing settings restores it.
    Settings(Selection),
}

impl Screen {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Screen::Dashboard(_) | Screen::Settings(_))
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Screen::Dashboard(dashboard) => Some(&dashboard.selection),
            Screen::Settings(selection) => Some(selection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// The mirrored session changed.
    SessionChanged { initialized: bool, signed_in: bool },
    OpenSettings,
    CloseSettings,
    SelectWorkspace(Id),
    OpenDevice(Id),
    BackToDevices,
}

impl From<&SessionState> for ViewEvent {
    fn from(state: &SessionState) -> Self {
        ViewEvent::SessionChanged {
            initialized: state.is_initialized(),
            signed_in: state.is_signed_in(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewController {
    screen: Screen,
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.screen.selection()
    }

    /// Applies `event` and returns whether the screen changed.
    pub fn apply(&mut self, event: ViewEvent) -> bool {
        let next = transition(&self.screen, &event);

        match next {
            Some(next) if next != self.screen => {
                tracing::debug!("view {:?} -> {:?} on {:?}", self.screen, next, event);
                self.screen = next;
                true
            }
            _ => false,
        }
    }

    pub fn sync_session(&mut self, state: &SessionState) -> bool {
        self.apply(ViewEvent::from(state))
    }

    pub fn resolve<'a>(&self, cache: &'a DirectoryCache) -> ViewModel<'a> {
        match &self.screen {
            Screen::Loading => ViewModel::Loading,
            Screen::Unauthenticated => ViewModel::SignIn,
            Screen::Settings(_) => ViewModel::Settings,
            Screen::Dashboard(dashboard) => {
                let workspace = dashboard
                    .selection
                    .workspace_id
                    .and_then(|id| cache.workspace(id));

                match dashboard.view {
                    DashboardView::DeviceList => ViewModel::DeviceList {
                        workspaces: cache.workspaces(),
                        workspace,
                        devices: workspace
                            .map(|workspace| cache.devices_for(workspace.id))
                            .unwrap_or_default(),
                    },
                    DashboardView::DeviceDetail => match dashboard
                        .selection
                        .device_id
                        .and_then(|id| cache.device(id))
                    {
                        Some(device) => ViewModel::DeviceDetail {
                            workspace: cache.workspace(device.workspace_id),
                            device,
                        },
                        None => ViewModel::DeviceNotFound,
                    },
                }
            }
        }
    }
}

/// Pure transition table. `None` means the event does not apply.
fn transition(screen: &Screen, event: &ViewEvent) -> Option<Screen> {
    match (screen, event) {
        (_, ViewEvent::SessionChanged { initialized: false, .. }) => None,

        (Screen::Loading | Screen::Unauthenticated, ViewEvent::SessionChanged { signed_in, .. }) => {
            Some(match signed_in {
                true => Screen::Dashboard(Dashboard::default()),
                false => Screen::Unauthenticated,
            })
        }
        (Screen::Dashboard(_) | Screen::Settings(_), ViewEvent::SessionChanged { signed_in: false, .. }) => {
            Some(Screen::Unauthenticated)
        }
        (_, ViewEvent::SessionChanged { .. }) => None,

        (Screen::Dashboard(dashboard), ViewEvent::OpenSettings) => {
            Some(Screen::Settings(dashboard.selection.clone()))
        }
        (Screen::Settings(selection), ViewEvent::CloseSettings) => Some(Screen::Dashboard(Dashboard {
            view: DashboardView::DeviceList,
            selection: selection.clone(),
        })),

        (Screen::Dashboard(_), ViewEvent::SelectWorkspace(id)) => Some(Screen::Dashboard(Dashboard {
            view: DashboardView::DeviceList,
            selection: Selection {
                workspace_id: Some(*id),
                device_id: None,
            },
        })),
        (Screen::Dashboard(dashboard), ViewEvent::OpenDevice(id)) => Some(Screen::Dashboard(Dashboard {
            view: DashboardView::DeviceDetail,
            selection: Selection {
                workspace_id: dashboard.selection.workspace_id,
                device_id: Some(*id),
            },
        })),
        (Screen::Dashboard(dashboard), ViewEvent::BackToDevices) => Some(Screen::Dashboard(Dashboard {
            view: DashboardView::DeviceList,
            selection: Selection {
                workspace_id: dashboard.selection.workspace_id,
                device_id: None,
            },
        })),

        _ => None,
    }
}

/// What to show for the current screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewModel<'a> {
    Loading,
    SignIn,
    Settings,
    DeviceList {
        workspaces: &'a [Workspace],
        /// `None` renders as "Select workspace"
        workspace: Option<&'a Workspace>,
        devices: Vec<&'a Device>,
    },
    DeviceDetail {
        workspace: Option<&'a Workspace>,
        device: &'a Device,
    },
    /// The selected device is not in the directory.
    DeviceNotFound,
}

impl ViewModel<'_> {
    /// Navigation back out of this view, if it has one.
    pub fn back_action(&self) -> Option<ViewEvent> {
        match self {
            ViewModel::DeviceDetail { .. } | ViewModel::DeviceNotFound => Some(ViewEvent::BackToDevices),
            ViewModel::Settings => Some(ViewEvent::CloseSettings),
            _ => None,
        }
    }

    /// True when the list should show the first-workspace onboarding card.
    pub fn needs_first_workspace(&self) -> bool {
        matches!(self, ViewModel::DeviceList { workspaces, .. } if workspaces.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn signed_in() -> ViewEvent {
        ViewEvent::SessionChanged {
            initialized: true,
            signed_in: true,
        }
    }

    fn signed_out() -> ViewEvent {
        ViewEvent::SessionChanged {
            initialized: true,
            signed_in: false,
        }
    }

    fn workspace(name: &str) -> Workspace {
        Workspace {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_by: None,
            created_at: None,
        }
    }

    fn device(workspace_id: Id, name: &str) -> Device {
        Device {
            id: Uuid::new_v4(),
            workspace_id,
            device_name: name.to_string(),
            device_label: None,
            status: Some("online".to_string()),
            last_seen_at: None,
            created_at: None,
        }
    }

    fn dashboard() -> ViewController {
        let mut view = ViewController::new();
        view.apply(signed_in());
        view
    }

    #[test]
    fn test_loading_is_initial_and_waits_for_initialization() {
        let mut view = ViewController::new();
        assert_eq!(view.screen(), &Screen::Loading);

        let changed = view.apply(ViewEvent::SessionChanged {
            initialized: false,
            signed_in: true,
        });

        assert!(!changed);
        assert_eq!(view.screen(), &Screen::Loading);
    }

    #[test]
    fn test_loading_ignores_navigation() {
        let mut view = ViewController::new();

        for event in [
            ViewEvent::OpenSettings,
            ViewEvent::CloseSettings,
            ViewEvent::BackToDevices,
            ViewEvent::OpenDevice(Uuid::new_v4()),
            ViewEvent::SelectWorkspace(Uuid::new_v4()),
        ] {
            assert!(!view.apply(event));
        }
        assert_eq!(view.screen(), &Screen::Loading);
    }

    #[test]
    fn test_initialization_picks_screen_by_session() {
        let mut view = ViewController::new();
        view.apply(signed_out());
        assert_eq!(view.screen(), &Screen::Unauthenticated);

        let mut view = ViewController::new();
        view.apply(signed_in());
        assert_eq!(view.screen(), &Screen::Dashboard(Dashboard::default()));
    }

    #[test]
    fn test_sign_in_from_unauthenticated() {
        let mut view = ViewController::new();
        view.apply(signed_out());

        assert!(view.apply(signed_in()));
        assert!(view.screen().is_authenticated());
    }

    #[test]
    fn test_settings_round_trip_keeps_selection() {
        let mut view = dashboard();
        let workspace_id = Uuid::new_v4();
        view.apply(ViewEvent::SelectWorkspace(workspace_id));
        view.apply(ViewEvent::OpenDevice(Uuid::new_v4()));

        view.apply(ViewEvent::OpenSettings);
        assert!(matches!(view.screen(), Screen::Settings(_)));

        view.apply(ViewEvent::CloseSettings);
        match view.screen() {
            Screen::Dashboard(dashboard) => {
                assert_eq!(dashboard.view, DashboardView::DeviceList);
                assert_eq!(dashboard.selection.workspace_id, Some(workspace_id));
            }
            other => panic!("unexpected screen {other:?}"),
        }
    }

    #[test]
    fn test_settings_does_not_depend_on_session_refresh() {
        let mut view = dashboard();
        view.apply(ViewEvent::OpenSettings);

        assert!(!view.apply(signed_in()));
        assert!(matches!(view.screen(), Screen::Settings(_)));
    }

    #[test]
    fn test_sign_out_resets_from_every_sub_view() {
        let detail = {
            let mut view = dashboard();
            view.apply(ViewEvent::OpenDevice(Uuid::new_v4()));
            view
        };
        let settings = {
            let mut view = dashboard();
            view.apply(ViewEvent::OpenSettings);
            view
        };

        for mut view in [dashboard(), detail, settings] {
            view.apply(signed_out());
            assert_eq!(view.screen(), &Screen::Unauthenticated);

            view.apply(signed_in());
            assert_eq!(view.screen(), &Screen::Dashboard(Dashboard::default()));
        }
    }

    #[test]
    fn test_open_device_and_back() {
        let mut view = dashboard();
        let workspace_id = Uuid::new_v4();
        let device_id = Uuid::new_v4();
        view.apply(ViewEvent::SelectWorkspace(workspace_id));

        view.apply(ViewEvent::OpenDevice(device_id));
        assert_eq!(
            view.screen(),
            &Screen::Dashboard(Dashboard {
                view: DashboardView::DeviceDetail,
                selection: Selection {
                    workspace_id: Some(workspace_id),
                    device_id: Some(device_id),
                },
            })
        );

        view.apply(ViewEvent::BackToDevices);
        assert_eq!(
            view.selection(),
            Some(&Selection {
                workspace_id: Some(workspace_id),
                device_id: None,
            })
        );
    }

    #[test]
    fn test_resolve_filters_devices_by_workspace() {
        let kitchen = workspace("Kitchen");
        let bedroom = workspace("Bedroom");
        let cache = DirectoryCache::from_parts(
            vec![kitchen.clone(), bedroom.clone()],
            vec![
                device(kitchen.id, "Counter strip"),
                device(bedroom.id, "Bedside strip"),
                device(Uuid::new_v4(), "Orphan strip"),
            ],
        );

        let mut view = dashboard();
        view.apply(ViewEvent::SelectWorkspace(kitchen.id));

        match view.resolve(&cache) {
            ViewModel::DeviceList {
                workspace, devices, ..
            } => {
                assert_eq!(workspace, Some(&kitchen));
                assert_eq!(devices.len(), 1);
                assert!(devices.iter().all(|d| d.workspace_id == kitchen.id));
            }
            other => panic!("unexpected view model {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_workspace_selects_none() {
        let cache = DirectoryCache::from_parts(vec![workspace("Kitchen")], vec![]);
        let mut view = dashboard();
        view.apply(ViewEvent::SelectWorkspace(Uuid::new_v4()));

        assert_eq!(
            view.resolve(&cache),
            ViewModel::DeviceList {
                workspaces: cache.workspaces(),
                workspace: None,
                devices: vec![],
            }
        );
    }

    #[test]
    fn test_resolve_missing_device_offers_way_back() {
        let cache = DirectoryCache::default();
        let mut view = dashboard();
        view.apply(ViewEvent::OpenDevice(Uuid::new_v4()));

        let model = view.resolve(&cache);
        assert_eq!(model, ViewModel::DeviceNotFound);

        let back = model.back_action().unwrap();
        view.apply(back);
        assert!(matches!(
            view.screen(),
            Screen::Dashboard(Dashboard {
                view: DashboardView::DeviceList,
                ..
            })
        ));
        assert!(view.resolve(&cache).needs_first_workspace());
    }

    #[test]
    fn test_resolve_device_detail() {
        let kitchen = workspace("Kitchen");
        let strip = device(kitchen.id, "Counter strip");
        let cache = DirectoryCache::from_parts(vec![kitchen.clone()], vec![strip.clone()]);
        let mut view = dashboard();
        view.apply(ViewEvent::SelectWorkspace(kitchen.id));
        view.apply(ViewEvent::OpenDevice(strip.id));

        assert_eq!(
            view.resolve(&cache),
            ViewModel::DeviceDetail {
                workspace: Some(&kitchen),
                device: &strip,
            }
        );
    }
}
