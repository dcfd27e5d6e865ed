use std::sync::Arc;

use safestrip_client::auth::{AuthForm, AuthMode, AuthOutcome};
use safestrip_client::config::Settings;
use safestrip_client::identity::{GoTrueIdentity, IdentityProvider, MemoryIdentity};
use safestrip_client::storage::UiStateStore;
use safestrip_client::view::ViewModel;
use safestrip_client::{ApiClient, App, SyncBridge};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  signin <email> <password>
  signup <email> <password>
  workspaces | workspace <n> | new-workspace <name>
  devices | open <n> | back | new-device <name> [--label <label>]
  outlets | toggle <outlet>
  settings | close | signout | help | quit";

#[tokio::main]
async fn main() {
    let settings = Arc::new(Settings::new().expect("Failed to load settings."));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level}").into()
        }))
        .init();

    let identity: Arc<dyn IdentityProvider> = match &settings.identity {
        Some(identity) => {
            let gotrue = Arc::new(GoTrueIdentity::new(&identity.url, &identity.anon_key));
            gotrue.start_auto_refresh();
            gotrue
        }
        None => {
            tracing::warn!("no identity provider configured, using in-memory accounts");
            Arc::new(MemoryIdentity::new())
        }
    };

    let bridge = SyncBridge::mount(identity);
    let api = ApiClient::with_timeout(&settings.api_base_url(), settings.api_timeout())
        .with_session(bridge.mirror());
    tracing::info!("using backend at {}", api.base_url());

    let mut app = App::with_bridge(bridge, Arc::new(api))
        .with_store(UiStateStore::new(&settings.storage.path))
        .await;

    app.mirror().initialized().await;
    app.sync_session().await;
    show(&app).await;

    let mut mirror = app.mirror();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !execute(&mut app, line.trim()).await {
                        break;
                    }
                    show(&app).await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("failed to read input: {}", e);
                    break;
                }
            },
            alive = mirror.changed() => {
                if !alive {
                    break;
                }
                if app.sync_session().await {
                    show(&app).await;
                }
            }
        }
    }
}

/// Runs one command line. Returns `false` to quit.
async fn execute(app: &mut App, line: &str) -> bool {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "help" => println!("{HELP}"),
        "signin" | "signup" => {
            let mode = match command {
                "signin" => AuthMode::SignIn,
                _ => AuthMode::SignUp,
            };
            let password = args.get(1).copied().unwrap_or_default();
            let mut form = AuthForm::new();
            form.mode = mode;
            form.email = args.first().copied().unwrap_or_default().to_string();
            form.password = password.to_string();
            form.confirm_password = password.to_string();

            match form.submit(app.identity().as_ref()).await {
                Ok(AuthOutcome::SignedIn(session)) => {
                    tracing::info!("signed in as {}", session.user_id());
                }
                Ok(AuthOutcome::AwaitingConfirmation) => {
                    println!("Check your email to confirm the account, then sign in.");
                }
                Err(e) => println!("{e}"),
            }
        }
        "signout" => {
            if let Err(e) = app.sign_out().await {
                println!("{e}");
            }
        }
        "settings" => {
            app.open_settings();
        }
        "close" => {
            app.close_settings();
        }
        "workspaces" | "devices" => {}
        "workspace" => {
            let id = match index_arg(args.first()) {
                Some(index) => app.directory().read().await.workspaces().get(index).map(|w| w.id),
                None => None,
            };
            match id {
                Some(id) => report(app.select_workspace(id).await),
                None => println!("No such workspace"),
            }
        }
        "new-workspace" => report(app.create_workspace(rest).await.map(|_| ())),
        "new-device" => {
            let (name, label) = device_args(rest);
            report(app.create_device(name, label).await.map(|_| ()));
        }
        "open" => {
            let id = match (app.selected_workspace_id(), index_arg(args.first())) {
                (Some(workspace_id), Some(index)) => {
                    let cache = app.directory().read().await;
                    cache.devices_for(workspace_id).get(index).map(|d| d.id)
                }
                _ => None,
            };
            match id {
                Some(id) => {
                    app.open_device(id);
                }
                None => println!("No such device"),
            }
        }
        "back" => {
            app.back_to_devices();
        }
        "outlets" => {}
        "toggle" => match args.first().and_then(|id| id.parse::<u8>().ok()) {
            Some(id) if app.toggle_outlet(id).is_some() => {}
            _ => println!("No such outlet"),
        },
        other => println!("Unknown command `{other}`, try `help`"),
    }

    true
}

/// Parses a 1-based list position.
fn index_arg(arg: Option<&&str>) -> Option<usize> {
    arg?.parse::<usize>().ok()?.checked_sub(1)
}

/// Splits `<name> [--label <label>]`; both parts may contain spaces.
fn device_args(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once("--label") {
        Some((name, label)) => (name, Some(label)),
        None => (rest, None),
    }
}

fn report<E: std::fmt::Display>(result: Result<(), E>) {
    if let Err(e) = result {
        println!("{e}");
    }
}

async fn show(app: &App) {
    if let Some(error) = app.directory().error().await {
        println!("! {error}");
        app.directory().clear_error().await;
    }

    let outlets = app.outlets();
    let email = app
        .mirror()
        .snapshot()
        .user()
        .and_then(|user| user.email.clone())
        .unwrap_or_default();

    app.render(|model| match model {
        ViewModel::Loading => println!("Loading..."),
        ViewModel::SignIn => println!("Signed out. `signin` or `signup` to continue."),
        ViewModel::Settings => println!("Settings\n  signed in as {email}\n  `signout` or `close`"),
        ViewModel::DeviceList {
            workspaces,
            workspace,
            devices,
        } => {
            if workspaces.is_empty() {
                println!("Create your first workspace with `new-workspace <name>`");
                return;
            }
            for (i, w) in workspaces.iter().enumerate() {
                let marker = if Some(w.id) == workspace.map(|w| w.id) { "*" } else { " " };
                println!("{marker} {}. {}", i + 1, w.name);
            }
            match workspace {
                Some(workspace) => {
                    println!("Devices in {}:", workspace.name);
                    if devices.is_empty() {
                        println!("  none yet, `new-device <name> [--label <label>]`");
                    }
                    for (i, device) in devices.iter().enumerate() {
                        println!(
                            "  {}. {} {} [{}]",
                            i + 1,
                            device.device_name,
                            device.device_label.as_deref().unwrap_or(""),
                            device.status().label()
                        );
                    }
                }
                None => println!("Select workspace"),
            }
        }
        ViewModel::DeviceDetail { device, .. } => {
            println!("{} [{}]", device.device_name, device.status().label());
            if let Some(bank) = &outlets {
                println!(
                    "  {} ({} of {} active)",
                    bank.status().title(),
                    bank.active_count(),
                    bank.outlets().len()
                );
                for outlet in bank.outlets() {
                    println!(
                        "  {} {:>4} {:5.1}C {:4.2}A",
                        outlet.name,
                        if outlet.power_on { "on" } else { "off" },
                        outlet.temperature,
                        outlet.current
                    );
                }
            }
        }
        ViewModel::DeviceNotFound => println!("Device not found. `back` to devices."),
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_args_keep_spaces() {
        assert_eq!(device_args("Counter strip"), ("Counter strip", None));
        assert_eq!(
            device_args("Counter strip --label Left wall"),
            ("Counter strip ", Some(" Left wall"))
        );
    }

    #[test]
    fn test_index_arg_is_one_based() {
        assert_eq!(index_arg(Some(&"1")), Some(0));
        assert_eq!(index_arg(Some(&"0")), None);
        assert_eq!(index_arg(None), None);
    }
}
