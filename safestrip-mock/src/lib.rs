use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::app::create_app;
use crate::settings::Settings;
use crate::store::MockStore;

pub mod app;
pub mod errors;
pub mod handles;
pub mod settings;
pub mod store;

pub async fn run(settings: &Arc<Settings>) -> std::io::Result<()> {
    let ip_addr = settings
        .server
        .host
        .parse::<IpAddr>()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let address = SocketAddr::from((ip_addr, settings.server.port));

    let listener = TcpListener::bind(&address).await?;
    tracing::info!("listening on {:?}", address);

    serve(listener, MockStore::new()).await
}

/// Serves the mock backend on an already bound listener.
pub async fn serve(listener: TcpListener, store: MockStore) -> std::io::Result<()> {
    axum::serve(listener, create_app(store)).await
}
