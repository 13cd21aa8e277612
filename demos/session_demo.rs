//! Session lifecycle demo against a running backend
//!
//! Usage:
//!   REALTY_API_URL=http://localhost:8000 \
//!   REALTY_EMAIL=agent@example.com REALTY_PASSWORD=secret \
//!   cargo run --example session_demo

use realty_auth_client::{
    logging, ApiClient, AuthContext, ClientConfig, FileStore, ResourceClient, Role,
    SessionManager, TokenStore, TracingNavigator,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("info");

    let config = ClientConfig::from_env()?;
    let store_path = std::env::var("REALTY_TOKEN_FILE")
        .unwrap_or_else(|_| "realty-session.json".to_string());
    let role: Role = std::env::var("REALTY_ROLE")
        .unwrap_or_else(|_| "agent".to_string())
        .parse()?;

    println!("=== Realty Session Demo ===");
    println!("Backend: {}", config.api_base_url);
    println!("Token file: {store_path}");
    println!("Role: {role}");
    println!();

    let store = TokenStore::new(Arc::new(FileStore::open(&store_path)?));
    let session = SessionManager::new(config, store, Arc::new(TracingNavigator))?;
    let auth = AuthContext::new(session.clone());

    let state = auth.bootstrap().await;
    match &state.user {
        Some(user) => println!("✓ Restored session for {:?}", user.email),
        None => {
            let email = std::env::var("REALTY_EMAIL")?;
            let password = std::env::var("REALTY_PASSWORD")?;
            let user = auth.login(&email, &password, role).await?;
            println!("✓ Logged in as {:?}", user.email);
        }
    }
    println!();

    // Keep the session warm while the demo runs; logout stops it
    auth.start_refresher();

    let resources = ResourceClient::new(ApiClient::new(session.clone()));
    match role {
        Role::Agent => {
            let deals = resources.list_deals(Some("open")).await?;
            println!("Open deals: {deals}");
        }
        Role::Client => {
            let dashboard = resources.client_portal("dashboard").await?;
            println!("Client dashboard: {dashboard}");
        }
    }

    auth.logout();
    println!();
    println!("Done!");

    Ok(())
}
