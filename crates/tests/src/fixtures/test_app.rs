use std::net::SocketAddr;
use std::sync::Arc;

use cofoundry_api::{build_router, state::AppState};
use cofoundry_config::{AppSettings, DatabaseSettings, JwtSettings, RelaySettings, Settings};
use cofoundry_services::MemoryStore;
use tokio::net::TcpListener;

/// A running test application over an in-memory realtime store. No
/// external services required; each spawn gets fully isolated state.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub settings: Settings,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let settings = test_settings();
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), settings.clone());
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            store,
            state,
            settings,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }
}

fn test_settings() -> Settings {
    Settings {
        app: AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: DatabaseSettings {
            url: "mongodb://localhost:27017".to_string(),
            name: "cofoundry_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
        },
        jwt: JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            issuer: "cofoundry".to_string(),
        },
        relay: RelaySettings {
            empty_feed_warn_secs: 30,
            // No pause before the single retry in tests.
            respond_retry_delay_secs: 0,
        },
    }
}
