// SPDX-License-Identifier: GPL-3.0-only
use std::time::Duration;

use crate::cluster::GridSettings;
use crate::config::{Config, StoreBackend};
use crate::registry::models::Coordinate;
use crate::session::{SessionHandle, SessionSettings, SessionView};

/// Upper bound for any wait on the session loop in tests
const VIEW_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a test configuration backed by the in-memory store
pub fn create_test_config() -> Config {
    use std::net::SocketAddr;
    use std::str::FromStr;

    Config {
        store_backend: StoreBackend::Memory,
        store_url: "http://localhost:9000".to_string(),
        store_auth_token: None,
        collection: "quests".to_string(),
        reconnect_delay_ms: 10,
        local_api_bind: SocketAddr::from_str("127.0.0.1:0").unwrap(), // Use port 0 to auto-assign
        default_center_lat: 34.098907,
        default_center_lng: -118.327759,
        default_zoom: 10,
        cluster_grid_size: 60.0,
        cluster_max_zoom: 16,
        log_level: "error".to_string(), // Reduce log noise in tests
        log_json: false,
    }
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        collection: "quests".to_string(),
        center: Coordinate::new(34.098907, -118.327759),
        zoom: 10,
        grid: GridSettings::default(),
    }
}

/// Wait until the published view satisfies `pred`, panicking after a timeout
pub async fn wait_for_view<F>(handle: &SessionHandle, pred: F) -> SessionView
where
    F: Fn(&SessionView) -> bool,
{
    let mut views = handle.subscribe_view();
    let wait = async {
        loop {
            {
                let view = views.borrow_and_update();
                if pred(&view) {
                    return view.clone();
                }
            }
            views.changed().await.expect("session view channel closed");
        }
    };
    tokio::time::timeout(VIEW_TIMEOUT, wait)
        .await
        .expect("timed out waiting for session view")
}

#[test]
fn test_config_matches_settings() {
    let config = create_test_config();
    assert_eq!(SessionSettings::from_config(&config), test_settings());
}
