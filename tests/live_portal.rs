#![cfg(feature = "live-tests")]

//! Live integration tests against a real portal.
//!
//! Gated behind the `live-tests` feature flag. Requires portal credentials
//! in the environment:
//!
//! - `PORTAL_BASE_URL`
//! - `PORTAL_API_TOKEN`
//!
//! ```bash
//! cargo test --features live-tests --test live_portal -- --nocapture
//! ```

use portal_sync::{Config, MessagesFilter, PortalClient};

/// Skip the test (with a note on stderr) when no credentials are set.
macro_rules! skip_without_credentials {
    () => {
        match (
            std::env::var("PORTAL_BASE_URL"),
            std::env::var("PORTAL_API_TOKEN"),
        ) {
            (Ok(base_url), Ok(api_token)) => (base_url, api_token),
            _ => {
                eprintln!("skipping live test: PORTAL_BASE_URL / PORTAL_API_TOKEN not set");
                return;
            }
        }
    };
}

fn live_config(base_url: String, api_token: String) -> Config {
    let mut config = Config::default();
    config.portal.base_url = base_url;
    config.portal.api_token = Some(api_token);
    config
}

/// List one page of recent messages and fetch the first one by id.
///
/// Exercises authentication, the canonical filter query, pagination
/// parsing and single-message retrieval against the real portal.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_list_and_get_round_trip() {
    let (base_url, api_token) = skip_without_credentials!();
    let config = live_config(base_url, api_token);
    let client = PortalClient::new(&config).expect("failed to build client");

    let filter = MessagesFilter {
        days: Some(30),
        ..Default::default()
    };
    let (messages, pagination) = client
        .list_messages(&filter)
        .await
        .expect("listing failed against the live portal");

    assert!(pagination.current_page >= 1);

    if let Some(first) = messages.first() {
        let fetched = client
            .get_message(&first.id)
            .await
            .expect("get_message failed for a listed id");
        assert_eq!(fetched.id, first.id);
    } else {
        eprintln!("live portal returned no messages in the last 30 days");
    }
}
