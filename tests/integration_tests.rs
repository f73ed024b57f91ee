//! Integration tests for the horizon-news panel
//!
//! These tests drive the full reload cycle: settings → fetch → parse →
//! distribute, against feeds served by a local mock server.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use horizon_news::config::FeedUrlSource;
    use horizon_news::panel::{PanelHandle, PanelSnapshot, PanelState};

    pub fn rss_feed(prefix: &str, count: usize) -> String {
        let items: String = (0..count)
            .map(|i| {
                format!(
                    "<item><title>{prefix} story {i}</title>\
                     <link>https://{prefix}.example.com/{i}</link>\
                     <description>About {prefix} &lt;img src=\"x\"&gt;</description></item>"
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{prefix}</title>{items}</channel></rss>"#
        )
    }

    pub fn atom_feed(prefix: &str, count: usize) -> String {
        let entries: String = (0..count)
            .map(|i| {
                format!(
                    r#"<entry><title>{prefix} entry {i}</title><link href="https://{prefix}.example.org/{i}"/></entry>"#
                )
            })
            .collect();
        format!(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>{prefix}</title>{entries}</feed>"#)
    }

    /// Hands out a different URL list on every reload.
    pub struct ScriptedSource {
        cycles: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedSource {
        pub fn new(mut cycles: Vec<Vec<String>>) -> Arc<Self> {
            cycles.reverse();
            Arc::new(Self {
                cycles: Mutex::new(cycles),
            })
        }
    }

    impl FeedUrlSource for ScriptedSource {
        fn load_feed_urls(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.cycles.lock().unwrap().pop().unwrap_or_default())
        }
    }

    pub async fn wait_until_settled(handle: &PanelHandle, generation: u64) -> PanelSnapshot {
        let mut rx = handle.subscribe();
        let snapshot = tokio::time::timeout(
            Duration::from_secs(10),
            rx.wait_for(|s| s.generation == generation && s.state == PanelState::Idle),
        )
        .await
        .expect("panel did not settle in time")
        .expect("panel stopped");
        snapshot.clone()
    }

    pub fn all_headlines(snapshot: &PanelSnapshot) -> Vec<horizon_news::headline::Headline> {
        snapshot
            .columns
            .iter()
            .flat_map(|column| column.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use horizon_news::config::{Config, FeedUrlSource, SettingsFile};
    use horizon_news::panel::RenderPolicy;

    #[test]
    fn test_load_actual_news_config() {
        // Test loading the shipped news.toml from the project
        let config = tokio_test::assert_ok!(Config::load("news.toml"));

        assert!(!config.urls.is_empty(), "news.toml should have at least one feed");
        assert_eq!(config.render, RenderPolicy::EveryArrival);
    }

    #[test]
    fn test_settings_file_source() {
        let toml_content = r#"
            render = "when_settled"

            [[URLs]]
            url = "https://old.reddit.com/r/rust/.rss"

            [[URLs]]
            url = "https://news.example.com/feed"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let source = SettingsFile::new(temp_file.path());
        let urls = source.load_feed_urls().unwrap();

        assert_eq!(
            urls,
            vec![
                "https://old.reddit.com/r/rust/.rss",
                "https://news.example.com/feed"
            ]
        );
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::common::*;
    use horizon_news::config::Config;
    use horizon_news::distributor::MAX_DISPLAYED;
    use horizon_news::fetcher::Fetcher;
    use horizon_news::label::derive_label;
    use horizon_news::panel::{Panel, RenderPolicy};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn config_for(urls: &[String]) -> Config {
        let content: String = urls
            .iter()
            .map(|url| format!("[[URLs]]\nurl = \"{}\"\n", url))
            .collect();
        Config::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_mixed_feeds_end_to_end() {
        let server = MockServer::start().await;
        mount(&server, "/rss", rss_feed("rss", 4)).await;
        mount(&server, "/atom", atom_feed("atom", 3)).await;
        mount(&server, "/broken", "<rss><item><title>x</rss>".to_string()).await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let urls: Vec<String> = ["/rss", "/atom", "/broken", "/down"]
            .iter()
            .map(|p| format!("{}{}", server.uri(), p))
            .collect();
        let handle = Panel::spawn(
            Arc::new(config_for(&urls)),
            Fetcher::new().unwrap(),
            RenderPolicy::EveryArrival,
        );

        let snapshot = wait_until_settled(&handle, 1).await;
        let headlines = all_headlines(&snapshot);

        assert_eq!(snapshot.headline_count, 7);
        assert_eq!(headlines.len(), 7);
        assert_eq!(snapshot.pending, 0);

        let rss = headlines.iter().find(|h| h.title == "rss story 2").unwrap();
        assert_eq!(rss.link, "https://rss.example.com/2");
        assert_eq!(rss.description, "About rss ");
        assert_eq!(rss.source_label, derive_label(&urls[0]));

        let atom = headlines.iter().find(|h| h.title == "atom entry 0").unwrap();
        assert_eq!(atom.link, "https://atom.example.org/0");
        assert_eq!(atom.description, "");
    }

    #[tokio::test]
    async fn test_display_capped_across_feeds() {
        let server = MockServer::start().await;
        for route in ["/a", "/b", "/c"] {
            mount(&server, route, rss_feed(&route[1..], 15)).await;
        }
        let urls: Vec<String> = ["/a", "/b", "/c"]
            .iter()
            .map(|p| format!("{}{}", server.uri(), p))
            .collect();

        let handle = Panel::spawn(
            Arc::new(config_for(&urls)),
            Fetcher::new().unwrap(),
            RenderPolicy::WhenSettled,
        );
        let snapshot = wait_until_settled(&handle, 1).await;

        assert_eq!(snapshot.headline_count, 45);
        assert_eq!(snapshot.columns.len(), MAX_DISPLAYED);

        let sizes: Vec<usize> = snapshot.columns.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![9, 9, 8]);

        let unique: HashSet<String> = all_headlines(&snapshot)
            .into_iter()
            .map(|h| h.title)
            .collect();
        assert_eq!(unique.len(), MAX_DISPLAYED);
    }

    #[tokio::test]
    async fn test_no_feeds_configured() {
        let handle = Panel::spawn(
            Arc::new(config_for(&[])),
            Fetcher::new().unwrap(),
            RenderPolicy::EveryArrival,
        );

        let snapshot = wait_until_settled(&handle, 1).await;
        assert!(snapshot.columns.is_empty());
        assert_eq!(snapshot.headline_count, 0);
    }

    #[tokio::test]
    async fn test_reload_replaces_previous_headlines() {
        let server = MockServer::start().await;
        mount(&server, "/first", rss_feed("first", 3)).await;
        mount(&server, "/second", rss_feed("second", 2)).await;

        let source = ScriptedSource::new(vec![
            vec![format!("{}/first", server.uri())],
            vec![format!("{}/second", server.uri())],
        ]);
        let handle = Panel::spawn(source, Fetcher::new().unwrap(), RenderPolicy::EveryArrival);

        let first = wait_until_settled(&handle, 1).await;
        assert_eq!(first.headline_count, 3);

        handle.reload().await.unwrap();
        let second = wait_until_settled(&handle, 2).await;

        assert_eq!(second.headline_count, 2);
        assert!(all_headlines(&second)
            .iter()
            .all(|h| h.title.starts_with("second")));
    }

    #[tokio::test]
    async fn test_results_from_previous_reload_are_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_feed("stale", 5))
                    .set_delay(Duration::from_millis(600)),
            )
            .mount(&server)
            .await;
        mount(&server, "/fast", rss_feed("fresh", 2)).await;

        let source = ScriptedSource::new(vec![
            vec![format!("{}/slow", server.uri())],
            vec![format!("{}/fast", server.uri())],
        ]);
        let handle = Panel::spawn(source, Fetcher::new().unwrap(), RenderPolicy::EveryArrival);

        // Second cycle starts while the slow feed of the first is in flight
        handle.reload().await.unwrap();
        let settled = wait_until_settled(&handle, 2).await;
        assert_eq!(settled.headline_count, 2);

        // Let the stale response arrive
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let after = handle.snapshot();
        assert_eq!(after.generation, 2);
        assert_eq!(after.headline_count, 2);
        assert!(all_headlines(&after)
            .iter()
            .all(|h| h.title.starts_with("fresh")));
    }
}

#[cfg(test)]
mod server_tests {
    use super::common::*;
    use axum::{
        routing::{get, post},
        Router,
    };
    use axum_test::TestServer;
    use horizon_news::config::Config;
    use horizon_news::fetcher::Fetcher;
    use horizon_news::panel::{Panel, PanelHandle, RenderPolicy};
    use horizon_news::routes::{self, AppState};
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn build_app(handle: PanelHandle) -> Router {
        let state = Arc::new(AppState { panel: handle });
        Router::new()
            .route("/", get(routes::index))
            .route("/columns", get(routes::columns))
            .route("/reload", post(routes::reload))
            .route("/reload/status", get(routes::reload_status))
            .route("/api/panel", get(routes::panel_json))
            .route("/health", get(routes::health))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_panel_page_and_reload() {
        let feed_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed("panel", 5)))
            .mount(&feed_server)
            .await;

        let config =
            Config::from_str(&format!("[[URLs]]\nurl = \"{}/rss\"\n", feed_server.uri())).unwrap();
        let handle = Panel::spawn(
            Arc::new(config),
            Fetcher::new().unwrap(),
            RenderPolicy::EveryArrival,
        );
        wait_until_settled(&handle, 1).await;

        let server = TestServer::new(build_app(handle.clone())).unwrap();

        let page = server.get("/").await;
        page.assert_status_ok();
        let html = page.text();
        assert!(html.contains("panel story"));
        assert_eq!(html.matches("class=\"column\"").count(), 3);

        let reload = server.post("/reload").await;
        reload.assert_status_ok();

        let snapshot = wait_until_settled(&handle, 2).await;
        assert_eq!(snapshot.headline_count, 5);

        let json = server.get("/api/panel").await;
        json.assert_status_ok();
        let value: serde_json::Value = json.json();
        assert_eq!(value["generation"], 2);
        assert_eq!(value["headline_count"], 5);
    }

    #[tokio::test]
    async fn test_health() {
        let handle = Panel::spawn(
            Arc::new(Config::from_str("").unwrap()),
            Fetcher::new().unwrap(),
            RenderPolicy::EveryArrival,
        );
        let server = TestServer::new(build_app(handle)).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }
}
