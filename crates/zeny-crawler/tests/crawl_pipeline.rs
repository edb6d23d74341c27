//! End-to-end crawl over a mock character site.
//!
//! The mock serves a world selector on the open page, one listing page per
//! world and one detail page per character. Runs go through the HTTP
//! transport, the scraper stages, the session gate and a JSON file store.

use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zeny_crawler::{
    CrawlConfig, CrawlError, CrawlOutcome, CrawlSession, DisplayPreference, HttpTransport,
    JsonFileStore, PageScraper, ResultStore, ScraperAutomation, FAILURE_SENTINEL,
};

// ── Fixtures ──

const WORLD_FORM: &str = r#"
<form name="worldchange" action="/character">
  <select name="world">
    <option value="1">Alpha</option>
    <option value="2">Beta</option>
    <option value="3">Gamma</option>
  </select>
</form>"#;

fn listing_page(hrefs: &[&str]) -> String {
    let items: String = hrefs
        .iter()
        .map(|h| format!(r#"<li><dl><dt><a href="{h}">char</a></dt><dd>Lv 99</dd></dl></li>"#))
        .collect();
    format!(
        r#"<html><body><main><article>{WORLD_FORM}
<div><div class="listSet"><ul>{items}</ul></div></div>
</article></main></body></html>"#
    )
}

fn detail_page(name: &str, zeny: &str) -> String {
    format!(
        r#"<html><body><main><article><section>
<div class="base"><table><tbody>
  <tr><th>Name</th><td>{name}</td></tr>
  <tr><th>Job</th><td>Merchant</td></tr>
</tbody></table></div>
<div class="info"><table><tbody>
  <tr><th>Base Lv</th><td>99</td></tr>
  <tr><th>Zeny</th><td>{zeny}</td></tr>
</tbody></table></div>
</section></article></main></body></html>"#
    )
}

async fn mount_html(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Alpha has one character, Beta none, Gamma two with one broken page.
async fn mock_site() -> MockServer {
    let server = MockServer::start().await;

    mount_html(&server, "/character/1/0", 200, listing_page(&["/detail/101"])).await;
    mount_html(&server, "/character/2/0", 200, listing_page(&[])).await;
    mount_html(
        &server,
        "/character/3/0",
        200,
        listing_page(&["/detail/301", "/detail/302"]),
    )
    .await;

    mount_html(&server, "/detail/101", 200, detail_page("Poring", "12,345 Zeny")).await;
    mount_html(&server, "/detail/301", 500, "oops".to_string()).await;
    mount_html(&server, "/detail/302", 200, detail_page("Lunatic", "2,500,000 Zeny")).await;

    server
}

fn config_for(server: &MockServer) -> CrawlConfig {
    CrawlConfig {
        base_url: server.uri(),
        courtesy_delay_ms: 0,
        page_pattern: Some(r"^http://127\.0\.0\.1:\d+/character/\w+/\d+$".to_string()),
        ..CrawlConfig::default()
    }
}

fn automation_for(
    server: &MockServer,
    config: &CrawlConfig,
    open_path: &str,
) -> ScraperAutomation<HttpTransport> {
    let transport = HttpTransport::new(config, format!("{}{open_path}", server.uri())).unwrap();
    ScraperAutomation::new(PageScraper::new(config.clone()).unwrap(), transport)
}

fn file_session(config: CrawlConfig, dir: &TempDir) -> CrawlSession {
    let store = JsonFileStore::open(&dir.path().join("storage.json")).unwrap();
    let session = CrawlSession::new(config, ResultStore::new(Arc::new(store))).unwrap();
    session.start().unwrap();
    session
}

// ── Tests ──

#[tokio::test]
async fn test_full_crawl_groups_worlds_and_keeps_failures() {
    let server = mock_site().await;
    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let session = file_session(config.clone(), &dir);

    let outcome = session
        .crawl(&automation_for(&server, &config, "/character/1/0"))
        .await
        .unwrap();
    let CrawlOutcome::Completed(result) = outcome else {
        panic!("expected a completed crawl");
    };

    // Beta had no characters and is absent; the broken page is kept as a sentinel.
    let worlds: Vec<_> = result.iter().map(|d| d.world().text.as_str()).collect();
    assert_eq!(worlds, ["Alpha", "Gamma", "Gamma"]);
    assert!(result.entries[1].is_failure());
    assert_eq!(result.entries[1].zeny.as_deref(), Some(FAILURE_SENTINEL));
    assert_eq!(
        result.entries[0].link.href,
        format!("{}/detail/101", server.uri())
    );

    let rendering = session.render();
    let alpha = rendering.group("1").unwrap();
    assert_eq!(alpha.total.text(), "12,345 Zeny");
    assert_eq!(alpha.entries.len(), 1);
    assert_eq!(alpha.entries[0].amount.text(), "12,345 Zeny");
    assert_eq!(alpha.entries[0].character_name, "Poring");
    assert!(rendering.group("2").is_none());

    let gamma = rendering.group("3").unwrap();
    assert_eq!(gamma.total.text(), "2,500,000 Zeny");
    assert_eq!(gamma.entries[0].amount.text(), FAILURE_SENTINEL);

    session.set_display_preference(DisplayPreference::Short).unwrap();
    assert_eq!(session.render().group("3").unwrap().total.text(), "2M Zeny");
}

#[tokio::test]
async fn test_result_survives_reopen() {
    let server = mock_site().await;
    let config = config_for(&server);
    let dir = TempDir::new().unwrap();

    {
        let session = file_session(config.clone(), &dir);
        session
            .crawl(&automation_for(&server, &config, "/character/3/0"))
            .await
            .unwrap();
    }

    let reopened = file_session(config, &dir);
    assert_eq!(reopened.last_result().len(), 3);
    assert!(reopened.last_run_ms().is_some());
    assert!(!reopened.is_ready());
    assert!(reopened.has_live_timer());
}

#[tokio::test]
async fn test_second_crawl_within_cooldown_is_refused() {
    let server = mock_site().await;
    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let session = file_session(config.clone(), &dir);
    let automation = automation_for(&server, &config, "/character/1/0");

    session.crawl(&automation).await.unwrap();
    let requests_after_first = server.received_requests().await.unwrap().len();

    let err = session.crawl(&automation).await.unwrap_err();
    assert!(matches!(err, CrawlError::CoolingDown { .. }));
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first
    );
}

#[tokio::test]
async fn test_non_character_page_is_refused() {
    let server = mock_site().await;
    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let session = file_session(config.clone(), &dir);

    let err = session
        .crawl(&automation_for(&server, &config, "/detail/101"))
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlError::NotCharacterPage(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(session.is_ready());
}

#[tokio::test]
async fn test_page_without_world_selector_stops_without_cooldown() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/character/1/0",
        200,
        "<html><body><main><article>maintenance</article></main></body></html>".to_string(),
    )
    .await;
    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let session = file_session(config.clone(), &dir);

    let outcome = session
        .crawl(&automation_for(&server, &config, "/character/1/0"))
        .await
        .unwrap();
    assert_eq!(outcome, CrawlOutcome::NoWorlds);
    assert!(session.is_ready());
    assert!(session.last_result().is_empty());
}
