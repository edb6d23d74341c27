//! Page scraper stages: world list, character links, character detail.
//!
//! Parsing is synchronous because `scraper::Html` is `!Send`; each async stage
//! fetches, then hands the body to a parse function that owns the DOM for its
//! whole lifetime, so no document is ever held across an `.await`.
//!
//! Failure handling differs per stage and callers rely on it:
//! `list_worlds` and `list_character_links` answer `None` when there is
//! nothing usable, while `scrape_detail` always answers a record, filling in
//! sentinels instead.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{CrawlConfig, SelectorProfile};
use crate::transport::PageTransport;
use crate::types::{
    CharacterDetail, CharacterPageLink, CrawlError, WorldInfo, ZenyResult, UNKNOWN_PLACEHOLDER,
};

fn selector(css: &str) -> ZenyResult<Selector> {
    Selector::parse(css).map_err(|e| CrawlError::Selector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Whitespace-collapsed text content, like `HTMLOptionElement.text`.
fn collapsed_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Read the world options from a character page.
///
/// `None` when the world selector is missing. An option without a `value`
/// attribute uses its label.
pub fn parse_world_options(html: &str, profile: &SelectorProfile) -> ZenyResult<Option<Vec<WorldInfo>>> {
    let select_sel = selector(&profile.world_select)?;
    let option_sel = selector("option")?;
    let document = Html::parse_document(html);

    let Some(select) = document.select(&select_sel).next() else {
        return Ok(None);
    };

    let worlds = select
        .select(&option_sel)
        .map(|opt| {
            let text = collapsed_text(&opt);
            let value = opt.value().attr("value").map(str::to_string).unwrap_or_else(|| text.clone());
            WorldInfo { value, text }
        })
        .collect();

    Ok(Some(worlds))
}

/// Extract character links from a world listing page.
///
/// Relative hrefs are resolved against `page_url`. `None` when nothing matched.
pub fn parse_character_links(
    html: &str,
    page_url: &str,
    world: &WorldInfo,
    profile: &SelectorProfile,
) -> ZenyResult<Option<Vec<CharacterPageLink>>> {
    let link_sel = selector(&profile.character_links)?;
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    let links: Vec<CharacterPageLink> = document
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| {
            let absolute = base
                .as_ref()
                .and_then(|b| b.join(href).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| href.to_string());
            CharacterPageLink::new(world.clone(), absolute)
        })
        .collect();

    Ok(if links.is_empty() { None } else { Some(links) })
}

/// Read name and balance from a detail page; missing cells become the placeholder.
pub fn parse_character_detail(
    html: &str,
    link: &CharacterPageLink,
    profile: &SelectorProfile,
) -> ZenyResult<CharacterDetail> {
    let name_sel = selector(&profile.character_name)?;
    let zeny_sel = selector(&profile.zeny)?;
    let document = Html::parse_document(html);

    let name = first_text(&document, &name_sel).unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());
    let zeny = first_text(&document, &zeny_sel).unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());

    Ok(CharacterDetail::scraped(link.clone(), name, zeny))
}

// ── Stages ───────────────────────────────────────────────────────────────────

/// The three crawl stages bound to one selector profile and config.
pub struct PageScraper {
    config: CrawlConfig,
    profile: SelectorProfile,
}

impl PageScraper {
    pub fn new(config: CrawlConfig) -> ZenyResult<Self> {
        let profile = config.selector_profile()?;
        Ok(Self { config, profile })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn profile(&self) -> &SelectorProfile {
        &self.profile
    }

    async fn courtesy_pause(&self) {
        let delay = self.config.courtesy_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Worlds offered by the open page. Errors reading the page propagate.
    pub async fn list_worlds(&self, transport: &dyn PageTransport) -> ZenyResult<Option<Vec<WorldInfo>>> {
        let page = transport.current_document().await?;
        let worlds = parse_world_options(&page.body, &self.profile)?;
        match &worlds {
            Some(w) => tracing::info!("found {} world(s) on {}", w.len(), page.url),
            None => tracing::warn!("world selector not found on {}", page.url),
        }
        Ok(worlds)
    }

    /// Character links of one world. Fetch failures and empty pages yield `None`.
    pub async fn list_character_links(
        &self,
        transport: &dyn PageTransport,
        world: &WorldInfo,
    ) -> ZenyResult<Option<Vec<CharacterPageLink>>> {
        if world.value.is_empty() {
            tracing::warn!("world {:?} has an empty value, skipping", world.text);
            return Ok(None);
        }

        let url = self.config.listing_url(&self.profile, &world.value);
        self.courtesy_pause().await;

        let page = match transport.get(&url).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                tracing::warn!("failed to fetch {url}: HTTP {}", page.status);
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!("failed to fetch {url}: {e}");
                return Ok(None);
            }
        };

        let links = parse_character_links(&page.body, &page.url, world, &self.profile)?;
        tracing::info!(
            "world {} ({}): {} character link(s)",
            world.text,
            world.value,
            links.as_ref().map_or(0, Vec::len)
        );
        Ok(links)
    }

    /// Detail of one character. Never fails: a failed fetch yields sentinel fields.
    pub async fn scrape_detail(
        &self,
        transport: &dyn PageTransport,
        link: &CharacterPageLink,
    ) -> CharacterDetail {
        if link.href.is_empty() {
            tracing::warn!("character link in world {} has no href", link.world.text);
            return CharacterDetail::failed(link.clone());
        }

        self.courtesy_pause().await;

        let page = match transport.get(&link.href).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                tracing::warn!("failed to fetch {}: HTTP {}", link.href, page.status);
                return CharacterDetail::failed(link.clone());
            }
            Err(e) => {
                tracing::warn!("failed to fetch {}: {e}", link.href);
                return CharacterDetail::failed(link.clone());
            }
        };

        match parse_character_detail(&page.body, link, &self.profile) {
            Ok(detail) => {
                tracing::debug!(
                    "scraped {}: name={:?} zeny={:?}",
                    link.href,
                    detail.character_name,
                    detail.zeny
                );
                detail
            }
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", link.href);
                CharacterDetail::failed(link.clone())
            }
        }
    }
}
