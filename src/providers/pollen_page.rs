//! Scraped pollen and weather page
//!
//! The page has no API contract, so every value is located through the alt
//! text of a nearby icon rather than CSS classes or positions. From the icon
//! the extractor walks up to its container and over to the next element,
//! whose trimmed text is the value. Each field is read on its own; a missing
//! anchor leaves that field empty and nothing else.

use reqwest_middleware::ClientWithMiddleware;
use scraper::{ElementRef, Html};
use tracing::{info, instrument, warn};

use super::get_text;
use crate::config::ProvidersConfig;
use crate::models::{
    PollenCardData, PollenIndex, PollenPageResult, PollenType, PollenWeather, Provider,
};

const INDEX_ANCHOR: &str = "Pollen Index Level";
const POLLEN_KINDS: [&str; 3] = ["Tree", "Grass", "Weed"];
const TEMPERATURE_ANCHOR: &str = "Temperature icon";
const WIND_ANCHOR: &str = "Wind icon";
const HUMIDITY_ANCHOR: &str = "Humidity icon";
const WIND_DIRECTION_ANCHOR: &str = "Wind direction icon";

/// One method per field group of the pollen card
pub trait PageExtractor {
    fn index(&self) -> PollenIndex;
    fn pollen_types(&self) -> Vec<PollenType>;
    fn weather(&self) -> PollenWeather;

    fn card(&self) -> PollenCardData {
        PollenCardData {
            index: self.index(),
            types: self.pollen_types(),
            weather: self.weather(),
        }
    }
}

/// [`PageExtractor`] over a parsed HTML document
pub struct HtmlPageExtractor {
    document: Html,
}

impl HtmlPageExtractor {
    #[must_use]
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// First `img` whose alt text matches, ignoring case and padding
    fn anchor(&self, alt: &str) -> Option<ElementRef<'_>> {
        self.document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "img")
            .find(|el| {
                el.value()
                    .attr("alt")
                    .is_some_and(|text| text.trim().eq_ignore_ascii_case(alt))
            })
    }

    /// Icon -> parent container -> next element sibling -> text
    fn value_near(&self, alt: &str) -> Option<String> {
        let icon = self.anchor(alt)?;
        let container = icon.parent()?;
        let value = container
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()?;
        let text = normalize_text(value.text());
        (!text.is_empty()).then_some(text)
    }

    fn icon_src(&self, alt: &str) -> Option<String> {
        self.anchor(alt)?
            .value()
            .attr("src")
            .map(|src| src.trim().to_string())
    }

    fn wind_rotation(&self) -> Option<String> {
        let style = self.anchor(WIND_DIRECTION_ANCHOR)?.value().attr("style")?;
        transform_value(style)
    }
}

impl PageExtractor for HtmlPageExtractor {
    fn index(&self) -> PollenIndex {
        PollenIndex {
            level: self.value_near(INDEX_ANCHOR).unwrap_or_default(),
            image: self.icon_src(INDEX_ANCHOR).unwrap_or_default(),
        }
    }

    fn pollen_types(&self) -> Vec<PollenType> {
        POLLEN_KINDS
            .iter()
            .map(|kind| PollenType {
                kind: (*kind).to_string(),
                level: self.value_near(kind).unwrap_or_default(),
                icon: self.icon_src(kind).unwrap_or_default(),
            })
            .collect()
    }

    fn weather(&self) -> PollenWeather {
        PollenWeather {
            temperature: self.value_near(TEMPERATURE_ANCHOR).unwrap_or_default(),
            wind: self.value_near(WIND_ANCHOR).unwrap_or_default(),
            humidity: self.value_near(HUMIDITY_ANCHOR).unwrap_or_default(),
            temperature_icon: self.icon_src(TEMPERATURE_ANCHOR).unwrap_or_default(),
            wind_icon: self.icon_src(WIND_ANCHOR).unwrap_or_default(),
            humidity_icon: self.icon_src(HUMIDITY_ANCHOR).unwrap_or_default(),
            wind_rotation: self.wind_rotation().unwrap_or_default(),
        }
    }
}

/// Parse a pollen page into card data. Never fails; absent elements yield
/// empty strings.
#[must_use]
pub fn parse_pollen_page(html: &str) -> PollenCardData {
    HtmlPageExtractor::parse(html).card()
}

fn normalize_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of the `transform` declaration in an inline style
fn transform_value(style: &str) -> Option<String> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("transform"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Client for the pollen forecast page
pub struct PollenPageClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl PollenPageClient {
    pub fn new(client: ClientWithMiddleware, config: &ProvidersConfig) -> Self {
        Self {
            client,
            base_url: config.pollen_page_base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn page_url(&self, country: &str, state: &str, county_slug: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&country.to_ascii_lowercase()),
            urlencoding::encode(&state.to_ascii_lowercase()),
            urlencoding::encode(county_slug)
        )
    }

    /// Fetch and scrape a county's page. Only a network failure, a non-2xx
    /// status or an empty body produce the failure shape.
    #[instrument(skip(self))]
    pub async fn fetch(&self, country: &str, state: &str, county_slug: &str) -> PollenPageResult {
        let url = self.page_url(country, state, county_slug);

        let body = match get_text(self.client.get(&url)).await {
            Ok(body) if !body.trim().is_empty() => body,
            Ok(_) => {
                warn!("{} returned an empty page", Provider::PollenPage);
                return PollenPageResult::failure("Pollen page was empty");
            }
            Err(err) => {
                warn!("{} page unavailable: {}", Provider::PollenPage, err);
                return PollenPageResult::failure(format!("Failed to fetch pollen page: {err}"));
            }
        };

        let card = parse_pollen_page(&body);
        info!(
            "{} page scraped, index level '{}'",
            Provider::PollenPage,
            card.index.level
        );
        PollenPageResult::success(card)
    }
}
