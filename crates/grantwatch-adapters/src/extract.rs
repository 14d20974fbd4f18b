//! Heuristic extraction of opportunity records from arbitrary HTML
//! listing pages.
//!
//! No two foundation sites share markup conventions, so container
//! discovery runs a prioritized strategy chain: structural "card"
//! selectors first, then a scan for opportunity-flavored headings whose
//! parent becomes the candidate container. Every candidate then passes
//! two independent gates (mission relevance and completeness) before
//! it becomes a raw record.

use std::collections::HashSet;
use std::sync::LazyLock;

use grantwatch_core::{parse, RawRecord, Source};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Structural selectors tried in order; the first one that matches at
/// least once wins the page.
const CONTAINER_SELECTORS: &[&str] = &[
    "div.grant-listing",
    ".grant-card",
    ".opportunity-card",
    "div.opportunity",
    "li.grant",
    "article.grant",
    ".views-row",
    ".funding-opportunity",
    ".grant-item",
    "article",
];

/// A heading mentioning one of these marks its parent as a candidate
/// container when no structural selector matched.
const OPPORTUNITY_HEADING_KEYWORDS: &[&str] = &[
    "grant",
    "funding",
    "rfp",
    "award",
    "opportunit",
    "fellowship",
    "proposal",
];

/// Navigational phrases that disqualify a whole container when they are
/// the entire title.
const GENERIC_TITLES: &[&str] = &[
    "click here",
    "apply now",
    "apply here",
    "learn more",
    "read more",
    "login",
    "log in",
    "sign in",
    "sign up",
    "home",
    "menu",
    "search",
    "contact us",
    "about us",
    "view all",
    "see all",
    "next",
    "previous",
    "back",
];

/// Link substrings that mark a container as non-opportunity content.
const LINK_DENYLIST: &[&str] = &[
    ".pdf",
    "/help",
    "/about",
    "/contact",
    "login",
    "signin",
    "sign-in",
    "javascript:",
    "mailto:",
    "/privacy",
    "/terms",
];

const MIN_TITLE_CHARS: usize = 15;
/// A link that only points back at the listing page is kept only when
/// the title is unusually specific.
const SPECIFIC_TITLE_CHARS: usize = 30;
const COMPLETE_TITLE_CHARS: usize = 30;
const COMPLETE_DESCRIPTION_CHARS: usize = 100;
/// Upper bound for "first short paragraph/div" title candidates.
const SHORT_BLOCK_MAX_CHARS: usize = 120;

static DATE_CANDIDATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2},\s*\d{4}",
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        r"\b\d{4}-\d{2}-\d{2}\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static date pattern parses"))
    .collect()
});

static AMOUNT_CANDIDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*\d[\d,]*(?:\.\d{1,2})?").expect("static amount pattern parses"));

/// Mission-relevance vocabulary, loaded from `rules/relevance.yaml` by
/// the pipeline. Matching is case-insensitive substring.
#[derive(Debug, Clone, Default)]
pub struct MissionVocabulary {
    keywords: Vec<String>,
}

impl MissionVocabulary {
    pub fn new(keywords: impl IntoIterator<Item = String>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|keyword| lower.contains(keyword))
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Where a page came from: used for link resolution and funder defaults.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub source: Source,
    pub base_url: String,
    pub funder: Option<String>,
}

struct Candidate {
    title: String,
    link: String,
    description: Option<String>,
    deadline_text: Option<String>,
    amount_text: Option<String>,
}

pub struct ExtractionEngine {
    vocabulary: MissionVocabulary,
    containers: Vec<Selector>,
    fallback_headings: Selector,
    title_headings: Selector,
    emphasis: Selector,
    classed: Selector,
    anchors: Selector,
    paragraphs: Selector,
    blocks: Selector,
}

impl ExtractionEngine {
    pub fn new(vocabulary: MissionVocabulary) -> Self {
        Self {
            vocabulary,
            containers: CONTAINER_SELECTORS.iter().map(|s| static_selector(s)).collect(),
            fallback_headings: static_selector("h2, h3, h4, h5"),
            title_headings: static_selector("h1, h2, h3, h4, h5, h6"),
            emphasis: static_selector("b, strong"),
            classed: static_selector("[class]"),
            anchors: static_selector("a[href]"),
            paragraphs: static_selector("p"),
            blocks: static_selector("p, div"),
        }
    }

    /// Extract zero or more raw records from one listing page.
    /// `next_sequence` carries the per-source sequence across pages.
    pub fn extract(&self, html: &str, page: &PageContext, next_sequence: &mut u32) -> Vec<RawRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();
        for container in self.discover_containers(&document) {
            let Some(candidate) = self.extract_container(container, page) else {
                continue;
            };
            if !self.passes_relevance_gate(&candidate) {
                debug!(title = %candidate.title, "container failed relevance gate");
                continue;
            }
            if !passes_completeness_gate(&candidate) {
                debug!(title = %candidate.title, "container failed completeness gate");
                continue;
            }
            *next_sequence += 1;
            records.push(candidate.into_raw_record(page, *next_sequence));
        }
        records
    }

    fn discover_containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let strategies: &[fn(&Self, &'a Html) -> Vec<ElementRef<'a>>] = &[
            Self::structural_containers as fn(&Self, &'a Html) -> Vec<ElementRef<'a>>,
            Self::heading_parent_containers as fn(&Self, &'a Html) -> Vec<ElementRef<'a>>,
        ];
        for strategy in strategies {
            let found = strategy(self, document);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn structural_containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in &self.containers {
            let matched: Vec<ElementRef<'a>> = document.select(selector).collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        Vec::new()
    }

    fn heading_parent_containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let mut seen = HashSet::new();
        let mut containers = Vec::new();
        for heading in document.select(&self.fallback_headings) {
            let text = element_text(heading).to_lowercase();
            if !OPPORTUNITY_HEADING_KEYWORDS.iter().any(|k| text.contains(k)) {
                continue;
            }
            let container = heading
                .parent()
                .and_then(ElementRef::wrap)
                .unwrap_or(heading);
            if seen.insert(container.id()) {
                containers.push(container);
            }
        }
        containers
    }

    fn extract_container(&self, container: ElementRef<'_>, page: &PageContext) -> Option<Candidate> {
        let title = self.container_title(container)?;
        let title_chars = title.chars().count();
        if title_chars < MIN_TITLE_CHARS {
            debug!(%title, "container title too short");
            return None;
        }
        if GENERIC_TITLES.contains(&title.to_lowercase().as_str()) {
            debug!(%title, "container title is navigational boilerplate");
            return None;
        }

        let link = self.container_link(container, page)?;
        if link == page.base_url && title_chars < SPECIFIC_TITLE_CHARS {
            debug!(%title, "container link is just the listing page");
            return None;
        }

        let description = self.container_description(container, &title);
        let text = element_text(container);

        Some(Candidate {
            title,
            link,
            description,
            deadline_text: find_deadline_text(&text),
            amount_text: find_amount_text(&text),
        })
    }

    fn container_title(&self, container: ElementRef<'_>) -> Option<String> {
        container
            .select(&self.title_headings)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                container
                    .select(&self.emphasis)
                    .next()
                    .map(element_text)
                    .filter(|t| !t.is_empty())
            })
            .or_else(|| self.classed_title(container))
            .or_else(|| self.first_short_block(container))
    }

    fn classed_title(&self, container: ElementRef<'_>) -> Option<String> {
        container
            .select(&self.classed)
            .find(|el| {
                let class = el.value().attr("class").unwrap_or_default().to_lowercase();
                ["title", "heading", "name"].iter().any(|hint| class.contains(hint))
            })
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    fn first_short_block(&self, container: ElementRef<'_>) -> Option<String> {
        container
            .select(&self.blocks)
            .map(element_text)
            .find(|t| !t.is_empty() && t.chars().count() <= SHORT_BLOCK_MAX_CHARS)
    }

    /// `None` disqualifies the container (denylisted link). A container
    /// with no anchor at all falls back to the listing page URL and is
    /// then subject to the specific-title rule.
    fn container_link(&self, container: ElementRef<'_>, page: &PageContext) -> Option<String> {
        let resolved = match container.select(&self.anchors).next() {
            Some(anchor) => resolve_link(&page.base_url, anchor.value().attr("href").unwrap_or_default()),
            None => page.base_url.clone(),
        };
        let lower = resolved.to_lowercase();
        if LINK_DENYLIST.iter().any(|denied| lower.contains(denied)) {
            debug!(link = %resolved, "container link is denylisted");
            return None;
        }
        Some(resolved)
    }

    fn container_description(&self, container: ElementRef<'_>, title: &str) -> Option<String> {
        container
            .select(&self.paragraphs)
            .map(element_text)
            .find(|t| !t.is_empty() && t != title)
            .or_else(|| {
                container
                    .select(&self.classed)
                    .find(|el| {
                        let class = el.value().attr("class").unwrap_or_default().to_lowercase();
                        ["desc", "summary", "excerpt", "content"]
                            .iter()
                            .any(|hint| class.contains(hint))
                    })
                    .map(element_text)
                    .filter(|t| !t.is_empty() && t != title)
            })
    }

    fn passes_relevance_gate(&self, candidate: &Candidate) -> bool {
        self.vocabulary.matches(&candidate.title)
            || candidate
                .description
                .as_deref()
                .map(|d| self.vocabulary.matches(d))
                .unwrap_or(false)
    }
}

/// A bare title with no other signal is indistinguishable from scraping
/// noise: require a deadline, an award amount, or a specific title with
/// a substantive description.
fn passes_completeness_gate(candidate: &Candidate) -> bool {
    candidate.deadline_text.is_some()
        || candidate.amount_text.is_some()
        || (candidate.title.chars().count() > COMPLETE_TITLE_CHARS
            && candidate
                .description
                .as_deref()
                .map(|d| d.chars().count() > COMPLETE_DESCRIPTION_CHARS)
                .unwrap_or(false))
}

impl Candidate {
    fn into_raw_record(self, page: &PageContext, sequence: u32) -> RawRecord {
        let mut record = RawRecord::new(page.source, sequence);
        record.set("Title", &self.title);
        record.set("Link", &self.link);
        if let Some(description) = &self.description {
            record.set("Description", description);
        }
        if let Some(deadline) = &self.deadline_text {
            record.set("Deadline", deadline);
        }
        if let Some(amount) = &self.amount_text {
            record.set("Award Amount", amount);
        }
        if let Some(funder) = &page.funder {
            record.set("Funder", funder);
        }
        record
    }
}

/// First substring that both looks like a date and survives the date
/// parser. The raw text is kept; typed conversion belongs to the
/// normalizer.
fn find_deadline_text(text: &str) -> Option<String> {
    for pattern in DATE_CANDIDATE_RES.iter() {
        for found in pattern.find_iter(text) {
            if parse::parse_date(found.as_str()).is_some() {
                return Some(found.as_str().to_string());
            }
        }
    }
    None
}

fn find_amount_text(text: &str) -> Option<String> {
    AMOUNT_CANDIDATE_RE
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .find(|candidate| parse::parse_amount(candidate).is_some())
}

/// Resolve an anchor href against the page it was found on. Fragment and
/// empty hrefs collapse to the listing page itself, which the caller
/// then treats as a non-specific link.
pub(crate) fn resolve_link(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return base_url.to_string();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if href.starts_with('/') {
        return format!("{}{}", origin(base_url), href);
    }
    format!("{}/{}", base_url.trim_end_matches('/'), href)
}

fn origin(base_url: &str) -> String {
    match base_url.find("://") {
        Some(scheme_end) => {
            let after = &base_url[scheme_end + 3..];
            match after.find('/') {
                Some(slash) => base_url[..scheme_end + 3 + slash].to_string(),
                None => base_url.to_string(),
            }
        }
        None => base_url.trim_end_matches('/').to_string(),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn static_selector(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector parses")
}
