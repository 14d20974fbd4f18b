//! NY State Grants Gateway adapter: a structured HTML listing where each
//! opportunity is a labeled field group inside a `views-row`.

use async_trait::async_trait;
use grantwatch_core::{RawRecord, Source};
use grantwatch_storage::HttpFetcher;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::extract::resolve_link;
use crate::{store_artifact_best_effort, AdapterError, RunContext, SourceAdapter};

pub struct NyGrantsGatewayAdapter {
    listing_url: String,
    rows: Selector,
    title: Selector,
    anchor: Selector,
    info_fields: Selector,
    label: Selector,
    value: Selector,
}

impl NyGrantsGatewayAdapter {
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            rows: selector("div.views-row"),
            title: selector("span.field-content"),
            anchor: selector("a[href]"),
            info_fields: selector("div.views-field"),
            label: selector("div.views-label"),
            value: selector("div.field-content"),
        }
    }

    fn parse_listing(&self, html: &str) -> Vec<RawRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();
        let mut sequence = 0u32;

        for row in document.select(&self.rows) {
            let Some(title_element) = row.select(&self.title).next() else {
                debug!("skipping views-row without a title element");
                continue;
            };
            let title = text_of(title_element);
            if title.is_empty() {
                continue;
            }

            sequence += 1;
            let mut record = RawRecord::new(Source::NyGrantsGateway, sequence);
            record.set("Title", &title);
            record.set("Funder", "New York State");

            if let Some(href) = title_element
                .select(&self.anchor)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                record.set("Link", resolve_link(&self.listing_url, href));
            }

            for info in row.select(&self.info_fields) {
                let Some(label_element) = info.select(&self.label).next() else {
                    continue;
                };
                let label = text_of(label_element).replace(':', "");
                let value = info
                    .select(&self.value)
                    .next()
                    .map(text_of)
                    .unwrap_or_default();
                if value.is_empty() {
                    continue;
                }
                if let Some(field) = canonical_field_for_label(&label) {
                    record.set(field, value);
                }
            }

            records.push(record);
        }

        records
    }
}

/// Map a rendered field label onto a canonical raw-field name. Values
/// stay as raw text; dates and amounts are parsed by the normalizer.
fn canonical_field_for_label(label: &str) -> Option<&'static str> {
    if label.contains("Funding") || label.contains("Award") {
        Some("Award Amount")
    } else if label.contains("Deadline") || label.contains("Due Date") {
        Some("Deadline")
    } else if label.contains("Description") {
        Some("Description")
    } else if label.contains("Eligib") {
        Some("Eligibility")
    } else if label.contains("Issued") || label.contains("Posted") {
        Some("Start Date")
    } else if label.contains("Agency") || label.contains("Department") {
        Some("Funder")
    } else {
        None
    }
}

#[async_trait]
impl SourceAdapter for NyGrantsGatewayAdapter {
    fn source(&self) -> Source {
        Source::NyGrantsGateway
    }

    async fn fetch_records(
        &self,
        http: &HttpFetcher,
        ctx: &RunContext,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let page = http.get_text(Source::NyGrantsGateway, &self.listing_url).await?;
        store_artifact_best_effort(ctx, Source::NyGrantsGateway, "html", page.body.as_bytes()).await;

        let records = self.parse_listing(&page.body);
        info!(count = records.len(), "parsed NY Grants Gateway listing");
        Ok(records)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}
