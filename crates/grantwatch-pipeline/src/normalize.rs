//! Maps each adapter's raw field vocabulary onto the canonical schema,
//! coercing types through the field parsers and filling required-field
//! defaults. Downstream stages assume title and id always exist, so a
//! record is never dropped here: a source with no usable title or
//! identifier gets a placeholder title and a sequential id instead.

use std::collections::HashMap;

use grantwatch_core::{
    derive_identity_key, parse, CanonicalGrant, RawRecord, Source, DEFAULT_GEOGRAPHY, DEFAULT_TAG,
    NO_DESCRIPTION, NO_ELIGIBILITY,
};

/// Alias lists tried in priority order for each canonical field. The
/// HTML adapters emit the display names directly; the rest cover the
/// field vocabularies the Grants.gov API has answered with over time.
const GRANT_NUMBER_ALIASES: &[&str] = &[
    "Grant ID",
    "oppNum",
    "opportunityNumber",
    "opportunityId",
    "number",
];
const TITLE_ALIASES: &[&str] = &["Title", "title", "opportunityTitle"];
const FUNDER_ALIASES: &[&str] = &["Funder", "agency", "agencyName"];
const DESCRIPTION_ALIASES: &[&str] = &[
    "Description",
    "description",
    "opportunityDescription",
    "synopsis",
];
const START_DATE_ALIASES: &[&str] = &["Start Date", "openDate", "postDate", "postedDate"];
const DEADLINE_ALIASES: &[&str] = &["Deadline", "closeDate", "dueDate"];
const AWARD_AMOUNT_ALIASES: &[&str] = &[
    "Award Amount",
    "awardCeiling",
    "awardAmount",
    "estimatedFunding",
];
const ELIGIBILITY_ALIASES: &[&str] = &["Eligibility", "eligibility", "eligibleApplicants"];
const LINK_ALIASES: &[&str] = &["Link", "link", "url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    GrantNumber,
    Title,
    Funder,
    Description,
    StartDate,
    Deadline,
    AwardAmount,
    Eligibility,
    Link,
}

/// Owns the per-source sequence counters used for synthesized ids, so
/// refresh state lives with the caller instead of in a global.
#[derive(Debug, Default)]
pub struct Normalizer {
    counters: HashMap<Source, u32>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, record: &RawRecord) -> CanonicalGrant {
        let source = record.source;

        let grant_number = field(record, GRANT_NUMBER_ALIASES, Slot::GrantNumber);
        let has_grant_number = grant_number.is_some();
        let title = field(record, TITLE_ALIASES, Slot::Title);
        let funder = field(record, FUNDER_ALIASES, Slot::Funder)
            .or_else(|| default_funder(source))
            .unwrap_or_default();
        let description =
            field(record, DESCRIPTION_ALIASES, Slot::Description).unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let eligibility =
            field(record, ELIGIBILITY_ALIASES, Slot::Eligibility).unwrap_or_else(|| NO_ELIGIBILITY.to_string());

        // Date- and amount-valued fields pass through the field parsers
        // here and only here; unparseable text degrades to absent.
        let start_date = field(record, START_DATE_ALIASES, Slot::StartDate)
            .and_then(|text| parse::parse_date(&text));
        let deadline =
            field(record, DEADLINE_ALIASES, Slot::Deadline).and_then(|text| parse::parse_date(&text));
        let award_amount = field(record, AWARD_AMOUNT_ALIASES, Slot::AwardAmount)
            .and_then(|text| parse::parse_amount(&text));

        let (id, title) = self.resolve_identity(source, grant_number, title, &funder);

        let link = field(record, LINK_ALIASES, Slot::Link)
            .unwrap_or_else(|| default_link(source, &id, has_grant_number));

        CanonicalGrant {
            id,
            title,
            funder,
            description,
            eligibility,
            start_date,
            deadline,
            award_amount,
            link,
            source,
            geography: DEFAULT_GEOGRAPHY.to_string(),
            topic: DEFAULT_TAG.to_string(),
            audience: DEFAULT_TAG.to_string(),
            funder_type: DEFAULT_TAG.to_string(),
        }
    }

    /// Identity precedence: source-provided grant number, else a key
    /// derived from `(title, funder)`, else a per-source sequential id
    /// alongside a placeholder title.
    fn resolve_identity(
        &mut self,
        source: Source,
        grant_number: Option<String>,
        title: Option<String>,
        funder: &str,
    ) -> (String, String) {
        match (grant_number, title) {
            (Some(number), title) => {
                let title = title.unwrap_or_else(|| placeholder_title(source));
                (number, title)
            }
            (None, Some(title)) => (derive_identity_key(&title, funder), title),
            (None, None) => {
                let counter = self.counters.entry(source).or_insert(0);
                *counter += 1;
                let id = format!("{}-{:04}", source.slug(), counter);
                (id, placeholder_title(source))
            }
        }
    }
}

fn placeholder_title(source: Source) -> String {
    format!("{} Opportunity", source.display_name())
}

fn default_funder(source: Source) -> Option<String> {
    match source {
        Source::GrantsGov => Some("Federal Government".to_string()),
        Source::NyGrantsGateway => Some("New York State".to_string()),
        Source::FoundationSites => None,
    }
}

fn default_link(source: Source, id: &str, has_grant_number: bool) -> String {
    if source == Source::GrantsGov && has_grant_number {
        format!("https://www.grants.gov/web/grants/view-opportunity.html?oppId={id}")
    } else {
        source.base_url().to_string()
    }
}

/// Priority-ordered alias lookup with a substring fallback for field
/// names no alias anticipated.
fn field(record: &RawRecord, aliases: &[&str], slot: Slot) -> Option<String> {
    if let Some(value) = aliases.iter().find_map(|alias| record.get(alias)) {
        return Some(value.to_string());
    }
    detect_field(record, slot).map(str::to_string)
}

fn detect_field<'a>(record: &'a RawRecord, slot: Slot) -> Option<&'a str> {
    record.fields.iter().find_map(|(name, value)| {
        let key = name.to_lowercase();
        let matched = match slot {
            Slot::GrantNumber => key.contains("id") || key.contains("num"),
            Slot::Title => key.contains("title") || key.contains("name"),
            Slot::Funder => key.contains("agency") || key.contains("funder"),
            Slot::Description => key.contains("desc") || key.contains("summary"),
            Slot::StartDate => {
                key.contains("date")
                    && (key.contains("open") || key.contains("start") || key.contains("post"))
            }
            Slot::Deadline => {
                key.contains("date")
                    && (key.contains("close") || key.contains("end") || key.contains("due"))
            }
            Slot::AwardAmount => {
                key.contains("award") || key.contains("amount") || key.contains("funding")
            }
            Slot::Eligibility => key.contains("elig"),
            Slot::Link => key.contains("link") || key.contains("url"),
        };
        matched.then_some(value.as_str())
    })
}
