//! CSV snapshot of the canonical set, in the column order the tracker
//! has always exported.

use grantwatch_core::CanonicalGrant;

pub const CSV_HEADERS: &[&str] = &[
    "Grant ID",
    "Title",
    "Funder",
    "Description",
    "Start Date",
    "Deadline",
    "Award Amount",
    "Eligibility",
    "Link",
    "Source",
    "Geography",
    "Topic",
    "Audience",
    "Funder Type",
];

pub fn to_csv(grants: &[CanonicalGrant]) -> String {
    let mut out = String::new();
    write_row(&mut out, CSV_HEADERS.iter().map(|h| h.to_string()));
    for grant in grants {
        write_row(&mut out, csv_fields(grant));
    }
    out
}

fn csv_fields(grant: &CanonicalGrant) -> impl Iterator<Item = String> {
    [
        grant.id.clone(),
        grant.title.clone(),
        grant.funder.clone(),
        grant.description.clone(),
        grant
            .start_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        grant
            .deadline
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        grant.award_amount.map(|a| a.to_string()).unwrap_or_default(),
        grant.eligibility.clone(),
        grant.link.clone(),
        grant.source.display_name().to_string(),
        grant.geography.clone(),
        grant.topic.clone(),
        grant.audience.clone(),
        grant.funder_type.clone(),
    ]
    .into_iter()
}

fn write_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if needs_quotes(&field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&field);
        }
    }
    out.push('\n');
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use grantwatch_core::Source;

    #[test]
    fn header_row_matches_the_canonical_column_order() {
        let csv = to_csv(&[]);
        assert_eq!(
            csv.lines().next().unwrap(),
            "Grant ID,Title,Funder,Description,Start Date,Deadline,Award Amount,\
             Eligibility,Link,Source,Geography,Topic,Audience,Funder Type"
        );
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        let grant = CanonicalGrant {
            id: "g-1".to_string(),
            title: "Training, \"Tech\" Edition".to_string(),
            funder: "Ford Foundation".to_string(),
            description: "Line one\nline two".to_string(),
            eligibility: "Nonprofits".to_string(),
            start_date: None,
            deadline: NaiveDate::from_ymd_opt(2026, 3, 15),
            award_amount: Some(12345.67),
            link: "https://example.org".to_string(),
            source: Source::GrantsGov,
            geography: "National".to_string(),
            topic: "Tech".to_string(),
            audience: "Other".to_string(),
            funder_type: "Government".to_string(),
        };
        let csv = to_csv(&[grant]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("g-1,\"Training, \"\"Tech\"\" Edition\",Ford Foundation"));
        assert!(csv.contains("2026-03-15"));
        assert!(csv.contains("12345.67"));
        assert!(csv.contains("Grants.gov"));
    }
}
