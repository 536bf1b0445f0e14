use crate::error::{Result, ScrapeError};
use crate::extract::ExtractionStrategy;
use crate::normalize::collapse_whitespace;
use crate::record::RawRecord;
use regex::Regex;
use roster_sources::ExtractionRules;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Used when a card definition names no name selector.
const DEFAULT_NAME_SELECTOR: &str = "h1, h2, h3, h4, .name, strong";

/// Elements that may delimit one entry in free-form markup.
const BLOCK_TAGS: [&str; 9] = [
    "li", "tr", "article", "section", "div", "p", "dd", "address", "td",
];

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn static_selector(cell: &'static OnceLock<Selector>, selector: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(selector).expect("valid selector"))
}

fn table_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "table")
}

fn row_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "tr")
}

fn header_cell_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "th")
}

fn any_cell_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "th, td")
}

fn data_cell_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "td")
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "a[href]")
}

fn heading_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    static_selector(&SEL, "h1, h2, h3, h4, h5, strong, b, .name")
}

fn profile_regex() -> &'static Regex {
    static PROFILE_REGEX: OnceLock<Regex> = OnceLock::new();
    PROFILE_REGEX.get_or_init(|| {
        Regex::new(r"(?i)(profile|member|attorney|lawyer|people|person|provider|detail)s?[/?=_.-]+[a-z0-9]")
            .expect("valid regex")
    })
}

/// Collapsed text content of an element, `None` when blank.
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).find_map(element_text)
}

fn href_of(element: ElementRef<'_>) -> Option<&str> {
    element.value().attr("href").or_else(|| {
        element
            .select(anchor_selector())
            .next()
            .and_then(|a| a.value().attr("href"))
    })
}

fn has_scheme(href: &str, scheme: &str) -> bool {
    href.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// The `scheme:` link of the first match when present, its text otherwise.
fn link_or_text(scope: ElementRef<'_>, selector: &Selector, scheme: &str) -> Option<String> {
    let element = scope.select(selector).next()?;
    match href_of(element) {
        Some(href) if has_scheme(href, scheme) => Some(href.to_string()),
        _ => element_text(element),
    }
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map_or_else(|| href.to_string(), |url| url.to_string())
}

/// Structured result cards located with selectors from the source definition.
pub struct CardStrategy {
    item: Selector,
    name: Selector,
    firm: Option<Selector>,
    location: Option<Selector>,
    phone: Option<Selector>,
    email: Option<Selector>,
    website: Option<Selector>,
    profile_link: Option<Selector>,
    year: Option<Selector>,
    base_url: Option<Url>,
}

impl CardStrategy {
    /// Build from extraction rules; `Ok(None)` when no item selector is set.
    pub fn from_rules(rules: &ExtractionRules, base_url: Option<Url>) -> Result<Option<Self>> {
        let Some(item) = &rules.item else {
            return Ok(None);
        };
        let optional = |selector: &Option<String>| selector.as_deref().map(parse_selector).transpose();

        Ok(Some(Self {
            item: parse_selector(item)?,
            name: parse_selector(rules.name.as_deref().unwrap_or(DEFAULT_NAME_SELECTOR))?,
            firm: optional(&rules.firm)?,
            location: optional(&rules.location)?,
            phone: optional(&rules.phone)?,
            email: optional(&rules.email)?,
            website: optional(&rules.website)?,
            profile_link: optional(&rules.profile_link)?,
            year: optional(&rules.year)?,
            base_url,
        }))
    }

    fn extract_card(&self, card: ElementRef<'_>) -> Option<RawRecord> {
        let text = |selector: &Option<Selector>| selector.as_ref().and_then(|s| first_text(card, s));

        Some(RawRecord {
            name: Some(first_text(card, &self.name)?),
            firm: text(&self.firm),
            location: text(&self.location),
            phone: self
                .phone
                .as_ref()
                .and_then(|s| link_or_text(card, s, "tel:")),
            email: self
                .email
                .as_ref()
                .and_then(|s| link_or_text(card, s, "mailto:")),
            website: self.website.as_ref().and_then(|s| {
                let element = card.select(s).next()?;
                href_of(element)
                    .map(|href| resolve(self.base_url.as_ref(), href))
                    .or_else(|| element_text(element))
            }),
            profile_url: self.profile_link.as_ref().and_then(|s| {
                card.select(s)
                    .next()
                    .and_then(href_of)
                    .map(|href| resolve(self.base_url.as_ref(), href))
            }),
            source_record_id: card
                .value()
                .attr("data-id")
                .map(ToString::to_string),
            year: text(&self.year),
            ..RawRecord::default()
        })
    }
}

impl ExtractionStrategy for CardStrategy {
    fn name(&self) -> &str {
        "cards"
    }

    fn extract(&self, payload: &str) -> Vec<RawRecord> {
        let document = Html::parse_document(payload);
        document
            .select(&self.item)
            .filter_map(|card| self.extract_card(card))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    FirstName,
    LastName,
    Firm,
    Location,
    Phone,
    Email,
    Website,
    Year,
    Id,
}

fn classify_header(header: &str) -> Option<Column> {
    let h = header.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| h.contains(w));

    let column = if has(&["first name", "given"]) {
        Column::FirstName
    } else if has(&["last name", "surname", "family name"]) {
        Column::LastName
    } else if has(&["firm", "company", "organization", "employer", "practice"]) {
        Column::Firm
    } else if has(&["email", "e-mail"]) {
        Column::Email
    } else if has(&["phone", "telephone", "tel."]) {
        Column::Phone
    } else if has(&["website", "web site", "url"]) {
        Column::Website
    } else if h.trim() == "id" || has(&["number", "#"]) {
        Column::Id
    } else if has(&["admitted", "year", "licensed", "since", "date"]) {
        Column::Year
    } else if has(&["city", "location", "address", "county"]) {
        Column::Location
    } else if has(&["name", "member", "attorney", "lawyer", "licensee"]) {
        Column::Name
    } else {
        return None;
    };
    Some(column)
}

/// Any `<table>` whose header row names recognisable columns.
#[derive(Debug, Clone, Default)]
pub struct TableStrategy {
    base_url: Option<Url>,
}

impl TableStrategy {
    pub fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }

    fn fill(&self, record: &mut RawRecord, column: Column, cell: ElementRef<'_>) {
        let href = href_of(cell);
        let text = element_text(cell);
        match column {
            Column::Name => {
                record.name = text;
                record.profile_url = href.map(|h| resolve(self.base_url.as_ref(), h));
            }
            Column::FirstName => record.first_name = text,
            Column::LastName => record.last_name = text,
            Column::Firm => record.firm = text,
            Column::Location => record.location = text,
            Column::Phone => {
                record.phone = href
                    .filter(|h| has_scheme(h, "tel:"))
                    .map(ToString::to_string)
                    .or(text);
            }
            Column::Email => {
                record.email = href
                    .filter(|h| has_scheme(h, "mailto:"))
                    .map(ToString::to_string)
                    .or(text);
            }
            Column::Website => {
                record.website = href
                    .map(|h| resolve(self.base_url.as_ref(), h))
                    .or(text);
            }
            Column::Year => record.year = text,
            Column::Id => record.source_record_id = text,
        }
    }
}

impl ExtractionStrategy for TableStrategy {
    fn name(&self) -> &str {
        "tables"
    }

    fn extract(&self, payload: &str) -> Vec<RawRecord> {
        let document = Html::parse_document(payload);
        let mut records = Vec::new();

        for table in document.select(table_selector()) {
            let rows: Vec<ElementRef<'_>> = table.select(row_selector()).collect();
            let Some(header_idx) = rows
                .iter()
                .position(|row| row.select(header_cell_selector()).next().is_some())
                .or_else(|| (!rows.is_empty()).then_some(0))
            else {
                continue;
            };

            let columns: Vec<Option<Column>> = rows[header_idx]
                .select(any_cell_selector())
                .map(|cell| element_text(cell).and_then(|t| classify_header(&t)))
                .collect();
            if !columns
                .iter()
                .any(|c| matches!(c, Some(Column::Name | Column::LastName)))
            {
                continue;
            }

            for row in &rows[header_idx + 1..] {
                let mut record = RawRecord::default();
                for (cell, column) in row.select(data_cell_selector()).zip(&columns) {
                    if let Some(column) = column {
                        self.fill(&mut record, *column, cell);
                    }
                }
                if record.name.is_some() || record.last_name.is_some() {
                    records.push(record);
                }
            }
        }

        records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Email,
    Phone,
    Profile,
}

fn link_kind(href: &str) -> Option<LinkKind> {
    if has_scheme(href, "mailto:") {
        Some(LinkKind::Email)
    } else if has_scheme(href, "tel:") {
        Some(LinkKind::Phone)
    } else if !has_scheme(href, "javascript:")
        && !href.starts_with('#')
        && profile_regex().is_match(href)
    {
        Some(LinkKind::Profile)
    } else {
        None
    }
}

fn is_generic_label(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["profile", "view", "more", "details", "website", "email", "contact"]
        .iter()
        .any(|w| lower.contains(w))
}

/// Nearest block ancestor that also holds something name-like.
fn find_container(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    for node in anchor.ancestors() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let tag = element.value().name();
        if tag == "body" || tag == "html" {
            return None;
        }
        if !BLOCK_TAGS.contains(&tag) {
            continue;
        }
        let has_heading = element.select(heading_selector()).next().is_some();
        let has_profile = element.select(anchor_selector()).any(|a| {
            a.value()
                .attr("href")
                .is_some_and(|h| link_kind(h) == Some(LinkKind::Profile))
        });
        if has_heading || has_profile {
            return Some(element);
        }
    }
    None
}

/// Last-resort heuristic: contact and profile links grouped by the block
/// that contains them.
#[derive(Debug, Clone, Default)]
pub struct LinkScanStrategy {
    base_url: Option<Url>,
}

impl LinkScanStrategy {
    pub fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }
}

impl ExtractionStrategy for LinkScanStrategy {
    fn name(&self) -> &str {
        "link_scan"
    }

    fn extract(&self, payload: &str) -> Vec<RawRecord> {
        let document = Html::parse_document(payload);
        let mut groups: Vec<(ElementRef<'_>, RawRecord)> = Vec::new();

        for anchor in document.select(anchor_selector()) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(kind) = link_kind(href) else {
                continue;
            };
            let Some(container) = find_container(anchor) else {
                continue;
            };

            let idx = if let Some(idx) = groups.iter().position(|(el, _)| *el == container) {
                idx
            } else {
                let record = RawRecord {
                    name: first_text(container, heading_selector()),
                    ..RawRecord::default()
                };
                groups.push((container, record));
                groups.len() - 1
            };
            let record = &mut groups[idx].1;

            match kind {
                LinkKind::Email => {
                    record.email.get_or_insert_with(|| href.to_string());
                }
                LinkKind::Phone => {
                    record.phone.get_or_insert_with(|| href.to_string());
                }
                LinkKind::Profile => {
                    if record.profile_url.is_none() {
                        record.profile_url = Some(resolve(self.base_url.as_ref(), href));
                    }
                    if record.name.is_none() {
                        record.name = element_text(anchor).filter(|t| !is_generic_label(t));
                    }
                }
            }
        }

        groups
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| record.name.is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Option<Url> {
        Url::parse("https://bar.example.org/find").ok()
    }

    #[test]
    fn test_card_strategy() {
        let rules = ExtractionRules {
            item: Some(".member".to_string()),
            name: Some(".member-name".to_string()),
            firm: Some(".firm".to_string()),
            email: Some(".email".to_string()),
            phone: Some(".phone".to_string()),
            profile_link: Some("a.profile".to_string()),
            year: Some(".admitted".to_string()),
            ..ExtractionRules::default()
        };
        let strategy = CardStrategy::from_rules(&rules, base())
            .expect("valid selectors")
            .expect("card strategy");

        let html = r#"
            <div class="results">
                <div class="member" data-id="48213">
                    <span class="member-name">Doe, Jane</span>
                    <span class="firm">Doe &amp; Roe LLP</span>
                    <a class="email" href="mailto:jane@doelaw.com">Email</a>
                    <span class="phone">(614) 555-0100</span>
                    <a class="profile" href="/profile/48213">View</a>
                    <span class="admitted">Admitted 2009</span>
                </div>
                <div class="member">
                    <span class="firm">No name here</span>
                </div>
                <div class="member">
                    <span class="member-name">John Roe</span>
                </div>
            </div>
        "#;

        let records = strategy.extract(html);
        assert_eq!(records.len(), 2);

        let jane = &records[0];
        assert_eq!(jane.name.as_deref(), Some("Doe, Jane"));
        assert_eq!(jane.firm.as_deref(), Some("Doe & Roe LLP"));
        assert_eq!(jane.email.as_deref(), Some("mailto:jane@doelaw.com"));
        assert_eq!(jane.phone.as_deref(), Some("(614) 555-0100"));
        assert_eq!(
            jane.profile_url.as_deref(),
            Some("https://bar.example.org/profile/48213")
        );
        assert_eq!(jane.source_record_id.as_deref(), Some("48213"));
        assert_eq!(jane.year.as_deref(), Some("Admitted 2009"));

        assert_eq!(records[1].name.as_deref(), Some("John Roe"));
        assert_eq!(records[1].firm, None);
    }

    #[test]
    fn test_card_strategy_requires_item() {
        let rules = ExtractionRules::default();
        assert!(CardStrategy::from_rules(&rules, None)
            .expect("no selectors to parse")
            .is_none());
    }

    #[test]
    fn test_card_strategy_invalid_selector() {
        let rules = ExtractionRules {
            item: Some("div[[".to_string()),
            ..ExtractionRules::default()
        };
        assert!(matches!(
            CardStrategy::from_rules(&rules, None),
            Err(ScrapeError::Selector { .. })
        ));
    }

    #[test]
    fn test_classify_header() {
        assert_eq!(classify_header("Name"), Some(Column::Name));
        assert_eq!(classify_header("Firm Name"), Some(Column::Firm));
        assert_eq!(classify_header("Email Address"), Some(Column::Email));
        assert_eq!(classify_header("Year Admitted"), Some(Column::Year));
        assert_eq!(classify_header("Bar #"), Some(Column::Id));
        assert_eq!(classify_header("City"), Some(Column::Location));
        assert_eq!(classify_header("Last Name"), Some(Column::LastName));
        assert_eq!(classify_header("Notes"), None);
    }

    #[test]
    fn test_table_strategy() {
        let html = r#"
            <table class="layout"><tr><td>Search again</td></tr></table>
            <table>
                <thead>
                    <tr><th>Name</th><th>Firm</th><th>City</th><th>Phone</th><th>Email</th></tr>
                </thead>
                <tbody>
                    <tr>
                        <td><a href="/attorney/1001">Jane Doe</a></td>
                        <td>Doe Law</td>
                        <td>Columbus</td>
                        <td><a href="tel:6145550100">614-555-0100</a></td>
                        <td><a href="mailto:jane@doe.law">jane@doe.law</a></td>
                    </tr>
                    <tr><td>John Roe</td><td></td><td>Dayton</td><td></td><td></td></tr>
                    <tr><td></td><td>Orphan Firm</td><td></td><td></td><td></td></tr>
                </tbody>
            </table>
        "#;

        let records = TableStrategy::new(base()).extract(html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(
            records[0].profile_url.as_deref(),
            Some("https://bar.example.org/attorney/1001")
        );
        assert_eq!(records[0].phone.as_deref(), Some("tel:6145550100"));
        assert_eq!(records[0].email.as_deref(), Some("mailto:jane@doe.law"));
        assert_eq!(records[1].location.as_deref(), Some("Dayton"));
        assert_eq!(records[1].firm, None);
    }

    #[test]
    fn test_table_without_name_column_is_ignored() {
        let html = "<table><tr><th>City</th><th>Count</th></tr><tr><td>Akron</td><td>4</td></tr></table>";
        assert!(TableStrategy::default().extract(html).is_empty());
    }

    #[test]
    fn test_link_scan_groups_by_container() {
        let html = r#"
            <body>
                <nav><a href="mailto:webmaster@example.org">Contact us</a></nav>
                <div class="entry">
                    <h3><a href="/people/jane-doe">Jane Doe</a></h3>
                    <div class="contact">
                        <a href="mailto:jane@doe.law">Email</a>
                        <a href="tel:+16145550100">Call</a>
                    </div>
                </div>
                <ul>
                    <li><a href="/profile/77">John Roe</a> <a href="mailto:john@roe.law">Email</a></li>
                </ul>
            </body>
        "#;

        let records = LinkScanStrategy::new(base()).extract(html);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(records[0].email.as_deref(), Some("mailto:jane@doe.law"));
        assert_eq!(records[0].phone.as_deref(), Some("tel:+16145550100"));
        assert_eq!(
            records[0].profile_url.as_deref(),
            Some("https://bar.example.org/people/jane-doe")
        );

        assert_eq!(records[1].name.as_deref(), Some("John Roe"));
        assert_eq!(records[1].email.as_deref(), Some("mailto:john@roe.law"));
    }

    #[test]
    fn test_link_kind() {
        assert_eq!(link_kind("MAILTO:a@b.org"), Some(LinkKind::Email));
        assert_eq!(link_kind("tel:555"), Some(LinkKind::Phone));
        assert_eq!(link_kind("/members/detail?id=12"), Some(LinkKind::Profile));
        assert_eq!(link_kind("/about"), None);
        assert_eq!(link_kind("#profile-1"), None);
    }
}
