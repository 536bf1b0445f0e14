//! Field cleanup applied to every record before it is emitted.
//!
//! Directory markup is noisy: names arrive as "DOE, Jane M., Esq.", emails as
//! `mailto:` links with query strings, websites without a scheme. These helpers
//! turn that into consistent values and never fail; a field that cannot be
//! salvaged becomes `None`.

use crate::record::{ContactChannels, NameParts, Provenance, RawRecord, ResultRecord};
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

const HONORIFICS: [&str; 13] = [
    "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "hon", "judge", "rev", "atty", "sir", "dame",
];

const SUFFIXES: [&str; 15] = [
    "jr", "sr", "ii", "iii", "iv", "esq", "md", "phd", "cpa", "pe", "dds", "jd", "llm", "rn", "np",
];

/// Lower-case words that belong to the family name when they precede it.
const PARTICLES: [&str; 15] = [
    "van", "von", "de", "der", "den", "del", "della", "da", "di", "du", "la", "le", "st", "bin",
    "ibn",
];

const MIN_PHONE_DIGITS: usize = 7;

fn year_regex() -> &'static Regex {
    static YEAR_REGEX: OnceLock<Regex> = OnceLock::new();
    YEAR_REGEX.get_or_init(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").expect("valid regex"))
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

/// Collapse runs of whitespace (including non-breaking spaces) to one space.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode entities and collapse whitespace; `None` when nothing is left.
pub fn clean_text(raw: &str) -> Option<String> {
    let decoded = if raw.contains('&') || raw.contains('<') {
        let fragment = Html::parse_fragment(raw);
        fragment.root_element().text().collect::<String>()
    } else {
        raw.to_string()
    };

    let collapsed = collapse_whitespace(&decoded);
    (!collapsed.is_empty()).then_some(collapsed)
}

fn token_key(token: &str) -> String {
    token
        .trim_matches(|c: char| c == '.' || c == ',')
        .replace('.', "")
        .to_lowercase()
}

fn is_honorific(token: &str) -> bool {
    HONORIFICS.contains(&token_key(token).as_str())
}

fn is_suffix(token: &str) -> bool {
    SUFFIXES.contains(&token_key(token).as_str())
}

fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&token_key(token).as_str())
}

/// Strip leading honorifics and trailing suffixes, keeping at least one token.
fn trim_tokens<'a>(mut tokens: Vec<&'a str>, suffixes: &mut Vec<String>) -> Vec<&'a str> {
    while tokens.len() > 1 && is_honorific(tokens[0]) {
        tokens.remove(0);
    }

    let mut trailing = Vec::new();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| is_suffix(t)) {
        if let Some(token) = tokens.pop() {
            trailing.push(token.trim_end_matches(',').to_string());
        }
    }
    trailing.reverse();
    suffixes.extend(trailing);

    if tokens.len() == 1 && (is_honorific(tokens[0]) || is_suffix(tokens[0])) {
        tokens.clear();
    }
    tokens
}

fn join_tokens(tokens: &[&str]) -> Option<String> {
    (!tokens.is_empty()).then(|| tokens.join(" "))
}

/// Split a display name into parts.
///
/// Handles "Last, First Middle" and "First Middle Last" forms, honorifics,
/// generational and professional suffixes, and family-name particles such as
/// "van der". Returns `None` when no name survives cleanup.
pub fn split_name(raw: &str) -> Option<NameParts> {
    let full = clean_text(raw)?;

    let mut segments: Vec<&str> = full
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut suffixes = Vec::new();
    while segments.len() > 1
        && segments
            .last()
            .is_some_and(|s| s.split_whitespace().all(is_suffix))
    {
        if let Some(segment) = segments.pop() {
            suffixes.insert(0, segment.to_string());
        }
    }

    let (first, middle, last) = match segments.as_slice() {
        [] => return None,
        [family, given, ..] => {
            let family = trim_tokens(family.split_whitespace().collect(), &mut suffixes);
            let given = trim_tokens(given.split_whitespace().collect(), &mut suffixes);
            (
                given.first().map(|t| (*t).to_string()),
                given.get(1..).and_then(join_tokens),
                join_tokens(&family),
            )
        }
        [single] => {
            let tokens = trim_tokens(single.split_whitespace().collect(), &mut suffixes);
            match tokens.len() {
                0 => (None, None, None),
                1 => (None, None, Some(tokens[0].to_string())),
                n => {
                    let mut family_start = n - 1;
                    while family_start > 1 && is_particle(tokens[family_start - 1]) {
                        family_start -= 1;
                    }
                    (
                        Some(tokens[0].to_string()),
                        join_tokens(&tokens[1..family_start]),
                        join_tokens(&tokens[family_start..]),
                    )
                }
            }
        }
    };

    if first.is_none() && last.is_none() {
        return None;
    }

    Some(NameParts {
        full,
        first,
        middle,
        last,
        suffix: (!suffixes.is_empty()).then(|| suffixes.join(" ")),
    })
}

fn strip_scheme<'a>(raw: &'a str, scheme: &str) -> &'a str {
    match raw.get(..scheme.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => &raw[scheme.len()..],
        _ => raw,
    }
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned())
}

/// Lower-cased address with any `mailto:` prefix and query removed.
pub fn normalize_email(raw: &str) -> Option<String> {
    let raw = strip_scheme(raw.trim(), "mailto:");
    let address = raw.split('?').next().unwrap_or_default();
    let address = clean_text(&percent_decode(address))?.to_lowercase();
    email_regex().is_match(&address).then_some(address)
}

/// Phone number as displayed, minus any `tel:` prefix; needs seven digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let raw = strip_scheme(raw.trim(), "tel:");
    let phone = clean_text(&percent_decode(raw))?;
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (digits >= MIN_PHONE_DIGITS).then_some(phone)
}

/// Website with a scheme; contact pseudo-links are rejected.
pub fn normalize_website(raw: &str) -> Option<String> {
    let site = clean_text(raw)?;
    let lower = site.to_lowercase();

    if lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("javascript:")
        || lower.starts_with('#')
    {
        return None;
    }

    if let Some(rest) = site.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(site);
    }
    if site.contains("://") || !site.contains('.') || site.contains(' ') {
        return None;
    }
    Some(format!("https://{site}"))
}

/// First plausible four-digit year in the text.
pub fn parse_year(raw: &str) -> Option<i32> {
    year_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn resolve_name(raw: &RawRecord) -> Option<NameParts> {
    let first = raw.first_name.as_deref().and_then(clean_text);
    let last = raw.last_name.as_deref().and_then(clean_text);

    let mut parts = match raw.name.as_deref().and_then(split_name) {
        Some(parts) => parts,
        None => {
            let full = [first.as_deref(), last.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if full.is_empty() {
                return None;
            }
            NameParts {
                full,
                ..NameParts::default()
            }
        }
    };

    if first.is_some() {
        parts.first = first;
    }
    if last.is_some() {
        parts.last = last;
    }
    Some(parts)
}

/// Normalize a raw record; records without a usable name yield `None`.
pub fn normalize_record(raw: RawRecord, provenance: Provenance) -> Option<ResultRecord> {
    let name = resolve_name(&raw)?;

    Some(ResultRecord {
        name,
        firm: raw.firm.as_deref().and_then(clean_text),
        location: raw.location.as_deref().and_then(clean_text),
        contact: ContactChannels {
            phone: raw.phone.as_deref().and_then(normalize_phone),
            email: raw.email.as_deref().and_then(normalize_email),
            website: raw.website.as_deref().and_then(normalize_website),
            profile_url: raw.profile_url.as_deref().and_then(clean_text),
        },
        source_record_id: raw.source_record_id.as_deref().and_then(clean_text),
        year: raw.year.as_deref().and_then(parse_year),
        provenance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::{JobId, Partition, PartitionKind, SourceId, Timestamp};

    fn provenance() -> Provenance {
        Provenance {
            job_id: JobId::generate(),
            source_id: SourceId::new("lakeside-bar").expect("valid source ID"),
            partition: Partition::new(PartitionKind::City, "Akron").expect("partition"),
            page: 1,
            strategy: Some("cards".to_string()),
            collected_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_clean_text_decodes_entities() {
        assert_eq!(
            clean_text("  Smith &amp;\n  Jones&nbsp;LLP ").as_deref(),
            Some("Smith & Jones LLP")
        );
        assert_eq!(clean_text("AT&T").as_deref(), Some("AT&T"));
        assert_eq!(clean_text(" \t\n"), None);
    }

    #[test]
    fn test_split_name_natural_order() {
        let parts = split_name("Jane Marie Doe").expect("name");
        assert_eq!(parts.first.as_deref(), Some("Jane"));
        assert_eq!(parts.middle.as_deref(), Some("Marie"));
        assert_eq!(parts.last.as_deref(), Some("Doe"));
        assert_eq!(parts.suffix, None);
    }

    #[test]
    fn test_split_name_comma_order() {
        let parts = split_name("DOE, Jane M.").expect("name");
        assert_eq!(parts.full, "DOE, Jane M.");
        assert_eq!(parts.first.as_deref(), Some("Jane"));
        assert_eq!(parts.middle.as_deref(), Some("M."));
        assert_eq!(parts.last.as_deref(), Some("DOE"));
    }

    #[test]
    fn test_split_name_honorifics_and_suffixes() {
        let parts = split_name("Hon. Robert T. Smith Jr.").expect("name");
        assert_eq!(parts.first.as_deref(), Some("Robert"));
        assert_eq!(parts.middle.as_deref(), Some("T."));
        assert_eq!(parts.last.as_deref(), Some("Smith"));
        assert_eq!(parts.suffix.as_deref(), Some("Jr."));

        let parts = split_name("Jane Doe, Esq.").expect("name");
        assert_eq!(parts.first.as_deref(), Some("Jane"));
        assert_eq!(parts.last.as_deref(), Some("Doe"));
        assert_eq!(parts.suffix.as_deref(), Some("Esq."));

        let parts = split_name("Smith, Dr. Alan, PhD").expect("name");
        assert_eq!(parts.first.as_deref(), Some("Alan"));
        assert_eq!(parts.last.as_deref(), Some("Smith"));
        assert_eq!(parts.suffix.as_deref(), Some("PhD"));
    }

    #[test]
    fn test_split_name_particles() {
        let parts = split_name("Anna van der Berg").expect("name");
        assert_eq!(parts.first.as_deref(), Some("Anna"));
        assert_eq!(parts.middle, None);
        assert_eq!(parts.last.as_deref(), Some("van der Berg"));
    }

    #[test]
    fn test_split_name_degenerate() {
        assert_eq!(split_name("   "), None);
        assert_eq!(split_name("Dr."), None);

        let single = split_name("Cher").expect("name");
        assert_eq!(single.first, None);
        assert_eq!(single.last.as_deref(), Some("Cher"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("MAILTO:Jane.Doe@Example.ORG?subject=Hi").as_deref(),
            Some("jane.doe@example.org")
        );
        assert_eq!(
            normalize_email("jdoe%40example.org").as_deref(),
            Some("jdoe@example.org")
        );
        assert_eq!(normalize_email("not an email"), None);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone("tel:+1-614-555-0100").as_deref(),
            Some("+1-614-555-0100")
        );
        assert_eq!(
            normalize_phone(" (614)\n555-0100 ").as_deref(),
            Some("(614) 555-0100")
        );
        assert_eq!(normalize_phone("ext. 12"), None);
    }

    #[test]
    fn test_normalize_website() {
        assert_eq!(
            normalize_website("www.doelaw.com").as_deref(),
            Some("https://www.doelaw.com")
        );
        assert_eq!(
            normalize_website("//doelaw.com/about").as_deref(),
            Some("https://doelaw.com/about")
        );
        assert_eq!(
            normalize_website("http://doelaw.com").as_deref(),
            Some("http://doelaw.com")
        );
        assert_eq!(normalize_website("mailto:a@b.com"), None);
        assert_eq!(normalize_website("Not listed"), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("Admitted: 05/11/1998"), Some(1998));
        assert_eq!(parse_year("Licensed since 2014"), Some(2014));
        assert_eq!(parse_year("License #123456"), None);
    }

    #[test]
    fn test_normalize_record_drops_nameless() {
        let raw = RawRecord {
            email: Some("someone@example.org".to_string()),
            ..RawRecord::default()
        };
        assert!(normalize_record(raw, provenance()).is_none());
    }

    #[test]
    fn test_normalize_record_fields() {
        let raw = RawRecord {
            name: Some("Doe,&nbsp;Jane".to_string()),
            firm: Some(" Doe &amp; Roe ".to_string()),
            email: Some("mailto:JANE@DOE.LAW".to_string()),
            phone: Some("tel:6145550100".to_string()),
            website: Some("doe.law".to_string()),
            year: Some("Admitted 2009".to_string()),
            ..RawRecord::default()
        };

        let record = normalize_record(raw, provenance()).expect("record");
        assert_eq!(record.name.first.as_deref(), Some("Jane"));
        assert_eq!(record.name.last.as_deref(), Some("Doe"));
        assert_eq!(record.firm.as_deref(), Some("Doe & Roe"));
        assert_eq!(record.contact.email.as_deref(), Some("jane@doe.law"));
        assert_eq!(record.contact.phone.as_deref(), Some("6145550100"));
        assert_eq!(record.contact.website.as_deref(), Some("https://doe.law"));
        assert_eq!(record.year, Some(2009));
    }

    #[test]
    fn test_normalize_record_pre_split_names() {
        let raw = RawRecord {
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            ..RawRecord::default()
        };
        let record = normalize_record(raw, provenance()).expect("record");
        assert_eq!(record.name.full, "Jane Doe");
        assert_eq!(record.name.first.as_deref(), Some("Jane"));
        assert_eq!(record.name.last.as_deref(), Some("Doe"));
    }
}
