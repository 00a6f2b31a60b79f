//! Website contact extraction.
//!
//! Fetches a company's home page plus its imprint and contact pages and pulls out a
//! short description, advertised services, email addresses, phone numbers and named
//! contacts. Matching is heuristic and tuned for German small-business sites; the
//! keyword sets and thresholds below are the behavioral contract and must not drift.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{WebsiteAnalysis, WebsiteContact};
use regex::Regex;
use reqwest::{redirect, Client};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const DESCRIPTION_MAX_CHARS: usize = 300;
const DESCRIPTION_MIN_CHARS: usize = 100;
const MAX_SERVICES: usize = 10;
const MAX_CONTACTS: usize = 5;
const MAX_NAME_LINE_CHARS: usize = 50;
/// The name line itself plus the following four lines.
const CONTACT_LOOKAHEAD: usize = 5;

const IMPRINT_KEYWORDS: &[&str] = &["impressum", "imprint", "legal", "rechtliches"];
const CONTACT_KEYWORDS: &[&str] = &["kontakt", "contact", "ansprechpartner"];
const POSITION_KEYWORDS: &[&str] = &[
    "geschäftsführer",
    "leiter",
    "inhaber",
    "manager",
    "direktor",
    "chef",
];
const EMAIL_BLACKLIST: &[&str] = &[
    "example.com",
    "domain.com",
    "email.com",
    "test.com",
    "placeholder",
];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});

static PHONE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // +49 ...
        Regex::new(r"\+49[\s-]?\d{2,4}[\s-]?\d{3,9}").expect("valid phone regex"),
        // 0123 ...
        Regex::new(r"0\d{2,5}[\s-]?\d{3,9}").expect("valid phone regex"),
        // (0123) ...
        Regex::new(r"\(\d{2,5}\)[\s-]?\d{3,9}").expect("valid phone regex"),
    ]
});

static PHONE_HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d+()]").expect("valid phone hint regex"));

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-ZÄÖÜ][a-zäöüß]+)\s+([A-ZÄÖÜ][a-zäöüß]+)").expect("valid name regex")
});

static DESCRIPTION_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)about|description|intro|hero").expect("valid description regex")
});

static SERVICE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)leistung|service|angebot|produkt").expect("valid service regex")
});

static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="description"]"#));
static DESCRIPTION_BLOCKS: LazyLock<Selector> = LazyLock::new(|| selector("p, div"));
static SERVICE_SECTIONS: LazyLock<Selector> = LazyLock::new(|| selector("div, section"));
static SERVICE_ITEMS: LazyLock<Selector> = LazyLock::new(|| selector("li, h3, h4"));
static CONTACT_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| selector("div, section, article, p"));
static LINKS: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

/// Crawls a company website for contact data.
#[derive(Clone)]
pub struct WebsiteAnalyzer {
    client: Client,
}

impl WebsiteAnalyzer {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(|e| AppError::FetchError(format!("Failed to create website client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(config.website_timeout())
    }

    /// Analyzes the site rooted at `url`.
    ///
    /// Never fails: unreachable pages are logged and contribute nothing, so the result
    /// may be partially or entirely empty.
    pub async fn analyze(&self, url: &str) -> WebsiteAnalysis {
        let mut result = WebsiteAnalysis::default();
        let mut contacts = Vec::new();

        let root = match self.fetch_page(url).await {
            Ok(body) => RootFindings::parse(&body, url),
            Err(e) => {
                tracing::warn!("Could not load page {}: {}", url, e);
                return result;
            }
        };

        result.description = root.description;
        result.services = root.services;
        result.extracted_emails.extend(root.page.emails);
        result.extracted_phones.extend(root.page.phones);
        contacts.extend(root.page.contacts);

        let mut sub_pages = Vec::new();
        if let Some(imprint) = &root.imprint_url {
            sub_pages.push(imprint.clone());
        }
        if let Some(contact) = root.contact_url {
            if root.imprint_url.as_deref() != Some(contact.as_str()) {
                sub_pages.push(contact);
            }
        }

        for page_url in sub_pages {
            match self.fetch_page(&page_url).await {
                Ok(body) => {
                    let page = PageFindings::parse(&body);
                    result.extracted_emails.extend(page.emails);
                    result.extracted_phones.extend(page.phones);
                    contacts.extend(page.contacts);
                }
                Err(e) => tracing::warn!("Could not load page {}: {}", page_url, e),
            }
        }

        result.extracted_emails = dedup_preserving_order(result.extracted_emails);
        result.extracted_phones = dedup_preserving_order(result.extracted_phones);
        result.contacts = dedup_contacts(contacts);

        tracing::info!(
            "✅ Website analysis for {}: {} emails, {} phones, {} contacts",
            url,
            result.extracted_emails.len(),
            result.extracted_phones.len(),
            result.contacts.len()
        );

        result
    }

    async fn fetch_page(&self, url: &str) -> Result<String, AppError> {
        tracing::debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::FetchError(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::FetchError(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::FetchError(format!("{}: failed to read body: {}", url, e)))
    }
}

/// What a single page contributes. Owned data only, so it can cross await points.
#[derive(Debug, Default)]
struct PageFindings {
    emails: Vec<String>,
    phones: Vec<String>,
    contacts: Vec<WebsiteContact>,
}

impl PageFindings {
    fn parse(body: &str) -> Self {
        let document = Html::parse_document(body);
        Self::from_document(&document)
    }

    fn from_document(document: &Html) -> Self {
        let text = visible_text(document);
        Self {
            emails: extract_emails(&text),
            phones: extract_phones(&text),
            contacts: contacts_in_document(document),
        }
    }
}

#[derive(Debug, Default)]
struct RootFindings {
    description: Option<String>,
    services: Vec<String>,
    imprint_url: Option<String>,
    contact_url: Option<String>,
    page: PageFindings,
}

impl RootFindings {
    fn parse(body: &str, base_url: &str) -> Self {
        let document = Html::parse_document(body);
        let base = Url::parse(base_url).ok();

        Self {
            description: description_in_document(&document),
            services: services_in_document(&document),
            imprint_url: base
                .as_ref()
                .and_then(|b| find_link(&document, b, IMPRINT_KEYWORDS)),
            contact_url: base
                .as_ref()
                .and_then(|b| find_link(&document, b, CONTACT_KEYWORDS)),
            page: PageFindings::from_document(&document),
        }
    }
}

/// Emails in `text`, lowercased, minus placeholder domains. May contain duplicates.
pub fn extract_emails(text: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|email| !EMAIL_BLACKLIST.iter().any(|bl| email.contains(bl)))
        .collect()
}

/// Phone numbers in `text` with whitespace and hyphens removed. May contain duplicates.
pub fn extract_phones(text: &str) -> Vec<String> {
    PHONE_RES
        .iter()
        .flat_map(|re| re.find_iter(text))
        .map(|m| {
            m.as_str()
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect::<String>()
        })
        .filter(|phone| (6..=20).contains(&phone.chars().count()))
        .collect()
}

/// Meta description, or the first long "about/intro" block, cut to 300 characters.
pub fn extract_description(html: &str) -> Option<String> {
    description_in_document(&Html::parse_document(html))
}

/// Service names listed inside service-like sections, at most 10.
pub fn extract_services(html: &str) -> Vec<String> {
    services_in_document(&Html::parse_document(html))
}

/// Named contacts found on one page, at most 5 and not deduplicated.
pub fn extract_contacts(html: &str) -> Vec<WebsiteContact> {
    contacts_in_document(&Html::parse_document(html))
}

pub fn find_imprint_link(html: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    find_link(&Html::parse_document(html), &base, IMPRINT_KEYWORDS)
}

pub fn find_contact_link(html: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    find_link(&Html::parse_document(html), &base, CONTACT_KEYWORDS)
}

fn description_in_document(document: &Html) -> Option<String> {
    let meta = document
        .select(&META_DESCRIPTION)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::trim)
        .filter(|content| !content.is_empty());
    if let Some(content) = meta {
        return Some(truncate_chars(content, DESCRIPTION_MAX_CHARS));
    }

    document
        .select(&DESCRIPTION_BLOCKS)
        .filter(|el| class_matches(el, &DESCRIPTION_CLASS_RE))
        .map(|el| stripped_text(&el))
        .find(|text| text.chars().count() > DESCRIPTION_MIN_CHARS)
        .map(|text| truncate_chars(&text, DESCRIPTION_MAX_CHARS))
}

fn services_in_document(document: &Html) -> Vec<String> {
    document
        .select(&SERVICE_SECTIONS)
        .filter(|section| class_matches(section, &SERVICE_CLASS_RE))
        .flat_map(|section| {
            section
                .select(&SERVICE_ITEMS)
                .map(|item| stripped_text(&item))
                .collect::<Vec<_>>()
        })
        .filter(|text| {
            let len = text.chars().count();
            len > 10 && len < 100
        })
        .take(MAX_SERVICES)
        .collect()
}

fn contacts_in_document(document: &Html) -> Vec<WebsiteContact> {
    let mut contacts = Vec::new();

    for block in document.select(&CONTACT_BLOCKS) {
        let lines = block_lines(&block);
        contacts.extend(contacts_in_lines(&lines));
        if contacts.len() >= MAX_CONTACTS {
            break;
        }
    }

    contacts.truncate(MAX_CONTACTS);
    contacts
}

/// Scans lines for `Firstname Lastname`, an optional role on the next line and an
/// email or phone within the lookahead window.
fn contacts_in_lines(lines: &[String]) -> Vec<WebsiteContact> {
    let mut contacts = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(name) = NAME_RE.find(line) else {
            continue;
        };
        if line.chars().count() >= MAX_NAME_LINE_CHARS {
            continue;
        }

        let position = lines.get(i + 1).filter(|next| {
            let lower = next.to_lowercase();
            POSITION_KEYWORDS.iter().any(|kw| lower.contains(kw))
        });

        let mut email = None;
        let mut phone = None;
        for candidate in &lines[i..(i + CONTACT_LOOKAHEAD).min(lines.len())] {
            if candidate.contains('@') {
                if let Some(found) = extract_emails(candidate).into_iter().next() {
                    email = Some(found);
                }
            }
            if PHONE_HINT_RE.is_match(candidate) {
                if let Some(found) = extract_phones(candidate).into_iter().next() {
                    phone = Some(found);
                }
            }
        }

        contacts.push(WebsiteContact {
            name: name.as_str().to_string(),
            position: position.cloned(),
            email,
            phone,
        });
    }

    contacts
}

/// First anchor whose href or text contains a keyword, resolved against `base`.
fn find_link(document: &Html, base: &Url, keywords: &[&str]) -> Option<String> {
    document.select(&LINKS).find_map(|link| {
        let href = link.value().attr("href")?;
        let href_lower = href.to_lowercase();
        let text_lower = link.text().collect::<String>().to_lowercase();

        if !keywords
            .iter()
            .any(|kw| href_lower.contains(kw) || text_lower.contains(kw))
        {
            return None;
        }

        // mailto:/tel: anchors often carry "kontakt" but are not pages.
        let resolved = base.join(href).ok()?;
        matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
    })
}

fn class_matches(element: &ElementRef<'_>, pattern: &Regex) -> bool {
    element
        .value()
        .attr("class")
        .is_some_and(|class| pattern.is_match(class))
}

/// Text nodes trimmed and concatenated without separator.
fn stripped_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// One entry per non-empty trimmed text line below `element`.
fn block_lines(element: &ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .flat_map(|t| t.split('\n'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// All text outside script/style blocks, joined with single spaces.
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"))
        });
        let trimmed = text.trim();
        if !hidden && !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// First occurrence of each name wins; capped at 5.
fn dedup_contacts(contacts: Vec<WebsiteContact>) -> Vec<WebsiteContact> {
    let mut seen = HashSet::new();
    contacts
        .into_iter()
        .filter(|contact| !contact.name.is_empty() && seen.insert(contact.name.clone()))
        .take(MAX_CONTACTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_emails_lowercases_and_filters_placeholders() {
        let text = "Mail: Info@Dach-Meier.de oder max@example.com, office@placeholder.de, \
                    vertrieb@dach-meier.de";
        assert_eq!(
            extract_emails(text),
            vec!["info@dach-meier.de", "vertrieb@dach-meier.de"]
        );
    }

    #[test]
    fn test_extract_phones_all_families() {
        let text = "Tel. +49 30 1234567, Büro 030-9876543, Fax (030) 555444";
        let phones = extract_phones(text);

        assert!(phones.contains(&"+49301234567".to_string()));
        assert!(phones.contains(&"0309876543".to_string()));
        assert!(phones.contains(&"(030)555444".to_string()));
        assert!(phones.iter().all(|p| !p.contains(' ') && !p.contains('-')));
    }

    #[test]
    fn test_extract_phones_ignores_short_digit_runs() {
        assert!(extract_phones("PLZ 0123 45").is_empty());
        assert!(extract_phones("keine Nummer hier").is_empty());
    }

    #[test]
    fn test_description_prefers_meta() {
        let html = r#"<html><head><meta name="description" content="  Ihr Dachdecker in Berlin  "></head>
            <body><div class="about">kurz</div></body></html>"#;
        assert_eq!(
            extract_description(html).as_deref(),
            Some("Ihr Dachdecker in Berlin")
        );
    }

    #[test]
    fn test_description_falls_back_to_long_about_block() {
        let long = "Wir sind ein familiengeführter Handwerksbetrieb. ".repeat(10);
        let html = format!(
            r#"<body><p class="intro">Zu kurz</p><div class="hero-text">{}</div></body>"#,
            long
        );

        let description = extract_description(&html).unwrap();
        assert_eq!(description.chars().count(), 300);
        assert!(description.starts_with("Wir sind ein familiengeführter"));
    }

    #[test]
    fn test_description_absent() {
        assert_eq!(extract_description("<body><p>Hallo</p></body>"), None);
    }

    #[test]
    fn test_services_from_service_sections() {
        let html = r#"<body>
            <section class="leistungen">
              <h3>Dachsanierung und Dämmung</h3>
              <ul><li>Kurz</li><li>Flachdachabdichtung</li></ul>
            </section>
            <div class="footer"><li>Nicht relevant für Services</li></div>
        </body>"#;

        assert_eq!(
            extract_services(html),
            vec!["Dachsanierung und Dämmung", "Flachdachabdichtung"]
        );
    }

    #[test]
    fn test_services_capped_at_ten() {
        let items: String = (0..15)
            .map(|i| format!("<li>Leistung Nummer {:02}</li>", i))
            .collect();
        let html = format!(r#"<div class="services"><ul>{}</ul></div>"#, items);
        assert_eq!(extract_services(&html).len(), 10);
    }

    #[test]
    fn test_contact_with_position_and_email() {
        let html = r#"<body><div class="team">
            <p>Max Mustermann</p>
            <p>Geschäftsführer</p>
            <p>max@dach-meier.de</p>
            <p>Tel. 030 1234567</p>
        </div></body>"#;

        let contacts = extract_contacts(html);
        let first = &contacts[0];
        assert_eq!(first.name, "Max Mustermann");
        assert_eq!(first.position.as_deref(), Some("Geschäftsführer"));
        assert_eq!(first.email.as_deref(), Some("max@dach-meier.de"));
        assert_eq!(first.phone.as_deref(), Some("0301234567"));
    }

    #[test]
    fn test_contact_without_role_keyword_has_no_position() {
        let lines = vec!["Erika Musterfrau".to_string(), "Buchhaltung".to_string()];
        let contacts = contacts_in_lines(&lines);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].position, None);
    }

    #[test]
    fn test_long_lines_are_not_names() {
        let lines = vec![
            "Herzlich Willkommen bei unserem Familienbetrieb seit 1950".to_string(),
        ];
        assert!(contacts_in_lines(&lines).is_empty());
    }

    #[test]
    fn test_contacts_capped_at_five_per_page() {
        let people: String = [
            "Anna Schmidt",
            "Bernd Meier",
            "Clara Fischer",
            "Dieter Weber",
            "Eva Wagner",
            "Frank Becker",
        ]
        .iter()
        .map(|name| format!("<span>{}</span><br>", name))
        .collect();
        let html = format!("<body><article>{}</article></body>", people);

        assert_eq!(extract_contacts(&html).len(), 5);
    }

    #[test]
    fn test_dedup_contacts_first_name_wins() {
        let with_role = WebsiteContact {
            name: "Max Mustermann".to_string(),
            position: Some("Inhaber".to_string()),
            email: None,
            phone: None,
        };
        let without_role = WebsiteContact {
            position: None,
            ..with_role.clone()
        };

        let deduped = dedup_contacts(vec![with_role.clone(), without_role]);
        assert_eq!(deduped, vec![with_role]);
    }

    #[test]
    fn test_find_links_resolve_relative_hrefs() {
        let html = r#"<body>
            <a href="mailto:kontakt@firma.de">Schreiben Sie uns</a>
            <a href="/impressum.html">Impressum</a>
            <a href="seiten/ueber-uns">Kontakt</a>
        </body>"#;

        assert_eq!(
            find_imprint_link(html, "https://firma.de/start/").as_deref(),
            Some("https://firma.de/impressum.html")
        );
        assert_eq!(
            find_contact_link(html, "https://firma.de/start/").as_deref(),
            Some("https://firma.de/start/seiten/ueber-uns")
        );
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let document = Html::parse_document(
            r#"<body><script>var a = "js@firma.de";</script><p>info@firma.de</p></body>"#,
        );
        let text = visible_text(&document);
        assert_eq!(extract_emails(&text), vec!["info@firma.de"]);
    }
}
