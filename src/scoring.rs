//! Completeness score for leads.
//!
//! Every lead starts at [`BASE_SCORE`]. Website enrichment adds points for a recovered
//! email, a named contact and a company description; the total never exceeds 100.

use crate::models::{Lead, PrimaryContact, WebsiteAnalysis, WebsiteContact};

pub const BASE_SCORE: u8 = 70;
pub const EMAIL_BONUS: u8 = 15;
pub const CONTACT_BONUS: u8 = 10;
pub const DESCRIPTION_BONUS: u8 = 5;
pub const MAX_SCORE: u8 = 100;

/// Merges a website analysis into a lead that has not been appended yet.
///
/// The first extracted email becomes the lead email and the first contact becomes the
/// primary contact. The analysis itself is attached as-is.
pub fn apply_website_analysis(lead: &mut Lead, analysis: WebsiteAnalysis) {
    let mut score = u32::from(lead.score);

    if let Some(email) = analysis.extracted_emails.first() {
        lead.email = Some(email.clone());
        score += u32::from(EMAIL_BONUS);
    }

    if let Some(contact) = analysis.contacts.first() {
        lead.primary_contact = Some(primary_contact(contact));
        score += u32::from(CONTACT_BONUS);
    }

    if analysis.description.is_some() {
        score += u32::from(DESCRIPTION_BONUS);
    }

    lead.score = clamp_score(score);
    lead.website_analysis = Some(analysis);
}

pub fn clamp_score(score: u32) -> u8 {
    score.min(u32::from(MAX_SCORE)) as u8
}

pub fn primary_contact(contact: &WebsiteContact) -> PrimaryContact {
    let (first_name, last_name) = split_name(&contact.name);
    PrimaryContact {
        first_name,
        last_name,
        position: contact.position.clone(),
        phone: contact.phone.clone(),
        email: contact.email.clone(),
    }
}

/// First whitespace token is the first name, the rest is the last name.
pub fn split_name(name: &str) -> (Option<String>, Option<String>) {
    let mut tokens = name.split_whitespace();
    let first = tokens.next().map(str::to_string);
    let rest: Vec<&str> = tokens.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (first, last)
}
