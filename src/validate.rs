//! Client-side field validators.
//!
//! Every check returns `Ok(())` or a [`Reason`] carrying a message that can be
//! shown to the user as is. Callers attach the field name via
//! [`ValidationError`] and block submission on the first failure.

use chrono::NaiveDate;

use crate::error::{Reason, ValidationError};
use crate::models::{ClaimantInfo, FinderInfo, Location, NewItemReport};

pub type Check = Result<(), Reason>;

fn fail(msg: impl Into<String>) -> Check {
    Err(Reason(msg.into()))
}

fn field(name: &'static str, check: Check) -> Result<(), ValidationError> {
    check.map_err(|reason| ValidationError { field: name, reason })
}

fn required(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError { field: name, reason: Reason(format!("{} is required", name.replace('_', " "))) });
    }
    Ok(())
}

// ---------------- student id ----------------

/// `NNNN-NNNN`
pub fn student_id(value: &str) -> Check {
    let b = value.trim().as_bytes();
    let ok = b.len() == 9
        && b[4] == b'-'
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[5..].iter().all(u8::is_ascii_digit);
    if ok {
        Ok(())
    } else {
        fail("Student ID must be in the format 1234-5678")
    }
}

/// Keystroke formatting: keep at most 8 digits, hyphen after the fourth.
pub fn format_student_id(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).take(8).collect();
    if digits.len() > 4 {
        format!("{}-{}", &digits[..4], &digits[4..])
    } else {
        digits
    }
}

// ---------------- phone ----------------

pub fn phone(value: &str) -> Check {
    let v = value.trim();
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if let Some(rest) = v.strip_prefix("+63") {
        if rest.len() == 10 && all_digits(rest) {
            return Ok(());
        }
        return fail("Numbers starting with +63 must be followed by 10 digits (e.g. +639123456789)");
    }
    if v.starts_with("09") {
        if v.len() == 11 && all_digits(v) {
            return Ok(());
        }
        return fail("Numbers starting with 09 must be 11 digits long (e.g. 09123456789)");
    }
    fail("Contact number must start with 09 or +63")
}

// ---------------- email ----------------

const EMAIL_DOMAIN: &str = "gmail.com";

const DOMAIN_TYPOS: &[&str] = &[
    "gmai.com", "gmial.com", "gmal.com", "gamil.com", "gmail.co",
    "gmail.con", "gmail.cm", "gnail.com", "gmaill.com",
];

pub fn email(value: &str) -> Check {
    let v = value.trim();
    let mut parts = v.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(l), Some(d), None) => (l, d),
        _ => return fail("Email must contain exactly one @"),
    };
    if local.is_empty() {
        return fail("Email is missing the part before @gmail.com");
    }
    if DOMAIN_TYPOS.iter().any(|t| t.eq_ignore_ascii_case(domain)) {
        return fail(format!("Did you mean {local}@{EMAIL_DOMAIN}?"));
    }
    if !domain.eq_ignore_ascii_case(EMAIL_DOMAIN) {
        return fail("Only @gmail.com addresses are accepted");
    }
    Ok(())
}

// ---------------- full name ----------------

pub fn full_name(value: &str) -> Check {
    let v = value.trim();
    if !v.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '\'' || c == '-') {
        return fail("Name may only contain letters, spaces, apostrophes and hyphens");
    }
    let parts: Vec<&str> = v.split_whitespace().collect();
    if parts.len() < 2 {
        return fail("Please enter a first and last name");
    }
    if parts.iter().any(|p| p.chars().count() < 2) {
        return fail("Each part of the name must be at least 2 characters");
    }
    Ok(())
}

// ---------------- free-text quality ----------------

/// Pluggable free-text quality gate.
pub trait TextCheck: Send + Sync {
    fn check(&self, text: &str) -> Check;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRules {
    pub max_special: usize,
    pub max_repeat: usize,
    pub max_consonant_run: usize,
}

impl Default for TextRules {
    fn default() -> Self {
        Self { max_special: 3, max_repeat: 3, max_consonant_run: 4 }
    }
}

const KEYBOARD_WALKS: &[&str] = &[
    "qwert", "werty", "asdf", "sdfg", "zxcv", "xcvb", "yuiop", "hjkl", "ghjk", "1234567",
];

/// Keyboard-mash / spam heuristic. False positives are expected; tune via
/// [`TextRules`].
#[derive(Debug, Clone, Default)]
pub struct GibberishHeuristic {
    pub rules: TextRules,
}

impl GibberishHeuristic {
    pub fn new(rules: TextRules) -> Self {
        Self { rules }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

impl TextCheck for GibberishHeuristic {
    fn check(&self, text: &str) -> Check {
        let special = text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count();
        if special > self.rules.max_special {
            return fail("Too many special characters");
        }

        let mut prev: Option<char> = None;
        let mut repeat = 0usize;
        let mut consonants = 0usize;
        for c in text.chars().map(|c| c.to_ascii_lowercase()) {
            repeat = if prev == Some(c) { repeat + 1 } else { 1 };
            if repeat > self.rules.max_repeat {
                return fail("Too many repeated characters");
            }
            prev = Some(c);

            consonants = if c.is_ascii_alphabetic() && !is_vowel(c) { consonants + 1 } else { 0 };
            if consonants > self.rules.max_consonant_run {
                return fail("Text looks like random letters; please describe it in words");
            }
        }

        let lower = text.to_lowercase();
        if let Some(walk) = KEYBOARD_WALKS.iter().find(|w| lower.contains(*w)) {
            return fail(format!("Text contains a keyboard pattern ('{walk}')"));
        }
        Ok(())
    }
}

// ---------------- composite gates ----------------

/// Gate for a new lost/found report.
pub fn report(r: &NewItemReport, text: &dyn TextCheck) -> Result<(), ValidationError> {
    required("item_name", &r.item_name)?;
    required("description", &r.description)?;
    required("location", &r.location)?;
    required("reporter_name", &r.reporter_name)?;
    required("student_id", &r.student_id)?;
    required("contact_info", &r.contact_info)?;

    field("item_name", text.check(&r.item_name))?;
    field("description", text.check(&r.description))?;
    if let Location::Others(free) = Location::parse(&r.location) {
        field("location", text.check(&free))?;
    }
    field("reporter_name", full_name(&r.reporter_name))?;
    field("student_id", student_id(&r.student_id))?;
    field("contact_info", phone(&r.contact_info))?;
    Ok(())
}

/// Gate for lost -> found. `today` bounds the found date.
pub fn finder(f: &FinderInfo, today: NaiveDate) -> Result<(), ValidationError> {
    required("finder_name", &f.finder_name)?;
    required("finder_student_id", &f.finder_student_id)?;
    required("finder_contact", &f.finder_contact)?;
    field("finder_name", full_name(&f.finder_name))?;
    field("finder_student_id", student_id(&f.finder_student_id))?;
    field("finder_contact", phone(&f.finder_contact))?;
    if f.found_date > today {
        return field("found_date", fail("Found date cannot be in the future"));
    }
    Ok(())
}

pub fn claimant(c: &ClaimantInfo) -> Result<(), ValidationError> {
    required("claimant_name", &c.claimant_name)?;
    required("claimant_student_id", &c.claimant_student_id)?;
    field("claimant_name", full_name(&c.claimant_name))?;
    field("claimant_student_id", student_id(&c.claimant_student_id))?;
    match c.claimant_contact.as_deref().map(str::trim) {
        Some(contact) if !contact.is_empty() => field("claimant_contact", phone(contact)),
        _ => Ok(()),
    }
}
