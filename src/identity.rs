//! Heuristic consumer identity parser.
//!
//! Best-effort, deterministic extraction of the consumer's name and current
//! Canadian address from normalized page text. Every value returned comes
//! with the page it was read from so the ingest pipeline can anchor it.
//!
//! Names come from `Name:` / `Consumer Name:` lines and from the lines that
//! follow a `Consumer Information` header. Addresses come from the block of
//! up to eight lines starting at an address header; blocks are scored by
//! postal code (+5), province (+3), a street number (+1) and being on page 1
//! (+2). Ties keep the first block found.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

static POSTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([A-Z]\d[A-Z])\s?(\d[A-Z]\d)\b").unwrap());
static PROVINCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(AB|BC|MB|NB|NL|NS|NT|NU|ON|PE|QC|SK|YT)\b").unwrap()
});
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,6}\b").unwrap());
static NAME_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bconsumer\s+name\b|\bname\b)\s*[:\-]\s*(.+)").unwrap()
});
static CONSUMER_INFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bconsumer\s+information\b").unwrap());
static ADDRESS_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcurrent\s+address\b|\baddress\b|\bresidential\s+address\b").unwrap()
});
static ADDRESS_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\baddress\b\s*[:\-]?\s*(.+)").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NAME_CLEAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z \-'.]").unwrap());

const NAME_STOP_WORDS: &[&str] = &[
    "transunion",
    "equifax",
    "report",
    "consumer",
    "address",
    "credit",
    "monitoring",
];
const MAX_NAME_CHARS: usize = 80;
const CONSUMER_INFO_SCAN_LINES: usize = 40;
const CONSUMER_INFO_FOLLOW_LINES: usize = 5;
const ADDRESS_BLOCK_LINES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentAddress {
    pub line1: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
}

/// Parsed identity plus the 1-based evidence pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub full_name: Option<String>,
    pub name_page: Option<u32>,
    pub current_address: CurrentAddress,
    pub address_page: Option<u32>,
    pub address_block: Option<String>,
}

pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").into_owned()
}

/// First Canadian postal code, upper-cased as `A1A 1A1`.
pub fn find_postal_code(text: &str) -> Option<String> {
    POSTAL_RE
        .captures(text)
        .map(|c| format!("{} {}", c[1].to_uppercase(), c[2].to_uppercase()))
}

pub fn find_province(text: &str) -> Option<String> {
    PROVINCE_RE.captures(text).map(|c| c[1].to_uppercase())
}

pub fn looks_like_name(s: &str) -> bool {
    let s = normalize_whitespace(s);
    if s.is_empty() {
        return false;
    }
    let cleaned = NAME_CLEAN_RE.replace_all(&s, "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() < 4 {
        return false;
    }
    if cleaned.chars().filter(|c| c.is_alphabetic()).count() < 3 {
        return false;
    }
    let lower = cleaned.to_lowercase();
    if NAME_STOP_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    cleaned.split_whitespace().count() >= 2
}

pub fn score_name(s: &str) -> u32 {
    let s = normalize_whitespace(s);
    let words = s.split_whitespace().count();
    let mut score = 0;
    if (2..=4).contains(&words) {
        score += 4;
    }
    let alpha = s.chars().filter(|c| c.is_alphabetic()).count() as u32;
    score += (alpha / 3).min(6);
    if s.chars().count() <= 40 {
        score += 2;
    }
    score
}

fn score_address_block(page: u32, block: &str) -> u32 {
    let mut score = 0;
    if find_postal_code(block).is_some() {
        score += 5;
    }
    if find_province(block).is_some() {
        score += 3;
    }
    if NUMBER_RE.is_match(block) {
        score += 1;
    }
    if page == 1 {
        score += 2;
    }
    score
}

struct NameCandidate {
    page: u32,
    name: String,
    score: u32,
}

/// Parse identity fields from normalized page texts.
pub fn extract_identity(pages: &[String]) -> Identity {
    let mut names: Vec<NameCandidate> = Vec::new();
    let mut blocks: Vec<(u32, String)> = Vec::new();

    for (idx, text) in pages.iter().enumerate() {
        let page = idx as u32 + 1;
        collect_labelled_names(page, text, &mut names);
        collect_consumer_info_names(page, text, &mut names);
        collect_address_blocks(page, text, &mut blocks);
    }

    let mut identity = Identity::default();

    // Highest score wins; ties go to the earlier page, then to discovery order.
    if let Some(best) = names
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            a.score
                .cmp(&b.score)
                .then_with(|| b.page.cmp(&a.page))
                .then_with(|| ib.cmp(ia))
        })
        .map(|(_, c)| c)
    {
        identity.full_name = Some(best.name.clone());
        identity.name_page = Some(best.page);
    }

    let mut best_block: Option<(u32, &str)> = None;
    let mut best_score = None;
    for (page, block) in &blocks {
        let score = score_address_block(*page, block);
        if best_score.map_or(true, |s| score > s) {
            best_score = Some(score);
            best_block = Some((*page, block.as_str()));
        }
    }

    if let Some((page, block)) = best_block {
        identity.current_address = parse_address_block(block);
        identity.address_page = Some(page);
        identity.address_block = Some(block.to_string());
    }

    identity
}

fn collect_labelled_names(page: u32, text: &str, out: &mut Vec<NameCandidate>) {
    for caps in NAME_LINE_RE.captures_iter(text) {
        let candidate = normalize_whitespace(&caps[1]);
        let candidate = candidate.split(" | ").next().unwrap_or("").trim();
        let candidate: String = candidate.chars().take(MAX_NAME_CHARS).collect();
        let candidate = candidate.trim();
        if looks_like_name(candidate) {
            out.push(NameCandidate {
                page,
                name: candidate.to_string(),
                score: score_name(candidate),
            });
        }
    }
}

fn collect_consumer_info_names(page: u32, text: &str, out: &mut Vec<NameCandidate>) {
    if !CONSUMER_INFO_RE.is_match(text) {
        return;
    }
    let lines: Vec<String> = text
        .lines()
        .map(normalize_whitespace)
        .filter(|l| !l.is_empty())
        .collect();
    let scan = lines.len().min(CONSUMER_INFO_SCAN_LINES);
    for i in 0..scan {
        if !CONSUMER_INFO_RE.is_match(&lines[i]) {
            continue;
        }
        let end = (i + 1 + CONSUMER_INFO_FOLLOW_LINES).min(lines.len());
        for next in &lines[i + 1..end] {
            if looks_like_name(next) {
                out.push(NameCandidate {
                    page,
                    name: next.clone(),
                    score: score_name(next) + 2,
                });
            }
        }
    }
}

fn collect_address_blocks(page: u32, text: &str, out: &mut Vec<(u32, String)>) {
    let lines: Vec<String> = text.lines().map(normalize_whitespace).collect();
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() || !ADDRESS_HEADER_RE.is_match(line) {
            continue;
        }
        let end = (i + ADDRESS_BLOCK_LINES).min(lines.len());
        let block = lines[i..end]
            .iter()
            .filter(|l| !l.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let block = block.trim();
        if find_postal_code(block).is_some() || NUMBER_RE.is_match(block) {
            out.push((page, block.to_string()));
        }
    }
}

fn parse_address_block(block: &str) -> CurrentAddress {
    let postal = find_postal_code(block);
    let province = find_province(block);

    let city = postal.as_deref().and_then(|postal| {
        let compact = postal.replace(' ', "");
        let line = block
            .lines()
            .find(|l| l.replace(' ', "").to_uppercase().contains(&compact))?;
        let mut city = normalize_whitespace(line).replace(',', " ");
        city = remove_case_insensitive(&city, &regex::escape(postal));
        city = remove_case_insensitive(&city, &regex::escape(&compact));
        if let Some(prov) = province.as_deref() {
            city = remove_case_insensitive(&city, &format!(r"\b{}\b", regex::escape(prov)));
        }
        let city = normalize_whitespace(&city);
        (!city.is_empty()).then_some(city)
    });

    let lines: Vec<String> = block
        .lines()
        .map(normalize_whitespace)
        .filter(|l| !l.is_empty())
        .collect();

    let mut line1 = None;
    for line in &lines {
        let alpha = line.chars().filter(|c| c.is_alphabetic()).count();
        if !NUMBER_RE.is_match(line) || alpha < 4 {
            continue;
        }
        if ADDRESS_HEADER_RE.is_match(line) {
            // A labelled line only counts when the label carries a value.
            if let Some(caps) = ADDRESS_LABEL_RE.captures(line) {
                let value = normalize_whitespace(&caps[1]);
                if !value.is_empty() {
                    line1 = Some(value);
                    break;
                }
            }
            continue;
        }
        line1 = Some(line.clone());
        break;
    }
    if line1.is_none() && lines.len() >= 2 {
        line1 = Some(lines[1].clone());
    }

    CurrentAddress {
        line1,
        city,
        province,
        postal_code: postal,
    }
}

fn remove_case_insensitive(text: &str, pattern: &str) -> String {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.replace_all(text, " ").into_owned(),
        Err(_) => text.to_string(),
    }
}
