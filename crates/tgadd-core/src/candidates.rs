//! Line-delimited candidate lists.
//!
//! One phone or `@handle` per line. Blank lines and lines starting with `#`
//! are ignored; raw numbers are normalized to the leading-`+` form.

use std::path::Path;

use crate::{
    domain::{normalize_phone, CandidateIdentity},
    Result,
};

/// Canonical candidate key: handles stay verbatim, phones get a leading `+`.
pub fn normalize_key(raw: &str) -> String {
    let key = raw.trim();
    if key.starts_with('@') {
        key.to_string()
    } else {
        normalize_phone(key)
    }
}

pub fn parse_candidate_lines(text: &str) -> Vec<CandidateIdentity> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(normalize_key)
        .filter(|key| key != "+" && key != "@")
        .map(CandidateIdentity::new)
        .collect()
}

pub async fn load_candidate_file(path: &Path) -> Result<Vec<CandidateIdentity>> {
    let text = tokio::fs::read_to_string(path).await?;
    let out = parse_candidate_lines(&text);
    tracing::info!(path = %path.display(), candidates = out.len(), "loaded candidate file");
    Ok(out)
}
