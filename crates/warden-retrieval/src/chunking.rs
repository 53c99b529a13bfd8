//! Section chunking.
//!
//! A section is tokenized on whitespace and cut into windows of at most
//! `window_tokens` tokens, consecutive windows sharing `overlap_tokens`
//! tokens. A window that would split a paragraph ends early at the last
//! paragraph boundary, as long as that keeps it at least half full.

use warden_contracts::{config::ChunkingConfig, corpus::PolicySection};

/// One window of a section, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionWindow {
    pub id: String,
    pub section_ref: String,
    pub title: String,
    pub text: String,
}

/// Cut `section` into windows.
///
/// A section that fits in one window yields a single window whose id is the
/// section id; longer sections yield `<id>#1`, `<id>#2`, and so on. Blank
/// content yields nothing.
pub fn chunk_section(section: &PolicySection, config: &ChunkingConfig) -> Vec<SectionWindow> {
    let (tokens, paragraph_starts) = tokenize(&section.content);
    if tokens.is_empty() {
        return vec![];
    }

    let window = config.window_tokens.max(1);
    let overlap = config.overlap_tokens.min(window - 1);
    let mut spans = vec![];
    let mut start = 0;

    loop {
        let mut end = (start + window).min(tokens.len());
        if end < tokens.len() {
            let floor = (start + overlap + 1).max(start + window / 2);
            if let Some(boundary) = (floor..end).rev().find(|&i| paragraph_starts[i]) {
                end = boundary;
            }
        }
        spans.push((start, end));
        if end == tokens.len() {
            break;
        }
        start = end - overlap;
    }

    let single = spans.len() == 1;
    spans
        .into_iter()
        .enumerate()
        .map(|(n, (start, end))| SectionWindow {
            id: if single {
                section.id.clone()
            } else {
                format!("{}#{}", section.id, n + 1)
            },
            section_ref: section.id.clone(),
            title: section.title.clone(),
            text: join(&tokens[start..end], &paragraph_starts[start..end]),
        })
        .collect()
}

/// Whitespace tokens, plus a flag per token marking the first token of a
/// paragraph.
fn tokenize(content: &str) -> (Vec<&str>, Vec<bool>) {
    let mut tokens = vec![];
    let mut starts = vec![];
    for paragraph in content.split("\n\n").flat_map(|p| p.split("\r\n\r\n")) {
        for (i, token) in paragraph.split_whitespace().enumerate() {
            tokens.push(token);
            starts.push(i == 0);
        }
    }
    (tokens, starts)
}

fn join(tokens: &[&str], paragraph_starts: &[bool]) -> String {
    let mut text = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            text.push_str(if paragraph_starts[i] { "\n\n" } else { " " });
        }
        text.push_str(token);
    }
    text
}
