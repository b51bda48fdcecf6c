// Copyright 2026 Thomas Johannesson
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Structural artifact parser.
//
// An artifact is a sequence of typed one-letter "cards", one per line,
// in card-letter order. Only the cards the browser consumes are modelled;
// unrecognised cards are skipped. The W card is length-prefixed and may
// contain newlines, so parsing tracks byte positions rather than lines.

use super::{RepoError, RepoResult};

/// File permissions carried on an F card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilePerm {
    #[default]
    Regular,
    Executable,
    Symlink,
}

/// One tracked file of a checkin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FCard {
    pub name: String,
    /// Content hash; `None` only inside a delta manifest, where it marks
    /// the baseline entry as removed.
    pub uuid: Option<String>,
    pub perms: FilePerm,
    /// Name in the parent checkin when the file was renamed.
    pub prior_name: Option<String>,
}

/// The sign of a T card: add, cancel, or propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDisposition {
    Add,
    Cancel,
    Propagate,
}

impl TagDisposition {
    pub fn label(self) -> &'static str {
        match self {
            TagDisposition::Add => "add",
            TagDisposition::Cancel => "cancel",
            TagDisposition::Propagate => "propagate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TCard {
    pub disposition: TagDisposition,
    pub name: String,
    /// Target artifact, or `*` for self-reference.
    pub target: String,
    pub value: Option<String>,
}

/// A ticket field change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JCard {
    pub field: String,
    pub value: Option<String>,
    /// `+`-prefixed fields append to the prior value.
    pub append: bool,
}

/// Parsed form of an artifact, exposing the cards the browser reads.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    /// Baseline manifest hash (B card) of a delta manifest.
    pub baseline: Option<String>,
    pub fcards: Vec<FCard>,
    /// Parent hashes (P card); first entry is the primary parent.
    pub parents: Vec<String>,
    pub tcards: Vec<TCard>,
    pub jcards: Vec<JCard>,
    pub user: Option<String>,
    pub date: Option<String>,
    pub comment: Option<String>,
    /// Wiki page title (L card).
    pub wiki_title: Option<String>,
    /// Technote id (E card).
    pub technote_id: Option<String>,
    pub mimetype: Option<String>,
    /// W card body.
    pub body: Option<String>,
}

impl Deck {
    /// Parse artifact text into a deck.
    pub fn parse(text: &str) -> RepoResult<Deck> {
        let mut deck = Deck::default();
        let bytes = text.as_bytes();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let eol = text[pos..]
                .find('\n')
                .map(|i| pos + i)
                .unwrap_or(bytes.len());
            let line = &text[pos..eol];
            let mut next = eol + 1;
            if let Some(rest) = line.strip_prefix("W ") {
                let count: usize = rest.trim().parse().map_err(|_| {
                    RepoError::Malformed("W card with non-numeric length".into())
                })?;
                let start = eol + 1;
                let end = start.checked_add(count).filter(|&e| e <= bytes.len());
                let end =
                    end.ok_or_else(|| RepoError::Malformed("W card body truncated".into()))?;
                let body = text
                    .get(start..end)
                    .ok_or_else(|| RepoError::Malformed("W card body not UTF-8 aligned".into()))?;
                deck.body = Some(body.to_string());
                // Skip the body and its trailing newline.
                next = end + 1;
            } else {
                deck.parse_card(line)?;
            }
            pos = next;
        }
        Ok(deck)
    }

    fn parse_card(&mut self, line: &str) -> RepoResult<()> {
        let (letter, rest) = match line.split_once(' ') {
            Some((l, r)) if l.len() == 1 => (l.as_bytes()[0], r),
            _ => return Ok(()), // blank separator or free-form trailing text
        };
        match letter {
            b'B' => self.baseline = Some(rest.trim().to_string()),
            b'C' => self.comment = Some(decode(rest)),
            b'D' => self.date = Some(rest.trim().to_string()),
            b'E' => {
                // E <datetime> <id>
                if let Some((date, id)) = rest.split_once(' ') {
                    if self.date.is_none() {
                        self.date = Some(date.to_string());
                    }
                    self.technote_id = Some(id.trim().to_string());
                }
            }
            b'F' => {
                let mut fields = rest.split(' ');
                let name = fields
                    .next()
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| RepoError::Malformed("F card without a name".into()))?;
                let uuid = fields.next().map(str::to_string).filter(|u| !u.is_empty());
                let perms = match fields.next() {
                    Some("x") => FilePerm::Executable,
                    Some("l") => FilePerm::Symlink,
                    _ => FilePerm::Regular,
                };
                let prior_name = fields.next().map(decode);
                self.fcards.push(FCard {
                    name: decode(name),
                    uuid,
                    perms,
                    prior_name,
                });
            }
            b'J' => {
                let (field, value) = match rest.split_once(' ') {
                    Some((f, v)) => (f, Some(decode(v))),
                    None => (rest, None),
                };
                let (field, append) = match field.strip_prefix('+') {
                    Some(f) => (f, true),
                    None => (field, false),
                };
                self.jcards.push(JCard {
                    field: field.to_string(),
                    value,
                    append,
                });
            }
            b'L' => self.wiki_title = Some(decode(rest)),
            b'N' => self.mimetype = Some(rest.trim().to_string()),
            b'P' => {
                self.parents = rest
                    .split(' ')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            b'T' => {
                let mut fields = rest.split(' ');
                let tag = fields
                    .next()
                    .ok_or_else(|| RepoError::Malformed("T card without a tag".into()))?;
                let (disposition, name) = match tag.as_bytes().first() {
                    Some(b'+') => (TagDisposition::Add, &tag[1..]),
                    Some(b'-') => (TagDisposition::Cancel, &tag[1..]),
                    Some(b'*') => (TagDisposition::Propagate, &tag[1..]),
                    _ => return Err(RepoError::Malformed("T card without disposition".into())),
                };
                let target = fields.next().unwrap_or("*").to_string();
                let value = fields.next().map(decode);
                self.tcards.push(TCard {
                    disposition,
                    name: decode(name),
                    target,
                    value,
                });
            }
            b'U' => self.user = Some(decode(rest)),
            // A, K, M, Q, R, Z and anything newer are not consumed here.
            _ => {}
        }
        Ok(())
    }

    /// The effective F-card sequence of this deck given its baseline:
    /// the ordered lexicographic merge in which a delta card overrides
    /// the baseline entry of the same name and a uuid-less delta card
    /// removes it.
    pub fn effective_fcards(&self, baseline: Option<&Deck>) -> Vec<FCard> {
        match baseline {
            None => self
                .fcards
                .iter()
                .filter(|f| f.uuid.is_some())
                .cloned()
                .collect(),
            Some(base) => merge_fcards(&base.fcards, &self.fcards),
        }
    }
}

/// Ordered merge of baseline and delta F cards (both sorted by name).
pub fn merge_fcards(baseline: &[FCard], delta: &[FCard]) -> Vec<FCard> {
    let mut merged = Vec::with_capacity(baseline.len() + delta.len());
    let mut b = baseline.iter().peekable();
    let mut d = delta.iter().peekable();
    loop {
        match (b.peek(), d.peek()) {
            (Some(bc), Some(dc)) => match bc.name.as_str().cmp(dc.name.as_str()) {
                std::cmp::Ordering::Less => {
                    merged.push((*bc).clone());
                    b.next();
                }
                std::cmp::Ordering::Greater => {
                    if dc.uuid.is_some() {
                        merged.push((*dc).clone());
                    }
                    d.next();
                }
                std::cmp::Ordering::Equal => {
                    if dc.uuid.is_some() {
                        merged.push((*dc).clone());
                    }
                    b.next();
                    d.next();
                }
            },
            (Some(bc), None) => {
                merged.push((*bc).clone());
                b.next();
            }
            (None, Some(dc)) => {
                if dc.uuid.is_some() {
                    merged.push((*dc).clone());
                }
                d.next();
            }
            (None, None) => break,
        }
    }
    merged
}

/// Decode card-encoded text: `\s` space, `\n` newline, `\t` tab,
/// `\r` carriage return, `\\` backslash.
fn decode(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
