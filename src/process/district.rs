//! District resolution: an ordered fallback chain, earliest tier wins.
//!
//! 1. the district column, if it looks like a real name
//! 2. a dictionary name or "حي <name>" inside the project / plan field
//! 3. a dictionary name inside the filename
//! 4. whatever is left of the filename once noise tokens are removed
//!
//! Every candidate then passes a blocklist veto.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::DistrictRules;
use crate::dataset::{DistrictSource, SourceKind};
use crate::process::utils::{contains_phrase, fold, words};

/// Outcome of a resolver or classifier tier chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Resolved(T),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDistrict {
    pub name: String,
    pub source: DistrictSource,
}

/// Per-record inputs.
#[derive(Debug, Clone, Copy)]
pub struct DistrictInput<'a> {
    pub raw_district: Option<&'a str>,
    pub project_name: Option<&'a str>,
    pub filename: &'a str,
    pub source_kind: SourceKind,
}

pub struct DistrictResolver {
    /// Longest first, stable on configuration order.
    dictionary: Vec<(String, String)>,
    noise: Vec<String>,
    filename_noise: Vec<String>,
    locative: Regex,
    blocked_common: Vec<String>,
    blocked_ministry: Vec<String>,
    blocked_developer: Vec<String>,
}

impl DistrictResolver {
    pub fn new(rules: &DistrictRules) -> Result<Self> {
        let mut dictionary: Vec<(String, String)> = rules
            .dictionary
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(|d| (fold(d), d.to_string()))
            .collect();
        dictionary.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let keywords = rules
            .locative_keywords
            .iter()
            .map(|k| regex::escape(k.trim()))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?i)(?:^|[^\p{{L}}])(?:{})[\s_\-:]+([^\s,،;/_\-()]+)", keywords);
        let locative = Regex::new(&pattern).with_context(|| format!("compiling locative pattern `{}`", pattern))?;

        let folded = |v: &[String]| -> Vec<String> {
            v.iter().map(|s| fold(s.trim())).filter(|s| !s.is_empty()).collect()
        };
        Ok(Self {
            dictionary,
            noise: folded(&rules.noise_tokens),
            filename_noise: folded(&rules.filename_noise_tokens),
            locative,
            blocked_common: folded(&rules.blocklist.common),
            blocked_ministry: folded(&rules.blocklist.ministry),
            blocked_developer: folded(&rules.blocklist.developer),
        })
    }

    pub fn resolve(&self, input: &DistrictInput<'_>) -> Resolution<ResolvedDistrict> {
        let candidate = self
            .accept_as_is(input.raw_district)
            .map(|n| (n, DistrictSource::Column))
            .or_else(|| {
                input
                    .project_name
                    .and_then(|p| self.from_secondary(p))
                    .map(|n| (n, DistrictSource::ProjectName))
            })
            .or_else(|| {
                self.dictionary_match(file_stem(input.filename))
                    .map(|n| (n, DistrictSource::FilenameDictionary))
            })
            .or_else(|| {
                self.filename_remainder(input.filename)
                    .map(|n| (n, DistrictSource::FilenameRemainder))
            });

        match candidate {
            Some((name, _)) if self.is_blocked(&name, input.source_kind) => Resolution::Unresolved,
            Some((name, source)) => Resolution::Resolved(ResolvedDistrict { name, source }),
            None => Resolution::Unresolved,
        }
    }

    fn accept_as_is(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?.trim();
        if raw.chars().count() < 3 {
            return None;
        }
        let cell = words(raw);
        if self.noise.iter().any(|t| contains_phrase(&cell, t)) {
            return None;
        }
        Some(raw.to_string())
    }

    /// Known name inside the project/plan text, else the token after a
    /// locative keyword.
    fn from_secondary(&self, text: &str) -> Option<String> {
        if let Some(name) = self.dictionary_match(text) {
            return Some(name);
        }
        self.locative
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| s.chars().count() >= 2)
    }

    fn dictionary_match(&self, text: &str) -> Option<String> {
        let folded = fold(text);
        self.dictionary
            .iter()
            .find(|(key, _)| folded.contains(key.as_str()))
            .map(|(_, name)| name.clone())
    }

    fn filename_remainder(&self, filename: &str) -> Option<String> {
        let stem = file_stem(filename).replace(['_', '-', '.'], " ");
        let kept: Vec<&str> = stem
            .split_whitespace()
            .filter(|tok| {
                let t = fold(tok);
                !t.chars().all(|c| c.is_ascii_digit()) && !self.filename_noise.contains(&t)
            })
            .collect();
        let rest = kept.join(" ");
        if rest.chars().count() > 2 {
            Some(rest)
        } else {
            None
        }
    }

    fn is_blocked(&self, candidate: &str, kind: SourceKind) -> bool {
        let c = fold(candidate.trim());
        let hit = |list: &[String]| list.iter().any(|b| *b == c);
        hit(&self.blocked_common)
            || hit(&self.blocked_ministry)
            || (kind != SourceKind::Ministry && hit(&self.blocked_developer))
    }
}

fn file_stem(filename: &str) -> &str {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(i) if i > 0 => &base[..i],
        _ => base,
    }
}
