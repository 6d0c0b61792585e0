//! Directed-fuzzer bibliography shown next to the graph: fuzzers grouped by venue,
//! target and author, with a free-text filter over all groups.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum BibliographyError {
    #[error("Failed to read bibliography from {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Bibliography is not a valid list of fuzzer entries: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Volume or issue number of a journal article; the database mixes numbers and strings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum IssueField {
    Number(u64),
    Text(String),
}

impl fmt::Display for IssueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueField::Number(n) => write!(f, "{n}"),
            IssueField::Text(s) => f.write_str(s),
        }
    }
}

/// One published fuzzer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FuzzerEntry {
    pub name: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub author: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub booktitle: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub volume: Option<IssueField>,
    #[serde(default)]
    pub number: Option<IssueField>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub toolurl: Option<String>,
}

impl FuzzerEntry {
    /// Formats the entry as a reference: `"Title", A, B, and C. In Venue, 2020`.
    pub fn citation(&self) -> String {
        let mut s = format!("\"{}\"", self.title.as_deref().unwrap_or(&self.name));

        let last = self.author.len().saturating_sub(1);
        for (i, author) in self.author.iter().enumerate() {
            if i == last && self.author.len() > 1 {
                s.push_str(", and ");
            } else {
                s.push_str(", ");
            }
            s.push_str(author);
        }

        if let Some(venue) = &self.booktitle {
            s.push_str(". In ");
            s.push_str(venue);
        }
        if let Some(journal) = &self.journal {
            s.push_str(". ");
            s.push_str(journal);
            if let Some(volume) = &self.volume {
                s.push_str(&format!(", {volume}"));
            }
            if let Some(number) = &self.number {
                s.push_str(&format!("({number})"));
            }
        }
        if let Some(year) = self.year {
            s.push_str(&format!(", {year}"));
        }
        s
    }

    /// Text the bibliography filter matches against.
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        if !self.author.is_empty() {
            parts.push(self.author.join(","));
        }
        parts.extend(self.title.iter().cloned());
        parts.extend(self.booktitle.iter().cloned());
        if !self.targets.is_empty() {
            parts.push(self.targets.join(","));
        }
        parts.join(" ")
    }
}

/// Fuzzers sharing a venue, a target or an author.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    /// Fuzzer names, newest first.
    pub members: Vec<String>,
}

impl Group {
    pub fn count(&self) -> usize {
        self.members.len()
    }
}

/// Result of filtering the three groupings with one piece of text.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredGroups {
    pub venues: Vec<Group>,
    pub targets: Vec<Group>,
    pub authors: Vec<Group>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub fuzzers: usize,
    pub authors: usize,
    pub venues: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Currently, there are a total of {} fuzzers and {} authors in the DB, collected from {} different venues.",
            self.fuzzers, self.authors, self.venues
        )
    }
}

#[derive(Debug, Clone)]
pub struct Bibliography {
    entries: IndexMap<String, FuzzerEntry>,
    venues: Vec<Group>,
    targets: Vec<Group>,
    authors: Vec<Group>,
}

impl Bibliography {
    pub fn new(list: Vec<FuzzerEntry>) -> Self {
        let mut entries = IndexMap::with_capacity(list.len());
        for entry in list {
            if entries.contains_key(&entry.name) {
                warn!(name = %entry.name, "Duplicate fuzzer entry ignored");
                continue;
            }
            entries.insert(entry.name.clone(), entry);
        }

        let mut venues: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut targets: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut authors: IndexMap<String, Vec<String>> = IndexMap::new();
        for entry in entries.values() {
            for author in &entry.author {
                authors.entry(author.clone()).or_default().push(entry.name.clone());
            }
            if let Some(venue) = &entry.booktitle {
                venues.entry(venue.clone()).or_default().push(entry.name.clone());
            }
            for target in &entry.targets {
                targets.entry(target.clone()).or_default().push(entry.name.clone());
            }
        }

        let venues = sorted_groups(venues, &entries);
        let targets = sorted_groups(targets, &entries);
        let authors = sorted_groups(authors, &entries);
        debug!(
            fuzzers = entries.len(),
            venues = venues.len(),
            targets = targets.len(),
            authors = authors.len(),
            "Bibliography indexed"
        );

        Self {
            entries,
            venues,
            targets,
            authors,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, BibliographyError> {
        let list: Vec<FuzzerEntry> = serde_json::from_str(json)?;
        Ok(Self::new(list))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, BibliographyError> {
        let content = std::fs::read_to_string(path).map_err(|e| BibliographyError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    pub fn entry(&self, name: &str) -> Option<&FuzzerEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn venues(&self) -> &[Group] {
        &self.venues
    }

    pub fn targets(&self) -> &[Group] {
        &self.targets
    }

    pub fn authors(&self) -> &[Group] {
        &self.authors
    }

    pub fn summary(&self) -> Summary {
        Summary {
            fuzzers: self.entries.len(),
            authors: self.authors.len(),
            venues: self.venues.len(),
        }
    }

    /// Keeps, in every group, only the fuzzers whose search text contains `text`
    /// (ignoring case). Empty groups are dropped and the rest are reordered by how many
    /// members matched; groups with equal counts keep their relative order.
    pub fn filter(&self, text: &str) -> FilteredGroups {
        let needle = text.to_uppercase();
        let matches = |name: &str| {
            self.entries
                .get(name)
                .is_some_and(|e| e.search_text().to_uppercase().contains(&needle))
        };
        let narrow = |groups: &[Group]| {
            let mut kept: Vec<Group> = groups
                .iter()
                .filter_map(|group| {
                    let members: Vec<String> =
                        group.members.iter().filter(|m| matches(m.as_str())).cloned().collect();
                    (!members.is_empty()).then(|| Group {
                        name: group.name.clone(),
                        members,
                    })
                })
                .collect();
            kept.sort_by_key(|g| Reverse(g.count()));
            kept
        };

        FilteredGroups {
            venues: narrow(&self.venues),
            targets: narrow(&self.targets),
            authors: narrow(&self.authors),
        }
    }
}

/// Orders groups by member count (largest first, ties by name ignoring case) and each group's members
/// by publication year (newest first, undated last).
fn sorted_groups(
    grouped: IndexMap<String, Vec<String>>,
    entries: &IndexMap<String, FuzzerEntry>,
) -> Vec<Group> {
    let mut groups: Vec<Group> = grouped
        .into_iter()
        .map(|(name, mut members)| {
            members.sort_by_key(|m| Reverse(entries.get(m).and_then(|e| e.year)));
            Group { name, members }
        })
        .collect();
    groups.sort_by(|a, b| {
        b.count()
            .cmp(&a.count())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    groups
}
