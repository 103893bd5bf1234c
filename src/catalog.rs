//! Problem catalog: ordered groups of ordered questions.
//!
//! The catalog is addressed by a single flattened index: group order first,
//! question order inside a group second.

use serde::Deserialize;
use thiserror::Error;

const NEETCODE_150: &str = include_str!("../data/neetcode150.json");

/// Name used in config to select the embedded NeetCode 150 catalog.
pub const EMBEDDED_NEETCODE: &str = "neetcode150";

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("parse {origin}: {source}")]
  Parse {
    origin: String,
    #[source]
    source: serde_json::Error,
  },
  #[error("{origin} has no questions")]
  Empty { origin: String },
  #[error("{origin}: question {name:?} has no leetcode link")]
  MissingLink { origin: String, name: String },
  #[error("index {idx} out of range for {total} questions")]
  OutOfRange { idx: usize, total: usize },
}

#[derive(Clone, Debug, Deserialize)]
pub struct Question {
  pub name: String,
  #[serde(default)] pub difficulty: String,
  pub lc_link: String,
  #[serde(default)] pub free_link: String,
}

impl Question {
  /// Links as posted: primary link, then the free mirror on its own line when present.
  pub fn links_text(&self) -> String {
    if self.free_link.is_empty() {
      self.lc_link.clone()
    } else {
      format!("{}\n{}", self.lc_link, self.free_link)
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Group {
  #[serde(rename = "group_name")]
  pub name: String,
  pub questions: Vec<Question>,
}

#[derive(Clone, Debug)]
pub struct Catalog {
  groups: Vec<Group>,
  total: usize,
}

impl Catalog {
  pub fn embedded_neetcode() -> Result<Self, CatalogError> {
    Self::from_json(EMBEDDED_NEETCODE, NEETCODE_150)
  }

  /// Resolve a catalog reference from config: the embedded name or a JSON file path.
  pub fn load(source: &str) -> Result<Self, CatalogError> {
    if source == EMBEDDED_NEETCODE {
      return Self::embedded_neetcode();
    }
    let raw = std::fs::read_to_string(source).map_err(|source_err| CatalogError::Read {
      path: source.to_string(),
      source: source_err,
    })?;
    Self::from_json(source, &raw)
  }

  pub fn from_json(origin: &str, raw: &str) -> Result<Self, CatalogError> {
    let groups: Vec<Group> = serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
      origin: origin.to_string(),
      source,
    })?;
    Self::from_groups(origin, groups)
  }

  pub fn from_groups(origin: &str, groups: Vec<Group>) -> Result<Self, CatalogError> {
    if let Some(q) = groups.iter().flat_map(|g| &g.questions).find(|q| q.lc_link.is_empty()) {
      return Err(CatalogError::MissingLink { origin: origin.to_string(), name: q.name.clone() });
    }
    let total = groups.iter().map(|g| g.questions.len()).sum();
    if total == 0 {
      return Err(CatalogError::Empty { origin: origin.to_string() });
    }
    Ok(Self { groups, total })
  }

  pub fn total(&self) -> usize {
    self.total
  }

  /// Question at a flattened index, scanning groups first-to-last.
  pub fn locate(&self, idx: usize) -> Option<(&Group, &Question)> {
    let mut rest = idx;
    for g in &self.groups {
      if rest < g.questions.len() {
        return Some((g, &g.questions[rest]));
      }
      rest -= g.questions.len();
    }
    None
  }
}
