//! Open-set label space construction.
//!
//! A [`LabelSpace`] compacts the classes that survive after removing the
//! unknown classes onto `0..K` (keeping their relative order) and sends every
//! sample of an unknown class to the single bucket `K`. The space is built
//! once from a label domain and then applied to any number of label vectors,
//! so train and test splits always share one numbering.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Classes folded into the unknown bucket when nothing else is configured.
pub const DEFAULT_UNKNOWN_CLASSES: [usize; 10] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90];

/// Set of original class indices that are collapsed into the unknown bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct UnknownClassSet(BTreeSet<usize>);

impl UnknownClassSet {
    pub fn new<I: IntoIterator<Item = usize>>(classes: I) -> Self {
        UnknownClassSet(classes.into_iter().collect())
    }

    /// The closed-set configuration: nothing is unknown.
    pub fn empty() -> Self {
        UnknownClassSet(BTreeSet::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, class: usize) -> bool {
        self.0.contains(&class)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Number of unknown classes strictly below `class`.
    pub fn count_below(&self, class: usize) -> usize {
        self.0.range(..class).count()
    }
}

impl Default for UnknownClassSet {
    fn default() -> Self {
        UnknownClassSet::new(DEFAULT_UNKNOWN_CLASSES)
    }
}

impl FromIterator<usize> for UnknownClassSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        UnknownClassSet::new(iter)
    }
}

impl From<Vec<usize>> for UnknownClassSet {
    fn from(value: Vec<usize>) -> Self {
        UnknownClassSet::new(value)
    }
}

impl From<UnknownClassSet> for Vec<usize> {
    fn from(value: UnknownClassSet) -> Self {
        value.0.into_iter().collect()
    }
}

impl FromStr for UnknownClassSet {
    type Err = EvalError;

    /// Parse a comma separated list such as `"0,10,20"`. An empty string is
    /// the empty set.
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<usize>().map_err(|_| {
                    EvalError::InvalidLabelSet(format!("'{}' is not a class index", tok))
                })
            })
            .collect()
    }
}

/// How the harness should interpret the label space it is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// Every test class was seen during training.
    Closed,
    /// `unknown_label` is the bucket holding every withheld class.
    OpenSet { unknown_label: usize },
}

impl LabelMode {
    /// Apply the convention that the unknown bucket is the numerically
    /// largest label. Empty labels give `Closed`.
    pub fn from_max_label(labels: &[usize]) -> Self {
        labels
            .iter()
            .max()
            .map(|&unknown_label| LabelMode::OpenSet { unknown_label })
            .unwrap_or(LabelMode::Closed)
    }

    pub fn unknown_label(&self) -> Option<usize> {
        match self {
            LabelMode::Closed => None,
            LabelMode::OpenSet { unknown_label } => Some(*unknown_label),
        }
    }

    pub fn is_open_set(&self) -> bool {
        matches!(self, LabelMode::OpenSet { .. })
    }
}

/// Compacted label space over a fixed class domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSpace {
    domain: Vec<usize>,
    unknown: UnknownClassSet,
    known: usize,
}

impl LabelSpace {
    /// Build the space over the distinct classes observed in `labels`.
    pub fn from_labels(labels: &[usize], unknown: &UnknownClassSet) -> Result<Self> {
        let domain: BTreeSet<usize> = labels.iter().copied().collect();
        Self::new(domain.into_iter().collect(), unknown)
    }

    /// Build the space over the contiguous domain `0..n_classes`.
    pub fn with_class_count(n_classes: usize, unknown: &UnknownClassSet) -> Result<Self> {
        Self::new((0..n_classes).collect(), unknown)
    }

    fn new(domain: Vec<usize>, unknown: &UnknownClassSet) -> Result<Self> {
        if domain.is_empty() {
            return Err(EvalError::EmptyInput("label domain"));
        }

        if let Some(stray) = unknown.iter().find(|c| domain.binary_search(c).is_err()) {
            return Err(EvalError::InvalidLabelSet(format!(
                "class {} is not in the label domain",
                stray
            )));
        }

        let known = domain.len() - unknown.len();
        if known == 0 {
            return Err(EvalError::InvalidLabelSet(format!(
                "all {} classes are marked unknown, no known classes remain",
                domain.len()
            )));
        }

        Ok(LabelSpace {
            domain,
            unknown: unknown.clone(),
            known,
        })
    }

    /// Number of surviving (known) classes, `K`.
    pub fn known_classes(&self) -> usize {
        self.known
    }

    /// Label of the unknown bucket, `K`, when any class is unknown.
    pub fn unknown_label(&self) -> Option<usize> {
        if self.unknown.is_empty() {
            None
        } else {
            Some(self.known)
        }
    }

    /// Size of the remapped label space.
    pub fn n_labels(&self) -> usize {
        self.known + usize::from(!self.unknown.is_empty())
    }

    pub fn label_mode(&self) -> LabelMode {
        match self.unknown_label() {
            Some(unknown_label) => LabelMode::OpenSet { unknown_label },
            None => LabelMode::Closed,
        }
    }

    pub fn unknown_classes(&self) -> &UnknownClassSet {
        &self.unknown
    }

    /// Remapped label of a single original class.
    pub fn map_label(&self, class: usize) -> Result<usize> {
        let position = self.domain.binary_search(&class).map_err(|_| {
            EvalError::InvalidLabelSet(format!("label {} is outside the label domain", class))
        })?;

        if self.unknown.contains(class) {
            return Ok(self.known);
        }

        // Domain classes below `class` that are unknown are the ones collapsed
        // out ahead of it.
        Ok(position - self.unknown.count_below(class))
    }

    /// Remap a whole label vector, returning a new vector.
    pub fn apply(&self, labels: &[usize]) -> Result<Vec<usize>> {
        labels.iter().map(|&l| self.map_label(l)).collect()
    }

    /// Original class of a compacted known label. The unknown bucket has no
    /// single original class and maps to `None`.
    pub fn original_class(&self, label: usize) -> Option<usize> {
        if label >= self.known {
            return None;
        }
        self.domain
            .iter()
            .copied()
            .filter(|c| !self.unknown.contains(*c))
            .nth(label)
    }
}

/// One-shot remap: build the space from `labels` and apply it to them.
pub fn remap(labels: &[usize], unknown: &UnknownClassSet) -> Result<Vec<usize>> {
    LabelSpace::from_labels(labels, unknown)?.apply(labels)
}
