//! Attribute (column) definitions
//!
//! Attributes are addressed by position within their sheet. Formulas,
//! references and carry-forward pointers all store positional indices, so
//! every structural change must go through index renumbering (see
//! [`Formula::forget`] and [`Recurrence::forget`]).

use std::collections::BTreeSet;
use std::fmt;

use crate::sheet::SheetId;
use crate::subrow::SubrowConfig;

/// Normalize an attribute name for comparison: trimmed, inner whitespace
/// collapsed to single spaces, lowercased.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Clean a display name: trimmed, inner whitespace collapsed. Case is kept.
pub fn clean_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Linear formula of a Derived column: sum of `addition` minus sum of
/// `subtraction`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Formula {
    pub addition: BTreeSet<usize>,
    pub subtraction: BTreeSet<usize>,
}

impl Formula {
    pub fn new<A, S>(addition: A, subtraction: S) -> Self
    where
        A: IntoIterator<Item = usize>,
        S: IntoIterator<Item = usize>,
    {
        Self {
            addition: addition.into_iter().collect(),
            subtraction: subtraction.into_iter().collect(),
        }
    }

    /// All referenced indices, additions first
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.addition.iter().chain(self.subtraction.iter()).copied()
    }

    /// Signed terms of the formula
    pub fn terms(&self) -> impl Iterator<Item = FormulaTerm> + '_ {
        self.addition
            .iter()
            .map(|&index| FormulaTerm {
                index,
                sign: Sign::Plus,
            })
            .chain(self.subtraction.iter().map(|&index| FormulaTerm {
                index,
                sign: Sign::Minus,
            }))
    }

    pub fn is_empty(&self) -> bool {
        self.addition.is_empty() && self.subtraction.is_empty()
    }

    pub fn references(&self, index: usize) -> bool {
        self.addition.contains(&index) || self.subtraction.contains(&index)
    }

    /// Adjust for the deletion of attribute `deleted`: drop it and shift
    /// every later index down by one
    pub fn forget(&mut self, deleted: usize) {
        self.addition = shift_after_delete(&self.addition, deleted);
        self.subtraction = shift_after_delete(&self.subtraction, deleted);
    }
}

fn shift_after_delete(set: &BTreeSet<usize>, deleted: usize) -> BTreeSet<usize> {
    set.iter()
        .filter(|&&i| i != deleted)
        .map(|&i| if i > deleted { i - 1 } else { i })
        .collect()
}

/// Sign of a formula term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Sign::Plus => value,
            Sign::Minus => -value,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Plus => f.write_str("+"),
            Sign::Minus => f.write_str("-"),
        }
    }
}

/// One signed term of a [`Formula`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormulaTerm {
    pub index: usize,
    pub sign: Sign,
}

/// Pointer of a Referenced column into another sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceRef {
    pub sheet: SheetId,
    pub index: usize,
}

impl SourceRef {
    pub fn new<S: Into<SheetId>>(sheet: S, index: usize) -> Self {
        Self {
            sheet: sheet.into(),
            index,
        }
    }
}

/// Carry-forward settings of a Recurrent column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Recurrence {
    /// Attribute of the same sheet whose previous-row value is carried
    /// forward; `None` once the target has been deleted
    pub reference_index: Option<usize>,
    /// `false` while the column still awaits its one manual seed
    pub fed: bool,
}

impl Recurrence {
    pub fn new(reference_index: usize) -> Self {
        Self {
            reference_index: Some(reference_index),
            fed: false,
        }
    }

    /// Adjust for the deletion of attribute `deleted`
    pub fn forget(&mut self, deleted: usize) {
        self.reference_index = match self.reference_index {
            Some(i) if i == deleted => None,
            Some(i) if i > deleted => Some(i - 1),
            other => other,
        };
    }
}

/// What kind of column an attribute is, with its kind-specific payload
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum AttributeKind {
    /// Raw user-entered values
    Independent,
    /// Signed sum of other columns of the same row
    Derived(Formula),
    /// Value of another sheet's column at the same row; `None` once the
    /// source column has been deleted
    Referenced { source: Option<SourceRef> },
    /// Running balance carried from the previous row or period
    Recurrent(Recurrence),
}

impl AttributeKind {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Independent => "independent",
            AttributeKind::Derived(_) => "derived",
            AttributeKind::Referenced { .. } => "referenced",
            AttributeKind::Recurrent(_) => "recurrent",
        }
    }

    /// Whether users may write values into the column directly
    pub fn is_computed(&self) -> bool {
        matches!(
            self,
            AttributeKind::Derived(_) | AttributeKind::Referenced { .. }
        )
    }
}

/// A column of a sheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    name: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    kind: AttributeKind,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    subrows: Option<SubrowConfig>,
}

impl Attribute {
    pub fn new<S: AsRef<str>>(name: S, kind: AttributeKind) -> Self {
        Self {
            name: clean_name(name.as_ref()),
            kind,
            subrows: None,
        }
    }

    pub fn independent<S: AsRef<str>>(name: S) -> Self {
        Self::new(name, AttributeKind::Independent)
    }

    pub fn derived<S, A, B>(name: S, addition: A, subtraction: B) -> Self
    where
        S: AsRef<str>,
        A: IntoIterator<Item = usize>,
        B: IntoIterator<Item = usize>,
    {
        Self::new(name, AttributeKind::Derived(Formula::new(addition, subtraction)))
    }

    pub fn referenced<S: AsRef<str>>(name: S, source: SourceRef) -> Self {
        Self::new(
            name,
            AttributeKind::Referenced {
                source: Some(source),
            },
        )
    }

    pub fn recurrent<S: AsRef<str>>(name: S, reference_index: usize) -> Self {
        Self::new(name, AttributeKind::Recurrent(Recurrence::new(reference_index)))
    }

    /// Attach a subrow configuration
    pub fn with_subrows(mut self, config: SubrowConfig) -> Self {
        self.subrows = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used for uniqueness checks and lookups
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn set_name<S: AsRef<str>>(&mut self, name: S) {
        self.name = clean_name(name.as_ref());
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut AttributeKind {
        &mut self.kind
    }

    pub fn set_kind(&mut self, kind: AttributeKind) {
        self.kind = kind;
    }

    pub fn subrows(&self) -> Option<&SubrowConfig> {
        self.subrows.as_ref()
    }

    pub fn set_subrows(&mut self, config: Option<SubrowConfig>) {
        self.subrows = config;
    }

    pub fn formula(&self) -> Option<&Formula> {
        match &self.kind {
            AttributeKind::Derived(formula) => Some(formula),
            _ => None,
        }
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        match &self.kind {
            AttributeKind::Recurrent(recurrence) => Some(recurrence),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&SourceRef> {
        match &self.kind {
            AttributeKind::Referenced { source } => source.as_ref(),
            _ => None,
        }
    }
}
