//! Selection filter shared by backup and restore

use std::collections::BTreeSet;

use super::ids::ObjectId;

/// Either "everything" or an explicit set of names, ids and filenames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionSet {
    #[default]
    All,
    Explicit(BTreeSet<String>),
}

impl SelectionSet {
    /// Build from user input. The single value `all` (any case) selects
    /// everything; blank entries are ignored.
    pub fn parse<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        if values.len() == 1 && values[0].eq_ignore_ascii_case("all") {
            return Self::All;
        }
        Self::Explicit(values.into_iter().collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Exact, case-sensitive membership test
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::All => true,
            Self::Explicit(set) => set.contains(value),
        }
    }

    /// Whether an object is selected by its name, id or snapshot filename.
    /// The filename matches with or without its `.json` extension.
    pub fn matches(&self, name: Option<&str>, id: Option<&ObjectId>, filename: Option<&str>) -> bool {
        let set = match self {
            Self::All => return true,
            Self::Explicit(set) => set,
        };

        if name.is_some_and(|n| set.contains(n)) {
            return true;
        }
        if id.is_some_and(|id| set.contains(&id.to_string())) {
            return true;
        }
        if let Some(file) = filename {
            if set.contains(file) {
                return true;
            }
            if let Some(stem) = file.strip_suffix(".json") {
                return set.contains(stem);
            }
        }
        false
    }

    /// Explicit entries, empty for `All`
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let set = match self {
            Self::All => None,
            Self::Explicit(set) => Some(set),
        };
        set.into_iter().flatten().map(String::as_str)
    }
}
