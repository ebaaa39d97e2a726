//! Name atoms — policy identifiers rendered with a leading slash, e.g. `/readFile`.
//!
//! Outside policy-facing code, plain strings suffice; this type exists so the
//! normalization rule has exactly one implementation.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameAtom(String);

impl NameAtom {
    /// Normalize an arbitrary name into atom form: a single leading slash,
    /// no doubling if the name already starts with one.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let stripped = name.strip_prefix('/').unwrap_or(name);
        Self(format!("/{stripped}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NameAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NameAtom {
    fn from(s: &str) -> Self {
        NameAtom::new(s)
    }
}

impl From<String> for NameAtom {
    fn from(s: String) -> Self {
        NameAtom::new(s)
    }
}
