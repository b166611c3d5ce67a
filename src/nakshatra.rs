use std::{fmt, str::FromStr};

use thiserror::Error;

/// The 27 birth stars, spelled the way the remote API stores them.
pub static NAKSHATRAS: [&str; 27] = [
    "ASWATHY",
    "BHARANI",
    "KARTHIKA",
    "ROHINI",
    "MAKAYIRAM",
    "THIRUVATHIRA",
    "PUNARTHAM",
    "POOYAM",
    "AYILYAM",
    "MAKAM",
    "POORAM",
    "UTHRAM",
    "ATHAM",
    "CHITHIRA",
    "CHOTHI",
    "VISHAKHAM",
    "ANIZHAM",
    "THRIKKETTA",
    "MOOLAM",
    "POORADAM",
    "UTHRADAM",
    "THIRUVONAM",
    "AVITTAM",
    "CHATHAYAM",
    "POORURUTTATHI",
    "UTHRUTTATHI",
    "REVATHI",
];

/// A record-grouping category. Only the 27 canonical names can be constructed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Nakshatra(&'static str);

impl Nakshatra {
    pub fn all() -> impl Iterator<Item = Nakshatra> {
        NAKSHATRAS.iter().map(|name| Nakshatra(*name))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Title-cased label for selects and headings, e.g. `Aswathy`.
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(|c| c.to_lowercase()))
                .collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Nakshatra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("unknown nakshatra: {0}")]
pub struct UnknownNakshatra(pub String);

impl FromStr for Nakshatra {
    type Err = UnknownNakshatra;

    /// Case-insensitive match against the canonical names. Spelling variants are
    /// left for the API to reconcile.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let upper = raw.trim().to_uppercase();
        NAKSHATRAS
            .iter()
            .find(|name| **name == upper)
            .map(|name| Nakshatra(*name))
            .ok_or_else(|| UnknownNakshatra(raw.trim().to_string()))
    }
}
