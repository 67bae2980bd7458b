use std::fmt;

use serde::{Deserialize, Serialize};

/// Which derived artifact of a workspace is being viewed or edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Origin,
    Trans,
    Explain,
    Thread,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Origin,
        Variant::Trans,
        Variant::Explain,
        Variant::Thread,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Origin => "origin",
            Variant::Trans => "trans",
            Variant::Explain => "explain",
            Variant::Thread => "thread",
        }
    }

    /// `{base}_{suffix}.md`
    pub fn file_name(self, base_name: &str) -> String {
        format!("{base_name}_{}.md", self.suffix())
    }

    /// Splits an artifact filename into its base name and variant.
    pub fn parse_file_name(file_name: &str) -> Option<(&str, Variant)> {
        let stem = file_name.strip_suffix(".md")?;
        Variant::ALL.into_iter().find_map(|variant| {
            stem.strip_suffix(variant.suffix())
                .and_then(|rest| rest.strip_suffix('_'))
                .filter(|base| !base.is_empty())
                .map(|base| (base, variant))
        })
    }

    pub fn parse(label: &str) -> Option<Variant> {
        Variant::ALL
            .into_iter()
            .find(|variant| variant.suffix().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Authoritative file listing of one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileListing {
    pub source_document: Option<String>,
    pub artifacts: Vec<String>,
}

impl FileListing {
    /// Base name derived from the `origin` artifact.
    pub fn base_name(&self) -> Option<&str> {
        self.artifacts.iter().find_map(|name| {
            Variant::parse_file_name(name)
                .filter(|(_, variant)| *variant == Variant::Origin)
                .map(|(base, _)| base)
        })
    }

    pub fn has(&self, variant: Variant) -> bool {
        self.artifacts
            .iter()
            .any(|name| matches!(Variant::parse_file_name(name), Some((_, v)) if v == variant))
    }

    pub fn available(&self) -> Vec<Variant> {
        Variant::ALL
            .into_iter()
            .filter(|variant| self.has(*variant))
            .collect()
    }
}
