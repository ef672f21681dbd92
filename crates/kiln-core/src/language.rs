//! The fixed set of languages Kiln advertises.

use crate::error::ExecError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A language from the supported set.
///
/// Not every language here can be executed; see
/// [`DriverRegistry::executable_languages`](crate::DriverRegistry::executable_languages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    CSharp,
    Go,
    Rust,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Sql,
}

impl Language {
    /// Every supported language, in advertised order.
    pub const ALL: [Language; 14] = [
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Java,
        Self::C,
        Self::Cpp,
        Self::CSharp,
        Self::Go,
        Self::Rust,
        Self::Php,
        Self::Ruby,
        Self::Swift,
        Self::Kotlin,
        Self::Sql,
    ];

    /// Parse a language name (case-insensitive, surrounding whitespace ignored).
    pub fn parse(name: &str) -> Result<Self, ExecError> {
        let normalized = name.trim().to_lowercase();
        let language = match normalized.as_str() {
            "python" => Self::Python,
            "javascript" => Self::JavaScript,
            "typescript" => Self::TypeScript,
            "java" => Self::Java,
            "c" => Self::C,
            "cpp" => Self::Cpp,
            "c#" | "csharp" => Self::CSharp,
            "go" => Self::Go,
            "rust" => Self::Rust,
            "php" => Self::Php,
            "ruby" => Self::Ruby,
            "swift" => Self::Swift,
            "kotlin" => Self::Kotlin,
            "sql" => Self::Sql,
            _ => return Err(ExecError::UnsupportedLanguage(name.trim().to_string())),
        };
        Ok(language)
    }

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "c#",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Sql => "sql",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
