//! Driver registry: the single source of truth for which languages run.

use crate::driver::{Driver, EmbeddedEngine, ProcessDriver, SourceTransform, JAVA_MAIN_CLASS};
use crate::error::ExecError;
use crate::language::Language;
use crate::sql::SqliteEngine;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Immutable map from language to driver.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<Language, Driver>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every driver Kiln ships.
    ///
    /// | language | compile | run |
    /// |----------|---------|-----|
    /// | python | - | `python3 <src>` |
    /// | javascript | - | `node <src>` |
    /// | java | `javac Main.java` | `java -cp <dir> Main` |
    /// | c | `gcc <src> -o <bin>` | `<bin>` |
    /// | cpp | `g++ <src> -o <bin>` | `<bin>` |
    /// | sql | - | embedded SQLite |
    pub fn standard() -> Self {
        Self::new()
            .with_process(ProcessDriver {
                language: Language::Python,
                extension: ".py",
                source_stem: None,
                compile: None,
                run: &["python3", "{source}"],
                transform: SourceTransform::Identity,
            })
            .with_process(ProcessDriver {
                language: Language::JavaScript,
                extension: ".js",
                source_stem: None,
                compile: None,
                run: &["node", "{source}"],
                transform: SourceTransform::Identity,
            })
            .with_process(ProcessDriver {
                language: Language::Java,
                extension: ".java",
                source_stem: Some(JAVA_MAIN_CLASS),
                compile: Some(&["javac", "{source}"]),
                run: &["java", "-cp", "{dir}", JAVA_MAIN_CLASS],
                transform: SourceTransform::JavaMainClass,
            })
            .with_process(ProcessDriver {
                language: Language::C,
                extension: ".c",
                source_stem: None,
                compile: Some(&["gcc", "{source}", "-o", "{artifact}"]),
                run: &["{artifact}"],
                transform: SourceTransform::Identity,
            })
            .with_process(ProcessDriver {
                language: Language::Cpp,
                extension: ".cpp",
                source_stem: None,
                compile: Some(&["g++", "{source}", "-o", "{artifact}"]),
                run: &["{artifact}"],
                transform: SourceTransform::Identity,
            })
            .with_embedded(Language::Sql, Arc::new(SqliteEngine::new()))
    }

    /// Add or replace the process driver for its language.
    pub fn with_process(mut self, driver: ProcessDriver) -> Self {
        self.drivers.insert(driver.language, Driver::Process(driver));
        self
    }

    /// Add or replace an embedded engine for `language`.
    pub fn with_embedded(mut self, language: Language, engine: Arc<dyn EmbeddedEngine>) -> Self {
        self.drivers.insert(language, Driver::Embedded(engine));
        self
    }

    /// Driver for an already parsed language.
    pub fn driver(&self, language: Language) -> Result<&Driver, ExecError> {
        self.drivers
            .get(&language)
            .ok_or(ExecError::ExecutionNotSupported(language))
    }

    /// Resolve a language name to its driver.
    ///
    /// Unknown names yield [`ExecError::UnsupportedLanguage`]; known
    /// languages without a driver yield [`ExecError::ExecutionNotSupported`].
    pub fn resolve(&self, name: &str) -> Result<(Language, &Driver), ExecError> {
        let language = Language::parse(name)?;
        Ok((language, self.driver(language)?))
    }

    /// Every language advertised to clients.
    pub fn languages(&self) -> &'static [Language] {
        &Language::ALL
    }

    /// Languages with a registered driver, in advertised order.
    pub fn executable_languages(&self) -> Vec<Language> {
        Language::ALL
            .iter()
            .copied()
            .filter(|language| self.drivers.contains_key(language))
            .collect()
    }

    /// Programs referenced by process drivers that are not on `PATH`.
    pub fn missing_toolchains(&self) -> Vec<(Language, &'static str)> {
        let mut missing: Vec<(Language, &'static str)> = self
            .drivers
            .values()
            .filter_map(|driver| match driver {
                Driver::Process(p) => Some(p),
                Driver::Embedded(_) => None,
            })
            .flat_map(|p| p.programs().into_iter().map(move |program| (p.language, program)))
            .filter(|(_, program)| !on_path(program))
            .collect();
        missing.sort();
        missing
    }
}

/// Whether `program` resolves to an existing file on `PATH`.
pub fn on_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
