use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

use crate::core::{DbError, Result};

/// How a type or field name becomes a table or column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameType {
    /// Defer to the type's own configuration.
    ClassDefined,
    Verbatim,
    UpperSnake,
    LowerSnake,
}

impl NameType {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Verbatim | Self::ClassDefined => name.to_string(),
            Self::UpperSnake => name.to_case(Case::UpperSnake),
            Self::LowerSnake => name.to_case(Case::Snake),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "class_defined" => Ok(Self::ClassDefined),
            "verbatim" | "noop" => Ok(Self::Verbatim),
            "upper_snake" => Ok(Self::UpperSnake),
            "lower_snake" => Ok(Self::LowerSnake),
            other => Err(DbError::configuration(format!("unknown naming strategy '{}'", other))),
        }
    }
}

/// Datasource and naming settings of a model.
///
/// `None` / [`NameType::ClassDefined`] entries are resolved against the
/// model's own declaration when a descriptor is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub datasource: Option<String>,
    pub table_naming: NameType,
    pub column_naming: NameType,
}

impl Default for ModelConfiguration {
    fn default() -> Self {
        Self {
            datasource: None,
            table_naming: NameType::ClassDefined,
            column_naming: NameType::ClassDefined,
        }
    }
}

impl ModelConfiguration {
    /// Settings a model gets when it declares nothing itself.
    pub fn class_default() -> Self {
        Self {
            datasource: Some(String::new()),
            table_naming: NameType::LowerSnake,
            column_naming: NameType::LowerSnake,
        }
    }

    pub fn datasource(mut self, name: impl Into<String>) -> Self {
        self.datasource = Some(name.into());
        self
    }

    pub fn table_naming(mut self, naming: NameType) -> Self {
        self.table_naming = naming;
        self
    }

    pub fn column_naming(mut self, naming: NameType) -> Self {
        self.column_naming = naming;
        self
    }

    /// Fills every class-defined entry from `declared`, then from the class default.
    pub fn resolve(&self, declared: Option<&ModelConfiguration>) -> ModelConfiguration {
        let fallback = ModelConfiguration::class_default();
        let declared = declared.unwrap_or(&fallback);

        let pick = |own: NameType, declared: NameType, fallback: NameType| match (own, declared) {
            (NameType::ClassDefined, NameType::ClassDefined) => fallback,
            (NameType::ClassDefined, declared) => declared,
            (own, _) => own,
        };

        ModelConfiguration {
            datasource: self
                .datasource
                .clone()
                .or_else(|| declared.datasource.clone())
                .or(fallback.datasource.clone()),
            table_naming: pick(self.table_naming, declared.table_naming, fallback.table_naming),
            column_naming: pick(self.column_naming, declared.column_naming, fallback.column_naming),
        }
    }
}
