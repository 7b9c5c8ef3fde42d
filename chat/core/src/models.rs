//! Model catalog and selection
//!
//! The backend advertises its models grouped by provider company, along with
//! the server-side defaults. This module holds the catalog types and the
//! small selection state machine a model picker drives: switching company
//! auto-selects that company's first model, so the choice is never dangling.
//!
//! The core streaming path only ever sees the resulting [`ModelChoice`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One model as advertised by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Display name
    pub name: String,
    /// Short human-readable description
    pub description: String,
}

/// The catalog returned by `GET /api/models`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelCatalog {
    /// Models grouped as company -> model id -> entry
    #[serde(default)]
    pub models: BTreeMap<String, BTreeMap<String, ModelEntry>>,
    /// Server-side default company
    #[serde(default)]
    pub current_company: String,
    /// Server-side default model id
    #[serde(default)]
    pub current_model: String,
}

/// The company/model pair a chat request carries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelChoice {
    /// Provider company
    pub company: String,
    /// Model identifier within the company
    pub model: String,
}

impl Default for ModelChoice {
    fn default() -> Self {
        Self {
            company: "Google".to_string(),
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

/// Selection state over a fetched catalog
#[derive(Clone, Debug, Default)]
pub struct ModelSelection {
    catalog: ModelCatalog,
    choice: ModelChoice,
}

impl ModelSelection {
    /// Build a selection from a catalog, starting at the server defaults
    ///
    /// Falls back to the built-in default choice when the catalog does not
    /// name its defaults.
    #[must_use]
    pub fn from_catalog(catalog: ModelCatalog) -> Self {
        let mut choice = ModelChoice::default();
        if !catalog.current_company.is_empty() {
            choice.company = catalog.current_company.clone();
        }
        if !catalog.current_model.is_empty() {
            choice.model = catalog.current_model.clone();
        }
        Self { catalog, choice }
    }

    /// The current choice
    #[must_use]
    pub fn choice(&self) -> &ModelChoice {
        &self.choice
    }

    /// All companies in the catalog
    #[must_use]
    pub fn companies(&self) -> Vec<&str> {
        self.catalog.models.keys().map(String::as_str).collect()
    }

    /// Models available for one company
    #[must_use]
    pub fn models_for(&self, company: &str) -> Vec<(&str, &ModelEntry)> {
        self.catalog
            .models
            .get(company)
            .map(|models| {
                models
                    .iter()
                    .map(|(id, entry)| (id.as_str(), entry))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Switch company, auto-selecting its first model
    ///
    /// Returns whether the company exists in the catalog; an unknown company
    /// leaves the choice untouched.
    pub fn select_company(&mut self, company: &str) -> bool {
        let Some(models) = self.catalog.models.get(company) else {
            return false;
        };
        let Some(first_model) = models.keys().next() else {
            return false;
        };
        self.choice = ModelChoice {
            company: company.to_string(),
            model: first_model.clone(),
        };
        true
    }

    /// Select a model within the current company
    ///
    /// Returns whether the model exists for that company.
    pub fn select_model(&mut self, model: &str) -> bool {
        let known = self
            .catalog
            .models
            .get(&self.choice.company)
            .is_some_and(|models| models.contains_key(model));
        if known {
            self.choice.model = model.to_string();
        }
        known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> ModelCatalog {
        serde_json::from_str(
            r#"{
                "models": {
                    "Google": {
                        "gemini-2.0-flash": {
                            "name": "Gemini 2.0 Flash",
                            "description": "Fast and efficient"
                        }
                    },
                    "OpenAI": {
                        "gpt-4o": {"name": "GPT-4o", "description": "Multimodal model"},
                        "gpt-4o-mini": {"name": "GPT-4o Mini", "description": "Fast and cost-effective"}
                    }
                },
                "current_company": "OpenAI",
                "current_model": "gpt-4o"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_catalog_parse() {
        let catalog = sample_catalog();
        assert_eq!(catalog.models.len(), 2);
        assert_eq!(
            catalog.models["Google"]["gemini-2.0-flash"].name,
            "Gemini 2.0 Flash"
        );
    }

    #[test]
    fn test_selection_starts_at_server_defaults() {
        let selection = ModelSelection::from_catalog(sample_catalog());
        assert_eq!(selection.choice().company, "OpenAI");
        assert_eq!(selection.choice().model, "gpt-4o");
    }

    #[test]
    fn test_empty_catalog_falls_back_to_default() {
        let selection = ModelSelection::from_catalog(ModelCatalog::default());
        assert_eq!(*selection.choice(), ModelChoice::default());
    }

    #[test]
    fn test_select_company_picks_first_model() {
        let mut selection = ModelSelection::from_catalog(sample_catalog());
        assert!(selection.select_company("Google"));
        assert_eq!(selection.choice().company, "Google");
        assert_eq!(selection.choice().model, "gemini-2.0-flash");
    }

    #[test]
    fn test_select_unknown_company_is_rejected() {
        let mut selection = ModelSelection::from_catalog(sample_catalog());
        let before = selection.choice().clone();
        assert!(!selection.select_company("Acme"));
        assert_eq!(*selection.choice(), before);
    }

    #[test]
    fn test_select_model_within_company() {
        let mut selection = ModelSelection::from_catalog(sample_catalog());
        assert!(selection.select_model("gpt-4o-mini"));
        assert_eq!(selection.choice().model, "gpt-4o-mini");

        assert!(!selection.select_model("gemini-2.0-flash"));
        assert_eq!(selection.choice().model, "gpt-4o-mini");
    }

    #[test]
    fn test_models_for_unknown_company_empty() {
        let selection = ModelSelection::from_catalog(sample_catalog());
        assert!(selection.models_for("Acme").is_empty());
        assert_eq!(selection.models_for("OpenAI").len(), 2);
    }
}
