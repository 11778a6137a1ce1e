//! Model catalog
//!
//! Static mapping of model identifiers to display metadata and the ordered
//! set of output classes each model can produce. The catalog is built once
//! at startup and injected wherever it is needed; it is never mutated.

use crate::error::{Error, Result};
use serde::Serialize;

/// Display metadata and output classes for one inference model
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    /// Stable string id, unique across the catalog (e.g. "brain-tumor")
    pub key: String,
    /// Display name (e.g. "Brain Tumor Detection")
    pub name: String,
    /// Short category line (e.g. "Neurological")
    pub subtitle: String,
    /// One-paragraph description for the model info panel
    pub description: String,
    /// Ordered set of class labels this model can predict (non-empty)
    pub classes: Vec<String>,
    /// Presentational gradient token, opaque to the core
    pub color: String,
    /// Presentational background token, opaque to the core
    pub bg_color: String,
}

impl ModelDescriptor {
    /// Whether `label` is one of this model's output classes
    pub fn has_class(&self, label: &str) -> bool {
        self.classes.iter().any(|c| c == label)
    }
}

/// Immutable catalog of the models a station can analyze against
#[derive(Debug, Clone, Serialize)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog, validating descriptor invariants:
    /// keys unique and non-empty, class lists non-empty, labels unique
    /// within each model.
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self> {
        if models.is_empty() {
            return Err(Error::Config("model catalog is empty".to_string()));
        }

        for (i, model) in models.iter().enumerate() {
            if model.key.is_empty() {
                return Err(Error::Config("model key must be non-empty".to_string()));
            }
            if models[..i].iter().any(|m| m.key == model.key) {
                return Err(Error::Config(format!(
                    "duplicate model key in catalog: {}",
                    model.key
                )));
            }
            if model.classes.is_empty() {
                return Err(Error::Config(format!(
                    "model '{}' has no output classes",
                    model.key
                )));
            }
            for (j, class) in model.classes.iter().enumerate() {
                if model.classes[..j].contains(class) {
                    return Err(Error::Config(format!(
                        "model '{}' lists class '{}' more than once",
                        model.key, class
                    )));
                }
            }
        }

        Ok(Self { models })
    }

    /// The built-in production catalog
    pub fn builtin() -> Self {
        let models = vec![
            ModelDescriptor {
                key: "brain-tumor".to_string(),
                name: "Brain Tumor Detection".to_string(),
                subtitle: "Neurological".to_string(),
                description: "Advanced AI model for detecting and classifying brain tumors from MRI scans".to_string(),
                classes: vec![
                    "Glioma".to_string(),
                    "Meningioma".to_string(),
                    "Pituitary Tumor".to_string(),
                    "No Tumor".to_string(),
                ],
                color: "from-pink-500 to-purple-600".to_string(),
                bg_color: "bg-pink-500".to_string(),
            },
            ModelDescriptor {
                key: "stroke".to_string(),
                name: "Stroke Analysis".to_string(),
                subtitle: "Vascular".to_string(),
                description: "Rapid stroke classification for emergency diagnosis".to_string(),
                classes: vec![
                    "Bleeding".to_string(),
                    "Ischemia".to_string(),
                    "Normal".to_string(),
                ],
                color: "from-cyan-500 to-blue-600".to_string(),
                bg_color: "bg-cyan-500".to_string(),
            },
            ModelDescriptor {
                key: "parkinson".to_string(),
                name: "Parkinson's Detection".to_string(),
                subtitle: "Movement Disorders".to_string(),
                description: "Early detection of Parkinson's disease markers".to_string(),
                classes: vec!["Parkinson's".to_string(), "Normal".to_string()],
                color: "from-amber-500 to-orange-600".to_string(),
                bg_color: "bg-amber-500".to_string(),
            },
            ModelDescriptor {
                key: "hemorrhagic".to_string(),
                name: "Hemorrhagic Detection".to_string(),
                subtitle: "Emergency".to_string(),
                description: "Detection of hemorrhagic conditions".to_string(),
                classes: vec!["Hemorrhagic".to_string(), "Normal".to_string()],
                color: "from-red-500 to-pink-600".to_string(),
                bg_color: "bg-red-500".to_string(),
            },
        ];

        Self::new(models).expect("builtin model catalog is well-formed")
    }

    /// Look up a model by key
    pub fn get(&self, key: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.key == key)
    }

    /// All models, in catalog order
    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// The model a fresh session starts on (first catalog entry)
    pub fn default_model(&self) -> &ModelDescriptor {
        &self.models[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(key: &str, classes: &[&str]) -> ModelDescriptor {
        ModelDescriptor {
            key: key.to_string(),
            name: format!("{key} model"),
            subtitle: "Test".to_string(),
            description: "Test model".to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            color: "from-gray-500 to-gray-600".to_string(),
            bg_color: "bg-gray-500".to_string(),
        }
    }

    #[test]
    fn builtin_catalog_has_all_production_models() {
        let catalog = ModelCatalog::builtin();

        assert_eq!(catalog.models().len(), 4);
        assert_eq!(catalog.default_model().key, "brain-tumor");

        let brain = catalog.get("brain-tumor").unwrap();
        assert_eq!(
            brain.classes,
            vec!["Glioma", "Meningioma", "Pituitary Tumor", "No Tumor"]
        );

        assert!(catalog.get("stroke").is_some());
        assert!(catalog.get("parkinson").is_some());
        assert!(catalog.get("hemorrhagic").is_some());
        assert!(catalog.get("unknown-model").is_none());
    }

    #[test]
    fn class_membership() {
        let catalog = ModelCatalog::builtin();
        let brain = catalog.get("brain-tumor").unwrap();

        assert!(brain.has_class("Glioma"));
        assert!(brain.has_class("No Tumor"));
        assert!(!brain.has_class("Ischemia"));
        assert!(!brain.has_class("glioma")); // labels are case-sensitive
    }

    #[test]
    fn rejects_duplicate_keys() {
        let result = ModelCatalog::new(vec![
            descriptor("a", &["X"]),
            descriptor("a", &["Y"]),
        ]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_empty_class_list() {
        let result = ModelCatalog::new(vec![descriptor("a", &[])]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_duplicate_class_labels() {
        let result = ModelCatalog::new(vec![descriptor("a", &["X", "Y", "X"])]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(ModelCatalog::new(vec![]), Err(Error::Config(_))));
    }
}
