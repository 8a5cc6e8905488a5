// Style Template Catalog

use crate::domain::error::{DomainError, Result};
use serde::Serialize;

/// Named style preset a job may use instead of a reference artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

static BUILTIN_TEMPLATES: [StyleTemplate; 4] = [
    StyleTemplate {
        id: "cinematic",
        name: "Cinematic",
        description: "Film-like color grading with dramatic curves and professional look",
    },
    StyleTemplate {
        id: "vibrant",
        name: "Vibrant",
        description: "High energy, social media style with punchy colors and clarity",
    },
    StyleTemplate {
        id: "minimal",
        name: "Minimal",
        description: "Clean, professional aesthetic with subtle adjustments",
    },
    StyleTemplate {
        id: "vintage",
        name: "Vintage",
        description: "Retro film aesthetic with warm tones and aging effects",
    },
];

/// Built-in template catalog
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleTemplateCatalog;

impl StyleTemplateCatalog {
    pub fn list(&self) -> &'static [StyleTemplate] {
        &BUILTIN_TEMPLATES
    }

    pub fn get(&self, id: &str) -> Result<&'static StyleTemplate> {
        BUILTIN_TEMPLATES
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| DomainError::UnknownTemplate(id.to_string()))
    }
}
