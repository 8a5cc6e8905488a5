// Create Job Use Case

use crate::domain::{Job, StyleOptions, StyleTemplateCatalog};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::{Deserialize, Serialize};

/// Job creation request as received from callers.
///
/// `options` stays untyped until validation so that a non-boolean toggle is
/// reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub input_path: String,
    #[serde(default)]
    pub reference_path: Option<String>,
    #[serde(default)]
    pub style_template: Option<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

/// Inputs that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub input_path: String,
    pub reference_path: Option<String>,
    pub style_template: Option<String>,
    pub options: StyleOptions,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn validate_options(options: Option<&serde_json::Value>) -> Result<StyleOptions> {
    let map = match options {
        None | Some(serde_json::Value::Null) => return Ok(StyleOptions::default()),
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            return Err(AppError::Validation(
                "options must be a JSON object".to_string(),
            ))
        }
    };

    for (key, value) in map {
        if !StyleOptions::KEYS.contains(&key.as_str()) {
            return Err(AppError::Validation(format!("Unknown option: {}", key)));
        }
        if !value.is_boolean() {
            return Err(AppError::Validation(format!(
                "Option '{}' must be a boolean",
                key
            )));
        }
    }

    serde_json::from_value(serde_json::Value::Object(map.clone()))
        .map_err(|e| AppError::Validation(format!("Invalid options: {}", e)))
}

/// Validate a creation request without touching the store
pub fn validate_request(req: &CreateJobRequest) -> Result<ValidatedRequest> {
    let input_path = req.input_path.trim();
    if input_path.is_empty() {
        return Err(AppError::Validation("input_path is required".to_string()));
    }

    let reference_path = non_empty(&req.reference_path);
    let style_template = non_empty(&req.style_template);

    if reference_path.is_none() && style_template.is_none() {
        return Err(AppError::Validation(
            "Either reference_path or style_template is required".to_string(),
        ));
    }

    if let Some(template) = &style_template {
        StyleTemplateCatalog
            .get(template)
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    Ok(ValidatedRequest {
        input_path: input_path.to_string(),
        reference_path,
        style_template,
        options: validate_options(req.options.as_ref())?,
    })
}

/// Validate, assign an ID and persist a Pending job
///
/// # Arguments
///
/// * `job_repo` - Job repository
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Creation request
pub async fn execute(
    job_repo: &dyn JobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: CreateJobRequest,
) -> Result<Job> {
    let validated = validate_request(&req)?;

    let job = Job::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        validated.input_path,
        validated.reference_path,
        validated.style_template,
        validated.options,
    );

    job_repo.insert(&job).await?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> CreateJobRequest {
        CreateJobRequest {
            input_path: "uploads/in.mp4".to_string(),
            reference_path: None,
            style_template: Some("cinematic".to_string()),
            options: None,
        }
    }

    #[test]
    fn test_validate_valid_request() {
        let validated = validate_request(&request()).unwrap();
        assert_eq!(validated.input_path, "uploads/in.mp4");
        assert_eq!(validated.style_template.as_deref(), Some("cinematic"));
        assert_eq!(validated.options, StyleOptions::default());
    }

    #[test]
    fn test_validate_input_path_empty() {
        let req = CreateJobRequest {
            input_path: "   ".to_string(),
            ..request()
        };
        let err = validate_request(&req).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("input_path")));
    }

    #[test]
    fn test_validate_requires_reference_or_template() {
        let req = CreateJobRequest {
            reference_path: Some(String::new()),
            style_template: Some(" ".to_string()),
            ..request()
        };
        let err = validate_request(&req).unwrap_err();
        assert!(err.to_string().contains("reference_path or style_template"));

        let req = CreateJobRequest {
            reference_path: Some("uploads/ref.mp4".to_string()),
            style_template: None,
            ..request()
        };
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_validate_unknown_template() {
        let req = CreateJobRequest {
            style_template: Some("noir".to_string()),
            ..request()
        };
        let err = validate_request(&req).unwrap_err();
        assert!(err.to_string().contains("noir"));
    }

    #[test]
    fn test_validate_option_must_be_boolean() {
        let req = CreateJobRequest {
            options: Some(json!({"filmGrain": "yes"})),
            ..request()
        };
        let err = validate_request(&req).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("filmGrain")));
    }

    #[test]
    fn test_validate_unknown_option() {
        let req = CreateJobRequest {
            options: Some(json!({"sepia": true})),
            ..request()
        };
        assert!(validate_request(&req)
            .unwrap_err()
            .to_string()
            .contains("Unknown option"));
    }

    #[test]
    fn test_validate_options_not_object() {
        let req = CreateJobRequest {
            options: Some(json!([true, false])),
            ..request()
        };
        assert!(matches!(
            validate_request(&req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_partial_options_take_defaults() {
        let req = CreateJobRequest {
            options: Some(json!({"filmGrain": true, "colorPalette": false})),
            ..request()
        };
        let options = validate_request(&req).unwrap().options;
        assert!(options.film_grain);
        assert!(!options.color_palette);
        assert!(options.audio_normalization);
    }
}
