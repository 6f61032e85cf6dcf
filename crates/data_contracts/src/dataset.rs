use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Valid,
    Invalid,
}

/// One image/label pair discovered under a dataset root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub image_path: PathBuf,
    pub label_path: PathBuf,
    pub validation_status: ValidationStatus,
    pub error_code: Option<ValidationCode>,
}

impl DatasetRecord {
    pub fn pending(image_path: PathBuf, label_path: PathBuf) -> Self {
        Self {
            image_path,
            label_path,
            validation_status: ValidationStatus::Pending,
            error_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationCode {
    #[serde(rename = "DIR_NOT_FOUND")]
    DirNotFound,
    #[serde(rename = "COUNT_MISMATCH")]
    CountMismatch,
    #[serde(rename = "MISSING_LABEL")]
    MissingLabel,
    #[serde(rename = "INVALID_IMAGE")]
    InvalidImage,
    #[serde(rename = "INVALID_LABEL")]
    InvalidLabel,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::DirNotFound => "DIR_NOT_FOUND",
            ValidationCode::CountMismatch => "COUNT_MISMATCH",
            ValidationCode::MissingLabel => "MISSING_LABEL",
            ValidationCode::InvalidImage => "INVALID_IMAGE",
            ValidationCode::InvalidLabel => "INVALID_LABEL",
            ValidationCode::ValidationError => "VALIDATION_ERROR",
        }
    }

    pub fn kind(&self) -> IssueKind {
        match self {
            ValidationCode::DirNotFound => IssueKind::Structure,
            ValidationCode::CountMismatch | ValidationCode::MissingLabel => IssueKind::Pairing,
            ValidationCode::InvalidImage => IssueKind::Image,
            ValidationCode::InvalidLabel => IssueKind::Label,
            ValidationCode::ValidationError => IssueKind::Internal,
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Structure,
    Pairing,
    Image,
    Label,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub message: String,
    pub code: ValidationCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ValidationIssue {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            message: message.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub total_images: usize,
    pub total_labels: usize,
    /// `(width, height)` of every decodable image, in file order.
    pub image_resolutions: Vec<(u32, u32)>,
    /// Mean size in bytes over all image and label files.
    pub average_file_size: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFiles {
    pub images: Vec<String>,
    pub labels: Vec<String>,
}

/// Outcome of structural validation; mirrors the dataset-validation query payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub stats: DatasetStats,
    pub files: DatasetFiles,
}

impl ValidationResult {
    pub fn count(&self, code: ValidationCode) -> usize {
        self.errors.iter().filter(|e| e.code == code).count()
    }

    pub fn has(&self, code: ValidationCode) -> bool {
        self.count(code) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_query_shape() {
        let result = ValidationResult {
            is_valid: false,
            errors: vec![ValidationIssue::new(
                ValidationCode::CountMismatch,
                "3 images but 2 labels",
            )],
            stats: DatasetStats {
                total_images: 3,
                total_labels: 2,
                image_resolutions: vec![(4, 4)],
                average_file_size: 10.0,
            },
            files: DatasetFiles::default(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["errors"][0]["code"], "COUNT_MISMATCH");
        assert_eq!(json["errors"][0]["type"], "pairing");
        assert!(json["errors"][0].get("details").is_none());
        assert_eq!(json["stats"]["totalImages"], 3);
        assert_eq!(json["stats"]["averageFileSize"], 10.0);
    }
}
