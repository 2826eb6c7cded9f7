//! Input rules for directory submissions.
//!
//! The same checks run in the dashboard client before any request goes out
//! and again in the relay before anything touches a backend.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_ALLOWED_TYPES: &str = "image/*";
const MIN_NAME_CHARS: usize = 2;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name is required.")]
    NameRequired,
    #[error("Name must be at least 2 characters long.")]
    NameTooShort,
    #[error("Email is required.")]
    EmailRequired,
    #[error("Invalid email format.")]
    InvalidEmail,
    #[error("Profile photo is required.")]
    PhotoRequired,
    #[error("File size must be less than {}MB", megabytes(*max_bytes))]
    FileTooLarge { max_bytes: u64 },
    #[error("File type not allowed. Allowed types: {}", allowed.join(", "))]
    FileTypeNotAllowed { allowed: Vec<String> },
}

fn megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / 1024.0 / 1024.0;
    if mb.fract() == 0.0 {
        format!("{mb:.0}")
    } else {
        format!("{mb:.2}")
    }
}

/// What the directory accepts as a profile photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    /// Exact MIME types, `type/*` wildcards, or file name suffixes.
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: parse_allowed_types(DEFAULT_ALLOWED_TYPES),
        }
    }
}

/// Split a comma separated allow-list, dropping blanks.
pub fn parse_allowed_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// The parts of an uploaded file the policy looks at.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size: u64,
}

impl UploadPolicy {
    pub fn check(&self, file: FileMeta<'_>) -> Result<(), ValidationError> {
        if file.size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                max_bytes: self.max_file_size,
            });
        }

        let allowed = self.allowed_types.iter().any(|rule| {
            match rule.strip_suffix("/*") {
                Some(family) => file
                    .content_type
                    .strip_prefix(family)
                    .is_some_and(|rest| rest.starts_with('/')),
                None => file.content_type == rule || file.file_name.ends_with(rule.as_str()),
            }
        });
        if !allowed {
            return Err(ValidationError::FileTypeNotAllowed {
                allowed: self.allowed_types.clone(),
            });
        }

        Ok(())
    }
}

/// Check a directory submission in the order the form reports problems.
pub fn validate_new_user(
    name: &str,
    email: &str,
    photo: Option<FileMeta<'_>>,
    policy: &UploadPolicy,
) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(ValidationError::NameTooShort);
    }

    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }

    let photo = photo.ok_or(ValidationError::PhotoRequired)?;
    policy.check(photo)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn png(size: u64) -> FileMeta<'static> {
        FileMeta {
            file_name: "me.png",
            content_type: "image/png",
            size,
        }
    }

    #[test]
    fn validate_new_user__should_accept_well_formed_submission() {
        let result = validate_new_user("Ada", "ada@example.com", Some(png(10)), &UploadPolicy::default());

        assert_eq!(result, Ok(()));
    }

    #[test]
    fn validate_new_user__should_report_first_problem() {
        let policy = UploadPolicy::default();

        assert_eq!(
            validate_new_user("  ", "x", None, &policy),
            Err(ValidationError::NameRequired)
        );
        assert_eq!(
            validate_new_user("A", "x", None, &policy),
            Err(ValidationError::NameTooShort)
        );
        assert_eq!(
            validate_new_user("Ada", "", None, &policy),
            Err(ValidationError::EmailRequired)
        );
        assert_eq!(
            validate_new_user("Ada", "ada@example.com", None, &policy),
            Err(ValidationError::PhotoRequired)
        );
    }

    #[test]
    fn validate_new_user__should_reject_malformed_email() {
        let policy = UploadPolicy::default();

        for email in ["not-an-email", "a@b", "a b@c.d", "@c.d", "a@@c.d"] {
            let err = validate_new_user("Ada", email, Some(png(1)), &policy).unwrap_err();
            assert_eq!(err, ValidationError::InvalidEmail, "{email}");
            assert_eq!(err.to_string(), "Invalid email format.");
        }
    }

    #[test]
    fn check__should_enforce_size_cap() {
        let policy = UploadPolicy::default();

        let err = policy.check(png(DEFAULT_MAX_FILE_SIZE + 1)).unwrap_err();

        assert_eq!(err.to_string(), "File size must be less than 5MB");
        assert!(policy.check(png(DEFAULT_MAX_FILE_SIZE)).is_ok());
    }

    #[test]
    fn check__should_match_wildcards_exact_types_and_suffixes() {
        let policy = UploadPolicy {
            max_file_size: 100,
            allowed_types: parse_allowed_types("image/*, application/pdf,.txt"),
        };
        let file = |file_name, content_type| FileMeta {
            file_name,
            content_type,
            size: 1,
        };

        assert!(policy.check(file("a.jpg", "image/jpeg")).is_ok());
        assert!(policy.check(file("a.pdf", "application/pdf")).is_ok());
        assert!(policy.check(file("notes.txt", "")).is_ok());
        assert!(policy.check(file("a.svg", "imagex/svg")).is_err());

        let err = policy.check(file("a.zip", "application/zip")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File type not allowed. Allowed types: image/*, application/pdf, .txt"
        );
    }
}
