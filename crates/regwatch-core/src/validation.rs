//! Source validation.
//!
//! Every problem in a source is collected before the request is rejected, so
//! a misconfigured pipeline sees one complete report.

use std::fmt;

use thiserror::Error;

/// What is wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Problem {
    /// The field must be set.
    Missing,
    /// The value cannot be used as given.
    Malformed,
    /// The field cannot be set together with another one.
    Conflicting,
}

/// One invalid field of a source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{field}': {message}")]
pub struct ValidationError {
    /// Field name as it appears in the request, e.g. `registry_mirror.host`.
    pub field: String,
    /// What the pipeline author should fix.
    pub message: String,
    /// Problem category.
    pub problem: Problem,
}

impl ValidationError {
    /// A field that must be set but is absent or empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use regwatch_core::ValidationError;
    /// use regwatch_core::validation::Problem;
    ///
    /// let error = ValidationError::required("aws_region");
    /// assert_eq!(error.problem, Problem::Missing);
    /// assert_eq!(error.to_string(), "'aws_region': must be set");
    /// ```
    pub fn required(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: "must be set".to_string(),
            problem: Problem::Missing,
        }
    }

    /// A value that is present but unusable.
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            problem: Problem::Malformed,
        }
    }

    /// A field set alongside one it excludes.
    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            problem: Problem::Conflicting,
        }
    }
}

/// All problems found in one source. Never empty when returned as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Starts an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Records a problem.
    pub fn add(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Number of problems recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recorded problems in the order they were found.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// `Ok` for an empty report, the report itself otherwise.
    ///
    /// # Errors
    ///
    /// Returns `self` if any problem was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut errors = self.0.iter();
        match errors.next() {
            None => f.write_str("no problems"),
            Some(first) => {
                write!(f, "{first}")?;
                errors.try_for_each(|error| write!(f, "; {error}"))
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Types that check their own consistency before use.
pub trait Validate {
    /// Returns every problem found.
    ///
    /// # Errors
    ///
    /// Returns the collected problems if there is at least one.
    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Whether [`Validate::validate`] passes.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
