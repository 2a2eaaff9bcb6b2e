use crate::errors::{AppError, AppResult};
use crate::models::LeadPatch;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

impl LeadPatch {
    /// Guard applied before an edit is submitted. An empty email is treated as "not edited".
    pub fn validate(&self) -> AppResult<()> {
        if let Some(email) = self.email.as_deref() {
            if !email.is_empty() && !is_valid_email(email) {
                return Err(AppError::Validation(format!("Invalid email: {}", email)));
            }
        }
        if let Some(score) = self.score {
            if !score.is_finite() {
                return Err(AppError::Validation("Score must be a finite number".to_string()));
            }
        }
        Ok(())
    }
}

/// Parses the free-text amount typed into the conversion form.
pub fn parse_amount(raw: &str) -> AppResult<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let amount = trimmed
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("Invalid amount: {}", trimmed)))?;
    validate_amount(amount).map(Some)
}

/// Opportunity amounts must be finite and non-negative.
pub fn validate_amount(amount: f64) -> AppResult<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(format!("Invalid amount: {}", amount)));
    }
    Ok(amount)
}
