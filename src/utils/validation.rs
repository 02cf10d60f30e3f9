use crate::utils::error::{ImportError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ImportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ImportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ImportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 學生信箱網域：不可為空，也不可包含 `@` 或空白
pub fn validate_email_domain(field_name: &str, domain: &str) -> Result<()> {
    validate_non_empty_string(field_name, domain)?;

    if domain.contains('@') || domain.chars().any(char::is_whitespace) {
        return Err(ImportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: domain.to_string(),
            reason: "Domain must not contain '@' or whitespace".to_string(),
        });
    }

    if !domain.contains('.') {
        return Err(ImportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: domain.to_string(),
            reason: "Domain must contain at least one '.'".to_string(),
        });
    }

    Ok(())
}

pub fn validate_date_formats(field_name: &str, formats: &[String]) -> Result<()> {
    if formats.is_empty() {
        return Err(ImportError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    for format in formats {
        // 至少要有年、月、日
        let has_year = format.contains("%Y") || format.contains("%y");
        let has_month = format.contains("%m") || format.contains("%b") || format.contains("%B");
        let has_day = format.contains("%d") || format.contains("%e");
        if !(has_year && has_month && has_day) {
            return Err(ImportError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format.clone(),
                reason: "Date format must contain year, month and day".to_string(),
            });
        }
    }

    Ok(())
}
