use crate::util::text::char_len;

/// Task name rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("task name cannot be empty")]
    EmptyName,
    #[error("task name is too long ({len} characters, max {max})")]
    NameTooLong { len: usize, max: usize },
}

/// Check a name before it is submitted. Whitespace-only counts as empty.
pub fn validate_name(name: &str, max: usize) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let len = char_len(name);
    if len > max {
        return Err(ValidationError::NameTooLong { len, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_boundary() {
        assert_eq!(validate_name(&"a".repeat(200), 200), Ok(()));
        assert_eq!(
            validate_name(&"a".repeat(201), 200),
            Err(ValidationError::NameTooLong { len: 201, max: 200 })
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(validate_name(&"é".repeat(200), 200), Ok(()));
    }

    #[test]
    fn blank_is_empty() {
        assert_eq!(validate_name("   ", 200), Err(ValidationError::EmptyName));
    }
}
