use std::borrow::Cow;

use validator::ValidationError;

/// Minimum number of answer options per poll
const MIN_CHOICES_COUNT: usize = 2;

/// Maximum length for a single choice text
const MAX_CHOICE_LENGTH: usize = 200;

/// Reject questions that are empty once surrounding whitespace is removed.
pub fn validate_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        let mut err = ValidationError::new("empty_question");
        err.message = Some(Cow::Borrowed("Question cannot be empty or whitespace-only"));
        return Err(err);
    }
    Ok(())
}

/// Validate the answer options of a new poll.
///
/// Ensures that:
/// - At least MIN_CHOICES_COUNT choices are provided
/// - No choice is empty or whitespace-only
/// - No choice exceeds MAX_CHOICE_LENGTH characters
pub fn validate_choices(choices: &[String]) -> Result<(), ValidationError> {
    if choices.len() < MIN_CHOICES_COUNT {
        let mut err = ValidationError::new("too_few_choices");
        err.message = Some(Cow::Owned(format!(
            "Please provide at least {} choices",
            MIN_CHOICES_COUNT
        )));
        return Err(err);
    }

    for choice in choices {
        if choice.trim().is_empty() {
            let mut err = ValidationError::new("empty_choice");
            err.message = Some(Cow::Borrowed(
                "Choices cannot be empty or whitespace-only",
            ));
            return Err(err);
        }
        if choice.chars().count() > MAX_CHOICE_LENGTH {
            let mut err = ValidationError::new("choice_too_long");
            err.message = Some(Cow::Owned(format!(
                "Choices cannot exceed {} characters",
                MAX_CHOICE_LENGTH
            )));
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(choices: &[&str]) -> Vec<String> {
        choices.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_blank_question() {
        assert!(validate_question("Lunch?").is_ok());
        assert_eq!(validate_question("   ").unwrap_err().code, "empty_question");
        assert_eq!(validate_question("").unwrap_err().code, "empty_question");
    }

    #[test]
    fn test_valid_choices() {
        assert!(validate_choices(&owned(&["Yes", "No"])).is_ok());
        assert!(validate_choices(&owned(&["a", "b", "c", "d"])).is_ok());
    }

    #[test]
    fn test_too_few_choices() {
        let err = validate_choices(&owned(&["Only"])).unwrap_err();
        assert_eq!(err.code, "too_few_choices");
        assert_eq!(validate_choices(&[]).unwrap_err().code, "too_few_choices");
    }

    #[test]
    fn test_blank_choice() {
        let err = validate_choices(&owned(&["Yes", "\t "])).unwrap_err();
        assert_eq!(err.code, "empty_choice");
    }

    #[test]
    fn test_choice_too_long() {
        let long = "x".repeat(MAX_CHOICE_LENGTH + 1);
        let err = validate_choices(&[long, "ok".to_string()]).unwrap_err();
        assert_eq!(err.code, "choice_too_long");
    }
}
