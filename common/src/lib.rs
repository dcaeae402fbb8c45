pub mod logger;

use validator::{ValidationErrors, ValidationErrorsKind};

/// Flatten validation errors into one `; `-separated line.
///
/// Nested structs and lists are reported by path (`answers[1].mark`). A rule
/// without a message falls back to its error code.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut lines = Vec::new();
    collect_errors("", errors, &mut lines);
    lines.join("; ")
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| match &e.message {
                    Some(m) => format!("{path}: {m}"),
                    None => format!("{path}: {}", e.code),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 0.0, message = "must not be negative"))]
        mark: f64,
        #[validate(length(min = 1))]
        pattern: String,
    }

    #[derive(Validate)]
    struct Wrapper {
        #[validate(nested)]
        items: Vec<Sample>,
    }

    #[test]
    fn test_format_validation_errors() {
        let sample = Sample { mark: -1.0, pattern: String::new() };
        let errors = sample.validate().unwrap_err();
        assert_eq!(
            format_validation_errors(&errors),
            "mark: must not be negative; pattern: length"
        );
    }

    #[test]
    fn test_format_nested_errors() {
        let wrapper = Wrapper {
            items: vec![
                Sample { mark: 1.0, pattern: "x".into() },
                Sample { mark: -2.0, pattern: "y".into() },
            ],
        };
        let errors = wrapper.validate().unwrap_err();
        assert_eq!(
            format_validation_errors(&errors),
            "items[1].mark: must not be negative"
        );
    }
}
