//! Recovery and validation of the structured analysis.
//!
//! The model's final message is prose-wrapped JSON: there may be leading
//! commentary before the object and trailing commentary after it. The
//! extractor walks the text with a brace-depth counter and in-string
//! tracking, so braces inside string values and escaped quotes cannot
//! mis-terminate the scan the way a "last `}` in text" heuristic would.
//!
//! Validation is all-or-nothing: an analysis either conforms fully to the
//! [`Analysis`] shape or the whole investigation is rejected.

use crate::analysis::Analysis;
use crate::errors::{MedicError, MedicResult};

/// Extract the first complete JSON object embedded in `text`.
///
/// Returns the exact `{...}` slice. Fails when no opening brace exists or
/// the object never closes.
pub fn extract_json_object(text: &str) -> MedicResult<&str> {
    let start = text.find('{').ok_or_else(|| MedicError::ResponseParse {
        reason: "No JSON object found in response".to_string(),
    })?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else {
                match ch {
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(MedicError::ResponseParse {
        reason: "JSON object is never closed in response".to_string(),
    })
}

/// Parse and validate the analysis embedded in a model response.
///
/// Rejects on any shape violation; there is no partial-acceptance mode.
pub fn parse_analysis(text: &str) -> MedicResult<Analysis> {
    let json = extract_json_object(text)?;

    let analysis: Analysis =
        serde_json::from_str(json).map_err(|e| MedicError::ResponseParse {
            reason: format!("Analysis does not match expected shape: {e}"),
        })?;

    validate(&analysis)?;
    Ok(analysis)
}

/// Field-level rules serde cannot express: non-empty strings and lists,
/// confidence range.
fn validate(analysis: &Analysis) -> MedicResult<()> {
    if analysis.root_cause.trim().is_empty() {
        return Err(invalid("rootCause must be non-empty"));
    }
    if !(0.0..=1.0).contains(&analysis.confidence) {
        return Err(invalid(&format!(
            "confidence {} is outside [0, 1]",
            analysis.confidence
        )));
    }
    if analysis.factors.is_empty() {
        return Err(invalid("factors must be a non-empty list"));
    }
    if analysis.remediation.summary.trim().is_empty() {
        return Err(invalid("remediation.summary must be non-empty"));
    }
    for (idx, action) in analysis.remediation.actions.iter().enumerate() {
        if action.description.trim().is_empty() {
            return Err(invalid(&format!(
                "remediation.actions[{idx}].description must be non-empty"
            )));
        }
        if action.rationale.trim().is_empty() {
            return Err(invalid(&format!(
                "remediation.actions[{idx}].rationale must be non-empty"
            )));
        }
    }
    Ok(())
}

fn invalid(reason: &str) -> MedicError {
    MedicError::ResponseParse {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{IssueStatus, RiskLevel};

    fn valid_json() -> String {
        serde_json::json!({
            "issueStatus": "active",
            "rootCause": "OOMKilled container due to undersized memory limit",
            "confidence": 0.9,
            "factors": ["exit code 137", "memory limit 128Mi"],
            "remediation": {
                "summary": "Raise the memory limit",
                "actions": [{
                    "description": "Patch the deployment memory limit to 512Mi",
                    "command": "kubectl patch deployment web -p '...'",
                    "risk": "low",
                    "rationale": "current limit is below observed working set"
                }],
                "risk": "low"
            },
            "validationIntent": "Confirm the web pods stay Running"
        })
        .to_string()
    }

    #[test]
    fn test_extracts_exact_object_with_trailing_prose() {
        let json = valid_json();
        let text = format!("Here is my analysis:\n{json}\nLet me know if anything is unclear.");
        assert_eq!(extract_json_object(&text).unwrap(), json);
    }

    #[test]
    fn test_braces_inside_strings_do_not_terminate() {
        let text = r#"{"rootCause": "selector {app=web} matched nothing", "depth": {"x": "}"}} trailing"#;
        let extracted = extract_json_object(text).unwrap();
        assert!(extracted.ends_with("\"}\"}}"));
        let value: serde_json::Value = serde_json::from_str(extracted).unwrap();
        assert_eq!(value["depth"]["x"], "}");
    }

    #[test]
    fn test_escaped_quotes_do_not_toggle_string_state() {
        let text = r#"prose {"note": "he said \"run {it}\" twice"} more prose"#;
        let extracted = extract_json_object(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(extracted).unwrap();
        assert_eq!(value["note"], "he said \"run {it}\" twice");
    }

    #[test]
    fn test_missing_or_unclosed_object() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(MedicError::ResponseParse { .. })
        ));
        assert!(matches!(
            extract_json_object("{\"open\": true"),
            Err(MedicError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_parses_valid_analysis() {
        let text = format!("Investigation complete.\n{}", valid_json());
        let analysis = parse_analysis(&text).unwrap();
        assert_eq!(analysis.issue_status, IssueStatus::Active);
        assert!((analysis.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(analysis.remediation.actions.len(), 1);
        assert_eq!(analysis.remediation.risk, RiskLevel::Low);
        assert_eq!(
            analysis.validation_intent.as_deref(),
            Some("Confirm the web pods stay Running")
        );
    }

    #[test]
    fn test_rejects_bad_issue_status() {
        let text = valid_json().replace("\"active\"", "\"maybe\"");
        let err = parse_analysis(&text).unwrap_err();
        assert!(err.to_string().contains("expected shape"));
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let text = valid_json().replace("0.9", "1.5");
        let err = parse_analysis(&text).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
    }

    #[test]
    fn test_rejects_empty_factors() {
        let text = valid_json().replace(
            "[\"exit code 137\",\"memory limit 128Mi\"]",
            "[]",
        );
        let err = parse_analysis(&text).unwrap_err();
        assert!(err.to_string().contains("factors"));
    }

    #[test]
    fn test_rejects_empty_root_cause() {
        let text =
            valid_json().replace("OOMKilled container due to undersized memory limit", " ");
        let err = parse_analysis(&text).unwrap_err();
        assert!(err.to_string().contains("rootCause"));
    }

    #[test]
    fn test_rejects_bad_action_risk() {
        let text = valid_json().replacen("\"low\"", "\"severe\"", 1);
        assert!(parse_analysis(&text).is_err());
    }

    #[test]
    fn test_rejects_missing_remediation() {
        let text = r#"{"issueStatus": "active", "rootCause": "x", "confidence": 0.5, "factors": ["a"]}"#;
        assert!(parse_analysis(text).is_err());
    }
}
