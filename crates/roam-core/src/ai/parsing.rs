//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap the JSON payload in prose or code fences, so every
//! parser first cuts out the outermost `{ ... }`.

use serde::Deserialize;

use crate::error::{Error, Result};

use super::types::{AlternativeDescription, AlternativeDescriptions, QualityAssessment};

fn truncate(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Extract the outermost JSON object from a response
pub fn extract_json(response: &str) -> Result<&str> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::Ai(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response)
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct RawQuality {
    quality_score: serde_json::Value,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a quality assessment, accepting fractional or quoted scores
pub fn parse_quality_assessment(response: &str) -> Result<QualityAssessment> {
    let json_str = extract_json(response)?;
    let raw: RawQuality = serde_json::from_str(json_str).map_err(|e| {
        Error::Ai(format!(
            "Invalid JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })?;

    let score = match &raw.quality_score {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| Error::Ai(format!("Invalid quality_score: {}", raw.quality_score)))?;

    Ok(QualityAssessment {
        quality_score: score.round().clamp(0.0, 100.0) as u32,
        reasoning: raw
            .reasoning
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    })
}

/// Parse rewritten alternative descriptions
pub fn parse_alternative_descriptions(response: &str) -> Result<Vec<AlternativeDescription>> {
    let json_str = extract_json(response)?;
    let parsed: AlternativeDescriptions = serde_json::from_str(json_str).map_err(|e| {
        Error::Ai(format!(
            "Invalid descriptions JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str)
        ))
    })?;

    Ok(parsed
        .descriptions
        .into_iter()
        .filter(|d| !d.description.trim().is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"quality_score\": 80}\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"quality_score\": 80}");
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn test_parse_quality_variants() {
        let a = parse_quality_assessment(r#"{"quality_score": 82.6, "reasoning": " good value "}"#)
            .unwrap();
        assert_eq!(a.quality_score, 83);
        assert_eq!(a.reasoning.as_deref(), Some("good value"));

        let b = parse_quality_assessment(r#"{"quality_score": "140"}"#).unwrap();
        assert_eq!(b.quality_score, 100);
        assert_eq!(b.reasoning, None);

        assert!(parse_quality_assessment(r#"{"quality_score": null}"#).is_err());
        assert!(parse_quality_assessment(r#"{"score": 50}"#).is_err());
    }

    #[test]
    fn test_parse_alternative_descriptions() {
        let parsed = parse_alternative_descriptions(
            r#"{"descriptions": [{"id": 4, "description": "Twice the data"}, {"id": 5, "description": " "}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, 4);
    }
}
