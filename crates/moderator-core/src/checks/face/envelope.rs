//! Response envelope parsing for the face detection service.
//!
//! Different service versions wrap the face list differently. Known shapes are
//! tried in a fixed order and the first that yields a list wins.

use serde_json::Value;

use crate::error::FaceServiceError;
use crate::types::FaceSignal;

/// Where the face list was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{"result": [...]}`
    Result,
    /// `{"result": {"faces": [...]}}`
    ResultFaces,
    /// `{"faces": [...]}`
    Faces,
    /// `{"data": {"result": [...]}}`
    DataResult,
    /// `{"data": {"faces": [...]}}`
    DataFaces,
}

impl Envelope {
    const ORDER: [Envelope; 5] = [
        Envelope::Result,
        Envelope::ResultFaces,
        Envelope::Faces,
        Envelope::DataResult,
        Envelope::DataFaces,
    ];

    fn pointer(self) -> &'static str {
        match self {
            Envelope::Result => "/result",
            Envelope::ResultFaces => "/result/faces",
            Envelope::Faces => "/faces",
            Envelope::DataResult => "/data/result",
            Envelope::DataFaces => "/data/faces",
        }
    }

    /// Locate the face list in a response body.
    pub fn locate(body: &Value) -> Option<(Envelope, &Vec<Value>)> {
        Self::ORDER.into_iter().find_map(|shape| {
            body.pointer(shape.pointer())
                .and_then(Value::as_array)
                .map(|faces| (shape, faces))
        })
    }
}

/// Keys that may carry the age estimate, in priority order.
const AGE_KEYS: [&str; 3] = ["age", "age_years", "estimated_age"];

/// Parse a service response into a face signal.
pub fn parse_response(body: &Value) -> Result<FaceSignal, FaceServiceError> {
    let (shape, faces) = Envelope::locate(body).ok_or_else(|| {
        FaceServiceError::MalformedResponse(format!(
            "no face list in response: {}",
            truncate(&body.to_string(), 200)
        ))
    })?;

    let age = faces.first().and_then(face_age);
    tracing::trace!(?shape, faces = faces.len(), ?age, "Parsed face response");

    Ok(FaceSignal::faces(faces.len() as u32, age))
}

/// Age of one face entry, trying each alias until one coerces.
pub fn face_age(face: &Value) -> Option<f32> {
    AGE_KEYS
        .iter()
        .filter_map(|key| face.get(key))
        .find_map(coerce_age)
}

/// Numbers and numeric strings are accepted; an age range object
/// (`{"low": .., "high": ..}`) yields its lower bound.
fn coerce_age(value: &Value) -> Option<f32> {
    let age = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Object(range) => return range.get("low").and_then(coerce_age),
        _ => return None,
    };
    age.is_finite().then_some(age as f32)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_each_envelope_shape() {
        let cases = [
            (json!({"result": [{"age": 30}]}), Envelope::Result),
            (json!({"result": {"faces": [{"age": 30}]}}), Envelope::ResultFaces),
            (json!({"faces": [{"age": 30}]}), Envelope::Faces),
            (json!({"data": {"result": [{"age": 30}]}}), Envelope::DataResult),
            (json!({"data": {"faces": [{"age": 30}]}}), Envelope::DataFaces),
        ];
        for (body, expected) in cases {
            let (shape, faces) = Envelope::locate(&body).unwrap();
            assert_eq!(shape, expected);
            assert_eq!(faces.len(), 1);
        }
    }

    #[test]
    fn test_result_list_takes_precedence() {
        let body = json!({"result": [{}, {}], "faces": [{}]});
        let signal = parse_response(&body).unwrap();
        assert_eq!(signal.face_count, 2);
    }

    #[test]
    fn test_empty_list_means_no_face() {
        let signal = parse_response(&json!({"result": []})).unwrap();
        assert!(!signal.has_face);
        assert_eq!(signal.face_count, 0);
        assert_eq!(signal.estimated_age, None);
    }

    #[test]
    fn test_unknown_envelope_is_malformed() {
        let err = parse_response(&json!({"message": "ok"})).unwrap_err();
        assert_eq!(err.marker(), "malformed_response");

        let err = parse_response(&json!({"result": "nope"})).unwrap_err();
        assert!(matches!(err, FaceServiceError::MalformedResponse(_)));
    }

    #[test]
    fn test_age_aliases_and_coercion() {
        assert_eq!(face_age(&json!({"age": 31})), Some(31.0));
        assert_eq!(face_age(&json!({"age_years": "8.5"})), Some(8.5));
        assert_eq!(face_age(&json!({"estimated_age": 22.0})), Some(22.0));
        assert_eq!(face_age(&json!({"age": {"low": 25, "high": 32, "probability": 0.9}})), Some(25.0));
    }

    #[test]
    fn test_unusable_age_is_absent() {
        assert_eq!(face_age(&json!({"age": "unknown"})), None);
        assert_eq!(face_age(&json!({"age": null})), None);
        assert_eq!(face_age(&json!({"box": {}})), None);
    }

    #[test]
    fn test_later_alias_used_when_first_unusable() {
        assert_eq!(face_age(&json!({"age": "n/a", "age_years": 40})), Some(40.0));
    }

    #[test]
    fn test_age_taken_from_first_face() {
        let body = json!({"result": [{"age": 12}, {"age": 40}]});
        let signal = parse_response(&body).unwrap();
        assert_eq!(signal.face_count, 2);
        assert_eq!(signal.estimated_age, Some(12.0));
    }
}
