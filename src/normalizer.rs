//! Turns untyped webhook bodies into [`ProfileRecord`]s and, for archetype
//! consultations, [`ArchetypeStrategy`] documents.
//!
//! The automation service is not contractually stable. A profile can arrive
//! as any of:
//!
//! 1. `[{ "output": { ...fields } }]`
//! 2. `[{ ...fields }]`
//! 3. `{ "output": { ...fields } }`
//! 4. `{ ...fields }`
//!
//! and a failure as `{ "success": false, "message": ... }`, optionally wrapped
//! in an array. Shapes are tried in that order and the first structural match
//! wins. Failure envelopes are checked before any shape. Archetype replies use
//! the same four shapes around a strategy document.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::NormalizationError;
use crate::models::{ArchetypeReport, ArchetypeStrategy, ProfileRecord};

const WRAPPER_KEY: &str = "output";
const DEFAULT_UPSTREAM_MESSAGE: &str = "An error occurred while processing the request";
const DEFAULT_CLUSTER_FAILURE: &str = "An error occurred during processing.";
const DEFAULT_CLUSTER_SUCCESS: &str = "Operation completed successfully.";

/// A required profile field: canonical key plus the Spanish key the live service emits.
struct ProfileField {
    key: &'static str,
    alias: &'static str,
}

const ARCHETYPE_AND_PROFILE: ProfileField = ProfileField {
    key: "archetypeAndProfile",
    alias: "arquetipo_y_perfil",
};
const MESSAGE: ProfileField = ProfileField {
    key: "message",
    alias: "mensaje",
};
const IDEA: ProfileField = ProfileField {
    key: "idea",
    alias: "idea",
};
const CHANNEL: ProfileField = ProfileField {
    key: "channel",
    alias: "canal",
};
const RECOMMENDATION: ProfileField = ProfileField {
    key: "recommendation",
    alias: "recomendacion",
};

const PRODUCT_MATCH: &str = "match_producto_perfil";
const COMMUNICATION: &str = "estrategia_comunicacion";
const SALES_KIT: &str = "kit_ventas";
const OBJECTION_HANDLING: &str = "manejo_resistencias";

/// The recognized response shapes, each holding the selected candidate object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseShape<'a> {
    ArrayWrapped(&'a Map<String, Value>),
    ArrayDirect(&'a Map<String, Value>),
    ObjectWrapped(&'a Map<String, Value>),
    ObjectDirect(&'a Map<String, Value>),
}

impl<'a> ResponseShape<'a> {
    /// Classifies `raw`, or returns `None` when no shape matches.
    pub fn detect(raw: &'a Value) -> Option<Self> {
        Self::detect_with(raw, carries_profile)
    }

    /// Classifies `raw`, using `marker` to recognize an unwrapped candidate.
    pub fn detect_with(raw: &'a Value, marker: fn(&Map<String, Value>) -> bool) -> Option<Self> {
        match raw {
            Value::Array(items) => {
                let first = items.first()?.as_object()?;
                if let Some(inner) = wrapped(first) {
                    Some(ResponseShape::ArrayWrapped(inner))
                } else if marker(first) {
                    Some(ResponseShape::ArrayDirect(first))
                } else {
                    None
                }
            }
            Value::Object(map) => {
                if let Some(inner) = wrapped(map) {
                    Some(ResponseShape::ObjectWrapped(inner))
                } else if marker(map) {
                    Some(ResponseShape::ObjectDirect(map))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn candidate(&self) -> &'a Map<String, Value> {
        match *self {
            ResponseShape::ArrayWrapped(map)
            | ResponseShape::ArrayDirect(map)
            | ResponseShape::ObjectWrapped(map)
            | ResponseShape::ObjectDirect(map) => map,
        }
    }
}

fn wrapped(map: &Map<String, Value>) -> Option<&Map<String, Value>> {
    map.get(WRAPPER_KEY).and_then(Value::as_object)
}

fn carries_profile(map: &Map<String, Value>) -> bool {
    map.contains_key(ARCHETYPE_AND_PROFILE.key) || map.contains_key(ARCHETYPE_AND_PROFILE.alias)
}

fn carries_strategy(map: &Map<String, Value>) -> bool {
    map.contains_key(PRODUCT_MATCH)
}

/// Returns the upstream failure carried by `raw`, if any.
///
/// A failure is a boolean `success: false` on the object itself or on the
/// first element of an array.
pub fn failure_envelope(raw: &Value) -> Option<NormalizationError> {
    let envelope = match raw {
        Value::Array(items) => items.first()?.as_object()?,
        Value::Object(map) => map,
        _ => return None,
    };

    if envelope.get("success") != Some(&Value::Bool(false)) {
        return None;
    }

    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_UPSTREAM_MESSAGE);

    Some(NormalizationError::UpstreamError(message.to_string()))
}

/// Extracts a [`ProfileRecord`] from any recognized response shape.
pub fn normalize(raw: &Value) -> Result<ProfileRecord, NormalizationError> {
    if let Some(err) = failure_envelope(raw) {
        return Err(err);
    }

    let shape = ResponseShape::detect(raw).ok_or(NormalizationError::UnrecognizedShape)?;
    let candidate = shape.candidate();

    Ok(ProfileRecord {
        archetype_and_profile: required(candidate, &ARCHETYPE_AND_PROFILE)?,
        message: required(candidate, &MESSAGE)?,
        idea: required(candidate, &IDEA)?,
        channel: required(candidate, &CHANNEL)?,
        recommendation: required(candidate, &RECOMMENDATION)?,
    })
}

fn required(map: &Map<String, Value>, field: &ProfileField) -> Result<String, NormalizationError> {
    non_empty(map, field.key)
        .or_else(|| non_empty(map, field.alias))
        .map(str::to_string)
        .ok_or(NormalizationError::MissingField(field.key))
}

fn non_empty<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Extracts the result of an archetype consultation.
///
/// A candidate carrying `match_producto_perfil` is read as an
/// [`ArchetypeStrategy`]; anything else goes through [`normalize`].
pub fn normalize_archetype(raw: &Value) -> Result<ArchetypeReport, NormalizationError> {
    if let Some(err) = failure_envelope(raw) {
        return Err(err);
    }

    match ResponseShape::detect_with(raw, carries_strategy) {
        Some(shape) if carries_strategy(shape.candidate()) => {
            strategy(shape.candidate()).map(ArchetypeReport::Strategy)
        }
        _ => normalize(raw).map(ArchetypeReport::Profile),
    }
}

fn strategy(map: &Map<String, Value>) -> Result<ArchetypeStrategy, NormalizationError> {
    let strategy = ArchetypeStrategy {
        product_match: section(map, PRODUCT_MATCH)?,
        communication: section(map, COMMUNICATION)?,
        sales_kit: section(map, SALES_KIT)?,
        objection_handling: section(map, OBJECTION_HANDLING)?,
    };

    if !strategy.communication.has_channel() {
        return Err(NormalizationError::MissingField("canal_recomendado"));
    }
    Ok(strategy)
}

fn section<T: DeserializeOwned>(
    map: &Map<String, Value>,
    key: &'static str,
) -> Result<T, NormalizationError> {
    let value = map
        .get(key)
        .filter(|v| v.is_object())
        .ok_or(NormalizationError::MissingField(key))?;

    T::deserialize(value).map_err(|_| NormalizationError::MalformedField(key))
}

/// Interprets the cluster upload reply: `{ success, message }`.
///
/// Returns the success message, or the upstream failure.
pub fn cluster_outcome(raw: &Value) -> Result<String, NormalizationError> {
    if let Some(NormalizationError::UpstreamError(message)) = failure_envelope(raw) {
        // The generic consultation default reads oddly for uploads.
        let message = if message == DEFAULT_UPSTREAM_MESSAGE {
            DEFAULT_CLUSTER_FAILURE.to_string()
        } else {
            message
        };
        return Err(NormalizationError::UpstreamError(message));
    }

    let reply = raw.as_object().ok_or(NormalizationError::UnexpectedReply)?;
    if reply.get("success") != Some(&Value::Bool(true)) {
        return Err(NormalizationError::UnexpectedReply);
    }

    Ok(reply
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_CLUSTER_SUCCESS)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Value {
        json!({
            "archetypeAndProfile": "A",
            "message": "B",
            "idea": "C",
            "channel": "D",
            "recommendation": "E"
        })
    }

    fn expected() -> ProfileRecord {
        ProfileRecord {
            archetype_and_profile: "A".into(),
            message: "B".into(),
            idea: "C".into(),
            channel: "D".into(),
            recommendation: "E".into(),
        }
    }

    #[test]
    fn array_wrapped_shape() {
        let raw = json!([{ "output": fields() }]);
        assert!(matches!(
            ResponseShape::detect(&raw),
            Some(ResponseShape::ArrayWrapped(_))
        ));
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn array_direct_shape() {
        let raw = json!([fields()]);
        assert!(matches!(
            ResponseShape::detect(&raw),
            Some(ResponseShape::ArrayDirect(_))
        ));
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn object_wrapped_shape() {
        let raw = json!({ "output": fields() });
        assert!(matches!(
            ResponseShape::detect(&raw),
            Some(ResponseShape::ObjectWrapped(_))
        ));
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn object_direct_shape() {
        let raw = fields();
        assert!(matches!(
            ResponseShape::detect(&raw),
            Some(ResponseShape::ObjectDirect(_))
        ));
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn wrapper_takes_priority_over_direct_fields() {
        let mut outer = fields();
        outer["output"] = json!({
            "archetypeAndProfile": "inner",
            "message": "B",
            "idea": "C",
            "channel": "D",
            "recommendation": "E"
        });
        let record = normalize(&json!([outer])).unwrap();
        assert_eq!(record.archetype_and_profile, "inner");
    }

    #[test]
    fn only_first_array_element_is_considered() {
        let raw = json!([{ "unrelated": true }, fields()]);
        assert_eq!(normalize(&raw), Err(NormalizationError::UnrecognizedShape));
    }

    #[test]
    fn non_object_wrapper_is_not_a_match() {
        let raw = json!({ "output": "text" });
        assert_eq!(normalize(&raw), Err(NormalizationError::UnrecognizedShape));
    }

    #[test]
    fn unrecognized_shapes() {
        for raw in [
            json!(null),
            json!(42),
            json!("profile"),
            json!(true),
            json!([]),
            json!([1, 2]),
            json!({}),
            json!({ "data": fields() }),
        ] {
            assert_eq!(
                normalize(&raw),
                Err(NormalizationError::UnrecognizedShape),
                "input: {}",
                raw
            );
        }
    }

    #[test]
    fn missing_field_is_named() {
        for key in ["message", "idea", "channel", "recommendation"] {
            let mut raw = fields();
            raw.as_object_mut().unwrap().remove(key);
            match normalize(&raw) {
                Err(NormalizationError::MissingField(name)) => assert_eq!(name, key),
                other => panic!("expected MissingField({}), got {:?}", key, other),
            }
        }
    }

    #[test]
    fn empty_or_non_string_field_is_missing() {
        let mut raw = fields();
        raw["channel"] = json!("   ");
        assert_eq!(normalize(&raw), Err(NormalizationError::MissingField("channel")));

        let mut raw = fields();
        raw["idea"] = json!(7);
        assert_eq!(normalize(&raw), Err(NormalizationError::MissingField("idea")));
    }

    #[test]
    fn wrapped_candidate_without_marker_still_validated() {
        let raw = json!([{ "output": { "message": "B" } }]);
        assert_eq!(
            normalize(&raw),
            Err(NormalizationError::MissingField("archetypeAndProfile"))
        );
    }

    #[test]
    fn spanish_field_names_are_accepted() {
        let raw = json!([{
            "output": {
                "arquetipo_y_perfil": "A",
                "mensaje": "B",
                "idea": "C",
                "canal": "D",
                "recomendacion": "E"
            }
        }]);
        assert_eq!(normalize(&raw).unwrap(), expected());

        let direct = json!({
            "arquetipo_y_perfil": "A",
            "mensaje": "B",
            "idea": "C",
            "canal": "D",
            "recomendacion": "E"
        });
        assert!(matches!(
            ResponseShape::detect(&direct),
            Some(ResponseShape::ObjectDirect(_))
        ));
    }

    #[test]
    fn failure_envelope_in_array() {
        let raw = json!([{ "success": false, "message": "bad cedula" }]);
        assert_eq!(
            normalize(&raw),
            Err(NormalizationError::UpstreamError("bad cedula".into()))
        );
    }

    #[test]
    fn failure_envelope_wins_over_valid_shape() {
        let mut raw = fields();
        raw["success"] = json!(false);
        assert_eq!(
            normalize(&raw),
            Err(NormalizationError::UpstreamError("B".into()))
        );

        assert_eq!(
            normalize(&json!({ "success": false })),
            Err(NormalizationError::UpstreamError(DEFAULT_UPSTREAM_MESSAGE.into()))
        );
    }

    #[test]
    fn only_boolean_false_is_a_failure() {
        let mut raw = fields();
        raw["success"] = json!("false");
        assert!(failure_envelope(&raw).is_none());
        assert_eq!(normalize(&raw).unwrap(), expected());
    }

    #[test]
    fn field_text_is_returned_verbatim() {
        let mut raw = fields();
        raw["message"] = json!("  Lead with savings\n");
        assert_eq!(normalize(&raw).unwrap().message, "  Lead with savings\n");
    }

    fn strategy_document() -> Value {
        json!({
            "match_producto_perfil": {
                "score_afinidad": 8,
                "analisis_viabilidad": "High fit for a stable saver",
                "angulo_venta": "Protect what you have built"
            },
            "estrategia_comunicacion": {
                "canales_sugeridos": ["WhatsApp", "Email"],
                "justificacion_medios": "Prefers written contact",
                "mejor_momento": "Weekday mornings",
                "tono_voz": "Warm and direct"
            },
            "kit_ventas": {
                "mensaje_whatsapp_o_asunto": "Your savings, protected",
                "argumento_apertura": "You have built stability",
                "argumento_cierre": "Start this month"
            },
            "manejo_resistencias": {
                "posible_objecion": "I already have insurance",
                "respuesta_inteligente": "This one covers your contributions"
            }
        })
    }

    #[test]
    fn archetype_strategy_in_every_shape() {
        for raw in [
            json!([{ "output": strategy_document() }]),
            json!([strategy_document()]),
            json!({ "output": strategy_document() }),
            strategy_document(),
        ] {
            match normalize_archetype(&raw) {
                Ok(ArchetypeReport::Strategy(strategy)) => {
                    assert_eq!(strategy.product_match.affinity_score, 8.0);
                    assert_eq!(
                        strategy.communication.suggested_channels,
                        Some(vec!["WhatsApp".to_string(), "Email".to_string()])
                    );
                    assert_eq!(
                        strategy.objection_handling.likely_objection,
                        "I already have insurance"
                    );
                }
                other => panic!("expected a strategy for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn archetype_reply_may_still_be_a_profile() {
        let raw = json!([{ "output": fields() }]);
        assert_eq!(
            normalize_archetype(&raw),
            Ok(ArchetypeReport::Profile(expected()))
        );
        assert_eq!(
            normalize_archetype(&json!({ "other": 1 })),
            Err(NormalizationError::UnrecognizedShape)
        );
    }

    #[test]
    fn archetype_strategy_sections_are_required() {
        let mut raw = strategy_document();
        raw.as_object_mut().unwrap().remove("kit_ventas");
        assert_eq!(
            normalize_archetype(&raw),
            Err(NormalizationError::MissingField("kit_ventas"))
        );

        let mut raw = strategy_document();
        raw["manejo_resistencias"] = json!({ "posible_objecion": "Price" });
        assert_eq!(
            normalize_archetype(&raw),
            Err(NormalizationError::MalformedField("manejo_resistencias"))
        );

        let mut raw = strategy_document();
        raw["estrategia_comunicacion"]
            .as_object_mut()
            .unwrap()
            .remove("canales_sugeridos");
        assert_eq!(
            normalize_archetype(&raw),
            Err(NormalizationError::MissingField("canal_recomendado"))
        );
    }

    #[test]
    fn archetype_failure_envelope_checked_first() {
        let raw = json!([{ "success": false, "message": "Archetype not trained" }]);
        assert_eq!(
            normalize_archetype(&raw),
            Err(NormalizationError::UpstreamError("Archetype not trained".into()))
        );
    }

    #[test]
    fn cluster_outcomes() {
        assert_eq!(
            cluster_outcome(&json!({ "success": true, "message": "120 clients clustered" })),
            Ok("120 clients clustered".to_string())
        );
        assert_eq!(
            cluster_outcome(&json!({ "success": true })),
            Ok(DEFAULT_CLUSTER_SUCCESS.to_string())
        );
        assert_eq!(
            cluster_outcome(&json!({ "success": false, "message": "model offline" })),
            Err(NormalizationError::UpstreamError("model offline".into()))
        );
        assert_eq!(
            cluster_outcome(&json!({ "success": false })),
            Err(NormalizationError::UpstreamError(DEFAULT_CLUSTER_FAILURE.into()))
        );
        assert_eq!(
            cluster_outcome(&json!({ "status": "ok" })),
            Err(NormalizationError::UnexpectedReply)
        );
    }
}
