/// Property-based tests using proptest
/// Tests invariants of the normalizer and the progress tracker for all inputs
use proptest::prelude::*;
use rust_sales_hub::core::normalizer::{normalize, normalize_archetype, ResponseShape};
use rust_sales_hub::errors::NormalizationError;
use rust_sales_hub::progress::{advance, create_steps};
use serde_json::{json, Map, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "\\PC{0,12}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(
                (
                    prop_oneof![
                        Just("output".to_string()),
                        Just("success".to_string()),
                        Just("message".to_string()),
                        Just("archetypeAndProfile".to_string()),
                        Just("match_producto_perfil".to_string()),
                        "[a-z]{1,8}",
                    ],
                    inner
                ),
                0..6
            )
            .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

// Property: the normalizer is total
proptest! {
    #[test]
    fn normalize_never_panics(raw in arb_json()) {
        let _ = normalize(&raw);
        let _ = normalize_archetype(&raw);
    }

    #[test]
    fn scalars_are_unrecognized(raw in prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(|f| json!(f)),
        "\\PC*".prop_map(Value::String),
    ]) {
        prop_assert_eq!(normalize(&raw), Err(NormalizationError::UnrecognizedShape));
    }

    #[test]
    fn objects_without_markers_are_unrecognized(
        entries in prop::collection::btree_map("[a-z]{1,8}", "\\PC{0,8}", 0..8)
    ) {
        let raw: Map<String, Value> = entries
            .into_iter()
            .filter(|(k, _)| k != "output" && k != "idea")
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let raw = Value::Object(raw);
        prop_assert_eq!(normalize(&raw), Err(NormalizationError::UnrecognizedShape));
    }

    #[test]
    fn complete_profiles_normalize_in_every_shape(
        fields in prop::collection::vec("[A-Za-z0-9 ]{0,10}[A-Za-z0-9]", 5),
        shape in 0usize..4
    ) {
        let candidate = json!({
            "archetypeAndProfile": fields[0],
            "message": fields[1],
            "idea": fields[2],
            "channel": fields[3],
            "recommendation": fields[4],
        });
        let raw = match shape {
            0 => json!([{ "output": candidate }]),
            1 => json!([candidate]),
            2 => json!({ "output": candidate }),
            _ => candidate,
        };

        prop_assert!(ResponseShape::detect(&raw).is_some());
        let record = normalize(&raw).unwrap();
        prop_assert_eq!(&record.archetype_and_profile, &fields[0]);
        prop_assert_eq!(&record.recommendation, &fields[4]);
    }
}

// Property: progress never regresses
proptest! {
    #[test]
    fn advance_is_monotonic(indices in prop::collection::vec(0usize..8, 0..20)) {
        let mut steps = create_steps(["a", "b", "c", "d", "e"]);
        let mut high_water: Option<usize> = None;

        for index in indices {
            let before: Vec<bool> = steps.iter().map(|s| s.completed).collect();
            advance(&mut steps, index);

            for (was, step) in before.iter().zip(steps.iter()) {
                prop_assert!(!*was || step.completed, "a completed step was undone");
            }

            high_water = Some(high_water.map_or(index, |h| h.max(index)));
            let expected = high_water.map_or(0, |h| (h + 1).min(steps.len()));
            prop_assert_eq!(steps.iter().filter(|s| s.completed).count(), expected);
        }
    }
}
