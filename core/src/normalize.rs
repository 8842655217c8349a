//! Response normalization.
//!
//! Providers do not always honour the requested schema: lists come back as
//! single strings, `activity_guidance` arrives as a bare list, `foods_to_avoid`
//! as an object with a `reasoning` field, red flags as objects. Each field is
//! classified into one of the shapes it is known to arrive in, and every shape
//! maps to exactly one repair. Nothing here fails; unknown shapes fall back to
//! empty values.
//!
//! Normalization is idempotent, and canonical input passes through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::prompt::DISCLAIMER;

/// Concept text used when the provider omitted dietary recommendations
pub const NO_DATA: &str = "No data";
/// Stand-in for a red flag object that carried no `condition`
pub const INVALID_DATA: &str = "Invalid data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Info,
}

impl RiskLevel {
    /// Case-insensitive; anything unrecognised is informational
    fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "medium" => RiskLevel::Medium,
            "low" => RiskLevel::Low,
            _ => RiskLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEntry {
    pub condition: String,
    pub risk_level: RiskLevel,
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityGuidance {
    pub recommended: Vec<String>,
    pub to_avoid: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizedCare {
    pub immediate_actions: Vec<String>,
    pub general_wellness: Vec<String>,
    pub activity_guidance: ActivityGuidance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodsToEat {
    pub main_dishes: Vec<String>,
    pub snacks_and_fruits: Vec<String>,
    pub drinks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietaryRecommendations {
    pub concept: String,
    pub foods_to_eat: FoodsToEat,
    pub foods_to_avoid: Vec<String>,
}

impl Default for DietaryRecommendations {
    fn default() -> Self {
        Self {
            concept: NO_DATA.to_string(),
            foods_to_eat: FoodsToEat::default(),
            foods_to_avoid: Vec::new(),
        }
    }
}

/// The canonical assessment every consumer reads. All list fields are arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAssessment {
    pub primary_assessment: String,
    pub risk_analysis: Vec<RiskEntry>,
    pub personalized_care: PersonalizedCare,
    pub dietary_recommendations: DietaryRecommendations,
    pub red_flags: Vec<String>,
    pub disclaimer: String,
}

// =========================
// Shapes
// =========================

/// A field that should be an object
enum Section<'a> {
    Object(&'a Map<String, Value>),
    Missing,
}

impl<'a> Section<'a> {
    fn classify(v: Option<&'a Value>) -> Self {
        match v {
            Some(Value::Object(m)) => Section::Object(m),
            _ => Section::Missing,
        }
    }

    fn field(&self, key: &str) -> Option<&'a Value> {
        match self {
            Section::Object(m) => m.get(key),
            Section::Missing => None,
        }
    }
}

/// A field that should be a list of strings
enum ListShape<'a> {
    List(&'a [Value]),
    Text(&'a str),
    Other,
}

impl<'a> ListShape<'a> {
    fn classify(v: Option<&'a Value>) -> Self {
        match v {
            Some(Value::Array(items)) => ListShape::List(items),
            Some(Value::String(s)) => ListShape::Text(s),
            _ => ListShape::Other,
        }
    }
}

/// `personalized_care.activity_guidance`
enum GuidanceShape<'a> {
    Object(&'a Map<String, Value>),
    List(&'a [Value]),
    Other,
}

impl<'a> GuidanceShape<'a> {
    fn classify(v: Option<&'a Value>) -> Self {
        match v {
            Some(Value::Object(m)) => GuidanceShape::Object(m),
            Some(Value::Array(items)) => GuidanceShape::List(items),
            _ => GuidanceShape::Other,
        }
    }
}

/// `dietary_recommendations.foods_to_avoid`
enum AvoidShape<'a> {
    List(&'a [Value]),
    Reasoning(&'a str),
    Object,
    Other,
}

impl<'a> AvoidShape<'a> {
    fn classify(v: Option<&'a Value>) -> Self {
        match v {
            Some(Value::Array(items)) => AvoidShape::List(items),
            Some(Value::Object(m)) => match m.get("reasoning") {
                Some(Value::String(r)) if !r.is_empty() => AvoidShape::Reasoning(r),
                _ => AvoidShape::Object,
            },
            _ => AvoidShape::Other,
        }
    }
}

/// How object elements inside a string list are treated
#[derive(Clone, Copy)]
enum ObjectItems {
    Drop,
    /// Red flags: keep the `condition` text, or the placeholder
    Condition,
}

// =========================
// Repairs
// =========================

/// Names of the repairs applied, for the debug log
#[derive(Default)]
struct Repairs(Vec<&'static str>);

impl Repairs {
    fn note(&mut self, what: &'static str) {
        self.0.push(what);
    }
}

fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn string_item(item: &Value, objects: ObjectItems) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(m) => match objects {
            ObjectItems::Condition => Some(match m.get("condition") {
                Some(Value::String(c)) if !c.is_empty() => c.clone(),
                _ => INVALID_DATA.to_string(),
            }),
            ObjectItems::Drop => None,
        },
        Value::Null | Value::Array(_) => None,
    }
}

fn string_list(
    v: Option<&Value>,
    objects: ObjectItems,
    field: &'static str,
    repairs: &mut Repairs,
) -> Vec<String> {
    match ListShape::classify(v) {
        ListShape::List(items) => {
            let out: Vec<String> = items
                .iter()
                .filter_map(|item| string_item(item, objects))
                .collect();
            if items.iter().any(|i| !i.is_string()) {
                repairs.note(field);
            }
            out
        }
        ListShape::Text(s) => {
            repairs.note(field);
            vec![s.to_string()]
        }
        ListShape::Other => {
            if v.is_some() {
                repairs.note(field);
            }
            Vec::new()
        }
    }
}

fn risk_entry(item: &Value) -> Option<RiskEntry> {
    match item {
        Value::Object(m) => Some(RiskEntry {
            condition: text(m.get("condition")),
            risk_level: match m.get("risk_level") {
                Some(Value::String(s)) => RiskLevel::parse_lenient(s),
                _ => RiskLevel::Info,
            },
            rationale: text(m.get("rationale")),
        }),
        Value::String(s) => Some(RiskEntry {
            condition: s.clone(),
            risk_level: RiskLevel::Info,
            rationale: String::new(),
        }),
        _ => None,
    }
}

fn risk_analysis(v: Option<&Value>, repairs: &mut Repairs) -> Vec<RiskEntry> {
    match ListShape::classify(v) {
        ListShape::List(items) => items.iter().filter_map(risk_entry).collect(),
        ListShape::Text(s) => {
            repairs.note("risk_analysis");
            vec![RiskEntry {
                condition: s.to_string(),
                risk_level: RiskLevel::Info,
                rationale: String::new(),
            }]
        }
        ListShape::Other => {
            if v.is_some() {
                repairs.note("risk_analysis");
            }
            Vec::new()
        }
    }
}

fn activity_guidance(v: Option<&Value>, repairs: &mut Repairs) -> ActivityGuidance {
    match GuidanceShape::classify(v) {
        GuidanceShape::Object(m) => ActivityGuidance {
            recommended: string_list(m.get("recommended"), ObjectItems::Drop, "recommended", repairs),
            to_avoid: string_list(m.get("to_avoid"), ObjectItems::Drop, "to_avoid", repairs),
        },
        GuidanceShape::List(items) => {
            repairs.note("activity_guidance");
            ActivityGuidance {
                recommended: items
                    .iter()
                    .filter_map(|i| string_item(i, ObjectItems::Drop))
                    .collect(),
                to_avoid: Vec::new(),
            }
        }
        GuidanceShape::Other => {
            repairs.note("activity_guidance");
            ActivityGuidance::default()
        }
    }
}

fn personalized_care(v: Option<&Value>, repairs: &mut Repairs) -> PersonalizedCare {
    let care = Section::classify(v);
    if let Section::Missing = care {
        repairs.note("personalized_care");
    }
    PersonalizedCare {
        immediate_actions: string_list(
            care.field("immediate_actions"),
            ObjectItems::Drop,
            "immediate_actions",
            repairs,
        ),
        general_wellness: string_list(
            care.field("general_wellness"),
            ObjectItems::Drop,
            "general_wellness",
            repairs,
        ),
        activity_guidance: activity_guidance(care.field("activity_guidance"), repairs),
    }
}

fn foods_to_avoid(v: Option<&Value>, repairs: &mut Repairs) -> Vec<String> {
    match AvoidShape::classify(v) {
        AvoidShape::List(items) => items
            .iter()
            .filter_map(|i| string_item(i, ObjectItems::Drop))
            .collect(),
        AvoidShape::Reasoning(r) => {
            repairs.note("foods_to_avoid");
            vec![r.to_string()]
        }
        AvoidShape::Object | AvoidShape::Other => {
            repairs.note("foods_to_avoid");
            Vec::new()
        }
    }
}

fn dietary_recommendations(v: Option<&Value>, repairs: &mut Repairs) -> DietaryRecommendations {
    let diet = match Section::classify(v) {
        Section::Object(m) => m,
        Section::Missing => {
            repairs.note("dietary_recommendations");
            return DietaryRecommendations::default();
        }
    };

    let foods = Section::classify(diet.get("foods_to_eat"));
    if let Section::Missing = foods {
        repairs.note("foods_to_eat");
    }

    DietaryRecommendations {
        concept: text(diet.get("concept")),
        foods_to_eat: FoodsToEat {
            main_dishes: string_list(foods.field("main_dishes"), ObjectItems::Drop, "main_dishes", repairs),
            snacks_and_fruits: string_list(
                foods.field("snacks_and_fruits"),
                ObjectItems::Drop,
                "snacks_and_fruits",
                repairs,
            ),
            drinks: string_list(foods.field("drinks"), ObjectItems::Drop, "drinks", repairs),
        },
        foods_to_avoid: foods_to_avoid(diet.get("foods_to_avoid"), repairs),
    }
}

/// Repair a parsed provider response into the canonical assessment.
pub fn normalize(raw: &Value) -> NormalizedAssessment {
    let empty = Map::new();
    let root = match raw {
        Value::Object(m) => m,
        _ => &empty,
    };
    let mut repairs = Repairs::default();

    let assessment = NormalizedAssessment {
        primary_assessment: text(root.get("primary_assessment")),
        risk_analysis: risk_analysis(root.get("risk_analysis"), &mut repairs),
        personalized_care: personalized_care(root.get("personalized_care"), &mut repairs),
        dietary_recommendations: dietary_recommendations(
            root.get("dietary_recommendations"),
            &mut repairs,
        ),
        red_flags: string_list(
            root.get("red_flags"),
            ObjectItems::Condition,
            "red_flags",
            &mut repairs,
        ),
        disclaimer: match root.get("disclaimer") {
            Some(Value::String(s)) => s.clone(),
            _ => DISCLAIMER.to_string(),
        },
    };

    debug!(target: "normalize", repairs = ?repairs.0, "Normalization complete");
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical() -> Value {
        json!({
            "primary_assessment": "Given the history of hypertension, the headache warrants attention.",
            "risk_analysis": [
                {"condition": "Hypertensive urgency", "risk_level": "high", "rationale": "BP 180/110"},
                {"condition": "Tension headache", "risk_level": "low", "rationale": "stress"}
            ],
            "personalized_care": {
                "immediate_actions": ["Rest in a quiet room"],
                "general_wellness": ["Monitor blood pressure daily"],
                "activity_guidance": {"recommended": ["Light walking"], "to_avoid": ["Heavy lifting"]}
            },
            "dietary_recommendations": {
                "concept": "Low sodium",
                "foods_to_eat": {
                    "main_dishes": ["Steamed fish"],
                    "snacks_and_fruits": ["Banana"],
                    "drinks": ["Water"]
                },
                "foods_to_avoid": ["Instant noodles: high sodium"]
            },
            "red_flags": ["Sudden severe headache"],
            "disclaimer": "AI generated."
        })
    }

    fn as_value(a: &NormalizedAssessment) -> Value {
        serde_json::to_value(a).unwrap()
    }

    #[test]
    fn canonical_input_is_unchanged() {
        let input = canonical();
        assert_eq!(as_value(&normalize(&input)), input);
    }

    #[test]
    fn wraps_single_general_wellness_string() {
        let out = normalize(&json!({"personalized_care": {"general_wellness": "x"}}));
        assert_eq!(out.personalized_care.general_wellness, vec!["x"]);
    }

    #[test]
    fn non_list_general_wellness_becomes_empty() {
        let out = normalize(&json!({"personalized_care": {"general_wellness": {"a": 1}}}));
        assert!(out.personalized_care.general_wellness.is_empty());
    }

    #[test]
    fn activity_guidance_list_becomes_recommended() {
        let out = normalize(&json!({
            "personalized_care": {"activity_guidance": ["walk", "stretch"]}
        }));
        assert_eq!(
            out.personalized_care.activity_guidance,
            ActivityGuidance {
                recommended: vec!["walk".into(), "stretch".into()],
                to_avoid: vec![],
            }
        );
    }

    #[test]
    fn scalar_activity_guidance_becomes_empty_object() {
        let out = normalize(&json!({"personalized_care": {"activity_guidance": "rest"}}));
        assert_eq!(out.personalized_care.activity_guidance, ActivityGuidance::default());
    }

    #[test]
    fn missing_sections_get_defaults() {
        let out = normalize(&json!({}));
        assert_eq!(out.personalized_care, PersonalizedCare::default());
        assert_eq!(out.dietary_recommendations.concept, NO_DATA);
        assert_eq!(out.dietary_recommendations.foods_to_eat, FoodsToEat::default());
        assert!(out.dietary_recommendations.foods_to_avoid.is_empty());
        assert!(out.red_flags.is_empty());
        assert_eq!(out.disclaimer, DISCLAIMER);
    }

    #[test]
    fn missing_foods_to_eat_gets_empty_categories() {
        let out = normalize(&json!({
            "dietary_recommendations": {"concept": "light meals", "foods_to_avoid": []}
        }));
        assert_eq!(out.dietary_recommendations.concept, "light meals");
        assert_eq!(out.dietary_recommendations.foods_to_eat, FoodsToEat::default());
    }

    #[test]
    fn foods_to_avoid_reasoning_object_becomes_list() {
        let out = normalize(&json!({"dietary_recommendations": {"foods_to_avoid": {"reasoning": "y"}}}));
        assert_eq!(out.dietary_recommendations.foods_to_avoid, vec!["y"]);
    }

    #[test]
    fn foods_to_avoid_other_shapes_become_empty() {
        for bad in [json!({"items": ["a"]}), json!("fried food"), json!(3)] {
            let out = normalize(&json!({"dietary_recommendations": {"foods_to_avoid": bad}}));
            assert!(out.dietary_recommendations.foods_to_avoid.is_empty());
        }
    }

    #[test]
    fn red_flag_objects_become_conditions() {
        let out = normalize(&json!({"red_flags": [{"condition": "fever"}]}));
        assert_eq!(out.red_flags, vec!["fever"]);

        let out = normalize(&json!({"red_flags": [{"condition": "fever"}, {"severity": "high"}]}));
        assert_eq!(out.red_flags, vec!["fever".to_string(), INVALID_DATA.to_string()]);
    }

    #[test]
    fn risk_entries_are_read_leniently() {
        let out = normalize(&json!({
            "risk_analysis": [
                {"condition": "Flu", "risk_level": "HIGH", "rationale": "fever"},
                {"condition": "Cold", "risk_level": "moderate"},
                "Allergy",
                42
            ]
        }));
        assert_eq!(out.risk_analysis.len(), 3);
        assert_eq!(out.risk_analysis[0].risk_level, RiskLevel::High);
        assert_eq!(out.risk_analysis[1].risk_level, RiskLevel::Info);
        assert_eq!(out.risk_analysis[1].rationale, "");
        assert_eq!(out.risk_analysis[2].condition, "Allergy");
    }

    #[test]
    fn non_object_root_yields_defaults() {
        let out = normalize(&json!(["not", "an", "object"]));
        assert_eq!(out.primary_assessment, "");
        assert_eq!(out.dietary_recommendations.concept, NO_DATA);
    }

    #[test]
    fn normalizing_twice_equals_once() {
        let inputs = vec![
            canonical(),
            json!({}),
            json!(null),
            json!({"personalized_care": {"general_wellness": "x", "activity_guidance": ["a"]}}),
            json!({"personalized_care": "oops", "dietary_recommendations": "none"}),
            json!({"dietary_recommendations": {"foods_to_avoid": {"reasoning": "y"}, "foods_to_eat": "rice"}}),
            json!({"red_flags": [{"condition": "fever"}, "rash", 7, null], "risk_analysis": {"condition": "x"}}),
            json!({"primary_assessment": 12, "disclaimer": null, "red_flags": "chest pain"}),
        ];
        for input in inputs {
            let once = normalize(&input);
            let twice = normalize(&as_value(&once));
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }
}
