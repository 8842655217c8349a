//! Prompt construction for the assessment call.
//!
//! `build_context` renders the patient record into a fact block, skipping
//! anything the patient left blank. `build_prompt` wraps that block in the
//! fixed instructions: the staged reasoning process, the JSON schema the
//! response must follow, and the content rules.

use crate::bmi::BmiResult;
use crate::patient::{present, present_scalar, PatientIntakeRecord, Scalar};

/// System message sent alongside the prompt by chat-style providers
pub const SYSTEM_ROLE: &str = "**Role and Goal:** You are an Analytical Wellness Advisor AI. \
Your sole purpose is to analyze the provided patient data to generate a coherent, safe, \
and logically structured analysis in a complete JSON object format.";

/// Disclaimer the assessment must carry
pub const DISCLAIMER: &str = "This assessment was generated by AI for preliminary guidance only \
and is based solely on the information you provided. It cannot replace a diagnosis by a \
physician. Please consult a medical professional for an accurate diagnosis and treatment.";

const NO_PROFILE: &str = "The user has not provided any specific health profile information.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    /// Language every text field of the answer must be written in
    pub response_language: String,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            response_language: "Thai".to_string(),
        }
    }
}

/// Render the patient facts the model is allowed to reason about.
pub fn build_context(record: &PatientIntakeRecord, bmi: &BmiResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Analyze the user named {} (age {}, sex {}) with BMI {} ({}).\n",
        record.name_or_default(),
        scalar_or_blank(record.age.as_ref()),
        present(record.sex.as_deref()).unwrap_or(""),
        bmi.value_text(),
        bmi.category,
    ));

    out.push_str("**Current situation:**\n");
    out.push_str(&format!(
        "- **Symptoms:** \"{}\"\n",
        present(record.symptoms.as_deref()).unwrap_or("")
    ));
    if let Some(duration) = present(record.symptom_duration.as_deref()) {
        out.push_str(&format!("- **Duration:** {}\n", duration));
    }
    if let Some(meal) = present(record.previous_meal.as_deref()) {
        out.push_str(&format!("- **Most recent meal:** {}\n", meal));
    }
    if let Some(vitals) = vitals_line(record) {
        out.push_str(&format!("- **Vital signs:** {}\n", vitals));
    }

    let profile = profile_facts(record);
    let profile = if profile.is_empty() {
        NO_PROFILE.to_string()
    } else {
        profile.join(". ")
    };
    out.push_str(&format!(
        "\n**Health profile (most important!):** {}\n",
        profile
    ));

    out
}

fn scalar_or_blank(value: Option<&Scalar>) -> String {
    present_scalar(value)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn vitals_line(record: &PatientIntakeRecord) -> Option<String> {
    let vitals = &record.vitals;
    let mut parts = Vec::new();
    if let Some(bp) = present(vitals.bp.as_deref()) {
        parts.push(format!("blood pressure {} mmHg", bp));
    }
    if let Some(hr) = present_scalar(vitals.hr.as_ref()) {
        parts.push(format!("heart rate {}/min", hr));
    }
    if let Some(rr) = present_scalar(vitals.rr.as_ref()) {
        parts.push(format!("respiratory rate {}/min", rr));
    }
    if let Some(temp) = present_scalar(vitals.temp.as_ref()) {
        parts.push(format!("temperature {}°C", temp));
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn profile_facts(record: &PatientIntakeRecord) -> Vec<String> {
    let profile = &record.health_profile;
    let mut facts = Vec::new();

    if let Some(drug) = present(profile.allergies.drug.as_deref()) {
        facts.push(format!("**Drug allergies (very important): {}**", drug));
    }
    if let Some(food) = present(profile.allergies.food.as_deref()) {
        facts.push(format!("**Food allergies: {}**", food));
    }
    if let Some(other) = present(profile.allergies.other.as_deref()) {
        facts.push(format!("**Other allergies: {}**", other));
    }

    let meds: Vec<String> = profile
        .current_medications
        .iter()
        .map(|m| m.describe())
        .filter(|m| !m.is_empty())
        .collect();
    if !meds.is_empty() {
        facts.push(format!("**Current medications: {}**", meds.join(", ")));
    }

    let conditions: Vec<&str> = profile
        .chronic_conditions
        .iter()
        .filter_map(|c| present(Some(c.as_str())))
        .collect();
    if !conditions.is_empty() {
        facts.push(format!("Chronic conditions: {}", conditions.join(", ")));
    }

    if let Some(surgery) = present(profile.past_surgical_history.as_deref()) {
        facts.push(format!("Past surgical history: {}", surgery));
    }
    if let Some(family) = present(profile.family_history.as_deref()) {
        facts.push(format!("Family medical history: {}", family));
    }
    if let Some(smoking) = present(profile.lifestyle_factors.smoking.as_deref()) {
        if smoking != "never" {
            facts.push(format!("Smoking: {}", smoking));
        }
    }
    if let Some(alcohol) = present(profile.lifestyle_factors.alcohol.as_deref()) {
        if alcohol != "none" {
            facts.push(format!("Alcohol use: {}", alcohol));
        }
    }
    if let Some(notes) = present(profile.additional_notes.as_deref()) {
        facts.push(format!("Additional notes: \"{}\"", notes));
    }

    facts
}

/// Build the full instruction prompt for one assessment attempt.
pub fn build_prompt(
    record: &PatientIntakeRecord,
    bmi: &BmiResult,
    options: &PromptOptions,
) -> String {
    let context = build_context(record, bmi);
    let language = options.response_language.trim();
    let language = if language.is_empty() { "English" } else { language };

    let mut rules = vec![
        "**Connect the data:** every recommendation must reference and weigh the 'health profile' (if any) first.".to_string(),
        "For \"risk_level\" use exactly one of: 'high', 'medium', 'low', 'info'.".to_string(),
        "Sort \"risk_analysis\" from the highest risk to the lowest.".to_string(),
        "Fill in every field of the JSON. Do not omit fields and do not add extra ones.".to_string(),
        "Content must be safe: do not make a definitive diagnosis, and **never recommend buying or taking any medication**.".to_string(),
        "Every sub-category of \"foods_to_eat\" must contain at least one item.".to_string(),
    ];
    if !language.eq_ignore_ascii_case("english") {
        rules.push(format!(
            "In \"risk_analysis\", write each condition name in {} followed by the English name in parentheses.",
            language
        ));
    }
    rules.push(format!("Write the entire answer in {}.", language));

    let rules = rules
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"**RAW DATA FOR ANALYSIS:**
{context}
**MANDATORY THINKING PROCESS:**
Before producing the final JSON, work through these steps:
1. **Fact Summary:** summarize all key facts about the user (symptoms, duration, health profile) without interpretation.
2. **Potential Conditions Analysis:** based primarily on the current symptoms, list 2-3 possible conditions with a short reason for each.
3. **Risk Evaluation & Triage:** weigh the conditions from step 2 against the health profile and rank them from highest to lowest risk, explaining why one is riskier than another.
4. **Final Conclusion:** summarize the most likely condition to use when building the JSON.

**DATA ADHERENCE MANDATE:**
Analyze *only* the raw data above. Never mention diseases or symptoms that are not present in the data. Fabricating information (hallucination) is a serious violation of these instructions.

**MANDATORY JSON STRUCTURE:**
Produce one complete JSON object with exactly this structure. **The content of every field must follow from reasoning that connects to the health profile, when one is provided.**
{{
  "primary_assessment": "A summary that always begins with how the health profile affects the current symptoms",
  "risk_analysis": [{{"condition": "...", "risk_level": "...", "rationale": "How the health profile raises or lowers the risk of this condition"}}],
  "personalized_care": {{
    "immediate_actions": ["..."],
    "general_wellness": ["At least one recommendation specific to the health profile"],
    "activity_guidance": {{ "recommended": ["..."], "to_avoid": ["..."] }}
  }},
  "dietary_recommendations": {{
    "concept": "The eating approach that fits both the current symptoms and the health profile",
    "foods_to_eat": {{ "main_dishes": ["..."], "snacks_and_fruits": ["..."], "drinks": ["..."] }},
    "foods_to_avoid": ["Each item with a reason tied to the health profile and the current symptoms"]
  }},
  "red_flags": ["At least one warning sign related to the health profile"],
  "disclaimer": "{disclaimer}"
}}

**OUTPUT RULES:**
{rules}
"#,
        context = context,
        disclaimer = DISCLAIMER,
        rules = rules,
    )
}
