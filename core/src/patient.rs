//! Patient intake record as submitted by the intake form.
//!
//! Form inputs arrive as strings or numbers depending on the widget, and
//! optional sections may be `null` or missing entirely. Deserialization is
//! lenient about both; unknown keys (record ids, consultation history) are
//! ignored.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A form value that may be sent either as a JSON number or as a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric interpretation, trimming surrounding whitespace from text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Number(_) => None,
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Empty text or a zero number; both count as "not provided" on the form
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Number(n) => *n == 0.0,
            Scalar::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// Treat an explicit JSON `null` the same as a missing key
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientIntakeRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<Scalar>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub weight: Option<Scalar>,
    #[serde(default)]
    pub height: Option<Scalar>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub symptom_duration: Option<String>,
    #[serde(default)]
    pub previous_meal: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub vitals: Vitals,
    #[serde(default, deserialize_with = "nullable")]
    pub health_profile: HealthProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default)]
    pub bp: Option<String>,
    #[serde(default)]
    pub hr: Option<Scalar>,
    #[serde(default)]
    pub rr: Option<Scalar>,
    #[serde(default)]
    pub temp: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthProfile {
    #[serde(default, deserialize_with = "nullable")]
    pub allergies: Allergies,
    #[serde(default, deserialize_with = "nullable")]
    pub current_medications: Vec<Medication>,
    #[serde(default, deserialize_with = "nullable")]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub past_surgical_history: Option<String>,
    #[serde(default)]
    pub family_history: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub lifestyle_factors: LifestyleFactors,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Allergies {
    #[serde(default)]
    pub drug: Option<String>,
    #[serde(default)]
    pub food: Option<String>,
    #[serde(default)]
    pub other: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
}

impl Medication {
    /// `name dose frequency`, skipping blank parts
    pub fn describe(&self) -> String {
        [&self.name, &self.dose, &self.frequency]
            .into_iter()
            .filter_map(|p| present(p.as_deref()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifestyleFactors {
    #[serde(default)]
    pub smoking: Option<String>,
    #[serde(default)]
    pub alcohol: Option<String>,
}

/// Trimmed, non-empty text or nothing
pub(crate) fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn present_scalar(value: Option<&Scalar>) -> Option<&Scalar> {
    value.filter(|s| !s.is_blank())
}

impl PatientIntakeRecord {
    /// Names of the basic fields the intake endpoint requires
    /// (name, age, sex, weight, height, symptoms) that are missing or blank.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(self.name.as_deref()).is_none() {
            missing.push("name");
        }
        if present_scalar(self.age.as_ref()).is_none() {
            missing.push("age");
        }
        if present(self.sex.as_deref()).is_none() {
            missing.push("sex");
        }
        if present_scalar(self.weight.as_ref()).is_none() {
            missing.push("weight");
        }
        if present_scalar(self.height.as_ref()).is_none() {
            missing.push("height");
        }
        if present(self.symptoms.as_deref()).is_none() {
            missing.push("symptoms");
        }
        missing
    }

    /// `IntakeError::Validation` naming the missing required fields, if any
    pub fn validate(&self) -> crate::Result<()> {
        let missing = self.missing_required_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::IntakeError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn name_or_default(&self) -> &str {
        present(self.name.as_deref()).unwrap_or("")
    }
}
