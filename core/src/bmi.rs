use serde::{Serialize, Serializer};
use std::fmt;

use crate::patient::Scalar;

/// BMI bands, evaluated in order against the value rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BmiCategory {
    #[serde(rename = "underweight")]
    Underweight,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "overweight")]
    Overweight,
    #[serde(rename = "obese class I")]
    ObeseClassI,
    #[serde(rename = "obese class II (high-risk)")]
    ObeseClassII,
    /// Weight or height missing, non-numeric, or height <= 0
    #[serde(rename = "invalid")]
    Invalid,
}

impl BmiCategory {
    pub fn classify(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 23.0 {
            BmiCategory::Normal
        } else if bmi < 25.0 {
            BmiCategory::Overweight
        } else if bmi < 30.0 {
            BmiCategory::ObeseClassI
        } else {
            BmiCategory::ObeseClassII
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "underweight",
            BmiCategory::Normal => "normal",
            BmiCategory::Overweight => "overweight",
            BmiCategory::ObeseClassI => "obese class I",
            BmiCategory::ObeseClassII => "obese class II (high-risk)",
            BmiCategory::Invalid => "invalid",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived body-mass index. Serializes `value` as a two-decimal string
/// (`"20.76"`), or as the number `0` when the input was unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BmiResult {
    #[serde(serialize_with = "serialize_value")]
    pub value: Option<f64>,
    pub category: BmiCategory,
}

impl BmiResult {
    pub fn invalid() -> Self {
        Self {
            value: None,
            category: BmiCategory::Invalid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// The value as rendered in prompts and responses
    pub fn value_text(&self) -> String {
        match self.value {
            Some(v) => format!("{:.2}", v),
            None => "0".to_string(),
        }
    }
}

fn serialize_value<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&format!("{:.2}", v)),
        None => serializer.serialize_u8(0),
    }
}

/// Compute BMI from weight in kilograms and height in centimetres.
pub fn calculate_bmi(weight: Option<&Scalar>, height: Option<&Scalar>) -> BmiResult {
    let (Some(weight), Some(height)) = (
        weight.and_then(Scalar::as_f64),
        height.and_then(Scalar::as_f64),
    ) else {
        return BmiResult::invalid();
    };
    if weight == 0.0 || height <= 0.0 {
        return BmiResult::invalid();
    }

    let meters = height / 100.0;
    let raw = weight / (meters * meters);
    // Band on the rounded figure so the category always agrees with the shown value
    let rounded = match format!("{:.2}", raw).parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return BmiResult::invalid(),
    };

    BmiResult {
        value: Some(rounded),
        category: BmiCategory::classify(rounded),
    }
}
