use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use intake_core::{
    AssessmentPipeline, Backoff, BmiCategory, CompletionProvider, IntakeError,
    PatientIntakeRecord, PromptOptions, ProviderChain, ProviderError, RetryPolicy,
};

/// Provider that answers from a script, then repeats its last entry
struct ScriptedProvider {
    name: &'static str,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(name: &'static str, script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

/// Zero-length pauses, counted
#[derive(Default)]
struct CountingBackoff {
    waits: AtomicU32,
}

impl Backoff for CountingBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    }
}

fn http(provider: &str, status: u16) -> Result<String, ProviderError> {
    Err(ProviderError::Http {
        provider: provider.to_string(),
        status,
        detail: None,
    })
}

fn analysis() -> Value {
    json!({
        "primary_assessment": "Symptoms suggest a viral upper respiratory infection.",
        "risk_analysis": [
            {"condition": "Common cold", "risk_level": "medium", "rationale": "runny nose and sore throat"},
            {"condition": "Influenza", "risk_level": "low", "rationale": "no high fever"}
        ],
        "personalized_care": {
            "immediate_actions": ["Rest", "Drink warm fluids"],
            "general_wellness": ["Wash hands often"],
            "activity_guidance": {"recommended": ["Light stretching"], "to_avoid": ["Intense exercise"]}
        },
        "dietary_recommendations": {
            "concept": "Easy to digest, warm food",
            "foods_to_eat": {
                "main_dishes": ["Rice porridge"],
                "snacks_and_fruits": ["Orange"],
                "drinks": ["Ginger tea"]
            },
            "foods_to_avoid": ["Cold drinks: may irritate the throat"]
        },
        "red_flags": ["Difficulty breathing"],
        "disclaimer": "AI generated guidance."
    })
}

fn record() -> PatientIntakeRecord {
    serde_json::from_value(json!({
        "name": "Malee",
        "age": "29",
        "sex": "female",
        "weight": 60,
        "height": 170,
        "symptoms": "sore throat and runny nose",
        "symptom_duration": "3 days",
        "health_profile": {
            "allergies": {"drug": "penicillin"},
            "lifestyle_factors": {"smoking": "never", "alcohol": "none"}
        }
    }))
    .unwrap()
}

fn pipeline(
    primary: Arc<ScriptedProvider>,
    fallback: Arc<ScriptedProvider>,
    retry: RetryPolicy,
) -> AssessmentPipeline {
    AssessmentPipeline::new(
        ProviderChain::new(primary, fallback),
        retry,
        PromptOptions::default(),
    )
}

#[tokio::test]
async fn canonical_answer_passes_through_unchanged() {
    let primary = ScriptedProvider::new("OpenRouter", vec![Ok(analysis().to_string())]);
    let fallback = ScriptedProvider::new("Gemini", vec![Ok("{}".to_string())]);
    let p = pipeline(primary.clone(), fallback.clone(), RetryPolicy::fixed(3, Duration::ZERO));

    let envelope = p.assess(&record()).await.unwrap();

    assert_eq!(serde_json::to_value(&envelope.analysis).unwrap(), analysis());
    assert_eq!(envelope.user_info.name.as_deref(), Some("Malee"));
    assert_eq!(envelope.bmi.bmi.value_text(), "20.76");
    assert_eq!(envelope.bmi.bmi.category, BmiCategory::Normal);
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 0);

    let prompt = &primary.prompts.lock().unwrap()[0];
    assert!(prompt.contains("penicillin"));
    assert!(prompt.contains("20.76"));
    assert!(!prompt.contains("Smoking"));
}

#[tokio::test]
async fn envelope_serializes_with_user_info_key() {
    let primary = ScriptedProvider::new("OpenRouter", vec![Ok(analysis().to_string())]);
    let fallback = ScriptedProvider::new("Gemini", vec![Ok("{}".to_string())]);
    let p = pipeline(primary, fallback, RetryPolicy::fixed(1, Duration::ZERO));

    let value = serde_json::to_value(p.assess(&record()).await.unwrap()).unwrap();
    assert_eq!(value["userInfo"]["age"], json!("29"));
    assert_eq!(value["bmi"]["value"], json!("20.76"));
    assert_eq!(value["bmi"]["weight"], json!(60.0));
    assert_eq!(value["bmi"]["height"], json!(170.0));
}

#[tokio::test]
async fn fallback_answer_is_used_when_primary_fails() {
    let primary = ScriptedProvider::new("OpenRouter", vec![http("OpenRouter", 500)]);
    let fallback = ScriptedProvider::new("Gemini", vec![Ok(analysis().to_string())]);
    let p = pipeline(primary.clone(), fallback.clone(), RetryPolicy::fixed(3, Duration::ZERO));

    let envelope = p.assess(&record()).await.unwrap();

    assert_eq!(serde_json::to_value(&envelope.analysis).unwrap(), analysis());
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
    assert_eq!(
        primary.prompts.lock().unwrap()[0],
        fallback.prompts.lock().unwrap()[0]
    );
}

#[tokio::test]
async fn malformed_answers_are_retried_until_success() {
    let primary = ScriptedProvider::new(
        "OpenRouter",
        vec![
            Ok("not json at all".to_string()),
            Ok("[\"an\", \"array\"]".to_string()),
            Ok(analysis().to_string()),
        ],
    );
    let fallback = ScriptedProvider::new("Gemini", vec![Ok("{}".to_string())]);
    let backoff = Arc::new(CountingBackoff::default());
    let p = pipeline(
        primary.clone(),
        fallback.clone(),
        RetryPolicy::new(3, backoff.clone()),
    );

    let envelope = p.assess(&record()).await.unwrap();

    assert_eq!(serde_json::to_value(&envelope.analysis).unwrap(), analysis());
    assert_eq!(primary.calls(), 3);
    assert_eq!(fallback.calls(), 0);
    assert_eq!(backoff.waits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_retries_report_attempts_and_last_error() {
    let primary = ScriptedProvider::new("OpenRouter", vec![http("OpenRouter", 500)]);
    let fallback = ScriptedProvider::new("Gemini", vec![http("Gemini", 503)]);
    let backoff = Arc::new(CountingBackoff::default());
    let p = pipeline(
        primary.clone(),
        fallback.clone(),
        RetryPolicy::new(3, backoff.clone()),
    );

    let err = p.assess(&record()).await.unwrap_err();

    match &err {
        IntakeError::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert!(matches!(**last, IntakeError::ProvidersFailed { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("after 3 attempts"));
    assert!(message.contains("Gemini API request failed with status 503"));
    assert!(!message.contains("status 500"));
    assert_eq!(primary.calls(), 3);
    assert_eq!(fallback.calls(), 3);
    assert_eq!(backoff.waits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn single_attempt_policy_never_waits() {
    let primary = ScriptedProvider::new("OpenRouter", vec![Ok("nope".to_string())]);
    let fallback = ScriptedProvider::new("Gemini", vec![Ok("{}".to_string())]);
    let backoff = Arc::new(CountingBackoff::default());
    let p = pipeline(primary, fallback, RetryPolicy::new(1, backoff.clone()));

    let err = p.assess(&record()).await.unwrap_err();

    assert!(err.to_string().starts_with("Could not communicate with AI after 1 attempts"));
    assert_eq!(backoff.waits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn fixed_backoff_sleeps_between_attempts() {
    let primary = ScriptedProvider::new("OpenRouter", vec![Ok("garbage".to_string())]);
    let fallback = ScriptedProvider::new("Gemini", vec![Ok("{}".to_string())]);
    let p = pipeline(primary, fallback, RetryPolicy::fixed(3, Duration::from_millis(2_000)));

    let started = tokio::time::Instant::now();
    let err = p.assess(&record()).await.unwrap_err();

    assert!(matches!(err, IntakeError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(started.elapsed(), Duration::from_millis(4_000));
}

#[tokio::test]
async fn repaired_answer_has_canonical_shape() {
    let sloppy = json!({
        "primary_assessment": "Mild dehydration.",
        "risk_analysis": [{"condition": "Dehydration", "risk_level": "HIGH", "rationale": "dizziness"}],
        "personalized_care": {
            "immediate_actions": ["Drink water"],
            "general_wellness": "Keep a water bottle nearby",
            "activity_guidance": ["Short walks"]
        },
        "dietary_recommendations": {
            "concept": "Hydration",
            "foods_to_avoid": {"reasoning": "Alcohol worsens dehydration"}
        },
        "red_flags": [{"condition": "Fainting"}, {"severity": "high"}]
    });
    let primary = ScriptedProvider::new("OpenRouter", vec![Ok(sloppy.to_string())]);
    let fallback = ScriptedProvider::new("Gemini", vec![Ok("{}".to_string())]);
    let p = pipeline(primary, fallback, RetryPolicy::fixed(1, Duration::ZERO));

    let analysis = serde_json::to_value(p.assess(&record()).await.unwrap().analysis).unwrap();

    assert_eq!(analysis["risk_analysis"][0]["risk_level"], "high");
    assert_eq!(
        analysis["personalized_care"]["general_wellness"],
        json!(["Keep a water bottle nearby"])
    );
    assert_eq!(
        analysis["personalized_care"]["activity_guidance"],
        json!({"recommended": ["Short walks"], "to_avoid": []})
    );
    assert_eq!(
        analysis["dietary_recommendations"]["foods_to_eat"],
        json!({"main_dishes": [], "snacks_and_fruits": [], "drinks": []})
    );
    assert_eq!(
        analysis["dietary_recommendations"]["foods_to_avoid"],
        json!(["Alcohol worsens dehydration"])
    );
    assert_eq!(analysis["red_flags"], json!(["Fainting", "Invalid data"]));
    assert!(analysis["disclaimer"].as_str().unwrap().len() > 10);
}
