use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use url::Url;

use crate::core::data::coerce_risk;
use crate::core::risk::RiskCategory;
use crate::error::{ApiError, ApiResult};
use crate::models::recommendation::{
    PatientContext, Recommendation, RecommendationMetadata, RecommendationRequest,
    RecommendationResponse, RecommendationSource,
};

pub const MAX_RECOMMENDATIONS: usize = 6;

/// External generative-text service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    text: String,
}

pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTextGenerator {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(endpoint)?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut request = self.client.post(self.endpoint.clone()).json(&json!({
            "prompt": prompt,
            "generationConfig": {
                "temperature": 0.2,
                "maxOutputTokens": 800,
                "topP": 0.7,
                "topK": 40
            }
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let reply = request
            .send()
            .await?
            .error_for_status()?
            .json::<GeneratedText>()
            .await?;
        Ok(reply.text)
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn build_prompt(
    category: RiskCategory,
    risk_value: Option<f64>,
    context: Option<&PatientContext>,
) -> String {
    let value = risk_value.map_or_else(|| "unspecified".to_string(), |v| format!("{:.2}%", v));
    let mut prompt = format!(
        "Generate exactly 5-6 concise, evidence-based clinical recommendations for a patient \
         with {} readmission risk ({} value).",
        category, value
    );

    if let Some(ctx) = context {
        prompt.push_str(" Clinical data: ");
        if let Some(age) = &ctx.age {
            prompt.push_str(&format!("Age: {}. ", display(age)));
        }
        if let Some(gender) = &ctx.gender {
            prompt.push_str(&format!("Gender: {}. ", gender));
        }
        if let Some(diagnosis) = &ctx.diagnosis {
            prompt.push_str(&format!("Dx: {}. ", diagnosis));
        }
        if let Some(comorbidities) = ctx.comorbidities.as_ref().filter(|c| !c.is_empty()) {
            prompt.push_str(&format!("Comorbidities: {}. ", comorbidities.join(", ")));
        }
        if let Some(medications) = ctx.medications.as_ref().filter(|m| !m.is_empty()) {
            prompt.push_str(&format!("Meds: {}. ", medications.join(", ")));
        }
    }

    prompt.push_str(
        "\nFor each recommendation:\n\
         1. Use precise clinical terminology appropriate for physicians\n\
         2. Keep it to 1-2 sentences\n\
         3. Be direct and actionable with specific timeframes\n\
         4. Leave out rationales\n\
         5. Focus on the highest-impact interventions for this risk level\n\
         \n\
         Respond with a JSON object with a 'recommendations' array. Each entry has a 'text' field \
         with the recommendation and a 'category' field (e.g. \"Follow-up\", \"Medication\", \
         \"Monitoring\", \"Referral\", \"Testing\").",
    );
    prompt
}

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*\n(.*?)\n\s*```").expect("valid regex"));
static PLAIN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\s*\n(.*?)\n\s*```").expect("valid regex"));
static BARE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

fn extract_json(text: &str) -> &str {
    if let Some(c) = JSON_FENCE.captures(text).and_then(|c| c.get(1)) {
        return c.as_str();
    }
    if let Some(c) = PLAIN_FENCE.captures(text).and_then(|c| c.get(1)) {
        return c.as_str();
    }
    BARE_OBJECT.find(text).map_or(text, |m| m.as_str())
}

#[derive(Debug, Deserialize)]
struct ReplyDocument {
    recommendations: Vec<Recommendation>,
}

/// `None` when the reply holds no usable recommendations array.
pub fn parse_recommendations(text: &str) -> Option<Vec<Recommendation>> {
    let document: ReplyDocument = serde_json::from_str(extract_json(text)).ok()?;
    let mut recommendations = document.recommendations;
    if recommendations.is_empty() {
        return None;
    }
    recommendations.truncate(MAX_RECOMMENDATIONS);
    Some(recommendations)
}

fn table(entries: &[(&str, &str)]) -> Vec<Recommendation> {
    entries
        .iter()
        .map(|(text, category)| Recommendation {
            text: text.to_string(),
            category: category.to_string(),
        })
        .collect()
}

pub fn fallback_recommendations(category: RiskCategory) -> Vec<Recommendation> {
    match category {
        RiskCategory::High => table(&[
            ("Schedule follow-up within 14 days post-discharge with medication reconciliation.", "Follow-up"),
            ("Implement TCM services with 48-hour post-discharge contact.", "Care Coordination"),
            ("Daily vital sign monitoring (BP, HR, weight) for 7 days with alert parameters.", "Monitoring"),
            ("Pharmacist consult for comprehensive medication review.", "Medication"),
            ("Assess candidacy for home health services with ADL evaluation.", "Home Care"),
        ]),
        RiskCategory::Medium => table(&[
            ("Follow-up within 30 days with focused reassessment of primary condition.", "Follow-up"),
            ("Medication adherence assessment at 14 days post-discharge.", "Medication"),
            ("Telehealth evaluation at 14 days to assess treatment response.", "Monitoring"),
            ("Disease-specific education on exacerbation warning signs requiring urgent evaluation.", "Education"),
            ("Lab monitoring within 30 days for relevant parameters based on diagnosis and therapy.", "Testing"),
        ]),
        RiskCategory::Low => table(&[
            ("Routine follow-up per standard clinical protocols.", "Follow-up"),
            ("Standard medication reconciliation at next visit.", "Medication"),
            ("Disease-specific preventive care measures per guidelines.", "Prevention"),
            ("Routine surveillance for condition progression per guidelines.", "Monitoring"),
            ("Quality metrics assessment at next scheduled encounter.", "Quality"),
        ]),
    }
}

/// Category and numeric value of a request. The category is derived from
/// the value when only the value is given.
pub fn resolve_risk(request: &RecommendationRequest) -> ApiResult<(RiskCategory, Option<f64>)> {
    let value = match &request.risk_value {
        None | Some(Value::Null) => None,
        Some(v) => Some(coerce_risk(v)?),
    };

    let category = request
        .risk_category
        .or_else(|| value.map(RiskCategory::from_risk))
        .ok_or_else(|| ApiError::validation("Risk category is required"))?;

    Ok((category, value))
}

pub struct AiService {
    generator: Arc<dyn TextGenerator>,
}

impl AiService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Never fails: any generator or parse error yields the static table.
    #[instrument(skip(self, context))]
    pub async fn recommend(
        &self,
        category: RiskCategory,
        risk_value: Option<f64>,
        context: Option<&PatientContext>,
    ) -> RecommendationResponse {
        let prompt = build_prompt(category, risk_value, context);

        let generated = match self.generator.generate(&prompt).await {
            Ok(text) => {
                let parsed = parse_recommendations(&text);
                if parsed.is_none() {
                    warn!("generator reply held no recommendations array");
                }
                parsed
            }
            Err(e) => {
                warn!(error = %e, "recommendation generation failed");
                None
            }
        };

        let (recommendations, source) = match generated {
            Some(list) => (list, RecommendationSource::AiGenerated),
            None => (fallback_recommendations(category), RecommendationSource::Fallback),
        };
        info!(count = recommendations.len(), ?source, "recommendations ready");

        RecommendationResponse {
            recommendations,
            metadata: RecommendationMetadata {
                risk_category: category,
                risk_value,
                generated_at: Utc::now(),
                source,
            },
        }
    }
}
