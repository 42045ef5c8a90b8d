use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::classify::dto::{ClassificationSummary, ClassifyData};
use crate::classify::repo;
use crate::error::ApiError;
use crate::insights::disease_label;
use crate::state::AppState;
use crate::users::dto::PublicUser;
use crate::users::repo as users_repo;

const DEFAULT_MODEL: &str = "bean";

pub struct ClassifyRequest {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub email: String,
    pub crop_type: Option<String>,
}

/// The classification pipeline: validate, resolve user, store image, run
/// inference, generate insights, persist one history row.
///
/// Steps run strictly in order with no retries. Failures after the image
/// upload leave the blob in place; the history row only exists on full
/// success.
pub async fn classify_image(
    state: &AppState,
    req: ClassifyRequest,
) -> Result<ClassifyData, ApiError> {
    // Fail fast, before any side effect.
    if req.bytes.is_empty() {
        return Err(ApiError::InvalidInput("no image file provided".into()));
    }
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::InvalidInput("email required".into()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::InvalidInput("invalid email format".into()));
    }

    // 1) resolve user, creating one on first contact with this email
    let user = users_repo::upsert_by_email(&state.db, &email, local_part(&email)).await?;

    // 2) persist the image; first side effect, nothing to undo on failure
    let ext = ext_from_mime(&req.content_type).unwrap_or("bin");
    let key = format!("crop-images/{}.{}", Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, req.bytes.clone(), &req.content_type)
        .await
        .map_err(|e| {
            error!(error = %e, key, "image upload failed");
            ApiError::UpstreamFailure {
                service: "storage",
                status: None,
            }
        })?;
    let image_url = state.storage.object_url(&key);

    // 3) classify; the uploaded blob stays even if this fails
    let model = model_for_crop(req.crop_type.as_deref());
    let result = state
        .inference
        .predict(&req.bytes, &req.filename, &req.content_type, model)
        .await?;

    // 4) insights, never fatal
    let resolved_crop = req
        .crop_type
        .clone()
        .or_else(|| embedded_crop(&result).map(String::from));
    let insights = state
        .insights
        .generate(&result, resolved_crop.as_deref().unwrap_or("crop"))
        .await;

    // 5) persist the combined record
    let disease = disease_label(&result).unwrap_or("Unknown").to_string();
    let raw = result.to_string();
    let record = repo::insert(
        &state.db,
        user.id,
        &image_url,
        &disease,
        resolved_crop.as_deref(),
        &raw,
        &insights,
    )
    .await?;

    info!(
        record_id = %record.id,
        user_id = %user.id,
        disease = %record.disease,
        model,
        "classification stored"
    );

    // 6) respond
    Ok(ClassifyData {
        id: record.id,
        user: PublicUser::from(&user),
        image: record.image_url,
        classification: ClassificationSummary {
            disease: record.disease,
            confidence: result["confidence"].as_f64(),
            crop_type: record.crop_type,
            full_result: result,
        },
        insights: record.genai_response,
        created_at: record.created_at,
    })
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Crop type → model name. Unknown and missing crops use the default model.
pub fn model_for_crop(crop_type: Option<&str>) -> &'static str {
    match crop_type.map(|c| c.trim().to_lowercase()).as_deref() {
        Some("maize") => "maize",
        _ => DEFAULT_MODEL,
    }
}

fn embedded_crop(result: &Value) -> Option<&str> {
    result["crop_type"]
        .as_str()
        .or_else(|| result["model"].as_str())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("farmer@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("spaces in@local.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn model_selection_is_case_insensitive() {
        assert_eq!(model_for_crop(Some("maize")), "maize");
        assert_eq!(model_for_crop(Some("Maize")), "maize");
        assert_eq!(model_for_crop(Some(" MAIZE ")), "maize");
        assert_eq!(model_for_crop(Some("bean")), "bean");
        assert_eq!(model_for_crop(Some("tomato")), "bean");
        assert_eq!(model_for_crop(None), "bean");
    }

    #[test]
    fn crop_falls_back_to_model_field() {
        let r = serde_json::json!({ "crop_type": "maize" });
        assert_eq!(embedded_crop(&r), Some("maize"));
        let r = serde_json::json!({ "model": "bean" });
        assert_eq!(embedded_crop(&r), Some("bean"));
        assert_eq!(embedded_crop(&serde_json::json!({})), None);
    }

    #[test]
    fn local_part_defaults_full_name() {
        assert_eq!(local_part("farmer@example.com"), "farmer");
        assert_eq!(local_part("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    struct RecordingStorage {
        called: Arc<AtomicBool>,
    }

    #[axum::async_trait]
    impl crate::storage::StorageClient for RecordingStorage {
        async fn put_object(
            &self,
            _k: &str,
            _b: Bytes,
            _ct: &str,
        ) -> anyhow::Result<()> {
            self.called.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn delete_object(&self, _k: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn object_url(&self, k: &str) -> String {
            format!("https://fake.local/{}", k)
        }
    }

    #[tokio::test]
    async fn invalid_email_rejected_before_any_side_effect() {
        let mut state = crate::state::AppState::fake();
        let called = Arc::new(AtomicBool::new(false));
        state.storage = Arc::new(RecordingStorage {
            called: called.clone(),
        });

        let req = ClassifyRequest {
            bytes: Bytes::from_static(b"not-really-a-jpeg"),
            filename: "leaf.jpg".into(),
            content_type: "image/jpeg".into(),
            email: "not-an-email".into(),
            crop_type: None,
        };

        let err = classify_image(&state, req).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "invalid email format"));
        assert!(!called.load(Ordering::SeqCst), "storage must not be touched");
    }

    #[tokio::test]
    async fn missing_image_rejected_first() {
        let state = crate::state::AppState::fake();
        let req = ClassifyRequest {
            bytes: Bytes::new(),
            filename: "leaf.jpg".into(),
            content_type: "image/jpeg".into(),
            email: "farmer@example.com".into(),
            crop_type: None,
        };
        let err = classify_image(&state, req).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "no image file provided"));
    }

    #[tokio::test]
    async fn empty_email_rejected() {
        let state = crate::state::AppState::fake();
        let req = ClassifyRequest {
            bytes: Bytes::from_static(b"img"),
            filename: "leaf.jpg".into(),
            content_type: "image/jpeg".into(),
            email: "   ".into(),
            crop_type: None,
        };
        let err = classify_image(&state, req).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "email required"));
    }
}
