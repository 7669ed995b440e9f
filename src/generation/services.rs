use tracing::{error, info, instrument};

use super::{
    error::GenerateError,
    gateway::{user_message, GatewayError, ModelGateway, SYSTEM_PROMPT},
    images::ingest_image,
    parser::{parse_recipe, ParsedRecipe},
};
use crate::{
    auth::attribution::attribute,
    recipes::repo_types::{NewRecipe, Recipe},
    state::AppState,
};

pub const MSG_GENERATED: &str = "Recipe generated and saved successfully!";
pub const MSG_DRAFTED: &str = "AI output could not be parsed; saved a draft recipe instead.";

#[derive(Debug, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub cuisine: Option<String>,
    pub image_data: Option<String>,
    /// Raw `Authorization` header value, if any.
    pub authorization: Option<String>,
}

/// What the model step produced. `Exhausted` means no text at all; a
/// `Degraded` draft is still a successful generation.
#[derive(Debug, PartialEq)]
pub enum GenerationOutcome {
    Success(NewRecipe),
    Degraded(NewRecipe),
    Exhausted { attempts: u32 },
}

#[derive(Debug)]
pub struct GeneratedRecipe {
    pub recipe: Recipe,
    pub degraded: bool,
}

impl GeneratedRecipe {
    pub fn message(&self) -> &'static str {
        if self.degraded {
            MSG_DRAFTED
        } else {
            MSG_GENERATED
        }
    }
}

/// Asks the model for a recipe and parses whatever comes back.
pub async fn draft_recipe(
    gateway: &dyn ModelGateway,
    prompt: &str,
    cuisine: Option<&str>,
) -> Result<GenerationOutcome, GenerateError> {
    let user = user_message(prompt, cuisine);
    match gateway.complete(SYSTEM_PROMPT, &user).await {
        Ok(raw) => Ok(match parse_recipe(&raw, prompt, cuisine) {
            ParsedRecipe::WellFormed(r) => GenerationOutcome::Success(r),
            ParsedRecipe::Draft(r) => GenerationOutcome::Degraded(r),
        }),
        Err(GatewayError::Exhausted { attempts }) => Ok(GenerationOutcome::Exhausted { attempts }),
        Err(e) => Err(e.into()),
    }
}

/// Validate, generate, parse, attach image and owner, then insert once.
#[instrument(skip(st, req), fields(cuisine = ?req.cuisine, has_image = req.image_data.is_some()))]
pub async fn generate_recipe(
    st: &AppState,
    req: GenerationRequest,
) -> Result<GeneratedRecipe, GenerateError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(GenerateError::Validation("Recipe prompt is required".into()));
    }
    info!(prompt, "generating recipe");

    let cuisine = req.cuisine.as_deref();
    let (mut recipe, degraded) = match draft_recipe(st.gateway.as_ref(), prompt, cuisine).await? {
        GenerationOutcome::Success(r) => (r, false),
        GenerationOutcome::Degraded(r) => (r, true),
        GenerationOutcome::Exhausted { attempts } => {
            error!(attempts, "AI API failed after retries");
            return Err(GenerateError::UpstreamExhausted { attempts });
        }
    };

    if let Some(url) = ingest_image(st.storage.as_ref(), req.image_data.as_deref()).await {
        recipe.image_url = Some(url);
    }
    attribute(&mut recipe, req.authorization.as_deref());

    let saved = st.recipes.insert(&recipe).await.map_err(|e| {
        error!(error = %e, "database insert error");
        GenerateError::Persistence(e.to_string())
    })?;

    info!(recipe_id = %saved.id, degraded, user_id = ?saved.user_id, "recipe created");
    Ok(GeneratedRecipe {
        recipe: saved,
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::gateway::{
        tests::{chat_body, config},
        ChatGateway,
    };
    use crate::generation::images::tests::RecordingStorage;
    use crate::recipes::repo_types::Difficulty;
    use crate::state::testing::{MemoryRecipeStore, ScriptedGateway};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    const RECIPE_JSON: &str = r#"{"title":"Spicy Chicken Pasta","description":"Hot.","cuisine":"Italian",
        "prep_time":10,"cook_time":20,"servings":2,"difficulty":"hard",
        "ingredients":["penne","chicken","chili"],"instructions":["Cook.","Serve."]}"#;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            cuisine: Some("Italian".into()),
            ..Default::default()
        }
    }

    fn bearer(claims: &str) -> String {
        format!("Bearer e30.{}.sig", URL_SAFE_NO_PAD.encode(claims))
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_without_calling_model() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let st = AppState::fake().with_gateway(gateway.clone());
        let err = generate_recipe(&st, request("   ")).await.unwrap_err();
        assert!(matches!(err, GenerateError::Validation(_)));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn valid_json_yields_well_formed_record() {
        let store = Arc::new(MemoryRecipeStore::default());
        let st = AppState::fake()
            .with_gateway(Arc::new(ScriptedGateway::text(RECIPE_JSON)))
            .with_store(store.clone());

        let out = generate_recipe(&st, request("spicy chicken pasta")).await.unwrap();
        assert!(!out.degraded);
        assert_eq!(out.message(), MSG_GENERATED);
        assert_eq!(out.recipe.title, "Spicy Chicken Pasta");
        assert_eq!(out.recipe.difficulty.as_deref(), Some("hard"));
        assert!(!out.recipe.ingredients.is_empty() && !out.recipe.instructions.is_empty());
        assert!(out.recipe.user_id.is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unparsable_text_saves_a_draft() {
        let st = AppState::fake().with_gateway(Arc::new(ScriptedGateway::text("Sorry, I can't help")));
        let out = generate_recipe(&st, request("spicy chicken pasta")).await.unwrap();
        assert!(out.degraded);
        assert_eq!(out.message(), MSG_DRAFTED);
        assert_eq!(out.recipe.difficulty.as_deref(), Some("Unknown"));
        assert!(out.recipe.ingredients.is_empty());
        assert_eq!(out.recipe.instructions, vec!["Sorry, I can't help"]);
        assert_eq!(out.recipe.title, "spicy chicken pasta (AI draft)");
    }

    #[tokio::test]
    async fn exhausted_gateway_fails_and_persists_nothing() {
        let store = Arc::new(MemoryRecipeStore::default());
        let st = AppState::fake()
            .with_gateway(Arc::new(ScriptedGateway::new(vec![Err(GatewayError::Exhausted {
                attempts: 3,
            })])))
            .with_store(store.clone());

        let err = generate_recipe(&st, request("soup")).await.unwrap_err();
        assert!(matches!(err, GenerateError::UpstreamExhausted { attempts: 3 }));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let st = AppState::fake()
            .with_gateway(Arc::new(ScriptedGateway::new(vec![Err(GatewayError::MissingApiKey)])));
        let err = generate_recipe(&st, request("soup")).await.unwrap_err();
        assert!(matches!(err, GenerateError::Configuration(_)));
    }

    #[tokio::test]
    async fn draft_outcome_distinguishes_three_cases() {
        let ok = ScriptedGateway::text(RECIPE_JSON);
        assert!(matches!(
            draft_recipe(&ok, "pasta", None).await.unwrap(),
            GenerationOutcome::Success(_)
        ));
        let bad = ScriptedGateway::text("no idea");
        match draft_recipe(&bad, "pasta", None).await.unwrap() {
            GenerationOutcome::Degraded(r) => assert_eq!(r.difficulty, Some(Difficulty::Unknown)),
            other => panic!("unexpected {other:?}"),
        }
        let gone = ScriptedGateway::new(vec![Err(GatewayError::Exhausted { attempts: 3 })]);
        assert_eq!(
            draft_recipe(&gone, "pasta", None).await.unwrap(),
            GenerationOutcome::Exhausted { attempts: 3 }
        );
    }

    #[tokio::test]
    async fn image_and_owner_are_attached_before_insert() {
        let storage = Arc::new(RecordingStorage::default());
        let st = AppState::fake()
            .with_gateway(Arc::new(ScriptedGateway::text(RECIPE_JSON)))
            .with_storage(storage.clone());

        let mut req = request("pasta");
        req.image_data = Some("data:image/png;base64,iVBORw0KGgo=".into());
        req.authorization = Some(bearer(r#"{"sub":"u123"}"#));
        let out = generate_recipe(&st, req).await.unwrap();

        let key = storage.puts.lock().unwrap()[0].0.clone();
        assert!(key.ends_with(".png"));
        assert_eq!(out.recipe.image_url, Some(format!("https://fake.local/public/{key}")));
        assert_eq!(out.recipe.user_id.as_deref(), Some("u123"));
    }

    #[tokio::test]
    async fn upload_and_token_failures_do_not_fail_generation() {
        let st = AppState::fake()
            .with_gateway(Arc::new(ScriptedGateway::text(RECIPE_JSON)))
            .with_storage(Arc::new(RecordingStorage { fail: true, ..Default::default() }));

        let mut req = request("pasta");
        req.image_data = Some("data:image/png;base64,iVBORw0KGgo=".into());
        req.authorization = Some("Bearer garbage".into());
        let out = generate_recipe(&st, req).await.unwrap();
        assert!(out.recipe.image_url.is_none());
        assert!(out.recipe.user_id.is_none());
    }

    #[tokio::test]
    async fn store_rejection_surfaces_its_message() {
        let st = AppState::fake()
            .with_gateway(Arc::new(ScriptedGateway::text(RECIPE_JSON)))
            .with_store(Arc::new(MemoryRecipeStore::failing("violates check constraint")));
        let err = generate_recipe(&st, request("pasta")).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to save recipe: violates check constraint");
    }

    #[tokio::test]
    async fn timeout_then_valid_json_on_second_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body(RECIPE_JSON))
                    .set_delay(Duration::from_secs(5)),
            )
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(RECIPE_JSON)))
            .mount(&server)
            .await;

        let gateway = ChatGateway::new(&config(server.uri(), Some("k"), 5))
            .unwrap()
            .with_timeout(Duration::from_millis(250))
            .unwrap();
        let st = AppState::fake().with_gateway(Arc::new(gateway));

        let started = Instant::now();
        let out = generate_recipe(&st, request("spicy chicken pasta")).await.unwrap();
        let elapsed = started.elapsed();

        assert!(!out.degraded);
        assert!(!out.recipe.ingredients.is_empty() && !out.recipe.instructions.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        assert!(elapsed >= Duration::from_millis(500), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");
    }
}
