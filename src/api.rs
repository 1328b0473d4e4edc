use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::analyzer::{self, AspectScore};
use crate::classifier::ClassifierClient;
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::history::{HistoryEntry, SessionHistory};
use crate::models::{non_blank, submitted_text, Classification, NewReview, Review, ReviewDraft, Sentiment};
use crate::report::{self, AnalysisReport, GroupBreakdown, SentimentBreakdown, SentimentSlice, TrendPoint};
use crate::search::{self, SearchQuery};
use crate::store::{CategoryCount, ReviewStore};

/// Header carrying the dashboard's session id
pub const SESSION_HEADER: &str = "x-session-id";

pub struct AppState {
    pub store: Arc<dyn ReviewStore>,
    pub classifier: ClassifierClient,
    pub history: SessionHistory,
    /// Source of the analyzer's accuracy and aspect jitter
    pub rng: Mutex<StdRng>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReviewStore>, classifier: ClassifierClient, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            classifier,
            history: SessionHistory::default(),
            rng: Mutex::new(rng),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> ApiResult<T> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ApiError::Internal("analyzer rng lock poisoned".to_string()))?;
        Ok(f(&mut *rng))
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewFilter {
    /// Exact category
    pub category: Option<String>,
    /// Exact product name
    pub product: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    #[schema(example = "This product is amazing and great")]
    pub text: Option<String>,
    pub category: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReviewRequest {
    #[schema(example = "Arrived broken and support never answered")]
    pub review: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub classifier_configured: bool,
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_session(headers: &HeaderMap) -> ApiResult<String> {
    session_id(headers).ok_or_else(|| ApiError::Validation("X-Session-Id header is required".to_string()))
}

async fn classify_and_store(
    state: &AppState,
    text: String,
    category: Option<String>,
    product: Option<String>,
) -> ApiResult<Review> {
    let verdict = state.classifier.classify(&text).await?;
    let review = state
        .store
        .create(NewReview {
            category,
            product_name: product,
            review: text,
            classification: verdict.classification,
            sentiment: verdict.sentiment,
            reason: None,
            accuracy: verdict.accuracy,
        })
        .await?;
    info!("✅ [Classifier] Stored review {}", review.id);
    Ok(review)
}

#[utoipa::path(
    get,
    path = "/api/reviews",
    params(ReviewFilter),
    responses((status = 200, description = "Reviews, newest first", body = [Review])),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ReviewFilter>,
) -> ApiResult<Json<Vec<Review>>> {
    let category = non_blank(filter.category);
    let product = non_blank(filter.product);
    let reviews = if category.is_none() && product.is_none() {
        state.store.list().await?
    } else {
        state
            .store
            .find_by_category_or_product(category.as_deref(), product.as_deref())
            .await?
    };
    Ok(Json(reviews))
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, body = Review),
        (status = 404, description = "Review not found", body = ErrorBody)
    ),
    tag = "reviews"
)]
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Review>> {
    let not_found = || ApiError::NotFound("Review not found".to_string());
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    state.store.get_by_id(id).await?.map(Json).ok_or_else(not_found)
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = ReviewDraft,
    responses(
        (status = 201, body = Review),
        (status = 400, description = "Missing or invalid field", body = ErrorBody)
    ),
    tag = "reviews"
)]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ReviewDraft>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = state.store.create(draft.validate()?).await?;
    info!("📝 Created review {} ({} / {})", review.id, review.classification, review.sentiment);
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/api/reviews/search",
    params(
        SearchQuery,
        ("X-Session-Id" = Option<String>, Header, description = "Records the search in this session's history")
    ),
    responses(
        (status = 200, body = [Review]),
        (status = 400, description = "Search term missing", body = ErrorBody)
    ),
    tag = "reviews"
)]
pub async fn search_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Review>>> {
    let found = search::filter_reviews(state.store.list().await?, &query)?;

    if let Some(session) = session_id(&headers) {
        let SearchQuery { q, category, product } = query;
        let text = q.unwrap_or_default();
        state
            .history
            .record(&session, HistoryEntry::new(&text, non_blank(category), non_blank(product)))?;
    }
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/api/reviews/stats/sentiment",
    responses((status = 200, body = [SentimentSlice])),
    tag = "stats"
)]
pub async fn sentiment_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SentimentSlice>>> {
    Ok(Json(report::sentiment_data(state.store.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/stats/trend",
    responses((status = 200, description = "Last six months, oldest first", body = [TrendPoint])),
    tag = "stats"
)]
pub async fn trend_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<TrendPoint>>> {
    Ok(Json(report::trend_data(state.store.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/stats/category",
    responses((status = 200, body = [CategoryCount])),
    tag = "stats"
)]
pub async fn category_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<CategoryCount>>> {
    Ok(Json(report::category_data(state.store.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/stats/breakdown",
    params(ReviewFilter),
    responses((status = 200, description = "Sentiment shares per category and product", body = SentimentBreakdown)),
    tag = "stats"
)]
pub async fn breakdown_stats(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ReviewFilter>,
) -> ApiResult<Json<SentimentBreakdown>> {
    let category = non_blank(filter.category);
    let product = non_blank(filter.product);
    Ok(Json(
        report::breakdown_data(state.store.as_ref(), category.as_deref(), product.as_deref()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/reviews/analyze",
    request_body = AnalyzeRequest,
    params(("X-Session-Id" = Option<String>, Header, description = "Records the submission in this session's history")),
    responses(
        (status = 201, body = AnalysisReport),
        (status = 400, description = "Feedback text missing", body = ErrorBody)
    ),
    tag = "analysis"
)]
pub async fn analyze_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<(StatusCode, Json<AnalysisReport>)> {
    let text = submitted_text(req.text)
        .ok_or_else(|| ApiError::Validation("Feedback text is required".to_string()))?;
    let category = non_blank(req.category);
    let product = non_blank(req.product);

    let analysis = state.with_rng(|rng| analyzer::analyze(&text, rng))?;

    let review = state
        .store
        .create(NewReview {
            category: category.clone(),
            product_name: product.clone(),
            review: text.clone(),
            classification: analysis.classification,
            sentiment: analysis.sentiment,
            reason: Some(analysis.reason),
            accuracy: analysis.accuracy,
        })
        .await?;
    info!(
        "🧠 [Analyze] Stored review {} ({} / {})",
        review.id, review.classification, review.sentiment
    );

    let sentiment_data = report::sentiment_data(state.store.as_ref()).await?;
    let trend_data = report::trend_data(state.store.as_ref()).await?;

    let related = if category.is_some() || product.is_some() {
        state
            .store
            .find_by_category_or_product(category.as_deref(), product.as_deref())
            .await?
    } else {
        Vec::new()
    };
    let aspect_data: Vec<AspectScore> = state.with_rng(|rng| analyzer::aspect_breakdown(&related, rng))?;

    if let Some(session) = session_id(&headers) {
        state.history.record(&session, HistoryEntry::new(&text, category, product))?;
    }

    Ok((
        StatusCode::CREATED,
        Json(AnalysisReport {
            review,
            sentiment_data,
            aspect_data,
            trend_data,
            key_phrases: analysis.key_phrases,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/process-review",
    request_body = ProcessReviewRequest,
    params(("X-Session-Id" = Option<String>, Header, description = "Records the submission in this session's history")),
    responses(
        (status = 201, description = "Classified and stored", body = Review),
        (status = 400, description = "Review text missing", body = ErrorBody),
        (status = 502, description = "Classifier failed", body = ErrorBody)
    ),
    tag = "analysis"
)]
pub async fn process_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ProcessReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let text = submitted_text(req.review)
        .ok_or_else(|| ApiError::Validation("Review text is required".to_string()))?;
    let category = non_blank(req.category);
    let product = non_blank(req.product_name);

    let review = classify_and_store(&state, text.clone(), category.clone(), product.clone()).await?;

    if let Some(session) = session_id(&headers) {
        state.history.record(&session, HistoryEntry::new(&text, category, product))?;
    }
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/api/history",
    params(("X-Session-Id" = String, Header, description = "Dashboard session")),
    responses(
        (status = 200, description = "Recent submissions, newest first", body = [HistoryEntry]),
        (status = 400, description = "Session header missing", body = ErrorBody)
    ),
    tag = "history"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let session = require_session(&headers)?;
    Ok(Json(state.history.entries(&session)?))
}

#[utoipa::path(
    post,
    path = "/api/history/{entry_id}/replay",
    params(
        ("entry_id" = Uuid, Path, description = "History entry id"),
        ("X-Session-Id" = String, Header, description = "Dashboard session")
    ),
    responses(
        (status = 200, description = "Search results for the entry's text, category and product", body = [Review]),
        (status = 404, description = "Unknown history entry", body = ErrorBody)
    ),
    tag = "history"
)]
pub async fn replay_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Review>>> {
    let session = require_session(&headers)?;
    let entry = state
        .history
        .find(&session, entry_id)?
        .ok_or_else(|| ApiError::NotFound("History entry not found".to_string()))?;

    let query = SearchQuery {
        q: Some(entry.text.clone()),
        category: entry.category.clone(),
        product: entry.product.clone(),
    };
    let found = search::filter_reviews(state.store.list().await?, &query)?;

    state
        .history
        .record(&session, HistoryEntry::new(&entry.text, entry.category, entry.product))?;
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, body = HealthResponse)),
    tag = "service"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        store: state.store.backend().to_string(),
        classifier_configured: state.classifier.endpoint().is_some(),
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_reviews,
        get_review,
        create_review,
        search_reviews,
        sentiment_stats,
        trend_stats,
        category_stats,
        breakdown_stats,
        analyze_feedback,
        process_review,
        get_history,
        replay_history,
        health
    ),
    components(
        schemas(
            Review,
            Classification,
            Sentiment,
            ReviewDraft,
            AnalyzeRequest,
            ProcessReviewRequest,
            AnalysisReport,
            SentimentSlice,
            TrendPoint,
            CategoryCount,
            SentimentBreakdown,
            GroupBreakdown,
            AspectScore,
            HistoryEntry,
            HealthResponse,
            ErrorBody
        )
    ),
    tags(
        (name = "reviews", description = "Stored feedback"),
        (name = "stats", description = "Chart data"),
        (name = "analysis", description = "Keyword and remote-model classification"),
        (name = "history", description = "Per-session recent submissions and searches"),
        (name = "service", description = "Service status")
    )
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/api/reviews", get(list_reviews).post(create_review))
        .route("/api/reviews/search", get(search_reviews))
        .route("/api/reviews/analyze", post(analyze_feedback))
        .route("/api/reviews/stats/sentiment", get(sentiment_stats))
        .route("/api/reviews/stats/trend", get(trend_stats))
        .route("/api/reviews/stats/category", get(category_stats))
        .route("/api/reviews/stats/breakdown", get(breakdown_stats))
        .route("/api/reviews/:id", get(get_review))
        .route("/process-review", post(process_review))
        .route("/api/history", get(get_history))
        .route("/api/history/:entry_id/replay", post(replay_history))
        .fallback_service(ServeDir::new(static_dir)) // Serve Dashboard
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
