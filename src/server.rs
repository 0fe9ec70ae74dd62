use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::aggregate::durations::DurationMetrics;
use crate::aggregate::funnel::{CohortTable, FunnelReport, YearComparison};
use crate::aggregate::rates::KeyMetrics;
use crate::aggregate::report::{
    build_report_from_timeline, GroupSection, RecruitmentReport, ReportOptions,
};
use crate::aggregate::roles::RoleTypeTable;
use crate::aggregate::seasonality::{monthly_seasonality, Seasonality};
use crate::aggregate::timeline::{build_timeline, CandidateTimeline};
use crate::aggregate::GroupKey;
use crate::config::Config;
use crate::dataset::cache::{CacheStats, FingerprintCache};
use crate::dataset::fetcher::{provider_for, RawSheets, SheetPair};
use crate::dataset::quality::QualityLog;
use crate::dataset::{load_dataset, Dataset};

/// Parsed sheets with the timeline and report built from them.
#[derive(Debug)]
pub struct Analysis {
    pub dataset: Dataset,
    pub timeline: CandidateTimeline,
    pub report: RecruitmentReport,
}

pub type DatasetCache = FingerprintCache<Analysis>;

pub fn analyze(
    raw: &RawSheets,
    options: &ReportOptions,
    roles: &RoleTypeTable,
) -> Result<Analysis> {
    let dataset = load_dataset(raw)?;
    let timeline = build_timeline(&dataset.candidates, &dataset.events);
    let report = build_report_from_timeline(&dataset, &timeline, options, roles)?;
    Ok(Analysis {
        dataset,
        timeline,
        report,
    })
}

#[derive(Clone)]
pub struct ApiState {
    config: Config,
    sheets: SheetPair,
    roles: Arc<RoleTypeTable>,
    options: ReportOptions,
    cache: Arc<Mutex<DatasetCache>>,
}

impl ApiState {
    pub fn new(config: Config) -> Result<Self> {
        let sheets = SheetPair::new(
            provider_for(&config.data.candidates, &config.http)?,
            provider_for(&config.data.activity, &config.http)?,
        );
        Ok(Self::with_sheets(config, sheets))
    }

    pub fn with_sheets(config: Config, sheets: SheetPair) -> Self {
        Self {
            roles: Arc::new(config.roles.table()),
            options: ReportOptions {
                seasonality_year: config.report.seasonality_year,
            },
            config,
            sheets,
            cache: Arc::new(Mutex::new(DatasetCache::new())),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Default, Deserialize)]
struct ProcessQuery {
    by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SeasonalityQuery {
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct CohortResponse {
    table: CohortTable,
    year_over_year: Vec<YearComparison>,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    fingerprint: String,
    candidates: usize,
    events: usize,
    warnings: usize,
    cache: CacheStats,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/report", get(report))
        .route("/v1/summary", get(summary))
        .route("/v1/funnel", get(funnel))
        .route("/v1/cohorts", get(cohorts))
        .route("/v1/sources", get(sources))
        .route("/v1/positions", get(positions))
        .route("/v1/process", get(process))
        .route("/v1/seasonality", get(seasonality))
        .route("/v1/quality", get(quality))
        .route("/v1/config", get(show_config))
        .route("/v1/reload", post(reload))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState::new(config)?;
    // Fail at startup rather than on the first request when a sheet is unreadable.
    current_analysis(&state)
        .await
        .map_err(|e| anyhow::anyhow!("initial load failed: {}", e.message))?;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn current_analysis(state: &ApiState) -> std::result::Result<Arc<Analysis>, ApiError> {
    let mut cache = state.cache.lock().await;
    let now = Utc::now();
    if !cache.is_stale(state.config.cache.max_age_secs, now) {
        if let Some(entry) = cache.latest() {
            return Ok(entry.value.clone());
        }
    }

    let raw = state.sheets.fetch().await.map_err(ApiError::internal)?;
    let fingerprint = raw.fingerprint();
    let analysis = cache
        .get_or_try_insert_with(&fingerprint, || analyze(&raw, &state.options, &state.roles))
        .map_err(ApiError::internal)?;
    cache.touch(now);
    Ok(analysis)
}

fn group_section(report: &RecruitmentReport, key: GroupKey) -> std::result::Result<GroupSection, ApiError> {
    report
        .group(key)
        .cloned()
        .ok_or_else(|| ApiError::internal(format!("report has no {} section", key.as_slug())))
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn report(State(state): State<ApiState>) -> ApiResult<RecruitmentReport> {
    let analysis = current_analysis(&state).await?;
    Ok(ok(analysis.report.clone()))
}

async fn summary(State(state): State<ApiState>) -> ApiResult<KeyMetrics> {
    let analysis = current_analysis(&state).await?;
    Ok(ok(analysis.report.key_metrics))
}

async fn funnel(State(state): State<ApiState>) -> ApiResult<FunnelReport> {
    let analysis = current_analysis(&state).await?;
    Ok(ok(analysis.report.funnel.clone()))
}

async fn cohorts(State(state): State<ApiState>) -> ApiResult<CohortResponse> {
    let analysis = current_analysis(&state).await?;
    let report = &analysis.report;
    let Some(table) = report.cohorts.clone() else {
        return Err(ApiError::unprocessable(unavailable_reason(report, "cohorts")));
    };
    Ok(ok(CohortResponse {
        table,
        year_over_year: report.year_over_year.clone(),
    }))
}

async fn sources(State(state): State<ApiState>) -> ApiResult<GroupSection> {
    let analysis = current_analysis(&state).await?;
    Ok(ok(group_section(&analysis.report, GroupKey::ApplicationSource)?))
}

async fn positions(State(state): State<ApiState>) -> ApiResult<GroupSection> {
    let analysis = current_analysis(&state).await?;
    Ok(ok(group_section(&analysis.report, GroupKey::PositionTitle)?))
}

async fn process(
    State(state): State<ApiState>,
    Query(query): Query<ProcessQuery>,
) -> ApiResult<DurationMetrics> {
    let key = match query.by.as_deref() {
        Some(raw) => GroupKey::from_str(raw).map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => GroupKey::ApplicationSource,
    };
    let analysis = current_analysis(&state).await?;
    let section = group_section(&analysis.report, key)?;
    match section.durations {
        Some(durations) => Ok(ok(durations)),
        None => Err(ApiError::unprocessable(unavailable_reason(
            &analysis.report,
            "durations",
        ))),
    }
}

async fn seasonality(
    State(state): State<ApiState>,
    Query(query): Query<SeasonalityQuery>,
) -> ApiResult<Seasonality> {
    let analysis = current_analysis(&state).await?;
    let cached = analysis.report.seasonality.as_ref();
    match (query.year, cached) {
        (None, Some(seasonality)) => Ok(ok(seasonality.clone())),
        (Some(year), Some(seasonality)) if seasonality.year == year => {
            Ok(ok(seasonality.clone()))
        }
        (Some(year), _) => {
            monthly_seasonality(&analysis.timeline, year)
                .map(ok)
                .map_err(|e| ApiError::unprocessable(e.to_string()))
        }
        (None, None) => Err(ApiError::unprocessable(unavailable_reason(
            &analysis.report,
            "seasonality",
        ))),
    }
}

async fn quality(State(state): State<ApiState>) -> ApiResult<QualityLog> {
    let analysis = current_analysis(&state).await?;
    Ok(ok(analysis.report.quality.clone()))
}

async fn reload(State(state): State<ApiState>) -> ApiResult<ReloadResponse> {
    state.cache.lock().await.invalidate();
    let analysis = current_analysis(&state).await?;
    let stats = state.cache.lock().await.stats();
    info!(
        fingerprint = %analysis.dataset.fingerprint,
        "reloaded sheets"
    );
    Ok(ok(ReloadResponse {
        fingerprint: analysis.dataset.fingerprint.clone(),
        candidates: analysis.dataset.candidates.len(),
        events: analysis.dataset.events.len(),
        warnings: analysis.report.quality.len(),
        cache: stats,
    }))
}

fn unavailable_reason(report: &RecruitmentReport, section: &str) -> String {
    report
        .unavailable
        .iter()
        .find(|u| u.section.starts_with(section))
        .map(|u| u.reason.clone())
        .unwrap_or_else(|| format!("{section} unavailable"))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;

    use super::{
        current_analysis, funnel, process, reload, seasonality, summary, ApiState, ProcessQuery,
        SeasonalityQuery,
    };
    use crate::config::Config;
    use crate::dataset::fetcher::{InlineSheet, SheetPair};
    use crate::dataset::schema::Stage;

    const CANDIDATES: &str = "\
Candidate ID Number,Application Source,Position Title,Candidate Type,Furthest Recruiting Stage Reached
A,Agency,UX Designer,Campus,Offer Accepted
B,Agency,IT Analyst,Experienced,Offer Declined
C,Referral,Account Executive,Experienced,New Application
";

    const ACTIVITY: &str = "\
Candidate ID Number,Stage Name,Date When Reached the Stage
A,New Application Date,2021-01-04
A,Phone Screen Date,2021-01-20
A,In-House Interview Date,2021-02-10
A,Offer Sent Date,2021-03-01
B,New Application Date,2021-01-18
B,Phone Screen Date,2021-02-01
B,In-House Interview Date,2021-03-15
B,Offer Sent Date,2021-05-03
C,New Application Date,2022-02-07
";

    fn state() -> ApiState {
        let sheets = SheetPair::new(
            Arc::new(InlineSheet::new("candidates", CANDIDATES)),
            Arc::new(InlineSheet::new("activity", ACTIVITY)),
        );
        ApiState::with_sheets(Config::default(), sheets)
    }

    #[test]
    fn serves_funnel_and_summary_from_one_load() {
        let state = state();
        let response = tokio_test::block_on(funnel(State(state.clone()))).expect("funnel");
        assert!(response.0.ok);
        assert_eq!(response.0.data.count(Stage::NewApplication), Some(3));
        assert_eq!(response.0.data.count(Stage::OfferAccepted), Some(1));

        let response = tokio_test::block_on(summary(State(state.clone()))).expect("summary");
        assert_eq!(response.0.data.offers_sent, 2);

        let stats = tokio_test::block_on(state.cache.lock()).stats();
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn process_rejects_unknown_group() {
        let query = ProcessQuery {
            by: Some("salary".to_string()),
        };
        let err = tokio_test::block_on(process(State(state()), Query(query)))
            .expect_err("bad group key");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let query = ProcessQuery {
            by: Some("role".to_string()),
        };
        let response = tokio_test::block_on(process(State(state()), Query(query))).expect("process");
        assert!(response.0.data.group("Tech").is_some());
    }

    #[test]
    fn seasonality_accepts_other_years() {
        let state = state();
        let latest = tokio_test::block_on(seasonality(
            State(state.clone()),
            Query(SeasonalityQuery::default()),
        ))
        .expect("latest");
        assert_eq!(latest.0.data.year, 2022);

        let earlier = tokio_test::block_on(seasonality(
            State(state.clone()),
            Query(SeasonalityQuery { year: Some(2021) }),
        ))
        .expect("2021");
        assert_eq!(earlier.0.data.volume_by_month(), vec![(1, 2)]);

        // Other years read the stored timeline of the single cached load.
        let analysis = tokio_test::block_on(current_analysis(&state)).expect("analysis");
        assert_eq!(analysis.timeline.len(), 3);
        assert_eq!(tokio_test::block_on(state.cache.lock()).stats().misses, 1);
    }

    #[test]
    fn reload_invalidates_cache() {
        let state = state();
        let first = tokio_test::block_on(funnel(State(state.clone()))).expect("funnel");
        assert!(first.0.ok);
        let response = tokio_test::block_on(reload(State(state))).expect("reload");
        assert_eq!(response.0.data.candidates, 3);
        assert_eq!(response.0.data.cache.invalidations, 1);
        assert_eq!(response.0.data.cache.misses, 2);
    }
}
