//! REST API endpoints for widget sessions

use actix_web::{HttpResponse, delete, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorResponse};
use crate::model::{
    AddressSuggestion, AnalysisResult, Condition, FeatureImpact, ImpactDirection, LocationZone,
    PropertyInput, PropertyType, SourceType,
};
use crate::service::SessionService;
use crate::service::dashboard::{
    ChartBar, Dashboard, FactorRow, MetricCard, ZoneDetail, ZoneExplorer, ZoneTier, ZoneTile,
};
use crate::service::progress::{ANALYSIS_PHASES, ProgressState};
use crate::service::session::{AddressLookup, LookupStatus, SessionFailure, SessionSnapshot};

/// Query parameters for submitting an analysis
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubmitParams {
    /// Block until the analysis finished instead of answering 202 right away
    #[serde(default)]
    pub wait: bool,
}

/// Query parameters for address autocomplete
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestParams {
    /// Current content of the address field
    pub q: String,
}

/// Phase labels and timing of the cosmetic progress indicator
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPhases {
    pub interval_ms: u64,
    pub phases: Vec<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session,
        get_session,
        submit_analysis,
        retry_analysis,
        get_dashboard,
        select_zone,
        suggest_addresses,
        select_suggestion,
        dismiss_suggestions,
        select_credential,
        progress_phases,
        property_defaults,
        crate::api::health::liveness,
        crate::api::health::readiness,
    ),
    components(schemas(
        SessionSnapshot,
        SessionFailure,
        AddressLookup,
        LookupStatus,
        AddressSuggestion,
        PropertyInput,
        PropertyType,
        Condition,
        AnalysisResult,
        FeatureImpact,
        ImpactDirection,
        LocationZone,
        SourceType,
        ProgressState,
        ProgressPhases,
        Dashboard,
        MetricCard,
        ChartBar,
        FactorRow,
        ZoneExplorer,
        ZoneTile,
        ZoneDetail,
        ZoneTier,
        ErrorResponse,
        crate::api::health::HealthStatus,
        crate::api::health::ReadinessStatus,
        crate::api::health::DependencyHealth,
    )),
    tags(
        (name = "sessions", description = "Rent potential widget sessions"),
        (name = "health", description = "Health check endpoints"),
    ),
    info(
        title = "Mietpotential API",
        description = "AI market-rent estimate, rent gap and location zones for the rent potential widget",
    )
)]
pub struct ApiDoc;

/// Open a new widget session
#[utoipa::path(
    post,
    path = "/v1/sessions",
    responses(
        (status = 201, description = "Session created", body = SessionSnapshot)
    ),
    tag = "sessions"
)]
#[post("/v1/sessions")]
pub async fn create_session(service: web::Data<SessionService>) -> HttpResponse {
    let snapshot = service.create().await;
    HttpResponse::Created().json(snapshot)
}

/// Get the current state of a session
///
/// While an analysis runs, the snapshot carries the current progress phase.
#[utoipa::path(
    get,
    path = "/v1/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[get("/v1/sessions/{id}")]
pub async fn get_session(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let snapshot = service.snapshot(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Submit the property form
///
/// Any previous result and error are discarded.
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/analysis",
    params(("id" = Uuid, Path, description = "Session ID"), SubmitParams),
    request_body = PropertyInput,
    responses(
        (status = 202, description = "Analysis started", body = SessionSnapshot),
        (status = 200, description = "Analysis finished (wait=true)", body = SessionSnapshot),
        (status = 400, description = "Invalid property input", body = ErrorResponse),
        (status = 401, description = "API key selection required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Analysis already running", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[post("/v1/sessions/{id}/analysis")]
pub async fn submit_analysis(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
    query: web::Query<SubmitParams>,
    body: web::Json<PropertyInput>,
) -> Result<HttpResponse, ApiError> {
    submit(service, path.into_inner(), query.wait, body.into_inner()).await
}

/// Resubmit the last form input after a failure
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/retry",
    params(("id" = Uuid, Path, description = "Session ID"), SubmitParams),
    responses(
        (status = 202, description = "Analysis restarted", body = SessionSnapshot),
        (status = 200, description = "Analysis finished (wait=true)", body = SessionSnapshot),
        (status = 400, description = "Nothing was submitted yet", body = ErrorResponse),
        (status = 401, description = "API key selection required", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Analysis already running", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[post("/v1/sessions/{id}/retry")]
pub async fn retry_analysis(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
    query: web::Query<SubmitParams>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let input = service.last_input(id).await?;
    submit(service, id, query.wait, input).await
}

async fn submit(
    service: web::Data<SessionService>,
    id: Uuid,
    wait: bool,
    input: PropertyInput,
) -> Result<HttpResponse, ApiError> {
    if wait {
        let snapshot = service.submit_and_wait(id, input).await?;
        Ok(HttpResponse::Ok().json(snapshot))
    } else {
        let snapshot = service.into_inner().submit(id, input).await?;
        Ok(HttpResponse::Accepted().json(snapshot))
    }
}

/// Dashboard view of the finished analysis
#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/dashboard",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Dashboard", body = Dashboard),
        (status = 404, description = "Session or result not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[get("/v1/sessions/{id}/dashboard")]
pub async fn get_dashboard(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let dashboard = service.dashboard(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}

/// Select a location zone in the zone explorer
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/zones/{zone_id}",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("zone_id" = String, Path, description = "Zone ID from the analysis result")
    ),
    responses(
        (status = 200, description = "Zone selected", body = SessionSnapshot),
        (status = 404, description = "Session, result or zone not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[post("/v1/sessions/{id}/zones/{zone_id}")]
pub async fn select_zone(
    service: web::Data<SessionService>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ApiError> {
    let (id, zone_id) = path.into_inner();
    let snapshot = service.select_zone(id, &zone_id).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Address autocomplete for one keystroke
///
/// Debounced; a lookup overtaken by a newer keystroke reports `superseded`.
#[utoipa::path(
    get,
    path = "/v1/sessions/{id}/address-suggestions",
    params(("id" = Uuid, Path, description = "Session ID"), SuggestParams),
    responses(
        (status = 200, description = "Lookup outcome", body = AddressLookup),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[get("/v1/sessions/{id}/address-suggestions")]
pub async fn suggest_addresses(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
    query: web::Query<SuggestParams>,
) -> Result<HttpResponse, ApiError> {
    let lookup = service.suggest_addresses(path.into_inner(), &query.q).await?;
    Ok(HttpResponse::Ok().json(lookup))
}

/// Take a suggestion into the address field
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/address-suggestions/{index}",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("index" = usize, Path, description = "Position in the current suggestion list")
    ),
    responses(
        (status = 200, description = "Suggestion selected", body = SessionSnapshot),
        (status = 400, description = "No suggestion at this index", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[post("/v1/sessions/{id}/address-suggestions/{index}")]
pub async fn select_suggestion(
    service: web::Data<SessionService>,
    path: web::Path<(Uuid, usize)>,
) -> Result<HttpResponse, ApiError> {
    let (id, index) = path.into_inner();
    let snapshot = service.select_suggestion(id, index).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Close the suggestion list
#[utoipa::path(
    delete,
    path = "/v1/sessions/{id}/address-suggestions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Suggestion list closed", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[delete("/v1/sessions/{id}/address-suggestions")]
pub async fn dismiss_suggestions(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let snapshot = service.dismiss_suggestions(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Run the key selection flow
#[utoipa::path(
    post,
    path = "/v1/sessions/{id}/credentials",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Key selected", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 502, description = "Key selection failed", body = ErrorResponse)
    ),
    tag = "sessions"
)]
#[post("/v1/sessions/{id}/credentials")]
pub async fn select_credential(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let snapshot = service.select_credential(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Labels of the progress phases
#[utoipa::path(
    get,
    path = "/v1/progress/phases",
    responses(
        (status = 200, description = "Progress phases", body = ProgressPhases)
    ),
    tag = "sessions"
)]
#[get("/v1/progress/phases")]
pub async fn progress_phases(service: web::Data<SessionService>) -> HttpResponse {
    let interval_ms = u64::try_from(service.progress().interval().as_millis()).unwrap_or(u64::MAX);
    HttpResponse::Ok().json(ProgressPhases {
        interval_ms,
        phases: ANALYSIS_PHASES.iter().map(|p| p.to_string()).collect(),
    })
}

/// Initial values of the property form
#[utoipa::path(
    get,
    path = "/v1/property-defaults",
    responses(
        (status = 200, description = "Form defaults", body = PropertyInput)
    ),
    tag = "sessions"
)]
#[get("/v1/property-defaults")]
pub async fn property_defaults() -> HttpResponse {
    HttpResponse::Ok().json(PropertyInput::default())
}

/// Configure session routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_session)
        .service(get_session)
        .service(submit_analysis)
        .service(retry_analysis)
        .service(get_dashboard)
        .service(select_zone)
        .service(suggest_addresses)
        .service(select_suggestion)
        .service(dismiss_suggestions)
        .service(select_credential)
        .service(progress_phases)
        .service(property_defaults);
}
