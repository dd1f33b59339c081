//! Visitor sessions for the widget
//!
//! A session holds the transient state of one visitor: credential flag,
//! address autocomplete, the running or finished analysis and the zone
//! selection. Nothing is persisted; sessions live in memory until they expire.
//!
//! Only one analysis can run per session. A new submission discards the
//! previous result and error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::{AddressSuggestion, AnalysisResult, Config, PropertyInput};
use crate::service::analysis::{AnalysisError, AnalysisService, classify_failure};
use crate::service::credentials::{CredentialError, CredentialProvider};
use crate::service::dashboard::{Dashboard, build_dashboard, default_zone_selection};
use crate::service::geocoding::AddressGeocoder;
use crate::service::progress::{ProgressIndicator, ProgressState};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("An analysis is already running for this session")]
    Busy,

    #[error("No API key selected")]
    CredentialRequired,

    #[error("Invalid property input: {0}")]
    InvalidInput(String),

    #[error("Nothing to retry: no analysis was submitted yet")]
    NothingToRetry,

    #[error("No analysis result available")]
    NoResult,

    #[error("Unknown zone: {0}")]
    UnknownZone(String),

    #[error("No address suggestion at index {0}")]
    SuggestionOutOfRange(usize),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Classified failure of the last submission
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    /// Query below the minimum length, list cleared
    TooShort,
    /// A newer keystroke arrived before or during the lookup
    Superseded,
    Completed,
    /// Geocoder failed, previous list kept
    Failed,
}

/// Result of one debounced address lookup
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressLookup {
    pub status: LookupStatus,
    pub suggestions: Vec<AddressSuggestion>,
    pub open: bool,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    /// `None` until the host answered, `Some(false)` when a key must be selected
    pub has_key: Option<bool>,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressState>,
    pub address: String,
    pub searching_address: bool,
    pub suggestions: Vec<AddressSuggestion>,
    pub suggestions_open: bool,
    pub input: Option<PropertyInput>,
    pub result: Option<AnalysisResult>,
    pub error: Option<SessionFailure>,
    pub selected_zone: Option<String>,
}

#[derive(Debug)]
struct SessionState {
    has_key: Option<bool>,
    address: String,
    suggestions: Vec<AddressSuggestion>,
    suggestions_open: bool,
    /// Generation of the lookup currently waiting on the geocoder
    searching_generation: Option<u64>,
    lookup_generation: u64,
    loading_since: Option<Instant>,
    input: Option<PropertyInput>,
    result: Option<AnalysisResult>,
    error: Option<SessionFailure>,
    selected_zone: Option<String>,
    last_seen: DateTime<Utc>,
}

impl SessionState {
    fn new(has_key: Option<bool>) -> Self {
        Self {
            has_key,
            address: String::new(),
            suggestions: Vec::new(),
            suggestions_open: false,
            searching_generation: None,
            lookup_generation: 0,
            loading_since: None,
            input: None,
            result: None,
            error: None,
            selected_zone: None,
            last_seen: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    fn is_loading(&self) -> bool {
        self.loading_since.is_some()
    }

    fn snapshot(&self, id: Uuid, progress: &ProgressIndicator) -> SessionSnapshot {
        SessionSnapshot {
            id,
            has_key: self.has_key,
            is_loading: self.is_loading(),
            progress: self
                .loading_since
                .map(|since| progress.state_at(since.elapsed())),
            address: self.address.clone(),
            searching_address: self.searching_generation.is_some(),
            suggestions: self.suggestions.clone(),
            suggestions_open: self.suggestions_open,
            input: self.input.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            selected_zone: self.selected_zone.clone(),
        }
    }
}

type SharedState = Arc<Mutex<SessionState>>;

/// Session store plus the services a session drives
pub struct SessionService {
    sessions: RwLock<HashMap<Uuid, SharedState>>,
    analysis: Arc<AnalysisService>,
    geocoder: Arc<dyn AddressGeocoder>,
    credentials: Arc<dyn CredentialProvider>,
    progress: ProgressIndicator,
    debounce: Duration,
    min_query_length: usize,
    ttl: TimeDelta,
}

impl SessionService {
    pub fn new(
        analysis: Arc<AnalysisService>,
        geocoder: Arc<dyn AddressGeocoder>,
        credentials: Arc<dyn CredentialProvider>,
        config: &Config,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            analysis,
            geocoder,
            credentials,
            progress: ProgressIndicator::new(config.widget.progress_interval()),
            debounce: config.geocoding.debounce(),
            min_query_length: config.geocoding.min_query_length,
            // Out-of-range values are rejected at startup; never expire otherwise
            ttl: config.widget.session_ttl().unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn progress(&self) -> &ProgressIndicator {
        &self.progress
    }

    /// Open a new session, asking the host whether a key is selected
    pub async fn create(&self) -> SessionSnapshot {
        self.prune_expired().await;

        let has_key = match self.credentials.has_selected_api_key().await {
            Ok(selected) => selected,
            Err(e) => {
                tracing::warn!(error = %e, "Credential check failed, asking for key selection");
                false
            }
        };

        let id = Uuid::new_v4();
        let state = SessionState::new(Some(has_key));
        let snapshot = state.snapshot(id, &self.progress);

        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(state)));

        tracing::info!(session = %id, has_key = has_key, "Session created");
        snapshot
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let state = self.session(id).await?;
        let mut guard = state.lock().await;
        guard.touch();
        Ok(guard.snapshot(id, &self.progress))
    }

    /// Start an analysis in the background and return immediately
    pub async fn submit(
        self: &Arc<Self>,
        id: Uuid,
        input: PropertyInput,
    ) -> Result<SessionSnapshot, SessionError> {
        let (state, snapshot) = self.begin_submission(id, input.clone()).await?;
        tokio::spawn(Arc::clone(self).run_analysis(id, state, input));
        Ok(snapshot)
    }

    /// Run an analysis and wait for its outcome
    ///
    /// The analysis runs in its own task, so a caller that stops waiting
    /// does not leave the session loading.
    pub async fn submit_and_wait(
        self: &Arc<Self>,
        id: Uuid,
        input: PropertyInput,
    ) -> Result<SessionSnapshot, SessionError> {
        let (state, _) = self.begin_submission(id, input.clone()).await?;

        let task = tokio::spawn(Arc::clone(self).run_analysis(id, Arc::clone(&state), input));
        match task.await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Analysis task failed");
                let mut guard = state.lock().await;
                guard.loading_since = None;
                let kind = classify_failure("");
                guard.error = Some(SessionFailure {
                    code: kind.code().to_string(),
                    message: kind.user_message().to_string(),
                });
                Err(SessionError::TaskFailed(e.to_string()))
            }
        }
    }

    async fn run_analysis(
        self: Arc<Self>,
        id: Uuid,
        state: SharedState,
        input: PropertyInput,
    ) -> SessionSnapshot {
        let outcome = self.analysis.analyze(&input).await;
        self.finish_submission(id, &state, outcome).await
    }

    /// The input of the last submission, for resubmitting after an error
    pub async fn last_input(&self, id: Uuid) -> Result<PropertyInput, SessionError> {
        let state = self.session(id).await?;
        let guard = state.lock().await;
        guard.input.clone().ok_or(SessionError::NothingToRetry)
    }

    async fn begin_submission(
        &self,
        id: Uuid,
        input: PropertyInput,
    ) -> Result<(SharedState, SessionSnapshot), SessionError> {
        let state = self.session(id).await?;

        let problems = input.validate();
        if !problems.is_empty() {
            return Err(SessionError::InvalidInput(problems.join("; ")));
        }

        let mut guard = state.lock().await;
        guard.touch();

        if guard.is_loading() {
            return Err(SessionError::Busy);
        }
        if guard.has_key == Some(false) {
            return Err(SessionError::CredentialRequired);
        }

        guard.loading_since = Some(Instant::now());
        guard.error = None;
        guard.result = None;
        guard.selected_zone = None;
        guard.input = Some(input);

        tracing::info!(session = %id, "Analysis submitted");

        let snapshot = guard.snapshot(id, &self.progress);
        drop(guard);
        Ok((state, snapshot))
    }

    async fn finish_submission(
        &self,
        id: Uuid,
        state: &SharedState,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> SessionSnapshot {
        let mut guard = state.lock().await;
        guard.loading_since = None;

        match outcome {
            Ok(result) => {
                guard.selected_zone = default_zone_selection(&result.location_zones);
                guard.result = Some(result);
                tracing::info!(session = %id, "Analysis completed");
            }
            Err(e) => {
                let kind = classify_failure(&e.to_string());
                if kind.requires_credential() {
                    guard.has_key = Some(false);
                }
                tracing::warn!(
                    session = %id,
                    error = %e,
                    failure = kind.code(),
                    "Analysis failed"
                );
                guard.error = Some(SessionFailure {
                    code: kind.code().to_string(),
                    message: kind.user_message().to_string(),
                });
            }
        }

        guard.snapshot(id, &self.progress)
    }

    /// Debounced address autocomplete for one keystroke
    ///
    /// Stale answers from superseded lookups are discarded. The lookup runs
    /// in its own task, so a caller that stops waiting cannot leave the
    /// session marked as searching.
    pub async fn suggest_addresses(
        self: &Arc<Self>,
        id: Uuid,
        query: &str,
    ) -> Result<AddressLookup, SessionError> {
        let state = self.session(id).await?;

        let generation = {
            let mut guard = state.lock().await;
            guard.touch();
            guard.address = query.to_string();
            guard.lookup_generation += 1;

            if query.chars().count() < self.min_query_length {
                guard.suggestions.clear();
                guard.suggestions_open = false;
                guard.searching_generation = None;
                return Ok(AddressLookup {
                    status: LookupStatus::TooShort,
                    suggestions: Vec::new(),
                    open: false,
                });
            }

            guard.lookup_generation
        };

        let task = tokio::spawn(Arc::clone(self).run_lookup(
            id,
            Arc::clone(&state),
            generation,
            query.to_string(),
        ));

        match task.await {
            Ok(lookup) => Ok(lookup),
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Address lookup task failed");
                let mut guard = state.lock().await;
                if guard.searching_generation == Some(generation) {
                    guard.searching_generation = None;
                }
                Err(SessionError::TaskFailed(e.to_string()))
            }
        }
    }

    async fn run_lookup(
        self: Arc<Self>,
        id: Uuid,
        state: SharedState,
        generation: u64,
        query: String,
    ) -> AddressLookup {
        tokio::time::sleep(self.debounce).await;

        {
            let mut guard = state.lock().await;
            if guard.lookup_generation != generation {
                return superseded(&guard);
            }
            guard.searching_generation = Some(generation);
        }

        let outcome = self.geocoder.suggest(&query).await;

        let mut guard = state.lock().await;
        // Only the lookup that set the flag may clear it
        if guard.searching_generation == Some(generation) {
            guard.searching_generation = None;
        }
        if guard.lookup_generation != generation {
            tracing::debug!(session = %id, query = %query, "Discarding stale address suggestions");
            return superseded(&guard);
        }

        match outcome {
            Ok(suggestions) => {
                guard.suggestions_open = !suggestions.is_empty();
                guard.suggestions = suggestions;
                AddressLookup {
                    status: LookupStatus::Completed,
                    suggestions: guard.suggestions.clone(),
                    open: guard.suggestions_open,
                }
            }
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Address lookup failed");
                AddressLookup {
                    status: LookupStatus::Failed,
                    suggestions: guard.suggestions.clone(),
                    open: guard.suggestions_open,
                }
            }
        }
    }

    /// Take a suggestion into the address field and close the list
    pub async fn select_suggestion(
        &self,
        id: Uuid,
        index: usize,
    ) -> Result<SessionSnapshot, SessionError> {
        let state = self.session(id).await?;
        let mut guard = state.lock().await;
        guard.touch();

        let label = guard
            .suggestions
            .get(index)
            .map(|s| s.label.clone())
            .ok_or(SessionError::SuggestionOutOfRange(index))?;

        guard.address = label;
        guard.suggestions.clear();
        guard.suggestions_open = false;
        // A lookup still in flight must not reopen the list
        guard.lookup_generation += 1;
        guard.searching_generation = None;

        Ok(guard.snapshot(id, &self.progress))
    }

    /// Close the suggestion list without selecting (click outside)
    pub async fn dismiss_suggestions(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let state = self.session(id).await?;
        let mut guard = state.lock().await;
        guard.touch();
        guard.suggestions_open = false;
        Ok(guard.snapshot(id, &self.progress))
    }

    /// Run the host's key selection flow
    pub async fn select_credential(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let state = self.session(id).await?;

        if let Err(e) = self.credentials.open_select_key().await {
            tracing::error!(session = %id, error = %e, "Key selection failed");
            return Err(e.into());
        }

        let mut guard = state.lock().await;
        guard.touch();
        guard.has_key = Some(true);
        Ok(guard.snapshot(id, &self.progress))
    }

    pub async fn select_zone(
        &self,
        id: Uuid,
        zone_id: &str,
    ) -> Result<SessionSnapshot, SessionError> {
        let state = self.session(id).await?;
        let mut guard = state.lock().await;
        guard.touch();

        let known = guard
            .result
            .as_ref()
            .ok_or(SessionError::NoResult)?
            .location_zones
            .iter()
            .any(|z| z.id == zone_id);
        if !known {
            return Err(SessionError::UnknownZone(zone_id.to_string()));
        }

        guard.selected_zone = Some(zone_id.to_string());
        Ok(guard.snapshot(id, &self.progress))
    }

    pub async fn dashboard(&self, id: Uuid) -> Result<Dashboard, SessionError> {
        let state = self.session(id).await?;
        let mut guard = state.lock().await;
        guard.touch();

        match (&guard.result, &guard.input) {
            (Some(result), Some(input)) => Ok(build_dashboard(
                result,
                input,
                guard.selected_zone.as_deref(),
            )),
            _ => Err(SessionError::NoResult),
        }
    }

    async fn session(&self, id: Uuid) -> Result<SharedState, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Drop idle sessions; sessions with a running analysis are kept
    async fn prune_expired(&self) {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.ttl) else {
            return;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        let mut expired = Vec::new();
        for (id, state) in sessions.iter() {
            let guard = state.lock().await;
            if !guard.is_loading() && guard.last_seen < cutoff {
                expired.push(*id);
            }
        }
        for id in &expired {
            sessions.remove(id);
        }

        if !expired.is_empty() {
            tracing::debug!(
                removed = expired.len(),
                remaining = before - expired.len(),
                "Pruned idle sessions"
            );
        }
    }
}

fn superseded(state: &SessionState) -> AddressLookup {
    AddressLookup {
        status: LookupStatus::Superseded,
        suggestions: state.suggestions.clone(),
        open: state.suggestions_open,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::service::analysis::testing::ScriptedModel;
    use crate::service::geocoding::GeocodingError;
    use crate::service::llm::{GenerationRequest, GenerativeModel, LlmError};

    pub struct FakeCredentials {
        pub selected: AtomicBool,
        pub selectable: bool,
    }

    #[async_trait]
    impl CredentialProvider for FakeCredentials {
        async fn has_selected_api_key(&self) -> Result<bool, CredentialError> {
            Ok(self.selected.load(Ordering::SeqCst))
        }

        async fn open_select_key(&self) -> Result<(), CredentialError> {
            if self.selectable {
                self.selected.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                Err(CredentialError::SelectionFailed("dialog closed".to_string()))
            }
        }

        async fn api_key(&self) -> Option<String> {
            self.selected
                .load(Ordering::SeqCst)
                .then(|| "test-key".to_string())
        }
    }

    /// Geocoder returning one suggestion per call, echoing the query
    pub struct EchoGeocoder {
        pub calls: AtomicUsize,
        pub fail: bool,
        pub delay: Duration,
    }

    #[async_trait]
    impl AddressGeocoder for EchoGeocoder {
        async fn suggest(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeocodingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(GeocodingError::ParseError("Unexpected status 503".to_string()));
            }
            Ok(vec![AddressSuggestion::from_parts(
                Some(query.to_string()),
                Some("5".to_string()),
                Some("10115".to_string()),
                Some("Berlin".to_string()),
            )])
        }
    }

    /// Model answering after a delay
    pub struct DelayedModel {
        pub inner: ScriptedModel,
        pub delay: Duration,
    }

    #[async_trait]
    impl GenerativeModel for DelayedModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            tokio::time::sleep(self.delay).await;
            self.inner.generate(request).await
        }
    }

    pub fn service_with(
        model: Arc<dyn GenerativeModel>,
        has_key: bool,
        geocoder_fails: bool,
    ) -> (Arc<SessionService>, Arc<EchoGeocoder>) {
        build_service(model, has_key, geocoder_fails, Duration::ZERO)
    }

    pub fn slow_geocoder_service(delay: Duration) -> (Arc<SessionService>, Arc<EchoGeocoder>) {
        build_service(Arc::new(ScriptedModel::answering("{}")), true, false, delay)
    }

    fn build_service(
        model: Arc<dyn GenerativeModel>,
        has_key: bool,
        geocoder_fails: bool,
        geocoder_delay: Duration,
    ) -> (Arc<SessionService>, Arc<EchoGeocoder>) {
        let config = Config::default();
        let analysis = Arc::new(AnalysisService::new(model, &config.gemini));
        let geocoder = Arc::new(EchoGeocoder {
            calls: AtomicUsize::new(0),
            fail: geocoder_fails,
            delay: geocoder_delay,
        });
        let credentials = Arc::new(FakeCredentials {
            selected: AtomicBool::new(has_key),
            selectable: true,
        });
        let service = Arc::new(SessionService::new(
            analysis,
            geocoder.clone(),
            credentials,
            &config,
        ));
        (service, geocoder)
    }

    pub fn answering_service(answer: &str) -> Arc<SessionService> {
        service_with(Arc::new(ScriptedModel::answering(answer)), true, false).0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::*;
    use super::*;
    use crate::service::analysis::testing::{SAMPLE_ANSWER, ScriptedModel};

    fn input() -> PropertyInput {
        PropertyInput {
            address: "Hauptstraße, 5, 10115, Berlin".to_string(),
            ..PropertyInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_reports_credential_state() {
        let (with_key, _) = service_with(Arc::new(ScriptedModel::answering("{}")), true, false);
        assert_eq!(with_key.create().await.has_key, Some(true));

        let (without_key, _) =
            service_with(Arc::new(ScriptedModel::answering("{}")), false, false);
        let snapshot = without_key.create().await;
        assert_eq!(snapshot.has_key, Some(false));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let service = answering_service(SAMPLE_ANSWER);
        let err = service.snapshot(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_submission_produces_result_and_zone_selection() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;

        let snapshot = service.submit_and_wait(id, input()).await.unwrap();

        assert!(!snapshot.is_loading);
        assert!(snapshot.progress.is_none());
        assert!(snapshot.error.is_none());
        let result = snapshot.result.unwrap();
        assert_eq!(result.potential_yearly_gain, 2880.0);
        assert_eq!(snapshot.selected_zone.as_deref(), Some("zone-mittel"));

        let dashboard = service.dashboard(id).await.unwrap();
        assert_eq!(dashboard.zone_explorer.unwrap().city_name, "Berlin");
    }

    #[tokio::test]
    async fn test_second_submission_while_loading_is_rejected() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;

        let (_, snapshot) = service.begin_submission(id, input()).await.unwrap();
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.progress.unwrap().phase, 0);

        let err = service.begin_submission(id, input()).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));
    }

    #[tokio::test]
    async fn test_new_submission_discards_previous_result() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;
        service.submit_and_wait(id, input()).await.unwrap();

        let (_, snapshot) = service.begin_submission(id, input()).await.unwrap();
        assert!(snapshot.result.is_none());
        assert!(snapshot.selected_zone.is_none());
        assert!(matches!(
            service.dashboard(id).await,
            Err(SessionError::NoResult)
        ));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_loading() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;

        let err = service
            .submit_and_wait(id, PropertyInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert!(!service.snapshot(id).await.unwrap().is_loading);
    }

    #[tokio::test]
    async fn test_overload_is_reported_as_retryable() {
        let (service, _) = service_with(
            Arc::new(ScriptedModel::failing(500, "backend error")),
            true,
            false,
        );
        let id = service.create().await.id;

        let snapshot = service.submit_and_wait(id, input()).await.unwrap();
        let error = snapshot.error.unwrap();
        assert_eq!(error.code, "overloaded");
        assert!(error.message.contains("überlastet"));
        assert_eq!(snapshot.has_key, Some(true));

        // Retry resubmits the same input
        assert_eq!(service.last_input(id).await.unwrap(), input());
    }

    #[tokio::test]
    async fn test_invalid_key_flips_credential_state() {
        let (service, _) = service_with(
            Arc::new(ScriptedModel::failing(400, "API key not valid. Please pass a valid API key.")),
            true,
            false,
        );
        let id = service.create().await.id;

        let snapshot = service.submit_and_wait(id, input()).await.unwrap();
        assert_eq!(snapshot.has_key, Some(false));
        assert_eq!(snapshot.error.unwrap().code, "invalid_credential");

        let err = service.submit_and_wait(id, input()).await.unwrap_err();
        assert!(matches!(err, SessionError::CredentialRequired));

        let snapshot = service.select_credential(id).await.unwrap();
        assert_eq!(snapshot.has_key, Some(true));
    }

    #[tokio::test]
    async fn test_unparseable_answer_surfaces_conversion_message() {
        let service = answering_service("Ich kann das leider nicht beurteilen.");
        let id = service.create().await.id;

        let error = service
            .submit_and_wait(id, input())
            .await
            .unwrap()
            .error
            .unwrap();
        assert_eq!(error.code, "analysis_failed");
        assert_eq!(
            error.message,
            "Die Datenanalyse konnte nicht in ein lesbares Format umgewandelt werden."
        );
    }

    #[tokio::test]
    async fn test_retry_without_submission() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;
        assert!(matches!(
            service.last_input(id).await,
            Err(SessionError::NothingToRetry)
        ));
    }

    #[tokio::test]
    async fn test_select_zone() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;

        assert!(matches!(
            service.select_zone(id, "zone-gut").await,
            Err(SessionError::NoResult)
        ));

        service.submit_and_wait(id, input()).await.unwrap();
        let snapshot = service.select_zone(id, "zone-gut").await.unwrap();
        assert_eq!(snapshot.selected_zone.as_deref(), Some("zone-gut"));

        assert!(matches!(
            service.select_zone(id, "zone-9").await,
            Err(SessionError::UnknownZone(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_clears_without_lookup() {
        let (service, geocoder) =
            service_with(Arc::new(ScriptedModel::answering("{}")), true, false);
        let id = service.create().await.id;

        let lookup = service.suggest_addresses(id, "Hau").await.unwrap();
        assert_eq!(lookup.status, LookupStatus::TooShort);
        assert!(lookup.suggestions.is_empty());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_then_select_suggestion() {
        let (service, geocoder) =
            service_with(Arc::new(ScriptedModel::answering("{}")), true, false);
        let id = service.create().await.id;

        let lookup = service.suggest_addresses(id, "Hauptstraße").await.unwrap();
        assert_eq!(lookup.status, LookupStatus::Completed);
        assert!(lookup.open);
        assert_eq!(lookup.suggestions[0].label, "Hauptstraße, 5, 10115, Berlin");
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

        let snapshot = service.select_suggestion(id, 0).await.unwrap();
        assert_eq!(snapshot.address, "Hauptstraße, 5, 10115, Berlin");
        assert!(snapshot.suggestions.is_empty());
        assert!(!snapshot.suggestions_open);

        assert!(matches!(
            service.select_suggestion(id, 0).await,
            Err(SessionError::SuggestionOutOfRange(0))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_keystrokes_only_look_up_the_last_query() {
        let (service, geocoder) =
            service_with(Arc::new(ScriptedModel::answering("{}")), true, false);
        let id = service.create().await.id;

        let (first, second) = tokio::join!(
            service.suggest_addresses(id, "Haupts"),
            service.suggest_addresses(id, "Hauptstr")
        );

        assert_eq!(first.unwrap().status, LookupStatus::Superseded);
        let second = second.unwrap();
        assert_eq!(second.status, LookupStatus::Completed);
        assert_eq!(second.suggestions[0].street.as_deref(), Some("Hauptstr"));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_keeps_previous_list() {
        let (service, _) = service_with(Arc::new(ScriptedModel::answering("{}")), true, true);
        let id = service.create().await.id;

        let lookup = service.suggest_addresses(id, "Hauptstraße").await.unwrap();
        assert_eq!(lookup.status, LookupStatus::Failed);
        assert!(!service.snapshot(id).await.unwrap().searching_address);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_closes_list() {
        let (service, _) = service_with(Arc::new(ScriptedModel::answering("{}")), true, false);
        let id = service.create().await.id;

        service.suggest_addresses(id, "Hauptstraße").await.unwrap();
        let snapshot = service.dismiss_suggestions(id).await.unwrap();
        assert!(!snapshot.suggestions_open);
        assert_eq!(snapshot.suggestions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_advances_while_loading() {
        let service = answering_service(SAMPLE_ANSWER);
        let id = service.create().await.id;
        service.begin_submission(id, input()).await.unwrap();

        tokio::time::advance(Duration::from_millis(3100)).await;
        let progress = service.snapshot(id).await.unwrap().progress.unwrap();
        assert_eq!(progress.phase, 2);
        assert_eq!(progress.label, "Bodenrichtwerte...");
    }

    #[tokio::test]
    async fn test_idle_sessions_are_pruned() {
        let service = answering_service(SAMPLE_ANSWER);
        let old = service.create().await.id;

        {
            let state = service.session(old).await.unwrap();
            state.lock().await.last_seen = Utc::now() - chrono::Duration::hours(3);
        }

        let fresh = service.create().await.id;
        assert_eq!(service.sessions.read().await.len(), 1);
        assert!(service.snapshot(fresh).await.is_ok());
        assert!(matches!(
            service.snapshot(old).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_still_completes_the_analysis() {
        let model = Arc::new(DelayedModel {
            inner: ScriptedModel::answering(SAMPLE_ANSWER),
            delay: Duration::from_secs(30),
        });
        let (service, _) = service_with(model, true, false);
        let id = service.create().await.id;

        let waited = tokio::time::timeout(
            Duration::from_millis(100),
            service.submit_and_wait(id, input()),
        )
        .await;
        assert!(waited.is_err());
        assert!(service.snapshot(id).await.unwrap().is_loading);

        tokio::time::sleep(Duration::from_secs(31)).await;

        let snapshot = service.snapshot(id).await.unwrap();
        assert!(!snapshot.is_loading);
        assert!(snapshot.result.is_some());

        let (_, resubmitted) = service.begin_submission(id, input()).await.unwrap();
        assert!(resubmitted.is_loading);
    }

    #[tokio::test]
    async fn test_unknown_session_wins_over_invalid_input() {
        let service = answering_service(SAMPLE_ANSWER);
        let err = service
            .submit_and_wait(Uuid::new_v4(), PropertyInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shortened_query_during_lookup_clears_searching_flag() {
        let (service, geocoder) = slow_geocoder_service(Duration::from_secs(5));
        let id = service.create().await.id;

        let (first, short) = tokio::join!(service.suggest_addresses(id, "Hauptstraße"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(service.snapshot(id).await.unwrap().searching_address);
            service.suggest_addresses(id, "Ha").await
        });

        assert_eq!(short.unwrap().status, LookupStatus::TooShort);
        assert_eq!(first.unwrap().status, LookupStatus::Superseded);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

        let snapshot = service.snapshot(id).await.unwrap();
        assert!(!snapshot.searching_address);
        assert!(snapshot.suggestions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_lookup_keeps_searching_flag() {
        let (service, _) = slow_geocoder_service(Duration::from_secs(5));
        let id = service.create().await.id;

        let (first, second) = tokio::join!(service.suggest_addresses(id, "Hauptstraße"), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let pending = service.suggest_addresses(id, "Hauptstraße 5");
            tokio::pin!(pending);
            // Let the first lookup come back while the second one waits on the geocoder
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(4500)) => {}
                _ = &mut pending => panic!("second lookup finished too early"),
            }
            assert!(service.snapshot(id).await.unwrap().searching_address);
            pending.await
        });

        assert_eq!(first.unwrap().status, LookupStatus::Superseded);
        assert_eq!(second.unwrap().status, LookupStatus::Completed);
        assert!(!service.snapshot(id).await.unwrap().searching_address);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_lookup_does_not_stay_searching() {
        let (service, _) = slow_geocoder_service(Duration::from_secs(5));
        let id = service.create().await.id;

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            service.suggest_addresses(id, "Hauptstraße"),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = service.snapshot(id).await.unwrap();
        assert!(!snapshot.searching_address);
        assert_eq!(snapshot.suggestions.len(), 1);
    }
}
