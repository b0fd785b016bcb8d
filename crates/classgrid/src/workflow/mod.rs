//! Incremental course -> section selection, the single writer of the schedule.
//!
//! Flow: query -> debounced course search -> course chosen -> sections lookup
//! -> section chosen -> commit. Lookups run as spawned tokio tasks; each one is
//! stamped with a [`Ticket`] and its response is applied only while that ticket
//! is still the latest for its lookup.

mod sequence;

pub use sequence::{RequestCounter, Ticket};

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::CatalogClient;
use crate::error::WorkflowError;
use crate::schedule::Schedule;
use crate::types::{CourseResult, Section};

/// Tuning for the selection workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Quiet period before a search is issued
    pub debounce_ms: u64,
    /// Shorter queries never reach the catalog
    pub min_query_len: usize,
}

impl WorkflowConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_query_len: 2,
        }
    }
}

/// Where the current "add class" operation stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Searching,
    CourseChosen,
    SectionsLoading,
    SectionChosen,
    Committing,
}

/// Everything a view needs to draw the selection form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowSnapshot {
    pub phase: Phase,
    pub query: String,
    pub results: Vec<CourseResult>,
    pub chosen_course: Option<CourseResult>,
    pub sections: Vec<Section>,
    pub chosen_section: Option<Section>,
    /// Message from the last failed lookup, cleared by the next success
    pub last_failure: Option<String>,
}

#[derive(Default)]
struct WorkflowState {
    view: WorkflowSnapshot,
    search: RequestCounter,
    sections: RequestCounter,
}

impl WorkflowState {
    fn forget_course(&mut self) {
        self.view.chosen_course = None;
        self.view.chosen_section = None;
        self.view.sections.clear();
        self.sections.invalidate();
    }
}

fn lock(state: &Mutex<WorkflowState>) -> MutexGuard<'_, WorkflowState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SelectionWorkflow {
    catalog: Arc<dyn CatalogClient>,
    config: WorkflowConfig,
    state: Arc<Mutex<WorkflowState>>,
    schedule_tx: watch::Sender<Arc<Schedule>>,
}

impl SelectionWorkflow {
    pub fn new(catalog: Arc<dyn CatalogClient>, config: WorkflowConfig) -> Self {
        Self::with_schedule(catalog, config, Schedule::new())
    }

    /// Starts from a previously persisted schedule.
    pub fn with_schedule(
        catalog: Arc<dyn CatalogClient>,
        config: WorkflowConfig,
        schedule: Schedule,
    ) -> Self {
        let (schedule_tx, _) = watch::channel(Arc::new(schedule));
        Self {
            catalog,
            config,
            state: Arc::new(Mutex::new(WorkflowState::default())),
            schedule_tx,
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        lock(&self.state).view.clone()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).view.phase
    }

    /// The committed schedule as of now.
    pub fn schedule(&self) -> Arc<Schedule> {
        self.schedule_tx.borrow().clone()
    }

    /// Receives a fresh snapshot after every schedule change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Schedule>> {
        self.schedule_tx.subscribe()
    }

    /// Sets the search text and, when warranted, schedules a debounced lookup.
    ///
    /// Must be called from within a tokio runtime.
    pub fn update_query(&self, text: impl Into<String>) {
        let text = text.into();
        let mut state = lock(&self.state);
        state.view.query = text.clone();

        if let Some(course) = &state.view.chosen_course {
            // Echo of the auto-filled course id
            if course.id == text {
                return;
            }
            debug!(course_id = %course.id, "Query edited away from chosen course");
            state.forget_course();
        }
        state.view.phase = Phase::Searching;

        if text.chars().count() < self.config.min_query_len {
            state.search.invalidate();
            state.view.results.clear();
            return;
        }

        let ticket = state.search.issue();
        drop(state);

        debug!(query = %text, ticket = %ticket, "Search scheduled");
        tokio::spawn(run_search(
            self.catalog.clone(),
            self.state.clone(),
            self.config.debounce(),
            ticket,
            text,
        ));
    }

    /// Picks a course from the search results and loads its sections.
    pub fn choose_course(&self, course: CourseResult) {
        let mut state = lock(&self.state);
        let changed = state
            .view
            .chosen_course
            .as_ref()
            .map_or(true, |current| current.id != course.id);

        state.search.invalidate();
        state.view.results.clear();
        state.view.query = course.id.clone();
        state.view.chosen_section = None;
        state.view.chosen_course = Some(course.clone());
        state.view.phase = Phase::CourseChosen;

        info!(course_id = %course.id, "Course chosen");

        // Sections follow the chosen course identity
        if changed {
            state.view.sections.clear();
            self.load_sections(state, course.id);
        }
    }

    /// Re-issues the sections lookup for the chosen course.
    ///
    /// Returns false when no course is chosen.
    pub fn reload_sections(&self) -> bool {
        let state = lock(&self.state);
        let course_id = state.view.chosen_course.as_ref().map(|c| c.id.clone());
        match course_id {
            Some(course_id) => {
                self.load_sections(state, course_id);
                true
            }
            None => false,
        }
    }

    fn load_sections(&self, mut state: MutexGuard<'_, WorkflowState>, course_id: String) {
        let ticket = state.sections.issue();
        state.view.phase = Phase::SectionsLoading;
        drop(state);

        debug!(course_id = %course_id, ticket = %ticket, "Sections lookup issued");
        tokio::spawn(run_sections_lookup(
            self.catalog.clone(),
            self.state.clone(),
            ticket,
            course_id,
        ));
    }

    /// Drops the chosen course and starts a fresh search. The schedule is untouched.
    pub fn clear_course(&self) {
        let mut state = lock(&self.state);
        state.forget_course();
        state.search.invalidate();
        state.view.query.clear();
        state.view.results.clear();
        state.view.phase = Phase::Searching;
    }

    /// Records `section` as the pending candidate for [`commit`](Self::commit).
    pub fn choose_section(&self, section: Section) {
        let mut state = lock(&self.state);
        debug!(section_id = %section.id, "Section chosen");
        state.view.chosen_section = Some(section);
        state.view.phase = Phase::SectionChosen;
    }

    /// Picks a section from the loaded list by id.
    pub fn choose_section_by_id(&self, section_id: &str) -> Result<(), WorkflowError> {
        let section = lock(&self.state)
            .view
            .sections
            .iter()
            .find(|s| s.id == section_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownSection {
                section_id: section_id.to_string(),
            })?;
        self.choose_section(section);
        Ok(())
    }

    /// Adds the pending section to the schedule and resets to [`Phase::Idle`].
    ///
    /// A section id already in the schedule is rejected and nothing changes.
    pub fn commit(&self) -> Result<Arc<Schedule>, WorkflowError> {
        let mut state = lock(&self.state);
        let section = state
            .view
            .chosen_section
            .clone()
            .ok_or(WorkflowError::NoSectionChosen)?;

        let previous_phase = state.view.phase;
        state.view.phase = Phase::Committing;

        let current = self.schedule();
        let next = match current.with_section(section) {
            Ok(next) => Arc::new(next),
            Err(e) => {
                warn!(error = %e, "Commit rejected");
                state.view.phase = previous_phase;
                return Err(e);
            }
        };

        state.search.invalidate();
        state.sections.invalidate();
        state.view = WorkflowSnapshot::default();
        self.schedule_tx.send_replace(next.clone());

        info!(sections = next.len(), "Section added to schedule");
        Ok(next)
    }

    /// Removes a section from the schedule. Removing an absent id is a no-op.
    ///
    /// Returns whether anything was removed.
    pub fn remove(&self, section_id: &str) -> bool {
        let _state = lock(&self.state);
        let current = self.schedule();
        if !current.contains(section_id) {
            debug!(section_id = %section_id, "Remove ignored, section not in schedule");
            return false;
        }

        let next = Arc::new(current.without_section(section_id));
        info!(section_id = %section_id, sections = next.len(), "Section removed from schedule");
        self.schedule_tx.send_replace(next);
        true
    }
}

async fn run_search(
    catalog: Arc<dyn CatalogClient>,
    state: Arc<Mutex<WorkflowState>>,
    debounce: Duration,
    ticket: Ticket,
    query: String,
) {
    tokio::time::sleep(debounce).await;

    {
        let state = lock(&state);
        if !state.search.is_current(ticket) {
            debug!(ticket = %ticket, "Search superseded during debounce");
            return;
        }
    }

    info!(query = %query, ticket = %ticket, "Searching catalog");
    let result = catalog.search_courses(&query).await;

    let mut state = lock(&state);
    if !state.search.is_current(ticket) {
        debug!(query = %query, ticket = %ticket, "Discarding stale search response");
        return;
    }

    match result {
        Ok(results) => {
            debug!(query = %query, hits = results.len(), "Search results applied");
            state.view.results = results;
            state.view.last_failure = None;
        }
        Err(e) => {
            warn!(query = %query, error = %e, "Course search failed");
            state.view.results.clear();
            state.view.last_failure = Some(e.to_string());
        }
    }
}

async fn run_sections_lookup(
    catalog: Arc<dyn CatalogClient>,
    state: Arc<Mutex<WorkflowState>>,
    ticket: Ticket,
    course_id: String,
) {
    let result = catalog.sections_for_course(&course_id).await;

    let mut state = lock(&state);
    if !state.sections.is_current(ticket) {
        debug!(course_id = %course_id, ticket = %ticket, "Discarding stale sections response");
        return;
    }

    match result {
        Ok(sections) => {
            debug!(course_id = %course_id, sections = sections.len(), "Sections applied");
            state.view.sections = sections;
            state.view.last_failure = None;
        }
        Err(e) => {
            warn!(course_id = %course_id, error = %e, "Sections lookup failed");
            state.view.sections.clear();
            state.view.last_failure = Some(e.to_string());
        }
    }

    if state.view.phase == Phase::SectionsLoading {
        state.view.phase = Phase::CourseChosen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::types::Meeting;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockCatalog {
        searches: Mutex<Vec<String>>,
        section_calls: Mutex<Vec<String>>,
        delays: HashMap<String, Duration>,
        failing: Mutex<bool>,
    }

    impl MockCatalog {
        fn with_delays(delays: &[(&str, u64)]) -> Self {
            Self {
                delays: delays
                    .iter()
                    .map(|(k, ms)| (k.to_string(), Duration::from_millis(*ms)))
                    .collect(),
                ..Default::default()
            }
        }

        fn searches(&self) -> Vec<String> {
            self.searches.lock().unwrap().clone()
        }

        fn section_calls(&self) -> Vec<String> {
            self.section_calls.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        async fn pause_for(&self, key: &str) {
            let delay = self.delays.get(key).copied().unwrap_or(Duration::from_millis(10));
            tokio::time::sleep(delay).await;
        }
    }

    #[async_trait]
    impl CatalogClient for MockCatalog {
        async fn search_courses(&self, query: &str) -> Result<Vec<CourseResult>, LookupError> {
            self.searches.lock().unwrap().push(query.to_string());
            self.pause_for(query).await;
            if *self.failing.lock().unwrap() {
                return Err(LookupError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(vec![course(&query.to_uppercase(), query)])
        }

        async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>, LookupError> {
            self.section_calls.lock().unwrap().push(course_id.to_string());
            self.pause_for(course_id).await;
            Ok(vec![section(&format!("{}-1", course_id), course_id)])
        }
    }

    fn course(id: &str, title: &str) -> CourseResult {
        CourseResult {
            id: id.to_string(),
            title: title.to_string(),
            code: id.trim_start_matches(char::is_alphabetic).to_string(),
        }
    }

    fn section(id: &str, course_id: &str) -> Section {
        Section {
            id: id.to_string(),
            course_id: course_id.to_string(),
            section_label: "001".to_string(),
            professor: "Smith, John".to_string(),
            meetings: vec![Meeting::new(1, 600, 630, "")],
        }
    }

    fn workflow(catalog: &Arc<MockCatalog>) -> SelectionWorkflow {
        SelectionWorkflow::new(catalog.clone(), WorkflowConfig::default())
    }

    async fn wait_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_issues_one_search_with_final_text() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.update_query("cs1");
        wait_ms(100).await;
        wf.update_query("cs11");
        wait_ms(100).await;
        wf.update_query("cs110");
        wait_ms(1000).await;

        assert_eq!(catalog.searches(), vec!["cs110"]);
        let snapshot = wf.snapshot();
        assert_eq!(snapshot.phase, Phase::Searching);
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.results[0].title, "cs110");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_search_response_is_discarded() {
        // A is issued first but resolves after B
        let catalog = Arc::new(MockCatalog::with_delays(&[("ab", 500), ("abc", 50)]));
        let wf = workflow(&catalog);

        wf.update_query("ab");
        wait_ms(400).await;
        wf.update_query("abc");

        wait_ms(360).await;
        assert_eq!(wf.snapshot().results[0].title, "abc");

        wait_ms(1000).await;
        assert_eq!(catalog.searches(), vec!["ab", "abc"]);
        assert_eq!(wf.snapshot().results[0].title, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_clears_results_without_lookup() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.update_query("cs");
        wait_ms(500).await;
        assert_eq!(wf.snapshot().results.len(), 1);

        wf.update_query("c");
        wait_ms(500).await;
        assert!(wf.snapshot().results.is_empty());
        assert_eq!(catalog.searches(), vec!["cs"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_cancels_pending_search() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.update_query("cs");
        wait_ms(100).await;
        wf.update_query("");
        wait_ms(500).await;

        assert!(catalog.searches().is_empty());
        assert!(wf.snapshot().results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_choose_course_loads_sections() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.update_query("cs110");
        wait_ms(500).await;
        let picked = wf.snapshot().results[0].clone();

        wf.choose_course(picked.clone());
        let loading = wf.snapshot();
        assert_eq!(loading.phase, Phase::SectionsLoading);
        assert_eq!(loading.query, "CS110");
        assert!(loading.results.is_empty());

        // The view echoes the filled-in id back; no new search
        wf.update_query("CS110");
        wait_ms(500).await;

        let loaded = wf.snapshot();
        assert_eq!(loaded.phase, Phase::CourseChosen);
        assert_eq!(loaded.chosen_course, Some(picked));
        assert_eq!(loaded.sections.len(), 1);
        assert_eq!(catalog.searches(), vec!["cs110"]);
        assert_eq!(catalog.section_calls(), vec!["CS110"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_course_change_keeps_latest_sections() {
        let catalog = Arc::new(MockCatalog::with_delays(&[("CS110", 500), ("MATH113", 20)]));
        let wf = workflow(&catalog);

        wf.choose_course(course("CS110", "Principles of Computing"));
        wait_ms(10).await;
        wf.choose_course(course("MATH113", "Calculus"));
        wait_ms(1000).await;

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.sections.len(), 1);
        assert_eq!(snapshot.sections[0].course_id, "MATH113");
        assert_eq!(catalog.section_calls(), vec!["CS110", "MATH113"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rechoosing_same_course_does_not_refetch() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.choose_course(course("CS110", "Principles of Computing"));
        wait_ms(100).await;
        wf.choose_section_by_id("CS110-1").unwrap();
        wf.choose_course(course("CS110", "Principles of Computing"));
        wait_ms(100).await;

        let snapshot = wf.snapshot();
        assert_eq!(catalog.section_calls(), vec!["CS110"]);
        assert_eq!(snapshot.chosen_section, None);
        assert_eq!(snapshot.sections.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_adds_section_and_resets() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);
        let mut rx = wf.subscribe();

        wf.choose_course(course("CS110", "Principles of Computing"));
        wait_ms(100).await;
        wf.choose_section_by_id("CS110-1").unwrap();
        assert_eq!(wf.phase(), Phase::SectionChosen);

        let schedule = wf.commit().unwrap();
        assert!(schedule.contains("CS110-1"));
        assert_eq!(wf.snapshot(), WorkflowSnapshot::default());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_commit_rejected_without_mutation() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.choose_section(section("17837", "CS110"));
        wf.commit().unwrap();

        wf.choose_section(section("17837", "CS110"));
        let err = wf.commit().unwrap_err();
        assert_eq!(
            err,
            WorkflowError::DuplicateSection {
                section_id: "17837".to_string()
            }
        );
        assert_eq!(wf.schedule().len(), 1);

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.phase, Phase::SectionChosen);
        assert_eq!(snapshot.chosen_section.map(|s| s.id), Some("17837".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_without_section() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);
        assert_eq!(wf.commit().unwrap_err(), WorkflowError::NoSectionChosen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_then_remove_round_trip() {
        let catalog = Arc::new(MockCatalog::default());
        let initial = Schedule::from_sections(vec![section("1", "HIST100")]);
        let wf = SelectionWorkflow::with_schedule(
            catalog.clone(),
            WorkflowConfig::default(),
            initial.clone(),
        );

        wf.choose_section(section("2", "CS110"));
        wf.commit().unwrap();
        assert_eq!(wf.schedule().len(), 2);

        assert!(wf.remove("2"));
        assert_eq!(*wf.schedule(), initial);

        assert!(!wf.remove("2"));
        assert_eq!(*wf.schedule(), initial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_surfaces_empty_results_and_retries() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        catalog.set_failing(true);
        wf.update_query("cs110");
        wait_ms(500).await;
        let failed = wf.snapshot();
        assert!(failed.results.is_empty());
        assert!(failed.last_failure.is_some());

        catalog.set_failing(false);
        wf.update_query("cs110");
        wait_ms(500).await;
        let recovered = wf.snapshot();
        assert_eq!(recovered.results.len(), 1);
        assert_eq!(recovered.last_failure, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_course_keeps_schedule() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.choose_section(section("1", "CS110"));
        wf.commit().unwrap();

        wf.choose_course(course("MATH113", "Calculus"));
        wait_ms(100).await;
        wf.clear_course();

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.phase, Phase::Searching);
        assert!(snapshot.query.is_empty());
        assert!(snapshot.sections.is_empty());
        assert!(snapshot.chosen_course.is_none());
        assert_eq!(wf.schedule().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_editing_query_drops_chosen_course() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);

        wf.choose_course(course("CS110", "Principles of Computing"));
        wait_ms(100).await;
        wf.update_query("MATH");
        wait_ms(500).await;

        let snapshot = wf.snapshot();
        assert_eq!(snapshot.phase, Phase::Searching);
        assert!(snapshot.chosen_course.is_none());
        assert!(snapshot.sections.is_empty());
        assert_eq!(catalog.searches(), vec!["MATH"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_choose_unknown_section() {
        let catalog = Arc::new(MockCatalog::default());
        let wf = workflow(&catalog);
        assert!(matches!(
            wf.choose_section_by_id("nope"),
            Err(WorkflowError::UnknownSection { .. })
        ));
        assert!(!wf.reload_sections());
    }
}
