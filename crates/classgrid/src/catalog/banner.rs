//! Importer for Ellucian Banner's student registration class search.
//!
//! Handles the guest session pattern:
//! 1. GET classSearch to receive a session cookie and the synchronizer token
//! 2. POST term/search to pin the term for the session
//! 3. Page through searchResults for each subject
//! 4. Convert Banner sections into catalog courses and sections

use rand::Rng;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::time;
use crate::types::{Course, Meeting, Section};

const SEARCH_PAGE_PATH: &str = "/ssb/classSearch/classSearch";
const TERM_PATH: &str = "/ssb/term/search";
const RESULTS_PATH: &str = "/ssb/searchResults/searchResults";
const RESET_PATH: &str = "/ssb/classSearch/resetDataForm";

static TOKEN_META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='synchronizerToken']").unwrap());
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="synchronizerToken"\s+content="([^"]+)""#).unwrap());

/// Configuration for the Banner importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    /// e.g. `https://ssbstureg.gmu.edu/StudentRegistrationSsb`
    pub base_url: String,
    /// Banner term code, e.g. "202610"
    pub term: String,
    /// Subjects to import, e.g. ["CS", "MATH"]
    pub subjects: Vec<String>,
    /// Rows per searchResults page
    pub page_size: u32,
    /// Attempts per request before giving up
    pub max_attempts: u32,
    /// Base delay between attempts (exponential backoff)
    pub retry_base_ms: u64,
    pub user_agent: String,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ssbstureg.gmu.edu/StudentRegistrationSsb".to_string(),
            term: "202610".to_string(),
            subjects: vec!["CS".to_string(), "ACCT".to_string(), "MATH".to_string()],
            page_size: 50,
            max_attempts: 4,
            retry_base_ms: 500,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// One page of `searchResults`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResultsPage {
    pub success: bool,
    pub total_count: u32,
    pub data: Option<Vec<BannerSection>>,
}

/// A section as Banner reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerSection {
    #[serde(rename = "courseReferenceNumber")]
    pub crn: String,
    pub subject: String,
    pub course_number: String,
    pub sequence_number: String,
    pub course_title: String,
    pub credit_hour_low: Option<f32>,
    pub faculty: Vec<BannerFaculty>,
    pub meetings_faculty: Vec<BannerMeetingFaculty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerFaculty {
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerMeetingFaculty {
    pub faculty: Vec<BannerFaculty>,
    pub meeting_time: BannerMeetingTime,
}

/// Banner stores meeting days as one boolean per weekday.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BannerMeetingTime {
    pub begin_time: Option<String>,
    pub end_time: Option<String>,
    pub building: Option<String>,
    pub room: Option<String>,
    pub sunday: bool,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
}

impl BannerMeetingTime {
    fn day_flags(&self) -> [bool; 7] {
        [
            self.sunday,
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
        ]
    }

    fn location(&self) -> String {
        [self.building.as_deref(), self.room.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl BannerSection {
    /// Catalog course id, e.g. "CS" + "110".
    pub fn course_id(&self) -> String {
        format!("{}{}", self.subject.trim(), self.course_number.trim())
    }

    /// First listed instructor, or "TBA".
    pub fn professor(&self) -> String {
        self.faculty
            .iter()
            .chain(self.meetings_faculty.iter().flat_map(|mf| mf.faculty.iter()))
            .map(|f| f.display_name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or("TBA")
            .to_string()
    }

    /// Converts to a catalog section with one meeting per active weekday.
    ///
    /// Meeting blocks without parseable times (online/asynchronous) are dropped.
    pub fn to_section(&self) -> Section {
        let mut meetings = Vec::new();

        for mf in &self.meetings_faculty {
            let mt = &mf.meeting_time;
            let (Some(start), Some(end)) = (
                mt.begin_time.as_deref().and_then(time::parse_hhmm),
                mt.end_time.as_deref().and_then(time::parse_hhmm),
            ) else {
                debug!(crn = %self.crn, "Skipping meeting without times");
                continue;
            };

            let location = mt.location();
            for (day, active) in mt.day_flags().into_iter().enumerate() {
                if active {
                    meetings.push(Meeting::new(day as u8, start, end, location.clone()));
                }
            }
        }

        Section {
            id: self.crn.trim().to_string(),
            course_id: self.course_id(),
            section_label: self.sequence_number.trim().to_string(),
            professor: self.professor(),
            meetings,
        }
    }

    pub fn to_course(&self) -> Course {
        Course {
            id: self.course_id(),
            department: self.subject.trim().to_string(),
            code: self.course_number.trim().to_string(),
            title: self.course_title.trim().to_string(),
            description: String::new(),
            credits: self.credit_hour_low.map(|c| c.round() as u32).unwrap_or(0),
        }
    }
}

/// Courses and sections gathered from one import run.
#[derive(Debug, Clone, Default)]
pub struct BannerImport {
    pub courses: Vec<Course>,
    pub sections: Vec<Section>,
}

impl BannerImport {
    /// Builds a de-duplicated import from raw Banner sections.
    pub fn from_banner(raw: &[BannerSection]) -> Self {
        let mut courses: BTreeMap<String, Course> = BTreeMap::new();
        let mut sections: Vec<Section> = Vec::new();

        for banner_section in raw {
            let section = banner_section.to_section();
            if section.id.is_empty() || sections.iter().any(|s| s.id == section.id) {
                continue;
            }
            courses
                .entry(section.course_id.clone())
                .or_insert_with(|| banner_section.to_course());
            sections.push(section);
        }

        Self {
            courses: courses.into_values().collect(),
            sections,
        }
    }

    /// Sections grouped by course, in course order.
    pub fn sections_by_course(&self) -> BTreeMap<&str, Vec<&Section>> {
        let mut grouped: BTreeMap<&str, Vec<&Section>> = BTreeMap::new();
        for section in &self.sections {
            grouped.entry(section.course_id.as_str()).or_default().push(section);
        }
        grouped
    }
}

/// Extracts the synchronizer token from the class search page.
pub fn extract_synchronizer_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    if let Some(token) = document
        .select(&TOKEN_META_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    // Fallback: raw text match for pages the HTML parser mangles
    TOKEN_REGEX
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Client for a Banner guest session.
pub struct BannerClient {
    client: Client,
    config: BannerConfig,
    session_id: String,
}

impl BannerClient {
    pub fn new(config: BannerConfig) -> Result<Self, ImportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .cookie_store(true)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(15))
            .build()?;

        let session_id = format!(
            "guest{}{:04}",
            chrono::Utc::now().timestamp(),
            rand::thread_rng().gen_range(0..10_000)
        );

        Ok(Self {
            client,
            config,
            session_id,
        })
    }

    /// Runs the full import for every configured subject.
    pub async fn import(&self) -> Result<BannerImport, ImportError> {
        let token = self.with_retry("handshake", || self.handshake()).await?;
        self.with_retry("set term", || self.set_term(&token)).await?;

        let mut raw = Vec::new();
        for subject in &self.config.subjects {
            let sections = self.fetch_subject(&token, subject).await?;
            info!(subject = %subject, sections = sections.len(), "Fetched subject");
            raw.extend(sections);
        }

        let import = BannerImport::from_banner(&raw);
        info!(
            term = %self.config.term,
            courses = import.courses.len(),
            sections = import.sections.len(),
            "Banner import finished"
        );
        Ok(import)
    }

    /// Step 1: visits the search page for a session cookie and token.
    async fn handshake(&self) -> Result<String, ImportError> {
        let url = format!("{}{}", self.config.base_url, SEARCH_PAGE_PATH);
        info!(url = %url, "Fetching class search page");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                status: status.as_u16(),
                message: "class search page".to_string(),
            });
        }

        let html = response.text().await?;
        extract_synchronizer_token(&html).ok_or(ImportError::MissingToken)
    }

    /// Step 2: pins the term for this session.
    async fn set_term(&self, token: &str) -> Result<(), ImportError> {
        let url = url::Url::parse_with_params(
            &format!("{}{}", self.config.base_url, TERM_PATH),
            &[("mode", "search"), ("uniqueSessionId", self.session_id.as_str())],
        )?;
        info!(term = %self.config.term, "Setting term");

        let form = [
            ("term", self.config.term.as_str()),
            ("studyPath", ""),
            ("studyPathText", ""),
            ("startDatepicker", ""),
            ("endDatepicker", ""),
        ];
        let response = self
            .client
            .post(url)
            .header("X-Synchronizer-Token", token)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                status: status.as_u16(),
                message: "term selection".to_string(),
            });
        }
        Ok(())
    }

    /// Step 3: pages through every result for one subject.
    async fn fetch_subject(
        &self,
        token: &str,
        subject: &str,
    ) -> Result<Vec<BannerSection>, ImportError> {
        self.with_retry("reset search", || self.reset_search(token))
            .await?;

        let mut sections = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self
                .with_retry("search results", || self.fetch_page(token, subject, offset))
                .await?;

            if !page.success {
                warn!(subject = %subject, offset, "Banner reported an unsuccessful search");
            }

            let rows = page.data.unwrap_or_default();
            if rows.is_empty() {
                break;
            }
            offset += rows.len() as u32;
            sections.extend(rows);

            if offset >= page.total_count {
                break;
            }
        }
        Ok(sections)
    }

    async fn fetch_page(
        &self,
        token: &str,
        subject: &str,
        offset: u32,
    ) -> Result<SearchResultsPage, ImportError> {
        let offset = offset.to_string();
        let page_size = self.config.page_size.to_string();
        let url = url::Url::parse_with_params(
            &format!("{}{}", self.config.base_url, RESULTS_PATH),
            &[
                ("txt_subject", subject),
                ("txt_term", self.config.term.as_str()),
                ("startDatepicker", ""),
                ("endDatepicker", ""),
                ("pageOffset", offset.as_str()),
                ("pageMaxSize", page_size.as_str()),
                ("sortColumn", "subjectDescription"),
                ("sortDirection", "asc"),
                ("uniqueSessionId", self.session_id.as_str()),
            ],
        )?;
        debug!(subject = %subject, offset = %offset, "Fetching search results page");

        let response = self
            .client
            .get(url)
            .header("X-Synchronizer-Token", token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ImportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Clears the previous subject's search so the next one starts fresh.
    async fn reset_search(&self, token: &str) -> Result<(), ImportError> {
        let url = format!("{}{}", self.config.base_url, RESET_PATH);
        let response = self
            .client
            .post(&url)
            .header("X-Synchronizer-Token", token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                status: status.as_u16(),
                message: "reset search form".to_string(),
            });
        }
        Ok(())
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ImportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ImportError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.config.max_attempts => {
                    return Err(ImportError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    })
                }
                Err(e) => {
                    let delay = retry_delay(self.config.retry_base_ms, attempt);
                    warn!(
                        step = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Banner request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Exponential backoff with up to 20% jitter, capped at 10 seconds.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let exponential = base_ms.saturating_mul(2u64.pow(attempt.saturating_sub(1).min(5)));
    let capped = exponential.min(10_000);
    let jitter = rand::thread_rng().gen_range(0..=(capped / 5));
    Duration::from_millis(capped + jitter)
}
