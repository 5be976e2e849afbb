//! Daily water-intake tracking against the backend.
//!
//! The backend only exposes list/create/update for water entries, with no
//! find-by-date endpoint. The tracker maintains the "one entry per day"
//! invariant by scanning the full list for a calendar-day match before ever
//! creating, and by binding to the backend id after the first create.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{self, ApiError, ApiErrorKind, ApiResult};

/// Daily goal in glasses; the local count is clamped to `[0, GOAL_GLASSES]`.
pub const GOAL_GLASSES: u32 = 8;

/// Volume of one glass in milliliters.
pub const ML_PER_GLASS: u32 = 250;

/// Fixed annotation attached to every entry this client writes.
pub const DEFAULT_NOTES: &str = "Daily water intake";

const FETCH_FALLBACK: &str = "Failed to load water data";
const SAVE_FALLBACK: &str = "Failed to save water intake";

/// Water entry as returned by `GET /water`.
#[derive(Debug, Clone, Deserialize)]
pub struct WaterEntry {
    /// Backend-assigned identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Moment the entry was recorded; only the calendar day is meaningful.
    pub date: DateTime<Utc>,
    /// Glass count stored on the server.
    pub glasses: u32,
    /// Free-text annotation.
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Vec<WaterEntry>>,
}

#[derive(Debug, Deserialize)]
struct SavedEntry {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    data: SavedEntry,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    glasses: u32,
    notes: &'a str,
    date: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    glasses: u32,
    notes: &'a str,
}

/// Whether the local daily record corresponds to a backend-assigned id.
///
/// `Unbound → Bound(id)` happens on the first successful create; there is no
/// transition back within a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Binding {
    /// Never persisted; a save will create.
    #[default]
    Unbound,
    /// Persisted under this backend id; saves update in place.
    Bound(String),
}

/// Four-tier hydration status derived from the glass count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationStatus {
    Dehydrated,
    Low,
    Good,
    Excellent,
}

impl HydrationStatus {
    /// Classifies a glass count.
    pub fn for_count(glasses: u32) -> Self {
        match glasses {
            0 => HydrationStatus::Dehydrated,
            1..=3 => HydrationStatus::Low,
            4..=7 => HydrationStatus::Good,
            _ => HydrationStatus::Excellent,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            HydrationStatus::Dehydrated => "Dehydrated",
            HydrationStatus::Low => "Low",
            HydrationStatus::Good => "Good",
            HydrationStatus::Excellent => "Excellent",
        }
    }
}

/// Reconciles the local daily counter with the single authoritative backend
/// record for the current day.
pub struct DailyTracker {
    http: reqwest::Client,
    base_url: String,
    token: String,
    glasses: u32,
    binding: Binding,
    fetched: bool,
}

impl DailyTracker {
    /// Creates a tracker for the authenticated user identified by `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        api::guard_real_api(&base_url);

        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
            glasses: 0,
            binding: Binding::Unbound,
            fetched: false,
        }
    }

    /// Current in-memory glass count.
    pub fn glasses(&self) -> u32 {
        self.glasses
    }

    /// Current entry binding.
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// True once a fetch has succeeded and saving is permitted.
    ///
    /// Saving before knowledge of an existing entry could create a duplicate
    /// for the day, so `save` refuses until this holds.
    pub fn can_save(&self) -> bool {
        self.fetched
    }

    /// Percentage of the daily goal, rounded to the nearest integer.
    pub fn percentage(&self) -> u32 {
        (f64::from(self.glasses) / f64::from(GOAL_GLASSES) * 100.0).round() as u32
    }

    /// Total volume in milliliters.
    pub fn total_ml(&self) -> u32 {
        self.glasses * ML_PER_GLASS
    }

    /// Hydration status for the current count.
    pub fn status(&self) -> HydrationStatus {
        HydrationStatus::for_count(self.glasses)
    }

    /// Loads today's entry from the backend, binding to it when it exists.
    ///
    /// Lists all entries and scans for a calendar-day match (time-of-day
    /// discarded). No match leaves the tracker at zero, unbound. More than
    /// one match is reported as an error rather than silently resolved.
    /// Any failure resets the counter to zero so no stale state survives.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status, malformed
    /// response, or an ambiguous (duplicated) day.
    pub async fn fetch_today(&mut self) -> ApiResult<()> {
        let url = format!("{}/water", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, api::USER_AGENT)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| {
                self.reset();
                fetch_error(&err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.reset();
            return Err(ApiError::from_status(status, &body, FETCH_FALLBACK));
        }

        let list: ListResponse = response.json().await.map_err(|_| {
            self.reset();
            ApiError::unexpected(FETCH_FALLBACK)
        })?;

        // success:false or absent data means no entries yet.
        let entries = if list.success {
            list.data.unwrap_or_default()
        } else {
            Vec::new()
        };

        let today = Local::now().date_naive();
        match find_for_day(&entries, today) {
            Ok(Some(entry)) => {
                self.glasses = entry.glasses.min(GOAL_GLASSES);
                self.binding = Binding::Bound(entry.id.clone());
            }
            Ok(None) => {
                self.glasses = 0;
                self.binding = Binding::Unbound;
            }
            Err(err) => {
                self.reset();
                return Err(err);
            }
        }

        self.fetched = true;
        Ok(())
    }

    /// Applies `delta` to the in-memory count, clamped to `[0, GOAL_GLASSES]`.
    ///
    /// Pure and synchronous; covers increment (+1), decrement (-1) and
    /// quick-add (+1..+4).
    pub fn adjust(&mut self, delta: i32) {
        let adjusted = i64::from(self.glasses) + i64::from(delta);
        self.glasses = adjusted.clamp(0, i64::from(GOAL_GLASSES)) as u32;
    }

    /// Replaces the in-memory count, clamped to the goal.
    pub fn set_count(&mut self, glasses: u32) {
        self.glasses = glasses.min(GOAL_GLASSES);
    }

    /// Persists the current count: update when bound, create otherwise.
    ///
    /// A successful create binds the returned id so later saves in the same
    /// session update in place. Failure leaves local state unchanged.
    ///
    /// # Errors
    /// Returns an error if no successful fetch has happened yet, or if the
    /// backend call fails.
    pub async fn save(&mut self) -> ApiResult<()> {
        if !self.fetched {
            return Err(ApiError::new(
                ApiErrorKind::Validation,
                "Today's entry has not been loaded yet",
            ));
        }

        match self.binding.clone() {
            Binding::Bound(id) => self.update_entry(&id).await,
            Binding::Unbound => {
                let id = self.create_entry().await?;
                self.binding = Binding::Bound(id);
                Ok(())
            }
        }
    }

    async fn update_entry(&self, id: &str) -> ApiResult<()> {
        let url = format!("{}/water/{id}", self.base_url);
        let request = UpdateRequest {
            glasses: self.glasses,
            notes: DEFAULT_NOTES,
        };

        let response = self
            .http
            .put(&url)
            .header(reqwest::header::USER_AGENT, api::USER_AGENT)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|err| save_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body, SAVE_FALLBACK));
        }

        Ok(())
    }

    async fn create_entry(&self) -> ApiResult<String> {
        let url = format!("{}/water", self.base_url);
        let request = CreateRequest {
            glasses: self.glasses,
            notes: DEFAULT_NOTES,
            date: Utc::now().to_rfc3339(),
        };

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::USER_AGENT, api::USER_AGENT)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|err| save_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body, SAVE_FALLBACK));
        }

        let saved: SaveResponse = response
            .json()
            .await
            .map_err(|_| ApiError::unexpected(SAVE_FALLBACK))?;
        Ok(saved.data.id)
    }

    fn reset(&mut self) {
        self.glasses = 0;
        self.binding = Binding::Unbound;
        self.fetched = false;
    }
}

fn fetch_error(err: &reqwest::Error) -> ApiError {
    let transport = ApiError::from_transport(err);
    ApiError {
        kind: transport.kind,
        message: FETCH_FALLBACK.to_string(),
        details: Some(transport.message),
    }
}

fn save_error(err: &reqwest::Error) -> ApiError {
    let transport = ApiError::from_transport(err);
    ApiError {
        kind: transport.kind,
        message: SAVE_FALLBACK.to_string(),
        details: Some(transport.message),
    }
}

/// Scans the entry list for the given calendar day.
///
/// Returns the unique match, `None` when absent, or an error when the day is
/// duplicated — whether the backend should guarantee uniqueness is an open
/// question, so duplicates are surfaced instead of guessed at.
fn find_for_day(entries: &[WaterEntry], day: NaiveDate) -> ApiResult<Option<&WaterEntry>> {
    let mut matches = entries
        .iter()
        .filter(|entry| entry.date.with_timezone(&Local).date_naive() == day);

    let first = matches.next();
    if first.is_some() && matches.next().is_some() {
        return Err(ApiError::new(
            ApiErrorKind::Validation,
            format!("Multiple water entries exist for {day}; resolve the duplicates on the server"),
        ));
    }
    Ok(first)
}
