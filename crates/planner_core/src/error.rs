//! Error types for the build-order simulation.

use thiserror::Error;

/// Result type alias using [`PlannerError`].
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A trigger could not be satisfied within the bounded wait.
    #[error("trigger unsatisfied after waiting {waited} ticks")]
    UnsatisfiableTrigger {
        /// Ticks advanced before giving up.
        waited: u64,
    },

    /// No timeline of the required kind exists or will exist.
    #[error("no timeline of kind {kind} available after waiting {waited} ticks")]
    NoMatchingTimeline {
        /// The required timeline kind (raw id).
        kind: u32,
        /// Ticks advanced before giving up.
        waited: u64,
    },

    /// No worker timeline matched the movement's source criterion.
    #[error("no worker of kind {kind} matched the source criterion after waiting {waited} ticks")]
    NoMatchingWorker {
        /// The worker timeline kind (raw id).
        kind: u32,
        /// Ticks advanced before giving up.
        waited: u64,
    },

    /// An action could not be placed on its timeline.
    #[error("action {action} conflicts with timeline occupancy at tick {start}")]
    TimelineConflict {
        /// The conflicting action's caller-supplied id.
        action: u32,
        /// The start tick that was attempted.
        start: u64,
    },

    /// `recur` was called on a non-recurring event.
    #[error("event {event} is not recurring")]
    NotRecurring {
        /// The offending event id.
        event: u64,
    },

    /// A recurring schedule was given a period shorter than one tick.
    #[error("recurrence period {period} is shorter than one tick")]
    PeriodTooShort {
        /// The offending period, in exact ticks.
        period: String,
    },

    /// Group recurrence was given the wrong number of replacement ids.
    #[error("group recurrence expected {expected} new event ids, got {got}")]
    GroupIdCountMismatch {
        /// Number of member events in the group.
        expected: usize,
        /// Number of replacement ids supplied.
        got: usize,
    },

    /// `recur` was called on a group with no recurrence gap.
    #[error("event group {group} is not recurring")]
    GroupNotRecurring {
        /// The offending group id.
        group: u64,
    },

    /// An event id was not found in the scheduler.
    #[error("event not found: {event}")]
    EventNotFound {
        /// The missing event id.
        event: u64,
    },

    /// An event group id was not found in the scheduler.
    #[error("event group not found: {group}")]
    GroupNotFound {
        /// The missing group id.
        group: u64,
    },

    /// A resource site id was not found.
    #[error("resource site not found: {site}")]
    SiteNotFound {
        /// The missing site id.
        site: u32,
    },

    /// An action's start time was assigned twice.
    #[error("start time already set for action {action}")]
    StartAlreadySet {
        /// The offending action's caller-supplied id.
        action: u32,
    },

    /// The hero limit was reached.
    #[error("hero limit of {limit} reached")]
    HeroLimitReached {
        /// The configured hero cap.
        limit: u32,
    },

    /// A documented stub was invoked.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Invalid engine state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An action in an ordered submission could not be scheduled.
    ///
    /// Processing stops at the first failing action; the index and
    /// identity of that action are reported so the caller can surface
    /// them.
    #[error("action #{index} ({name}) could not be scheduled: {source}")]
    ActionFailed {
        /// Position of the failing action in the submitted list.
        index: usize,
        /// Display name of the failing action.
        name: String,
        /// The underlying scheduling failure.
        #[source]
        source: Box<PlannerError>,
    },

    /// Snapshot or document serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
