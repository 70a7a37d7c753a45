//! Sync session state machine.
//!
//! This module provides a pure, side-effect-free state machine for a sync
//! session. The machine takes events as input and produces a new state plus
//! the terminal progress event to emit, if any.
//!
//! The actual I/O (catalog fetch, downloads, store commits) is performed by
//! `playa-client`, not by this module.

use std::collections::BTreeMap;

use playa_types::{ContentPackage, ContentType};

/// Which kind of session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Whole catalog.
    Full,
    /// Updates to already-installed packages.
    Incremental,
}

/// Sync session phase - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No session running. The only phase a session can start from.
    #[default]
    Idle,
    /// Fetching and planning the catalog.
    Checking {
        /// Session kind.
        kind: SyncKind,
    },
    /// Applying the admission plan.
    Downloading {
        /// Session kind.
        kind: SyncKind,
        /// Packages applied so far.
        completed: usize,
        /// Packages planned.
        total: usize,
    },
    /// Session finished successfully.
    Complete {
        /// Storage in use afterwards.
        total_bytes: u64,
    },
    /// Session failed.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Caller asked for a session.
    StartRequested {
        /// Session kind.
        kind: SyncKind,
    },
    /// Catalog fetched and admission planned.
    CatalogReady {
        /// Number of placements to apply.
        packages: usize,
    },
    /// One placement applied.
    PackageApplied,
    /// All placements applied.
    Finished {
        /// Storage in use afterwards.
        total_bytes: u64,
    },
    /// A failure other than connectivity.
    Failed {
        /// Error message.
        error: String,
    },
    /// The catalog could not be reached.
    WentOffline {
        /// Error message.
        message: String,
    },
    /// Cooperative cancellation observed.
    Cancelled,
    /// Terminal state observed; return to idle.
    Reset,
}

/// Progress reported to the single session consumer, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    /// Bytes applied for one content type, as a percentage of that type's
    /// planned bytes. Non-decreasing per content type.
    Syncing {
        /// Content type of the package just applied (`None` if untyped).
        content_type: Option<ContentType>,
        /// 0..=100.
        percent: u8,
    },
    /// Session finished.
    Complete {
        /// Storage in use afterwards.
        total_bytes: u64,
    },
    /// Session failed.
    Failed {
        /// Error message.
        error: String,
    },
    /// Catalog unreachable; retry is up to the caller.
    Offline {
        /// Error message.
        message: String,
    },
    /// Session cancelled.
    Cancelled,
}

impl SyncProgress {
    /// Whether this event ends the session's progress stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Syncing { .. })
    }
}

impl SyncPhase {
    /// Create a new machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus the terminal progress
    /// event to emit, if any.
    ///
    /// This is a pure function - no side effects. Events that are not valid
    /// in the current phase leave it unchanged; in particular a start
    /// request outside `Idle` is ignored.
    pub fn on_event(self, event: SyncEvent) -> (Self, Option<SyncProgress>) {
        match (self, event) {
            (Self::Idle, SyncEvent::StartRequested { kind }) => (Self::Checking { kind }, None),

            // From Checking
            (Self::Checking { kind }, SyncEvent::CatalogReady { packages }) => (
                Self::Downloading {
                    kind,
                    completed: 0,
                    total: packages,
                },
                None,
            ),

            // From Downloading
            (
                Self::Downloading {
                    kind,
                    completed,
                    total,
                },
                SyncEvent::PackageApplied,
            ) => (
                Self::Downloading {
                    kind,
                    completed: completed.saturating_add(1).min(total),
                    total,
                },
                None,
            ),
            (Self::Downloading { .. }, SyncEvent::Finished { total_bytes }) => (
                Self::Complete { total_bytes },
                Some(SyncProgress::Complete { total_bytes }),
            ),

            // Failures and cancellation from any active phase
            (Self::Checking { .. } | Self::Downloading { .. }, SyncEvent::Failed { error }) => (
                Self::Error {
                    message: error.clone(),
                },
                Some(SyncProgress::Failed { error }),
            ),
            (
                Self::Checking { .. } | Self::Downloading { .. },
                SyncEvent::WentOffline { message },
            ) => (
                Self::Error {
                    message: message.clone(),
                },
                Some(SyncProgress::Offline { message }),
            ),
            (Self::Checking { .. } | Self::Downloading { .. }, SyncEvent::Cancelled) => {
                (Self::Idle, Some(SyncProgress::Cancelled))
            }

            // Terminal phases return to Idle
            (Self::Complete { .. } | Self::Error { .. }, SyncEvent::Reset) => (Self::Idle, None),

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, None),
        }
    }

    /// Whether a new session may start.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a session is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Checking { .. } | Self::Downloading { .. })
    }
}

/// Computes per-content-type percentages as placements are applied.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    // (planned, applied) bytes per content type
    totals: BTreeMap<Option<ContentType>, (u64, u64)>,
}

impl ProgressTracker {
    /// Tracker over the packages planned for download.
    pub fn new<'a>(planned: impl IntoIterator<Item = &'a ContentPackage>) -> Self {
        let mut totals = BTreeMap::new();
        for package in planned {
            let entry = totals.entry(package.content_type).or_insert((0u64, 0u64));
            entry.0 = entry.0.saturating_add(package.size_bytes);
        }
        Self { totals }
    }

    /// Record an applied package and return its progress event.
    pub fn record(&mut self, package: &ContentPackage) -> SyncProgress {
        let entry = self
            .totals
            .entry(package.content_type)
            .or_insert((package.size_bytes, 0));
        entry.1 = entry.1.saturating_add(package.size_bytes).min(entry.0);
        let percent = if entry.0 == 0 {
            100
        } else {
            // entry.1 <= entry.0, so this is at most 100.
            ((u128::from(entry.1) * 100) / u128::from(entry.0)) as u8
        };
        SyncProgress::Syncing {
            content_type: package.content_type,
            percent,
        }
    }
}
