//! Schedule Matching
//!
//! Selects the templates due at a given UTC wall-clock sample, in
//! declaration order. A template is due when any of its windows matches.
//! In test mode every template is due and is paired with its first window.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::types::{ScheduleWindow, TransactionTemplate, WallClock};
use tracing::debug;

/// A template selected for dispatch, with the window that made it due
#[derive(Debug, Clone, Copy)]
pub struct DueTemplate<'a> {
    pub template: &'a TransactionTemplate,
    pub window: &'a ScheduleWindow,
}

pub struct Scheduler<'a> {
    templates: &'a [TransactionTemplate],
    test_mode: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(templates: &'a [TransactionTemplate], test_mode: bool) -> Self {
        Self {
            templates,
            test_mode,
        }
    }

    /// Templates due at `now`, declaration order preserved
    pub fn due_templates(&self, now: WallClock) -> Vec<DueTemplate<'a>> {
        let mut due = Vec::new();
        for template in self.templates {
            let window = if self.test_mode {
                template.schedule.first()
            } else {
                template.matching_window(now)
            };

            match window {
                Some(window) => due.push(DueTemplate { template, window }),
                None => debug!("\"{}\" not due at {} UTC", template.name, now),
            }
        }
        due
    }
}
