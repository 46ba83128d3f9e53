// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Timed run-start / run-end events used by the cumulative limit look-ahead.
//!
//! The calendar only stores events; simulating node state is left to the
//! placement layer.

use std::cmp::Ordering;

use crate::snapshot::SchedulableUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStart,
    RunEnd,
}

impl EventKind {
    /// Ends are processed before starts scheduled for the same second.
    fn order(self) -> u8 {
        match self {
            Self::RunEnd => 0,
            Self::RunStart => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub time: i64,
    pub kind: EventKind,
    pub unit: SchedulableUnit,
}

impl TimedEvent {
    fn cmp_time(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.kind.order().cmp(&other.kind.order()))
            .then_with(|| self.unit.rank.cmp(&other.unit.rank))
    }
}

/// Events sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calendar {
    events: Vec<TimedEvent>,
}

impl Calendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&mut self, time: i64, kind: EventKind, unit: SchedulableUnit) {
        let event = TimedEvent { time, kind, unit };
        let pos = self
            .events
            .partition_point(|e| e.cmp_time(&event) != Ordering::Greater);
        self.events.insert(pos, event);
    }

    /// Schedule both the start and the end of `unit`.
    pub fn add_run(&mut self, unit: &SchedulableUnit, start: i64, end: i64) {
        self.add_event(start, EventKind::RunStart, unit.clone());
        self.add_event(end, EventKind::RunEnd, unit.clone());
    }

    /// Schedule the end of a unit that is already running.
    pub fn add_end(&mut self, unit: &SchedulableUnit, end: i64) {
        self.add_event(end, EventKind::RunEnd, unit.clone());
    }

    /// Events with `time <= until`, in processing order.
    pub fn events_until(&self, until: i64) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter().take_while(move |e| e.time <= until)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_sorted_end_before_start() {
        let a = SchedulableUnit::job("1.s", 1);
        let b = SchedulableUnit::job("2.s", 2);
        let mut cal = Calendar::new();
        cal.add_run(&b, 100, 200);
        cal.add_end(&a, 100);
        cal.add_event(50, EventKind::RunStart, a.clone());

        let seq: Vec<_> = cal.iter().map(|e| (e.time, e.kind, e.unit.rank)).collect();
        assert_eq!(
            seq,
            vec![
                (50, EventKind::RunStart, 1),
                (100, EventKind::RunEnd, 1),
                (100, EventKind::RunStart, 2),
                (200, EventKind::RunEnd, 2),
            ]
        );
    }

    #[test]
    fn test_events_until() {
        let a = SchedulableUnit::job("1.s", 1);
        let mut cal = Calendar::new();
        cal.add_run(&a, 10, 20);
        assert_eq!(cal.events_until(9).count(), 0);
        assert_eq!(cal.events_until(10).count(), 1);
        assert_eq!(cal.events_until(20).count(), 2);
        assert_eq!(cal.len(), 2);
    }
}
