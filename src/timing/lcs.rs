//! Large contentful set: elements within a fraction of the largest painted one.
//!
//! Membership is kept relative to the *current* largest member. When a new
//! largest element arrives the cutoff moves up and members below it leave the
//! set, so the set never becomes a historical union of past contenders.

use serde::Deserialize;
use tracing::debug;

use crate::{ElementHandle, ElementKind, Millis, PaintRecord, Rect, config::LcsPolicy};

/// Image embedded in a container element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddedImage {
    pub handle: ElementHandle,
    pub rect: Rect,
}

/// Identity and classification of a content element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub handle: ElementHandle,
    pub kind: ElementKind,
}

impl ContentRef {
    pub fn new(handle: ElementHandle, kind: ElementKind) -> Self {
        Self { handle, kind }
    }
}

/// Member (or candidate member) of the set.
#[derive(Debug, Clone, PartialEq)]
pub struct LcsEntry {
    /// Tracked element whose paint produced this entry; its area and kind decide membership.
    pub element: ContentRef,
    /// Content the paint is attributed to: the element itself, or the largest
    /// image inside a container.
    pub effective: ContentRef,
    pub area: f64,
    pub paint_time: Millis,
    pub paint: Option<PaintRecord>,
}

impl LcsEntry {
    pub fn new(element: ContentRef, area: f64, paint_time: Millis) -> Self {
        Self {
            effective: element.clone(),
            element,
            area,
            paint_time,
            paint: None,
        }
    }

    /// Builds an entry from a painted element and its visible layout.
    pub fn resolve(
        element: ContentRef,
        rect: &Rect,
        embedded: &[EmbeddedImage],
        paint: PaintRecord,
    ) -> Self {
        let effective = match element.kind {
            ElementKind::Container => embedded
                .iter()
                .filter(|image| image.rect.area() > 0.0)
                .max_by(|a, b| a.rect.area().total_cmp(&b.rect.area()))
                .map(|image| ContentRef::new(image.handle.clone(), ElementKind::Image)),
            ElementKind::Image => None,
        }
        .unwrap_or_else(|| element.clone());
        Self {
            element,
            effective,
            area: rect.area(),
            paint_time: paint.paint_time,
            paint: Some(paint),
        }
    }

    fn same_identity(&self, other: &LcsEntry) -> bool {
        self.element.handle == other.element.handle
    }
}

/// Read-time view of the set.
#[derive(Debug, Clone, PartialEq)]
pub struct LcsState {
    /// Members sorted by area, largest first.
    pub elements: Vec<LcsEntry>,
    pub threshold: f64,
    /// When the last member of the set finished painting.
    pub last_paint_time: Option<Millis>,
}

impl LcsState {
    pub fn largest(&self) -> Option<&LcsEntry> {
        self.elements.first()
    }
}

#[derive(Debug, Clone)]
pub struct LcsTracker {
    policy: LcsPolicy,
    entries: Vec<LcsEntry>,
    last_paint_time: Option<Millis>,
}

impl Default for LcsTracker {
    fn default() -> Self {
        Self::new(LcsPolicy::default())
    }
}

impl LcsTracker {
    pub fn new(policy: LcsPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            last_paint_time: None,
        }
    }

    pub fn policy(&self) -> &LcsPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn largest_area(&self) -> Option<f64> {
        self.entries.iter().map(|entry| entry.area).reduce(f64::max)
    }

    pub fn last_paint_time(&self) -> Option<Millis> {
        self.last_paint_time
    }

    /// Offers a newly painted element; returns true when the set changed.
    ///
    /// A repaint of a member replaces it, so a member that shrank below the
    /// cutoff leaves the set.
    pub fn update(&mut self, candidate: LcsEntry) -> bool {
        if !(candidate.area > 0.0) {
            debug!(handle = %candidate.element.handle, "zero-area lcs candidate ignored");
            return false;
        }

        let before = self.entries.clone();
        self.entries.retain(|entry| !entry.same_identity(&candidate));

        match self.largest_area() {
            None => self.entries.push(candidate),
            Some(largest) if candidate.area < largest * self.policy.threshold => {
                debug!(
                    handle = %candidate.element.handle,
                    area = candidate.area,
                    "lcs candidate below cutoff"
                );
            }
            Some(largest) => {
                let area = candidate.area;
                self.entries.push(candidate);
                if area > largest {
                    let cutoff = area * self.policy.threshold;
                    self.entries.retain(|entry| entry.area >= cutoff);
                }
                self.prefer_content();
            }
        }

        let changed = !same_members(&before, &self.entries);
        if changed {
            self.last_paint_time = self.max_member_paint_time();
            debug!(
                members = self.entries.len(),
                last_paint_time = self.last_paint_time,
                "lcs updated"
            );
        }
        changed
    }

    /// Drops containers that are not clearly larger than the largest image.
    fn prefer_content(&mut self) {
        let Some(largest_image) = self
            .entries
            .iter()
            .filter(|entry| entry.element.kind == ElementKind::Image)
            .map(|entry| entry.area)
            .reduce(f64::max)
        else {
            return;
        };
        let floor = largest_image * self.policy.container_multiplier;
        self.entries
            .retain(|entry| entry.element.kind == ElementKind::Image || entry.area > floor);
    }

    fn max_member_paint_time(&self) -> Option<Millis> {
        self.entries
            .iter()
            .map(|entry| entry.paint_time)
            .reduce(f64::max)
    }

    pub fn state(&self) -> LcsState {
        let mut elements = self.entries.clone();
        elements.sort_by(|a, b| {
            b.area
                .total_cmp(&a.area)
                .then_with(|| a.paint_time.total_cmp(&b.paint_time))
        });
        LcsState {
            elements,
            threshold: self.policy.threshold,
            last_paint_time: self.last_paint_time,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_paint_time = None;
    }
}

fn same_members(before: &[LcsEntry], after: &[LcsEntry]) -> bool {
    before.len() == after.len() && before.iter().all(|entry| after.contains(entry))
}
