//! Reconciliation: confirmed elements plus the local draft, in render order.
//!
//! The confirmed tier is replaced wholesale by every snapshot from the event
//! log and kept sorted by arrival token. The draft tier is at most one
//! element and always drawn last. The two tiers are merged only when a
//! [`RenderList`] is built; nothing merged is ever stored or sent.
//!
//! Arrival-token ties are broken by the canonical JSON text of the record, so
//! every client sorts the same snapshot identically regardless of the order
//! the feed delivered it in.

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

use std::collections::HashSet;

use crate::element::{self, ArrivalToken, Element, RemoteRecord};

/// One element confirmed by the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmed {
    pub token: ArrivalToken,
    pub element: Element,
    /// Client nonce the record was committed with, if any.
    pub nonce: Option<String>,
    /// Canonical record text, the tie-breaker for equal tokens.
    sort_key: String,
}

/// Outcome of applying one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotReport {
    /// Records turned into confirmed elements.
    pub accepted: usize,
    /// Malformed records dropped from the render.
    pub skipped: usize,
}

/// The confirmed tier of the render list.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    confirmed: Vec<Confirmed>,
    nonces: HashSet<String>,
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the confirmed tier with a full snapshot from the log.
    ///
    /// Malformed records are logged and skipped; they never blank the board.
    pub fn apply_snapshot(&mut self, records: Vec<RemoteRecord>) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        let mut confirmed = Vec::with_capacity(records.len());

        for RemoteRecord { token, record } in records {
            match element::deserialize(&record) {
                Ok(element) => {
                    let nonce = element::nonce_of(&record).map(str::to_owned);
                    let sort_key = serde_json::to_string(&record).unwrap_or_default();
                    confirmed.push(Confirmed { token, element, nonce, sort_key });
                    report.accepted += 1;
                }
                Err(e) => {
                    log::warn!("reconcile: skipping malformed record {token}: {e}");
                    report.skipped += 1;
                }
            }
        }

        confirmed.sort_by(|a, b| a.token.cmp(&b.token).then_with(|| a.sort_key.cmp(&b.sort_key)));

        self.nonces = confirmed.iter().filter_map(|c| c.nonce.clone()).collect();
        self.confirmed = confirmed;
        report
    }

    /// Confirmed elements in arrival order.
    #[must_use]
    pub fn confirmed(&self) -> &[Confirmed] {
        &self.confirmed
    }

    /// Whether a record committed with `nonce` has been confirmed.
    #[must_use]
    pub fn contains_nonce(&self, nonce: &str) -> bool {
        self.nonces.contains(nonce)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    /// Merge the confirmed tier with the current draft.
    #[must_use]
    pub fn render_list(&self, draft: Option<Element>) -> RenderList<'_> {
        RenderList { confirmed: &self.confirmed, draft }
    }
}

/// Confirmed elements followed by at most one draft, ready to draw.
#[derive(Debug, Clone)]
pub struct RenderList<'a> {
    confirmed: &'a [Confirmed],
    draft: Option<Element>,
}

impl RenderList<'_> {
    /// Elements in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.confirmed
            .iter()
            .map(|c| &c.element)
            .chain(self.draft.as_ref())
    }

    #[must_use]
    pub fn draft(&self) -> Option<&Element> {
        self.draft.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed.len() + usize::from(self.draft.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
