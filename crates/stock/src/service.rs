//! The only component permitted to change an article's on-hand quantity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gestock_articles::Article;
use gestock_core::{
    AggregateRoot, ArticleId, DomainError, DomainResult, EnterpriseId, ExpectedVersion,
};
use gestock_events::{Event, EventBus};

use crate::movement::{MovementEntry, MovementKind, MovementSource};
use crate::store::StockStore;

/// Reload-and-retry attempts after a stale-version conflict before it is
/// surfaced to the caller. Every lost race means another writer committed,
/// so the bound only trips under pathological contention.
const COMMIT_RETRIES: usize = 32;

/// Notification published after a movement has committed.
///
/// Observers (projections, anomaly detection) consume this; stored state
/// never depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementRecorded {
    pub movement_id: gestock_core::MovementId,
    pub article_id: ArticleId,
    pub enterprise_id: EnterpriseId,
    pub quantity: i64,
    pub kind: MovementKind,
    pub source: MovementSource,
    pub new_on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

impl Event for StockMovementRecorded {
    fn event_type(&self) -> &'static str {
        "stock.movement.recorded"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// On-hand counter versus the signed ledger sum for one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub article_id: ArticleId,
    pub on_hand: i64,
    pub ledger_sum: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.on_hand == self.ledger_sum
    }
}

/// Applies stock movements: validate, compute, commit counter + ledger
/// entry atomically, notify observers.
///
/// Concurrent mutations to the same article serialize through the store's
/// expected-version check; a stale read is reloaded and retried a bounded
/// number of times before the conflict surfaces.
pub struct StockMutationService<S: StockStore> {
    store: Arc<S>,
    notifier: Option<Arc<dyn EventBus<StockMovementRecorded>>>,
}

impl<S: StockStore> Clone for StockMutationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S: StockStore> StockMutationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            notifier: None,
        }
    }

    /// Attach an observer bus; movements committed afterwards are announced
    /// on it (best-effort).
    pub fn with_notifier(mut self, bus: Arc<dyn EventBus<StockMovementRecorded>>) -> Self {
        self.notifier = Some(bus);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Apply one stock movement.
    ///
    /// Returns the new on-hand quantity and the committed ledger entry.
    /// Failure leaves both the article and the ledger exactly as they were:
    /// - `Validation` for a non-positive quantity
    /// - `NotFound` for an unknown article
    /// - `InsufficientStock` when an outbound movement would drive the
    ///   quantity below zero
    /// - `Conflict` when concurrent commits kept winning the version race
    pub fn apply_movement(
        &self,
        article_id: ArticleId,
        quantity: i64,
        kind: MovementKind,
        source: MovementSource,
        enterprise_id: EnterpriseId,
    ) -> DomainResult<(i64, MovementEntry)> {
        let entry = MovementEntry::new(
            article_id,
            enterprise_id,
            quantity,
            kind,
            source,
            Utc::now(),
        )?;

        let mut attempt = 0;
        loop {
            let mut article = self.store.article(article_id)?;
            if article.enterprise_id() != enterprise_id {
                return Err(DomainError::invalid_operation(
                    "article belongs to another enterprise",
                ));
            }

            let expected = ExpectedVersion::Exact(article.version());
            let new_on_hand = article.apply_signed_delta(entry.signed_quantity())?;

            match self.store.commit_movement(&article, expected, &entry) {
                Ok(()) => {
                    tracing::debug!(
                        article_id = %article_id,
                        kind = ?kind,
                        quantity,
                        new_on_hand,
                        "stock movement committed"
                    );
                    self.notify(&entry, new_on_hand);
                    return Ok((new_on_hand, entry));
                }
                Err(DomainError::Conflict(_)) if attempt < COMMIT_RETRIES => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Current on-hand quantity. Reads are idempotent: no mutation in
    /// between means the same answer twice.
    pub fn current_stock(&self, article_id: ArticleId) -> DomainResult<i64> {
        Ok(self.store.article(article_id)?.quantity_on_hand())
    }

    /// Ledger of one article, newest first.
    pub fn history(&self, article_id: ArticleId) -> DomainResult<Vec<MovementEntry>> {
        self.store.history(article_id)
    }

    pub fn movements_by_enterprise(&self, enterprise_id: EnterpriseId) -> Vec<MovementEntry> {
        self.store.movements_by_enterprise(enterprise_id)
    }

    pub fn movements_by_kind(&self, kind: MovementKind) -> Vec<MovementEntry> {
        self.store.movements_by_kind(kind)
    }

    pub fn movements_by_source(&self, source: MovementSource) -> Vec<MovementEntry> {
        self.store.movements_by_source(source)
    }

    pub fn movements_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<MovementEntry> {
        self.store.movements_between(from, to)
    }

    /// Compare the stored counter with the signed ledger sum.
    ///
    /// The ledger is the source of truth for historical reconciliation; a
    /// mismatch means a write path bypassed `commit_movement`.
    pub fn reconcile(&self, article_id: ArticleId) -> DomainResult<Reconciliation> {
        let article = self.store.article(article_id)?;
        let ledger_sum = self
            .store
            .history(article_id)?
            .iter()
            .map(MovementEntry::signed_quantity)
            .sum();

        Ok(Reconciliation {
            article_id,
            on_hand: article.quantity_on_hand(),
            ledger_sum,
        })
    }

    fn notify(&self, entry: &MovementEntry, new_on_hand: i64) {
        let Some(bus) = &self.notifier else {
            return;
        };

        let event = StockMovementRecorded {
            movement_id: entry.id,
            article_id: entry.article_id,
            enterprise_id: entry.enterprise_id,
            quantity: entry.quantity,
            kind: entry.kind,
            source: entry.source,
            new_on_hand,
            occurred_at: entry.occurred_at,
        };

        if let Err(e) = bus.publish(event) {
            tracing::warn!(error = ?e, "stock movement notification lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gestock_core::CategoryId;
    use gestock_events::InMemoryEventBus;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    #[derive(Default)]
    struct TestState {
        articles: HashMap<ArticleId, Article>,
        movements: Vec<MovementEntry>,
    }

    /// Minimal store for service tests; `conflicts` makes the next N
    /// commits fail with a stale-version conflict.
    #[derive(Default)]
    struct TestStore {
        state: Mutex<TestState>,
        conflicts: AtomicUsize,
    }

    impl TestStore {
        fn insert(&self, article: Article) {
            self.state
                .lock()
                .unwrap()
                .articles
                .insert(article.id_typed(), article);
        }

        fn inject_conflicts(&self, n: usize) {
            self.conflicts.store(n, Ordering::SeqCst);
        }

        fn movement_count(&self) -> usize {
            self.state.lock().unwrap().movements.len()
        }
    }

    impl StockStore for TestStore {
        fn article(&self, id: ArticleId) -> DomainResult<Article> {
            self.state
                .lock()
                .unwrap()
                .articles
                .get(&id)
                .cloned()
                .ok_or(DomainError::NotFound)
        }

        fn commit_movement(
            &self,
            article: &Article,
            expected: ExpectedVersion,
            entry: &MovementEntry,
        ) -> DomainResult<()> {
            if self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DomainError::conflict("injected stale version"));
            }

            let mut state = self.state.lock().unwrap();
            let stored = state
                .articles
                .get(&article.id_typed())
                .ok_or(DomainError::NotFound)?;
            expected.check(stored.version())?;
            state.articles.insert(article.id_typed(), article.clone());
            state.movements.push(entry.clone());
            Ok(())
        }

        fn history(&self, article_id: ArticleId) -> DomainResult<Vec<MovementEntry>> {
            let state = self.state.lock().unwrap();
            if !state.articles.contains_key(&article_id) {
                return Err(DomainError::NotFound);
            }
            let mut out: Vec<_> = state
                .movements
                .iter()
                .filter(|m| m.article_id == article_id)
                .cloned()
                .collect();
            out.reverse();
            Ok(out)
        }

        fn movements_by_enterprise(&self, enterprise_id: EnterpriseId) -> Vec<MovementEntry> {
            let mut out: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .movements
                .iter()
                .filter(|m| m.enterprise_id == enterprise_id)
                .cloned()
                .collect();
            out.reverse();
            out
        }

        fn movements_by_kind(&self, kind: MovementKind) -> Vec<MovementEntry> {
            let mut out: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .movements
                .iter()
                .filter(|m| m.kind == kind)
                .cloned()
                .collect();
            out.reverse();
            out
        }

        fn movements_by_source(&self, source: MovementSource) -> Vec<MovementEntry> {
            let mut out: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .movements
                .iter()
                .filter(|m| m.source == source)
                .cloned()
                .collect();
            out.reverse();
            out
        }

        fn movements_between(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Vec<MovementEntry> {
            let mut out: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .movements
                .iter()
                .filter(|m| m.occurred_at >= from && m.occurred_at < to)
                .cloned()
                .collect();
            out.reverse();
            out
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn test_article(enterprise_id: EnterpriseId) -> Article {
        Article::new(
            ArticleId::new(),
            enterprise_id,
            CategoryId::new(),
            "ART-001",
            "Clavier mécanique",
            dec("100"),
            dec("20"),
            Utc::now(),
        )
        .unwrap()
    }

    fn setup() -> (Arc<TestStore>, StockMutationService<TestStore>, ArticleId, EnterpriseId) {
        let enterprise_id = EnterpriseId::new();
        let store = Arc::new(TestStore::default());
        let article = test_article(enterprise_id);
        let article_id = article.id_typed();
        store.insert(article);
        let service = StockMutationService::new(Arc::clone(&store));
        (store, service, article_id, enterprise_id)
    }

    #[test]
    fn entry_increases_stock_and_appends_one_ledger_row() {
        let (store, service, article_id, enterprise_id) = setup();

        let (on_hand, entry) = service
            .apply_movement(
                article_id,
                10,
                MovementKind::Entry,
                MovementSource::Manual,
                enterprise_id,
            )
            .unwrap();

        assert_eq!(on_hand, 10);
        assert_eq!(entry.signed_quantity(), 10);
        assert_eq!(store.movement_count(), 1);
        assert_eq!(service.current_stock(article_id).unwrap(), 10);
    }

    #[test]
    fn insufficient_exit_leaves_article_and_ledger_untouched() {
        let (store, service, article_id, enterprise_id) = setup();
        service
            .apply_movement(article_id, 3, MovementKind::Entry, MovementSource::Manual, enterprise_id)
            .unwrap();

        let before = service.current_stock(article_id).unwrap();
        let err = service
            .apply_movement(article_id, 5, MovementKind::Exit, MovementSource::Sale, enterprise_id)
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 3,
                requested: 5
            }
        );
        assert_eq!(service.current_stock(article_id).unwrap(), before);
        assert_eq!(store.movement_count(), 1);
    }

    #[test]
    fn non_positive_quantity_is_rejected_before_any_load() {
        let (_, service, article_id, enterprise_id) = setup();
        for qty in [0, -2] {
            let err = service
                .apply_movement(article_id, qty, MovementKind::Entry, MovementSource::Manual, enterprise_id)
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn unknown_article_is_not_found() {
        let (_, service, _, enterprise_id) = setup();
        let err = service
            .apply_movement(
                ArticleId::new(),
                1,
                MovementKind::Entry,
                MovementSource::Manual,
                enterprise_id,
            )
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn enterprise_mismatch_is_rejected() {
        let (_, service, article_id, _) = setup();
        let err = service
            .apply_movement(
                article_id,
                1,
                MovementKind::Entry,
                MovementSource::Manual,
                EnterpriseId::new(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
    }

    #[test]
    fn stale_version_is_reloaded_and_retried() {
        let (store, service, article_id, enterprise_id) = setup();
        store.inject_conflicts(2);

        let (on_hand, _) = service
            .apply_movement(article_id, 4, MovementKind::Entry, MovementSource::Manual, enterprise_id)
            .unwrap();

        assert_eq!(on_hand, 4);
        assert_eq!(store.movement_count(), 1);
    }

    #[test]
    fn conflict_surfaces_once_retries_are_exhausted() {
        let (store, service, article_id, enterprise_id) = setup();
        store.inject_conflicts(usize::MAX);

        let err = service
            .apply_movement(article_id, 4, MovementKind::Entry, MovementSource::Manual, enterprise_id)
            .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(store.movement_count(), 0);
    }

    #[test]
    fn history_is_newest_first() {
        let (_, service, article_id, enterprise_id) = setup();
        service
            .apply_movement(article_id, 10, MovementKind::Entry, MovementSource::Manual, enterprise_id)
            .unwrap();
        service
            .apply_movement(article_id, 4, MovementKind::Exit, MovementSource::Sale, enterprise_id)
            .unwrap();

        let history = service.history(article_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Exit);
        assert_eq!(history[1].kind, MovementKind::Entry);
    }

    #[test]
    fn reconcile_matches_counter_to_ledger_sum() {
        let (_, service, article_id, enterprise_id) = setup();
        service
            .apply_movement(article_id, 10, MovementKind::Entry, MovementSource::Manual, enterprise_id)
            .unwrap();
        service
            .apply_movement(article_id, 3, MovementKind::CorrectionNeg, MovementSource::Manual, enterprise_id)
            .unwrap();

        let rec = service.reconcile(article_id).unwrap();
        assert_eq!(rec.on_hand, 7);
        assert_eq!(rec.ledger_sum, 7);
        assert!(rec.is_consistent());
    }

    #[test]
    fn committed_movement_is_announced_on_the_bus() {
        let (store, _, article_id, enterprise_id) = setup();
        let bus: Arc<InMemoryEventBus<StockMovementRecorded>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let service = StockMutationService::new(store).with_notifier(bus);

        service
            .apply_movement(article_id, 6, MovementKind::Entry, MovementSource::SupplierOrder, enterprise_id)
            .unwrap();

        let event = sub.try_recv().unwrap();
        assert_eq!(event.event_type(), "stock.movement.recorded");
        assert_eq!(event.article_id, article_id);
        assert_eq!(event.new_on_hand, 6);
        assert_eq!(event.source, MovementSource::SupplierOrder);
    }

    proptest! {
        /// Property: any sequence of accepted movements keeps the counter
        /// equal to the signed ledger sum, and never below zero.
        #[test]
        fn counter_always_equals_signed_ledger_sum(
            ops in prop::collection::vec((0u8..4, 1i64..50), 1..40)
        ) {
            let (_, service, article_id, enterprise_id) = setup();

            for (kind_idx, qty) in ops {
                let kind = match kind_idx {
                    0 => MovementKind::Entry,
                    1 => MovementKind::Exit,
                    2 => MovementKind::CorrectionPos,
                    _ => MovementKind::CorrectionNeg,
                };
                // Rejected movements must leave no trace; accepted ones keep
                // the invariant. Either way the check below holds.
                let _ = service.apply_movement(
                    article_id,
                    qty,
                    kind,
                    MovementSource::Manual,
                    enterprise_id,
                );

                let rec = service.reconcile(article_id).unwrap();
                prop_assert!(rec.is_consistent());
                prop_assert!(rec.on_hand >= 0);
            }
        }
    }
}
