//! Storage capability consumed by the stock mutation service.

use chrono::{DateTime, Utc};

use gestock_articles::Article;
use gestock_core::{ArticleId, DomainResult, EnterpriseId, ExpectedVersion};

use crate::movement::{MovementEntry, MovementKind, MovementSource};

/// Storage contract for the paired counter-plus-ledger write.
///
/// `commit_movement` is the only way a stored on-hand quantity changes.
/// Implementations must make the article update and the ledger append one
/// atomic unit under an expected-version check: no observer may see the new
/// quantity without the entry, or the entry without the quantity. Commits
/// for the same article serialize; commits for different articles must not
/// block each other.
pub trait StockStore: Send + Sync {
    /// Load one article. `NotFound` if absent.
    fn article(&self, id: ArticleId) -> DomainResult<Article>;

    /// Atomically persist the mutated article and append its ledger entry.
    ///
    /// `Conflict` if the stored version no longer matches `expected`; in
    /// that case nothing is written.
    fn commit_movement(
        &self,
        article: &Article,
        expected: ExpectedVersion,
        entry: &MovementEntry,
    ) -> DomainResult<()>;

    /// Ledger of one article, newest first. `NotFound` if the article is
    /// absent.
    fn history(&self, article_id: ArticleId) -> DomainResult<Vec<MovementEntry>>;

    /// All movements of one enterprise, newest first.
    fn movements_by_enterprise(&self, enterprise_id: EnterpriseId) -> Vec<MovementEntry>;

    /// All movements of one kind, newest first.
    fn movements_by_kind(&self, kind: MovementKind) -> Vec<MovementEntry>;

    /// All movements from one source, newest first.
    fn movements_by_source(&self, source: MovementSource) -> Vec<MovementEntry>;

    /// All movements with `from <= occurred_at < to`, newest first.
    fn movements_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<MovementEntry>;
}
