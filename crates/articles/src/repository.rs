//! Article lookup/persist capability.

use gestock_core::{ArticleId, DomainResult, EnterpriseId, ExpectedVersion};

use crate::article::Article;

/// Storage contract for articles.
///
/// Implementations must treat `quantity_on_hand` as owned by the stock
/// layer: it changes only through the paired movement commit, and `save`
/// refuses to carry a changed counter. No direct-write path to the counter
/// exists, so it cannot drift from the ledger.
pub trait ArticleRepository: Send + Sync {
    /// Load one article. `NotFound` if absent.
    fn find(&self, id: ArticleId) -> DomainResult<Article>;

    /// Look an article up by its enterprise-unique code. `NotFound` if absent.
    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str) -> DomainResult<Article>;

    /// All articles of one enterprise.
    fn list_by_enterprise(&self, enterprise_id: EnterpriseId) -> Vec<Article>;

    /// Insert a new article. `Conflict` if the id or the (enterprise, code)
    /// pair already exists.
    fn create(&self, article: Article) -> DomainResult<Article>;

    /// Persist metadata changes with an optimistic version check.
    ///
    /// Refuses with `InvalidOperation` if the article carries a counter
    /// that differs from the stored one.
    fn save(&self, article: &Article, expected: ExpectedVersion) -> DomainResult<()>;

    /// Remove an article. `Conflict` while any order or sale line still
    /// references it; `NotFound` if absent.
    fn delete(&self, id: ArticleId) -> DomainResult<()>;
}
