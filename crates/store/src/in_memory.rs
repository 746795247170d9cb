use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use gestock_articles::{Article, ArticleRepository};
use gestock_core::{
    AggregateRoot, ArticleId, ClientOrderId, DomainError, DomainResult, EnterpriseId,
    ExpectedVersion, LineId, SaleId, SupplierOrderId,
};
use gestock_ordering::{ClientOrder, ClientOrderRepository};
use gestock_purchasing::{SupplierOrder, SupplierOrderRepository};
use gestock_sales::{Sale, SaleRepository};
use gestock_stock::{MovementEntry, MovementKind, MovementSource, StockStore};

/// One article plus its ledger, guarded together.
///
/// Keeping the counter and the movements in one map slot is what makes
/// `commit_movement` atomic: the slot's entry guard covers both writes.
#[derive(Debug, Clone)]
struct ArticleSlot {
    article: Article,
    movements: Vec<MovementEntry>,
}

/// In-memory store for all repositories.
///
/// Backed by sharded concurrent maps: operations on different articles or
/// orders proceed in parallel, while two commits against the same article
/// serialize on its slot and resolve through the expected-version check.
/// Not persistent; intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    articles: DashMap<ArticleId, ArticleSlot>,
    article_codes: DashMap<(EnterpriseId, String), ArticleId>,
    client_orders: DashMap<ClientOrderId, ClientOrder>,
    supplier_orders: DashMap<SupplierOrderId, SupplierOrder>,
    sales: DashMap<SaleId, Sale>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn all_movements(&self) -> Vec<MovementEntry> {
        let mut out: Vec<MovementEntry> = self
            .articles
            .iter()
            .flat_map(|slot| slot.movements.clone())
            .collect();
        // Newest first; MovementId is time-ordered (UUIDv7) and breaks ties.
        out.sort_by(|a, b| {
            (b.occurred_at, b.id.as_uuid().as_bytes()).cmp(&(a.occurred_at, a.id.as_uuid().as_bytes()))
        });
        out
    }

    fn article_is_referenced(&self, id: ArticleId) -> bool {
        self.client_orders
            .iter()
            .any(|o| o.lines().iter().any(|l| l.article_id == id))
            || self
                .supplier_orders
                .iter()
                .any(|o| o.lines().iter().any(|l| l.article_id == id))
            || self
                .sales
                .iter()
                .any(|s| s.lines().iter().any(|l| l.article_id == id))
    }
}

impl ArticleRepository for InMemoryStore {
    fn find(&self, id: ArticleId) -> DomainResult<Article> {
        self.articles
            .get(&id)
            .map(|slot| slot.article.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str) -> DomainResult<Article> {
        let id = self
            .article_codes
            .get(&(enterprise_id, code.to_string()))
            .map(|e| *e)
            .ok_or(DomainError::NotFound)?;
        ArticleRepository::find(self, id)
    }

    fn list_by_enterprise(&self, enterprise_id: EnterpriseId) -> Vec<Article> {
        let mut out: Vec<Article> = self
            .articles
            .iter()
            .filter(|slot| slot.article.enterprise_id() == enterprise_id)
            .map(|slot| slot.article.clone())
            .collect();
        out.sort_by(|a, b| a.code().cmp(b.code()));
        out
    }

    fn create(&self, article: Article) -> DomainResult<Article> {
        let key = (article.enterprise_id(), article.code().to_string());
        match self.article_codes.entry(key) {
            Entry::Occupied(_) => {
                return Err(DomainError::conflict(format!(
                    "article code '{}' already exists for enterprise",
                    article.code()
                )));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(article.id_typed());
            }
        }

        match self.articles.entry(article.id_typed()) {
            Entry::Occupied(_) => {
                self.article_codes
                    .remove(&(article.enterprise_id(), article.code().to_string()));
                Err(DomainError::conflict("article id already exists"))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ArticleSlot {
                    article: article.clone(),
                    movements: Vec::new(),
                });
                Ok(article)
            }
        }
    }

    fn save(&self, article: &Article, expected: ExpectedVersion) -> DomainResult<()> {
        let mut slot = self
            .articles
            .get_mut(&article.id_typed())
            .ok_or(DomainError::NotFound)?;
        expected.check(slot.article.version())?;
        // The counter moves only through commit_movement; a save that tries
        // to carry a different counter is a bypassing write path.
        if article.quantity_on_hand() != slot.article.quantity_on_hand() {
            return Err(DomainError::invalid_operation(
                "quantity_on_hand changes only through stock movements",
            ));
        }
        slot.article = article.clone();
        Ok(())
    }

    fn delete(&self, id: ArticleId) -> DomainResult<()> {
        if self.article_is_referenced(id) {
            return Err(DomainError::conflict(
                "article is referenced by order or sale lines",
            ));
        }
        let (_, slot) = self.articles.remove(&id).ok_or(DomainError::NotFound)?;
        self.article_codes
            .remove(&(slot.article.enterprise_id(), slot.article.code().to_string()));
        Ok(())
    }
}

impl StockStore for InMemoryStore {
    fn article(&self, id: ArticleId) -> DomainResult<Article> {
        ArticleRepository::find(self, id)
    }

    fn commit_movement(
        &self,
        article: &Article,
        expected: ExpectedVersion,
        entry: &MovementEntry,
    ) -> DomainResult<()> {
        // The entry guard covers both writes: no reader sees the counter
        // without the ledger row, or the row without the counter.
        let mut slot = self
            .articles
            .get_mut(&article.id_typed())
            .ok_or(DomainError::NotFound)?;
        expected.check(slot.article.version())?;

        slot.article = article.clone();
        slot.movements.push(entry.clone());
        Ok(())
    }

    fn history(&self, article_id: ArticleId) -> DomainResult<Vec<MovementEntry>> {
        let slot = self.articles.get(&article_id).ok_or(DomainError::NotFound)?;
        let mut out = slot.movements.clone();
        out.reverse();
        Ok(out)
    }

    fn movements_by_enterprise(&self, enterprise_id: EnterpriseId) -> Vec<MovementEntry> {
        let mut out = self.all_movements();
        out.retain(|m| m.enterprise_id == enterprise_id);
        out
    }

    fn movements_by_kind(&self, kind: MovementKind) -> Vec<MovementEntry> {
        let mut out = self.all_movements();
        out.retain(|m| m.kind == kind);
        out
    }

    fn movements_by_source(&self, source: MovementSource) -> Vec<MovementEntry> {
        let mut out = self.all_movements();
        out.retain(|m| m.source == source);
        out
    }

    fn movements_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<MovementEntry> {
        let mut out = self.all_movements();
        out.retain(|m| m.occurred_at >= from && m.occurred_at < to);
        out
    }
}

impl ClientOrderRepository for InMemoryStore {
    fn find(&self, id: ClientOrderId) -> DomainResult<ClientOrder> {
        self.client_orders
            .get(&id)
            .map(|o| o.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str) -> DomainResult<ClientOrder> {
        self.client_orders
            .iter()
            .find(|o| o.enterprise_id() == enterprise_id && o.code() == code)
            .map(|o| o.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_line(&self, line_id: LineId) -> DomainResult<ClientOrder> {
        self.client_orders
            .iter()
            .find(|o| o.lines().iter().any(|l| l.id == line_id))
            .map(|o| o.clone())
            .ok_or(DomainError::NotFound)
    }

    fn create(&self, order: ClientOrder) -> DomainResult<ClientOrder> {
        if self
            .client_orders
            .iter()
            .any(|o| o.enterprise_id() == order.enterprise_id() && o.code() == order.code())
        {
            return Err(DomainError::conflict(format!(
                "client order code '{}' already exists for enterprise",
                order.code()
            )));
        }
        match self.client_orders.entry(order.id_typed()) {
            Entry::Occupied(_) => Err(DomainError::conflict("client order id already exists")),
            Entry::Vacant(vacant) => {
                vacant.insert(order.clone());
                Ok(order)
            }
        }
    }

    fn save(&self, order: &ClientOrder, expected: ExpectedVersion) -> DomainResult<()> {
        let mut stored = self
            .client_orders
            .get_mut(&order.id_typed())
            .ok_or(DomainError::NotFound)?;
        expected.check(stored.version())?;
        *stored = order.clone();
        Ok(())
    }

    fn delete(&self, id: ClientOrderId) -> DomainResult<()> {
        self.client_orders
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }
}

impl SupplierOrderRepository for InMemoryStore {
    fn find(&self, id: SupplierOrderId) -> DomainResult<SupplierOrder> {
        self.supplier_orders
            .get(&id)
            .map(|o| o.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_code(
        &self,
        enterprise_id: EnterpriseId,
        code: &str,
    ) -> DomainResult<SupplierOrder> {
        self.supplier_orders
            .iter()
            .find(|o| o.enterprise_id() == enterprise_id && o.code() == code)
            .map(|o| o.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_line(&self, line_id: LineId) -> DomainResult<SupplierOrder> {
        self.supplier_orders
            .iter()
            .find(|o| o.lines().iter().any(|l| l.id == line_id))
            .map(|o| o.clone())
            .ok_or(DomainError::NotFound)
    }

    fn create(&self, order: SupplierOrder) -> DomainResult<SupplierOrder> {
        if self
            .supplier_orders
            .iter()
            .any(|o| o.enterprise_id() == order.enterprise_id() && o.code() == order.code())
        {
            return Err(DomainError::conflict(format!(
                "supplier order code '{}' already exists for enterprise",
                order.code()
            )));
        }
        match self.supplier_orders.entry(order.id_typed()) {
            Entry::Occupied(_) => Err(DomainError::conflict("supplier order id already exists")),
            Entry::Vacant(vacant) => {
                vacant.insert(order.clone());
                Ok(order)
            }
        }
    }

    fn save(&self, order: &SupplierOrder, expected: ExpectedVersion) -> DomainResult<()> {
        let mut stored = self
            .supplier_orders
            .get_mut(&order.id_typed())
            .ok_or(DomainError::NotFound)?;
        expected.check(stored.version())?;
        *stored = order.clone();
        Ok(())
    }

    fn delete(&self, id: SupplierOrderId) -> DomainResult<()> {
        self.supplier_orders
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }
}

impl SaleRepository for InMemoryStore {
    fn find(&self, id: SaleId) -> DomainResult<Sale> {
        self.sales
            .get(&id)
            .map(|s| s.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str) -> DomainResult<Sale> {
        self.sales
            .iter()
            .find(|s| s.enterprise_id() == enterprise_id && s.code() == code)
            .map(|s| s.clone())
            .ok_or(DomainError::NotFound)
    }

    fn find_by_line(&self, line_id: LineId) -> DomainResult<Sale> {
        self.sales
            .iter()
            .find(|s| s.lines().iter().any(|l| l.id == line_id))
            .map(|s| s.clone())
            .ok_or(DomainError::NotFound)
    }

    fn create(&self, sale: Sale) -> DomainResult<Sale> {
        if self
            .sales
            .iter()
            .any(|s| s.enterprise_id() == sale.enterprise_id() && s.code() == sale.code())
        {
            return Err(DomainError::conflict(format!(
                "sale code '{}' already exists for enterprise",
                sale.code()
            )));
        }
        match self.sales.entry(sale.id_typed()) {
            Entry::Occupied(_) => Err(DomainError::conflict("sale id already exists")),
            Entry::Vacant(vacant) => {
                vacant.insert(sale.clone());
                Ok(sale)
            }
        }
    }

    fn save(&self, sale: &Sale, expected: ExpectedVersion) -> DomainResult<()> {
        let mut stored = self
            .sales
            .get_mut(&sale.id_typed())
            .ok_or(DomainError::NotFound)?;
        expected.check(stored.version())?;
        *stored = sale.clone();
        Ok(())
    }

    fn delete(&self, id: SaleId) -> DomainResult<()> {
        self.sales
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }
}
