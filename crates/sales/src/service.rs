//! Sale service: line mutations and finalization.

use std::sync::Arc;

use chrono::Utc;

use gestock_core::{
    AggregateRoot, ArticleId, ClientId, DomainError, DomainResult, EnterpriseId, ExpectedVersion,
    LineId, SaleId,
};
use gestock_stock::{MovementKind, MovementSource, StockMutationService, StockStore};

use crate::repository::SaleRepository;
use crate::sale::{Sale, SaleLine, SaleStatus};

/// Orchestrates sales against their repository and the stock layer.
///
/// Sale lines are demand and hold their stock from the moment they are
/// added: an `Exit` movement commits with each line. Finalization therefore
/// cannot run out of stock; it re-validates the sale structurally (at least
/// one line, every article still resolvable) and seals it.
pub struct SaleService<R, S>
where
    R: SaleRepository,
    S: StockStore,
{
    sales: Arc<R>,
    stock: StockMutationService<S>,
}

impl<R, S> SaleService<R, S>
where
    R: SaleRepository,
    S: StockStore,
{
    pub fn new(sales: Arc<R>, stock: StockMutationService<S>) -> Self {
        Self { sales, stock }
    }

    /// Open a new sale in `EnCours`.
    pub fn create(
        &self,
        code: impl Into<String>,
        client_id: ClientId,
        enterprise_id: EnterpriseId,
    ) -> DomainResult<Sale> {
        let sale = Sale::new(SaleId::new(), code, client_id, enterprise_id, Utc::now())?;
        self.sales.create(sale)
    }

    pub fn find(&self, sale_id: SaleId) -> DomainResult<Sale> {
        self.sales.find(sale_id)
    }

    /// Add a line: exit stock, snapshot prices, persist the line.
    pub fn add_line(
        &self,
        sale_id: SaleId,
        article_id: ArticleId,
        quantity: i64,
    ) -> DomainResult<SaleLine> {
        if quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        let sale = self.sales.find(sale_id)?;
        self.ensure_modifiable(&sale)?;

        let article = self.stock.store().article(article_id)?;
        let unit_price_ttc = gestock_pricing::ttc(article.price_ht(), article.tax_rate());

        self.stock.apply_movement(
            article_id,
            quantity,
            MovementKind::Exit,
            MovementSource::Sale,
            sale.enterprise_id(),
        )?;

        let line = SaleLine {
            id: LineId::new(),
            sale_id,
            article_id,
            quantity,
            unit_price_ht: article.price_ht(),
            tax_rate: article.tax_rate(),
            unit_price_ttc,
            line_total: gestock_pricing::line_total(unit_price_ttc, quantity),
        };

        let expected = ExpectedVersion::Exact(sale.version());
        let mut updated = sale;
        updated.push_line(line.clone());

        if let Err(e) = self.sales.save(&updated, expected) {
            self.reverse(article_id, quantity, MovementKind::Entry, updated.enterprise_id());
            return Err(e);
        }

        Ok(line)
    }

    /// Change a line's quantity, applying the compensating movement for
    /// the delta.
    pub fn update_quantity(&self, line_id: LineId, new_quantity: i64) -> DomainResult<SaleLine> {
        if new_quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        let sale = self.sales.find_by_line(line_id)?;
        self.ensure_modifiable(&sale)?;

        let line = sale.line(line_id).ok_or(DomainError::NotFound)?.clone();
        let delta = new_quantity - line.quantity;
        if delta == 0 {
            return Ok(line);
        }

        let (kind, magnitude) = if delta > 0 {
            (MovementKind::Exit, delta)
        } else {
            (MovementKind::Entry, -delta)
        };
        self.stock.apply_movement(
            line.article_id,
            magnitude,
            kind,
            MovementSource::Sale,
            sale.enterprise_id(),
        )?;

        let line_total = gestock_pricing::line_total(line.unit_price_ttc, new_quantity);
        let expected = ExpectedVersion::Exact(sale.version());
        let mut updated = sale;
        updated.set_line_quantity(line_id, new_quantity, line_total)?;

        if let Err(e) = self.sales.save(&updated, expected) {
            let inverse = if delta > 0 {
                MovementKind::Entry
            } else {
                MovementKind::Exit
            };
            self.reverse(line.article_id, magnitude, inverse, updated.enterprise_id());
            return Err(e);
        }

        Ok(updated.line(line_id).cloned().unwrap_or(line))
    }

    /// Delete a line and restore its stock.
    pub fn delete_line(&self, line_id: LineId) -> DomainResult<()> {
        let sale = self.sales.find_by_line(line_id)?;
        self.ensure_modifiable(&sale)?;

        let line = sale.line(line_id).ok_or(DomainError::NotFound)?.clone();

        self.stock.apply_movement(
            line.article_id,
            line.quantity,
            MovementKind::Entry,
            MovementSource::Sale,
            sale.enterprise_id(),
        )?;

        let expected = ExpectedVersion::Exact(sale.version());
        let mut updated = sale;
        updated.remove_line(line_id)?;

        if let Err(e) = self.sales.save(&updated, expected) {
            self.reverse(line.article_id, line.quantity, MovementKind::Exit, updated.enterprise_id());
            return Err(e);
        }

        Ok(())
    }

    /// Finalize a sale: at least one line, every line re-validated, then
    /// the terminal transition. The first failed check aborts with the sale
    /// unchanged.
    pub fn finalize(&self, sale_id: SaleId) -> DomainResult<SaleStatus> {
        let sale = self.sales.find(sale_id)?;

        if sale.status().is_terminal() {
            return Err(DomainError::invalid_operation(format!(
                "sale {} is already finalized",
                sale.code()
            )));
        }
        if sale.lines().is_empty() {
            return Err(DomainError::invalid_operation(
                "cannot finalize a sale without lines",
            ));
        }

        // Every line's stock was exited when the line was added; re-check
        // that each article is still resolvable before sealing the sale.
        for line in sale.lines() {
            self.stock.store().article(line.article_id)?;
            if line.quantity <= 0 {
                return Err(DomainError::invalid_operation(
                    "sale holds a line with non-positive quantity",
                ));
            }
        }

        let expected = ExpectedVersion::Exact(sale.version());
        let mut updated = sale;
        updated.transition(SaleStatus::Finalisee)?;
        self.sales.save(&updated, expected)?;

        tracing::debug!(sale_id = %sale_id, "sale finalized");
        Ok(updated.status())
    }

    /// Apply a lifecycle transition. Finalization always runs through
    /// [`SaleService::finalize`] so its checks cannot be bypassed.
    pub fn transition(&self, sale_id: SaleId, target: SaleStatus) -> DomainResult<SaleStatus> {
        match target {
            SaleStatus::Finalisee => self.finalize(sale_id),
            SaleStatus::EnCours => {
                let sale = self.sales.find(sale_id)?;
                Err(DomainError::invalid_operation(format!(
                    "cannot transition sale {} from {:?} to {:?}",
                    sale.code(),
                    sale.status(),
                    target
                )))
            }
        }
    }

    /// Delete a sale still in progress, restoring the stock of every line
    /// first.
    pub fn delete_sale(&self, sale_id: SaleId) -> DomainResult<()> {
        let sale = self.sales.find(sale_id)?;
        if sale.status().is_terminal() {
            return Err(DomainError::invalid_operation(
                "finalized sales cannot be deleted",
            ));
        }

        let mut restored: Vec<&SaleLine> = Vec::new();
        for line in sale.lines() {
            match self.stock.apply_movement(
                line.article_id,
                line.quantity,
                MovementKind::Entry,
                MovementSource::Sale,
                sale.enterprise_id(),
            ) {
                Ok(_) => restored.push(line),
                Err(e) => {
                    for done in restored {
                        self.reverse(
                            done.article_id,
                            done.quantity,
                            MovementKind::Exit,
                            sale.enterprise_id(),
                        );
                    }
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.sales.delete(sale_id) {
            for line in sale.lines() {
                self.reverse(
                    line.article_id,
                    line.quantity,
                    MovementKind::Exit,
                    sale.enterprise_id(),
                );
            }
            return Err(e);
        }

        Ok(())
    }

    fn ensure_modifiable(&self, sale: &Sale) -> DomainResult<()> {
        if !sale.is_modifiable() {
            return Err(DomainError::invalid_operation(format!(
                "sale {} is finalized and cannot be modified",
                sale.code()
            )));
        }
        Ok(())
    }

    /// Undo a stock effect after a failed sale write. Failure here is
    /// logged, not propagated.
    fn reverse(
        &self,
        article_id: ArticleId,
        quantity: i64,
        kind: MovementKind,
        enterprise_id: EnterpriseId,
    ) {
        if let Err(e) = self.stock.apply_movement(
            article_id,
            quantity,
            kind,
            MovementSource::Sale,
            enterprise_id,
        ) {
            tracing::error!(
                article_id = %article_id,
                quantity,
                error = %e,
                "failed to reverse stock effect after sale write failure"
            );
        }
    }
}
