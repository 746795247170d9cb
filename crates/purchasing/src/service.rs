//! Supplier order service: line mutations and lifecycle transitions.

use std::sync::Arc;

use chrono::Utc;

use gestock_core::{
    AggregateRoot, ArticleId, DomainError, DomainResult, EnterpriseId, ExpectedVersion, LineId,
    SupplierId, SupplierOrderId,
};
use gestock_stock::{MovementKind, MovementSource, StockMutationService, StockStore};

use crate::order::{SupplierOrder, SupplierOrderLine, SupplierOrderStatus};
use crate::repository::SupplierOrderRepository;

/// Orchestrates supplier orders against their repository and the stock
/// layer.
///
/// Supplier-order lines are supply: a line records its goods as on-hand
/// when it is created. Shrinking or deleting a line takes the goods back
/// out, which fails with `InsufficientStock` when they were consumed in
/// the meantime; the line is then left untouched.
pub struct SupplierOrderService<R, S>
where
    R: SupplierOrderRepository,
    S: StockStore,
{
    orders: Arc<R>,
    stock: StockMutationService<S>,
}

impl<R, S> SupplierOrderService<R, S>
where
    R: SupplierOrderRepository,
    S: StockStore,
{
    pub fn new(orders: Arc<R>, stock: StockMutationService<S>) -> Self {
        Self { orders, stock }
    }

    /// Open a new order in `Ouverte`.
    pub fn create(
        &self,
        code: impl Into<String>,
        supplier_id: SupplierId,
        enterprise_id: EnterpriseId,
    ) -> DomainResult<SupplierOrder> {
        let order = SupplierOrder::new(
            SupplierOrderId::new(),
            code,
            supplier_id,
            enterprise_id,
            Utc::now(),
        )?;
        self.orders.create(order)
    }

    pub fn find(&self, order_id: SupplierOrderId) -> DomainResult<SupplierOrder> {
        self.orders.find(order_id)
    }

    /// Add a line: record the goods on-hand, snapshot prices, persist the
    /// line. The entry movement and the line form one unit.
    pub fn add_line(
        &self,
        order_id: SupplierOrderId,
        article_id: ArticleId,
        quantity: i64,
    ) -> DomainResult<SupplierOrderLine> {
        if quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        let order = self.orders.find(order_id)?;
        self.ensure_modifiable(&order)?;

        let article = self.stock.store().article(article_id)?;
        let unit_price_ttc = gestock_pricing::ttc(article.price_ht(), article.tax_rate());

        self.stock.apply_movement(
            article_id,
            quantity,
            MovementKind::Entry,
            MovementSource::SupplierOrder,
            order.enterprise_id(),
        )?;

        let line = SupplierOrderLine {
            id: LineId::new(),
            order_id,
            article_id,
            quantity,
            unit_price_ht: article.price_ht(),
            tax_rate: article.tax_rate(),
            unit_price_ttc,
            line_total: gestock_pricing::line_total(unit_price_ttc, quantity),
        };

        let expected = ExpectedVersion::Exact(order.version());
        let mut updated = order;
        updated.push_line(line.clone());

        if let Err(e) = self.orders.save(&updated, expected) {
            self.reverse(article_id, quantity, MovementKind::Exit, updated.enterprise_id());
            return Err(e);
        }

        Ok(line)
    }

    /// Change a line's quantity, applying the compensating movement for the
    /// delta (supply line: more quantity means more stock in, less means
    /// stock back out).
    pub fn update_quantity(
        &self,
        line_id: LineId,
        new_quantity: i64,
    ) -> DomainResult<SupplierOrderLine> {
        if new_quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        let order = self.orders.find_by_line(line_id)?;
        self.ensure_modifiable(&order)?;

        let line = order.line(line_id).ok_or(DomainError::NotFound)?.clone();
        let delta = new_quantity - line.quantity;
        if delta == 0 {
            return Ok(line);
        }

        let (kind, magnitude) = if delta > 0 {
            (MovementKind::Entry, delta)
        } else {
            (MovementKind::Exit, -delta)
        };
        self.stock.apply_movement(
            line.article_id,
            magnitude,
            kind,
            MovementSource::SupplierOrder,
            order.enterprise_id(),
        )?;

        let line_total = gestock_pricing::line_total(line.unit_price_ttc, new_quantity);
        let expected = ExpectedVersion::Exact(order.version());
        let mut updated = order;
        updated.set_line_quantity(line_id, new_quantity, line_total)?;

        if let Err(e) = self.orders.save(&updated, expected) {
            let inverse = if delta > 0 {
                MovementKind::Exit
            } else {
                MovementKind::Entry
            };
            self.reverse(line.article_id, magnitude, inverse, updated.enterprise_id());
            return Err(e);
        }

        Ok(updated.line(line_id).cloned().unwrap_or(line))
    }

    /// Delete a line, taking its goods back out of stock.
    pub fn delete_line(&self, line_id: LineId) -> DomainResult<()> {
        let order = self.orders.find_by_line(line_id)?;
        self.ensure_modifiable(&order)?;

        let line = order.line(line_id).ok_or(DomainError::NotFound)?.clone();

        self.stock.apply_movement(
            line.article_id,
            line.quantity,
            MovementKind::Exit,
            MovementSource::SupplierOrder,
            order.enterprise_id(),
        )?;

        let expected = ExpectedVersion::Exact(order.version());
        let mut updated = order;
        updated.remove_line(line_id)?;

        if let Err(e) = self.orders.save(&updated, expected) {
            self.reverse(line.article_id, line.quantity, MovementKind::Entry, updated.enterprise_id());
            return Err(e);
        }

        Ok(())
    }

    /// Apply a lifecycle transition.
    pub fn transition(
        &self,
        order_id: SupplierOrderId,
        target: SupplierOrderStatus,
    ) -> DomainResult<SupplierOrderStatus> {
        let order = self.orders.find(order_id)?;
        let expected = ExpectedVersion::Exact(order.version());

        let mut updated = order;
        updated.transition(target)?;
        self.orders.save(&updated, expected)?;

        tracing::debug!(order_id = %order_id, status = ?target, "supplier order transitioned");
        Ok(updated.status())
    }

    /// Delete a non-terminal order, removing the goods of every line from
    /// stock first. If one removal fails (goods already consumed), the ones
    /// already applied are rolled back and the order is left untouched.
    pub fn delete_order(&self, order_id: SupplierOrderId) -> DomainResult<()> {
        let order = self.orders.find(order_id)?;
        if order.status().is_terminal() {
            return Err(DomainError::invalid_operation(
                "orders in a terminal state cannot be deleted",
            ));
        }

        let mut removed: Vec<&SupplierOrderLine> = Vec::new();
        for line in order.lines() {
            match self.stock.apply_movement(
                line.article_id,
                line.quantity,
                MovementKind::Exit,
                MovementSource::SupplierOrder,
                order.enterprise_id(),
            ) {
                Ok(_) => removed.push(line),
                Err(e) => {
                    for done in removed {
                        self.reverse(
                            done.article_id,
                            done.quantity,
                            MovementKind::Entry,
                            order.enterprise_id(),
                        );
                    }
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.orders.delete(order_id) {
            for line in order.lines() {
                self.reverse(
                    line.article_id,
                    line.quantity,
                    MovementKind::Entry,
                    order.enterprise_id(),
                );
            }
            return Err(e);
        }

        Ok(())
    }

    fn ensure_modifiable(&self, order: &SupplierOrder) -> DomainResult<()> {
        if !order.is_modifiable() {
            return Err(DomainError::invalid_operation(format!(
                "order {} is in terminal state {:?} and cannot be modified",
                order.code(),
                order.status()
            )));
        }
        Ok(())
    }

    /// Undo a stock effect after a failed order write. Failure here is
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
            MovementSource::SupplierOrder,
            enterprise_id,
        ) {
            tracing::error!(
                article_id = %article_id,
                quantity,
                error = %e,
                "failed to reverse stock effect after order write failure"
            );
        }
    }
}
