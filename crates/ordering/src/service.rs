//! Client order service: line mutations and lifecycle transitions.

use std::sync::Arc;

use chrono::Utc;

use gestock_core::{
    AggregateRoot, ArticleId, ClientId, ClientOrderId, DomainError, DomainResult, EnterpriseId,
    ExpectedVersion, LineId,
};
use gestock_stock::{MovementKind, MovementSource, StockMutationService, StockStore};

use crate::order::{ClientOrder, ClientOrderLine, ClientOrderStatus};
use crate::repository::ClientOrderRepository;

/// Orchestrates client orders against their repository and the stock layer.
///
/// Client-order lines are demand: adding or growing a line exits stock,
/// shrinking or deleting one re-enters it. The state machine is consulted
/// before any stock side effect; a failed order save after a stock effect
/// is compensated with the inverse movement so neither side is left
/// half-applied.
pub struct ClientOrderService<R, S>
where
    R: ClientOrderRepository,
    S: StockStore,
{
    orders: Arc<R>,
    stock: StockMutationService<S>,
}

impl<R, S> ClientOrderService<R, S>
where
    R: ClientOrderRepository,
    S: StockStore,
{
    pub fn new(orders: Arc<R>, stock: StockMutationService<S>) -> Self {
        Self { orders, stock }
    }

    /// Open a new order in `Ouverte`.
    pub fn create(
        &self,
        code: impl Into<String>,
        client_id: ClientId,
        enterprise_id: EnterpriseId,
    ) -> DomainResult<ClientOrder> {
        let order = ClientOrder::new(
            ClientOrderId::new(),
            code,
            client_id,
            enterprise_id,
            Utc::now(),
        )?;
        self.orders.create(order)
    }

    pub fn find(&self, order_id: ClientOrderId) -> DomainResult<ClientOrder> {
        self.orders.find(order_id)
    }

    /// Add a line: exit stock, snapshot prices, persist the line.
    ///
    /// The stock exit and the line form one unit: an `InsufficientStock`
    /// exit persists no line, and a failed order save reverses the exit.
    pub fn add_line(
        &self,
        order_id: ClientOrderId,
        article_id: ArticleId,
        quantity: i64,
    ) -> DomainResult<ClientOrderLine> {
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
            MovementKind::Exit,
            MovementSource::ClientOrder,
            order.enterprise_id(),
        )?;

        let line = ClientOrderLine {
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
            self.reverse(article_id, quantity, MovementKind::Entry, updated.enterprise_id());
            return Err(e);
        }

        Ok(line)
    }

    /// Change a line's quantity, applying the compensating movement for the
    /// delta. The price snapshots stay as they were at line creation; only
    /// the total is recomputed.
    pub fn update_quantity(
        &self,
        line_id: LineId,
        new_quantity: i64,
    ) -> DomainResult<ClientOrderLine> {
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

        // Demand line: more quantity means more stock out, less means back in.
        let (kind, magnitude) = if delta > 0 {
            (MovementKind::Exit, delta)
        } else {
            (MovementKind::Entry, -delta)
        };
        self.stock.apply_movement(
            line.article_id,
            magnitude,
            kind,
            MovementSource::ClientOrder,
            order.enterprise_id(),
        )?;

        let line_total = gestock_pricing::line_total(line.unit_price_ttc, new_quantity);
        let expected = ExpectedVersion::Exact(order.version());
        let mut updated = order;
        updated.set_line_quantity(line_id, new_quantity, line_total)?;

        if let Err(e) = self.orders.save(&updated, expected) {
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
        let order = self.orders.find_by_line(line_id)?;
        self.ensure_modifiable(&order)?;

        let line = order.line(line_id).ok_or(DomainError::NotFound)?.clone();

        self.stock.apply_movement(
            line.article_id,
            line.quantity,
            MovementKind::Entry,
            MovementSource::ClientOrder,
            order.enterprise_id(),
        )?;

        let expected = ExpectedVersion::Exact(order.version());
        let mut updated = order;
        updated.remove_line(line_id)?;

        if let Err(e) = self.orders.save(&updated, expected) {
            self.reverse(line.article_id, line.quantity, MovementKind::Exit, updated.enterprise_id());
            return Err(e);
        }

        Ok(())
    }

    /// Apply a lifecycle transition.
    pub fn transition(
        &self,
        order_id: ClientOrderId,
        target: ClientOrderStatus,
    ) -> DomainResult<ClientOrderStatus> {
        let order = self.orders.find(order_id)?;
        let expected = ExpectedVersion::Exact(order.version());

        let mut updated = order;
        updated.transition(target)?;
        self.orders.save(&updated, expected)?;

        tracing::debug!(order_id = %order_id, status = ?target, "client order transitioned");
        Ok(updated.status())
    }

    /// Delete a non-terminal order, restoring the stock of every line
    /// first. If one restoration fails the ones already applied are rolled
    /// back and the order is left untouched.
    pub fn delete_order(&self, order_id: ClientOrderId) -> DomainResult<()> {
        let order = self.orders.find(order_id)?;
        if order.status().is_terminal() {
            return Err(DomainError::invalid_operation(
                "orders in a terminal state cannot be deleted",
            ));
        }

        let mut restored: Vec<&ClientOrderLine> = Vec::new();
        for line in order.lines() {
            match self.stock.apply_movement(
                line.article_id,
                line.quantity,
                MovementKind::Entry,
                MovementSource::ClientOrder,
                order.enterprise_id(),
            ) {
                Ok(_) => restored.push(line),
                Err(e) => {
                    for done in restored {
                        self.reverse(
                            done.article_id,
                            done.quantity,
                            MovementKind::Exit,
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
                    MovementKind::Exit,
                    order.enterprise_id(),
                );
            }
            return Err(e);
        }

        Ok(())
    }

    fn ensure_modifiable(&self, order: &ClientOrder) -> DomainResult<()> {
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
    /// logged, not propagated: the original error is the one the caller
    /// needs to see.
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
            MovementSource::ClientOrder,
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
