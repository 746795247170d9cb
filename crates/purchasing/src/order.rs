use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestock_core::{
    AggregateRoot, ArticleId, DomainError, DomainResult, EnterpriseId, LineId, SupplierId,
    SupplierOrderId,
};

/// Supplier order lifecycle.
///
/// Same shape as the client order lifecycle: `Ouverte → Validee → Expediee
/// → Livree`, with `Annulee` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierOrderStatus {
    Ouverte,
    Validee,
    Expediee,
    Livree,
    Annulee,
}

impl SupplierOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SupplierOrderStatus::Livree | SupplierOrderStatus::Annulee
        )
    }

    /// One-directional transition table.
    pub fn can_transition_to(self, target: SupplierOrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (SupplierOrderStatus::Ouverte, SupplierOrderStatus::Validee)
                | (SupplierOrderStatus::Validee, SupplierOrderStatus::Expediee)
                | (SupplierOrderStatus::Expediee, SupplierOrderStatus::Livree)
                | (_, SupplierOrderStatus::Annulee)
        )
    }
}

/// One line of a supplier order, with price snapshots taken at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOrderLine {
    pub id: LineId,
    pub order_id: SupplierOrderId,
    pub article_id: ArticleId,
    pub quantity: i64,
    pub unit_price_ht: Decimal,
    pub tax_rate: Decimal,
    pub unit_price_ttc: Decimal,
    pub line_total: Decimal,
}

/// A supplier order: party, lifecycle state, ordered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOrder {
    id: SupplierOrderId,
    code: String,
    enterprise_id: EnterpriseId,
    supplier_id: SupplierId,
    status: SupplierOrderStatus,
    lines: Vec<SupplierOrderLine>,
    version: u64,
    created_at: DateTime<Utc>,
}

impl SupplierOrder {
    pub fn new(
        id: SupplierOrderId,
        code: impl Into<String>,
        supplier_id: SupplierId,
        enterprise_id: EnterpriseId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("order code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            enterprise_id,
            supplier_id,
            status: SupplierOrderStatus::Ouverte,
            lines: Vec::new(),
            version: 0,
            created_at,
        })
    }

    pub fn id_typed(&self) -> SupplierOrderId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn enterprise_id(&self) -> EnterpriseId {
        self.enterprise_id
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn status(&self) -> SupplierOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[SupplierOrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_modifiable(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn line(&self, line_id: LineId) -> Option<&SupplierOrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Move to `target` if the transition table allows it.
    pub fn transition(&mut self, target: SupplierOrderStatus) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_operation(format!(
                "order {} is in terminal state {:?}",
                self.code, self.status
            )));
        }
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invalid_operation(format!(
                "cannot transition order {} from {:?} to {:?}",
                self.code, self.status, target
            )));
        }
        self.status = target;
        self.version += 1;
        Ok(())
    }

    pub fn push_line(&mut self, line: SupplierOrderLine) {
        self.lines.push(line);
        self.version += 1;
    }

    pub fn set_line_quantity(
        &mut self,
        line_id: LineId,
        quantity: i64,
        line_total: Decimal,
    ) -> DomainResult<()> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(DomainError::NotFound)?;
        line.quantity = quantity;
        line.line_total = line_total;
        self.version += 1;
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: LineId) -> DomainResult<SupplierOrderLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or(DomainError::NotFound)?;
        self.version += 1;
        Ok(self.lines.remove(idx))
    }
}

impl AggregateRoot for SupplierOrder {
    type Id = SupplierOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order() -> SupplierOrder {
        SupplierOrder::new(
            SupplierOrderId::new(),
            "CMD-F-001",
            SupplierId::new(),
            EnterpriseId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_order_opens_in_ouverte() {
        let order = test_order();
        assert_eq!(order.status(), SupplierOrderStatus::Ouverte);
        assert!(order.is_modifiable());
    }

    #[test]
    fn livree_is_reached_through_the_full_path() {
        let mut order = test_order();
        order.transition(SupplierOrderStatus::Validee).unwrap();
        order.transition(SupplierOrderStatus::Expediee).unwrap();
        order.transition(SupplierOrderStatus::Livree).unwrap();
        assert!(order.status().is_terminal());
    }

    #[test]
    fn cancelled_order_rejects_further_transitions() {
        let mut order = test_order();
        order.transition(SupplierOrderStatus::Annulee).unwrap();
        let err = order.transition(SupplierOrderStatus::Validee).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut order = test_order();
        let err = order.transition(SupplierOrderStatus::Livree).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
        assert_eq!(order.status(), SupplierOrderStatus::Ouverte);
    }
}
