use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestock_core::{
    AggregateRoot, ArticleId, ClientId, ClientOrderId, DomainError, DomainResult, EnterpriseId,
    LineId,
};

/// Client order lifecycle.
///
/// `Ouverte → Validee → Expediee → Livree`, with `Annulee` reachable from
/// every non-terminal state. `Livree` and `Annulee` are terminal: no
/// further transition, no line mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientOrderStatus {
    Ouverte,
    Validee,
    Expediee,
    Livree,
    Annulee,
}

impl ClientOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientOrderStatus::Livree | ClientOrderStatus::Annulee)
    }

    /// One-directional transition table.
    pub fn can_transition_to(self, target: ClientOrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (ClientOrderStatus::Ouverte, ClientOrderStatus::Validee)
                | (ClientOrderStatus::Validee, ClientOrderStatus::Expediee)
                | (ClientOrderStatus::Expediee, ClientOrderStatus::Livree)
                | (_, ClientOrderStatus::Annulee)
        )
    }
}

/// One line of a client order.
///
/// `unit_price_ht` and `tax_rate` are snapshots taken from the article when
/// the line is created; later article price changes never alter them.
/// `line_total` is recomputed from the snapshot TTC whenever the quantity
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOrderLine {
    pub id: LineId,
    pub order_id: ClientOrderId,
    pub article_id: ArticleId,
    pub quantity: i64,
    pub unit_price_ht: Decimal,
    pub tax_rate: Decimal,
    pub unit_price_ttc: Decimal,
    pub line_total: Decimal,
}

/// A client order: party, lifecycle state, ordered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOrder {
    id: ClientOrderId,
    code: String,
    enterprise_id: EnterpriseId,
    client_id: ClientId,
    status: ClientOrderStatus,
    lines: Vec<ClientOrderLine>,
    version: u64,
    created_at: DateTime<Utc>,
}

impl ClientOrder {
    pub fn new(
        id: ClientOrderId,
        code: impl Into<String>,
        client_id: ClientId,
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
            client_id,
            status: ClientOrderStatus::Ouverte,
            lines: Vec::new(),
            version: 0,
            created_at,
        })
    }

    pub fn id_typed(&self) -> ClientOrderId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn enterprise_id(&self) -> EnterpriseId {
        self.enterprise_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn status(&self) -> ClientOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[ClientOrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_modifiable(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn line(&self, line_id: LineId) -> Option<&ClientOrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Move to `target` if the transition table allows it.
    pub fn transition(&mut self, target: ClientOrderStatus) -> DomainResult<()> {
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

    pub fn push_line(&mut self, line: ClientOrderLine) {
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

    pub fn remove_line(&mut self, line_id: LineId) -> DomainResult<ClientOrderLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or(DomainError::NotFound)?;
        self.version += 1;
        Ok(self.lines.remove(idx))
    }
}

impl AggregateRoot for ClientOrder {
    type Id = ClientOrderId;

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

    fn test_order() -> ClientOrder {
        ClientOrder::new(
            ClientOrderId::new(),
            "CMD-C-001",
            ClientId::new(),
            EnterpriseId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn test_line(order_id: ClientOrderId, quantity: i64) -> ClientOrderLine {
        ClientOrderLine {
            id: LineId::new(),
            order_id,
            article_id: ArticleId::new(),
            quantity,
            unit_price_ht: "100".parse().unwrap(),
            tax_rate: "20".parse().unwrap(),
            unit_price_ttc: "120.00".parse().unwrap(),
            line_total: "480.00".parse().unwrap(),
        }
    }

    #[test]
    fn new_order_opens_in_ouverte() {
        let order = test_order();
        assert_eq!(order.status(), ClientOrderStatus::Ouverte);
        assert!(order.is_modifiable());
        assert_eq!(order.version(), 0);
    }

    #[test]
    fn blank_code_is_rejected() {
        let err = ClientOrder::new(
            ClientOrderId::new(),
            " ",
            ClientId::new(),
            EnterpriseId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lifecycle_walks_one_direction() {
        let mut order = test_order();
        order.transition(ClientOrderStatus::Validee).unwrap();
        order.transition(ClientOrderStatus::Expediee).unwrap();
        order.transition(ClientOrderStatus::Livree).unwrap();
        assert_eq!(order.status(), ClientOrderStatus::Livree);
        assert!(!order.is_modifiable());
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut order = test_order();
        let err = order.transition(ClientOrderStatus::Expediee).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
        assert_eq!(order.status(), ClientOrderStatus::Ouverte);
    }

    #[test]
    fn going_backwards_is_rejected() {
        let mut order = test_order();
        order.transition(ClientOrderStatus::Validee).unwrap();
        let err = order.transition(ClientOrderStatus::Ouverte).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
    }

    #[test]
    fn any_non_terminal_state_can_cancel() {
        for walk in 0..3 {
            let mut order = test_order();
            let path = [
                ClientOrderStatus::Validee,
                ClientOrderStatus::Expediee,
                ClientOrderStatus::Livree,
            ];
            for target in path.iter().take(walk) {
                order.transition(*target).unwrap();
            }
            order.transition(ClientOrderStatus::Annulee).unwrap();
            assert_eq!(order.status(), ClientOrderStatus::Annulee);
        }
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for terminal in [ClientOrderStatus::Livree, ClientOrderStatus::Annulee] {
            for target in [
                ClientOrderStatus::Ouverte,
                ClientOrderStatus::Validee,
                ClientOrderStatus::Expediee,
                ClientOrderStatus::Livree,
                ClientOrderStatus::Annulee,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn line_bookkeeping_bumps_version() {
        let mut order = test_order();
        let line = test_line(order.id_typed(), 4);
        let line_id = line.id;

        order.push_line(line);
        assert_eq!(order.version(), 1);
        assert_eq!(order.lines().len(), 1);

        order
            .set_line_quantity(line_id, 2, "240.00".parse().unwrap())
            .unwrap();
        assert_eq!(order.line(line_id).unwrap().quantity, 2);
        assert_eq!(order.version(), 2);

        let removed = order.remove_line(line_id).unwrap();
        assert_eq!(removed.quantity, 2);
        assert!(order.lines().is_empty());
        assert_eq!(order.version(), 3);
    }

    #[test]
    fn unknown_line_is_not_found() {
        let mut order = test_order();
        let err = order.remove_line(LineId::new()).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
