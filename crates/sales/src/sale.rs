use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestock_core::{
    AggregateRoot, ArticleId, ClientId, DomainError, DomainResult, EnterpriseId, LineId, SaleId,
};

/// Sale lifecycle: open, then finalized. `Finalisee` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    EnCours,
    Finalisee,
}

impl SaleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SaleStatus::Finalisee)
    }

    pub fn can_transition_to(self, target: SaleStatus) -> bool {
        matches!((self, target), (SaleStatus::EnCours, SaleStatus::Finalisee))
    }
}

/// One line of a sale, with price snapshots taken at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: LineId,
    pub sale_id: SaleId,
    pub article_id: ArticleId,
    pub quantity: i64,
    pub unit_price_ht: Decimal,
    pub tax_rate: Decimal,
    pub unit_price_ttc: Decimal,
    pub line_total: Decimal,
}

/// A sale: client, lifecycle state, ordered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    code: String,
    enterprise_id: EnterpriseId,
    client_id: ClientId,
    status: SaleStatus,
    lines: Vec<SaleLine>,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(
        id: SaleId,
        code: impl Into<String>,
        client_id: ClientId,
        enterprise_id: EnterpriseId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("sale code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            enterprise_id,
            client_id,
            status: SaleStatus::EnCours,
            lines: Vec::new(),
            version: 0,
            created_at,
        })
    }

    pub fn id_typed(&self) -> SaleId {
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

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_modifiable(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn line(&self, line_id: LineId) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Move to `target` if the transition table allows it.
    ///
    /// Structural only; the service layer owns the finalization checks
    /// (non-empty, lines re-validated).
    pub fn transition(&mut self, target: SaleStatus) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_operation(format!(
                "sale {} is already finalized",
                self.code
            )));
        }
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invalid_operation(format!(
                "cannot transition sale {} from {:?} to {:?}",
                self.code, self.status, target
            )));
        }
        self.status = target;
        self.version += 1;
        Ok(())
    }

    pub fn push_line(&mut self, line: SaleLine) {
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

    pub fn remove_line(&mut self, line_id: LineId) -> DomainResult<SaleLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or(DomainError::NotFound)?;
        self.version += 1;
        Ok(self.lines.remove(idx))
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
