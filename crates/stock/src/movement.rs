use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gestock_core::{ArticleId, DomainError, DomainResult, Entity, EnterpriseId, MovementId};

/// Direction-bearing kind of a stock movement.
///
/// Entries and positive corrections add to the on-hand quantity; exits and
/// negative corrections subtract from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Entry,
    Exit,
    CorrectionPos,
    CorrectionNeg,
}

impl MovementKind {
    /// +1 for inbound kinds, -1 for outbound kinds.
    pub fn direction(self) -> i64 {
        match self {
            MovementKind::Entry | MovementKind::CorrectionPos => 1,
            MovementKind::Exit | MovementKind::CorrectionNeg => -1,
        }
    }

    pub fn is_outbound(self) -> bool {
        self.direction() < 0
    }
}

/// Which request path produced a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementSource {
    Sale,
    ClientOrder,
    SupplierOrder,
    Manual,
}

/// One entry in the movement ledger.
///
/// Append-only: entries are never updated or deleted once committed.
/// Exactly one entry exists per stock mutation, written in the same atomic
/// unit as the on-hand quantity it explains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub id: MovementId,
    pub article_id: ArticleId,
    pub enterprise_id: EnterpriseId,
    /// Magnitude of the movement; the sign lives in `kind`.
    pub quantity: i64,
    pub kind: MovementKind,
    pub source: MovementSource,
    pub occurred_at: DateTime<Utc>,
}

impl MovementEntry {
    pub fn new(
        article_id: ArticleId,
        enterprise_id: EnterpriseId,
        quantity: i64,
        kind: MovementKind,
        source: MovementSource,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "movement quantity must be positive",
            ));
        }
        Ok(Self {
            id: MovementId::new(),
            article_id,
            enterprise_id,
            quantity,
            kind,
            source,
            occurred_at,
        })
    }

    /// Quantity with the kind's sign applied; ledger sums are taken over this.
    pub fn signed_quantity(&self) -> i64 {
        self.kind.direction() * self.quantity
    }
}

impl Entity for MovementEntry {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_quantity_follows_kind_direction() {
        let entry = MovementEntry::new(
            ArticleId::new(),
            EnterpriseId::new(),
            4,
            MovementKind::Exit,
            MovementSource::ClientOrder,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(entry.signed_quantity(), -4);

        let entry = MovementEntry::new(
            ArticleId::new(),
            EnterpriseId::new(),
            4,
            MovementKind::CorrectionPos,
            MovementSource::Manual,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(entry.signed_quantity(), 4);
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        for qty in [0, -3] {
            let err = MovementEntry::new(
                ArticleId::new(),
                EnterpriseId::new(),
                qty,
                MovementKind::Entry,
                MovementSource::Manual,
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }
}
