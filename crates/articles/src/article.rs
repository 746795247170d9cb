use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestock_core::{
    AggregateRoot, ArticleId, CategoryId, DomainError, DomainResult, EnterpriseId,
};

/// An article held in stock by one enterprise.
///
/// `price_ttc` is derived from `price_ht` and `tax_rate` and recomputed on
/// every reprice. `quantity_on_hand` changes only through the stock layer's
/// `commit_movement`, which pairs each change with a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    id: ArticleId,
    enterprise_id: EnterpriseId,
    category_id: CategoryId,
    code: String,
    designation: String,
    price_ht: Decimal,
    tax_rate: Decimal,
    price_ttc: Decimal,
    quantity_on_hand: i64,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Article {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ArticleId,
        enterprise_id: EnterpriseId,
        category_id: CategoryId,
        code: impl Into<String>,
        designation: impl Into<String>,
        price_ht: Decimal,
        tax_rate: Decimal,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = code.into();
        let designation = designation.into();

        if code.trim().is_empty() {
            return Err(DomainError::validation("article code cannot be empty"));
        }
        if designation.trim().is_empty() {
            return Err(DomainError::validation(
                "article designation cannot be empty",
            ));
        }
        if price_ht < Decimal::ZERO {
            return Err(DomainError::validation("price_ht cannot be negative"));
        }
        if tax_rate < Decimal::ZERO {
            return Err(DomainError::validation("tax_rate cannot be negative"));
        }

        Ok(Self {
            id,
            enterprise_id,
            category_id,
            code,
            designation,
            price_ht,
            tax_rate,
            price_ttc: gestock_pricing::ttc(price_ht, tax_rate),
            quantity_on_hand: 0,
            version: 0,
            created_at,
        })
    }

    pub fn id_typed(&self) -> ArticleId {
        self.id
    }

    pub fn enterprise_id(&self) -> EnterpriseId {
        self.enterprise_id
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn designation(&self) -> &str {
        &self.designation
    }

    pub fn price_ht(&self) -> Decimal {
        self.price_ht
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn price_ttc(&self) -> Decimal {
        self.price_ttc
    }

    pub fn quantity_on_hand(&self) -> i64 {
        self.quantity_on_hand
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Evolve the on-hand quantity by a signed movement delta.
    ///
    /// Called by the stock layer inside the same critical section as the
    /// ledger append. Rejects any delta that would take the quantity below
    /// zero; on success returns the new on-hand quantity.
    pub fn apply_signed_delta(&mut self, delta: i64) -> DomainResult<i64> {
        let next = self.quantity_on_hand + delta;
        if next < 0 {
            return Err(DomainError::insufficient_stock(
                self.quantity_on_hand,
                delta.unsigned_abs() as i64,
            ));
        }
        self.quantity_on_hand = next;
        self.version += 1;
        Ok(next)
    }

    /// Change the price basis; `price_ttc` is recomputed from the new values.
    pub fn reprice(&mut self, price_ht: Decimal, tax_rate: Decimal) -> DomainResult<()> {
        if price_ht < Decimal::ZERO {
            return Err(DomainError::validation("price_ht cannot be negative"));
        }
        if tax_rate < Decimal::ZERO {
            return Err(DomainError::validation("tax_rate cannot be negative"));
        }
        self.price_ht = price_ht;
        self.tax_rate = tax_rate;
        self.price_ttc = gestock_pricing::ttc(price_ht, tax_rate);
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Article {
    type Id = ArticleId;

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

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn test_article(price_ht: &str, tax_rate: &str) -> Article {
        Article::new(
            ArticleId::new(),
            EnterpriseId::new(),
            CategoryId::new(),
            "ART-001",
            "Clavier mécanique",
            dec(price_ht),
            dec(tax_rate),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_article_derives_price_ttc() {
        let article = test_article("100", "20");
        assert_eq!(article.price_ttc(), dec("120.00"));
        assert_eq!(article.quantity_on_hand(), 0);
        assert_eq!(article.version(), 0);
    }

    #[test]
    fn blank_code_is_rejected() {
        let err = Article::new(
            ArticleId::new(),
            EnterpriseId::new(),
            CategoryId::new(),
            "   ",
            "Clavier",
            dec("10"),
            dec("20"),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = Article::new(
            ArticleId::new(),
            EnterpriseId::new(),
            CategoryId::new(),
            "ART-001",
            "Clavier",
            dec("-1"),
            dec("20"),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn apply_signed_delta_tracks_quantity_and_version() {
        let mut article = test_article("100", "20");
        assert_eq!(article.apply_signed_delta(10).unwrap(), 10);
        assert_eq!(article.apply_signed_delta(-4).unwrap(), 6);
        assert_eq!(article.quantity_on_hand(), 6);
        assert_eq!(article.version(), 2);
    }

    #[test]
    fn delta_below_zero_is_rejected_and_leaves_state_unchanged() {
        let mut article = test_article("100", "20");
        article.apply_signed_delta(3).unwrap();

        let err = article.apply_signed_delta(-5).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                available: 3,
                requested: 5
            }
        );
        assert_eq!(article.quantity_on_hand(), 3);
        assert_eq!(article.version(), 1);
    }

    #[test]
    fn reprice_recomputes_ttc() {
        let mut article = test_article("100", "20");
        article.reprice(dec("19.99"), dec("5.5")).unwrap();
        assert_eq!(article.price_ttc(), dec("21.09"));
    }
}
