//! Sale lookup/persist capability.

use gestock_core::{DomainResult, EnterpriseId, ExpectedVersion, LineId, SaleId};

use crate::sale::Sale;

/// Storage contract for sales.
pub trait SaleRepository: Send + Sync {
    /// Load one sale. `NotFound` if absent.
    fn find(&self, id: SaleId) -> DomainResult<Sale>;

    /// Look a sale up by its enterprise-unique code. `NotFound` if absent.
    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str) -> DomainResult<Sale>;

    /// Load the sale owning a line. `NotFound` if no sale holds it.
    fn find_by_line(&self, line_id: LineId) -> DomainResult<Sale>;

    /// Insert a new sale. `Conflict` if the id or the (enterprise, code)
    /// pair already exists.
    fn create(&self, sale: Sale) -> DomainResult<Sale>;

    /// Persist sale changes with an optimistic version check; `Conflict`
    /// if the stored version no longer matches.
    fn save(&self, sale: &Sale, expected: ExpectedVersion) -> DomainResult<()>;

    /// Remove a sale. `NotFound` if absent.
    fn delete(&self, id: SaleId) -> DomainResult<()>;
}
