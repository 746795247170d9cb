//! Client order lookup/persist capability.

use gestock_core::{ClientOrderId, DomainResult, EnterpriseId, ExpectedVersion, LineId};

use crate::order::ClientOrder;

/// Storage contract for client orders.
pub trait ClientOrderRepository: Send + Sync {
    /// Load one order. `NotFound` if absent.
    fn find(&self, id: ClientOrderId) -> DomainResult<ClientOrder>;

    /// Look an order up by its enterprise-unique code. `NotFound` if absent.
    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str) -> DomainResult<ClientOrder>;

    /// Load the order owning a line. `NotFound` if no order holds it.
    fn find_by_line(&self, line_id: LineId) -> DomainResult<ClientOrder>;

    /// Insert a new order. `Conflict` if the id or the (enterprise, code)
    /// pair already exists.
    fn create(&self, order: ClientOrder) -> DomainResult<ClientOrder>;

    /// Persist order changes with an optimistic version check; `Conflict`
    /// if the stored version no longer matches.
    fn save(&self, order: &ClientOrder, expected: ExpectedVersion) -> DomainResult<()>;

    /// Remove an order. `NotFound` if absent.
    fn delete(&self, id: ClientOrderId) -> DomainResult<()>;
}
