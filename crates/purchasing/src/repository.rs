//! Supplier order lookup/persist capability.

use gestock_core::{DomainResult, EnterpriseId, ExpectedVersion, LineId, SupplierOrderId};

use crate::order::SupplierOrder;

/// Storage contract for supplier orders.
pub trait SupplierOrderRepository: Send + Sync {
    /// Load one order. `NotFound` if absent.
    fn find(&self, id: SupplierOrderId) -> DomainResult<SupplierOrder>;

    /// Look an order up by its enterprise-unique code. `NotFound` if absent.
    fn find_by_code(&self, enterprise_id: EnterpriseId, code: &str)
    -> DomainResult<SupplierOrder>;

    /// Load the order owning a line. `NotFound` if no order holds it.
    fn find_by_line(&self, line_id: LineId) -> DomainResult<SupplierOrder>;

    /// Insert a new order. `Conflict` if the id or the (enterprise, code)
    /// pair already exists.
    fn create(&self, order: SupplierOrder) -> DomainResult<SupplierOrder>;

    /// Persist order changes with an optimistic version check; `Conflict`
    /// if the stored version no longer matches.
    fn save(&self, order: &SupplierOrder, expected: ExpectedVersion) -> DomainResult<()>;

    /// Remove an order. `NotFound` if absent.
    fn delete(&self, id: SupplierOrderId) -> DomainResult<()>;
}
