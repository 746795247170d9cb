//! Sales: short lifecycle (`EnCours → Finalisee`) and line management.
//!
//! Sale lines are demand, like client-order lines: the stock exit happens
//! when a line is added. Finalization requires at least one line,
//! re-validates every line, and is terminal: a finalized sale rejects all
//! further mutation.

pub mod repository;
pub mod sale;
pub mod service;

pub use repository::SaleRepository;
pub use sale::{Sale, SaleLine, SaleStatus};
pub use service::SaleService;
