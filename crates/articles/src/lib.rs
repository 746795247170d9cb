//! Article domain module.
//!
//! Articles are plain records connected to enterprises, categories, orders
//! and movements by id. The on-hand quantity is owned by the stock layer:
//! nothing in this crate (or behind [`ArticleRepository::save`]) writes it
//! directly.

pub mod article;
pub mod repository;

pub use article::Article;
pub use repository::ArticleRepository;
