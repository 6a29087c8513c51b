pub mod analytics;
pub mod automation;
pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod resolve;
pub mod scoring;
pub mod store;

pub use domain::contact::{Contact, ContactId, LeadStatus};
pub use domain::deal::{Deal, DealId, DealStatus};
pub use domain::property::{Property, PropertyId, PropertyStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use knowledge::KnowledgeBase;
pub use store::{CrmStore, StoreError};
