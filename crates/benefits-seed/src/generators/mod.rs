//! Record generators for seed data.
//!
//! Every generator is a plain struct with a config and methods that take
//! `&mut impl Rng`; none of them touch the database.
//! - [`catalog`]: divisions, financers, modules, and module links
//! - [`UserGenerator`]: invitations, registered users, and financer memberships
//! - [`ArticleGenerator`]: article shells and reader interactions
//! - [`SessionGenerator`] / [`MetricGenerator`]: engagement logs and metrics
//! - [`InvoiceGenerator`]: monthly invoices and their items

pub mod article;
pub mod catalog;
pub mod engagement;
pub mod invoice;
pub mod sampling;
pub mod user;

pub use article::{ArticleGenConfig, ArticleGenerator, ArticleInteractionRecord, ArticleRecord};
pub use catalog::{
    Division, DivisionModuleRecord, DivisionRecord, Financer, FinancerModuleRecord,
    FinancerRecord, LinkOwner, LinkPricing, Module, ModuleLinkGenerator, ModuleLinkRecord,
    ModuleRecord,
};
pub use engagement::{
    EngagementLogRecord, EngagementMetricRecord, MetricGenerator, Population, SessionGenConfig,
    SessionGenerator,
};
pub use invoice::{
    GeneratedInvoice, InvoiceGenConfig, InvoiceGenerator, InvoiceItemRecord, InvoiceRecord,
};
pub use sampling::DayOffset;
pub use user::{
    AuditRecord, FinancerUserRecord, GeneratedBeneficiary, UserGenConfig, UserGenerator,
    UserRecord,
};
