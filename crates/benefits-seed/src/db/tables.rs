//! Descriptions of every table the seeder writes.
//!
//! Column order here is the order rows are produced in and must match
//! `migrations/0001_schema.sql`.

use super::record::{TableSpec, WriteMode};

pub static DIVISIONS: TableSpec = TableSpec {
    name: "divisions",
    columns: &["id", "name", "country", "currency", "created_at", "updated_at"],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::IgnoreConflicts,
};

pub static FINANCERS: TableSpec = TableSpec {
    name: "financers",
    columns: &[
        "id",
        "division_id",
        "name",
        "timezone",
        "status",
        "created_at",
        "updated_at",
    ],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::IgnoreConflicts,
};

pub static MODULES: TableSpec = TableSpec {
    name: "modules",
    columns: &[
        "id",
        "name",
        "description",
        "category",
        "is_core",
        "created_at",
        "updated_at",
    ],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::IgnoreConflicts,
};

pub static DIVISION_MODULE: TableSpec = TableSpec {
    name: "division_module",
    columns: &[
        "id",
        "division_id",
        "module_id",
        "active",
        "price_per_beneficiary",
        "created_at",
    ],
    unique_keys: &[&["id"], &["division_id", "module_id"]],
    default_mode: WriteMode::IgnoreConflicts,
};

pub static FINANCER_MODULE: TableSpec = TableSpec {
    name: "financer_module",
    columns: &[
        "id",
        "financer_id",
        "module_id",
        "active",
        "price_per_beneficiary",
        "created_at",
    ],
    unique_keys: &[&["id"], &["financer_id", "module_id"]],
    default_mode: WriteMode::IgnoreConflicts,
};

pub static USERS: TableSpec = TableSpec {
    name: "users",
    columns: &[
        "id",
        "email",
        "first_name",
        "last_name",
        "locale",
        "currency",
        "timezone",
        "enabled",
        "sirh_id",
        "created_at",
        "updated_at",
    ],
    unique_keys: &[&["id"], &["email"]],
    default_mode: WriteMode::Strict,
};

pub static FINANCER_USER: TableSpec = TableSpec {
    name: "financer_user",
    columns: &[
        "id",
        "financer_id",
        "user_id",
        "active",
        "active_from",
        "created_at",
        "updated_at",
    ],
    unique_keys: &[&["id"], &["financer_id", "user_id"]],
    default_mode: WriteMode::Strict,
};

pub static AUDITS: TableSpec = TableSpec {
    name: "audits",
    columns: &[
        "id",
        "event",
        "auditable_type",
        "auditable_id",
        "financer_id",
        "new_values",
        "ip_address",
        "user_agent",
        "created_at",
    ],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::Strict,
};

pub static ARTICLES: TableSpec = TableSpec {
    name: "articles",
    columns: &["id", "financer_id", "title", "published_at", "created_at"],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::Strict,
};

pub static ARTICLE_INTERACTIONS: TableSpec = TableSpec {
    name: "article_interactions",
    columns: &[
        "id",
        "user_id",
        "article_id",
        "reaction",
        "is_favorite",
        "created_at",
    ],
    unique_keys: &[&["id"], &["user_id", "article_id"]],
    default_mode: WriteMode::IgnoreConflicts,
};

pub static ENGAGEMENT_LOGS: TableSpec = TableSpec {
    name: "engagement_logs",
    columns: &["id", "user_id", "event", "target", "metadata", "logged_at"],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::Strict,
};

pub static ENGAGEMENT_METRICS: TableSpec = TableSpec {
    name: "engagement_metrics",
    columns: &[
        "id",
        "financer_id",
        "metric",
        "period",
        "date_from",
        "date_to",
        "data",
        "created_at",
    ],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::Strict,
};

pub static INVOICES: TableSpec = TableSpec {
    name: "invoices",
    columns: &[
        "id",
        "invoice_number",
        "invoice_type",
        "issuer_type",
        "issuer_id",
        "recipient_type",
        "recipient_id",
        "billing_period_start",
        "billing_period_end",
        "status",
        "currency",
        "subtotal_htva",
        "vat_rate",
        "vat_amount",
        "total_ttc",
        "due_date",
        "confirmed_at",
        "sent_at",
        "paid_at",
        "created_at",
    ],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::Strict,
};

pub static INVOICE_ITEMS: TableSpec = TableSpec {
    name: "invoice_items",
    columns: &[
        "id",
        "invoice_id",
        "item_type",
        "module_id",
        "label",
        "beneficiaries_count",
        "unit_price_htva",
        "quantity",
        "subtotal_htva",
        "vat_rate",
        "vat_amount",
        "total_ttc",
        "prorata_days",
        "total_days",
    ],
    unique_keys: &[&["id"]],
    default_mode: WriteMode::Strict,
};

/// Every table in dependency order (referenced tables first).
pub static ALL: &[&TableSpec] = &[
    &DIVISIONS,
    &FINANCERS,
    &MODULES,
    &DIVISION_MODULE,
    &FINANCER_MODULE,
    &USERS,
    &FINANCER_USER,
    &AUDITS,
    &ARTICLES,
    &ARTICLE_INTERACTIONS,
    &ENGAGEMENT_LOGS,
    &ENGAGEMENT_METRICS,
    &INVOICES,
    &INVOICE_ITEMS,
];

/// Looks up a table by name.
pub fn by_name(name: &str) -> Option<&'static TableSpec> {
    ALL.iter().copied().find(|t| t.name == name)
}
