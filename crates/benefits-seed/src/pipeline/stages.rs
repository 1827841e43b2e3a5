//! Stage bodies: generate records and push them through the run context.

use rand::Rng;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::db::{BulkWriter, tables};
use crate::errors::SeedError;
use crate::generators::{
    ArticleGenConfig, ArticleGenerator, DivisionModuleRecord, DivisionRecord, EngagementLogRecord,
    Financer, FinancerModuleRecord, FinancerRecord, InvoiceGenConfig, InvoiceGenerator, LinkOwner,
    MetricGenerator, ModuleLinkGenerator, ModuleRecord, Population, SessionGenConfig,
    SessionGenerator, UserGenerator, sampling,
};
use crate::models::EngagementEvent;
use crate::pipeline::context::RunContext;
use crate::pipeline::plan::Stage;

/// Runs one stage, clearing its reset tables first.
pub async fn run<W: BulkWriter>(stage: Stage, ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    for &table in stage.resets() {
        let removed = ctx.clear(table).await?;
        info!(table = table.name, removed, "Reset table");
    }

    match stage {
        Stage::Divisions => divisions(ctx).await,
        Stage::Financers => financers(ctx).await,
        Stage::Users => users(ctx).await,
        Stage::Modules => modules(ctx).await,
        Stage::Invoices => invoices(ctx).await,
        Stage::Engagement => engagement(ctx).await,
    }
}

fn require<T>(items: &[T], what: &str) -> Result<(), SeedError> {
    if items.is_empty() {
        return Err(SeedError::precondition(format!("no {what} available")));
    }
    Ok(())
}

async fn divisions<W: BulkWriter>(ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    let divisions = ctx.refs.divisions.clone();
    require(&divisions, "divisions")?;

    for division in divisions {
        let created_at = ctx.now;
        ctx.push(DivisionRecord {
            division,
            created_at,
        })
        .await?;
    }
    info!(count = ctx.refs.divisions.len(), "Seeded divisions");
    Ok(())
}

async fn financers<W: BulkWriter>(ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    let financers = ctx.refs.financers.clone();
    require(&financers, "financers")?;

    for financer in financers {
        let created_at = ctx.now;
        ctx.push(FinancerRecord {
            financer,
            created_at,
        })
        .await?;
    }
    info!(count = ctx.refs.financers.len(), "Seeded financers");
    Ok(())
}

/// Module catalog plus active links for every division and financer.
async fn modules<W: BulkWriter>(ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    let modules = ctx.refs.modules.clone();
    require(&modules, "modules")?;

    for module in &modules {
        let created_at = ctx.now;
        ctx.push(ModuleRecord {
            module: module.clone(),
            created_at,
        })
        .await?;
    }
    ctx.flush(&tables::MODULES).await?;

    let link_gen = ModuleLinkGenerator::new();
    let divisions: Vec<Uuid> = ctx.refs.divisions.iter().map(|d| d.id).collect();
    let financers: Vec<Uuid> = ctx.refs.financers.iter().map(|f| f.id).collect();

    for &division in &divisions {
        for module in &modules {
            let link = link_gen.link(LinkOwner::Division(division), module, ctx.now, &mut ctx.rng);
            ctx.push(DivisionModuleRecord(link)).await?;
        }
    }
    ctx.flush(&tables::DIVISION_MODULE).await?;

    for &financer in &financers {
        for module in &modules {
            let link = link_gen.link(LinkOwner::Financer(financer), module, ctx.now, &mut ctx.rng);
            ctx.push(FinancerModuleRecord(link)).await?;
        }
    }
    ctx.flush(&tables::FINANCER_MODULE).await?;

    info!(
        modules = modules.len(),
        links = (divisions.len() + financers.len()) * modules.len(),
        "Seeded modules"
    );
    Ok(())
}

/// Registered users with memberships, plus a surplus of pending invitations.
///
/// Each financer's invitations, users and memberships are written in that
/// order and flushed before the next financer, so every financer's users
/// start in a fresh batch.
async fn users<W: BulkWriter>(ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    let financers = ctx.refs.financers.clone();
    require(&financers, "financers")?;

    let user_gen = UserGenerator::new();
    let registered = ctx.config().users_per_financer;
    let (low, high) = ctx.config().invited_surplus_percent;

    for financer in &financers {
        let surplus: usize = ctx.rng.gen_range(low..=high) as usize;
        let invited = registered + registered * surplus / 100;

        let mut users = Vec::with_capacity(registered);
        let mut memberships = Vec::with_capacity(registered);
        for index in 0..invited {
            let beneficiary =
                user_gen.generate(financer.id, index, index < registered, ctx.now, &mut ctx.rng);

            ctx.refs.add_invitation(financer.id);
            ctx.push(beneficiary.invitation).await?;

            if let Some((user, membership)) = beneficiary.registration {
                ctx.refs.add_user(financer.id, user.id);
                users.push(user);
                memberships.push(membership);
            }
        }
        ctx.flush(&tables::AUDITS).await?;

        for user in users {
            ctx.push(user).await?;
        }
        ctx.flush(&tables::USERS).await?;

        for membership in memberships {
            ctx.push(membership).await?;
        }
        ctx.flush(&tables::FINANCER_USER).await?;

        info!(financer = financer.name, registered, invited, "Seeded users");
    }
    Ok(())
}

async fn invoices<W: BulkWriter>(ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    let divisions = ctx.refs.divisions.clone();
    let financers = ctx.refs.financers.clone();
    let modules = ctx.refs.modules.clone();
    require(&divisions, "divisions")?;
    require(&financers, "financers")?;

    let invoice_gen = InvoiceGenerator::with_config(InvoiceGenConfig {
        invoices_per_entity: ctx.config().invoices_per_entity,
        ..Default::default()
    });

    let mut generated = Vec::new();
    for division in &divisions {
        generated.extend(invoice_gen.for_division(division, &modules, ctx.now, &mut ctx.rng));
    }
    let division_invoices = generated.len();
    for financer in &financers {
        generated.extend(invoice_gen.for_financer(financer, &modules, ctx.now, &mut ctx.rng));
    }
    let financer_invoices = generated.len() - division_invoices;

    let mut items = Vec::new();
    for invoice in generated {
        ctx.push(invoice.invoice).await?;
        items.extend(invoice.items);
    }
    ctx.flush(&tables::INVOICES).await?;

    for item in items {
        ctx.push(item).await?;
    }
    ctx.flush(&tables::INVOICE_ITEMS).await?;

    info!(division_invoices, financer_invoices, "Seeded invoices");
    Ok(())
}

/// Articles, reactions, engagement logs and period metrics.
///
/// Runs one pass per table over every financer with users: articles, then
/// reactions, then logs (article views and login sessions), then metrics.
async fn engagement<W: BulkWriter>(ctx: &mut RunContext<W>) -> Result<(), SeedError> {
    if !ctx.refs.has_users() {
        return Err(SeedError::precondition(
            "no users seeded in this run to build engagement from",
        ));
    }

    let config = ctx.config().clone();
    let session_gen = SessionGenerator::with_config(SessionGenConfig {
        window_days: config.session_window_days,
        ..Default::default()
    });
    let article_gen = ArticleGenerator::with_config(ArticleGenConfig {
        articles_per_financer: config.articles_per_financer,
        interaction_rate: config.interaction_rate,
        day_offset: config.day_offset,
        ..Default::default()
    });
    let module_keys: Vec<&'static str> = ctx.refs.modules.iter().map(|m| m.key).collect();
    let financers: Vec<Financer> = ctx
        .refs
        .financers
        .iter()
        .filter(|f| !ctx.refs.users_of(f.id).is_empty())
        .cloned()
        .collect();
    let now = ctx.now;

    for financer in &financers {
        for article in article_gen.generate_articles(financer.id, now, &mut ctx.rng) {
            ctx.refs.add_article(financer.id, article.id);
            ctx.push(article).await?;
        }
    }
    ctx.flush(&tables::ARTICLES).await?;

    let mut views = Vec::new();
    for financer in &financers {
        let users = ctx.refs.users_of(financer.id).to_vec();
        for article_id in ctx.refs.articles_of(financer.id).to_vec() {
            for interaction in
                article_gen.generate_interactions(article_id, &users, now, &mut ctx.rng)?
            {
                views.push(EngagementLogRecord {
                    id: sampling::uuid(&mut ctx.rng),
                    user_id: interaction.user_id,
                    event: EngagementEvent::ArticleViewed,
                    target: Some(article_id.to_string()),
                    metadata: json!({
                        "financer_id": financer.id,
                        "reaction": interaction.reaction.as_str(),
                    }),
                    logged_at: interaction.created_at,
                });
                ctx.push(interaction).await?;
            }
        }
    }
    ctx.flush(&tables::ARTICLE_INTERACTIONS).await?;

    let interactions = views.len();
    for view in views {
        ctx.push(view).await?;
    }
    let mut session_logs = 0;
    for financer in &financers {
        for user_id in ctx.refs.users_of(financer.id).to_vec() {
            let logs =
                session_gen.generate_for_user(user_id, financer.id, &module_keys, now, &mut ctx.rng)?;
            session_logs += logs.len();
            for log in logs {
                ctx.push(log).await?;
            }
        }
    }
    ctx.flush(&tables::ENGAGEMENT_LOGS).await?;

    for financer in &financers {
        let population = Population {
            registered: ctx.refs.users_of(financer.id).len() as u64,
            invited: ctx.refs.invited_to(financer.id),
        };
        for metric in MetricGenerator::generate(financer.id, population, now, &mut ctx.rng) {
            ctx.push(metric).await?;
        }
    }
    ctx.flush(&tables::ENGAGEMENT_METRICS).await?;

    info!(
        financers = financers.len(),
        interactions, session_logs, "Seeded engagement"
    );
    Ok(())
}
