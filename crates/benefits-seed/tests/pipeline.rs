//! End-to-end runs of the loading pipeline against the in-memory store.
//!
//! These cover batching, idempotent reference stages, transactional
//! rollback, and conflict handling without needing a database.

use benefits_seed::config::SeedConfig;
use benefits_seed::db::{BulkWriter, MemoryStore, Record, Store, WriteMode, tables};
use benefits_seed::errors::SeedError;
use benefits_seed::generators::catalog::{FINANCERS, MODULES};
use benefits_seed::generators::{
    DayOffset, FinancerModuleRecord, LinkOwner, ModuleLinkGenerator, UserGenerator,
};
use benefits_seed::models::Environment;
use benefits_seed::pipeline::{RunContext, RunState, SeedRun, Stage, plan_for};
use rand::SeedableRng;
use rand::rngs::StdRng;
use time::OffsetDateTime;

fn config(env: Environment, batch_size: usize) -> SeedConfig {
    SeedConfig {
        environment: env,
        batch_size,
        seed: Some(12345),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_write_calls_are_ceil_of_rows_over_capacity() {
    let store = MemoryStore::new();
    let writer = store.begin().await.unwrap();
    let mut ctx = RunContext::new(
        writer,
        config(Environment::Dev, 100),
        StdRng::seed_from_u64(1),
        OffsetDateTime::now_utc(),
    );

    let user_gen = UserGenerator::new();
    let financer = FINANCERS[0].id;
    let rows = 1050;
    for index in 0..rows {
        let (user, _) = user_gen
            .generate(financer, index, true, ctx.now, &mut ctx.rng)
            .registration
            .unwrap();
        ctx.push(user).await.unwrap();
    }
    ctx.flush_all().await.unwrap();

    let stats = ctx.stats();
    ctx.into_writer().commit().await.unwrap();

    let sizes = store.batch_sizes(&tables::USERS);
    assert_eq!(sizes.len(), rows.div_ceil(100));
    assert_eq!(sizes.iter().sum::<usize>(), rows);
    assert_eq!(store.row_count(&tables::USERS), rows);
    assert_eq!(stats[0].written, rows as u64);
    assert_eq!(stats[0].skipped, 0);
}

#[tokio::test]
async fn test_invoice_stage_write_calls_per_table() {
    let store = MemoryStore::new();
    let mut config = config(Environment::Staging, 100);
    config.seed = Some(3);

    let report = SeedRun::new(store.clone(), config, vec![Stage::Invoices])
        .execute()
        .await
        .unwrap();

    for table in [&tables::INVOICES, &tables::INVOICE_ITEMS] {
        let rows = report.table(table.name).unwrap().generated as usize;
        let sizes = store.batch_sizes(table);
        assert_eq!(sizes.len(), rows.div_ceil(100), "{}: {sizes:?}", table.name);
        assert_eq!(sizes.iter().sum::<usize>(), rows);
    }
}

#[tokio::test]
async fn test_mixed_stages_write_calls_per_table() {
    let store = MemoryStore::new();
    let config = SeedConfig {
        financer_limit: Some(2),
        users_per_financer: 60,
        ..config(Environment::Local, 50)
    };
    let plan = plan_for(config.environment);

    let report = SeedRun::new(store.clone(), config, plan)
        .execute()
        .await
        .unwrap();

    // Users, invitations and memberships are flushed per financer.
    let per_financer = ["users", "audits", "financer_user"];
    for stats in report
        .tables
        .iter()
        .filter(|t| !per_financer.contains(&t.table))
    {
        assert_eq!(
            stats.batches,
            stats.generated.div_ceil(50),
            "{}: {} rows in {} writes",
            stats.table,
            stats.generated,
            stats.batches
        );
    }
    assert_eq!(store.batch_sizes(&tables::USERS), [50, 10].repeat(2));
}

#[tokio::test]
async fn test_module_links_are_idempotent() {
    let store = MemoryStore::new();
    let plan = vec![Stage::Divisions, Stage::Financers, Stage::Modules];

    let first = SeedRun::new(store.clone(), config(Environment::Staging, 50), plan.clone())
        .execute()
        .await
        .unwrap();
    let links = (
        store.row_count(&tables::DIVISION_MODULE),
        store.row_count(&tables::FINANCER_MODULE),
    );
    assert!(links.0 > 0 && links.1 > 0);

    // A different seed draws different link ids; the (owner, module) key still collides.
    let mut again = config(Environment::Staging, 50);
    again.seed = Some(999);
    let second = SeedRun::new(store.clone(), again, plan)
        .execute()
        .await
        .unwrap();

    assert_eq!(
        (
            store.row_count(&tables::DIVISION_MODULE),
            store.row_count(&tables::FINANCER_MODULE),
        ),
        links
    );
    assert_eq!(store.row_count(&tables::MODULES), MODULES.len());

    let second_links = second.table("financer_module").unwrap();
    assert_eq!(second_links.written, 0);
    assert_eq!(
        second_links.skipped,
        first.table("financer_module").unwrap().written
    );
}

#[test]
fn test_recency_sampling_favours_recent_days() {
    let mut rng = StdRng::seed_from_u64(42);
    let policy = DayOffset::default();
    let mut samples: Vec<u32> = (0..10_000)
        .map(|_| policy.sample(365, &mut rng).unwrap())
        .collect();
    samples.sort_unstable();

    let median = samples[samples.len() / 2] as f64;
    assert!(median < 182.5 * 0.5, "median {median}");
}

#[tokio::test]
async fn test_failure_on_last_batch_leaves_no_rows() {
    let plan = vec![Stage::Divisions, Stage::Financers, Stage::Modules];

    // Learn how many writes the last table gets in a clean run.
    let probe = MemoryStore::new();
    SeedRun::new(probe.clone(), config(Environment::Production, 4), plan.clone())
        .execute()
        .await
        .unwrap();
    let last_writes = probe.batch_sizes(&tables::FINANCER_MODULE).len();
    assert!(last_writes > 1);

    let store = MemoryStore::new();
    store.fail_write(&tables::FINANCER_MODULE, last_writes - 1);

    let mut run = SeedRun::new(store.clone(), config(Environment::Production, 4), plan);
    let err = run.execute().await.unwrap_err();

    assert!(matches!(
        err,
        SeedError::Stage {
            stage: Stage::Modules,
            ..
        }
    ));
    assert!(matches!(err.root(), SeedError::Write(_)));
    assert_eq!(run.state(), RunState::RolledBack);
    assert_eq!(store.total_rows(), 0);
    assert_eq!(store.batch_sizes(&tables::FINANCER_MODULE).len(), last_writes);
}

#[tokio::test]
async fn test_ignore_conflicts_skips_single_duplicate() {
    let store = MemoryStore::new();
    let mut writer = store.begin().await.unwrap();
    let link_gen = ModuleLinkGenerator::new();
    let mut rng = StdRng::seed_from_u64(5);
    let now = OffsetDateTime::now_utc();

    let mut rows: Vec<_> = FINANCERS
        .iter()
        .flat_map(|f| MODULES.iter().map(move |m| (f.id, m)))
        .map(|(f, m)| {
            FinancerModuleRecord(link_gen.link(
                LinkOwner::Financer(f),
                m,
                now,
                &mut rng,
            ))
            .into_row()
        })
        .collect();
    let n = rows.len() + 1;
    let duplicate = FinancerModuleRecord(link_gen.link(
        LinkOwner::Financer(FINANCERS[0].id),
        &MODULES[0],
        now,
        &mut rng,
    ));
    rows.push(duplicate.into_row());

    let outcome = writer
        .write(&tables::FINANCER_MODULE, rows, WriteMode::IgnoreConflicts)
        .await
        .unwrap();
    writer.commit().await.unwrap();

    assert_eq!(outcome.submitted, n as u64);
    assert_eq!(outcome.written, (n - 1) as u64);
    assert_eq!(store.row_count(&tables::FINANCER_MODULE), n - 1);
}

#[tokio::test]
async fn test_users_flush_per_financer() {
    let store = MemoryStore::new();
    let config = SeedConfig {
        financer_limit: Some(3),
        users_per_financer: 250,
        ..config(Environment::Dev, 100)
    };
    let plan = vec![Stage::Divisions, Stage::Financers, Stage::Users];

    let report = SeedRun::new(store.clone(), config, plan)
        .execute()
        .await
        .unwrap();

    assert_eq!(
        store.batch_sizes(&tables::USERS),
        [100, 100, 50].repeat(3)
    );
    assert_eq!(report.table("users").unwrap().written, 750);
    assert_eq!(report.table("financer_user").unwrap().written, 750);
    assert_eq!(store.row_count(&tables::USERS), 750);

    // 10-20% more invitations than registrations
    let invitations = store.row_count(&tables::AUDITS);
    assert!((825..=900).contains(&invitations), "{invitations}");
}

#[tokio::test]
async fn test_full_local_plan_commits() {
    let store = MemoryStore::new();
    let config = SeedConfig {
        financer_limit: Some(1),
        users_per_financer: 20,
        ..config(Environment::Local, 500)
    };
    let plan = plan_for(config.environment);

    let mut run = SeedRun::new(store.clone(), config, plan);
    let report = run.execute().await.unwrap();

    assert_eq!(run.state(), RunState::Committed);
    assert_eq!(report.stages.len(), 6);
    assert_eq!(store.row_count(&tables::USERS), 20);
    assert_eq!(store.row_count(&tables::ENGAGEMENT_METRICS), 24);
    assert!(store.row_count(&tables::ENGAGEMENT_LOGS) > 0);
    assert!(store.row_count(&tables::INVOICES) > 0);
    assert!(store.row_count(&tables::INVOICE_ITEMS) > store.row_count(&tables::INVOICES));
    assert_eq!(report.written_total() as usize, store.total_rows());

    assert!(matches!(run.execute().await, Err(SeedError::AlreadyFinished)));
}

#[tokio::test]
async fn test_invoice_stage_replaces_previous_invoices() {
    let store = MemoryStore::new();
    let plan = vec![Stage::Invoices];

    SeedRun::new(store.clone(), config(Environment::Staging, 200), plan.clone())
        .execute()
        .await
        .unwrap();
    assert!(store.row_count(&tables::INVOICES) > 0);

    let mut again = config(Environment::Staging, 200);
    again.seed = Some(7);
    let report = SeedRun::new(store.clone(), again, plan)
        .execute()
        .await
        .unwrap();

    assert_eq!(
        store.row_count(&tables::INVOICES) as u64,
        report.table("invoices").unwrap().written
    );
    assert_eq!(
        store.row_count(&tables::INVOICE_ITEMS) as u64,
        report.table("invoice_items").unwrap().written
    );
}

#[tokio::test]
async fn test_engagement_without_users_is_precondition() {
    let store = MemoryStore::new();
    let mut run = SeedRun::new(
        store.clone(),
        config(Environment::Local, 100),
        vec![Stage::Engagement],
    );

    let err = run.execute().await.unwrap_err();
    assert!(matches!(err.root(), SeedError::Precondition(_)));
    assert!(err.to_string().contains("engagement"));
    assert_eq!(run.state(), RunState::RolledBack);
    assert_eq!(store.total_rows(), 0);
}
