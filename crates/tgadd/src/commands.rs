use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context};
use tokio_util::sync::CancellationToken;

use tgadd_core::{
    candidates::load_candidate_file,
    config::Config,
    domain::{CandidateIdentity, GroupDescriptor},
    engine::EngineSettings,
    intake::{contact_candidates, list_groups},
    platform::PlatformClient,
    progress::TracingObserver,
    report::{BatchResult, FailureKind},
    scheduler::{BatchPlan, ChunkScheduler},
};

use crate::cli::{AddArgs, Cli, Commands};

const RULE: &str = "════════════════════════════════════════════════════════════";

pub async fn run(cli: Cli, cfg: &Config, platform: Arc<dyn PlatformClient>) -> anyhow::Result<()> {
    match cli.command {
        Commands::Groups => groups(platform.as_ref(), cli.json).await,
        Commands::Candidates { group, prefix } => {
            candidates(platform.as_ref(), &group, &prefix, cli.json).await
        }
        Commands::Add(args) => add(cfg, platform, args, cli.json).await,
    }
}

async fn groups(platform: &dyn PlatformClient, json: bool) -> anyhow::Result<()> {
    let groups = list_groups(platform).await.context("listing groups")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }
    if groups.is_empty() {
        println!("No groups or channels found");
        return Ok(());
    }
    println!("{}", render_groups(&groups));
    Ok(())
}

async fn candidates(
    platform: &dyn PlatformClient,
    selector: &str,
    prefix: &str,
    json: bool,
) -> anyhow::Result<()> {
    let groups = list_groups(platform).await.context("listing groups")?;
    let group = select_group(&groups, selector)?;
    let found = contact_candidates(platform, group, prefix)
        .await
        .context("collecting candidates")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }
    for c in &found {
        println!("{}", c.key);
    }
    eprintln!(
        "{} matching contacts (excluding existing members of {})",
        found.len(),
        group.title
    );
    Ok(())
}

async fn add(
    cfg: &Config,
    platform: Arc<dyn PlatformClient>,
    args: AddArgs,
    json: bool,
) -> anyhow::Result<()> {
    let groups = list_groups(platform.as_ref())
        .await
        .context("listing groups")?;
    let group = select_group(&groups, &args.group)?.clone();

    let pool: Vec<CandidateIdentity> = match (&args.phones_file, &args.prefix) {
        (Some(path), _) => load_candidate_file(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        (None, Some(prefix)) => contact_candidates(platform.as_ref(), &group, prefix)
            .await
            .context("collecting candidates")?,
        (None, None) => bail!("either --prefix or --phones-file is required"),
    };
    if pool.is_empty() {
        println!("No candidates matched");
        return Ok(());
    }

    let plan = BatchPlan::new(pool, args.offset, args.count)?;
    let settings = settings_for(cfg, &args);

    eprintln!(
        "Plan: {} candidates (from index {}) into {} [{}], {} per chunk, {}s between requests, {}s between chunks",
        plan.len(),
        plan.offset(),
        group.title,
        group.kind.label(),
        settings.chunk_size,
        settings.request_delay.as_secs(),
        settings.chunk_delay.as_secs(),
    );
    if !args.yes {
        eprintln!("Dry run: pass --yes to send the requests");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current request");
            on_signal.cancel();
        }
    });

    let scheduler = ChunkScheduler::new(platform, settings)
        .with_observer(Arc::new(TracingObserver))
        .with_cancellation(cancel);
    let result = scheduler.run(&group, &plan).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_summary(&result));
    }
    Ok(())
}

fn settings_for(cfg: &Config, args: &AddArgs) -> EngineSettings {
    let mut settings = EngineSettings::from(cfg);
    if let Some(size) = args.chunk_size {
        settings.chunk_size = size;
    }
    if let Some(secs) = args.chunk_delay {
        settings.chunk_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = args.request_delay {
        settings.request_delay = Duration::from_secs(secs);
    }
    if let Some(n) = args.max_retries {
        settings.max_retries = n;
    }
    settings
}

/// Pick a group by `#index` (1-based, as listed), numeric id, `@handle` or title.
pub fn select_group<'a>(
    groups: &'a [GroupDescriptor],
    selector: &str,
) -> anyhow::Result<&'a GroupDescriptor> {
    let selector = selector.trim();

    if let Some(idx) = selector.strip_prefix('#') {
        let n: usize = idx
            .parse()
            .map_err(|_| anyhow!("invalid group index {selector:?}"))?;
        return n
            .checked_sub(1)
            .and_then(|i| groups.get(i))
            .ok_or_else(|| anyhow!("group index {n} is out of range (1-{})", groups.len()));
    }

    if let Ok(id) = selector.parse::<i64>() {
        return groups
            .iter()
            .find(|g| g.id.0 == id)
            .ok_or_else(|| anyhow!("no group with id {id}"));
    }

    if let Some(handle) = selector.strip_prefix('@') {
        return groups
            .iter()
            .find(|g| {
                g.handle
                    .as_deref()
                    .is_some_and(|h| h.eq_ignore_ascii_case(handle))
            })
            .ok_or_else(|| anyhow!("no group with handle @{handle}"));
    }

    let wanted = tgadd_core::dedup::normalize_title(selector);
    let mut matches = groups
        .iter()
        .filter(|g| tgadd_core::dedup::normalize_title(&g.title) == wanted);
    match (matches.next(), matches.next()) {
        (Some(g), None) => Ok(g),
        (Some(_), Some(_)) => bail!("title {selector:?} is ambiguous; use the id or #index"),
        (None, _) => bail!("no group titled {selector:?}"),
    }
}

pub fn render_groups(groups: &[GroupDescriptor]) -> String {
    let mut out = String::new();
    for (i, g) in groups.iter().enumerate() {
        let handle = g
            .handle
            .as_deref()
            .map(|h| format!(" (@{h})"))
            .unwrap_or_default();
        let members = g
            .member_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        out.push_str(&format!("{:2}. {}{handle}\n", i + 1, g.title));
        out.push_str(&format!(
            "    {} | id {} | members: {members}\n",
            g.kind.label(),
            g.id.0
        ));
    }
    out.trim_end().to_string()
}

pub fn render_summary(result: &BatchResult) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    match &result.aborted {
        None => out.push_str("BATCH PROCESS COMPLETED\n"),
        Some(reason) => out.push_str(&format!("BATCH PROCESS STOPPED: {reason}\n")),
    }
    let already = result.succeeded.iter().filter(|s| s.already_member).count();
    out.push_str(&format!(
        "Added: {} | Failed: {}",
        result.success_count(),
        result.failure_count()
    ));
    if already > 0 {
        out.push_str(&format!(" | already members: {already}"));
    }
    if result.unprocessed > 0 {
        out.push_str(&format!(" | not processed: {}", result.unprocessed));
    }
    out.push('\n');
    out.push_str(RULE);

    if !result.failed.is_empty() {
        out.push_str("\nFailures:");
        for f in &result.failed {
            out.push_str(&format!(
                "\n  {} [{}] {}",
                f.candidate.key,
                failure_label(f.kind),
                f.message
            ));
        }
    }
    out
}

fn failure_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::IdentityNotFound => "not found",
        FailureKind::UnsupportedGroupKind => "unsupported group",
        FailureKind::PrivacyRestricted => "privacy",
        FailureKind::RateLimitExhausted => "flood wait",
        FailureKind::PeerThrottled => "peer flood",
        FailureKind::AdminRequired => "admin required",
        FailureKind::Cancelled => "cancelled",
        FailureKind::Generic => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgadd_core::{
        domain::{GroupId, GroupKind},
        report::{AbortReason, CandidateOutcome, ResultAggregator},
    };

    fn groups() -> Vec<GroupDescriptor> {
        vec![
            GroupDescriptor {
                id: GroupId(-1001),
                title: "Hiking Club".to_string(),
                handle: Some("hikers".to_string()),
                kind: GroupKind::Channel,
                member_count: Some(120),
            },
            GroupDescriptor {
                id: GroupId(55),
                title: "Family".to_string(),
                handle: None,
                kind: GroupKind::BasicGroup,
                member_count: None,
            },
        ]
    }

    #[test]
    fn select_by_index_id_handle_and_title() {
        let g = groups();
        assert_eq!(select_group(&g, "#2").unwrap().id, GroupId(55));
        assert_eq!(select_group(&g, "-1001").unwrap().id, GroupId(-1001));
        assert_eq!(select_group(&g, "@Hikers").unwrap().id, GroupId(-1001));
        assert_eq!(select_group(&g, " hiking club ").unwrap().id, GroupId(-1001));
    }

    #[test]
    fn select_reports_misses() {
        let g = groups();
        assert!(select_group(&g, "#0").is_err());
        assert!(select_group(&g, "#3").is_err());
        assert!(select_group(&g, "#x").is_err());
        assert!(select_group(&g, "42").is_err());
        assert!(select_group(&g, "@nobody").is_err());
        assert!(select_group(&g, "Work").is_err());
    }

    #[test]
    fn group_listing_shows_handle_and_members() {
        let text = render_groups(&groups());
        assert!(text.contains(" 1. Hiking Club (@hikers)"));
        assert!(text.contains("channel | id -1001 | members: 120"));
        assert!(text.contains("group | id 55 | members: N/A"));
    }

    #[test]
    fn summary_lists_failures_and_abort() {
        let mut agg = ResultAggregator::new(4);
        agg.record(CandidateIdentity::new("+1"), CandidateOutcome::Added);
        agg.record(CandidateIdentity::new("+2"), CandidateOutcome::AlreadyMember);
        agg.record(
            CandidateIdentity::new("+3"),
            CandidateOutcome::failed(FailureKind::PeerThrottled, "peer flood"),
        );
        agg.abort(AbortReason::Fatal {
            candidate: "+3".to_string(),
            kind: FailureKind::PeerThrottled,
        });

        let text = render_summary(&agg.finish());
        assert!(text.contains("BATCH PROCESS STOPPED"));
        assert!(text.contains("Added: 2 | Failed: 1 | already members: 1 | not processed: 1"));
        assert!(text.contains("+3 [peer flood] peer flood"));
    }

    #[test]
    fn summary_for_clean_run() {
        let mut agg = ResultAggregator::new(1);
        agg.record(CandidateIdentity::new("+1"), CandidateOutcome::Added);
        let text = render_summary(&agg.finish());
        assert!(text.contains("BATCH PROCESS COMPLETED"));
        assert!(text.contains("Added: 1 | Failed: 0\n"));
        assert!(!text.contains("Failures:"));
    }
}
