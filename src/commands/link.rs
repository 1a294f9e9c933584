//! Template link commands
//!
//! - `plan` - classify and diff every kind, print what apply would delete
//! - `apply` - delete dropped children in dependency order, then record the
//!   carried declarations and a fresh projection in state
//! - `show` - print the live children of a template

use anyhow::{Result, bail};
use colored::Colorize;
use indicatif::ProgressBar;
use linkset::{
    ChildId, ChildKind, ChildStore, ConvergeOptions, ConvergencePlan, ConvergenceDriver,
    ConvergenceReport, DeclaredChange, DiffSummary, KindOutcome, KindStatus, LinkProjector,
    LinkRequest, ParentId, PlannedKind, Planner, ProgressCallback,
};

use super::{connect, load_config, state_path};
use crate::Context;
use crate::cli::{LinkApplyArgs, LinkCommand};
use crate::config::TemplateLink;
use crate::progress;
use crate::state::ZlinkState;
use crate::store::ZabbixStore;
use crate::ui;

/// Ids shown per line before eliding
const MAX_IDS: usize = 8;

pub fn run(ctx: &Context, cmd: LinkCommand) -> Result<()> {
    match cmd {
        LinkCommand::Plan { name } => plan(ctx, name.as_deref()),
        LinkCommand::Apply(args) => apply(ctx, &args),
        LinkCommand::Show { template_id } => show(ctx, &template_id),
    }
}

/// Request for one link: previous declaration from state, new from config
pub fn build_request(link: &TemplateLink, state: &ZlinkState) -> LinkRequest {
    ChildKind::all()
        .iter()
        .fold(LinkRequest::new(ParentId::new(&link.template_id)), |request, kind| {
            request.with_kind(
                *kind,
                DeclaredChange::new(
                    state.previous_declared(link, *kind),
                    link.declared(*kind).to_vec(),
                ),
            )
        })
}

/// Execute a plan, re-read the template and record both in state
pub fn converge_link<S, P>(
    store: &S,
    options: ConvergeOptions,
    link: &TemplateLink,
    plan: ConvergencePlan,
    state: &mut ZlinkState,
    progress: &mut P,
) -> ConvergenceReport
where
    S: ChildStore + ?Sized,
    P: ProgressCallback,
{
    let report = ConvergenceDriver::new(store)
        .with_options(options)
        .execute(plan, progress);

    let projection = match LinkProjector::new(store).project(&report.parent) {
        Ok(projection) => Some(projection),
        Err(e) => {
            log::warn!("Keeping previous projection of '{}': {}", link.name, e);
            None
        }
    };

    state.record_link(link, &report, projection.as_ref());
    report
}

// ============================================================================
// Commands
// ============================================================================

fn plan(ctx: &Context, name: Option<&str>) -> Result<()> {
    let config = load_config(ctx)?;
    config.validate_links()?;
    let links = config.select_links(name)?;
    let state = ZlinkState::load(&state_path()?)?;

    if links.is_empty() {
        ui::info("No template_link declared");
        return Ok(());
    }

    let client = connect(&config.server)?;
    let store = ZabbixStore::new(&client);
    let planner = Planner::new(&store);

    ui::header("Link Plan");
    let mut plans = Vec::new();
    for link in links {
        let plan = planner.plan(&build_request(link, &state));
        display_plan(link, &plan);
        plans.push(plan);
    }

    display_totals(&DiffSummary::from_diffs(plans.iter().flat_map(ConvergencePlan::diffs)));
    Ok(())
}

fn apply(ctx: &Context, args: &LinkApplyArgs) -> Result<()> {
    let config = load_config(ctx)?;
    config.validate_links()?;
    let links = config.select_links(args.name.as_deref())?;
    let state_path = state_path()?;
    let mut state = ZlinkState::load(&state_path)?;

    let client = connect(&config.server)?;
    let store = ZabbixStore::new(&client);
    let planner = Planner::new(&store);

    ui::header("Link Apply");
    let mut planned = Vec::new();
    for link in links {
        let plan = planner.plan(&build_request(link, &state));
        display_plan(link, &plan);
        planned.push((link, plan));
    }

    let summary = DiffSummary::from_diffs(planned.iter().flat_map(|(_, p)| p.diffs()));
    display_totals(&summary);

    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    if summary.has_changes() && !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let options = ConvergeOptions {
        batch_size: usize::from(args.batch_size),
    };
    let mut deleted = 0;
    let mut unsettled = Vec::new();

    for (link, plan) in planned {
        if plan.has_deletions() && !ctx.quiet {
            println!();
            println!("  {} Converging {}...", "→".cyan(), link.name);
        }
        let mut progress = DeleteProgress::new(ctx.quiet);
        let report = converge_link(&store, options.clone(), link, plan, &mut state, &mut progress);

        deleted += report.deleted_count();
        if !report.is_success() {
            unsettled.push(link.name.clone());
        }
    }

    if args.name.is_none() {
        for name in state.prune_links(config.template_link.iter().map(|l| l.name.as_str())) {
            ui::dim(&format!("Forgot template_link '{name}' (no longer declared)"));
        }
    }

    state.touch(&state_path)?;
    print_summary(deleted, &unsettled);

    if !unsettled.is_empty() {
        bail!(
            "{} template link(s) did not converge; re-run apply to retry",
            unsettled.len()
        );
    }
    Ok(())
}

fn show(ctx: &Context, template_id: &str) -> Result<()> {
    let config = load_config(ctx)?;
    let client = connect(&config.server)?;
    let store = ZabbixStore::new(&client);

    let spinner = progress::spinner(&format!("Reading template {template_id}..."));
    let projection = LinkProjector::new(&store).project(&ParentId::new(template_id));
    spinner.finish_and_clear();
    let projection = projection?;

    let managed_by = config
        .template_link
        .iter()
        .find(|l| l.template_id == template_id);

    ui::header(&format!("Template {template_id}"));
    if let Some(link) = managed_by {
        ui::kv("Managed by", &link.name);
    }

    for kind in ChildKind::all() {
        let children = projection.get(*kind);
        ui::section(&format!("{} ({})", capitalize(kind.label()), children.len()));
        if children.is_empty() {
            ui::dim("none");
            continue;
        }

        for child in children {
            let declared = managed_by
                .is_some_and(|l| l.declared(*kind).iter().any(|id| id == child.id.as_str()));
            let origin = if child.local {
                "local".green()
            } else {
                "inherited".dimmed()
            };
            let marker = if declared { " declared".cyan() } else { "".normal() };
            println!("  {:<12} {}{}", child.id.as_str(), origin, marker);
        }
    }

    Ok(())
}

// ============================================================================
// Display
// ============================================================================

fn display_plan(link: &TemplateLink, plan: &ConvergencePlan) {
    ui::section(&format!("{} (template {})", link.name, link.template_id));

    for kind in ChildKind::deletion_order() {
        match plan.kinds.get(kind) {
            Some(PlannedKind::Ready { diff, .. }) => {
                if diff.has_deletions() {
                    println!(
                        "  {} {:<16} {}",
                        "-".red(),
                        kind.label(),
                        ui::format_ids(diff.deletions.iter(), MAX_IDS)
                    );
                }
                if !diff.kept_inherited.is_empty() {
                    println!(
                        "  {} {:<16} {} {}",
                        "=".dimmed(),
                        kind.label(),
                        ui::format_ids(&diff.kept_inherited, MAX_IDS),
                        "(inherited, kept)".dimmed()
                    );
                }
                if !diff.declared_inherited.is_empty() {
                    println!(
                        "  {} {:<16} {} {}",
                        "⚠".yellow(),
                        kind.label(),
                        ui::format_ids(&diff.declared_inherited, MAX_IDS),
                        "(declared but inherited, not managed)".dimmed()
                    );
                }
            }
            Some(PlannedKind::Aborted { error, .. }) => {
                println!("  {} {:<16} {}", "✗".red(), kind.label(), error);
            }
            None => {}
        }
    }

    if plan.is_clean() && !plan.has_deletions() {
        ui::dim("No changes needed");
    }
}

fn display_totals(summary: &DiffSummary) {
    println!();
    println!(
        "  Summary: {} to delete, {} inherited kept, {} newly declared",
        summary.deletions.to_string().bold(),
        summary.kept_inherited,
        summary.added
    );
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Delete these children?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(deleted: usize, unsettled: &[String]) {
    println!();
    if unsettled.is_empty() {
        println!("  {} Template links converged", "✓".green().bold());
    } else {
        println!("  {} Template links applied with errors", "⚠".yellow().bold());
    }

    if deleted > 0 {
        println!("    • {deleted} children deleted");
    }
    for name in unsettled {
        println!("    • {} {}", name, "not converged".red());
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Terminal progress for deletions, one bar per kind
struct DeleteProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl DeleteProgress {
    fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }

    fn print(&self, line: &str) {
        match &self.bar {
            Some(pb) => pb.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for DeleteProgress {
    fn on_kind_start(&mut self, kind: ChildKind, count: usize) {
        if !self.quiet {
            self.bar = Some(progress::bar(count as u64, kind.label()));
        }
    }

    fn on_batch_deleted(&mut self, _kind: ChildKind, ids: &[ChildId]) {
        if let Some(pb) = &self.bar {
            pb.inc(ids.len() as u64);
        }
    }

    fn on_batch_failed(&mut self, kind: ChildKind, ids: &[ChildId], reason: &str) {
        self.print(&format!(
            "    {} {} [{}]: {}",
            "✗".red(),
            kind.label(),
            ui::format_ids(ids, MAX_IDS),
            reason
        ));
    }

    fn on_kind_complete(&mut self, outcome: &KindOutcome) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
        if self.quiet {
            return;
        }

        let label = outcome.kind.label();
        match &outcome.status {
            KindStatus::Converged if outcome.deleted.is_empty() => {}
            KindStatus::Converged => {
                println!("    {} {} {} deleted", "✓".green(), outcome.deleted.len(), label);
            }
            KindStatus::Partial => println!(
                "    {} {}: {} deleted, {} left for the next apply",
                "⚠".yellow(),
                label,
                outcome.deleted.len(),
                outcome.pending().len()
            ),
            KindStatus::Blocked { by } => println!(
                "    {} {}: {} held back until {} are deleted",
                "⊘".yellow(),
                label,
                outcome.not_attempted.len(),
                by.label()
            ),
            KindStatus::Aborted(e) => println!("    {} {}: {}", "✗".red(), label, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkset::{MemoryStore, Provenance};

    fn link(items: &[&str], triggers: &[&str]) -> TemplateLink {
        TemplateLink {
            name: "web".to_string(),
            template_id: "10084".to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            lld_rules: Vec::new(),
        }
    }

    fn pass(store: &MemoryStore, state: &mut ZlinkState, link: &TemplateLink) -> ConvergenceReport {
        let plan = Planner::new(store).plan(&build_request(link, state));
        converge_link(
            store,
            ConvergeOptions::default(),
            link,
            plan,
            state,
            &mut DeleteProgress::new(true),
        )
    }

    /// Template 10084: local trigger T1 on local item I1, local item I2,
    /// item I3 inherited from a linked template.
    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_child("10084", ChildKind::Trigger, "T1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "I1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "I2", Provenance::Local)
            .with_child("10084", ChildKind::Item, "I3", Provenance::Inherited)
    }

    #[test]
    fn test_build_request_uses_state_as_old() {
        let mut state = ZlinkState::default();
        let first = build_request(&link(&["I1"], &[]), &state);
        assert!(first.kinds[&ChildKind::Item].old.is_empty());
        assert_eq!(first.kinds.len(), ChildKind::all().len());

        let store = store();
        pass(&store, &mut state, &link(&["I1", "I2"], &["T1"]));
        let second = build_request(&link(&["I1"], &[]), &state);
        assert_eq!(second.kinds[&ChildKind::Item].old.len(), 2);
        assert_eq!(second.kinds[&ChildKind::Trigger].old, vec![ChildId::new("T1")]);
    }

    #[test]
    fn test_dropping_inherited_item_keeps_it() {
        let store = store();
        let mut state = ZlinkState::default();
        pass(&store, &mut state, &link(&["I1", "I2", "I3"], &["T1"]));

        let report = pass(&store, &mut state, &link(&["I1"], &["T1"]));

        assert!(report.is_success());
        assert_eq!(
            store.delete_calls(),
            vec![(ChildKind::Item, vec![ChildId::new("I2")])]
        );
        let web = &state.links["web"];
        assert_eq!(web.items, vec!["I1"]);
        assert!(
            web.projection
                .items
                .iter()
                .any(|c| c.id.as_str() == "I3" && !c.local)
        );
    }

    #[test]
    fn test_failed_trigger_holds_back_items_until_retry() {
        let store = store();
        let mut state = ZlinkState::default();
        pass(&store, &mut state, &link(&["I1", "I2"], &["T1"]));

        store.fail_delete(ChildKind::Trigger, "T1");
        let report = pass(&store, &mut state, &link(&["I2"], &[]));

        assert!(!report.is_success());
        assert_eq!(
            report.outcomes[&ChildKind::Item].status,
            KindStatus::Blocked {
                by: ChildKind::Trigger
            }
        );
        assert_eq!(store.children("10084", ChildKind::Item).len(), 3);
        assert_eq!(state.links["web"].triggers, vec!["T1"]);
        assert!(state.links["web"].items.contains(&"I1".to_string()));

        let healed = MemoryStore::new()
            .with_child("10084", ChildKind::Trigger, "T1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "I1", Provenance::Local)
            .with_child("10084", ChildKind::Item, "I2", Provenance::Local);
        let retry = pass(&healed, &mut state, &link(&["I2"], &[]));

        assert!(retry.is_success());
        assert_eq!(
            healed.delete_calls(),
            vec![
                (ChildKind::Trigger, vec![ChildId::new("T1")]),
                (ChildKind::Item, vec![ChildId::new("I1")]),
            ]
        );
        assert_eq!(state.links["web"].items, vec!["I2"]);
    }

    #[test]
    fn test_projection_failure_keeps_previous_projection() {
        let store = store();
        let mut state = ZlinkState::default();
        pass(&store, &mut state, &link(&["I1"], &[]));
        let before = state.links["web"].projection.clone();
        assert_eq!(before.items.len(), 3);

        store.fail_list(ChildKind::Trigger);
        pass(&store, &mut state, &link(&["I1"], &[]));

        assert_eq!(state.links["web"].projection, before);
    }

    #[test]
    fn test_duplicate_trigger_skips_only_that_kind() {
        let store = store()
            .with_child("10085", ChildKind::Item, "D1", Provenance::Local)
            .with_child("10085", ChildKind::Item, "D2", Provenance::Local);
        let mut db = TemplateLink {
            name: "db".to_string(),
            template_id: "10085".to_string(),
            items: vec!["D1".to_string(), "D2".to_string()],
            triggers: Vec::new(),
            lld_rules: Vec::new(),
        };
        let mut state = ZlinkState::default();
        pass(&store, &mut state, &link(&["I1", "I2"], &["T1"]));
        pass(&store, &mut state, &db);

        let web = link(&["I1"], &["T1", "T1"]);
        let config = crate::config::ZlinkConfig {
            template_link: vec![web.clone(), db.clone()],
            ..Default::default()
        };
        config.validate_links().unwrap();

        let report = pass(&store, &mut state, &web);
        db.items.pop();
        let db_report = pass(&store, &mut state, &db);

        assert!(matches!(
            report.outcomes[&ChildKind::Trigger].status,
            KindStatus::Aborted(linkset::Error::DuplicateChild { .. })
        ));
        assert!(report.outcomes[&ChildKind::Item].is_converged());
        assert!(db_report.is_success());
        assert_eq!(
            store.delete_calls(),
            vec![
                (ChildKind::Item, vec![ChildId::new("I2")]),
                (ChildKind::Item, vec![ChildId::new("D2")]),
            ]
        );
        assert_eq!(store.children("10084", ChildKind::Trigger), vec![ChildId::new("T1")]);
        assert_eq!(state.links["web"].triggers, vec!["T1"]);
        assert_eq!(state.links["web"].items, vec!["I1"]);
        assert_eq!(state.links["db"].items, vec!["D1"]);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("discovery rules"), "Discovery rules");
        assert_eq!(capitalize(""), "");
    }
}
