use anyhow::{Context, Result};
use clap::Args;
use completion_core::{
    AggregateCompletionPolicy, CompletionConfig, CompletionPolicy, Ntiid, PrincipalId, Progress,
};
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Progress made so far.
    #[arg(long)]
    pub absolute: f64,

    /// Maximum possible progress. Omit to simulate a missing denominator.
    #[arg(long)]
    pub max: Option<f64>,

    /// Ratio threshold in [0, 1]; overrides the configured policy.
    #[arg(long)]
    pub percentage: Option<f64>,

    /// Absolute-progress threshold; overrides the configured policy.
    #[arg(long)]
    pub count: Option<f64>,

    /// Sub-item completed without success (repeatable).
    #[arg(long = "unsuccessful", value_name = "NTIID")]
    pub unsuccessful: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvaluateReport {
    complete: bool,
    success: Option<bool>,
    percentage_progress: Option<f64>,
    policy: AggregateCompletionPolicy,
}

pub fn run_evaluate(args: &EvaluateArgs, config: &CompletionConfig, output: OutputMode) -> Result<()> {
    let policy = build_policy(args, config)?;
    let report = evaluate(args, &policy);
    tracing::debug!(complete = report.complete, "evaluated policy");

    render_mode(
        output,
        &report,
        |report, w| {
            writeln!(
                w,
                "{}  success={}  ratio={}",
                if report.complete { "complete" } else { "incomplete" },
                report.success.map_or_else(|| "-".to_string(), |s| s.to_string()),
                format_ratio(report.percentage_progress),
            )
        },
        |report, w| {
            pretty_rule(w)?;
            pretty_kv(w, "Complete", report.complete.to_string())?;
            pretty_kv(
                w,
                "Success",
                report.success.map_or_else(|| "-".to_string(), |s| s.to_string()),
            )?;
            pretty_kv(w, "Ratio", format_ratio(report.percentage_progress))?;
            pretty_kv(w, "Threshold", format_ratio(report.policy.percentage()))?;
            pretty_kv(
                w,
                "Count",
                report
                    .policy
                    .count()
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
            )?;
            pretty_rule(w)
        },
    )
}

fn build_policy(args: &EvaluateArgs, config: &CompletionConfig) -> Result<AggregateCompletionPolicy> {
    let mut policy = config
        .policy
        .to_policy()
        .context("Configured policy is invalid")?;
    if let Some(percentage) = args.percentage {
        policy
            .set_percentage(Some(percentage))
            .context("Invalid --percentage")?;
    }
    if let Some(count) = args.count {
        policy.set_count(Some(count)).context("Invalid --count")?;
    }
    Ok(policy)
}

fn evaluate(args: &EvaluateArgs, policy: &AggregateCompletionPolicy) -> EvaluateReport {
    let progress = Progress::new("cli:item", PrincipalId::new("cli"))
        .with_amounts(args.absolute, args.max)
        .with_unsuccessful(args.unsuccessful.iter().map(|id| Ntiid::new(id.as_str())));
    let completed = policy.is_complete(Some(&progress));
    EvaluateReport {
        complete: completed.is_some(),
        success: completed.as_ref().map(completion_core::CompletedItem::success),
        percentage_progress: progress.percentage_progress(),
        policy: policy.clone(),
    }
}

fn format_ratio(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "-".to_string(), |r| format!("{r:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(absolute: f64, max: Option<f64>) -> EvaluateArgs {
        EvaluateArgs {
            absolute,
            max,
            percentage: None,
            count: None,
            unsuccessful: Vec::new(),
        }
    }

    #[test]
    fn flags_override_config() {
        let mut a = args(5.0, Some(10.0));
        a.percentage = Some(0.5);
        let policy = build_policy(&a, &CompletionConfig::default()).unwrap();
        assert!(evaluate(&a, &policy).complete);

        let policy = build_policy(&args(5.0, Some(10.0)), &CompletionConfig::default()).unwrap();
        assert!(!evaluate(&args(5.0, Some(10.0)), &policy).complete);
    }

    #[test]
    fn invalid_flag_is_reported() {
        let mut a = args(1.0, Some(1.0));
        a.percentage = Some(3.0);
        let err = build_policy(&a, &CompletionConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("--percentage"));
    }

    #[test]
    fn unsuccessful_sub_items_mark_failure() {
        let mut a = args(1.0, Some(1.0));
        a.unsuccessful = vec!["tag:quiz".to_string()];
        let policy = build_policy(&a, &CompletionConfig::default()).unwrap();
        let report = evaluate(&a, &policy);
        assert!(report.complete);
        assert_eq!(report.success, Some(false));
    }
}
