use anyhow::{Context, Result};
use clap::Args;
use completion_core::CompletionConfig;

use crate::output::{OutputMode, pretty_kv, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the effective config as TOML (ready to save as completion.toml).
    #[arg(long)]
    pub toml: bool,
}

pub fn run_config(args: &ConfigArgs, config: &CompletionConfig, output: OutputMode) -> Result<()> {
    if args.toml {
        let rendered = toml::to_string_pretty(config).context("Failed to render config as TOML")?;
        print!("{rendered}");
        return Ok(());
    }

    render_mode(
        output,
        config,
        |config, w| {
            writeln!(
                w,
                "percentage={} count={} certificate={} default_required={}",
                opt(config.policy.percentage),
                opt(config.policy.count),
                config.policy.offers_completion_certificate,
                config.required.default_mime_types.join(","),
            )
        },
        |config, w| {
            pretty_rule(w)?;
            pretty_kv(w, "Percentage", opt(config.policy.percentage))?;
            pretty_kv(w, "Count", opt(config.policy.count))?;
            pretty_kv(
                w,
                "Certificate",
                config.policy.offers_completion_certificate.to_string(),
            )?;
            let required = if config.required.default_mime_types.is_empty() {
                "(none)".to_string()
            } else {
                config.required.default_mime_types.join(", ")
            };
            pretty_kv(w, "Required", required)?;
            pretty_rule(w)
        },
    )
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
