//! Configuration management commands.

use anyhow::{bail, Context as _, Result};
use offline_core::OfflineConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init {
            path,
            origin,
            force,
        } => init_config(&path, origin, force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "defaults"),
    }

    let config = &ctx.config;
    ctx.output.kv("version", &config.version);
    ctx.output.kv("origin", &config.origin);
    ctx.output.kv(
        "network_first.cache_error_responses",
        &config.network_first.cache_error_responses.to_string(),
    );

    ctx.output.info("Pre-cache:");
    for path in &config.precache {
        ctx.output.list_item(path);
    }

    ctx.output.info("Realtime hosts (network-only):");
    for host in &config.realtime_hosts {
        ctx.output.list_item(host);
    }

    ctx.output.info("Asset hosts (cache-first):");
    for host in &config.asset_hosts {
        ctx.output.list_item(host);
    }

    Ok(())
}

async fn init_config(
    path: &str,
    origin: Option<String>,
    force: bool,
    ctx: &Context,
) -> Result<()> {
    let config_path = ctx.resolve_path(path);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = match origin {
        Some(origin) => OfflineConfig::for_origin(origin),
        None => OfflineConfig::default(),
    };
    config.validate().context("Refusing to write an invalid config")?;
    config.save(&config_path)?;

    ctx.output
        .success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    // Loading already validated; re-run for configs that came from defaults.
    ctx.config.validate()?;

    let config = &ctx.config;
    let mut warnings: Vec<String> = Vec::new();

    if config.precache.is_empty() {
        warnings.push("precache is empty; nothing will be available offline until visited".into());
    }
    for host in &config.asset_hosts {
        if config.realtime_hosts.iter().any(|r| host.contains(r.as_str())) {
            warnings.push(format!(
                "asset host '{}' also matches a realtime host and will never be cached",
                host
            ));
        }
    }
    if !config.network_first.cache_error_responses {
        ctx.output
            .debug("network-first will not cache non-2xx responses");
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }

    Ok(())
}
