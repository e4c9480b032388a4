use log::{info, warn};
use openpype_create::config::PipelineConfig;
use openpype_create::logic::CreateContext;
use openpype_create::plugin::{CreatorInfo, PluginRegistry};
use openpype_create::store::{InMemoryHost, InMemoryProjectStore};
use openpype_create::{CreateError, OperationFailed};
use std::sync::Arc;

fn report_failure(failure: &OperationFailed) {
    warn!("{}", failure);
    for info in failure.failed_info() {
        warn!(
            "  {} ({}): {}",
            info.identifier,
            info.label.as_deref().unwrap_or("-"),
            info.message
        );
        if let Some(traceback) = &info.traceback {
            warn!("{}", traceback);
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::load()?;
    let workfile_path = config.workfile_path();
    let host_name = config
        .session
        .app_name()
        .unwrap_or_else(|| "standalone".to_string());
    info!("Opening workfile {} in host {}", workfile_path.display(), host_name);

    let host = Arc::new(InMemoryHost::open(host_name, &workfile_path)?);
    let project_store = Arc::new(InMemoryProjectStore::default());
    let registry = Arc::new(PluginRegistry::with_builtin_plugins());

    let mut ctx = CreateContext::new(host.clone(), project_store, registry, config);
    match ctx.reset(true) {
        Ok(()) => {}
        Err(CreateError::ResetFailed(failures)) => failures.iter().for_each(report_failure),
        Err(err) => return Err(err.into()),
    }

    info!(
        "Context {} / {} / {}",
        ctx.project_name().unwrap_or("-"),
        ctx.asset_name().unwrap_or("-"),
        ctx.task_name().unwrap_or("-")
    );
    for (identifier, creator) in ctx.creators() {
        info!("Creator {} ({})", identifier, creator.family());
    }
    for instance in ctx.instances() {
        let context_state = if instance.has_valid_context() {
            "valid"
        } else {
            "invalid context"
        };
        info!(
            "Instance {} [{}] {} ({})",
            instance.label(),
            instance.family(),
            instance.id(),
            context_state
        );
    }
    for item in ctx.convertor_items_by_id().values() {
        info!("Legacy instances found by {}: {}", item.identifier, item.label);
    }

    match ctx.save_changes() {
        Ok(()) => {}
        Err(CreateError::Operation(failure)) => report_failure(&failure),
        Err(err) => return Err(err.into()),
    }
    host.save()?;
    info!("Workfile saved with {} instances", host.instance_count());

    Ok(())
}
