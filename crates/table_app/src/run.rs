use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use table_core::{LoadStatus, TableViewModel};
use table_engine::{HttpPageSource, LoaderContext, LoaderHandle, UrlSink};
use table_logging::{table_info, table_warn};
use tokio::sync::watch;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::render;

/// Reports URL rewrites; there is no address bar to update.
struct LogUrlSink;

impl UrlSink for LogUrlSink {
    fn replace(&self, query: &str) {
        table_info!("Query normalized to ?{}", query);
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let Some(endpoint) = cli.endpoint.clone().or(config.endpoint.clone()) else {
        bail!("no endpoint configured; pass --endpoint or set `endpoint` in {:?}", cli.config);
    };
    let schema = config.schema.build().context("invalid schema in config")?;
    let source = HttpPageSource::new(&endpoint, config.source.settings())
        .with_context(|| format!("cannot use endpoint {endpoint}"))?;

    let mut settings = config.loader.settings();
    settings.auto_merge |= cli.auto_merge;
    // A stuck page surfaces as a timeout error; this only guards against a lost loader.
    let settle_limit = settings.page_timeout * 2;

    let context = LoaderContext::new(config.scope.clone(), schema, Arc::new(source))
        .with_url_sink(Arc::new(LogUrlSink))
        .with_settings(settings);
    let handle = LoaderHandle::spawn(context);
    let mut views = handle.subscribe();
    views.mark_unchanged();

    table_info!("Loading {} from {}", config.scope, endpoint);
    handle.navigate(cli.query.clone());
    let mut view = next_settled(&mut views, settle_limit).await?;

    let mut loaded = 1;
    while loaded < cli.pages && view.status == LoadStatus::Ready && view.has_more {
        handle.load_next();
        view = next_settled(&mut views, settle_limit).await?;
        loaded += 1;
    }
    if let Some(error) = &view.error {
        table_warn!(scope: config.scope; "Stopped paging after {} pages: {}", loaded, error.message);
    }

    if cli.live_secs > 0 {
        handle.set_live_mode(true);
        tokio::time::sleep(Duration::from_secs(cli.live_secs)).await;
        view = handle.view();
        handle.set_live_mode(false);
    }

    println!("{}", render::render(&view));
    handle.shutdown();
    Ok(())
}

/// Waits for the next published view that is not mid-load.
async fn next_settled(
    views: &mut watch::Receiver<TableViewModel>,
    limit: Duration,
) -> anyhow::Result<TableViewModel> {
    let wait = async {
        loop {
            views.changed().await.context("loader stopped")?;
            let view = views.borrow_and_update().clone();
            if matches!(view.status, LoadStatus::Ready | LoadStatus::Error) {
                return Ok::<_, anyhow::Error>(view);
            }
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .context("loader did not settle in time")?
}
