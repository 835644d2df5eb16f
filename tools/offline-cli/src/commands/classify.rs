//! URL classification command.

use anyhow::Result;
use offline_router::Classifier;
use serde::Serialize;

use super::{resolve_target, ClassifyArgs};
use crate::context::Context;

#[derive(Serialize)]
struct Classification {
    url: String,
    destination: String,
    strategy: String,
}

/// Run the classify command.
pub async fn run(args: ClassifyArgs, ctx: &Context) -> Result<()> {
    let classifier = Classifier::from_config(&ctx.config);

    let mut rows = Vec::with_capacity(args.urls.len());
    for target in &args.urls {
        let uri = resolve_target(&ctx.config, target)?;
        let destination = classifier.classify(&uri);
        rows.push(Classification {
            url: uri.to_string(),
            destination: destination.to_string(),
            strategy: destination.strategy().to_string(),
        });
    }

    if ctx.output.is_json() {
        ctx.output.json(&rows);
        return Ok(());
    }

    let width = rows.iter().map(|r| r.url.len()).max().unwrap_or(0);
    ctx.output.header("Classification");
    for row in &rows {
        ctx.output
            .table_row(&[&row.url, &row.destination, &row.strategy], &[width, 18, 14]);
    }

    Ok(())
}
