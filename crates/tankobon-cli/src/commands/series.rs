use tankobon_client::{NewSeries, SeriesPatch};

use crate::cli::{AddArgs, MetadataArgs, OutputFormat, SeriesIdArgs, UpdateArgs, VolumeIdArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{MetadataView, render_metadata, render_series, render_series_list};

pub(crate) async fn handle_list(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    ctx.require_session()?;
    let series = ctx.collection.refresh().await?;
    render_series_list(&series, format)
}

pub(crate) async fn handle_add(
    ctx: &AppContext,
    args: AddArgs,
    format: OutputFormat,
) -> CliResult<()> {
    ctx.require_session()?;
    let title = args.title.trim();
    if title.is_empty() {
        return Err(CliError::validation("title must not be empty"));
    }
    let payload = NewSeries {
        title: title.to_string(),
        total_volumes: args.volumes,
        score: args.score,
        tags: (!args.tags.is_empty()).then_some(args.tags),
    };
    ctx.collection.add_series(&payload).await?;
    render_series_list(&ctx.collection.series(), format)
}

pub(crate) async fn handle_complete(
    ctx: &AppContext,
    args: SeriesIdArgs,
    format: OutputFormat,
) -> CliResult<()> {
    ctx.require_session()?;
    let updated = ctx.collection.toggle_complete(args.id).await?;
    render_series(&updated, format)
}

pub(crate) async fn handle_own(
    ctx: &AppContext,
    args: VolumeIdArgs,
    format: OutputFormat,
) -> CliResult<()> {
    ctx.require_session()?;
    ctx.collection.toggle_owned(args.volume_id).await?;
    let owner = ctx.collection.series().into_iter().find(|series| {
        series
            .volumes
            .iter()
            .any(|volume| volume.id == args.volume_id)
    });
    match owner {
        Some(series) => render_series(&series, format),
        None => {
            println!("Toggled volume {}.", args.volume_id);
            Ok(())
        }
    }
}

pub(crate) async fn handle_update(
    ctx: &AppContext,
    args: UpdateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let patch = SeriesPatch {
        title: args.title.map(|title| title.trim().to_string()),
        total_volumes: args.volumes,
        score: args.score,
        tags: args.tags,
    };
    if patch.is_empty() {
        return Err(CliError::validation(
            "nothing to update; pass at least one of --title, --volumes, --score, --tags",
        ));
    }
    if patch.title.as_deref() == Some("") {
        return Err(CliError::validation("title must not be empty"));
    }
    ctx.require_session()?;
    let updated = ctx.collection.update_series(args.id, &patch).await?;
    render_series(&updated, format)
}

pub(crate) async fn handle_remove(ctx: &AppContext, args: SeriesIdArgs) -> CliResult<()> {
    ctx.require_session()?;
    ctx.collection.delete_series(args.id).await?;
    println!("Deleted series {}.", args.id);
    Ok(())
}

pub(crate) async fn handle_metadata(
    ctx: &AppContext,
    args: MetadataArgs,
    format: OutputFormat,
) -> CliResult<()> {
    ctx.require_session()?;
    let results = ctx.collection.fetch_metadata_many(&args.ids).await?;
    let views: Vec<_> = args
        .ids
        .iter()
        .zip(&results)
        .map(|(external_id, metadata)| MetadataView {
            external_id: external_id.as_str(),
            metadata: metadata.as_ref(),
        })
        .collect();
    render_metadata(&views, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tankobon_config::ClientConfig;
    use tankobon_test_support::fixtures::{series_json, series_list};
    use tankobon_test_support::tokens::token_for;
    use url::Url;

    use crate::client::StderrNotifier;

    struct Fixture {
        ctx: AppContext,
        _dir: tempfile::TempDir,
    }

    fn fixture(server: &MockServer, signed_in: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::with_api_url(Url::parse(&server.base_url()).unwrap());
        config.data_dir = dir.path().to_path_buf();
        config.timings.queue_delay = Duration::from_millis(1);
        let ctx = AppContext::build(&config, Arc::new(StderrNotifier)).unwrap();
        if signed_in {
            ctx.session.set_token(token_for("alice"));
        }
        Fixture { ctx, _dir: dir }
    }

    #[tokio::test]
    async fn collection_commands_require_a_session() {
        let server = MockServer::start_async().await;
        let f = fixture(&server, false);
        let err = handle_list(&f.ctx, OutputFormat::Table).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = handle_remove(&f.ctx, SeriesIdArgs { id: 1 }).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn list_renders_the_refreshed_collection() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET).path("/series");
                then.status(200).json_body(series_list(&[1, 2]));
            })
            .await;
        let f = fixture(&server, true);
        handle_list(&f.ctx, OutputFormat::Json).await.unwrap();
        list.assert_async().await;
        assert_eq!(f.ctx.collection.series().len(), 2);
    }

    #[tokio::test]
    async fn add_sends_tags_only_when_given() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST).path("/series").json_body(json!({
                    "title": "Akira",
                    "total_volumes": 6,
                    "tags": ["cyberpunk"]
                }));
                then.status(201);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/series");
                then.status(200).json_body(series_list(&[9]));
            })
            .await;
        let f = fixture(&server, true);
        let args = AddArgs {
            title: " Akira ".into(),
            volumes: 6,
            score: None,
            tags: vec!["cyberpunk".into()],
        };
        handle_add(&f.ctx, args, OutputFormat::Table).await.unwrap();
        create.assert_async().await;
    }

    #[tokio::test]
    async fn server_validation_errors_exit_with_validation_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/series");
                then.status(422)
                    .json_body(json!({"detail": "total_volumes must be positive"}));
            })
            .await;
        let f = fixture(&server, true);
        let args = AddArgs {
            title: "Zero".into(),
            volumes: 0,
            score: None,
            tags: Vec::new(),
        };
        let err = handle_add(&f.ctx, args, OutputFormat::Table)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "total_volumes must be positive");
    }

    #[tokio::test]
    async fn removing_a_missing_series_is_a_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/series/5");
                then.status(404).body("Series not found");
            })
            .await;
        let f = fixture(&server, true);
        let err = handle_remove(&f.ctx, SeriesIdArgs { id: 5 })
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("Series not found"));
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_any_request() {
        let server = MockServer::start_async().await;
        let f = fixture(&server, true);
        let args = UpdateArgs {
            id: 1,
            title: None,
            volumes: None,
            score: None,
            tags: None,
        };
        let err = handle_update(&f.ctx, args, OutputFormat::Table)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn own_renders_the_series_holding_the_volume() {
        let server = MockServer::start_async().await;
        let toggle = server
            .mock_async(|when, then| {
                when.method(POST).path("/volumes/202/toggle");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/series");
                then.status(200).json_body(json!([series_json(2)]));
            })
            .await;
        let f = fixture(&server, true);
        handle_own(&f.ctx, VolumeIdArgs { volume_id: 202 }, OutputFormat::Table)
            .await
            .unwrap();
        toggle.assert_async().await;
    }

    #[tokio::test]
    async fn metadata_lists_every_requested_id() {
        let server = MockServer::start_async().await;
        let found = server
            .mock_async(|when, then| {
                when.method(GET).path("/metadata/42");
                then.status(200)
                    .json_body(json!({"score": 7.5, "genres": ["Horror"]}));
            })
            .await;
        let missing = server
            .mock_async(|when, then| {
                when.method(GET).path("/metadata/43");
                then.status(404);
            })
            .await;
        let f = fixture(&server, true);
        let args = MetadataArgs {
            ids: vec!["42".into(), "43".into()],
        };
        handle_metadata(&f.ctx, args, OutputFormat::Table)
            .await
            .unwrap();
        found.assert_async().await;
        missing.assert_async().await;
    }
}
