//! List CLI command

use clap::Args;

use super::KindArg;
use crate::api::ResourceApi;
use crate::config::Settings;
use crate::display::{format_listing, format_packages, format_versions};
use crate::error::{VaultError, VaultResult};
use crate::models::{ResourceDocument, Scope};
use crate::services::feed;

/// Arguments of `azdo-vault list`
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Kind of object to list
    #[arg(value_enum)]
    pub kind: KindArg,

    /// Organization alias (defaults to the configured default)
    #[arg(long)]
    pub org: Option<String>,

    /// Project to list
    #[arg(long)]
    pub project: String,

    /// List the packages of this feed (name or id); `feeds` only
    #[arg(long)]
    pub feed: Option<String>,

    /// List the versions of this package (name or id) in `--feed`
    #[arg(long, requires = "feed")]
    pub package: Option<String>,

    /// Only packages of this protocol: npm, nuget, maven, pypi, ...
    #[arg(long, requires = "feed", conflicts_with = "package")]
    pub protocol: Option<String>,
}

/// Handle `azdo-vault list`: what exists right now, without touching snapshots
pub fn handle_list_command(settings: &Settings, api: &dyn ResourceApi, args: ListArgs, json: bool) -> VaultResult<()> {
    let scope = settings.scope(args.org.as_deref(), &args.project)?;

    if let Some(feed_name) = args.feed.as_deref() {
        if args.kind != KindArg::Feeds {
            return Err(VaultError::Validation(
                "--feed only applies to `list feeds`".to_string(),
            ));
        }
        return list_feed_contents(api, &scope, feed_name, &args, json);
    }

    for kind in args.kind.kinds() {
        let summaries = api.list(&scope, kind)?;
        if json {
            let records: Vec<_> = summaries.iter().map(|s| s.record.as_map()).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            println!("{}\n", format_listing(kind, &summaries));
        }
    }
    Ok(())
}

fn list_feed_contents(
    api: &dyn ResourceApi,
    scope: &Scope,
    feed_name: &str,
    args: &ListArgs,
    json: bool,
) -> VaultResult<()> {
    match args.package.as_deref() {
        Some(package) => {
            let (name, versions) = feed::package_versions(api, scope, feed_name, package)?;
            print_documents(&versions, json, || format_versions(&name, &versions))
        }
        None => {
            let (found, packages) = feed::feed_packages(api, scope, feed_name, args.protocol.as_deref())?;
            print_documents(&packages, json, || format_packages(&found.name, &packages))
        }
    }
}

fn print_documents(documents: &[ResourceDocument], json: bool, table: impl FnOnce() -> String) -> VaultResult<()> {
    if json {
        let records: Vec<_> = documents.iter().map(ResourceDocument::as_map).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        println!("{}", table());
    }
    Ok(())
}
