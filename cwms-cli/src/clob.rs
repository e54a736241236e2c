//! Handlers for `cwms-cli clob <command>`.
//!
//! Clobs are text values stored under an uppercase id. The commands mirror the
//! blob ones and share their connection handling and row formatting.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::blob::{aligned_rows, connection, require_api_key, sort_and_limit};
use crate::cda::{clob_view_url, CdaClient, Clob};
use crate::cli::{
    ClobCommand, ClobDeleteArgs, ClobDownloadArgs, ClobListArgs, ClobUpdateArgs, ClobUploadArgs,
};
use crate::load_config::{resolve_office, Profile};

pub async fn run(command: ClobCommand, profile: &Profile) -> Result<()> {
    match command {
        ClobCommand::Upload(args) => upload_cmd(args, profile).await,
        ClobCommand::Download(args) => download_cmd(args, profile).await,
        ClobCommand::List(args) => list_cmd(args, profile).await,
        ClobCommand::Delete(args) => delete_cmd(args, profile).await,
        ClobCommand::Update(args) => update_cmd(args, profile).await,
    }
}

fn read_text(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))?;
    info!(path = %path.display(), bytes = text.len(), "Read file");
    Ok(text)
}

async fn upload_cmd(args: ClobUploadArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let value = read_text(&args.input_file)?;
    let clob = Clob {
        office: Some(office),
        id: args.clob_id.to_uppercase(),
        description: args.description.clone(),
        value: Some(value),
    };
    let overwrite = args.overwrite && !args.no_overwrite;

    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let client = CdaClient::new(&conn)?;

    if args.dry_run {
        let chars = clob.value.as_deref().map_or(0, |v| v.chars().count());
        let summary = serde_json::json!({
            "url": format!("{}clobs", client.api_root()),
            "params": { "fail-if-exists": !overwrite },
            "clob": {
                "office-id": clob.office,
                "id": clob.id,
                "description": clob.description,
                "value": format!("<{chars} chars>"),
            },
        });
        info!(payload = %summary, "--dry-run enabled, would POST clob");
        return Ok(());
    }

    let view = client
        .store_clob(&clob, overwrite)
        .await
        .with_context(|| format!("Failed to upload clob {}", clob.id))?;
    info!(clob_id = %clob.id, view = %view, "Uploaded clob");
    println!("{view}");
    Ok(())
}

async fn download_cmd(args: ClobDownloadArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let clob_id = args.clob_id.to_uppercase();
    let dest = args
        .dest
        .clone()
        .unwrap_or_else(|| PathBuf::from(&clob_id));
    let conn = connection(&args.connection, profile)?;
    let client = CdaClient::new(&conn)?;

    if args.dry_run {
        let url = clob_view_url(client.api_root(), &clob_id, &office)?;
        info!(url = %url, dest = %dest.display(), "--dry-run enabled, would GET clob");
        return Ok(());
    }

    let clob = client
        .get_clob(&clob_id, &office)
        .await
        .with_context(|| format!("Failed to download clob {clob_id}"))?;
    let value = clob.value.unwrap_or_default();

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(&dest, value.as_bytes())
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    info!(clob_id = %clob_id, dest = %dest.display(), "Downloaded clob");
    println!("{}", dest.display());
    Ok(())
}

async fn list_cmd(args: ClobListArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let conn = connection(&args.connection, profile)?;
    let client = CdaClient::new(&conn)?;

    let clobs = client
        .list_clobs(&office, args.clob_id_like.as_deref())
        .await
        .context("Failed to list clobs")?;
    let rows = sort_and_limit(clobs, |c: &Clob| c.id.as_str(), args.desc, args.limit);
    info!(office = %office, rows = rows.len(), "Listed clobs");
    for line in format_rows(&rows) {
        println!("{line}");
    }
    Ok(())
}

async fn delete_cmd(args: ClobDeleteArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let clob_id = args.clob_id.to_uppercase();
    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let client = CdaClient::new(&conn)?;

    if args.dry_run {
        let url = clob_view_url(client.api_root(), &clob_id, &office)?;
        info!(url = %url, "--dry-run enabled, would DELETE clob");
        return Ok(());
    }

    client
        .delete_clob(&clob_id, &office)
        .await
        .with_context(|| format!("Failed to delete clob {clob_id}"))?;
    info!(clob_id = %clob_id, office = %office, "Deleted clob");
    Ok(())
}

async fn update_cmd(args: ClobUpdateArgs, profile: &Profile) -> Result<()> {
    let office = resolve_office(args.connection.office.as_deref(), profile)?;
    let value = args.input_file.as_deref().map(read_text).transpose()?;
    let clob = Clob {
        office: Some(office),
        id: args.clob_id.to_uppercase(),
        description: args.description.clone(),
        value,
    };
    let ignore_nulls = !args.no_ignore_nulls;

    let conn = connection(&args.connection, profile)?;
    require_api_key(&conn, args.dry_run)?;
    let client = CdaClient::new(&conn)?;

    if args.dry_run {
        info!(
            clob_id = %clob.id,
            ignore_nulls,
            description_set = clob.description.is_some(),
            value_set = clob.value.is_some(),
            "--dry-run enabled, would PATCH clob"
        );
        return Ok(());
    }

    client
        .update_clob(&clob, ignore_nulls)
        .await
        .with_context(|| format!("Failed to update clob {}", clob.id))?;
    info!(clob_id = %clob.id, "Updated clob");
    Ok(())
}

fn format_rows(rows: &[Clob]) -> Vec<String> {
    let cells: Vec<Vec<&str>> = rows
        .iter()
        .map(|c| vec![c.id.as_str(), c.description.as_deref().unwrap_or("")])
        .collect();
    aligned_rows(&cells)
}
