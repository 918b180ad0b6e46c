use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DB_FILE_NAME: &str = "edutrack.sqlite3";
const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/edutrack.sqlite3";
pub const BUNDLE_FORMAT_V1: &str = "edutrack-workspace-v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BundleManifest {
    format: String,
    version: u32,
    app_version: String,
    /// Seconds since the epoch.
    exported_at: i64,
    db_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Writes `manifest.json` and a copy of the workspace database into a zip at
/// `out_path`. The manifest records the database digest for import to check.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        );
    }
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("failed to read database {}", db_path.to_string_lossy()))?;
    let manifest = BundleManifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        version: 1,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().timestamp(),
        db_sha256: Some(sha256_hex(&db_bytes)),
    };
    let manifest_json =
        serde_json::to_vec_pretty(&manifest).context("failed to serialize manifest")?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in [(MANIFEST_ENTRY, &manifest_json), (DB_ENTRY, &db_bytes)] {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {name}"))?;
    }
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: 2,
        db_sha256: manifest.db_sha256.unwrap_or_default(),
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("bundle missing {name}"))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to extract {name}"))?;
    Ok(bytes)
}

/// Writes next to the destination first so a failed write never leaves a
/// half-written database in place.
fn replace_database(workspace_path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dst = workspace_path.join(DB_FILE_NAME);
    let staging = workspace_path.join(format!("{DB_FILE_NAME}.importing"));
    let _ = std::fs::remove_file(&staging);

    let mut out = File::create(&staging)
        .with_context(|| format!("failed to create {}", staging.to_string_lossy()))?;
    out.write_all(bytes)
        .and_then(|()| out.sync_all())
        .context("failed to write extracted database")?;
    drop(out);

    if dst.exists() {
        std::fs::remove_file(&dst)
            .with_context(|| format!("failed to remove {}", dst.to_string_lossy()))?;
    }
    std::fs::rename(&staging, &dst)
        .with_context(|| format!("failed to move database into {}", dst.to_string_lossy()))
}

/// Replaces the workspace database with the one in the bundle. The database
/// is checked against the manifest digest before anything is overwritten.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest: BundleManifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }
    let expected = manifest
        .db_sha256
        .ok_or_else(|| anyhow!("manifest.json missing dbSha256"))?
        .to_ascii_lowercase();

    let db_bytes = read_entry(&mut archive, DB_ENTRY)?;
    let actual = sha256_hex(&db_bytes);
    if actual != expected {
        bail!("database checksum mismatch: expected {expected}, got {actual}");
    }

    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    replace_database(workspace_path, &db_bytes)?;

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
    })
}
