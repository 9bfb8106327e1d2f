//! Zip packing and unpacking.
//!
//! `arZip` writes to a temp file beside the archive and persists it only
//! when every entry was added. `arUnzip` validates every entry name before
//! writing anything, and removes whatever it created if extraction fails
//! part way. A file an entry overwrites is first moved to a hidden sibling
//! and put back on rollback, so a failed extraction leaves the destination
//! as it found it. Directory entries and file parents must resolve inside
//! the destination before anything is created under them.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{CapabilityError, ToolResult};
use crate::fs::{sibling, slash_path, walk_error};
use crate::{Args, BuiltinTool, ScriptContext, blocking};

fn zip_error(archive: &Path, e: ZipError) -> CapabilityError {
    match e {
        ZipError::Io(io) => CapabilityError::io(archive, io),
        ZipError::FileNotFound => CapabilityError::not_found(archive),
        other => CapabilityError::config(format!("invalid archive {}: {other}", archive.display())),
    }
}

fn options_for(path: &Path) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            return options.unix_permissions(meta.permissions().mode() & 0o7777);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    options
}

/// Canonical form of a path that may not exist yet.
fn canonical_target(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

fn add_file<W: io::Write + io::Seek>(
    writer: &mut ZipWriter<W>,
    path: &Path,
    name: String,
    archive: &Path,
) -> ToolResult<()> {
    writer
        .start_file(name, options_for(path))
        .map_err(|e| zip_error(archive, e))?;
    let mut file = File::open(path).map_err(|e| CapabilityError::io(path, e))?;
    io::copy(&mut file, writer).map_err(|e| CapabilityError::io(path, e))?;
    Ok(())
}

fn zip_into(archive: &Path, source: &Path) -> ToolResult<Vec<String>> {
    let meta = fs::metadata(source).map_err(|e| CapabilityError::io(source, e))?;
    let dir = archive
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CapabilityError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".banai-zip-")
        .tempfile_in(dir)
        .map_err(|e| CapabilityError::io(dir, e))?;
    let skip: Vec<PathBuf> = [canonical_target(archive), tmp.path().canonicalize().ok()]
        .into_iter()
        .flatten()
        .collect();

    let mut files = Vec::new();
    {
        let mut writer = ZipWriter::new(tmp.as_file_mut());
        if meta.is_file() {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            add_file(&mut writer, source, name.clone(), archive)?;
            files.push(name);
        } else {
            let walker = WalkDir::new(source).min_depth(1).sort_by_file_name();
            for entry in walker {
                let entry = entry.map_err(|e| walk_error(source, e))?;
                if let Ok(canonical) = entry.path().canonicalize()
                    && skip.contains(&canonical)
                {
                    continue;
                }
                let rel = slash_path(entry.path().strip_prefix(source).unwrap_or(entry.path()));
                if entry.file_type().is_dir() {
                    writer
                        .add_directory(format!("{rel}/"), options_for(entry.path()))
                        .map_err(|e| zip_error(archive, e))?;
                } else if entry.path().is_file() {
                    add_file(&mut writer, entry.path(), rel.clone(), archive)?;
                    files.push(rel);
                } else {
                    debug!(path = %entry.path().display(), "skipping non-file entry");
                }
            }
        }
        writer.finish().map_err(|e| zip_error(archive, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| CapabilityError::io(archive, e))?;
    tmp.persist(archive)
        .map_err(|e| CapabilityError::io(archive, e.error))?;
    Ok(files)
}

/// Everything an extraction created or displaced, for rollback.
#[derive(Default)]
struct Created {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    /// `(original, backup)` for every file an entry replaced.
    replaced: Vec<(PathBuf, PathBuf)>,
}

impl Created {
    fn rollback(self) {
        for file in self.files.iter().rev() {
            if let Err(e) = fs::remove_file(file) {
                warn!(path = %file.display(), error = %e, "rollback could not remove file");
            }
        }
        for (original, backup) in self.replaced.iter().rev() {
            if let Err(e) = fs::rename(backup, original) {
                warn!(
                    path = %original.display(),
                    backup = %backup.display(),
                    error = %e,
                    "rollback could not restore replaced file"
                );
            }
        }
        for dir in self.dirs.iter().rev() {
            if let Err(e) = fs::remove_dir(dir) {
                warn!(path = %dir.display(), error = %e, "rollback could not remove directory");
            }
        }
    }

    /// `create_dir_all`, remembering the directories that did not exist.
    fn make_dirs(&mut self, path: &Path, root: &Path) -> ToolResult<()> {
        let mut missing = Vec::new();
        let mut cur = path;
        while cur != root && fs::symlink_metadata(cur).is_err() {
            missing.push(cur.to_path_buf());
            match cur.parent() {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        fs::create_dir_all(path).map_err(|e| CapabilityError::io(path, e))?;
        self.dirs.extend(missing.into_iter().rev());
        Ok(())
    }

    /// Drops the backups once every entry landed.
    fn commit(self) {
        for (_, backup) in &self.replaced {
            if let Err(e) = fs::remove_file(backup) {
                warn!(backup = %backup.display(), error = %e, "could not remove replaced file");
            }
        }
    }
}

/// Whether the deepest existing ancestor of `path` resolves inside `root`.
fn resolves_inside(path: &Path, root: &Path) -> bool {
    let mut cur = path;
    while fs::symlink_metadata(cur).is_err() {
        match cur.parent() {
            Some(parent) => cur = parent,
            None => return false,
        }
    }
    cur.canonicalize().is_ok_and(|p| p.starts_with(root))
}

struct PlannedEntry {
    index: usize,
    rel: PathBuf,
    is_dir: bool,
    mode: Option<u32>,
}

fn plan(zip: &mut ZipArchive<File>, archive: &Path) -> ToolResult<Vec<PlannedEntry>> {
    (0..zip.len())
        .map(|index| {
            let entry = zip.by_index_raw(index).map_err(|e| zip_error(archive, e))?;
            let rel = entry
                .enclosed_name()
                .ok_or_else(|| CapabilityError::ArchiveSecurity(entry.name().to_owned()))?;
            Ok(PlannedEntry {
                index,
                rel,
                is_dir: entry.is_dir(),
                mode: entry.unix_mode(),
            })
        })
        .collect()
}

fn extract(
    zip: &mut ZipArchive<File>,
    archive: &Path,
    entries: &[PlannedEntry],
    root: &Path,
    created: &mut Created,
) -> ToolResult<Vec<String>> {
    let mut files = Vec::new();
    for planned in entries {
        let target = root.join(&planned.rel);
        let shown = slash_path(&planned.rel);
        if planned.is_dir {
            if !resolves_inside(&target, root) {
                return Err(CapabilityError::ArchiveSecurity(shown));
            }
            created.make_dirs(&target, root)?;
            continue;
        }

        let parent = target.parent().unwrap_or(root);
        if !resolves_inside(parent, root) {
            return Err(CapabilityError::ArchiveSecurity(shown));
        }
        created.make_dirs(parent, root)?;
        let inside = parent.canonicalize().is_ok_and(|p| p.starts_with(root));
        let is_link = fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink());
        if !inside || is_link {
            return Err(CapabilityError::ArchiveSecurity(shown));
        }

        let ours = created.files.contains(&target);
        if !ours && target.is_file() {
            let backup = sibling(&target, "bak");
            fs::rename(&target, &backup).map_err(|e| CapabilityError::io(&target, e))?;
            created.replaced.push((target.clone(), backup));
        }
        let mut out = File::create(&target).map_err(|e| CapabilityError::io(&target, e))?;
        if !ours {
            created.files.push(target.clone());
        }
        let mut entry = zip
            .by_index(planned.index)
            .map_err(|e| zip_error(archive, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| CapabilityError::io(&target, e))?;
        set_mode(&target, planned.mode);
        files.push(shown);
    }
    Ok(files)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode
        && let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
    {
        debug!(path = %path.display(), error = %e, "could not apply archived mode");
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) {}

fn unzip_into(archive: &Path, dest: &Path) -> ToolResult<Vec<String>> {
    let file = File::open(archive).map_err(|e| CapabilityError::io(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| zip_error(archive, e))?;
    let entries = plan(&mut zip, archive)?;

    let mut created = Created::default();
    let dest_existed = dest.exists();
    fs::create_dir_all(dest).map_err(|e| CapabilityError::io(dest, e))?;
    if !dest_existed {
        created.dirs.push(dest.to_path_buf());
    }
    let root = dest
        .canonicalize()
        .map_err(|e| CapabilityError::io(dest, e))?;

    match extract(&mut zip, archive, &entries, &root, &mut created) {
        Ok(files) => {
            created.commit();
            Ok(files)
        },
        Err(e) => {
            warn!(archive = %archive.display(), error = %e, "extraction failed, rolling back");
            created.rollback();
            Err(e)
        },
    }
}

/// `arZip(archivePath, sourcePath) -> {filesZipped, files}`
pub struct ArZipTool;

#[async_trait::async_trait]
impl BuiltinTool for ArZipTool {
    fn name(&self) -> &'static str {
        "arZip"
    }

    fn description(&self) -> &'static str {
        "Packs a file or directory tree into a zip archive."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let archive = ctx.resolve(&args.string(0, "archivePath")?).await;
        let source = ctx.resolve(&args.string(1, "sourcePath")?).await;
        let files = blocking(move || zip_into(&archive, &source)).await?;
        Ok(json!({ "filesZipped": files.len(), "files": files }))
    }
}

/// `arUnzip(archivePath, destPath) -> {filesUnzipped, files}`
pub struct ArUnzipTool;

#[async_trait::async_trait]
impl BuiltinTool for ArUnzipTool {
    fn name(&self) -> &'static str {
        "arUnzip"
    }

    fn description(&self) -> &'static str {
        "Extracts a zip archive, refusing entries that would land outside the destination."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let archive = ctx.resolve(&args.string(0, "archivePath")?).await;
        let dest = ctx.resolve(&args.string(1, "destPath")?).await;
        let files = blocking(move || unzip_into(&archive, &dest)).await?;
        Ok(json!({ "filesUnzipped": files.len(), "files": files }))
    }
}
