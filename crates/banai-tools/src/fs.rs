//! Filesystem builtins.
//!
//! Relative paths resolve against the script's logical directory. Copy and
//! move overwrite existing files; a destination that is an existing
//! directory receives `dst/<source name>`. Removal of something that does not
//! exist is a no-op.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::envelope::to_value;
use crate::error::{CapabilityError, ToolResult};
use crate::{Args, BuiltinTool, ScriptContext, blocking, paths};

/// Which entries `fsList` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingFilter {
    /// Files and directories.
    #[default]
    All,
    /// Files only.
    FilesOnly,
    /// Directories only.
    DirsOnly,
}

impl ListingFilter {
    /// Parse `""`/`"all"`, `"f"`/`"files"`, `"d"`/`"dirs"`.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::Config`] for any other value.
    pub fn parse(s: &str) -> ToolResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" | "a" => Ok(Self::All),
            "f" | "file" | "files" => Ok(Self::FilesOnly),
            "d" | "dir" | "dirs" => Ok(Self::DirsOnly),
            other => Err(CapabilityError::config(format!(
                "unknown listing filter '{other}', expected all, files or dirs"
            ))),
        }
    }

    fn accepts(self, file_type: fs::FileType) -> bool {
        match self {
            Self::All => true,
            Self::FilesOnly => file_type.is_file(),
            Self::DirsOnly => file_type.is_dir(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

async fn path_arg(args: &Args, ctx: &ScriptContext, idx: usize, name: &str) -> ToolResult<PathBuf> {
    Ok(ctx.resolve(&args.string(idx, name)?).await)
}

/// If `dst` is an existing directory, the entry `src` lands in.
fn landing(src: &Path, dst: &Path) -> PathBuf {
    match src.file_name() {
        Some(name) if dst.is_dir() => dst.join(name),
        _ => dst.to_path_buf(),
    }
}

fn ensure_parent(path: &Path) -> ToolResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| CapabilityError::io(parent, e))
        },
        _ => Ok(()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> ToolResult<()> {
    ensure_parent(path)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CapabilityError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| CapabilityError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| CapabilityError::io(path, e.error))?;
    Ok(())
}

/// Copy a file or a directory tree. Returns the number of files copied.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> ToolResult<usize> {
    let meta = fs::metadata(src).map_err(|e| CapabilityError::io(src, e))?;
    if meta.is_file() {
        ensure_parent(dst)?;
        fs::copy(src, dst).map_err(|e| CapabilityError::io(dst, e))?;
        return Ok(1);
    }

    if let (Ok(s), Some(parent)) = (src.canonicalize(), dst.parent())
        && let Ok(p) = parent.canonicalize()
        && p.starts_with(&s)
    {
        return Err(CapabilityError::config(format!(
            "cannot copy {} into itself",
            src.display()
        )));
    }

    let mut copied = 0usize;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| CapabilityError::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| CapabilityError::io(&target, e))?;
            copied = copied.saturating_add(1);
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> ToolResult<()> {
    let link = fs::read_link(src).map_err(|e| CapabilityError::io(src, e))?;
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst).map_err(|e| CapabilityError::io(dst, e))?;
    }
    std::os::unix::fs::symlink(&link, dst).map_err(|e| CapabilityError::io(dst, e))
}

#[cfg(not(unix))]
fn copy_link(src: &Path, dst: &Path) -> ToolResult<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| CapabilityError::io(dst, e))
}

pub(crate) fn walk_error(root: &Path, e: walkdir::Error) -> CapabilityError {
    let path = e.path().unwrap_or(root).to_path_buf();
    match e.into_io_error() {
        Some(io) => CapabilityError::io(&path, io),
        None => CapabilityError::config(format!("filesystem loop at {}", path.display())),
    }
}

fn move_path(src: &Path, dst: &Path) -> ToolResult<()> {
    let src_meta = fs::symlink_metadata(src).map_err(|e| CapabilityError::io(src, e))?;
    ensure_parent(dst)?;
    let displaced = if src_meta.is_dir()
        && let Ok(existing) = fs::symlink_metadata(dst)
        && existing.is_dir()
    {
        let tombstone = sibling(dst, "mv");
        fs::rename(dst, &tombstone).map_err(|e| CapabilityError::io(dst, e))?;
        Some(tombstone)
    } else {
        None
    };

    let placed = match fs::rename(src, dst) {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            debug!(src = %src.display(), dst = %dst.display(), "rename crosses devices, copying");
            copy_tree(src, dst).map(|_| true)
        },
        Err(e) => Err(CapabilityError::io(dst, e)),
    };

    match placed {
        Ok(copied) => {
            if let Some(tombstone) = displaced
                && let Err(e) = fs::remove_dir_all(&tombstone)
            {
                warn!(tombstone = %tombstone.display(), error = %e, "could not remove replaced directory");
            }
            if !copied {
                return Ok(());
            }
            let removed = if src_meta.is_dir() {
                fs::remove_dir_all(src)
            } else {
                fs::remove_file(src)
            };
            removed.map_err(|e| CapabilityError::io(src, e))
        },
        Err(e) => {
            if let Some(tombstone) = displaced {
                if fs::symlink_metadata(dst).is_ok()
                    && let Err(partial) = fs::remove_dir_all(dst)
                {
                    warn!(path = %dst.display(), error = %partial, "could not clear partial copy");
                }
                if let Err(back) = fs::rename(&tombstone, dst) {
                    warn!(
                        path = %dst.display(),
                        tombstone = %tombstone.display(),
                        error = %back,
                        "could not restore replaced directory"
                    );
                }
            }
            Err(e)
        },
    }
}

/// Hidden sibling of `path` tagged `.{name}.banai-{tag}-{suffix}`.
pub(crate) fn sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    path.with_file_name(format!(".{name}.banai-{tag}-{suffix}"))
}

/// Recursive removal: rename out of the way, then delete.
fn remove_tree(path: &Path) -> ToolResult<()> {
    let tombstone = sibling(path, "rm");
    fs::rename(path, &tombstone).map_err(|e| CapabilityError::io(path, e))?;
    if let Err(e) = fs::remove_dir_all(&tombstone) {
        if let Err(back) = fs::rename(&tombstone, path) {
            warn!(
                path = %path.display(),
                tombstone = %tombstone.display(),
                error = %back,
                "could not restore partially removed directory"
            );
        }
        return Err(CapabilityError::io(path, e));
    }
    Ok(())
}

fn list_dir(dir: &Path, filter: ListingFilter, recursive: bool) -> ToolResult<Vec<String>> {
    let meta = fs::metadata(dir).map_err(|e| CapabilityError::io(dir, e))?;
    if !meta.is_dir() {
        return Err(CapabilityError::config(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    if recursive {
        let mut names = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if filter.accepts(entry.file_type()) {
                let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
                names.push(slash_path(rel));
            }
        }
        return Ok(names);
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CapabilityError::io(dir, e))? {
        let entry = entry.map_err(|e| CapabilityError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| CapabilityError::io(entry.path(), e))?;
        if filter.accepts(file_type) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Relative path with `/` separators.
pub(crate) fn slash_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `fsRead(path)`
pub struct FsReadTool;

#[async_trait::async_trait]
impl BuiltinTool for FsReadTool {
    fn name(&self) -> &'static str {
        "fsRead"
    }

    fn description(&self) -> &'static str {
        "Reads a file: a string when it is UTF-8, otherwise an array of bytes."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path = path_arg(&args, ctx, 0, "path").await?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| CapabilityError::io(&path, e))?;
        if meta.is_dir() {
            return Err(CapabilityError::config(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CapabilityError::io(&path, e))?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Value::String(text)),
            Err(e) => to_value(&e.into_bytes()),
        }
    }
}

/// `fsWrite(path, content)`
pub struct FsWriteTool;

#[async_trait::async_trait]
impl BuiltinTool for FsWriteTool {
    fn name(&self) -> &'static str {
        "fsWrite"
    }

    fn description(&self) -> &'static str {
        "Writes a string or byte array to a file, replacing it atomically."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path = path_arg(&args, ctx, 0, "path").await?;
        let bytes = match args.required::<Content>(1, "content")? {
            Content::Text(text) => text.into_bytes(),
            Content::Bytes(bytes) => bytes,
        };
        let len = bytes.len();
        blocking(move || write_atomic(&path, &bytes)).await?;
        Ok(Value::from(len))
    }
}

/// `fsCopy(src, dst)`
pub struct FsCopyTool;

#[async_trait::async_trait]
impl BuiltinTool for FsCopyTool {
    fn name(&self) -> &'static str {
        "fsCopy"
    }

    fn description(&self) -> &'static str {
        "Copies a file or directory tree, overwriting existing files."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let src = path_arg(&args, ctx, 0, "src").await?;
        let dst = path_arg(&args, ctx, 1, "dst").await?;
        let copied = blocking(move || copy_tree(&src, &landing(&src, &dst))).await?;
        Ok(Value::from(copied))
    }
}

/// `fsMove(src, dst)`
pub struct FsMoveTool;

#[async_trait::async_trait]
impl BuiltinTool for FsMoveTool {
    fn name(&self) -> &'static str {
        "fsMove"
    }

    fn description(&self) -> &'static str {
        "Moves a file or directory, overwriting the destination."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let src = path_arg(&args, ctx, 0, "src").await?;
        let dst = path_arg(&args, ctx, 1, "dst").await?;
        blocking(move || move_path(&src, &landing(&src, &dst))).await?;
        Ok(Value::Null)
    }
}

/// `fsRemove(path)`
pub struct FsRemoveTool;

#[async_trait::async_trait]
impl BuiltinTool for FsRemoveTool {
    fn name(&self) -> &'static str {
        "fsRemove"
    }

    fn description(&self) -> &'static str {
        "Removes a file; a missing file is not an error."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path = path_arg(&args, ctx, 0, "path").await?;
        match tokio::fs::symlink_metadata(&path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Value::Bool(false)),
            Err(e) => return Err(CapabilityError::io(&path, e)),
            Ok(meta) if meta.is_dir() => {
                return Err(CapabilityError::config(format!(
                    "{} is a directory, use fsRemoveDir",
                    path.display()
                )));
            },
            Ok(_) => {},
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| CapabilityError::io(&path, e))?;
        Ok(Value::Bool(true))
    }
}

/// `fsCreateDir(path)`
pub struct FsCreateDirTool;

#[async_trait::async_trait]
impl BuiltinTool for FsCreateDirTool {
    fn name(&self) -> &'static str {
        "fsCreateDir"
    }

    fn description(&self) -> &'static str {
        "Creates a directory and its parents."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path = path_arg(&args, ctx, 0, "path").await?;
        if let Ok(meta) = tokio::fs::metadata(&path).await
            && !meta.is_dir()
        {
            return Err(CapabilityError::AlreadyExists(path.display().to_string()));
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| CapabilityError::io(&path, e))?;
        Ok(Value::Null)
    }
}

/// `fsRemoveDir(path, recursive?)`
pub struct FsRemoveDirTool;

#[async_trait::async_trait]
impl BuiltinTool for FsRemoveDirTool {
    fn name(&self) -> &'static str {
        "fsRemoveDir"
    }

    fn description(&self) -> &'static str {
        "Removes a directory; with recursive=true removes its contents all-or-nothing."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path = path_arg(&args, ctx, 0, "path").await?;
        let recursive = args.optional::<bool>(1, "recursive")?.unwrap_or(false);
        match tokio::fs::symlink_metadata(&path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Value::Bool(false)),
            Err(e) => return Err(CapabilityError::io(&path, e)),
            Ok(meta) if !meta.is_dir() => {
                return Err(CapabilityError::config(format!(
                    "{} is not a directory",
                    path.display()
                )));
            },
            Ok(_) => {},
        }
        if recursive {
            blocking(move || remove_tree(&path)).await?;
        } else {
            tokio::fs::remove_dir(&path)
                .await
                .map_err(|e| CapabilityError::io(&path, e))?;
        }
        Ok(Value::Bool(true))
    }
}

/// `fsList(path?, filter?, recursive?)`
pub struct FsListTool;

#[async_trait::async_trait]
impl BuiltinTool for FsListTool {
    fn name(&self) -> &'static str {
        "fsList"
    }

    fn description(&self) -> &'static str {
        "Lists entry names of a directory, optionally filtered and recursive."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let dir = match args.optional::<String>(0, "path")? {
            Some(p) => ctx.resolve(&p).await,
            None => ctx.cwd().await,
        };
        let filter = ListingFilter::parse(
            &args
                .optional::<String>(1, "filter")?
                .unwrap_or_default(),
        )?;
        let recursive = args.optional::<bool>(2, "recursive")?.unwrap_or(false);
        let names = blocking(move || list_dir(&dir, filter, recursive)).await?;
        to_value(&names)
    }
}

/// `fsSplit(path) -> {folder, file, title, ext}`
pub struct FsSplitTool;

#[async_trait::async_trait]
impl BuiltinTool for FsSplitTool {
    fn name(&self) -> &'static str {
        "fsSplit"
    }

    fn description(&self) -> &'static str {
        "Splits a path into folder, file, title and extension."
    }

    async fn execute(&self, args: Args, _ctx: &ScriptContext) -> ToolResult<Value> {
        let path: String = args.required(0, "path")?;
        to_value(&paths::split(&path))
    }
}

/// `fsJoin(...parts)`
pub struct FsJoinTool;

#[async_trait::async_trait]
impl BuiltinTool for FsJoinTool {
    fn name(&self) -> &'static str {
        "fsJoin"
    }

    fn description(&self) -> &'static str {
        "Joins path segments and normalizes the result."
    }

    async fn execute(&self, args: Args, _ctx: &ScriptContext) -> ToolResult<Value> {
        // A single array argument is accepted too.
        let parts = match args.raw(0) {
            Some(Value::Array(_)) if args.len() == 1 => args.required::<Vec<String>>(0, "parts")?,
            _ => args.rest_strings(0)?,
        };
        Ok(Value::String(paths::join(&parts)))
    }
}

/// `fsAbs(path)`
pub struct FsAbsTool;

#[async_trait::async_trait]
impl BuiltinTool for FsAbsTool {
    fn name(&self) -> &'static str {
        "fsAbs"
    }

    fn description(&self) -> &'static str {
        "Absolute, normalized form of a path against the logical directory."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let path: String = args.required(0, "path")?;
        let cwd = ctx.cwd().await;
        Ok(Value::String(paths::abs(&path, &cwd.to_string_lossy())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::{args, ctx};
    use serde_json::json;
    use tempfile::TempDir;

    async fn call(tool: &dyn BuiltinTool, ctx: &ScriptContext, a: Vec<Value>) -> ToolResult<Value> {
        tool.execute(args(a), ctx).await
    }

    #[tokio::test]
    async fn test_write_read_round_trip_text_and_bytes() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        call(&FsWriteTool, &ctx, vec![json!("a/b/notes.txt"), json!("héllo\nworld")])
            .await
            .unwrap();
        let v = call(&FsReadTool, &ctx, vec![json!("a/b/notes.txt")]).await.unwrap();
        assert_eq!(v, json!("héllo\nworld"));

        let bytes = vec![0u8, 159, 146, 150, 255];
        call(&FsWriteTool, &ctx, vec![json!("bin"), json!(bytes)])
            .await
            .unwrap();
        let v = call(&FsReadTool, &ctx, vec![json!("bin")]).await.unwrap();
        assert_eq!(v, json!(bytes));
    }

    #[tokio::test]
    async fn test_read_errors() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(dir.path());
        let err = call(&FsReadTool, &ctx, vec![json!("missing")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = call(&FsReadTool, &ctx, vec![json!(".")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_copy_file_into_directory_and_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("src.txt"), "new").unwrap();
        fs::create_dir(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/src.txt"), "old").unwrap();
        let ctx = ctx(dir.path());
        call(&FsCopyTool, &ctx, vec![json!("src.txt"), json!("out")])
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out/src.txt")).unwrap(), "new");
        assert!(dir.path().join("src.txt").exists());
    }

    #[tokio::test]
    async fn test_copy_tree_and_missing_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tree/inner")).unwrap();
        fs::write(dir.path().join("tree/a"), "1").unwrap();
        fs::write(dir.path().join("tree/inner/b"), "2").unwrap();
        let ctx = ctx(dir.path());
        let n = call(&FsCopyTool, &ctx, vec![json!("tree"), json!("copy")])
            .await
            .unwrap();
        assert_eq!(n, json!(2));
        assert_eq!(fs::read_to_string(dir.path().join("copy/inner/b")).unwrap(), "2");

        let err = call(&FsCopyTool, &ctx, vec![json!("ghost"), json!("x")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = call(&FsCopyTool, &ctx, vec![json!("tree"), json!("tree/inner/deeper")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_move() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "A").unwrap();
        fs::write(dir.path().join("b.txt"), "B").unwrap();
        let ctx = ctx(dir.path());
        call(&FsMoveTool, &ctx, vec![json!("a.txt"), json!("b.txt")])
            .await
            .unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "A");

        let err = call(&FsMoveTool, &ctx, vec![json!("a.txt"), json!("c.txt")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    fn hidden_entries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    #[tokio::test]
    async fn test_move_directory_replaces_existing_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tree")).unwrap();
        fs::write(dir.path().join("tree/new.txt"), "new").unwrap();
        fs::create_dir_all(dir.path().join("out/tree")).unwrap();
        fs::write(dir.path().join("out/tree/old.txt"), "old").unwrap();
        let ctx = ctx(dir.path());
        call(&FsMoveTool, &ctx, vec![json!("tree"), json!("out")])
            .await
            .unwrap();
        assert!(!dir.path().join("tree").exists());
        assert_eq!(fs::read_to_string(dir.path().join("out/tree/new.txt")).unwrap(), "new");
        assert!(!dir.path().join("out/tree/old.txt").exists());
        assert!(hidden_entries(&dir.path().join("out")).is_empty());
    }

    #[tokio::test]
    async fn test_failed_directory_move_keeps_destination() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/child/a")).unwrap();
        fs::write(dir.path().join("a/child/a/marker.txt"), "keep").unwrap();
        let ctx = ctx(dir.path());
        // Lands on a/child/a, which is inside the source: rename must fail.
        call(&FsMoveTool, &ctx, vec![json!("a"), json!("a/child")])
            .await
            .unwrap_err();
        assert_eq!(
            fs::read_to_string(dir.path().join("a/child/a/marker.txt")).unwrap(),
            "keep"
        );
        assert!(hidden_entries(&dir.path().join("a/child")).is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f"), "x").unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        let ctx = ctx(dir.path());
        assert_eq!(call(&FsRemoveTool, &ctx, vec![json!("f")]).await.unwrap(), json!(true));
        assert_eq!(call(&FsRemoveTool, &ctx, vec![json!("f")]).await.unwrap(), json!(false));
        let err = call(&FsRemoveTool, &ctx, vec![json!("d")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_create_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file"), "x").unwrap();
        let ctx = ctx(dir.path());
        call(&FsCreateDirTool, &ctx, vec![json!("x/y/z")]).await.unwrap();
        call(&FsCreateDirTool, &ctx, vec![json!("x/y/z")]).await.unwrap();
        assert!(dir.path().join("x/y/z").is_dir());
        let err = call(&FsCreateDirTool, &ctx, vec![json!("file")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_remove_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("full/sub")).unwrap();
        fs::write(dir.path().join("full/sub/f"), "x").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        let ctx = ctx(dir.path());

        let err = call(&FsRemoveDirTool, &ctx, vec![json!("full")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirNotEmpty);
        assert!(dir.path().join("full/sub/f").exists());

        call(&FsRemoveDirTool, &ctx, vec![json!("empty")]).await.unwrap();
        call(&FsRemoveDirTool, &ctx, vec![json!("full"), json!(true)])
            .await
            .unwrap();
        assert!(!dir.path().join("full").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());

        let v = call(&FsRemoveDirTool, &ctx, vec![json!("full"), json!(true)])
            .await
            .unwrap();
        assert_eq!(v, json!(false));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("d1/d2")).unwrap();
        fs::write(dir.path().join("f1"), "").unwrap();
        fs::write(dir.path().join("d1/f2"), "").unwrap();
        let ctx = ctx(dir.path());

        let sorted = |v: Value| {
            let mut names: Vec<String> = serde_json::from_value(v).unwrap();
            names.sort();
            names
        };
        let all = call(&FsListTool, &ctx, vec![]).await.unwrap();
        assert_eq!(sorted(all), vec!["d1", "f1"]);
        let files = call(&FsListTool, &ctx, vec![json!("."), json!("f")]).await.unwrap();
        assert_eq!(sorted(files), vec!["f1"]);
        let dirs = call(&FsListTool, &ctx, vec![json!("."), json!("dirs"), json!(true)])
            .await
            .unwrap();
        assert_eq!(sorted(dirs), vec!["d1", "d1/d2"]);
        let rec = call(&FsListTool, &ctx, vec![json!("."), json!("files"), json!(true)])
            .await
            .unwrap();
        assert_eq!(sorted(rec), vec!["d1/f2", "f1"]);

        let err = call(&FsListTool, &ctx, vec![json!("."), json!("weird")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = call(&FsListTool, &ctx, vec![json!("nope")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_pure_path_builtins() {
        let ctx = ctx(Path::new("/work/space"));
        let parts = call(&FsSplitTool, &ctx, vec![json!("/a/b/c.tar.gz")]).await.unwrap();
        assert_eq!(
            parts,
            json!({"folder": "/a/b/", "file": "c.tar.gz", "title": "c.tar", "ext": ".gz"})
        );
        let joined = call(&FsJoinTool, &ctx, vec![parts["folder"].clone(), parts["file"].clone()])
            .await
            .unwrap();
        assert_eq!(joined, json!("/a/b/c.tar.gz"));
        let joined = call(&FsJoinTool, &ctx, vec![json!(["x", "..", "y"])]).await.unwrap();
        assert_eq!(joined, json!("y"));
        let abs = call(&FsAbsTool, &ctx, vec![json!("../etc")]).await.unwrap();
        assert_eq!(abs, json!("/work/etc"));
    }
}
