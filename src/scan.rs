//! Oversized-object scanning across cloned repositories.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};

use crate::errors::{DroverError, DroverErrorKind};
use crate::repolist::mirrors_in;

/// GitHub's hard object size limit.
pub const GH_OBJ_SIZE_LIMIT: u64 = 100 * BASE * BASE;

/// Unit base (1024 = kB/MB/..., 1000 would be KiB-style decimal).
const BASE: u64 = 1024;

/// Unit suffixes matching `BASE`.
const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

/// One blob at or above the size limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeObject {
    /// Object id.
    pub id: String,

    /// Object size in bytes.
    pub size: u64,

    /// Path of the blob inside the repository, when recorded.
    pub path: String,
}

/// Everything found by a scan run.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Large objects per repository, only repositories that have any.
    pub large: BTreeMap<String, Vec<LargeObject>>,

    /// Repositories whose scan failed.
    pub failed: Vec<String>,
}

/// Parse one `git cat-file --batch-check` line into a large-object
/// candidate. Non-blob lines yield `None`.
pub(crate) fn parse_object_line(line: &str) -> Option<LargeObject> {
    let mut fields = line.splitn(4, ' ');
    let obj_type = fields.next()?;
    if obj_type != "blob" {
        return None;
    }
    let id = fields.next()?.to_string();
    let size = fields.next()?.parse().ok()?;
    let path = fields.next().unwrap_or_default().to_string();
    Some(LargeObject { id, size, path })
}

/// Human-readable file size, e.g. `100.1MB`.
pub fn humanize_size(size: u64) -> String {
    let mut value = size as f64;
    let mut unit = 0;
    while value >= BASE as f64 && unit < UNITS.len() - 1 {
        value /= BASE as f64;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}

/// Scan one repository for blobs at or above `limit`.
///
/// Runs `git rev-list --objects --all` piped into
/// `git cat-file --batch-check`, the same pipeline a human would use to
/// find oversized history objects.
pub async fn scan_repo(repo_dir: &Path, limit: u64) -> Result<Vec<LargeObject>, DroverError> {
    let mut revlist = Command::new("git")
        .args(["rev-list", "--objects", "--all"])
        .current_dir(repo_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    let revlist_out: Stdio = revlist
        .stdout
        .take()
        .ok_or_else(|| {
            DroverError::new(DroverErrorKind::Process).with_text("rev-list stdout missing")
        })?
        .try_into()?;
    let mut catfile = Command::new("git")
        .args([
            "cat-file",
            "--batch-check=%(objecttype) %(objectname) %(objectsize) %(rest)",
        ])
        .current_dir(repo_dir)
        .stdin(revlist_out)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    let stdout = catfile.stdout.take().ok_or_else(|| {
        DroverError::new(DroverErrorKind::Process).with_text("cat-file stdout missing")
    })?;

    let mut found = vec![];
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(obj) = parse_object_line(&line) {
            if obj.size >= limit {
                found.push(obj);
            }
        }
    }
    let revlist_status = revlist.wait().await?;
    let catfile_status = catfile.wait().await?;
    if !revlist_status.success() || !catfile_status.success() {
        return Err(DroverError::new(DroverErrorKind::Process).with_text(&format!(
            "scan pipeline failed (rev-list {revlist_status}, cat-file {catfile_status})"
        )));
    }
    Ok(found)
}

/// Scan every mirror under `repos_path` with bounded parallelism.
///
/// Scans are local and not worth retrying; a failing repository is
/// recorded in the report instead of stopping its siblings. Each
/// repository's pipeline runs under `task_timeout`; expiry kills the git
/// processes via kill-on-drop.
pub async fn scan_all(
    repos_path: &Path,
    limit: u64,
    concurrency: usize,
    task_timeout: Duration,
) -> Result<ScanReport, DroverError> {
    let items = mirrors_in(repos_path)?;
    let gate = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set: JoinSet<(String, Result<Vec<LargeObject>, DroverError>)> = JoinSet::new();
    for item in items {
        let gate = gate.clone();
        let repo_dir: PathBuf = item.mirror_dir(repos_path);
        set.spawn(async move {
            let _permit = match gate.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (item.name, Err(DroverError::from("concurrency gate closed")));
                }
            };
            match timeout(task_timeout, scan_repo(&repo_dir, limit)).await {
                Ok(result) => (item.name, result),
                Err(_) => (
                    item.name,
                    Err(DroverError::from(format!(
                        "scan timed out after {}s",
                        task_timeout.as_secs()
                    ))),
                ),
            }
        });
    }
    let mut report = ScanReport::default();
    while let Some(res) = set.join_next().await {
        match res {
            Ok((name, Ok(found))) => {
                if !found.is_empty() {
                    report.large.insert(name, found);
                }
            }
            Ok((name, Err(e))) => {
                log::error!("{name}: scan failed: {e}");
                report.failed.push(name);
            }
            Err(e) => log::error!("scan task failed: {e}"),
        }
    }
    report.failed.sort();
    Ok(report)
}

/// Print the report the way an operator wants to read it: repositories
/// sorted, one tab-separated line per oversized object.
pub fn print_report(report: &ScanReport) {
    if report.large.is_empty() {
        println!("No large objects found!");
        return;
    }
    for (name, objects) in &report.large {
        println!("{name}:");
        for obj in objects {
            println!("{}\t{}\t{}", obj.id, humanize_size(obj.size), obj.path);
        }
        println!();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_blob_lines() {
        let obj = parse_object_line("blob 8a9f0c 104857600 assets/video.mp4").expect("blob");
        assert_eq!(obj.id, "8a9f0c");
        assert_eq!(obj.size, 104857600);
        assert_eq!(obj.path, "assets/video.mp4");
    }

    #[test]
    fn skips_non_blobs_and_short_lines() {
        assert!(parse_object_line("commit 8a9f0c 250 ").is_none());
        assert!(parse_object_line("tree 8a9f0c 120 src").is_none());
        assert!(parse_object_line("8a9f0c").is_none());
    }

    #[test]
    fn blob_without_path_gets_empty_path() {
        let obj = parse_object_line("blob 8a9f0c 12").expect("blob");
        assert_eq!(obj.path, "");
    }

    #[test]
    fn humanizes_sizes() {
        assert_eq!(humanize_size(512), "512.0B");
        assert_eq!(humanize_size(2048), "2.0kB");
        assert_eq!(humanize_size(104857600), "100.0MB");
        assert_eq!(humanize_size(104962457), "100.1MB");
    }

    /// Bare repository fixture.
    fn init_bare(path: &std::path::Path) {
        let status = std::process::Command::new("git")
            .args(["init", "--bare", "--quiet"])
            .arg(path)
            .status()
            .expect("git init");
        assert!(status.success());
    }

    #[tokio::test]
    async fn scan_all_isolates_broken_repos() {
        let tmp = tempfile::tempdir().expect("tempdir");
        init_bare(&tmp.path().join("alpha.git"));
        // an empty directory is not a repository; its scan must fail
        // without affecting the sibling
        std::fs::create_dir(tmp.path().join("broken.git")).expect("mkdir");
        let report = scan_all(tmp.path(), 1, 2, Duration::from_secs(30))
            .await
            .expect("scan");
        assert!(report.large.is_empty());
        assert_eq!(report.failed, vec!["broken"]);
    }

    #[tokio::test]
    async fn scan_deadline_cancels_hung_pipelines() {
        let tmp = tempfile::tempdir().expect("tempdir");
        init_bare(&tmp.path().join("alpha.git"));
        let report = scan_all(tmp.path(), 1, 2, Duration::ZERO)
            .await
            .expect("scan");
        assert_eq!(report.failed, vec!["alpha"]);
        assert!(report.large.is_empty());
    }

    #[tokio::test]
    async fn scans_a_real_repository() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = tmp.path().join("widget.git");
        let status = std::process::Command::new("git")
            .args(["init", "--bare", "--quiet"])
            .arg(&repo)
            .status()
            .expect("git init");
        assert!(status.success());
        // an empty repository has no objects at all
        let found = scan_repo(&repo, 1).await.expect("scan");
        assert!(found.is_empty());
    }
}
