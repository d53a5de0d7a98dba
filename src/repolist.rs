//! Work-item enumeration: list files and local mirror directories.
use std::fs::read_to_string;
use std::path::Path;

use url::Url;

use crate::errors::{DroverError, DroverErrorKind};

/// One repository to migrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Repository name, without any `.git` suffix.
    pub name: String,

    /// Clone URL, when the item came from a list file.
    pub clone_url: Option<String>,
}

impl WorkItem {
    /// Directory of this repository's local mirror under `dest`.
    pub fn mirror_dir(&self, dest: &Path) -> std::path::PathBuf {
        dest.join(format!("{}.git", self.name))
    }
}

/// Derive a repository name from a clone URL.
///
/// Handles regular URLs (`ssh://git@host:7999/proj/repo.git`,
/// `https://host/scm/proj/repo.git`) and scp-like ones
/// (`git@host:proj/repo.git`): the last path segment, `.git` stripped.
pub fn name_from_url(raw: &str) -> Result<String, DroverError> {
    let path = match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        // scp-like syntax is not a URL; everything after the colon is the path
        Err(_) => raw.rsplit(':').next().unwrap_or(raw).to_string(),
    };
    let last = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        return Err(DroverError::new(DroverErrorKind::RepoList)
            .with_text(&format!("cannot derive a repository name from '{raw}'")));
    }
    Ok(name.to_string())
}

/// Read work items from a list file, one per line.
///
/// A line is either a full clone URL, or a bare repository name joined to
/// `clone_prefix`. Blank lines and `#` comments are skipped.
pub fn read_list(path: &Path, clone_prefix: Option<&str>) -> Result<Vec<WorkItem>, DroverError> {
    let contents = read_to_string(path)
        .map_err(|e| {
            DroverError::new_with_source(
                DroverErrorKind::RepoList,
                "unable to read the repository list",
                e,
            )
        })?;
    let mut items = vec![];
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let clone_url = if line.contains("://") || line.contains('@') {
            line.to_string()
        } else {
            match clone_prefix {
                Some(prefix) => format!("{}/{line}.git", prefix.trim_end_matches('/')),
                None => {
                    return Err(DroverError::new(DroverErrorKind::RepoList).with_text(&format!(
                        "'{line}' is not a clone URL and no --clone-prefix was given"
                    )));
                }
            }
        };
        items.push(WorkItem {
            name: name_from_url(&clone_url)?,
            clone_url: Some(clone_url),
        });
    }
    Ok(items)
}

/// Enumerate the `<name>.git` mirror directories under `path`.
///
/// Dot-directories (including the run's own log directory) are skipped.
pub fn mirrors_in(path: &Path) -> Result<Vec<WorkItem>, DroverError> {
    let mut items = vec![];
    for entry in path
        .read_dir()
        .map_err(|e| {
            DroverError::new_with_source(
                DroverErrorKind::Io,
                "unable to read the mirror directory",
                e,
            )
        })?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let dir_name = file_name.to_string_lossy();
        if dir_name.starts_with('.') {
            continue;
        }
        if let Some(name) = dir_name.strip_suffix(".git") {
            items.push(WorkItem {
                name: name.to_string(),
                clone_url: None,
            });
        }
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::{create_dir, write, File};

    #[test]
    fn name_from_ssh_url() {
        assert_eq!(
            name_from_url("ssh://git@bitbucket.example.com:7999/proj/widget.git").unwrap(),
            "widget"
        );
    }

    #[test]
    fn name_from_scp_like_url() {
        assert_eq!(
            name_from_url("git@github.com:acme/widget.git").unwrap(),
            "widget"
        );
    }

    #[test]
    fn name_from_https_url_without_suffix() {
        assert_eq!(
            name_from_url("https://github.com/acme/widget").unwrap(),
            "widget"
        );
    }

    #[test]
    fn name_from_garbage_fails() {
        assert!(name_from_url("ssh://host/").is_err());
    }

    #[test]
    fn list_file_with_urls_and_names() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let list = tmp.path().join("repos.txt");
        write(
            &list,
            "# migrated repos\n\
             ssh://git@bb.example.com:7999/proj/alpha.git\n\
             \n\
             beta\n",
        )
        .expect("write list");
        let items = read_list(&list, Some("ssh://git@bb.example.com:7999/proj")).expect("parse");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "alpha");
        assert_eq!(items[1].name, "beta");
        assert_eq!(
            items[1].clone_url.as_deref(),
            Some("ssh://git@bb.example.com:7999/proj/beta.git")
        );
    }

    #[test]
    fn bare_name_without_prefix_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let list = tmp.path().join("repos.txt");
        write(&list, "gamma\n").expect("write list");
        assert!(read_list(&list, None).is_err());
    }

    #[test]
    fn mirror_enumeration_skips_dotdirs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        create_dir(tmp.path().join("alpha.git")).expect("mkdir");
        create_dir(tmp.path().join("beta.git")).expect("mkdir");
        create_dir(tmp.path().join(".drover-push")).expect("mkdir");
        create_dir(tmp.path().join("not-a-mirror")).expect("mkdir");
        File::create(tmp.path().join("stray.git")).expect("file, not dir");
        let items = mirrors_in(tmp.path()).expect("enumerate");
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn mirror_dir_layout() {
        let item = WorkItem {
            name: "widget".into(),
            clone_url: None,
        };
        assert_eq!(
            item.mirror_dir(Path::new("/srv/mirrors")),
            Path::new("/srv/mirrors/widget.git")
        );
    }
}
