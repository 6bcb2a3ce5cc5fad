use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::Result;

/// `YYYY-MM-DD` optionally followed by `-<device prefix>`
static DATE_FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:-(.+))?$").unwrap());

/// One folder under the upload root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStats {
    /// Folder name as on disk
    pub date: String,
    pub file_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_prefix: Option<String>,
}

/// Split a date folder name into its date and device prefix.
/// Returns None for folders this tool did not create.
pub fn parse_folder_name(name: &str) -> Option<(NaiveDate, Option<String>)> {
    let caps = DATE_FOLDER_RE.captures(name)?;
    let date = NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d").ok()?;
    let prefix = caps.get(2).map(|m| m.as_str().to_string());
    Some((date, prefix))
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Count entries in every folder directly under the upload root, sorted by name.
/// Hidden entries (staging area, partial copies) are skipped.
pub fn collect_stats(upload_root: &Path) -> Result<Vec<FolderStats>> {
    let mut stats = Vec::new();

    for entry in fs::read_dir(upload_root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.file_type()?.is_dir() {
            continue;
        }

        let file_count = fs::read_dir(entry.path())?
            .flatten()
            .filter(|e| !is_hidden(&e.file_name().to_string_lossy()))
            .count();
        let (capture_date, device_prefix) = match parse_folder_name(&name) {
            Some((date, prefix)) => (Some(date), prefix),
            None => (None, None),
        };

        stats.push(FolderStats {
            date: name,
            file_count,
            capture_date,
            device_prefix,
        });
    }

    stats.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_folder_name() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_folder_name("2024-03-05"), Some((d, None)));
        assert_eq!(
            parse_folder_name("2024-03-05-PhoneA"),
            Some((d, Some("PhoneA".to_string())))
        );
        assert_eq!(
            parse_folder_name("2024-03-05-Ana's-iPad"),
            Some((d, Some("Ana's-iPad".to_string())))
        );
        assert_eq!(parse_folder_name("2024-13-05"), None);
        assert_eq!(parse_folder_name("Holiday"), None);
        assert_eq!(parse_folder_name("2024-03-05-"), None);
    }

    #[test]
    fn test_collect_stats() {
        let root = tempdir().unwrap();
        let a = root.path().join("2024-03-05-PhoneA");
        let b = root.path().join("2023-01-01");
        let other = root.path().join("misc");
        for dir in [&a, &b, &other] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(a.join("1-IMG_1.jpg"), b"x").unwrap();
        fs::write(a.join("1-IMG_1.mov"), b"x").unwrap();
        fs::write(a.join(".1-IMG_2.jpg.partial"), b"x").unwrap();
        fs::write(b.join("1-a.png"), b"x").unwrap();
        fs::create_dir_all(root.path().join(".staging")).unwrap();
        fs::write(root.path().join("loose.txt"), b"x").unwrap();

        let stats = collect_stats(root.path()).unwrap();
        let names: Vec<&str> = stats.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(names, ["2023-01-01", "2024-03-05-PhoneA", "misc"]);
        assert_eq!(stats[1].file_count, 2);
        assert_eq!(stats[1].device_prefix.as_deref(), Some("PhoneA"));
        assert_eq!(stats[0].file_count, 1);
        assert_eq!(stats[2].capture_date, None);

        let json = serde_json::to_value(&stats[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"date": "2023-01-01", "fileCount": 1, "captureDate": "2023-01-01"})
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let root = tempdir().unwrap();
        assert!(collect_stats(&root.path().join("nope")).is_err());
    }
}
