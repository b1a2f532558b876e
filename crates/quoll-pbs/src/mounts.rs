//! Storage mount matching for qsub `-l storage` flags.

use camino::Utf8Path;
use std::collections::BTreeSet;

/// Mount points every job may draw storage from.
pub const DEFAULT_MOUNTS: [&str; 2] = ["/scratch", "/g/data"];

/// Storage token for a mount/project pair: the mount stripped of leading
/// and trailing separators, joined to the project code (`/g/data` + `ab12`
/// -> `g/data/ab12`).
pub fn storage_token(mount: &str, project: &str) -> String {
    format!("{}/{}", mount.trim_matches('/'), project)
}

/// Match paths against known mount points.
///
/// The project code is the first path component after the mount; each path
/// contributes at most one token (first matching mount wins). Paths on no
/// known mount, or sitting directly at a mount root, contribute nothing.
pub fn find_mounts(paths: &[&Utf8Path], mounts: &BTreeSet<String>) -> BTreeSet<String> {
    let mut storages = BTreeSet::new();

    for path in paths {
        for mount in mounts {
            if let Ok(rest) = path.strip_prefix(mount) {
                if let Some(code) = rest.components().next() {
                    storages.insert(storage_token(mount, code.as_str()));
                }
                break;
            }
        }
    }

    storages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounts(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_storage_token_strips_separators() {
        assert_eq!(storage_token("/scratch", "ab12"), "scratch/ab12");
        assert_eq!(storage_token("/g/data", "xy99"), "g/data/xy99");
    }

    #[test]
    fn test_find_mounts_scratch() {
        let found = find_mounts(&[Utf8Path::new("/scratch/ab12/file")], &mounts(&["/scratch"]));
        assert_eq!(found, mounts(&["scratch/ab12"]));
    }

    #[test]
    fn test_find_mounts_multi_component_mount() {
        let found = find_mounts(
            &[Utf8Path::new("/g/data/xy99/output/run.log")],
            &mounts(&["/g/data", "/scratch"]),
        );
        assert_eq!(found, mounts(&["g/data/xy99"]));
    }

    #[test]
    fn test_find_mounts_unmatched_path() {
        let found = find_mounts(&[Utf8Path::new("/home/alice/run.sh")], &mounts(&["/scratch"]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_mounts_mount_root_yields_nothing() {
        let found = find_mounts(&[Utf8Path::new("/scratch")], &mounts(&["/scratch"]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_mounts_dedups_across_paths() {
        let found = find_mounts(
            &[
                Utf8Path::new("/scratch/ab12/bin/tool"),
                Utf8Path::new("/scratch/ab12/work/run.sh"),
            ],
            &mounts(&["/scratch"]),
        );
        assert_eq!(found, mounts(&["scratch/ab12"]));
    }
}
