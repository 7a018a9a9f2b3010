// src/watch/classifier.rs

//! Include/exclude rules deciding which changed paths matter.

/// The six path-rule lists, resolved to absolute paths.
///
/// `exclude_exts` and `exclude_prefixes` are matched against the final path
/// segment only; every other list holds absolute paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchRuleSet {
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub exclude_exts: Vec<String>,
    pub exclude_prefixes: Vec<String>,
    pub include_dirs: Vec<String>,
    pub include_files: Vec<String>,
}

impl WatchRuleSet {
    /// Returns true if a change at `path` should be ignored.
    ///
    /// Rules in order of strength:
    /// 1. empty paths and editor backups (`~` suffix) are always ignored
    /// 2. exact `include_files` / `exclude_files` matches
    /// 3. directory scoping: the longest matching dir prefix wins, with an
    ///    exact directory match deciding immediately
    /// 4. filename prefix / extension heuristics
    pub fn is_excluded(&self, path: &str) -> bool {
        if path.is_empty() || path.ends_with('~') {
            return true;
        }

        if self.include_files.iter().any(|f| f == path) {
            return false;
        }
        if self.exclude_files.iter().any(|f| f == path) {
            return true;
        }

        match dir_verdict(&self.exclude_dirs, &self.include_dirs, path) {
            DirVerdict::Excluded => return true,
            DirVerdict::Included => return false,
            DirVerdict::Undecided => {}
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);
        if self
            .exclude_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
        {
            return true;
        }
        self.exclude_exts
            .iter()
            .any(|ext| file_name.ends_with(ext.as_str()))
    }
}

enum DirVerdict {
    Excluded,
    Included,
    Undecided,
}

fn dir_verdict(exclude_dirs: &[String], include_dirs: &[String], path: &str) -> DirVerdict {
    let mut exclude_len = 0;
    for dir in exclude_dirs {
        if dir == path {
            return DirVerdict::Excluded;
        }
        if path.starts_with(dir.as_str()) {
            exclude_len = exclude_len.max(dir.len());
        }
    }

    let mut include_len = 0;
    for dir in include_dirs {
        if dir == path {
            return DirVerdict::Included;
        }
        if path.starts_with(dir.as_str()) {
            include_len = include_len.max(dir.len());
        }
    }

    if exclude_len > include_len {
        DirVerdict::Excluded
    } else {
        DirVerdict::Undecided
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn vendor_rules() -> WatchRuleSet {
        WatchRuleSet {
            exclude_dirs: strings(&["/proj/vendor"]),
            include_dirs: strings(&["/proj/vendor/mymodule"]),
            ..WatchRuleSet::default()
        }
    }

    #[test]
    fn empty_and_backup_paths_are_excluded() {
        let rules = WatchRuleSet {
            include_files: strings(&["/proj/main.go~"]),
            ..WatchRuleSet::default()
        };
        assert!(rules.is_excluded(""));
        assert!(rules.is_excluded("/proj/main.go~"));
    }

    #[test]
    fn nested_include_dir_carves_out_of_exclude() {
        let rules = vendor_rules();
        assert!(!rules.is_excluded("/proj/vendor/mymodule/x"));
        assert!(rules.is_excluded("/proj/vendor/other/x"));
        assert!(!rules.is_excluded("/proj/main.go"));
    }

    #[test]
    fn exact_dir_match_decides_immediately() {
        let rules = vendor_rules();
        assert!(rules.is_excluded("/proj/vendor"));
        assert!(!rules.is_excluded("/proj/vendor/mymodule"));
    }

    #[test]
    fn exclude_nested_inside_include_wins_when_longer() {
        let rules = WatchRuleSet {
            include_dirs: strings(&["/proj/vendor/mymodule"]),
            exclude_dirs: strings(&["/proj/vendor", "/proj/vendor/mymodule/gen"]),
            ..WatchRuleSet::default()
        };
        assert!(rules.is_excluded("/proj/vendor/mymodule/gen/a.go"));
        assert!(!rules.is_excluded("/proj/vendor/mymodule/a.go"));
    }

    #[test]
    fn include_file_overrides_every_exclude_rule() {
        let rules = WatchRuleSet {
            exclude_dirs: strings(&["/proj/gen"]),
            exclude_files: strings(&["/proj/gen/keep_test.go"]),
            exclude_exts: strings(&["_test.go"]),
            exclude_prefixes: strings(&["keep"]),
            include_files: strings(&["/proj/gen/keep_test.go"]),
            ..WatchRuleSet::default()
        };
        assert!(!rules.is_excluded("/proj/gen/keep_test.go"));
        assert!(rules.is_excluded("/proj/gen/other.go"));
    }

    #[test]
    fn exclude_file_beats_include_dir() {
        let rules = WatchRuleSet {
            include_dirs: strings(&["/proj"]),
            exclude_files: strings(&["/proj/app"]),
            ..WatchRuleSet::default()
        };
        assert!(rules.is_excluded("/proj/app"));
        assert!(!rules.is_excluded("/proj/app.go"));
    }

    #[test]
    fn filename_heuristics_apply_to_last_segment_only() {
        let rules = WatchRuleSet {
            exclude_exts: strings(&[".txt"]),
            exclude_prefixes: strings(&["prefixed"]),
            ..WatchRuleSet::default()
        };
        assert!(rules.is_excluded("/proj/notes.txt"));
        assert!(rules.is_excluded("/proj/prefixed_main.go"));
        assert!(!rules.is_excluded("/proj/prefixed/main.go"));
        assert!(!rules.is_excluded("/proj/main.go"));
    }

    #[test]
    fn include_dir_scope_does_not_rescue_extension_rule() {
        let rules = WatchRuleSet {
            include_dirs: strings(&["/proj/src"]),
            exclude_exts: strings(&[".tmp"]),
            ..WatchRuleSet::default()
        };
        assert!(rules.is_excluded("/proj/src/a.tmp"));
    }
}
