//! Text heuristics over the diff tool's output
//!
//! Both filters work on the tool's plain-text grammar:
//!
//! ```text
//! <<< /nix/store/...-nixos-system-web-25.05.20250101.abc1234
//! >>> /nix/store/...-nixos-system-web-25.05.20250102.def5678
//!
//! CHANGED
//! [U.] nixos-system-web  25.05.20250101.abc1234 -> 25.05.20250102.def5678
//! ```

/// Section whose entries the minor-update filter looks at
pub const CHANGED_HEADER: &str = "CHANGED";

/// Status code of a plain version update
const UPDATE_STATUS: &str = "[U.]";

/// Package names whose version only tracks the system image
const MINOR_UPDATE_PREFIXES: &[&str] = &["nixos-system-", "nixos-version"];

const DRV_SUFFIX: &str = ".drv";

/// Whether the diff describes a real change
///
/// Reads the leading `<<<` and `>>>` path lines. Store paths are content
/// addressed, so equal paths mean equal content. Anything that does not
/// parse counts as changed.
pub fn change_detected(diff: &str) -> bool {
    let mut lines = diff.lines().map(str::trim).filter(|l| !l.is_empty());
    let before = lines.next().and_then(|l| marker_path(l, "<<<"));
    let after = lines.next().and_then(|l| marker_path(l, ">>>"));
    match (before, after) {
        (Some(before), Some(after)) => before != after,
        _ => true,
    }
}

fn marker_path<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let path = line.strip_prefix(marker)?.trim();
    (!path.is_empty()).then_some(path)
}

/// Drop `CHANGED` entries that only bump the system image date/revision
///
/// An entry is dropped when it has exactly the shape
/// `[U.] <name> <old> -> <new>`, `<name>` starts with a system-image
/// prefix, neither version contains a comma, and both versions share the
/// same major.minor. A trailing `.drv` is ignored on names and versions.
/// If the section is left without entries its header goes too. Input with
/// nothing to drop is returned byte for byte.
pub fn suppress_minor_updates(diff: &str) -> String {
    let lines: Vec<&str> = diff.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut total_removed = 0usize;

    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim() != CHANGED_HEADER {
            kept.push(lines[i]);
            i += 1;
            continue;
        }

        let header = lines[i];
        let mut section: Vec<&str> = Vec::new();
        let mut removed = 0usize;
        i += 1;
        while i < lines.len() && !lines[i].trim().is_empty() {
            if is_minor_update(lines[i]) {
                removed += 1;
            } else {
                section.push(lines[i]);
            }
            i += 1;
        }

        if !(removed > 0 && section.is_empty()) {
            kept.push(header);
        }
        kept.extend(section);
        total_removed += removed;
    }

    if total_removed == 0 {
        return diff.to_string();
    }

    let mut out = kept.join("\n");
    if diff.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

fn is_minor_update(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let &[status, name, from, arrow, to] = tokens.as_slice() else {
        return false;
    };
    if status != UPDATE_STATUS || arrow != "->" {
        return false;
    }

    let name = name.strip_suffix(DRV_SUFFIX).unwrap_or(name);
    if !MINOR_UPDATE_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    if from.contains(',') || to.contains(',') {
        return false;
    }

    let from = from.strip_suffix(DRV_SUFFIX).unwrap_or(from);
    let to = to.strip_suffix(DRV_SUFFIX).unwrap_or(to);
    match (major_minor(from), major_minor(to)) {
        (Some(a), Some(b)) => a == b && from != to,
        _ => false,
    }
}

/// `(major, minor)` of a `major.minor.rest` version
fn major_minor(version: &str) -> Option<(&str, &str)> {
    let mut parts = version.splitn(3, '.');
    let major = parts.next()?;
    let minor = parts.next()?;
    let rest = parts.next()?;
    if rest.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) || major.is_empty() {
        return None;
    }
    Some((major, minor))
}

/// Diff text as it should be reported
///
/// Unchanged paths report nothing; otherwise minor system-image updates are
/// dropped when `suppress_minor` is set.
pub fn reportable_diff(diff: &str, suppress_minor: bool) -> String {
    if !change_detected(diff) {
        return String::new();
    }
    if suppress_minor {
        suppress_minor_updates(diff)
    } else {
        diff.to_string()
    }
}
