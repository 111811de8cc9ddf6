// ─── Version Constraints ───
// Minecraft and loader versions are not strict semver ("1.17", "0.11.6"),
// and manifests write ranges the npm way (">= 1.16 < 1.18", "^1 || ^2").
// These helpers bridge both onto the `semver` crate.

use semver::{Version, VersionReq};

/// Parse a version, padding missing minor/patch parts (`1.17` → `1.17.0`).
pub fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }

    let (core, suffix) = match raw.find(['-', '+']) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{}", parts.join("."), suffix)).ok()
}

/// A set of alternative requirements; matches if any alternative does.
#[derive(Debug, Clone)]
pub struct Constraint {
    alternatives: Vec<VersionReq>,
}

impl Constraint {
    /// `*`, `latest` and the empty string match everything. A plain version
    /// means exactly that version, or that line when parts are omitted.
    pub fn parse(raw: &str) -> Option<Self> {
        let alternatives = raw
            .split("||")
            .map(parse_single)
            .collect::<Option<Vec<_>>>()?;

        Some(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Lenient string variant; unparseable versions never match.
    pub fn matches_str(&self, raw: &str) -> bool {
        parse_version(raw).is_some_and(|v| self.matches(&v))
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.iter().any(|req| *req == VersionReq::STAR)
    }
}

fn parse_single(raw: &str) -> Option<VersionReq> {
    let raw = raw.trim();
    if matches!(raw, "" | "*" | "latest" | "x" | "X") {
        return Some(VersionReq::STAR);
    }

    // `1.17` covers the whole 1.17.x line, `1.17.1` only itself.
    if let Some(exact) = parse_version(raw) {
        return VersionReq::parse(&format!("={}", raw.trim_start_matches('v')))
            .or_else(|_| VersionReq::parse(&format!("={exact}")))
            .ok();
    }

    let normalized = normalize_comparators(raw)?;
    VersionReq::parse(&normalized).ok()
}

/// Glue dangling operators to their version and join comparators with
/// commas.
fn normalize_comparators(raw: &str) -> Option<String> {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();

    for token in raw.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
            continue;
        }

        let op_len = token
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(op_len);
        let op = format!("{pending_op}{op}");
        pending_op.clear();

        comparators.push(format!("{op}{version}"));
    }

    if !pending_op.is_empty() || comparators.is_empty() {
        return None;
    }
    Some(comparators.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_versions() {
        assert_eq!(parse_version("1.17"), Some(Version::new(1, 17, 0)));
        assert_eq!(parse_version("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert!(parse_version("21w03a").is_none());
        assert!(parse_version("").is_none());
    }

    #[test]
    fn caret_range() {
        let c = Constraint::parse("^1.3.0").unwrap();
        assert!(!c.matches_str("1.2.0"));
        assert!(c.matches_str("1.3.4"));
        assert!(!c.matches_str("2.0.0"));
    }

    #[test]
    fn plain_version_is_exact() {
        let c = Constraint::parse("1.16.5").unwrap();
        assert!(c.matches_str("1.16.5"));
        assert!(!c.matches_str("1.16.6"));

        let c = Constraint::parse("1.17").unwrap();
        assert!(c.matches_str("1.17"));
        assert!(c.matches_str("1.17.1"));
        assert!(!c.matches_str("1.18.0"));
    }

    #[test]
    fn wildcards_and_latest() {
        assert!(Constraint::parse("*").unwrap().matches_str("1.20.4"));
        assert!(Constraint::parse("latest").unwrap().is_any());
        let c = Constraint::parse("1.16.x").unwrap();
        assert!(c.matches_str("1.16.5"));
        assert!(!c.matches_str("1.17.1"));
    }

    #[test]
    fn space_separated_and_alternatives() {
        let c = Constraint::parse(">= 1.16 < 1.18").unwrap();
        assert!(c.matches_str("1.17.1"));
        assert!(!c.matches_str("1.18"));

        let c = Constraint::parse("~1.16.0 || ^1.18").unwrap();
        assert!(c.matches_str("1.16.3"));
        assert!(c.matches_str("1.19.2"));
        assert!(!c.matches_str("1.17.1"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Constraint::parse("not a range").is_none());
        assert!(Constraint::parse(">=").is_none());
    }
}
