// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Requirement strings and the package environment they are checked against.
//!
//! Requirements use the familiar `name[extras] specifiers ; markers` form,
//! e.g. `spacy-transformers>=1.0.3,<1.1.0`. Markers are accepted but not
//! evaluated.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{StoreError, UnmetReason, UnmetRequirement};

/// Normalize a package name: lowercase, runs of `-`, `_`, `.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_sep {
                out.push('-');
            }
            in_sep = true;
        } else {
            out.extend(c.to_lowercase());
            in_sep = false;
        }
    }
    out
}

/// Pre-release phase, in PEP 440 order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Alpha,
    Beta,
    Rc,
}

const PRE_LABELS: &[(&str, Phase)] = &[
    ("alpha", Phase::Alpha),
    ("a", Phase::Alpha),
    ("beta", Phase::Beta),
    ("b", Phase::Beta),
    ("preview", Phase::Rc),
    ("pre", Phase::Rc),
    ("rc", Phase::Rc),
    ("c", Phase::Rc),
];
const POST_LABELS: &[(&str, ())] = &[("post", ()), ("rev", ()), ("r", ())];
const DEV_LABELS: &[(&str, ())] = &[("dev", ())];
const SEPARATORS: &[char] = &['.', '-', '_'];

/// Where a version sits relative to its release, before post/dev are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    /// `1.0.dev0`: sorts before every pre-release of `1.0`.
    DevOnly,
    Pre(Phase, u64),
    Final,
}

/// Pre, post and dev segments following the release number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Suffix {
    pre: Option<(Phase, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
}

impl Suffix {
    /// Parse `[pre][post][dev]` from a lowercased suffix.
    fn parse(input: &str) -> Result<Self, String> {
        let mut suffix = Self::default();
        let mut rest = input;

        if let Some((phase, after)) = strip_label(rest, PRE_LABELS) {
            let (n, after) = take_number(after)?;
            suffix.pre = Some((phase, n));
            rest = after;
        }

        let implicit_post = rest
            .strip_prefix('-')
            .filter(|r| r.starts_with(|c: char| c.is_ascii_digit()));
        if let Some(after) = implicit_post {
            let (n, after) = take_number(after)?;
            suffix.post = Some(n);
            rest = after;
        } else if let Some(((), after)) = strip_label(rest, POST_LABELS) {
            let (n, after) = take_number(after)?;
            suffix.post = Some(n);
            rest = after;
        }

        if let Some(((), after)) = strip_label(rest, DEV_LABELS) {
            let (n, after) = take_number(after)?;
            suffix.dev = Some(n);
            rest = after;
        }

        if !rest.is_empty() {
            return Err(format!("unrecognized version suffix {:?}", input));
        }
        Ok(suffix)
    }

    fn key(&self) -> (PreKey, Option<u64>, (u8, u64)) {
        let pre = match (self.pre, self.post, self.dev) {
            (Some((phase, n)), _, _) => PreKey::Pre(phase, n),
            (None, None, Some(_)) => PreKey::DevOnly,
            _ => PreKey::Final,
        };
        // A dev release sorts before the same version without one.
        let dev = self.dev.map_or((1, 0), |n| (0, n));
        (pre, self.post, dev)
    }
}

/// Strip an optional separator and the first matching label, plus an
/// optional separator after it.
fn strip_label<'a, T: Copy>(s: &'a str, labels: &[(&str, T)]) -> Option<(T, &'a str)> {
    let body = s.strip_prefix(SEPARATORS).unwrap_or(s);
    labels.iter().find_map(|&(label, value)| {
        body.strip_prefix(label)
            .map(|rest| (value, rest.strip_prefix(SEPARATORS).unwrap_or(rest)))
    })
}

/// Leading decimal number of `s`; a missing number counts as 0.
fn take_number(s: &str) -> Result<(u64, &str), String> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return Ok((0, s));
    }
    let n = s[..end].parse::<u64>().map_err(|_| format!("number {:?} is too large", &s[..end]))?;
    Ok((n, &s[end..]))
}

/// A package version: numeric release segments plus optional pre, post and
/// dev segments and a `+local` label.
///
/// The local label is ignored when ordering, so `2.0.1+cu118` satisfies
/// `>=2.0` and `==2.0.1`.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    release: Vec<u64>,
    suffix: Suffix,
    local: Option<String>,
}

impl PackageVersion {
    pub fn parse(input: &str) -> Result<Self, String> {
        let raw = input.trim();
        let unprefixed = raw.strip_prefix(&['v', 'V'][..]).unwrap_or(raw);
        if unprefixed.is_empty() {
            return Err("empty version".into());
        }

        let (body, local) = match unprefixed.split_once('+') {
            Some((body, local)) => {
                let valid = !local.is_empty()
                    && local.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
                if !valid {
                    return Err(format!("bad local version label in {:?}", raw));
                }
                (body, Some(local.to_ascii_lowercase()))
            }
            None => (unprefixed, None),
        };

        let digits_end = body
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map_or(body.len(), |(i, _)| i);
        let (release_part, rest) = body.split_at(digits_end);
        let release_part = release_part.trim_end_matches('.');

        if release_part.is_empty() {
            return Err(format!("version {:?} has no release number", raw));
        }
        let release = release_part
            .split('.')
            .map(|seg| seg.parse::<u64>().map_err(|_| format!("bad segment {:?} in {:?}", seg, raw)))
            .collect::<Result<Vec<_>, _>>()?;

        // A trailing '.' of the release belongs to the suffix separator.
        let rest = if release_part.len() < digits_end { &body[release_part.len()..] } else { rest };
        let suffix = Suffix::parse(&rest.to_ascii_lowercase())
            .map_err(|e| format!("{} in {:?}", e, raw))?;

        Ok(Self { raw: raw.to_string(), release, suffix, local })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn release_cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    /// `==` semantics: a target without a local label matches any local
    /// build of the same version.
    fn matches_exact(&self, target: &Self) -> bool {
        self == target && (target.local.is_none() || target.local == self.local)
    }

    /// True if this version's release starts with `prefix` (for `==X.Y.*`).
    fn has_release_prefix(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, p)| self.release.get(i).copied().unwrap_or(0) == *p)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release_cmp(other).then_with(|| self.suffix.key().cmp(&other.suffix.key()))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    NotEq,
    Ge,
    Le,
    Gt,
    Lt,
    Compatible,
    Arbitrary,
}

#[derive(Debug, Clone)]
enum Target {
    Version(PackageVersion),
    /// `X.Y.*`
    Prefix(Vec<u64>),
    /// `=== anything`
    Literal(String),
}

#[derive(Debug, Clone)]
struct Specifier {
    op: Operator,
    target: Target,
}

impl Specifier {
    fn parse(input: &str) -> Result<Self, String> {
        let s = input.trim();
        const OPS: &[(&str, Operator)] = &[
            ("===", Operator::Arbitrary),
            ("==", Operator::Eq),
            ("!=", Operator::NotEq),
            (">=", Operator::Ge),
            ("<=", Operator::Le),
            ("~=", Operator::Compatible),
            (">", Operator::Gt),
            ("<", Operator::Lt),
        ];
        let (op, rest) = OPS
            .iter()
            .find_map(|(token, op)| s.strip_prefix(token).map(|rest| (*op, rest.trim())))
            .ok_or_else(|| format!("specifier {:?} has no comparison operator", s))?;

        if rest.is_empty() {
            return Err(format!("specifier {:?} has no version", s));
        }

        let target = match op {
            Operator::Arbitrary => Target::Literal(rest.to_string()),
            Operator::Eq | Operator::NotEq if rest.ends_with(".*") => {
                let prefix = rest
                    .trim_end_matches(".*")
                    .split('.')
                    .map(|seg| seg.parse::<u64>().map_err(|_| format!("bad wildcard {:?}", rest)))
                    .collect::<Result<Vec<_>, _>>()?;
                Target::Prefix(prefix)
            }
            Operator::Compatible => {
                let v = PackageVersion::parse(rest)?;
                if v.release.len() < 2 {
                    return Err(format!("~= requires at least two release segments: {:?}", s));
                }
                Target::Version(v)
            }
            _ => Target::Version(PackageVersion::parse(rest)?),
        };
        Ok(Self { op, target })
    }

    fn matches(&self, installed: &PackageVersion) -> bool {
        match (&self.target, self.op) {
            (Target::Literal(lit), _) => installed.as_str() == lit,
            (Target::Prefix(prefix), Operator::Eq) => installed.has_release_prefix(prefix),
            (Target::Prefix(prefix), _) => !installed.has_release_prefix(prefix),
            (Target::Version(v), Operator::Eq) => installed.matches_exact(v),
            (Target::Version(v), Operator::NotEq) => !installed.matches_exact(v),
            (Target::Version(v), Operator::Ge) => installed >= v,
            (Target::Version(v), Operator::Le) => installed <= v,
            (Target::Version(v), Operator::Gt) => installed > v,
            (Target::Version(v), Operator::Lt) => installed < v,
            (Target::Version(v), Operator::Compatible) => {
                let prefix = &v.release[..v.release.len() - 1];
                installed >= v && installed.has_release_prefix(prefix)
            }
            (Target::Version(_), Operator::Arbitrary) => false,
        }
    }
}

/// A parsed requirement string.
#[derive(Debug, Clone)]
pub struct Requirement {
    raw: String,
    name: String,
    specifiers: Vec<Specifier>,
}

impl Requirement {
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let invalid = |reason: String| StoreError::InvalidRequirement {
            input: input.to_string(),
            reason,
        };

        let without_markers = input.split(';').next().unwrap_or("").trim();
        let name_end = without_markers
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .map_or(without_markers.len(), |(i, _)| i);
        let (name, mut rest) = without_markers.split_at(name_end);

        if name.is_empty() {
            return Err(invalid("missing package name".into()));
        }

        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| invalid("unterminated extras".into()))?;
            rest = after[close + 1..].trim_start();
        }
        let rest = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(rest)
            .trim();

        let specifiers = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(Specifier::parse).collect::<Result<Vec<_>, _>>().map_err(invalid)?
        };

        Ok(Self {
            raw: input.trim().to_string(),
            name: normalize_name(name),
            specifiers,
        })
    }

    /// Normalized package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unversioned(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// True if `installed` satisfies every specifier.
    pub fn matches(&self, installed: &PackageVersion) -> bool {
        self.specifiers.iter().all(|s| s.matches(installed))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Packages available to the running process.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    packages: BTreeMap<String, PackageVersion>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a package as available. Re-declaring replaces the version.
    pub fn insert(&mut self, name: &str, version: &str) -> Result<(), StoreError> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(StoreError::InvalidRequirement {
                input: name.to_string(),
                reason: "empty package name".into(),
            });
        }
        let parsed = PackageVersion::parse(version).map_err(|reason| {
            StoreError::InvalidRequirement { input: format!("{}=={}", name, version), reason }
        })?;
        self.packages.insert(normalized, parsed);
        Ok(())
    }

    pub fn with_package(mut self, name: &str, version: &str) -> Result<Self, StoreError> {
        self.insert(name, version)?;
        Ok(self)
    }

    pub fn version_of(&self, name: &str) -> Option<&PackageVersion> {
        self.packages.get(&normalize_name(name))
    }

    /// (name, version) pairs in name order.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check one requirement string.
    pub fn check_one(&self, requirement: &str) -> Result<(), UnmetRequirement> {
        let unmet = |reason| UnmetRequirement { requirement: requirement.to_string(), reason };
        let req = Requirement::parse(requirement).map_err(|e| match e {
            StoreError::InvalidRequirement { reason, .. } => unmet(UnmetReason::Invalid(reason)),
            other => unmet(UnmetReason::Invalid(other.to_string())),
        })?;
        match self.packages.get(req.name()) {
            None => Err(unmet(UnmetReason::Missing)),
            Some(installed) if req.matches(installed) => Ok(()),
            Some(installed) => Err(unmet(UnmetReason::VersionMismatch {
                installed: installed.to_string(),
            })),
        }
    }

    /// Check every requirement and return all failures, in input order.
    pub fn unmet<'a, I>(&self, requirements: I) -> Vec<UnmetRequirement>
    where
        I: IntoIterator<Item = &'a String>,
    {
        requirements
            .into_iter()
            .filter_map(|r| self.check_one(r).err())
            .collect()
    }
}

/// Parse a `name==version,name==version` package list.
pub fn parse_package_list(input: &str) -> Result<Vec<(String, String)>, StoreError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            entry
                .split_once("==")
                .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
                .filter(|(n, v)| !n.is_empty() && !v.is_empty())
                .ok_or_else(|| StoreError::InvalidRequirement {
                    input: entry.to_string(),
                    reason: "expected name==version".into(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    fn env() -> Environment {
        Environment::new()
            .with_package("spacy", "3.2.1")
            .unwrap()
            .with_package("Entity_Ruler", "1.0.0")
            .unwrap()
            .with_package("numpy", "1.21.0rc1")
            .unwrap()
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Spacy_Transformers"), "spacy-transformers");
        assert_eq!(normalize_name("a._-b"), "a-b");
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.0") == v("1.0.0"));
        assert!(v("1.0.3") < v("1.1.0"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.0.0rc1") < v("1.0.0"));
        assert!(v("1.0.0.dev0") < v("1.0.0"));
        assert!(v("1.0.0.post1") > v("1.0.0"));
        assert!(PackageVersion::parse("abc").is_err());
        assert!(PackageVersion::parse("").is_err());
    }

    #[test]
    fn test_suffix_numbers_compare_numerically() {
        assert!(v("1.0.0rc10") > v("1.0.0rc2"));
        assert!(v("1.0.post10") > v("1.0.post2"));
        assert!(v("1.0a10") > v("1.0a9"));
        assert!(v("1.0.dev10") > v("1.0.dev9"));
        assert!(v("1.0-rc.1") == v("1.0rc1"));
        assert!(v("1.0-3") == v("1.0.post3"));
    }

    #[test]
    fn test_phase_ordering() {
        let ordered = [
            "1.0.dev0",
            "1.0a1.dev1",
            "1.0a1",
            "1.0alpha2",
            "1.0b1",
            "1.0beta2",
            "1.0rc1",
            "1.0c2",
            "1.0",
            "1.0.post1.dev0",
            "1.0.post1",
            "1.1.dev0",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_unknown_suffix_rejected() {
        assert!(PackageVersion::parse("1.0custom").is_err());
        assert!(PackageVersion::parse("1.0.0-foo").is_err());
        assert!(PackageVersion::parse("1.0rc1x").is_err());
        assert!(PackageVersion::parse("1.0+").is_err());
        assert!(PackageVersion::parse("1.0+cu 118").is_err());
    }

    #[test]
    fn test_local_version_label() {
        let torch = v("2.0.1+cu118");
        assert!(torch == v("2.0.1"));
        assert_eq!(torch.to_string(), "2.0.1+cu118");

        let env = Environment::new().with_package("torch", "2.0.1+cu118").unwrap();
        assert!(env.check_one("torch>=2.0").is_ok());
        assert!(env.check_one("torch==2.0.1").is_ok());
        assert!(env.check_one("torch==2.0.1+cu118").is_ok());
        assert!(env.check_one("torch==2.0.1+cpu").is_err());
        assert!(env.check_one("torch!=2.0.1+cpu").is_ok());
    }

    #[test]
    fn test_environment_compares_rc_numbers() {
        let env = Environment::new().with_package("numpy", "1.0.0rc10").unwrap();
        assert!(env.check_one("numpy>=1.0.0rc2").is_ok());
        assert!(env.check_one("numpy<1.0.0").is_ok());
    }

    #[test]
    fn test_parse_range_requirement() {
        let req = Requirement::parse("spacy-transformers>=1.0.3,<1.1.0").unwrap();
        assert_eq!(req.name(), "spacy-transformers");
        assert!(req.matches(&v("1.0.3")));
        assert!(req.matches(&v("1.0.9")));
        assert!(!req.matches(&v("1.1.0")));
        assert!(!req.matches(&v("1.0.2")));
    }

    #[test]
    fn test_parse_extras_markers_and_parens() {
        let req = Requirement::parse("torch[cuda] (>=1.9) ; python_version >= '3.8'").unwrap();
        assert_eq!(req.name(), "torch");
        assert!(req.matches(&v("1.13.1")));
        assert!(!req.matches(&v("1.8")));
    }

    #[test]
    fn test_wildcard_and_compatible() {
        let eq = Requirement::parse("spacy==3.2.*").unwrap();
        assert!(eq.matches(&v("3.2.4")));
        assert!(!eq.matches(&v("3.3.0")));

        let ne = Requirement::parse("spacy!=3.2.*").unwrap();
        assert!(ne.matches(&v("3.3.0")));

        let compat = Requirement::parse("spacy~=3.2.1").unwrap();
        assert!(compat.matches(&v("3.2.5")));
        assert!(!compat.matches(&v("3.3.0")));
        assert!(!compat.matches(&v("3.2.0")));

        assert!(Requirement::parse("spacy~=3").is_err());
    }

    #[test]
    fn test_invalid_requirements() {
        assert!(Requirement::parse("").is_err());
        assert!(Requirement::parse(">=1.0").is_err());
        assert!(Requirement::parse("spacy>=").is_err());
        assert!(Requirement::parse("spacy 1.0").is_err());
        assert!(Requirement::parse("spacy[extra").is_err());
    }

    #[test]
    fn test_unversioned_requirement() {
        let req = Requirement::parse("spacy").unwrap();
        assert!(req.is_unversioned());
        assert!(env().check_one("spacy").is_ok());
    }

    #[test]
    fn test_environment_check_aggregates_all_failures() {
        let reqs: Vec<String> = vec![
            "spacy>=3.0".into(),
            "spacy-transformers>=1.0.3,<1.1.0".into(),
            "entity-ruler==2.0".into(),
            "numpy>=1.21".into(),
            "bad req".into(),
        ];
        let unmet = env().unmet(&reqs);
        assert_eq!(unmet.len(), 4);
        assert_eq!(unmet[0].requirement, "spacy-transformers>=1.0.3,<1.1.0");
        assert_eq!(unmet[0].reason, UnmetReason::Missing);
        assert_eq!(
            unmet[1].reason,
            UnmetReason::VersionMismatch { installed: "1.0.0".into() }
        );
        // rc sorts before the final release
        assert_eq!(unmet[2].requirement, "numpy>=1.21");
        assert!(matches!(unmet[3].reason, UnmetReason::Invalid(_)));
    }

    #[test]
    fn test_environment_name_normalization() {
        assert!(env().check_one("entity_ruler==1.0.0").is_ok());
        assert!(env().version_of("ENTITY.RULER").is_some());
    }

    #[test]
    fn test_parse_package_list() {
        let list = parse_package_list("spacy==3.2.1, numpy==1.21.0,").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], ("numpy".to_string(), "1.21.0".to_string()));
        assert!(parse_package_list("spacy").is_err());
        assert!(parse_package_list("").unwrap().is_empty());
    }
}
