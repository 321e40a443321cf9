//! # Plugin Versions and Version Ranges
//!
//! Plugin versions are plain [`semver::Version`] values. Ranges follow the
//! npm dialect rather than Cargo's: a bare version is an exact match,
//! comparators are separated by whitespace, alternatives by `||`, and
//! hyphen ranges (`1.2.3 - 2.0`), `~`, `^` and `x`/`*` wildcards are
//! desugared into plain comparator sets.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use thiserror::Error;

/// Error type for version and range parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("Invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },
}

impl VersionError {
    fn range(input: &str, reason: impl Into<String>) -> Self {
        VersionError::InvalidRange {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parses a plugin version such as `1.2.3`, `1.0.0-beta.2` or `v2.0.0+build.7`.
///
/// A leading `=` or `v` is tolerated, as npm does.
pub fn parse_version(text: &str) -> Result<Version, VersionError> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed).trim_start();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|e| VersionError::InvalidVersion {
        input: text.to_string(),
        reason: e.to_string(),
    })
}

/// Checks whether `version` falls inside the npm range expression `range`.
pub fn satisfies(version: &Version, range: &str) -> Result<bool, VersionError> {
    Ok(VersionRange::from_constraint(range)?.includes(version))
}

/// Orders two versions by semver precedence. Build metadata is ignored.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, version: &Version) -> bool {
        let ord = precedence(version, &self.version);
        match self.op {
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Eq => ord == Ordering::Equal,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

/// Comparators that must all hold. An empty set accepts every release version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ComparatorSet {
    comparators: Vec<Comparator>,
}

impl ComparatorSet {
    fn matches(&self, version: &Version) -> bool {
        if !self.comparators.iter().all(|c| c.matches(version)) {
            return false;
        }
        if version.pre.is_empty() {
            return true;
        }
        // Prereleases only match when some comparator opts into the same
        // major.minor.patch tuple with a prerelease of its own.
        self.comparators.iter().any(|c| {
            !c.version.pre.is_empty()
                && (c.version.major, c.version.minor, c.version.patch)
                    == (version.major, version.minor, version.patch)
        })
    }
}

impl fmt::Display for ComparatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparators.is_empty() {
            return write!(f, "*");
        }
        let parts: Vec<String> = self.comparators.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// A version with optional (wildcarded or omitted) components.
#[derive(Debug)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(text: &str, input: &str) -> Result<Self, VersionError> {
        let text = text.strip_prefix('v').unwrap_or(text);
        if text.is_empty() {
            return Err(VersionError::range(input, "missing version after operator"));
        }

        let (text, build) = match text.split_once('+') {
            Some((head, build)) => (head, Some(build)),
            None => (text, None),
        };
        if let Some(build) = build {
            BuildMetadata::new(build).map_err(|e| VersionError::range(input, e.to_string()))?;
        }
        let (core, pre) = match text.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (text, None),
        };

        let mut parts = core.split('.');
        let major = component(parts.next(), input)?;
        let mut minor = component(parts.next(), input)?;
        let mut patch = component(parts.next(), input)?;
        if parts.next().is_some() {
            return Err(VersionError::range(input, format!("too many components in '{}'", core)));
        }
        if major.is_none() {
            minor = None;
        }
        if minor.is_none() {
            patch = None;
        }

        let pre = match pre {
            Some(pre) if patch.is_some() => {
                Prerelease::new(pre).map_err(|e| VersionError::range(input, e.to_string()))?
            }
            Some(_) => {
                return Err(VersionError::range(input, "a prerelease needs a full major.minor.patch version"));
            }
            None => Prerelease::EMPTY,
        };

        Ok(Self { major, minor, patch, pre })
    }

    fn full(&self) -> Option<Version> {
        match (self.major, self.minor, self.patch) {
            (Some(major), Some(minor), Some(patch)) => Some(Version {
                pre: self.pre.clone(),
                ..Version::new(major, minor, patch)
            }),
            _ => None,
        }
    }

    /// Lowest release matching the partial, with missing components as zero.
    fn floor(&self) -> Version {
        self.full().unwrap_or_else(|| {
            Version::new(self.major.unwrap_or(0), self.minor.unwrap_or(0), self.patch.unwrap_or(0))
        })
    }
}

fn component(part: Option<&str>, input: &str) -> Result<Option<u64>, VersionError> {
    match part {
        None | Some("x") | Some("X") | Some("*") => Ok(None),
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits
            .parse::<u64>()
            .map(Some)
            .map_err(|e| VersionError::range(input, e.to_string())),
        Some(other) => Err(VersionError::range(input, format!("invalid version component '{}'", other))),
    }
}

fn bump(value: u64, input: &str) -> Result<u64, VersionError> {
    value
        .checked_add(1)
        .ok_or_else(|| VersionError::range(input, "version component overflow"))
}

/// `major.minor.patch-0`, the lowest possible prerelease of a release.
fn prerelease_floor(major: u64, minor: u64, patch: u64) -> Version {
    Version {
        pre: Prerelease::new("0").expect("'0' is a valid prerelease identifier"),
        ..Version::new(major, minor, patch)
    }
}

/// Upper bound excluding the next minor (`M.m+1.0-0`) or, without a
/// minor, the next major.
fn next_minor_or_major(major: u64, minor: Option<u64>, input: &str) -> Result<Version, VersionError> {
    Ok(match minor {
        Some(minor) => prerelease_floor(major, bump(minor, input)?, 0),
        None => prerelease_floor(bump(major, input)?, 0, 0),
    })
}

const OPERATORS: [&str; 8] = ["<=", ">=", "~>", "<", ">", "=", "~", "^"];

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest.trim_start());
        }
    }
    ("", token)
}

fn never() -> Comparator {
    Comparator::new(Op::Lt, prerelease_floor(0, 0, 0))
}

fn desugar_tilde(p: &Partial, input: &str, out: &mut Vec<Comparator>) -> Result<(), VersionError> {
    let Some(major) = p.major else {
        return Ok(());
    };
    out.push(Comparator::new(Op::Ge, p.floor()));
    out.push(Comparator::new(Op::Lt, next_minor_or_major(major, p.minor, input)?));
    Ok(())
}

fn desugar_caret(p: &Partial, input: &str, out: &mut Vec<Comparator>) -> Result<(), VersionError> {
    let Some(major) = p.major else {
        return Ok(());
    };
    let upper = match (p.minor, p.patch) {
        (None, _) => prerelease_floor(bump(major, input)?, 0, 0),
        _ if major > 0 => prerelease_floor(bump(major, input)?, 0, 0),
        (Some(minor), None) => prerelease_floor(0, bump(minor, input)?, 0),
        (Some(minor), Some(_)) if minor > 0 => prerelease_floor(0, bump(minor, input)?, 0),
        (Some(minor), Some(patch)) => prerelease_floor(0, minor, bump(patch, input)?),
    };
    out.push(Comparator::new(Op::Ge, p.floor()));
    out.push(Comparator::new(Op::Lt, upper));
    Ok(())
}

fn desugar_exact(p: &Partial, input: &str, out: &mut Vec<Comparator>) -> Result<(), VersionError> {
    let Some(major) = p.major else {
        return Ok(());
    };
    match p.full() {
        Some(version) => out.push(Comparator::new(Op::Eq, version)),
        None => {
            out.push(Comparator::new(Op::Ge, p.floor()));
            out.push(Comparator::new(Op::Lt, next_minor_or_major(major, p.minor, input)?));
        }
    }
    Ok(())
}

fn desugar_inequality(op: Op, p: &Partial, input: &str, out: &mut Vec<Comparator>) -> Result<(), VersionError> {
    let Some(major) = p.major else {
        // `>*` and `<*` exclude everything, `>=*` and `<=*` exclude nothing.
        if matches!(op, Op::Gt | Op::Lt) {
            out.push(never());
        }
        return Ok(());
    };
    if let Some(version) = p.full() {
        out.push(Comparator::new(op, version));
        return Ok(());
    }
    let comparator = match op {
        Op::Gt => match p.minor {
            Some(minor) => Comparator::new(Op::Ge, Version::new(major, bump(minor, input)?, 0)),
            None => Comparator::new(Op::Ge, Version::new(bump(major, input)?, 0, 0)),
        },
        Op::Ge => Comparator::new(Op::Ge, p.floor()),
        Op::Lt => Comparator::new(Op::Lt, prerelease_floor(major, p.minor.unwrap_or(0), 0)),
        Op::Le => Comparator::new(Op::Lt, next_minor_or_major(major, p.minor, input)?),
        Op::Eq => return desugar_exact(p, input, out),
    };
    out.push(comparator);
    Ok(())
}

fn desugar_token(token: &str, input: &str, out: &mut Vec<Comparator>) -> Result<(), VersionError> {
    let (op, rest) = split_operator(token);
    let partial = Partial::parse(rest, input)?;
    match op {
        "^" => desugar_caret(&partial, input, out),
        "~" | "~>" => desugar_tilde(&partial, input, out),
        "" | "=" => desugar_exact(&partial, input, out),
        ">" => desugar_inequality(Op::Gt, &partial, input, out),
        ">=" => desugar_inequality(Op::Ge, &partial, input, out),
        "<" => desugar_inequality(Op::Lt, &partial, input, out),
        "<=" => desugar_inequality(Op::Le, &partial, input, out),
        other => Err(VersionError::range(input, format!("unknown operator '{}'", other))),
    }
}

fn parse_hyphen(lower: &str, upper: &str, input: &str) -> Result<ComparatorSet, VersionError> {
    let lower = Partial::parse(lower, input)?;
    let upper = Partial::parse(upper, input)?;
    let mut comparators = Vec::new();
    if lower.major.is_some() {
        comparators.push(Comparator::new(Op::Ge, lower.floor()));
    }
    if let Some(major) = upper.major {
        match upper.full() {
            Some(version) => comparators.push(Comparator::new(Op::Le, version)),
            None => comparators.push(Comparator::new(Op::Lt, next_minor_or_major(major, upper.minor, input)?)),
        }
    }
    Ok(ComparatorSet { comparators })
}

fn parse_set(text: &str, input: &str) -> Result<ComparatorSet, VersionError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if let [lower, "-", upper] = tokens.as_slice() {
        return parse_hyphen(lower, upper, input);
    }

    let mut comparators = Vec::new();
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        // npm accepts a space between an operator and its version (`>= 1.2`).
        if OPERATORS.contains(&token) {
            let version = iter
                .next()
                .ok_or_else(|| VersionError::range(input, format!("operator '{}' without a version", token)))?;
            desugar_token(&format!("{}{}", token, version), input, &mut comparators)?;
        } else {
            desugar_token(token, input, &mut comparators)?;
        }
    }
    Ok(ComparatorSet { comparators })
}

/// Represents a version requirement range using npm semantics.
#[derive(Debug, Clone)]
pub struct VersionRange {
    /// The original constraint string (e.g., "^1.2.3", ">=2.0 <3")
    constraint: String,
    /// Alternatives separated by `||`; the range matches if any set does.
    sets: Vec<ComparatorSet>,
}

impl VersionRange {
    /// Creates a new version range from a constraint string.
    pub fn from_constraint(constraint: &str) -> Result<Self, VersionError> {
        let sets = constraint
            .split("||")
            .map(|set| parse_set(set.trim(), constraint))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            constraint: constraint.to_string(),
            sets,
        })
    }

    /// Checks if a specific version satisfies this range.
    pub fn includes(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set.matches(version))
    }

    /// Returns the original constraint string.
    pub fn constraint_string(&self) -> &str {
        &self.constraint
    }

    /// The desugared form, e.g. `>=1.2.3 <2.0.0-0` for `^1.2.3`.
    pub fn normalized(&self) -> String {
        let sets: Vec<String> = self.sets.iter().map(|s| s.to_string()).collect();
        sets.join(" || ")
    }
}

/// Implement Display to show the original constraint string.
impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constraint)
    }
}

/// Allow parsing directly from a string slice.
impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::from_constraint(s)
    }
}
