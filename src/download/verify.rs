//! Integrity verification of downloads and generated splits.
//!
//! Verification failures collect every offender before failing, so one run
//! reports the full damage. The mode is the user-facing bypass: `none`
//! disables everything, `basic` keeps the cheap split-size checks but skips
//! checksums.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::GranaryError;
use crate::info::FileChecksum;
use crate::splits::SplitInfo;

/// How much integrity checking `download_and_prepare` performs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerificationMode {
    /// Checksums, sizes, and split counts.
    #[default]
    AllChecks,
    /// Split counts only.
    BasicChecks,
    /// No verification at all.
    NoChecks,
}

impl FromStr for VerificationMode {
    type Err = GranaryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "all" | "all_checks" => Ok(VerificationMode::AllChecks),
            "basic" | "basic_checks" => Ok(VerificationMode::BasicChecks),
            "none" | "no_checks" => Ok(VerificationMode::NoChecks),
            other => Err(GranaryError::InvalidConfig {
                message: format!(
                    "unknown verification mode '{other}' (expected 'all', 'basic', or 'none')"
                ),
            }),
        }
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMode::AllChecks => f.write_str("all"),
            VerificationMode::BasicChecks => f.write_str("basic"),
            VerificationMode::NoChecks => f.write_str("none"),
        }
    }
}

/// Compares recorded download checksums against expectations.
///
/// Recorded sources without an expectation are ignored; expected sources
/// that were never recorded, and size or checksum mismatches, all fail.
/// Only runs under [`VerificationMode::AllChecks`].
pub fn verify_checksums(
    expected: &BTreeMap<String, FileChecksum>,
    recorded: &BTreeMap<String, FileChecksum>,
    mode: VerificationMode,
) -> Result<(), GranaryError> {
    if mode != VerificationMode::AllChecks || expected.is_empty() {
        return Ok(());
    }

    let mut failures = Vec::new();
    for (source, expectation) in expected {
        let Some(record) = recorded.get(source) else {
            failures.push(format!("  {source}: expected file was not downloaded"));
            continue;
        };
        if record.num_bytes != expectation.num_bytes {
            failures.push(format!(
                "  {source}: size mismatch (expected {} byte(s), found {})",
                expectation.num_bytes, record.num_bytes
            ));
            continue;
        }
        if let (Some(expected_sum), Some(recorded_sum)) =
            (expectation.checksum.as_deref(), record.checksum.as_deref())
        {
            if expected_sum != recorded_sum {
                failures.push(format!(
                    "  {source}: checksum mismatch (expected {expected_sum}, found {recorded_sum})"
                ));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(GranaryError::ChecksumMismatch { failures })
    }
}

/// Compares generated split sizes against expectations.
///
/// Skipped under [`VerificationMode::NoChecks`] or when no expectations
/// exist. Missing, unexpected, and wrongly-sized splits all fail.
pub fn verify_splits(
    expected: &BTreeMap<String, SplitInfo>,
    recorded: &BTreeMap<String, SplitInfo>,
    mode: VerificationMode,
) -> Result<(), GranaryError> {
    if mode == VerificationMode::NoChecks || expected.is_empty() {
        return Ok(());
    }

    let mut failures = Vec::new();
    for (split, expectation) in expected {
        match recorded.get(split) {
            None => failures.push(format!("  {split}: expected split was not generated")),
            Some(record) if record.num_examples != expectation.num_examples => {
                failures.push(format!(
                    "  {split}: example count mismatch (expected {}, generated {})",
                    expectation.num_examples, record.num_examples
                ));
            }
            Some(_) => {}
        }
    }
    for split in recorded.keys() {
        if !expected.contains_key(split) {
            failures.push(format!("  {split}: unexpected split"));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(GranaryError::SplitsMismatch { failures })
    }
}
