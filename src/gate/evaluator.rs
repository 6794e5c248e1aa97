// src/gate/evaluator.rs

use tracing::{error, info, warn};

use crate::cache::StateStore;
use crate::errors::{BuildgateError, Result};
use crate::gate::matcher::PatternSet;
use crate::types::RecordKind;

/// A pass/fail check over the textual output of a static-analysis tool.
///
/// The same algorithm serves lint, dead-code and type-check output; only the
/// patterns and limits differ.
#[derive(Debug, Clone)]
pub struct QualityGate {
    /// Name under which the baseline is persisted.
    pub name: String,
    /// Any matching line fails the gate outright.
    pub fatal: PatternSet,
    /// Matching lines are not counted (banners, separators, score lines).
    pub exclude: PatternSet,
    /// Absolute ceiling on the finding count.
    pub max: Option<usize>,
    /// Allowed growth over the previous baseline. `None` disables the
    /// regression check.
    pub margin: Option<usize>,
}

/// Outcome of a passing gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    pub count: usize,
    pub previous: Option<usize>,
}

impl QualityGate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fatal: PatternSet::default(),
            exclude: PatternSet::default(),
            max: None,
            margin: None,
        }
    }

    pub fn with_fatal(mut self, fatal: PatternSet) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn with_exclude(mut self, exclude: PatternSet) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Lines that make the gate fail regardless of counts.
    pub fn fatal_lines<'a, S: AsRef<str>>(&self, lines: &'a [S]) -> Vec<&'a str> {
        lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|l| self.fatal.matches_any(l))
            .collect()
    }

    /// Number of findings: non-blank lines not matching an exclude pattern.
    pub fn count<S: AsRef<str>>(&self, lines: &[S]) -> usize {
        lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|l| !l.trim().is_empty() && !self.exclude.matches_any(l))
            .count()
    }

    /// Pure evaluation against an optional previous baseline.
    ///
    /// Order: fatal check, regression check, ceiling check. Regression and
    /// ceiling are independent; either one fails the gate.
    pub fn evaluate<S: AsRef<str>>(&self, lines: &[S], previous: Option<usize>) -> Result<GateReport> {
        let fatal = self.fatal_lines(lines);
        if !fatal.is_empty() {
            return Err(BuildgateError::FatalQuality {
                check: self.name.clone(),
                count: fatal.len(),
            });
        }

        let count = self.count(lines);

        if let (Some(margin), Some(prev)) = (self.margin, previous) {
            if count > prev.saturating_add(margin) {
                return Err(BuildgateError::Regression {
                    check: self.name.clone(),
                    current: count,
                    previous: prev,
                    margin,
                });
            }
        }

        if let Some(max) = self.max {
            if count > max {
                return Err(BuildgateError::ThresholdExceeded {
                    check: self.name.clone(),
                    count,
                    max,
                });
            }
        }

        Ok(GateReport { count, previous })
    }

    /// Evaluate against the persisted baseline and, on success, store the new
    /// count as the baseline.
    ///
    /// Fatal lines are printed to stdout before failing.
    pub fn check<S: AsRef<str>>(&self, lines: &[S], store: &mut dyn StateStore) -> Result<GateReport> {
        let previous = self.load_baseline(store);

        match self.evaluate(lines, previous) {
            Ok(report) => {
                store.save(RecordKind::Baseline, &self.name, &report.count.to_string())?;
                info!(
                    check = %self.name,
                    count = report.count,
                    previous = ?report.previous,
                    "quality gate passed"
                );
                Ok(report)
            }
            Err(err) => {
                if let BuildgateError::FatalQuality { .. } = err {
                    for line in self.fatal_lines(lines) {
                        println!("{line}");
                    }
                }
                error!(check = %self.name, error = %err, "quality gate failed");
                Err(err)
            }
        }
    }

    fn load_baseline(&self, store: &dyn StateStore) -> Option<usize> {
        match store.load(RecordKind::Baseline, &self.name) {
            Ok(Some(raw)) => match raw.trim().parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(check = %self.name, value = %raw, "ignoring unparsable baseline");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(check = %self.name, error = %err, "could not read baseline");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStateStore;

    fn lint_gate() -> QualityGate {
        QualityGate::new("lint")
            .with_fatal(PatternSet::parse(&["no-member", "no-name-in-module", "import-error"]).unwrap())
            .with_exclude(
                PatternSet::parse(&[
                    "*************",
                    "---------------------",
                    "Your code has been rated at",
                ])
                .unwrap(),
            )
            .with_max(350)
            .with_margin(10)
    }

    fn findings(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("pkg/core.py:{i}: C0301 line-too-long")).collect()
    }

    #[test]
    fn fatal_lines_fail_regardless_of_limits() {
        let gate = QualityGate::new("lint")
            .with_fatal(PatternSet::parse(&["no-member"]).unwrap())
            .with_max(1000)
            .with_margin(1000);
        let lines = ["error: no-member X", "warning: unused Y"];

        match gate.evaluate(&lines, None) {
            Err(BuildgateError::FatalQuality { check, count }) => {
                assert_eq!(check, "lint");
                assert_eq!(count, 1);
            }
            other => panic!("expected FatalQuality, got {other:?}"),
        }
    }

    #[test]
    fn growth_beyond_margin_is_a_regression_even_under_ceiling() {
        let err = lint_gate().evaluate(&findings(40), Some(25)).unwrap_err();
        match err {
            BuildgateError::Regression {
                current,
                previous,
                margin,
                ..
            } => {
                assert_eq!((current, previous, margin), (40, 25, 10));
            }
            other => panic!("expected Regression, got {other:?}"),
        }
    }

    #[test]
    fn growth_within_margin_passes() {
        let report = lint_gate().evaluate(&findings(40), Some(35)).unwrap();
        assert_eq!(report, GateReport { count: 40, previous: Some(35) });
    }

    #[test]
    fn ceiling_applies_without_baseline() {
        let err = lint_gate().evaluate(&findings(351), None).unwrap_err();
        assert!(matches!(
            err,
            BuildgateError::ThresholdExceeded { count: 351, max: 350, .. }
        ));
    }

    #[test]
    fn ceiling_applies_when_baseline_was_already_bad() {
        let err = lint_gate().evaluate(&findings(400), Some(395)).unwrap_err();
        assert!(matches!(err, BuildgateError::ThresholdExceeded { .. }));
    }

    #[test]
    fn excluded_and_blank_lines_are_not_counted() {
        let mut lines = findings(3);
        lines.push("************* Module pkg.core".to_string());
        lines.push("---------------------".to_string());
        lines.push("Your code has been rated at 9.50/10".to_string());
        lines.push(String::new());
        lines.push("   ".to_string());

        assert_eq!(lint_gate().count(&lines), 3);
    }

    #[test]
    fn check_persists_baseline_only_on_success() {
        let mut store = MemoryStateStore::new();
        store.save(RecordKind::Baseline, "lint", "35").unwrap();

        let report = lint_gate().check(&findings(40), &mut store).unwrap();
        assert_eq!(report.previous, Some(35));
        assert_eq!(
            store.load(RecordKind::Baseline, "lint").unwrap().as_deref(),
            Some("40")
        );

        // 60 > 40 + 10: regression, baseline untouched.
        assert!(lint_gate().check(&findings(60), &mut store).is_err());
        assert_eq!(
            store.load(RecordKind::Baseline, "lint").unwrap().as_deref(),
            Some("40")
        );
    }

    #[test]
    fn unparsable_baseline_is_ignored() {
        let mut store = MemoryStateStore::new();
        store.save(RecordKind::Baseline, "lint", "lots").unwrap();

        let report = lint_gate().check(&findings(100), &mut store).unwrap();
        assert_eq!(report.previous, None);
    }
}
