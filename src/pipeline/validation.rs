//! Validation engine for pipeline descriptions.
//!
//! The engine runs all registered [`ValidationRule`]s against a
//! [`PipelineSpec`](super::spec::PipelineSpec) and collects every diagnostic
//! into a [`ValidationReport`]. It never short-circuits on the first error,
//! so users see all problems at once.
//!
//! # Quick start
//!
//! ```rust
//! use lingrules::pipeline::spec::PipelineSpec;
//! use lingrules::pipeline::validation::ValidationEngine;
//!
//! let spec = PipelineSpec::from_json(r#"{ "v": 1, "modules": { "dependencies": "dep.dat" } }"#).unwrap();
//! let report = ValidationEngine::with_defaults().validate(&spec);
//! assert!(report.has_errors());
//! for err in report.errors() {
//!     eprintln!("{err}");
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::spec::*;
use crate::diagnostics::Severity;

// ─── Codes ──────────────────────────────────────────────────────────────────

/// Stable identifiers for spec findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecErrorCode {
    UnsupportedVersion,
    MissingStage,
    InvalidValue,
    LimitExceeded,
    UnknownField,
    EmptyPipeline,
}

impl SpecErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion => "unsupported_version",
            Self::MissingStage => "missing_stage",
            Self::InvalidValue => "invalid_value",
            Self::LimitExceeded => "limit_exceeded",
            Self::UnknownField => "unknown_field",
            Self::EmptyPipeline => "empty_pipeline",
        }
    }
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding, located by a JSON pointer into the pipeline JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    pub code: SpecErrorCode,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ValidationDiagnostic {
    pub fn error(code: SpecErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(code: SpecErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, path, message)
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.as_str(), self.path, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Collected diagnostics from running all validation rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Returns `true` if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Returns `true` if there are no errors (warnings are acceptable).
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects a [`PipelineSpec`] and returns
/// zero or more diagnostics.
pub trait ValidationRule: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"dependencies_need_chart"`).
    fn name(&self) -> &str;

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s against a [`PipelineSpec`] and collects
/// all diagnostics into a [`ValidationReport`].
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// Create an empty engine with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create an engine pre-loaded with the default rule set.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(VersionRule));
        engine.add_rule(Box::new(EmptyPipelineRule));
        engine.add_rule(Box::new(DependenciesNeedChartRule));
        engine.add_rule(Box::new(SolverParamsRule));
        engine.add_rule(Box::new(RuntimeLimitsRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run all rules against `spec` and return the collected report.
    pub fn validate(&self, spec: &PipelineSpec) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            report.diagnostics.extend(rule.validate(spec));
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. only version 1 is understood ────────────────────────────────────────

struct VersionRule;

impl ValidationRule for VersionRule {
    fn name(&self) -> &str {
        "version"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        if spec.v == 1 {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            SpecErrorCode::UnsupportedVersion,
            "/v",
            format!("unsupported spec version {}", spec.v),
        )
        .with_hint("Set \"v\": 1")]
    }
}

// ─── 2. a pipeline without engines does nothing ─────────────────────────────

struct EmptyPipelineRule;

impl ValidationRule for EmptyPipelineRule {
    fn name(&self) -> &str {
        "empty_pipeline"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        if !spec.modules.is_empty() {
            return vec![];
        }
        vec![ValidationDiagnostic::warning(
            SpecErrorCode::EmptyPipeline,
            "/modules",
            "no rule-based module is configured",
        )]
    }
}

// ─── 3. dependencies complete chart parses ──────────────────────────────────

struct DependenciesNeedChartRule;

impl ValidationRule for DependenciesNeedChartRule {
    fn name(&self) -> &str {
        "dependencies_need_chart"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        if spec.modules.dependencies.is_some() && spec.modules.chart.is_none() {
            vec![ValidationDiagnostic::error(
                SpecErrorCode::MissingStage,
                "/modules/chart",
                "dependencies requires a chart grammar",
            )
            .with_hint("Add \"chart\": the chunk grammar whose parses the dependency rules complete")]
        } else {
            vec![]
        }
    }
}

// ─── 4. solver parameters must be positive ──────────────────────────────────

struct SolverParamsRule;

impl ValidationRule for SolverParamsRule {
    fn name(&self) -> &str {
        "solver_params"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let Some(tagger) = &spec.modules.tagger else {
            return vec![];
        };
        let mut out = Vec::new();
        if tagger.max_iterations == Some(0) {
            out.push(ValidationDiagnostic::error(
                SpecErrorCode::InvalidValue,
                "/modules/tagger/max_iterations",
                "max_iterations must be greater than 0",
            ));
        }
        let reals: &[(&str, Option<f64>)] = &[("scale_factor", tagger.scale_factor), ("epsilon", tagger.epsilon)];
        for &(field, value) in reals {
            if let Some(x) = value {
                if !(x > 0.0) {
                    out.push(ValidationDiagnostic::error(
                        SpecErrorCode::InvalidValue,
                        format!("/modules/tagger/{field}"),
                        format!("{field} must be positive, got {x}"),
                    ));
                }
            }
        }
        out
    }
}

// ─── 5. runtime limits must be positive when set ────────────────────────────

struct RuntimeLimitsRule;

impl ValidationRule for RuntimeLimitsRule {
    fn name(&self) -> &str {
        "runtime_limits"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let checks: &[(&str, Option<usize>)] = &[
            ("threads", spec.runtime.threads),
            ("max_sentence_words", spec.runtime.max_sentence_words),
        ];
        checks
            .iter()
            .filter(|(_, value)| *value == Some(0))
            .map(|(field, _)| {
                ValidationDiagnostic::error(
                    SpecErrorCode::LimitExceeded,
                    format!("/runtime/{field}"),
                    format!("{field} must be greater than 0"),
                )
                .with_hint(format!("Remove {field} to use the default, or set it to a positive value"))
            })
            .collect()
    }
}

// ─── 6. unknown fields (strict → error, non-strict → warning) ──────────────

struct UnknownFieldsRule;

impl UnknownFieldsRule {
    fn check_unknowns(path: &str, unknowns: &HashMap<String, serde_json::Value>, strict: bool) -> Vec<ValidationDiagnostic> {
        let mut keys: Vec<&String> = unknowns.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let diag_fn = if strict {
                    ValidationDiagnostic::error
                } else {
                    ValidationDiagnostic::warning
                };
                diag_fn(
                    SpecErrorCode::UnknownField,
                    format!("{path}/{key}"),
                    format!("unrecognized field \"{key}\""),
                )
                .with_hint("Check spelling or remove this field")
            })
            .collect()
    }
}

impl ValidationRule for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, spec: &PipelineSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        out.extend(Self::check_unknowns("", &spec.unknown_fields, spec.strict));
        out.extend(Self::check_unknowns("/modules", &spec.modules.unknown_fields, spec.strict));
        if let Some(tagger) = &spec.modules.tagger {
            out.extend(Self::check_unknowns("/modules/tagger", &tagger.unknown_fields, spec.strict));
        }
        out.extend(Self::check_unknowns("/runtime", &spec.runtime.unknown_fields, spec.strict));
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════
