use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{OrganDomain, ScoreVariant};

/// Sub-score for one organ domain.
///
/// Absent inputs score as normal (0 points) and are listed in
/// `missing_inputs`, so "not measured" can be told apart from "measured normal".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainScore {
    pub points: u8,
    pub max_points: u8,
    pub missing_inputs: Vec<&'static str>,
}

impl DomainScore {
    pub fn new(domain: OrganDomain) -> Self {
        Self {
            points: 0,
            max_points: domain.max_points(),
            missing_inputs: Vec::new(),
        }
    }

    /// Add points, never exceeding the domain maximum.
    pub fn add(&mut self, points: u8) {
        self.points = self.points.saturating_add(points).min(self.max_points);
    }

    pub fn missing(&mut self, input: &'static str) {
        if !self.missing_inputs.contains(&input) {
            self.missing_inputs.push(input);
        }
    }

    /// Every input needed for this domain was present.
    pub fn is_complete(&self) -> bool {
        self.missing_inputs.is_empty()
    }
}

/// One score report: per-domain sub-scores plus total and classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeverityScore {
    pub variant: ScoreVariant,
    pub domains: BTreeMap<OrganDomain, DomainScore>,
    pub total: u8,
    /// Total of 2 or more.
    pub sepsis: bool,
    /// Sepsis with at least 1 cardiovascular point.
    pub septic_shock: bool,
}

impl SeverityScore {
    pub fn from_domains(variant: ScoreVariant, domains: BTreeMap<OrganDomain, DomainScore>) -> Self {
        let total = domains.values().map(|d| d.points).sum();
        let cardiovascular = domains
            .get(&OrganDomain::Cardiovascular)
            .map_or(0, |d| d.points);
        let sepsis = total >= 2;
        Self {
            variant,
            domains,
            total,
            sepsis,
            septic_shock: sepsis && cardiovascular >= 1,
        }
    }

    pub fn points(&self, domain: OrganDomain) -> u8 {
        self.domains.get(&domain).map_or(0, |d| d.points)
    }

    /// Domain name → sub-score, the plain mapping view of the report.
    pub fn sub_scores(&self) -> BTreeMap<&'static str, u8> {
        self.domains
            .iter()
            .map(|(domain, score)| (domain.as_str(), score.points))
            .collect()
    }

    /// Input names absent anywhere in the report.
    pub fn missing_inputs(&self) -> Vec<&'static str> {
        let mut all: Vec<&'static str> = self
            .domains
            .values()
            .flat_map(|d| d.missing_inputs.iter().copied())
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}
