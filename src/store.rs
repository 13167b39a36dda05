//! Collaborator store abstractions.
//!
//! Persistence lives outside the core. These traits are the seams: a rule
//! store serving the effective rule set, a KYC store resolving applicants,
//! a screening provider serving scored outcomes, and a case store with
//! atomic whole-record replacement. In-memory implementations back tests
//! and small embeddings; production deployments plug in their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::case::ComplianceCase;
use crate::error::Result;
use crate::kyc::KycApplicant;
use crate::rule::ComplianceRule;
use crate::screening::ScreeningOutcome;

/// Source of the compliance rule set.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All effective rules at `now`, ordered by ascending priority weight,
    /// then creation time.
    async fn effective_rules(&self, now: DateTime<Utc>) -> Result<Vec<ComplianceRule>>;
}

/// Read-side access to KYC applicants.
#[async_trait]
pub trait KycStore: Send + Sync {
    async fn applicant(&self, id: &str) -> Result<Option<KycApplicant>>;

    /// Resolve an applicant by linked wallet address (case-insensitive).
    async fn applicant_by_address(&self, address: &str) -> Result<Option<KycApplicant>>;
}

/// Access to completed screening outcomes. May be slow; the transfer gate
/// treats provider failure as a fail-closed denial.
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    async fn screenings_for(&self, applicant_id: &str) -> Result<Vec<ScreeningOutcome>>;
}

/// Case persistence. `put` must atomically replace the whole record; the
/// workflow never issues field-by-field writes.
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ComplianceCase>>;
    async fn put(&self, case: ComplianceCase) -> Result<()>;
}

/// In-memory rule store.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: DashMap<String, ComplianceRule>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, rule: ComplianceRule) {
        self.rules.insert(rule.id.clone(), rule);
    }

    pub fn remove(&self, id: &str) {
        self.rules.remove(id);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn effective_rules(&self, now: DateTime<Utc>) -> Result<Vec<ComplianceRule>> {
        let mut rules: Vec<ComplianceRule> = self
            .rules
            .iter()
            .filter(|entry| entry.value().is_effective(now))
            .map(|entry| entry.value().clone())
            .collect();
        rules.sort_by_key(|rule| (rule.priority.weight(), rule.created_at));
        Ok(rules)
    }
}

/// In-memory KYC store with a wallet-address index.
#[derive(Default)]
pub struct MemoryKycStore {
    applicants: DashMap<String, KycApplicant>,
    by_address: DashMap<String, String>,
}

impl MemoryKycStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, applicant: KycApplicant) {
        if let Some(address) = &applicant.wallet_address {
            self.by_address
                .insert(address.to_lowercase(), applicant.id.clone());
        }
        self.applicants.insert(applicant.id.clone(), applicant);
    }
}

#[async_trait]
impl KycStore for MemoryKycStore {
    async fn applicant(&self, id: &str) -> Result<Option<KycApplicant>> {
        Ok(self.applicants.get(id).map(|entry| entry.value().clone()))
    }

    async fn applicant_by_address(&self, address: &str) -> Result<Option<KycApplicant>> {
        let id = match self.by_address.get(&address.to_lowercase()) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        self.applicant(&id).await
    }
}

/// In-memory screening provider serving pre-loaded outcomes.
#[derive(Default)]
pub struct MemoryScreeningProvider {
    outcomes: DashMap<String, Vec<ScreeningOutcome>>,
}

impl MemoryScreeningProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, outcome: ScreeningOutcome) {
        self.outcomes
            .entry(outcome.applicant_id.clone())
            .or_default()
            .push(outcome);
    }
}

#[async_trait]
impl ScreeningProvider for MemoryScreeningProvider {
    async fn screenings_for(&self, applicant_id: &str) -> Result<Vec<ScreeningOutcome>> {
        Ok(self
            .outcomes
            .get(applicant_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// In-memory case store. Replacement is atomic per case because the map
/// entry is swapped wholesale.
#[derive(Default)]
pub struct MemoryCaseStore {
    cases: DashMap<String, ComplianceCase>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn get(&self, id: &str) -> Result<Option<ComplianceCase>> {
        Ok(self.cases.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, case: ComplianceCase) -> Result<()> {
        self.cases.insert(case.id.clone(), case);
        Ok(())
    }
}
