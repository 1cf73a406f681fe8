//! The reconciliation engine.
//!
//! Merges a candidate fact set into a profile in strict tiers: exact name →
//! heuristic category → delegated semantic equivalence → new field. The
//! merge is total: collaborator failures only push candidates further down
//! the tiers.

use crate::categories::classify;
use quill_config::ReconcileStrategy;
use quill_core::error::ReconciliationAmbiguity;
use quill_core::profile::{FactSet, FieldIdentity, FieldValue, Profile};
use quill_providers::Collaborator;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Which tier decided where a candidate went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Category,
    Semantic,
    New,
    /// Added by the union-merge fallback after an unusable mapping
    Union,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeDecision {
    pub candidate: String,
    pub target: String,
    pub tier: MatchTier,
}

/// What one merge did, candidate by candidate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub decisions: Vec<MergeDecision>,
    /// Set when the mapping response was unusable and the fallback ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<String>,
    /// Candidates dropped because their value looked like an index pointer
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

impl MergeReport {
    pub fn target_of(&self, candidate: &str) -> Option<&str> {
        self.decisions
            .iter()
            .find(|d| d.candidate == candidate)
            .map(|d| d.target.as_str())
    }

    pub fn tier_of(&self, candidate: &str) -> Option<MatchTier> {
        self.decisions
            .iter()
            .find(|d| d.candidate == candidate)
            .map(|d| d.tier)
    }
}

/// Candidates that share a normalized name, merged as one field.
///
/// The last value in key order wins; the first name names a new field.
struct Group<'a> {
    names: Vec<&'a String>,
    value: &'a FieldValue,
}

impl Group<'_> {
    fn name(&self) -> &str {
        self.names[0]
    }
}

fn group_by_identity(candidates: &FactSet) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut by_identity: HashMap<String, usize> = HashMap::new();
    for (candidate, value) in candidates {
        let normalized = FieldIdentity::new(candidate.as_str()).normalized;
        let existing = by_identity
            .get(&normalized)
            .copied()
            .filter(|_| !normalized.is_empty());
        match existing {
            Some(i) => {
                groups[i].names.push(candidate);
                groups[i].value = value;
            }
            None => {
                by_identity.insert(normalized, groups.len());
                groups.push(Group {
                    names: vec![candidate],
                    value,
                });
            }
        }
    }
    groups
}

/// Working state for one merge.
struct Merge {
    profile: Profile,
    /// Fields already written by this merge. Exact matches still overwrite
    /// claimed fields; the category and semantic tiers skip them.
    claimed: HashSet<String>,
    report: MergeReport,
}

impl Merge {
    fn new(profile: Profile) -> Self {
        Self {
            profile,
            claimed: HashSet::new(),
            report: MergeReport::default(),
        }
    }

    fn assign(&mut self, group: &Group<'_>, target: String, tier: MatchTier) {
        debug!(candidate = group.name(), target = %target, ?tier, "Merged field");
        self.profile.insert(target.clone(), group.value.clone());
        self.claimed.insert(target.clone());
        for name in &group.names {
            self.report.decisions.push(MergeDecision {
                candidate: (*name).clone(),
                target: target.clone(),
                tier,
            });
        }
    }

    /// Fields tiers 2 and 3 may still target.
    fn open_fields(&self) -> Vec<(String, FieldValue)> {
        self.profile
            .facts()
            .filter(|(k, _)| !self.claimed.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn exact(&self, candidate: &str) -> Option<String> {
        let identity = FieldIdentity::new(candidate);
        self.profile
            .facts()
            .map(|(k, _)| k)
            .find(|k| identity.matches_exactly(&FieldIdentity::new(k.as_str())))
            .cloned()
    }

    fn category(&self, candidate: &str) -> Option<String> {
        let category = classify(candidate)?;
        self.open_fields()
            .into_iter()
            .map(|(k, _)| k)
            .find(|k| classify(k).is_some_and(|c| c.name == category.name))
    }

    /// The candidate's own name, moved aside if a pointer entry owns it.
    fn new_field_name(&self, candidate: &str) -> String {
        let mut name = candidate.to_string();
        while self.profile.is_pointer_field(&name) {
            name.push_str("_value");
        }
        name
    }

    fn add_new(&mut self, group: &Group<'_>, tier: MatchTier) {
        let target = self.new_field_name(group.name());
        self.assign(group, target, tier);
    }
}

/// Merges candidate facts into a profile.
pub struct Reconciler {
    collaborator: Option<Collaborator>,
    strategy: ReconcileStrategy,
}

impl Reconciler {
    pub fn new(collaborator: Collaborator, strategy: ReconcileStrategy) -> Self {
        Self {
            collaborator: Some(collaborator),
            strategy,
        }
    }

    /// Exact and category tiers only; everything else becomes a new field.
    pub fn deterministic() -> Self {
        Self {
            collaborator: None,
            strategy: ReconcileStrategy::Pairwise,
        }
    }

    pub fn strategy(&self) -> ReconcileStrategy {
        self.strategy
    }

    /// Merge `candidates` into a copy of `current`.
    ///
    /// Every exact match is settled before any other tier runs, so the
    /// fields a repeated merge sees as open are the ones the first merge saw.
    pub async fn reconcile(&self, current: &Profile, candidates: &FactSet) -> (Profile, MergeReport) {
        let mut merge = Merge::new(current.clone());

        let mut accepted = FactSet::new();
        for (candidate, value) in candidates {
            // Pointer entries are only created by registering an index
            if value.is_pointer() {
                warn!(candidate = %candidate, "Dropping candidate with a pointer-shaped value");
                merge.report.rejected.push(candidate.clone());
            } else {
                accepted.insert(candidate.clone(), value.clone());
            }
        }

        let mut remaining = Vec::new();
        for group in group_by_identity(&accepted) {
            match merge.exact(group.name()) {
                Some(target) => merge.assign(&group, target, MatchTier::Exact),
                None => remaining.push(group),
            }
        }

        let mut unresolved: Vec<Group<'_>> = Vec::new();
        for group in remaining {
            if let Some(target) = merge.category(group.name()) {
                merge.assign(&group, target, MatchTier::Category);
                continue;
            }
            match (&self.collaborator, self.strategy) {
                (Some(collaborator), ReconcileStrategy::Pairwise) => {
                    match pairwise_match(collaborator, &merge, group.name(), group.value).await {
                        Some(target) => merge.assign(&group, target, MatchTier::Semantic),
                        None => merge.add_new(&group, MatchTier::New),
                    }
                }
                (Some(_), ReconcileStrategy::BatchMapping) => unresolved.push(group),
                (None, _) => merge.add_new(&group, MatchTier::New),
            }
        }

        if let (Some(collaborator), false) = (&self.collaborator, unresolved.is_empty()) {
            apply_mapping(collaborator, &mut merge, &unresolved).await;
        }

        info!(
            candidates = candidates.len(),
            fields = merge.profile.len(),
            "Reconciled candidate facts"
        );
        (merge.profile, merge.report)
    }
}

fn equivalence_prompt(current: &str, current_value: &FieldValue, candidate: &str, value: &FieldValue) -> String {
    format!(
        "You are an expert in data field comparison. Determine if the following two field \
         names refer to the same piece of information, given their values:\n\
         Field 1: '{current}' (current value: '{current_value}')\n\
         Field 2: '{candidate}' (new value: '{value}')\n\
         Only answer with 'yes' or 'no'."
    )
}

/// Ask about each open field in turn; the first "yes" wins. Errors count as "no".
async fn pairwise_match(
    collaborator: &Collaborator,
    merge: &Merge,
    candidate: &str,
    value: &FieldValue,
) -> Option<String> {
    for (field, current_value) in merge.open_fields() {
        let prompt = equivalence_prompt(&field, &current_value, candidate, value);
        match collaborator.ask(&prompt).await {
            Ok(reply) if reply.trim().to_lowercase().starts_with("yes") => {
                info!(candidate, field = %field, "Collaborator confirmed equivalent fields");
                return Some(field);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(candidate, field = %field, error = %e, "Equivalence check failed, treating as no");
            }
        }
    }
    None
}

fn mapping_prompt(current: &[(String, FieldValue)], unresolved: &[Group<'_>]) -> String {
    let current_json: serde_json::Map<String, Value> =
        current.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
    let new_json: serde_json::Map<String, Value> = unresolved
        .iter()
        .map(|g| (g.name().to_string(), g.value.to_json()))
        .collect();
    let pretty = |m: serde_json::Map<String, Value>| {
        serde_json::to_string_pretty(&Value::Object(m)).unwrap_or_default()
    };

    format!(
        r#"You are a data integration specialist merging user information from multiple sources into one accurate profile.

CURRENT USER PROFILE:
{current}

NEW INFORMATION TO INTEGRATE:
{new}

TASK: Map each field in the new information to the field of the current profile that holds the same information, even if the names differ.

KNOWN SYNONYMS:
- name = fullName, userName, firstName+lastName
- phone = mobile, phoneNumber, cellPhone, telephone
- address = homeAddress, streetAddress, residentialAddress
- email = emailAddress, userEmail
- ssn = socialSecurityNumber, taxpayerID
- dob = dateOfBirth, birthDate
- income = salary, wages, earnings, compensation

OUTPUT: a JSON object {{"mapping": {{"<new field>": "<current field>" or null}}}} covering ALL new fields. Use null for fields that are new. Return ONLY the JSON.

EXAMPLE:
Current: {{"name": "John Smith", "phone": "555-1234"}}
New: {{"fullName": "John Smith", "mobile": "555-1234", "email": "john@example.com"}}
Output: {{"mapping": {{"fullName": "name", "mobile": "phone", "email": null}}}}

YOUR MAPPING OUTPUT:"#,
        current = pretty(current_json),
        new = pretty(new_json),
    )
}

/// Parse `{"mapping": {...}}` out of a collaborator reply.
pub fn parse_mapping(
    raw: &str,
) -> Result<serde_json::Map<String, Value>, ReconciliationAmbiguity> {
    let object = quill_ingest::parse_response(raw)
        .map_err(|e| ReconciliationAmbiguity::Unparseable(e.to_string()))?;
    match object.get("mapping") {
        Some(Value::Object(mapping)) => Ok(mapping.clone()),
        _ => Err(ReconciliationAmbiguity::MissingMapping),
    }
}

async fn request_mapping(
    collaborator: &Collaborator,
    current: &[(String, FieldValue)],
    unresolved: &[Group<'_>],
) -> Result<serde_json::Map<String, Value>, ReconciliationAmbiguity> {
    let reply = collaborator.ask_json(&mapping_prompt(current, unresolved)).await?;
    parse_mapping(&reply)
}

/// One mapping request for every candidate the deterministic tiers left.
///
/// An unusable reply falls back to a union merge of those candidates.
async fn apply_mapping(
    collaborator: &Collaborator,
    merge: &mut Merge,
    unresolved: &[Group<'_>],
) {
    let open = merge.open_fields();
    if open.is_empty() {
        for group in unresolved {
            merge.add_new(group, MatchTier::New);
        }
        return;
    }

    let mapping = match request_mapping(collaborator, &open, unresolved).await {
        Ok(mapping) => mapping,
        Err(e) => {
            warn!(error = %e, candidates = unresolved.len(), "Field mapping unusable, falling back to union merge");
            merge.report.ambiguity = Some(e.to_string());
            for group in unresolved {
                merge.add_new(group, MatchTier::Union);
            }
            return;
        }
    };

    for group in unresolved {
        let target = mapping
            .get(group.name())
            .and_then(Value::as_str)
            .filter(|t| open.iter().any(|(k, _)| k == t) && !merge.claimed.contains(*t))
            .map(String::from);

        match target {
            Some(target) => merge.assign(group, target, MatchTier::Semantic),
            None => merge.add_new(group, MatchTier::New),
        }
    }
}
