use crate::error::{MeterDeltaError, Result};
use crate::schema::{MeterMapping, UnmappedPolicy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an output meter identifier was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum IdentityStatus {
    /// Taken from the mapping.
    Mapped,
    /// No mapping entry; the internal label is used unchanged.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMeter {
    pub id: String,
    pub status: IdentityStatus,
}

/// Bidirectional lookup between source column labels and downstream
/// reference identifiers.
#[derive(Debug, Clone)]
pub struct MeterIdentityResolver {
    forward: BTreeMap<String, String>,
    policy: UnmappedPolicy,
}

impl MeterIdentityResolver {
    /// Builds the resolver, rejecting empty labels and any external
    /// identifier targeted by more than one internal label.
    pub fn new(mapping: &MeterMapping, policy: UnmappedPolicy) -> Result<Self> {
        let mut forward = BTreeMap::new();
        let mut targets: BTreeMap<&str, &str> = BTreeMap::new();

        for (internal, external) in mapping.iter() {
            if internal.trim().is_empty() || external.trim().is_empty() {
                return Err(MeterDeltaError::EmptyMeterLabel {
                    internal: internal.to_string(),
                    external: external.to_string(),
                });
            }

            if let Some(first) = targets.insert(external, internal) {
                return Err(MeterDeltaError::DuplicateExternalIdentifier {
                    external: external.to_string(),
                    first: first.to_string(),
                    second: internal.to_string(),
                });
            }

            forward.insert(internal.to_string(), external.to_string());
        }

        Ok(Self { forward, policy })
    }

    pub fn policy(&self) -> UnmappedPolicy {
        self.policy
    }

    /// The mapped identifier, if any, without applying the unmapped policy.
    pub fn mapped_external(&self, internal: &str) -> Option<&str> {
        self.forward.get(internal).map(String::as_str)
    }

    /// Resolves an internal label. Unmapped labels pass through unchanged
    /// under [`UnmappedPolicy::PassThrough`] and resolve to `None` under
    /// [`UnmappedPolicy::Drop`].
    pub fn to_external(&self, internal: &str) -> Option<ResolvedMeter> {
        if let Some(external) = self.mapped_external(internal) {
            return Some(ResolvedMeter {
                id: external.to_string(),
                status: IdentityStatus::Mapped,
            });
        }

        match self.policy {
            UnmappedPolicy::PassThrough => Some(ResolvedMeter {
                id: internal.to_string(),
                status: IdentityStatus::PassThrough,
            }),
            UnmappedPolicy::Drop => None,
        }
    }

    /// Reverse lookup. External identifiers are unique, so at most one
    /// internal label can match.
    pub fn to_internal(&self, external: &str) -> Option<&str> {
        self.forward
            .iter()
            .find(|(_, ext)| ext.as_str() == external)
            .map(|(internal, _)| internal.as_str())
    }

    /// Rejects a tracked label that would pass through under an identifier
    /// the mapping already assigns to another meter.
    pub fn check_tracked(&self, tracked: &[String]) -> Result<()> {
        if self.policy == UnmappedPolicy::Drop {
            return Ok(());
        }

        for label in tracked {
            if self.forward.contains_key(label) {
                continue;
            }
            if let Some(owner) = self.to_internal(label) {
                return Err(MeterDeltaError::DuplicateExternalIdentifier {
                    external: label.clone(),
                    first: owner.to_string(),
                    second: label.clone(),
                });
            }
        }

        Ok(())
    }

    /// Tracked labels that resolve to themselves under the current policy.
    pub fn passed_through<'a>(&self, tracked: &'a [String]) -> Vec<&'a str> {
        if self.policy == UnmappedPolicy::Drop {
            return Vec::new();
        }

        tracked
            .iter()
            .filter(|label| !self.forward.contains_key(label.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// External identifiers whose internal label is not among `tracked`,
    /// so no source data can ever reach them.
    pub fn unsourced_externals(&self, tracked: &[String]) -> Vec<&str> {
        self.forward
            .iter()
            .filter(|(internal, _)| !tracked.iter().any(|t| t == *internal))
            .map(|(_, external)| external.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> MeterMapping {
        [
            ("JAFZA 4", "JAFZA 4-Meter 1"),
            ("AFR", "DWC-AFR-Meter 2"),
            ("CGF", "DWC-CGF-Meter 1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_forward_and_reverse_lookup() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();

        let resolved = resolver.to_external("AFR").unwrap();
        assert_eq!(resolved.id, "DWC-AFR-Meter 2");
        assert_eq!(resolved.status, IdentityStatus::Mapped);

        assert_eq!(resolver.to_internal("JAFZA 4-Meter 1"), Some("JAFZA 4"));
        assert_eq!(resolver.to_internal("JAFZA 4"), None);
    }

    #[test]
    fn test_pass_through_keeps_label() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();
        let resolved = resolver.to_external("X").unwrap();
        assert_eq!(resolved.id, "X");
        assert_eq!(resolved.status, IdentityStatus::PassThrough);
    }

    #[test]
    fn test_drop_policy() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::Drop).unwrap();
        assert!(resolver.to_external("X").is_none());
        assert!(resolver.to_external("CGF").is_some());
    }

    #[test]
    fn test_duplicate_external_is_rejected() {
        let mapping: MeterMapping = [("A", "ext"), ("B", "ext")].into_iter().collect();
        let err = MeterIdentityResolver::new(&mapping, UnmappedPolicy::PassThrough).unwrap_err();
        match err {
            MeterDeltaError::DuplicateExternalIdentifier {
                external,
                first,
                second,
            } => {
                assert_eq!(external, "ext");
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_label_is_rejected() {
        let mapping: MeterMapping = [("A", " ")].into_iter().collect();
        assert!(matches!(
            MeterIdentityResolver::new(&mapping, UnmappedPolicy::PassThrough),
            Err(MeterDeltaError::EmptyMeterLabel { .. })
        ));
    }

    #[test]
    fn test_pass_through_cannot_reuse_mapped_identifier() {
        let mapping: MeterMapping = [("A", "B")].into_iter().collect();
        let tracked = vec!["A".to_string(), "B".to_string()];

        let resolver = MeterIdentityResolver::new(&mapping, UnmappedPolicy::PassThrough).unwrap();
        match resolver.check_tracked(&tracked).unwrap_err() {
            MeterDeltaError::DuplicateExternalIdentifier {
                external,
                first,
                second,
            } => {
                assert_eq!(external, "B");
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("unexpected error: {other}"),
        }

        let dropping = MeterIdentityResolver::new(&mapping, UnmappedPolicy::Drop).unwrap();
        assert!(dropping.check_tracked(&tracked).is_ok());
        assert!(resolver.check_tracked(&["A".to_string(), "C".to_string()]).is_ok());
    }

    #[test]
    fn test_passed_through_labels() {
        let tracked = vec!["AFR".to_string(), "X".to_string(), "Y".to_string()];
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();
        assert_eq!(resolver.passed_through(&tracked), vec!["X", "Y"]);

        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::Drop).unwrap();
        assert!(resolver.passed_through(&tracked).is_empty());
    }

    #[test]
    fn test_unsourced_externals() {
        let resolver = MeterIdentityResolver::new(&mapping(), UnmappedPolicy::PassThrough).unwrap();
        let tracked = vec!["AFR".to_string(), "JAFZA 4".to_string()];
        assert_eq!(resolver.unsourced_externals(&tracked), vec!["DWC-CGF-Meter 1"]);
    }
}
