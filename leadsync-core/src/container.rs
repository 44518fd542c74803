//! Bijection between canonical statuses and task-store containers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::CanonicalStatus;
use crate::types::ContainerId;

#[derive(Debug, Clone, Deserialize)]
struct RawContainerMap {
    new: ContainerId,
    contacted: ContainerId,
    qualified: ContainerId,
    lost: ContainerId,
}

/// The four container ids, one per [`CanonicalStatus`].
///
/// Construction rejects empty or repeated ids, so `container_for` and
/// `status_for` are mutual inverses over the mapped containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawContainerMap")]
pub struct ContainerMap {
    new: ContainerId,
    contacted: ContainerId,
    qualified: ContainerId,
    lost: ContainerId,
}

impl TryFrom<RawContainerMap> for ContainerMap {
    type Error = CoreError;

    fn try_from(raw: RawContainerMap) -> Result<Self, Self::Error> {
        ContainerMap::new(raw.new, raw.contacted, raw.qualified, raw.lost)
    }
}

impl ContainerMap {
    pub fn new(
        new: impl Into<ContainerId>,
        contacted: impl Into<ContainerId>,
        qualified: impl Into<ContainerId>,
        lost: impl Into<ContainerId>,
    ) -> Result<Self, CoreError> {
        let map = Self {
            new: new.into(),
            contacted: contacted.into(),
            qualified: qualified.into(),
            lost: lost.into(),
        };
        map.validate()?;
        Ok(map)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let ids: Vec<&ContainerId> = CanonicalStatus::ALL
            .iter()
            .map(|s| self.container_for(*s))
            .collect();
        for (i, id) in ids.iter().enumerate() {
            if id.0.trim().is_empty() {
                return Err(CoreError::InvalidContainerMap(format!(
                    "container for {} is empty",
                    CanonicalStatus::ALL[i]
                )));
            }
            if let Some(j) = ids[..i].iter().position(|other| other == id) {
                return Err(CoreError::InvalidContainerMap(format!(
                    "{} and {} share container '{}'",
                    CanonicalStatus::ALL[j],
                    CanonicalStatus::ALL[i],
                    id
                )));
            }
        }
        Ok(())
    }

    pub fn container_for(&self, status: CanonicalStatus) -> &ContainerId {
        match status {
            CanonicalStatus::New => &self.new,
            CanonicalStatus::Contacted => &self.contacted,
            CanonicalStatus::Qualified => &self.qualified,
            CanonicalStatus::Lost => &self.lost,
        }
    }

    /// `None` for a container outside the mapped four (e.g. an unrelated list).
    pub fn status_for(&self, container: &ContainerId) -> Option<CanonicalStatus> {
        CanonicalStatus::ALL
            .into_iter()
            .find(|s| self.container_for(*s) == container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shared_container() {
        let err = ContainerMap::new("a", "b", "a", "d").unwrap_err();
        assert!(err.to_string().contains("NEW and QUALIFIED"));
    }

    #[test]
    fn rejects_empty_container() {
        let err = ContainerMap::new("a", " ", "c", "d").unwrap_err();
        assert!(err.to_string().contains("CONTACTED"));
    }

    #[test]
    fn unknown_container_has_no_status() {
        let map = ContainerMap::new("a", "b", "c", "d").unwrap();
        assert_eq!(map.status_for(&ContainerId::from("archive")), None);
    }

    #[test]
    fn yaml_deserialization_validates() {
        let ok: ContainerMap =
            serde_yaml::from_str("new: a\ncontacted: b\nqualified: c\nlost: d\n").unwrap();
        assert_eq!(ok.container_for(CanonicalStatus::Lost), &ContainerId::from("d"));

        let bad = serde_yaml::from_str::<ContainerMap>("new: a\ncontacted: a\nqualified: c\nlost: d\n");
        assert!(bad.is_err());
    }
}
