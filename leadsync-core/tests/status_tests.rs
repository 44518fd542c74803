//! Status normalization and the status ↔ container bijection.

use leadsync_core::status::{lookup, normalize};
use leadsync_core::{CanonicalStatus, ContainerId, ContainerMap, StatusNormalizer, UnknownStatusPolicy};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Synonym table
// ---------------------------------------------------------------------------

#[rstest]
#[case("NEW", CanonicalStatus::New)]
#[case("new", CanonicalStatus::New)]
#[case("New", CanonicalStatus::New)]
#[case("TODO", CanonicalStatus::New)]
#[case("to do", CanonicalStatus::New)]
#[case("pending", CanonicalStatus::New)]
#[case("CONTACTED", CanonicalStatus::Contacted)]
#[case("IN_PROGRESS", CanonicalStatus::Contacted)]
#[case("in progress", CanonicalStatus::Contacted)]
#[case("in-progress", CanonicalStatus::Contacted)]
#[case("InProgress", CanonicalStatus::Contacted)]
#[case("working", CanonicalStatus::Contacted)]
#[case("active", CanonicalStatus::Contacted)]
#[case("reach out", CanonicalStatus::Contacted)]
#[case("QUALIFIED", CanonicalStatus::Qualified)]
#[case("done", CanonicalStatus::Qualified)]
#[case("complete", CanonicalStatus::Qualified)]
#[case("Completed", CanonicalStatus::Qualified)]
#[case("finished", CanonicalStatus::Qualified)]
#[case("won", CanonicalStatus::Qualified)]
#[case("success", CanonicalStatus::Qualified)]
#[case("LOST", CanonicalStatus::Lost)]
#[case("rejected", CanonicalStatus::Lost)]
#[case("cancelled", CanonicalStatus::Lost)]
#[case("closed-lost", CanonicalStatus::Lost)]
#[case("dead", CanonicalStatus::Lost)]
#[case("  qualified \t", CanonicalStatus::Qualified)]
fn synonyms_map_to_canonical(#[case] raw: &str, #[case] expected: CanonicalStatus) {
    assert_eq!(normalize(raw), expected);
    assert_eq!(lookup(raw), Some(expected));
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("RANDOM")]
#[case("qualifed")]
#[case("¯\\_(ツ)_/¯")]
#[case("new lead!!")]
fn unknown_and_empty_default_to_new(#[case] raw: &str) {
    assert_eq!(normalize(raw), CanonicalStatus::New);
    assert_eq!(
        StatusNormalizer::default().try_normalize(raw).unwrap(),
        CanonicalStatus::New
    );
}

#[test]
fn normalization_is_total_over_arbitrary_input() {
    let samples = (0u32..512)
        .filter_map(char::from_u32)
        .map(|c| format!("{c}{c} status"));
    for raw in samples {
        assert!(CanonicalStatus::ALL.contains(&normalize(&raw)), "{raw:?}");
    }
}

#[test]
fn reject_policy_refuses_unknown_but_accepts_empty() {
    let strict = StatusNormalizer::new(UnknownStatusPolicy::Reject);
    assert!(strict.try_normalize("maybe later").is_err());
    assert_eq!(strict.try_normalize("").unwrap(), CanonicalStatus::New);
    assert_eq!(strict.try_normalize("won").unwrap(), CanonicalStatus::Qualified);
    // The total form ignores the policy.
    assert_eq!(strict.normalize("maybe later"), CanonicalStatus::New);
}

// ---------------------------------------------------------------------------
// Status ↔ container
// ---------------------------------------------------------------------------

fn board() -> ContainerMap {
    ContainerMap::new("list-todo", "list-doing", "list-done", "list-lost").expect("map")
}

#[rstest]
#[case(CanonicalStatus::New, "list-todo")]
#[case(CanonicalStatus::Contacted, "list-doing")]
#[case(CanonicalStatus::Qualified, "list-done")]
#[case(CanonicalStatus::Lost, "list-lost")]
fn status_and_container_are_mutual_inverses(
    #[case] status: CanonicalStatus,
    #[case] container: &str,
) {
    let map = board();
    assert_eq!(map.container_for(status), &ContainerId::from(container));
    assert_eq!(map.status_for(&ContainerId::from(container)), Some(status));
    assert_eq!(map.status_for(map.container_for(status)), Some(status));
}

#[test]
fn every_container_maps_back_to_a_distinct_status() {
    let map = board();
    let mut seen = Vec::new();
    for status in CanonicalStatus::ALL {
        let back = map.status_for(map.container_for(status)).expect("mapped");
        assert!(!seen.contains(&back));
        seen.push(back);
    }
    assert_eq!(seen.len(), 4);
}
