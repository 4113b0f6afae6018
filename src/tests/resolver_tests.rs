use std::time::Duration;

use crate::descriptor::Descriptor;
use crate::errors::EngineError;
use crate::resolver::CandidateResolver;
use crate::surface::{Surface, WaitState};
use crate::tests::fake_surface::FakeSurface;

fn resolver() -> CandidateResolver {
    CandidateResolver::new(Duration::from_millis(20), Duration::from_millis(10))
}

fn candidates(n: usize) -> Vec<Descriptor> {
    (0..n)
        .map(|i| Descriptor::role("button", &format!("candidate-{i}")))
        .collect()
}

#[tokio::test]
async fn only_visible_candidate_wins_at_every_priority() {
    let list = candidates(5);
    for k in 0..list.len() {
        let surface = FakeSurface::new("page");
        for (i, descriptor) in list.iter().enumerate() {
            surface.add_element(descriptor.clone(), &format!("el-{i}"), i == k);
        }
        let resolved = resolver()
            .resolve(surface.as_ref(), &list)
            .await
            .expect("candidate k should resolve");
        assert_eq!(resolved.index, k);
        assert_eq!(resolved.element.0, format!("el-{k}"));
    }
}

#[tokio::test]
async fn lower_index_wins_when_multiple_visible() {
    let list = candidates(4);
    let surface = FakeSurface::new("page");
    for (i, descriptor) in list.iter().enumerate() {
        // Indices 1 and 3 both visible
        surface.add_element(descriptor.clone(), &format!("el-{i}"), i == 1 || i == 3);
    }
    let resolved = resolver().resolve(surface.as_ref(), &list).await.unwrap();
    assert_eq!(resolved.index, 1);
}

#[tokio::test]
async fn exhaustion_returns_none_not_error() {
    let list = candidates(3);
    let surface = FakeSurface::new("page");
    // Candidates registered but never visible in either phase.
    for (i, descriptor) in list.iter().enumerate() {
        surface.add_element(descriptor.clone(), &format!("el-{i}"), false);
    }
    assert!(resolver().resolve(surface.as_ref(), &list).await.is_none());

    // Entirely unknown candidates behave the same.
    let surface = FakeSurface::new("page");
    assert!(resolver().resolve(surface.as_ref(), &list).await.is_none());
}

#[tokio::test]
async fn empty_candidate_list_is_none() {
    let surface = FakeSurface::new("page");
    assert!(resolver().resolve(surface.as_ref(), &[]).await.is_none());
}

#[tokio::test]
async fn fallback_phase_catches_late_renderer() {
    let list = candidates(2);
    let surface = FakeSurface::new("page");
    // Invisible to probes, appears on the first explicit wait.
    surface.add_appearing_element(list[1].clone(), "late", 0);

    let resolved = resolver().resolve(surface.as_ref(), &list).await.unwrap();
    assert_eq!(resolved.index, 1);
    assert_eq!(resolved.element.0, "late");
    // The fallback wait actually ran for it.
    assert!(surface.wait_count(&list[1]) >= 1);
}

#[tokio::test]
async fn invalid_descriptor_never_blocks_later_candidates() {
    let surface = FakeSurface::new("page");
    let list = vec![
        Descriptor::from("not a descriptor"),
        Descriptor::role("button", "Join"),
    ];
    surface.add_element(list[1].clone(), "join-btn", true);

    // The host errors on the invalid candidate; the visible one still
    // wins on priority.
    let resolved = resolver().resolve(surface.as_ref(), &list).await.unwrap();
    assert_eq!(resolved.index, 1);
    assert_eq!(resolved.element.0, "join-btn");
}

#[tokio::test]
async fn host_errors_are_distinct_conditions() {
    let surface = FakeSurface::new("page");

    let err = surface
        .locate(&Descriptor::from("not a descriptor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDescriptor(_)));

    let err = surface
        .wait_for(
            &Descriptor::role("button", "Join"),
            Duration::from_millis(5),
            WaitState::Visible,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ElementNotFound(_)));
}

#[tokio::test]
async fn probe_phase_skips_fallback_when_visible() {
    let list = candidates(2);
    let surface = FakeSurface::new("page");
    surface.add_element(list[0].clone(), "fast", true);

    let resolved = resolver().resolve(surface.as_ref(), &list).await.unwrap();
    assert_eq!(resolved.index, 0);
    // Resolution came from the probe phase: no sequential waits.
    assert_eq!(surface.wait_count(&list[0]), 0);
    assert_eq!(surface.wait_count(&list[1]), 0);
}
