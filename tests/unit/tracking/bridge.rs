use super::*;
use crate::foundation::core::Vec3;

fn found(z: f64) -> Detection {
    Detection::found(PoseTransform::at(Vec3::new(0.0, 0.0, z)))
}

fn run(seq: &[bool], mode: PlaybackMode) -> Vec<Option<PlaybackEffect>> {
    let mut bridge = PoseBridge::new(mode);
    seq.iter()
        .map(|&f| {
            let det = if f { found(-2.0) } else { Detection::NotFound };
            bridge.update(&det).effect
        })
        .collect()
}

#[test]
fn transition_table() {
    use PlaybackMode::*;
    use Visibility::*;

    let s = step(NotFound, true, MarkerDriven);
    assert_eq!(
        (s.state, s.transition, s.effect),
        (Found, Some(Transition::Found), Some(PlaybackEffect::Play))
    );
    let s = step(Found, false, MarkerDriven);
    assert_eq!(
        (s.state, s.transition, s.effect),
        (NotFound, Some(Transition::Lost), Some(PlaybackEffect::Pause))
    );
    assert_eq!(step(Found, true, MarkerDriven).transition, None);
    assert_eq!(step(NotFound, false, MarkerDriven).transition, None);

    let s = step(NotFound, true, Autoplay);
    assert_eq!((s.transition, s.effect), (Some(Transition::Found), None));
    let s = step(Found, false, Autoplay);
    assert_eq!((s.transition, s.effect), (Some(Transition::Lost), None));
}

#[test]
fn one_effect_per_contiguous_run() {
    // Deterministic pseudo-random visibility sequences.
    let mut seed = 0x2545_f491_u32;
    for _ in 0..50 {
        let seq: Vec<bool> = (0..200)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed % 3 != 0
            })
            .collect();
        let effects = run(&seq, PlaybackMode::MarkerDriven);

        let mut prev = false;
        for (i, &f) in seq.iter().enumerate() {
            let expected = match (prev, f) {
                (false, true) => Some(PlaybackEffect::Play),
                (true, false) => Some(PlaybackEffect::Pause),
                _ => None,
            };
            assert_eq!(effects[i], expected, "frame {i}");
            prev = f;
        }
    }
}

#[test]
fn autoplay_never_issues_commands() {
    let effects = run(&[true, true, false, true, false, false], PlaybackMode::Autoplay);
    assert!(effects.iter().all(Option::is_none));
}

#[test]
fn anchor_follows_found_frames_without_retriggering() {
    let mut bridge = PoseBridge::new(PlaybackMode::MarkerDriven);
    assert!(bridge.anchor().is_none());

    assert_eq!(bridge.update(&found(-2.0)).effect, Some(PlaybackEffect::Play));
    assert_eq!(bridge.update(&found(-3.0)).effect, None);
    assert_eq!(bridge.anchor().map(|p| p.position.z), Some(-3.0));
    assert_eq!(bridge.visibility(), Visibility::Found);

    bridge.update(&Detection::NotFound);
    assert!(bridge.anchor().is_none());
}
