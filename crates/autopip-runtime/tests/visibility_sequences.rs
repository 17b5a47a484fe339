//! Generated hide/show sequences against the full runtime.

use std::sync::Arc;
use std::time::Duration;

use autopip_host::{SimElement, SimHost};
use autopip_runtime::{AutoPip, AutopipConfig};
use proptest::prelude::*;
use tokio::time::sleep;

struct Outcome {
    enter_requests: u32,
    exit_requests: u32,
    pip_active: bool,
}

/// Launch on a visible tab, apply `toggles` (visibility, then the gap before
/// the next one), finish hidden and let everything settle.
fn drive(toggles: &[(bool, u64)]) -> Outcome {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");
    rt.block_on(async {
        let host = SimHost::new("www.youtube.com");
        host.insert_element(".html5-main-video", SimElement::playing(1));
        let host = Arc::new(host);
        let pip = AutoPip::launch(Arc::clone(&host), &AutopipConfig::default()).expect("launch");
        sleep(Duration::from_millis(500)).await;

        for &(visible, gap_ms) in toggles {
            host.set_visible(visible);
            sleep(Duration::from_millis(gap_ms)).await;
        }
        host.set_visible(false);
        sleep(Duration::from_millis(3_000)).await;

        let outcome = Outcome {
            enter_requests: host.enter_requests(),
            exit_requests: host.exit_requests(),
            pip_active: host.pip_element().is_some(),
        };
        pip.teardown().await;
        outcome
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn burst_inside_debounce_window_enters_once(
        toggles in prop::collection::vec((any::<bool>(), 0u64..200), 0..24)
    ) {
        let out = drive(&toggles);
        prop_assert_eq!(out.enter_requests, 1);
        prop_assert_eq!(out.exit_requests, 0);
        prop_assert!(out.pip_active);
    }

    /// Hidden stretches may outlast the debounce window, visible ones never
    /// do: the first settled hidden enters and nothing ever exits.
    #[test]
    fn long_hidden_short_visible_enters_once(
        toggles in prop::collection::vec((any::<bool>(), 0u64..600), 0..24)
            .prop_map(|v| {
                v.into_iter()
                    .map(|(visible, gap)| (visible, if visible { gap % 200 } else { gap }))
                    .collect::<Vec<_>>()
            })
    ) {
        let out = drive(&toggles);
        prop_assert_eq!(out.enter_requests, 1);
        prop_assert_eq!(out.exit_requests, 0);
        prop_assert!(out.pip_active);
    }

    #[test]
    fn requests_alternate_and_end_in_session(
        toggles in prop::collection::vec((any::<bool>(), 0u64..600), 0..16)
    ) {
        let out = drive(&toggles);
        prop_assert!(out.pip_active);
        prop_assert_eq!(out.enter_requests, out.exit_requests + 1);
    }
}
