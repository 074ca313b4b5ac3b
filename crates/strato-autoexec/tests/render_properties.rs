//! Property tests for the renderer: grouping by origin is independent of
//! insertion interleaving, and rendering is a pure function of composer state.

use proptest::prelude::*;

use strato_autoexec::{Banners, Origin, ScriptComposer};

const ORIGINS: [Origin; 3] = [Origin::PreGenerated, Origin::UserConfig, Origin::PostGenerated];

fn origin_strategy() -> impl Strategy<Value = Origin> {
    prop_oneof![
        Just(Origin::PreGenerated),
        Just(Origin::UserConfig),
        Just(Origin::PostGenerated),
    ]
}

fn line_strategy() -> impl Strategy<Value = String> {
    // Printable ASCII, including the empty line.
    "[ -~]{0,16}"
}

proptest! {
    #[test]
    fn interleaving_never_changes_the_rendered_grouping(
        ops in proptest::collection::vec((origin_strategy(), line_strategy()), 0..24),
    ) {
        let mut interleaved = ScriptComposer::default();
        for (origin, line) in &ops {
            interleaved.add_line(*origin, line.clone());
        }

        // The same lines, inserted strictly one origin after another.
        let mut grouped = ScriptComposer::default();
        for target in ORIGINS {
            for (origin, line) in &ops {
                if *origin == target {
                    grouped.add_line(target, line.clone());
                }
            }
        }

        prop_assert_eq!(
            interleaved.render(&Banners::default()),
            grouped.render(&Banners::default())
        );
    }

    #[test]
    fn rendered_sections_appear_in_fixed_order(
        ops in proptest::collection::vec((origin_strategy(), "[A-Z]{1,8}"), 1..16),
    ) {
        let mut composer = ScriptComposer::default();
        for (origin, line) in &ops {
            composer.add_line(*origin, line.clone());
        }
        let rendered = composer.render(&Banners::default());

        // Scanning the output with a forward-only cursor, every line must be
        // reachable in pre/user/post order, whatever order it was added in.
        let mut cursor = 0;
        for target in ORIGINS {
            for (origin, line) in &ops {
                if *origin != target {
                    continue;
                }
                let needle = format!("{line}\r\n");
                let found = rendered[cursor..].find(&needle);
                prop_assert!(
                    found.is_some(),
                    "line {:?} of {:?} missing after offset {}",
                    line,
                    target,
                    cursor
                );
                cursor += found.unwrap() + needle.len();
            }
        }
    }

    #[test]
    fn rendering_is_referentially_transparent(
        echo_off in any::<bool>(),
        vars in proptest::collection::btree_map("[A-Z]{1,6}", "[ -~]{1,8}", 0..4),
        ops in proptest::collection::vec((origin_strategy(), line_strategy()), 0..16),
    ) {
        let mut composer = ScriptComposer::default();
        composer.set_echo_off(echo_off);
        for (name, value) in &vars {
            composer.set_variable(name, value).unwrap();
        }
        for (origin, line) in &ops {
            composer.add_line(*origin, line.clone());
        }

        let banners = Banners::default();
        let first = composer.render(&banners);
        let second = composer.render(&banners);
        prop_assert_eq!(first, second);
    }
}
