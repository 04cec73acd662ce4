use proptest::prelude::*;

use skill_forge::core::draft::{Draft, check_structure, parse_procedure, slugify};
use skill_forge::core::outcome::tail;
use skill_forge::test_utils::fixtures::sample_skill_md;

fn arb_command() -> impl Strategy<Value = String> {
    r"[a-z][a-z0-9]{0,8}( [a-z0-9./=-]{1,12}){0,3}"
}

proptest! {
    #[test]
    fn procedure_commands_survive_parsing(commands in prop::collection::vec(arb_command(), 1..8)) {
        let refs: Vec<&str> = commands.iter().map(String::as_str).collect();
        let md = sample_skill_md("prop-skill", "prop", &refs);

        let procedure = parse_procedure(&md).unwrap();
        prop_assert_eq!(procedure.commands(), commands.clone());
        prop_assert_eq!(procedure.steps.len(), commands.len());
        for (idx, _) in commands.iter().enumerate() {
            prop_assert_eq!(procedure.step_for_command(idx), Some(idx + 1));
        }
        prop_assert!(check_structure(&md).is_valid());
    }

    #[test]
    fn arbitrary_text_never_panics(text in ".{0,400}") {
        let _ = check_structure(&text);
        let _ = parse_procedure(&text);
        let draft = Draft::from_markdown("topic", &text);
        prop_assert!(!draft.name.is_empty());
    }

    #[test]
    fn slugs_are_lowercase_and_trimmed(text in ".{0,60}") {
        let slug = slugify(&text);
        prop_assert!(!slug.is_empty());
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
    }

    #[test]
    fn tail_is_a_suffix_within_budget(text in ".{0,200}", max in 0usize..120) {
        let cut = tail(&text, max);
        prop_assert!(text.ends_with(cut));
        prop_assert!(cut.len() <= max);
    }
}
