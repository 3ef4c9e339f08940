//! Property-based tests for knowledge lookup

use super::*;
use proptest::prelude::*;

fn arb_phrase() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z]{3,8}", 1..4).prop_map(|words| words.join(" "))
}

fn arb_intents() -> impl Strategy<Value = Vec<IntentRecord>> {
    proptest::collection::vec(
        (
            proptest::collection::vec(arb_phrase(), 1..4),
            proptest::collection::vec("[A-Z][a-z ]{5,30}\\.", 1..3),
        )
            .prop_map(|(patterns, responses)| IntentRecord {
                tag: None,
                patterns,
                responses,
            }),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Any indexed pattern, in any case and padding, resolves to its own answer at 100
    #[test]
    fn prop_exact_pattern_resolves_to_its_answer(
        intents in arb_intents(),
        pick in any::<prop::sample::Index>(),
        upper in any::<bool>(),
    ) {
        let index = KnowledgeIndex::build(&intents).unwrap();
        let patterns: Vec<String> = index.patterns().map(String::from).collect();
        let pattern = pick.get(&patterns).clone();
        let query = if upper {
            format!("  {}  ", pattern.to_uppercase())
        } else {
            pattern.clone()
        };
        let expected = index
            .answer_for(&pattern, ResponseSelection::First)
            .unwrap()
            .to_string();

        match resolve(&query, &index, DEFAULT_MATCH_THRESHOLD, ResponseSelection::First) {
            Resolution::Match { answer, score, .. } => {
                prop_assert_eq!(score, 100);
                prop_assert_eq!(answer, expected);
            }
            Resolution::NoMatch { best_score } => {
                prop_assert!(false, "no match for {:?}, best {:?}", query, best_score);
            }
        }
    }

    // A threshold at or above every key's score always yields NoMatch
    #[test]
    fn prop_threshold_at_best_score_rejects(
        intents in arb_intents(),
        query in "[a-z ]{0,30}",
    ) {
        let index = KnowledgeIndex::build(&intents).unwrap();
        let best = index
            .patterns()
            .map(|p| matching::weighted_ratio(&query, p))
            .max()
            .unwrap_or(0);

        let resolution = resolve(&query, &index, best, ResponseSelection::First);
        prop_assert!(resolution.answer().is_none());
    }

    // Scores stay within 0..=100 and are symmetric in identical inputs
    #[test]
    fn prop_scores_bounded(a in ".{0,40}", b in ".{0,40}") {
        let score = matching::weighted_ratio(&a, &b);
        prop_assert!(score <= 100);
        prop_assert_eq!(matching::weighted_ratio(&a, &a) == 100, !matching::process(&a).is_empty());
    }

    // Matches never return text that is not one of the dataset's responses
    #[test]
    fn prop_rotating_answers_come_from_dataset(
        intents in arb_intents(),
        query in arb_phrase(),
    ) {
        let index = KnowledgeIndex::build(&intents).unwrap();
        if let Resolution::Match { answer, .. } =
            resolve(&query, &index, 0, ResponseSelection::Rotate)
        {
            prop_assert!(intents.iter().any(|i| i.responses.contains(&answer)));
        }
    }
}
