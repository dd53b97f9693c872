//! Property tests for the merge, routing, revision, and history rules.

use pipeline::{
    append_history, Article, HallucinationCheck, Next, Region, ResearchResult, RevisionPolicy,
    RoutingTable, RunState, Stage, StateUpdate, Trend, HISTORY_CAPACITY,
};
use proptest::prelude::*;

fn check_strategy() -> impl Strategy<Value = HallucinationCheck> {
    prop_oneof![
        Just(HallucinationCheck::Pass),
        Just(HallucinationCheck::Fail),
        Just(HallucinationCheck::Unsure),
    ]
}

fn trend_strategy() -> impl Strategy<Value = Trend> {
    ("[A-Za-z ]{1,20}", -10.0f64..10.0)
        .prop_map(|(title, score)| Trend::new(title, "RSS Feed").with_score(score))
}

fn research_strategy() -> impl Strategy<Value = ResearchResult> {
    (
        trend_strategy(),
        proptest::collection::vec("[a-z ]{0,16}", 0..3),
        proptest::collection::vec("https://[a-z]{1,8}\\.com", 0..3),
    )
        .prop_map(|(trend, snippets, urls)| ResearchResult::for_trend(&trend, snippets, urls))
}

fn article_strategy() -> impl Strategy<Value = Article> {
    (research_strategy(), "[a-z ]{0,24}", check_strategy()).prop_map(|(research, body, check)| {
        let mut article = Article::placeholder(&research);
        article.article_body = body;
        article.hallucination_check = check;
        article
    })
}

fn update_strategy() -> impl Strategy<Value = StateUpdate> {
    (
        proptest::option::of(proptest::collection::vec(trend_strategy(), 0..4)),
        proptest::option::of(proptest::collection::vec(trend_strategy(), 0..4)),
        proptest::option::of(proptest::collection::vec(research_strategy(), 0..3)),
        proptest::option::of(proptest::collection::vec(article_strategy(), 0..3)),
        proptest::option::of("[a-z_]{1,12}"),
        proptest::option::of(proptest::collection::vec("[a-z ]{0,10}", 0..3)),
        proptest::option::of(0u32..5),
        proptest::option::of(proptest::collection::vec("[a-z ]{0,10}", 0..3)),
        proptest::option::of(0.0f64..10.0),
    )
        .prop_map(
            |(raw, selected, research, articles, step, errors, revisions, critiques, score)| {
                let mut update = StateUpdate::new();
                if let Some(v) = raw {
                    update = update.raw_trends(v);
                }
                if let Some(v) = selected {
                    update = update.selected_trends(v);
                }
                if let Some(v) = research {
                    update = update.research_results(v);
                }
                if let Some(v) = articles {
                    update = update.articles(v);
                }
                if let Some(v) = step {
                    update = update.current_step(v);
                }
                if let Some(v) = errors {
                    update = update.errors(v);
                }
                if let Some(v) = revisions {
                    update = update.revision_count(v);
                }
                if let Some(v) = critiques {
                    update = update.critiques(v);
                }
                if let Some(v) = score {
                    update = update.evaluation_score(v);
                }
                update
            },
        )
}

fn state_with_checks(checks: &[HallucinationCheck], revision_count: u32) -> RunState {
    let trends: Vec<Trend> = (0..checks.len())
        .map(|i| Trend::new(format!("Story {i}"), "RSS Feed"))
        .collect();
    let research: Vec<ResearchResult> = trends
        .iter()
        .map(|t| ResearchResult::for_trend(t, vec!["snippet".into()], vec![]))
        .collect();
    let articles: Vec<Article> = research
        .iter()
        .zip(checks)
        .map(|(r, c)| {
            let mut a = Article::placeholder(r);
            a.hallucination_check = *c;
            a
        })
        .collect();
    RunState::new(&Region::global(), vec![]).merge(
        StateUpdate::new()
            .selected_trends(trends)
            .research_results(research)
            .articles(articles)
            .revision_count(revision_count),
    )
}

proptest! {
    #[test]
    fn merge_is_idempotent(update in update_strategy()) {
        let base = RunState::new(&Region::global(), vec!["seen".into()]);
        let once = base.clone().merge(update.clone());
        let twice = once.clone().merge(update);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_never_touches_inputs(update in update_strategy()) {
        let base = RunState::new(&Region::new("India").unwrap(), vec!["a".into(), "b".into()]);
        let merged = base.clone().merge(update);
        prop_assert_eq!(merged.region, base.region);
        prop_assert_eq!(merged.history, base.history);
    }

    #[test]
    fn at_limit_verify_always_routes_to_evaluate(
        checks in proptest::collection::vec(check_strategy(), 0..6),
        limit in 0u32..4,
        extra in 0u32..3,
    ) {
        let table = RoutingTable::standard(RevisionPolicy::new(limit));
        let state = state_with_checks(&checks, limit + extra);
        prop_assert_eq!(table.route(Stage::Verify, &state), Ok(Next::Stage(Stage::Evaluate)));
    }

    #[test]
    fn any_empty_snippet_list_routes_back_to_select(
        sizes in proptest::collection::vec(0usize..3, 1..6),
    ) {
        let trends: Vec<Trend> = (0..sizes.len())
            .map(|i| Trend::new(format!("Story {i}"), "RSS Feed"))
            .collect();
        let research: Vec<ResearchResult> = trends
            .iter()
            .zip(&sizes)
            .map(|(t, n)| ResearchResult::for_trend(t, vec!["x".to_string(); *n], vec![]))
            .collect();
        let state = RunState::new(&Region::global(), vec![]).merge(
            StateUpdate::new()
                .selected_trends(trends)
                .research_results(research),
        );
        let expected = if sizes.contains(&0) { Stage::Select } else { Stage::Generate };
        let table = RoutingTable::standard(RevisionPolicy::default());
        prop_assert_eq!(table.route(Stage::Research, &state), Ok(Next::Stage(expected)));
    }

    #[test]
    fn revision_counter_moves_by_at_most_one(
        checks in proptest::collection::vec(check_strategy(), 0..6),
        current in 0u32..4,
        limit in 0u32..4,
    ) {
        let policy = RevisionPolicy::new(limit);
        let articles = state_with_checks(&checks, 0).articles;
        let next = policy.after_verify(current, &articles);
        let has_fail = checks.contains(&HallucinationCheck::Fail);
        if has_fail && current < limit {
            prop_assert_eq!(next, current + 1);
        } else {
            prop_assert_eq!(next, current);
        }
    }

    #[test]
    fn history_is_capped_and_keeps_newest(
        existing in 0usize..150,
        added in 0usize..150,
    ) {
        let history: Vec<String> = (0..existing).map(|i| format!("old {i}")).collect();
        let titles: Vec<String> = (0..added).map(|i| format!("new {i}")).collect();
        let out = append_history(&history, &titles, HISTORY_CAPACITY);

        prop_assert!(out.len() <= HISTORY_CAPACITY);
        prop_assert_eq!(out.len(), (existing + added).min(HISTORY_CAPACITY));
        let combined: Vec<String> = history.iter().chain(&titles).cloned().collect();
        prop_assert_eq!(&out[..], &combined[combined.len() - out.len()..]);
    }
}
