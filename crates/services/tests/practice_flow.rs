use drill_core::model::{Person, Tense, TestConfig, VerbCategory};
use drill_core::time::fixed_clock;
use drill_core::AnswerFeedback;
use services::{PracticeError, QuizServices, StaticCatalogSource, StatisticsFilter};

const CATALOG: &str = r#"[
    {
        "infinitive": "gehen",
        "english_translation": "to go",
        "verb_type": "strong",
        "stem": "geh",
        "difficulty_level": 2,
        "conjugations": {
            "präsens": { "ich": "gehe", "du": "gehst" },
            "präteritum": { "ich": "ging", "du": "gingst" }
        }
    },
    {
        "infinitive": "machen",
        "english_translation": "to make",
        "verb_type": "weak",
        "stem": "mach",
        "difficulty_level": 1,
        "conjugations": {
            "präsens": { "ich": "mache", "du": "machst" },
            "präteritum": { "ich": "machte", "du": "machtest" }
        }
    }
]"#;

async fn loaded_services() -> QuizServices {
    let services = QuizServices::in_memory(fixed_clock());
    let source = StaticCatalogSource::from_json(CATALOG).unwrap();
    assert_eq!(services.load_catalog(&source).await.unwrap(), 2);
    services
}

#[tokio::test]
async fn practice_before_catalog_load_is_refused() {
    let services = QuizServices::in_memory(fixed_clock());
    let config = TestConfig::new([Tense::Praesens], [VerbCategory::Weak], [Person::Ich], 1);
    assert!(matches!(
        services.practice().start(config),
        Err(PracticeError::CatalogNotReady)
    ));
}

#[tokio::test]
async fn conjugation_run_feeds_ledger_and_statistics() {
    let services = loaded_services().await;
    let practice = services.practice();
    let config = TestConfig::new(
        [Tense::Praesens, Tense::Praeteritum],
        [VerbCategory::Strong, VerbCategory::Weak],
        [Person::Ich, Person::Du],
        8,
    );

    let mut run = practice.start(config).unwrap();
    assert_eq!(run.questions().len(), 8);

    // Answer half correctly, one near miss, the rest wrong.
    let questions = run.questions().to_vec();
    for (index, question) in questions.iter().enumerate() {
        let answer = match index {
            0..=3 => question.correct_answer().to_owned(),
            4 => format!("{}e", question.correct_answer()),
            _ => "falsch".to_owned(),
        };
        let feedback = run.answer(question.id(), answer).unwrap();
        let expected = match index {
            0..=3 => AnswerFeedback::Correct,
            4 => AnswerFeedback::Close,
            _ => AnswerFeedback::Wrong,
        };
        assert_eq!(feedback, expected, "question {index}");
    }

    let attempt = practice.finish(run).await.unwrap();
    assert_eq!(attempt.score(), 4);
    assert!((attempt.percentage() - 50.0).abs() < f64::EPSILON);
    assert!(!attempt.is_synced());

    let ledger = services.ledger();
    assert_eq!(ledger.get(attempt.id()).await, Some(attempt.clone()));
    assert_eq!(ledger.unsynced().await, vec![attempt]);

    let stats = ledger.statistics(&StatisticsFilter::all()).await;
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.total_questions, 8);
    assert_eq!(stats.by_tense.values().map(|b| b.attempted).sum::<u32>(), 8);
    assert_eq!(stats.by_person.values().map(|b| b.attempted).sum::<u32>(), 8);
    assert!(stats.trend.is_none());
}

#[tokio::test]
async fn vocabulary_run_uses_loose_matching_and_skips_breakdowns() {
    let services = loaded_services().await;
    let practice = services.practice();
    let config = TestConfig::vocabulary([VerbCategory::Strong, VerbCategory::Weak], 5);

    let mut run = practice.start(config).unwrap();
    assert_eq!(run.questions().len(), 2);
    let questions = run.questions().to_vec();
    for question in &questions {
        let answer = question.correct_answer().trim_start_matches("to ").to_uppercase();
        assert_eq!(
            run.answer(question.id(), answer).unwrap(),
            AnswerFeedback::Correct
        );
    }

    let attempt = practice.finish(run).await.unwrap();
    assert_eq!(attempt.score(), 2);

    let stats = services.ledger().statistics(&StatisticsFilter::all()).await;
    assert_eq!(stats.total_correct, 2);
    assert!(stats.by_tense.is_empty());
    assert!(stats.by_category.is_empty());
}

#[tokio::test]
async fn failed_reload_blocks_practice_until_a_good_load() {
    let services = loaded_services().await;
    let config = TestConfig::new([Tense::Praesens], [VerbCategory::Weak], [Person::Ich], 1);
    assert!(services.practice().start(config.clone()).is_ok());

    let broken = CATALOG.replace("\"stem\": \"mach\"", "\"stem\": \"\"");
    let source = StaticCatalogSource::from_json(&broken).unwrap();
    assert!(services.reload_catalog(&source).await.is_err());
    assert!(matches!(
        services.practice().start(config.clone()),
        Err(PracticeError::CatalogNotReady)
    ));

    let good = StaticCatalogSource::from_json(CATALOG).unwrap();
    assert_eq!(services.reload_catalog(&good).await.unwrap(), 2);
    assert!(services.practice().start(config).is_ok());
}
