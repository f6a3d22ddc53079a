use karenina_core::checkpoint::{Author, DatasetMetadata, RatingType};
use karenina_core::{
    jsonld_to_v2, parse_jsonld_checkpoint, v2_to_jsonld, validate_jsonld_checkpoint,
    CallableTrait, CheckpointItem, LlmRubricTrait, MetricEvaluationMode, MetricRubricTrait,
    RegexTrait, Rubric, TraitKind, UnifiedCheckpoint,
};
use serde_json::{json, Map};

fn every_trait_kind() -> Rubric {
    let mut deep = LlmRubricTrait::score("depth", "How deep is the analysis?", 1, 10);
    deep.higher_is_better = false;
    deep.deep_judgment_enabled = Some(true);
    deep.deep_judgment_excerpt_enabled = Some(true);
    deep.deep_judgment_max_excerpts = Some(5);
    deep.deep_judgment_fuzzy_match_threshold = Some(0.75);
    deep.deep_judgment_excerpt_retry_attempts = Some(2);
    deep.deep_judgment_search_enabled = Some(false);

    Rubric {
        llm_traits: vec![
            LlmRubricTrait::boolean("safe", "Is the answer safe?"),
            LlmRubricTrait::score("clarity", "How clear is the answer?", 1, 5),
            deep,
        ],
        regex_traits: vec![RegexTrait {
            name: "cites_doi".to_string(),
            description: Some("Mentions a DOI".to_string()),
            pattern: r"10\.\d{4,9}/\S+".to_string(),
            case_sensitive: false,
            invert_result: false,
            higher_is_better: true,
        }],
        callable_traits: vec![
            CallableTrait {
                name: "short".to_string(),
                description: None,
                kind: TraitKind::Boolean,
                callable_code: "def check(text):\n    return len(text) < 500\n".to_string(),
                min_score: None,
                max_score: None,
                invert_result: true,
                higher_is_better: true,
            },
            CallableTrait {
                name: "length_score".to_string(),
                description: Some("Length bucket".to_string()),
                kind: TraitKind::Score,
                callable_code: "def score(text):\n    return min(len(text) // 100, 5)\n".to_string(),
                min_score: Some(0),
                max_score: Some(5),
                invert_result: false,
                higher_is_better: false,
            },
        ],
        metric_traits: vec![MetricRubricTrait {
            name: "coverage".to_string(),
            description: None,
            evaluation_mode: MetricEvaluationMode::FullMatrix,
            metrics: vec!["precision".to_string(), "recall".to_string(), "f1".to_string()],
            tp_instructions: vec!["mentions BCL2".to_string()],
            tn_instructions: vec!["does not mention MCL1".to_string()],
            repeated_extraction: Some(true),
            higher_is_better: true,
        }],
    }
}

fn item(question: &str, rubric: Option<Rubric>) -> CheckpointItem {
    CheckpointItem {
        question: question.to_string(),
        raw_answer: "BCL2".to_string(),
        original_answer_template: "class Answer(BaseAnswer):\n    target: str\n".to_string(),
        answer_template: "class Answer(BaseAnswer):\n    target: str = Field(...)\n".to_string(),
        last_modified: "2026-05-02T09:30:00Z".to_string(),
        finished: true,
        question_rubric: rubric,
        date_created: Some("2026-05-01T08:00:00Z".to_string()),
        author: Some(Author {
            name: "Ada".to_string(),
            url: None,
            email: Some("ada@example.org".to_string()),
        }),
        keywords: vec!["oncology".to_string()],
        custom_metadata: Some(Map::from_iter([("difficulty".to_string(), json!("hard"))])),
        few_shot_examples: Some(vec![json!({ "question": "Q?", "answer": "A" })]),
    }
}

fn sample_checkpoint() -> UnifiedCheckpoint {
    let mut cp = UnifiedCheckpoint {
        dataset_metadata: Some(DatasetMetadata {
            name: Some("Drug targets".to_string()),
            description: Some("Approved targets of small molecules".to_string()),
            version: Some("1.2.0".to_string()),
            creator: Some("Karenina".to_string()),
            date_created: Some("2026-05-01T08:00:00Z".to_string()),
            date_modified: Some("2026-05-02T09:30:00Z".to_string()),
        }),
        global_rubric: Some(every_trait_kind()),
        ..UnifiedCheckpoint::default()
    };
    cp.add_question(item("What is the target of Venetoclax?", Some(every_trait_kind())));
    cp.add_question(item("What is the target of Imatinib?", None));
    cp
}

#[test]
fn every_trait_kind_roundtrips() {
    let original = sample_checkpoint();
    let doc = v2_to_jsonld(&original).expect("to jsonld");
    let back = jsonld_to_v2(&doc).expect("to v2");
    assert_eq!(back, original);
}

#[test]
fn lookaround_and_backreference_patterns_roundtrip() {
    let mut original = sample_checkpoint();
    let global = original.global_rubric.get_or_insert_with(Rubric::default);
    global.regex_traits = vec![
        RegexTrait {
            name: "px".to_string(),
            description: None,
            pattern: r"\d+(?=px)".to_string(),
            case_sensitive: true,
            invert_result: false,
            higher_is_better: true,
        },
        RegexTrait {
            name: "repeated_word".to_string(),
            description: Some("Doubled word".to_string()),
            pattern: r"\b(\w+)\s+\1\b".to_string(),
            case_sensitive: false,
            invert_result: true,
            higher_is_better: false,
        },
    ];

    let back = jsonld_to_v2(&v2_to_jsonld(&original).unwrap()).unwrap();
    assert_eq!(back, original);
}

#[test]
fn boolean_traits_keep_declared_bounds() {
    let mut safe = LlmRubricTrait::boolean("safe", "Is the answer safe?");
    safe.min_score = Some(1);
    safe.max_score = Some(5);
    let mut original = sample_checkpoint();
    let global = original.global_rubric.get_or_insert_with(Rubric::default);
    global.llm_traits = vec![safe];
    global.callable_traits = vec![CallableTrait {
        name: "short".to_string(),
        description: None,
        kind: TraitKind::Boolean,
        callable_code: "gASVAAAA".to_string(),
        min_score: Some(0),
        max_score: None,
        invert_result: false,
        higher_is_better: true,
    }];

    let doc = v2_to_jsonld(&original).unwrap();
    let safe_rating = doc.rating.iter().find(|r| r.name == "safe").unwrap();
    assert_eq!(safe_rating.best_rating, Some(serde_json::Number::from(1)));
    assert_eq!(safe_rating.property("max_score"), Some(&json!(5)));

    let back = jsonld_to_v2(&doc).unwrap();
    assert_eq!(back, original);
}

#[test]
fn roundtrip_through_serialized_text() {
    let original = sample_checkpoint();
    let doc = v2_to_jsonld(&original).expect("to jsonld");
    let text = serde_json::to_string_pretty(&doc).expect("serialize");
    let back = parse_jsonld_checkpoint(&text).expect("parse");
    assert_eq!(back, original);
}

#[test]
fn global_and_question_ratings_are_placed_by_scope() {
    let doc = v2_to_jsonld(&sample_checkpoint()).expect("to jsonld");
    assert_eq!(doc.rating.len(), 8);
    assert!(doc
        .rating
        .iter()
        .all(|r| r.rating_type().is_some_and(|t| t.is_global())));

    let with_rubric = doc
        .data_feed_element
        .iter()
        .find(|f| !f.item.rating.is_empty())
        .expect("question with rubric");
    assert!(with_rubric
        .item
        .rating
        .iter()
        .all(|r| r.rating_type().is_some_and(|t| !t.is_global())));

    let kinds: Vec<RatingType> = doc.rating.iter().filter_map(|r| r.rating_type()).collect();
    for expected in [
        RatingType::GlobalRubricTrait,
        RatingType::GlobalRegexTrait,
        RatingType::GlobalCallableTrait,
        RatingType::GlobalMetricRubricTrait,
    ] {
        assert!(kinds.contains(&expected), "missing {expected}");
    }
}

#[test]
fn higher_is_better_defaults_when_absent() {
    let doc = json!({
        "@context": { "@vocab": "http://schema.org/" },
        "@type": "DataFeed",
        "rating": [
            {
                "@type": "Rating",
                "name": "cites_doi",
                "additionalType": "GlobalRegexTrait",
                "bestRating": 1,
                "worstRating": 0,
                "additionalProperty": [
                    { "@type": "PropertyValue", "name": "pattern", "value": "10\\." }
                ]
            }
        ],
        "dataFeedElement": []
    });
    let cp = parse_jsonld_checkpoint(&doc.to_string()).expect("parse");
    let rubric = cp.global_rubric.expect("global rubric");
    assert!(rubric.regex_traits[0].higher_is_better);
    assert!(rubric.regex_traits[0].case_sensitive);
}

#[test]
fn validation_lists_every_violation() {
    let doc = json!({
        "@type": "DataFeed",
        "rating": [
            { "@type": "Rating", "name": "a", "additionalType": "GlobalLLMTrait" },
            { "@type": "Rating", "name": "b", "additionalType": "QuestionTrait" }
        ]
    });
    let err = validate_jsonld_checkpoint(&doc).expect_err("invalid");
    assert_eq!(err.violations.len(), 3);
    let msg = err.to_string();
    assert!(msg.contains("dataFeedElement"));
    assert!(msg.contains("GlobalLLMTrait"));
    assert!(msg.contains("QuestionTrait"));
}

#[test]
fn scored_trait_with_inverted_bounds_is_rejected_on_export() {
    let mut cp = sample_checkpoint();
    if let Some(rubric) = cp.global_rubric.as_mut() {
        rubric.llm_traits[1].min_score = Some(5);
        rubric.llm_traits[1].max_score = Some(1);
        rubric.callable_traits[1].max_score = None;
    }
    let err = v2_to_jsonld(&cp).expect_err("bounds");
    assert_eq!(err.violations.len(), 2);
    assert!(err.violations.iter().all(|v| v.starts_with("global rubric: trait")));
}
