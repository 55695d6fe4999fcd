use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docqa::{
    ChatModel, Config, Embedder, Error, ImageEmbedder, ImageRef, IndexState, Message,
    Orchestrator, PromptKind, Response, ResponseKind, TextEngine, TextEngineOptions,
    UploadedFile, FALLBACK_ANSWER,
};
use tempfile::{tempdir, TempDir};

const VOCAB: [&str; 4] = ["hemoglobin", "cholesterol", "glucose", "platelet"];

/// Bag-of-words over a tiny vocabulary, enough to make retrieval deterministic.
struct KeywordEmbedder {
    fail: bool,
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> docqa::Result<Vec<Vec<f32>>> {
        if self.fail {
            return Err(Error::Embedding("embedding service down".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect()
            })
            .collect())
    }
}

#[derive(Clone, Default)]
struct RecordingChat {
    answer: String,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ChatModel for RecordingChat {
    fn complete(&self, messages: &[Message]) -> docqa::Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(self.answer.clone())
    }
}

/// Puts images named like the query's subject first.
#[derive(Clone, Default)]
struct NameImageEmbedder {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

fn subject_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    vec![
        if lower.contains("x-ray") || lower.contains("xray") { 1.0 } else { 0.0 },
        if lower.contains("mri") { 1.0 } else { 0.0 },
        0.1,
    ]
}

impl ImageEmbedder for NameImageEmbedder {
    fn embed_text(&self, text: &str) -> docqa::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Embedding("vision model unavailable".to_string()));
        }
        Ok(subject_vector(text))
    }

    fn embed_images(&self, images: &[ImageRef]) -> docqa::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(images.iter().map(|img| subject_vector(&img.name)).collect())
    }
}

struct Harness {
    _tmp: TempDir,
    cfg: Config,
    chat: RecordingChat,
    images: NameImageEmbedder,
    orchestrator: Orchestrator,
}

fn harness_with(answer: &str, embed_fails: bool, images: NameImageEmbedder, image_top_k: usize) -> Harness {
    let tmp = tempdir().unwrap();
    let cfg = Config {
        data_dir: tmp.path().join("data"),
        chunk_size: 200,
        chunk_overlap: 20,
        top_k: 2,
        image_top_k,
        ..Config::default()
    };
    let chat = RecordingChat {
        answer: answer.to_string(),
        ..RecordingChat::default()
    };
    let text = TextEngine::new(
        Box::new(KeywordEmbedder { fail: embed_fails }),
        Box::new(chat.clone()),
        TextEngineOptions::from(&cfg),
    );
    let orchestrator = Orchestrator::new(text, Box::new(images.clone()), &cfg);
    Harness {
        _tmp: tmp,
        cfg,
        chat,
        images,
        orchestrator,
    }
}

fn harness(answer: &str) -> Harness {
    harness_with(answer, false, NameImageEmbedder::default(), 2)
}

fn file(name: &str, body: &str) -> UploadedFile {
    UploadedFile::new(name, body.as_bytes().to_vec())
}

fn report_batch() -> Vec<UploadedFile> {
    vec![
        file("blood.txt", "Hemoglobin 13.5 g/dL, within range. Platelet count normal."),
        file("lipids.txt", "Cholesterol 240 mg/dL, elevated."),
        file("chest_xray.png", "png"),
        file("knee_mri.jpg", "jpg"),
        file("hand.jpeg", "jpeg"),
    ]
}

#[test]
fn text_question_is_answered_from_retrieved_reports() {
    let h = harness("  Hemoglobin is 13.5 g/dL, which is normal.  ");
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();

    let turn = h
        .orchestrator
        .handle_query("What does the blood report say about hemoglobin?", &mut session)
        .clone();

    assert_eq!(turn.route, PromptKind::Text);
    assert_eq!(turn.kind(), ResponseKind::Text);
    assert_eq!(
        turn.response,
        Response::Text("Hemoglobin is 13.5 g/dL, which is normal.".to_string())
    );
    assert_eq!(session.turns().len(), 1);

    let calls = h.chat.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let prompt = &calls[0][1].content;
    assert!(prompt.contains("Hemoglobin 13.5 g/dL"));
    assert!(prompt.contains("blood.txt"));
    assert!(prompt.contains("What does the blood report say about hemoglobin?"));
}

#[test]
fn image_question_ranks_only_uploaded_images() {
    let h = harness("unused");
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();

    let turn = h
        .orchestrator
        .handle_query("Show me the x-ray image", &mut session)
        .clone();

    assert_eq!(turn.route, PromptKind::Image);
    let Response::Images(images) = &turn.response else {
        panic!("expected images, got {:?}", turn.response);
    };
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].name, "chest_xray.png");
    assert!(images.iter().all(|img| !img.name.ends_with(".txt")));
    assert!(h.chat.calls.lock().unwrap().is_empty());
}

#[test]
fn image_result_count_follows_configuration() {
    let h = harness_with("unused", false, NameImageEmbedder::default(), 1);
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();

    let turn = h.orchestrator.handle_query("mri picture", &mut session);

    let Response::Images(images) = &turn.response else {
        panic!("expected images");
    };
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].name, "knee_mri.jpg");
}

#[test]
fn image_question_without_images_returns_empty_result() {
    let h = harness("unused");
    let (mut session, _) = h
        .orchestrator
        .start_session(vec![file("blood.txt", "Hemoglobin 13.5")])
        .unwrap();

    let turn = h.orchestrator.handle_query("show the photo", &mut session);

    assert_eq!(turn.response, Response::Images(vec![]));
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_batch_answers_with_fallback() {
    let h = harness("should not be used");
    let (mut session, report) = h.orchestrator.start_session(vec![]).unwrap();
    assert!(report.files.is_empty());
    assert!(matches!(session.index(), IndexState::Ready(index) if index.is_empty()));

    let turn = h.orchestrator.handle_query("What is the glucose level?", &mut session);

    assert_eq!(turn.response, Response::Text(FALLBACK_ANSWER.to_string()));
    assert!(h.chat.calls.lock().unwrap().is_empty());
}

#[test]
fn blank_model_answer_becomes_fallback() {
    let h = harness("   \n");
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();

    let turn = h.orchestrator.handle_query("How high is cholesterol?", &mut session);

    assert_eq!(turn.response, Response::Text(FALLBACK_ANSWER.to_string()));
}

#[test]
fn every_query_adds_exactly_one_turn() {
    let h = harness("answer");
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();

    let queries = [
        "What is the hemoglobin?",
        "x-ray photo",
        "",
        "Why is cholesterol elevated in the report?",
        "pictures",
    ];
    for (i, q) in queries.iter().enumerate() {
        h.orchestrator.handle_query(q, &mut session);
        assert_eq!(session.turns().len(), i + 1);
        assert_eq!(session.last_turn().unwrap().query, *q);
    }
    let kinds: Vec<ResponseKind> = session.turns().iter().map(|t| t.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ResponseKind::Text,
            ResponseKind::Image,
            ResponseKind::Text,
            ResponseKind::Text,
            ResponseKind::Image,
        ]
    );
}

#[test]
fn index_failure_becomes_error_turn_for_text_questions() {
    let h = harness_with("unused", true, NameImageEmbedder::default(), 2);
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();
    assert!(matches!(session.index(), IndexState::Failed(_)));

    let turn = h.orchestrator.handle_query("What is the platelet count?", &mut session);
    assert_eq!(turn.kind(), ResponseKind::Error);

    let turn = h.orchestrator.handle_query("x-ray image", &mut session);
    assert_eq!(turn.kind(), ResponseKind::Image);
    assert_eq!(session.turns().len(), 2);
}

#[test]
fn image_search_failure_becomes_error_turn() {
    let images = NameImageEmbedder {
        fail: true,
        ..NameImageEmbedder::default()
    };
    let h = harness_with("unused", false, images, 2);
    let (mut session, _) = h.orchestrator.start_session(report_batch()).unwrap();

    let turn = h.orchestrator.handle_query("x-ray image", &mut session);

    let Response::Error(message) = &turn.response else {
        panic!("expected an error turn");
    };
    assert!(message.contains("vision model unavailable"));
}

#[test]
fn new_upload_batch_replaces_documents_and_conversation() {
    let h = harness("answer");
    let (mut first, _) = h.orchestrator.start_session(report_batch()).unwrap();
    h.orchestrator.handle_query("What is the hemoglobin?", &mut first);

    let (second, report) = h
        .orchestrator
        .start_session(vec![file("glucose.txt", "Glucose 110 mg/dL"), file("foot.png", "png")])
        .unwrap();

    let on_disk: BTreeSet<String> = fs::read_dir(&h.cfg.data_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(on_disk, BTreeSet::from(["glucose.txt".to_string()]));
    assert_eq!(report.removed.len(), 2);
    assert!(second.turns().is_empty());
    assert_eq!(second.files().len(), 2);
    let IndexState::Ready(index) = second.index() else {
        panic!("index should build");
    };
    assert!(index.chunks().iter().all(|c| c.source.ends_with("glucose.txt")));
}
