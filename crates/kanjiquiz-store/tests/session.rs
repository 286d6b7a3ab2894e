//! Session state machine tests driven by the mock store.
//!
//! The mock yields once per call, so `futures::join!` interleaves
//! operations the way concurrent UI events would.

use std::sync::{Arc, Mutex, OnceLock, Weak};

use kanjiquiz_core::error::QuizError;
use kanjiquiz_core::model::{
    BookmarkId, KanjiChar, Quiz, QuizKind, QuizQuestion, Snippet, SnippetId, SnippetSource,
    SourceId,
};
use kanjiquiz_core::session::{Progress, QuizSession, SessionObserver, SessionStatus};
use kanjiquiz_core::statistics::KanjiSet;
use kanjiquiz_store::MockStore;

fn kanji(c: char) -> KanjiChar {
    KanjiChar::from_char(c).unwrap()
}

fn question(answer: char) -> QuizQuestion {
    let snippet = Snippet {
        id: SnippetId::next(),
        content: format!("今日は{answer}の話をする"),
        source: SnippetSource {
            id: SourceId(1),
            name: "novel".into(),
            path: "/texts/novel".into(),
            line: 1,
        },
        bookmark: None,
    };
    QuizQuestion::new(snippet, kanji(answer), vec![kanji(answer), kanji('火')])
}

fn quiz(answers: &[char]) -> Quiz {
    Quiz::new(answers.iter().map(|c| question(*c)).collect())
}

fn make_session(mock: &Arc<MockStore>) -> QuizSession {
    QuizSession::new(mock.clone(), mock.clone(), mock.clone())
}

fn progress(index: usize, total: usize) -> Option<Progress> {
    Some(Progress { index, total })
}

// --- Lifecycle ---

#[tokio::test]
async fn two_questions_then_idle() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let session = make_session(&mock);

    session.start(QuizKind::RandomChunk).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.progress(), progress(1, 2));
    assert_eq!(session.current().unwrap().answer, kanji('日'));

    session.answer(kanji('日')).await.unwrap();
    assert_eq!(session.progress(), progress(2, 2));
    assert_eq!(session.current().unwrap().answer, kanji('月'));

    session.answer(kanji('月')).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.progress(), None);
    assert!(session.current().is_none());
    assert_eq!(mock.get_set_calls(), 1);
}

#[tokio::test]
async fn each_answer_advances_by_one() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月', '水'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();

    for (step, chosen) in ['日', '火', '水'].into_iter().enumerate() {
        assert_eq!(session.pending_len(), 3 - step);
        assert_eq!(session.progress(), progress(step + 1, 3));
        assert!(session.can_answer());
        session.answer(kanji(chosen)).await.unwrap();
    }

    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.pending_len(), 0);

    let recorded = mock.recorded();
    assert_eq!(recorded.len(), 3);
    assert_eq!(recorded[1].question, kanji('月'));
    assert_eq!(recorded[1].answer, kanji('火'));
    assert!(recorded.iter().all(|r| r.source == Some(SourceId(1))));
}

#[tokio::test]
async fn repeated_answers_from_the_wire_count_once() {
    let questions = vec![question('日'), question('日'), question('月')];
    let json = serde_json::to_string(&questions).unwrap();
    let quiz: Quiz = serde_json::from_str(&json).unwrap();
    let mock = Arc::new(MockStore::new(quiz));
    let session = make_session(&mock);

    session.start(QuizKind::RandomChunk).await.unwrap();
    assert_eq!(session.progress(), progress(1, 2));
    assert_eq!(session.pending_len(), 2);

    session.answer(kanji('日')).await.unwrap();
    assert_eq!(session.progress(), progress(2, 2));
    assert_eq!(session.pending_len(), 1);
    assert_eq!(session.current().unwrap().answer, kanji('月'));
}

#[tokio::test]
async fn start_while_active_is_a_no_op() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let session = make_session(&mock);

    session.start(QuizKind::RandomChunk).await.unwrap();
    session.answer(kanji('日')).await.unwrap();
    session.start(QuizKind::RandomSource).await.unwrap();

    assert_eq!(mock.generate_calls(), 1);
    assert_eq!(mock.last_kind(), Some(QuizKind::RandomChunk));
    assert_eq!(session.progress(), progress(2, 2));
}

#[tokio::test]
async fn empty_quiz_leaves_immediately() {
    let mock = Arc::new(MockStore::new(Quiz::default()));
    let session = make_session(&mock);

    session.start(QuizKind::RandomChunk).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(mock.get_set_calls(), 1);
}

#[tokio::test]
async fn leave_refreshes_the_set() {
    let mock = Arc::new(MockStore::new(quiz(&['日'])));
    let set = KanjiSet {
        quizzes: 3,
        correct_quiz_answers: 2,
        ..KanjiSet::default()
    };
    mock.set_set(set.clone());
    let session = make_session(&mock);
    assert!(session.set().is_none());

    session.start(QuizKind::RandomChunk).await.unwrap();
    session.leave().await.unwrap();

    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.set(), Some(set));
}

// --- Failures ---

#[tokio::test]
async fn generation_failure_returns_to_idle() {
    let mock = Arc::new(MockStore::new(quiz(&['日'])));
    mock.fail_generation(true);
    let session = make_session(&mock);

    let err = session.start(QuizKind::RandomChunk).await.unwrap_err();
    assert!(matches!(err, QuizError::Generation { .. }));
    assert_eq!(session.status(), SessionStatus::Idle);

    mock.fail_generation(false);
    session.start(QuizKind::RandomChunk).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Active);
}

#[tokio::test]
async fn record_failure_leaves_session_stuck() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();

    mock.fail_record(true);
    let err = session.answer(kanji('日')).await.unwrap_err();
    assert!(matches!(err, QuizError::Record { .. }));

    assert_eq!(session.status(), SessionStatus::Answering);
    assert!(!session.can_answer());
    assert_eq!(session.chosen(), Some(kanji('日')));
    assert_eq!(session.pending_len(), 2);

    // No retry, even once the store recovers.
    mock.fail_record(false);
    session.answer(kanji('日')).await.unwrap();
    assert_eq!(mock.record_calls(), 1);

    session.leave().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Idle);
}

// --- Concurrency ---

#[tokio::test]
async fn stale_start_is_discarded_after_leave() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])).gated());
    let session = Arc::new(make_session(&mock));

    let pending = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.start(QuizKind::RandomChunk).await }
    });

    mock.generation_started().await;
    assert_eq!(session.status(), SessionStatus::Loading);
    assert!(session.is_loading());

    session.leave().await.unwrap();
    assert_eq!(session.status(), SessionStatus::Idle);

    mock.release_generation();
    pending.await.unwrap().unwrap();
    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.current().is_none());
    assert!(!session.is_loading());

    mock.release_generation();
    session.start(QuizKind::RandomChunk).await.unwrap();
    assert_eq!(session.progress(), progress(1, 2));
}

#[tokio::test]
async fn concurrent_answers_record_once() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();

    let (first, second) = futures::join!(
        session.answer(kanji('日')),
        session.answer(kanji('日'))
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(mock.record_calls(), 1);
    assert_eq!(session.pending_len(), 1);
    assert_eq!(session.progress(), progress(2, 2));
}

#[tokio::test]
async fn concurrent_starts_generate_once() {
    let mock = Arc::new(MockStore::new(quiz(&['日'])));
    let session = make_session(&mock);

    let (first, second) = futures::join!(
        session.start(QuizKind::RandomChunk),
        session.start(QuizKind::RandomChunk)
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(mock.generate_calls(), 1);
    assert_eq!(session.status(), SessionStatus::Active);
}

// --- Bookmarks ---

#[tokio::test]
async fn bookmark_create_and_remove() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();

    assert_eq!(session.create_bookmark().await.unwrap(), Some(BookmarkId(1)));
    assert_eq!(session.bookmark(), Some(BookmarkId(1)));
    assert_eq!(session.snippet().unwrap().bookmark, Some(BookmarkId(1)));

    // Already bookmarked.
    assert_eq!(session.create_bookmark().await.unwrap(), None);
    assert_eq!(mock.create_bookmark_calls(), 1);

    assert!(session.remove_bookmark().await.unwrap());
    assert_eq!(session.bookmark(), None);
    assert!(!session.remove_bookmark().await.unwrap());
    assert_eq!(mock.remove_bookmark_calls(), 1);
}

#[tokio::test]
async fn remove_bookmark_without_rows_keeps_reference() {
    let mock = Arc::new(MockStore::new(quiz(&['日'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();
    session.create_bookmark().await.unwrap();

    mock.set_removed_rows(0);
    assert!(!session.remove_bookmark().await.unwrap());
    assert_eq!(session.bookmark(), Some(BookmarkId(1)));
}

#[tokio::test]
async fn bookmark_is_not_attached_after_leaving() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();

    let (created, left) = futures::join!(session.create_bookmark(), session.leave());
    left.unwrap();

    assert_eq!(created.unwrap(), Some(BookmarkId(1)));
    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.bookmark(), None);
}

#[tokio::test]
async fn bookmark_failure_keeps_state() {
    let mock = Arc::new(MockStore::new(quiz(&['日'])));
    let session = make_session(&mock);
    session.start(QuizKind::RandomChunk).await.unwrap();

    mock.fail_record(true);
    assert!(session.create_bookmark().await.is_err());
    assert_eq!(session.bookmark(), None);
    assert!(session.can_answer());
}

// --- Observer ---

#[derive(Default)]
struct Events(Mutex<Vec<String>>);

impl SessionObserver for Events {
    fn on_question(&self, question: &QuizQuestion, progress: Progress) {
        self.0.lock().unwrap().push(format!("question {} {progress}", question.answer));
    }

    fn on_answer(&self, question: &QuizQuestion, chosen: KanjiChar, correct: bool) {
        self.0
            .lock()
            .unwrap()
            .push(format!("answer {} {chosen} {correct}", question.answer));
    }

    fn on_leave(&self) {
        self.0.lock().unwrap().push("leave".into());
    }
}

#[tokio::test]
async fn observer_sees_every_transition() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let events = Arc::new(Events::default());
    let session = make_session(&mock).with_observer(events.clone());

    session.start(QuizKind::RandomChunk).await.unwrap();
    session.answer(kanji('日')).await.unwrap();
    session.answer(kanji('火')).await.unwrap();

    assert_eq!(
        *events.0.lock().unwrap(),
        vec![
            "question 日 1/2",
            "answer 日 日 true",
            "question 月 2/2",
            "answer 月 火 false",
            "leave",
        ]
    );
}

/// Reads the session back from inside its own callbacks.
#[derive(Default)]
struct Reader {
    session: OnceLock<Weak<QuizSession>>,
    seen: Mutex<Vec<String>>,
}

impl Reader {
    fn snapshot(&self, event: &str) {
        let Some(session) = self.session.get().and_then(Weak::upgrade) else {
            return;
        };
        let current = session
            .current()
            .map_or("-".to_string(), |q| q.answer.to_string());
        let progress = session
            .progress()
            .map_or("-".to_string(), |p| p.to_string());
        self.seen.lock().unwrap().push(format!(
            "{event}: {:?} {current} {progress} pending={}",
            session.status(),
            session.pending_len()
        ));
    }
}

impl SessionObserver for Reader {
    fn on_question(&self, _: &QuizQuestion, _: Progress) {
        self.snapshot("question");
    }

    fn on_answer(&self, _: &QuizQuestion, _: KanjiChar, _: bool) {
        self.snapshot("answer");
    }

    fn on_leave(&self) {
        self.snapshot("leave");
    }
}

#[tokio::test]
async fn callbacks_see_settled_state() {
    let mock = Arc::new(MockStore::new(quiz(&['日', '月'])));
    let reader = Arc::new(Reader::default());
    let session = Arc::new(make_session(&mock).with_observer(reader.clone()));
    reader.session.set(Arc::downgrade(&session)).unwrap();

    session.start(QuizKind::RandomChunk).await.unwrap();
    session.answer(kanji('日')).await.unwrap();
    session.answer(kanji('月')).await.unwrap();

    assert_eq!(
        *reader.seen.lock().unwrap(),
        vec![
            "question: Active 日 1/2 pending=2",
            "answer: Active 月 2/2 pending=1",
            "question: Active 月 2/2 pending=1",
            "answer: Idle - - pending=0",
            "leave: Idle - - pending=0",
        ]
    );
}
