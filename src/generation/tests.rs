use super::*;
use crate::corpus::Source;
use std::sync::{Arc, Mutex};

/// Returns a canned reply and records every prompt it receives
struct ScriptedModel {
    reply: Result<String, u16>,
    prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl ScriptedModel {
    fn replying(text: &str) -> (Self, Arc<Mutex<Vec<Prompt>>>) {
        let prompts: Arc<Mutex<Vec<Prompt>>> = Arc::default();
        (
            Self {
                reply: Ok(text.to_string()),
                prompts: Arc::clone(&prompts),
            },
            prompts,
        )
    }

    fn failing(status: u16) -> (Self, Arc<Mutex<Vec<Prompt>>>) {
        let prompts: Arc<Mutex<Vec<Prompt>>> = Arc::default();
        (
            Self {
                reply: Err(status),
                prompts: Arc::clone(&prompts),
            },
            prompts,
        )
    }
}

impl ChatModel for ScriptedModel {
    fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("prompt log is not poisoned")
            .push(prompt.clone());
        self.reply.clone().map_err(GenerationError::Status)
    }
}

fn republic_article() -> Article {
    Article {
        arabic_number: "١".to_string(),
        text: "المادة الأولى: جمهورية مصر العربية دولة ذات سيادة، نظامها جمهورى ديمقراطى".to_string(),
        source: Source::Constitution,
    }
}

const GROUNDED_REPLY: &str = "**الخلاصة:**\nنظام الحكم جمهوري ديمقراطي.\n\
**التحليل القانوني:**\nتنص المادة ١ من الدستور على ذلك.\n\
**المواد المُستشهد بها:**\nالمادة ١ (الدستور): جمهورية مصر العربية دولة ذات سيادة";

#[test]
fn empty_context_skips_the_model() {
    let (model, prompts) = ScriptedModel::replying(GROUNDED_REPLY);
    let generator = AnswerGenerator::new(Box::new(model));

    let answer = generator.generate("ما هو نظام الحكم؟", &[]);

    assert_eq!(answer.text, NO_CONTEXT_SENTENCE);
    assert_eq!(answer.kind, AnswerKind::NoContext);
    assert!(prompts.lock().expect("not poisoned").is_empty());
}

#[test]
fn grounded_answer_keeps_model_text() {
    let (model, prompts) = ScriptedModel::replying(GROUNDED_REPLY);
    let generator = AnswerGenerator::new(Box::new(model));

    let answer = generator.generate("ما هو نظام الحكم؟", &[republic_article()]);

    assert_eq!(answer.kind, AnswerKind::Grounded);
    assert!(answer.text.starts_with(SUMMARY_MARKER));
    let prompts = prompts.lock().expect("not poisoned");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user.contains("- المصدر: الدستور, المادة: ١"));
    assert!(prompts[0].user.ends_with("### السؤال:\nما هو نظام الحكم؟\n"));
}

#[test]
fn exact_abstention_is_recognized() {
    let (model, _) = ScriptedModel::replying(ABSTENTION_SENTENCE);
    let generator = AnswerGenerator::new(Box::new(model));

    let answer = generator.generate("ما هي عقوبة السرقة؟", &[republic_article()]);

    assert_eq!(answer.kind, AnswerKind::Abstained);
    assert_eq!(answer.text, ABSTENTION_SENTENCE);
}

#[test]
fn padded_abstention_is_returned_as_the_exact_sentence() {
    let padded = format!("  {}\n", ABSTENTION_SENTENCE);
    let (model, _) = ScriptedModel::replying(&padded);
    let generator = AnswerGenerator::new(Box::new(model));

    let answer = generator.generate("ما هي عقوبة السرقة؟", &[republic_article()]);

    assert_eq!(answer.kind, AnswerKind::Abstained);
    assert_eq!(answer.text, ABSTENTION_SENTENCE);
}

#[test]
fn abstention_with_extra_text_is_not_an_abstention() {
    let answer = Answer::from_model_output(format!("{} لكن يمكنني المساعدة.", ABSTENTION_SENTENCE));

    assert_eq!(answer.kind, AnswerKind::Unstructured);
}

#[test]
fn markers_out_of_order_are_unstructured() {
    let text = format!(
        "{}\nأ\n{}\nب\n{}\nج",
        ANALYSIS_MARKER, SUMMARY_MARKER, CITED_ARTICLES_MARKER
    );

    assert_eq!(Answer::from_model_output(text).kind, AnswerKind::Unstructured);
    assert_eq!(
        Answer::from_model_output("نص حر بدون أقسام".to_string()).kind,
        AnswerKind::Unstructured
    );
}

#[test]
fn service_failure_becomes_fixed_sentence() {
    let (model, _) = ScriptedModel::failing(503);
    let generator = AnswerGenerator::new(Box::new(model));

    let answer = generator.generate("ما هو نظام الحكم؟", &[republic_article()]);

    assert_eq!(answer.kind, AnswerKind::ServiceError);
    assert_eq!(answer.text, SERVICE_ERROR_SENTENCE);
    assert!(!answer.text.contains("503"));
}
