
use crate::corpus::Article;

/// Instruction sent ahead of every question: answer only from the supplied
/// articles, abstain with one fixed sentence, or follow the three-section layout.
pub const SYSTEM_INSTRUCTION: &str = "أنت مساعد قانوني مصري خبير. مهمتك هي الإجابة على سؤال المستخدم بالاعتماد *الحصري* على السياق القانوني المرفق. اتبع هذه القواعد بصرامة:

1.  **قاعدة القرار:** أولاً، قرر إذا كان \"السياق\" المرفق يحتوي على معلومات كافية للإجابة بشكل مباشر وواضح على \"السؤال\".
2.  **قاعدة الامتناع:** إذا كان السياق لا يحتوي على الإجابة، يجب أن تكون استجابتك *فقط* هي هذه الجملة العربية المحددة ولا شيء آخر: `المعلومات المطلوبة غير متوفرة في المواد القانونية المقدمة.`
3.  **قاعدة الإجابة:** إذا كان السياق يحتوي على الإجابة، فيجب أن تلتزم بهذا الهيكل الدقيق بالحرف الواحد:
    `**الخلاصة:**`
    `[ملخص مباشر للإجابة في جملة واحدة]`
    `**التحليل القانوني:**`
    `[شرح مفصل يربط السؤال بالمواد القانونية، مع ذكر أرقام المواد ومصادرها (الدستور أو قانون العمل) بوضوح]`
    `**المواد المُستشهد بها:**`
    `[النص الحرفي الكامل لكل مادة قانونية تم استخدامها في التحليل، مع ذكر رقمها ومصدرها]`
";

/// System and user halves of one answer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Deterministic prompt for `question` grounded in `context`, in retrieval order
    #[inline]
    pub fn build(question: &str, context: &[Article]) -> Self {
        Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            user: format!(
                "---\n### السياق:\n{}\n\n### السؤال:\n{}\n",
                format_context(context),
                question
            ),
        }
    }

    /// Both halves as a single Gemma chat turn, for plain text-generation endpoints
    #[inline]
    pub fn to_turn_format(&self) -> String {
        format!(
            "<start_of_turn>user\n{}\n{}<end_of_turn>\n<start_of_turn>model\n",
            self.system,
            self.user.trim_end()
        )
    }
}

/// Two lines per article: source label and number, then the literal text
#[inline]
pub fn format_context(context: &[Article]) -> String {
    context
        .iter()
        .map(|article| {
            format!(
                "- المصدر: {}, المادة: {}\n- النص: {}",
                article.source.label_ar(),
                article.arabic_number,
                article.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
