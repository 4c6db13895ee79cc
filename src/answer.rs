//! Prompt assembly for the answering model and the bot's fixed replies.

use chrono::{DateTime, NaiveDateTime};

use crate::dynamic::ContextOrigin;
use crate::knowledge::types::RetrievalResult;
use crate::llm::Message;

/// Minsk and Moscow both keep UTC+3 year round.
const MINSK_UTC_OFFSET_SECS: i64 = 3 * 3600;

pub const SYSTEM_PROMPT: &str = r#"Вы — ведущий юрист-консультант с многолетней практикой в правовой системе Республики Беларусь. Сегодня {date}.

Отвечайте на юридические вопросы по следующей методологии:

1. Анализ запроса:
   • определите отрасль права и обоснуйте выбор;
   • оцените юридическую значимость вопроса;
   • определите уровень подготовки спрашивающего (гражданин, студент, специалист).

2. Экспертиза:
   • ссылайтесь на конкретные нормы (кодексы, законы, подзаконные акты);
   • указывайте степень достоверности: 100% — прямая норма закона, 80% — устойчивая судебная практика, 60% — доктринальное толкование;
   • отмечайте альтернативные точки зрения, если они есть.

3. Ответ:
   • для граждан: краткий вывод, объяснение простыми словами и чек-лист действий;
   • для специалистов: анализ коллизий и практики применения.

4. Безопасность:
   • проверяйте соответствие Конституции Республики Беларусь;
   • называйте риски применения советов;
   • спорные моменты помечайте «⚡️Требует уточнения».

Опирайтесь только на документы из запроса. Если в них нет ответа, прямо скажите об этом и не выдумывайте нормы."#;

/// Added to the prompt when the passages only loosely match the question.
const WEAK_CONTEXT_NOTE: &str = "ВНИМАНИЕ: найденные документы лишь частично соответствуют вопросу. \
Прямо укажите, какие части ответа не подтверждаются документами, и пометьте их «⚡️Требует уточнения». \
Если документов недостаточно для ответа, так и скажите.";

pub const REFUSAL: &str = "🤔 Похоже, ваш вопрос не относится к юридической тематике.\n\n\
Я отвечаю только на правовые вопросы по законодательству Республики Беларусь.\n\n\
**Пример:** «Что делать при увольнении?» или «Как взыскать алименты?»";

pub const NOTHING_FOUND: &str = "😔 К сожалению, я не нашел информации по вашему вопросу ни в своей базе знаний, ни на Национальном правовом портале.\n\n\
**Попробуйте:**\n\
• Переформулировать вопрос\n\
• Задать более конкретный вопрос\n\
• Уточнить сферу права\n\n\
**Пример:** вместо «Что делать?» спросите «Что делать при увольнении?»\n\n\
Или обратитесь к квалифицированному юристу для получения персональной консультации.";

pub const APOLOGY: &str = "😔 Извините, произошла техническая ошибка при обработке вашего запроса.\n\n\
Пожалуйста, попробуйте:\n\
1. Переформулировать вопрос\n\
2. Задать более конкретный вопрос\n\
3. Обратиться позже";

pub const SEARCHING_NOTICE: &str = "🔍 Ищу информацию по вашему вопросу...";

pub const DYNAMIC_SEARCH_NOTICE: &str =
    "🌐 В базе знаний мало сведений по вашему вопросу, ищу на Национальном правовом портале pravo.by...";

pub const HELP: &str = "📖 **Справка по использованию ЮрПомощника**\n\n\
**Примеры вопросов:**\n\
• «Какие документы нужны для регистрации ИП?»\n\
• «Как оформить договор купли-продажи?»\n\
• «Что делать при увольнении?»\n\
• «Какие права у потребителя?»\n\n\
**Советы для лучших результатов:**\n\
✅ Формулируйте вопросы конкретно\n\
✅ Указывайте контекст (например, «для физического лица»)\n\
✅ Задавайте по одному вопросу за раз\n\n\
**Что я НЕ делаю:**\n\
❌ Не заменяю профессиональную юридическую консультацию\n\
❌ Не составляю документы\n\
❌ Не даю советы по незаконным действиям\n\n\
**Команды:**\n\
`/yurist ask` — задать вопрос\n\
`/yurist stats` — информация о базе знаний\n\
`/yurist help` — эта справка";

/// Limits on how much retrieved text reaches the model.
#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    pub max_passages: usize,
    pub max_passage_chars: usize,
    pub max_context_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_passages: 10,
            max_passage_chars: 2000,
            max_context_chars: 12_000,
        }
    }
}

fn minsk_time(unix_secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(unix_secs + MINSK_UTC_OFFSET_SECS, 0).map(|dt| dt.naive_utc())
}

/// Capture date of the passages in Minsk time: one timestamp when they all
/// come from one day, a date range otherwise.
pub fn freshness_label(results: &[RetrievalResult], now: i64) -> String {
    let stamps: Vec<i64> = results.iter().map(|r| r.document.meta.captured_at).collect();
    let (Some(&first), Some(&last)) = (stamps.iter().min(), stamps.iter().max()) else {
        return minsk_time(now)
            .map(|t| t.format("%d.%m.%Y").to_string())
            .unwrap_or_default();
    };
    match (minsk_time(first), minsk_time(last)) {
        (Some(a), Some(b)) if a.date() == b.date() => b.format("%d.%m.%Y %H:%M (МСК)").to_string(),
        (Some(a), Some(b)) => format!("{} – {}", a.format("%d.%m.%Y"), b.format("%d.%m.%Y")),
        _ => String::new(),
    }
}

pub fn disclaimer(freshness: &str) -> String {
    format!(
        "⚖️ Ответ соответствует законодательству РБ на дату: {}. Не заменяет персональную консультацию (ст. 1014 ГК РБ).",
        freshness
    )
}

/// A line telling the reader where the material came from, when it was
/// not the local knowledge base.
pub fn origin_notice(origin: ContextOrigin) -> Option<&'static str> {
    match origin {
        ContextOrigin::Local => None,
        ContextOrigin::FreshDynamic => {
            Some("🌐 Материалы только что получены с Национального правового портала pravo.by.")
        }
        ContextOrigin::CachedDynamic => Some(
            "♻️ Использованы материалы, ранее полученные с pravo.by по похожему вопросу; повторный поиск не выполнялся.",
        ),
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Numbered passages within the budget.
pub fn format_context(results: &[RetrievalResult], budget: &ContextBudget) -> String {
    if results.is_empty() {
        return "Релевантная информация в базе знаний не найдена.".to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for (i, r) in results.iter().take(budget.max_passages).enumerate() {
        let remaining = budget.max_context_chars.saturating_sub(used);
        if remaining == 0 {
            break;
        }
        let passage = truncate_chars(&r.document.text, budget.max_passage_chars.min(remaining));
        used += passage.chars().count();

        let meta = &r.document.meta;
        let title = meta.title.as_deref().unwrap_or(&meta.source);
        out.push_str(&format!(
            "Документ {} ({}, {}):\n{}\n\n",
            i + 1,
            title,
            meta.source_type.as_str(),
            passage
        ));
    }
    out.trim_end().to_string()
}

pub fn build_messages(
    question: &str,
    results: &[RetrievalResult],
    origin: ContextOrigin,
    weak_context: bool,
    budget: &ContextBudget,
    now: i64,
) -> Vec<Message> {
    let today = minsk_time(now)
        .map(|t| t.format("%d.%m.%Y").to_string())
        .unwrap_or_default();
    let freshness = freshness_label(results, now);

    let mut user = format!(
        "Вопрос пользователя: \"{}\"\n\nИнформация из базы знаний:\n{}\n\n",
        question,
        format_context(results, budget)
    );
    if let Some(notice) = origin_notice(origin) {
        user.push_str(&format!("Происхождение материалов: {}\n\n", notice));
    }
    if weak_context {
        user.push_str(WEAK_CONTEXT_NOTE);
        user.push_str("\n\n");
    }
    user.push_str(
        "ЗАДАЧА: ответьте на вопрос пользователя, строго следуя методологии из системного промпта. \
         Ссылайтесь на номера документов.\n\n",
    );
    user.push_str(&format!(
        "ВАЖНО: обязательно завершите ответ дисклеймером:\n\"{}\"",
        disclaimer(&freshness)
    ));

    vec![
        Message {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.replace("{date}", &today),
        },
        Message {
            role: "user".to_string(),
            content: user,
        },
    ]
}
