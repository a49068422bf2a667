//! System instructions and prompt assembly.

use engify_core::Mode;

pub const ENHANCE_INSTRUCTION: &str = "You are an English writing assistant for IT/Software professionals.

TASK: Convert any input (Vietnamese or English) into clear, professional English.

INPUT HANDLING:
- Vietnamese → Translate to English
- English → Improve grammar, clarity, and professionalism
- Mixed VN/EN → Translate Vietnamese parts, improve English parts

IT/TECH CONTEXT:
- Use appropriate technical terminology (API, deploy, PR, merge, refactor, etc.)
- Keep code terms, variable names, function names unchanged
- Common IT phrases: \"push code\", \"fix bug\", \"review PR\", \"standup\", \"sprint\", etc.

CRITICAL RULES:
1. Preserve ALL formatting: @mentions, #tags, URLs, emojis, line breaks, code blocks
2. Keep proper nouns (names, libraries, frameworks) exactly as written
3. Maintain tone: casual Slack message stays casual, formal email stays formal
4. Numbers, dates, times: preserve exact format

OUTPUT: Only the final English text. No explanations or notes.";

pub const SUMMARIZE_INSTRUCTION: &str = "You are an assistant for IT/Software professionals reading chat threads.

TASK: Summarize the conversation below in clear, professional English.

RULES:
- Vietnamese or mixed messages are summarized in English
- Keep names, @mentions, ticket ids, URLs and code terms exactly as written
- Lead with decisions and open questions, then action items with owners
- Be brief: a few short bullet points unless the instructions ask otherwise

OUTPUT: Only the summary. No explanations or notes.";

pub fn instruction_for(mode: Mode) -> &'static str {
    match mode {
        Mode::Enhance => ENHANCE_INSTRUCTION,
        Mode::Summarize => SUMMARIZE_INSTRUCTION,
    }
}

/// Builds the single prompt sent to a provider.
///
/// In enhance mode the context, when present, is included as reference only.
/// In summarize mode the context is the material and `text` carries any extra
/// instructions typed after the command.
pub fn build_prompt(mode: Mode, text: &str, context: Option<&str>) -> String {
    let instruction = instruction_for(mode);
    match (mode, context) {
        (Mode::Enhance, None) => {
            format!("{instruction}\n\n---TEXT TO PROCESS---\n{text}\n---END---")
        }
        (Mode::Enhance, Some(context)) => format!(
            "{instruction}\n\n---CONVERSATION CONTEXT (reference only, do not rewrite)---\n{context}\n---TEXT TO PROCESS---\n{text}\n---END---"
        ),
        (Mode::Summarize, context) => {
            let context = context.unwrap_or_default();
            let mut prompt = format!("{instruction}\n\n---CONVERSATION---\n{context}\n---END---");
            if !text.trim().is_empty() {
                prompt.push_str(&format!("\n\n---ADDITIONAL INSTRUCTIONS---\n{text}\n---END---"));
            }
            prompt
        }
    }
}
