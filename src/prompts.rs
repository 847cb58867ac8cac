//! Prompt construction for explanations and quizzes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quiz sizes a client may request
pub const ALLOWED_MCQ_COUNTS: [u32; 4] = [5, 10, 15, 20];

/// Output language for explanations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Spanish,
    Marathi,
    Hindi,
    French,
    German,
    Chinese,
    Japanese,
    Arabic,
}

impl Language {
    pub const ALL: [Language; 9] = [
        Language::English,
        Language::Spanish,
        Language::Marathi,
        Language::Hindi,
        Language::French,
        Language::German,
        Language::Chinese,
        Language::Japanese,
        Language::Arabic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::Marathi => "Marathi",
            Language::Hindi => "Hindi",
            Language::French => "French",
            Language::German => "German",
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Arabic => "Arabic",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|l| l.as_str() == s).ok_or(())
    }
}

/// Requested explanation length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplainLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ExplainLength {
    /// Phrase used inside the prompt
    pub fn phrase(&self) -> &'static str {
        match self {
            ExplainLength::Short => "in 3-4 sentences",
            ExplainLength::Medium => "in 2-3 paragraphs",
            ExplainLength::Long => "in detail with multiple sections",
        }
    }
}

impl FromStr for ExplainLength {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Short" => Ok(Self::Short),
            "Medium" => Ok(Self::Medium),
            "Long" => Ok(Self::Long),
            _ => Err(()),
        }
    }
}

/// Everything needed to build an explanation prompt
#[derive(Debug, Clone)]
pub struct ExplainRequest {
    pub topic: String,
    pub language: Language,
    pub length: ExplainLength,
    pub age: u32,
}

/// Build the explanation prompt
pub fn explain_prompt(req: &ExplainRequest) -> String {
    let ExplainRequest { topic, language, length, age } = req;
    let length = length.phrase();

    format!(
        r#"You are a creative and friendly expert teacher.
Explain the topic "{topic}" to a {age} year old student.
Write the explanation in {language}.
Keep the explanation {length}.

Formatting Rules:
1. Always format your response in clean Markdown.
2. Use bolding to emphasize key terms.
3. Use bullet points or numbered lists to break down complex ideas.
4. If the topic involves programming, math, or technical syntax (and the student is over 12), you MUST include relevant code examples inside proper Markdown code blocks (e.g., ```python ... ```).
5. For a {age} year old: use appropriate vocabulary, relatable analogies, and keep it engaging but not patronizing. Never use overly dense jargon without explaining it first."#
    )
}

/// Build the multiple-choice quiz prompt
pub fn mcq_prompt(topic: &str, count: u32) -> String {
    format!(
        r#"Generate exactly {count} multiple choice questions about "{topic}".

Format each question exactly like this:
Q1. Question text here
a) Option A
b) Option B
c) Option C
d) Option D
Answer: a

Follow this exact format for all {count} questions. Number them Q1, Q2, Q3 etc.
Do not add any extra text before or after the questions."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!("Hindi".parse::<Language>(), Ok(Language::Hindi));
        assert_eq!("Arabic".parse::<Language>(), Ok(Language::Arabic));
        assert!("Klingon".parse::<Language>().is_err());
        // Exact names only
        assert!("english".parse::<Language>().is_err());
    }

    #[test]
    fn test_length_parse() {
        assert_eq!("Short".parse::<ExplainLength>(), Ok(ExplainLength::Short));
        assert_eq!("Long".parse::<ExplainLength>(), Ok(ExplainLength::Long));
        assert!("Huge".parse::<ExplainLength>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Language::default(), Language::English);
        assert_eq!(ExplainLength::default(), ExplainLength::Medium);
    }

    #[test]
    fn test_explain_prompt_contents() {
        let prompt = explain_prompt(&ExplainRequest {
            topic: "Gravity".into(),
            language: Language::Spanish,
            length: ExplainLength::Short,
            age: 10,
        });

        assert!(prompt.contains(r#"Explain the topic "Gravity" to a 10 year old student."#));
        assert!(prompt.contains("Write the explanation in Spanish."));
        assert!(prompt.contains("Keep the explanation in 3-4 sentences."));
        assert!(prompt.contains("For a 10 year old"));
    }

    #[test]
    fn test_mcq_prompt_contents() {
        let prompt = mcq_prompt("Volcanoes", 15);
        assert!(prompt.starts_with(r#"Generate exactly 15 multiple choice questions about "Volcanoes"."#));
        assert!(prompt.contains("Follow this exact format for all 15 questions."));
        assert!(prompt.contains("Answer: a"));
    }
}
