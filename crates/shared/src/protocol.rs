use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::domain::{FlashcardItem, QuizItem};

pub const UPLOAD_ROUTE: &str = "/upload";
pub const CHAT_ROUTE: &str = "/chat";
pub const FLASHCARDS_ROUTE: &str = "/generate_flashcards";
pub const QUIZ_ROUTE: &str = "/generate_quiz";

/// Multipart field name the upload endpoint reads the file from.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashcardsResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub flashcards: Vec<FlashcardItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub quiz: Vec<QuizItem>,
}

// A field of the wrong shape decodes to an empty list instead of failing
// the whole body.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_response_reads_backend_field_names() {
        let body = r#"{"quiz":[{"question":"2+2?","options":["3","4"],"correct_answer":"4"}]}"#;
        let parsed: QuizResponse = serde_json::from_str(body).expect("decode");
        assert_eq!(parsed.quiz.len(), 1);
        assert_eq!(parsed.quiz[0].correct_answer, "4");
        assert!(parsed.quiz[0].is_correct("4"));
    }

    #[test]
    fn missing_or_malformed_lists_decode_as_empty() {
        let absent: FlashcardsResponse = serde_json::from_str("{}").expect("absent");
        assert!(absent.flashcards.is_empty());

        let null: FlashcardsResponse =
            serde_json::from_str(r#"{"flashcards":null}"#).expect("null");
        assert!(null.flashcards.is_empty());

        let wrong_shape: QuizResponse =
            serde_json::from_str(r#"{"quiz":"Error connecting to LLM"}"#).expect("string");
        assert!(wrong_shape.quiz.is_empty());

        let bad_item: QuizResponse =
            serde_json::from_str(r#"{"quiz":[{"question":"q"}]}"#).expect("bad item");
        assert!(bad_item.quiz.is_empty());
    }

    #[test]
    fn ask_response_requires_response_field() {
        assert!(serde_json::from_str::<AskResponse>("{}").is_err());
    }
}
