/// One piece of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LLMChunk {
    Token(String),
    Done,
}
