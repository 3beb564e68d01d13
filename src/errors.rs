use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AssemblyError {
    #[error("Spec Syntax Error: {0}")]
    PestError(#[from] pest::error::Error<crate::adl::parser::Rule>),

    #[error("Spec Error on line {line}: {reason}")]
    SpecError { line: usize, reason: String },

    #[error("Spec Validation Error: {reason}")]
    SpecValidationError { reason: String },

    #[error("Operand Type Error: {reason}")]
    OperandTypeError { reason: String },

    #[error(
        "Parse Error on line {line}: unable to parse instruction\n  parsed:      {parsed}\n  expected:    {expected}\n  instead got: {got}"
    )]
    ParseError {
        line: usize,
        parsed: String,
        expected: String,
        got: String,
    },

    #[error("Semantic Error on line {line}: {reason}")]
    SemanticError { line: usize, reason: String },

    #[error("Encoding Error on line {line}: {reason}")]
    EncodingError { line: usize, reason: String },

    #[error("Output Error: {reason}")]
    OutputError { reason: String },
}
