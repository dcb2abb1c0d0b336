use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ReadError {
    #[error("expected {expected} bytes of input, found {actual}")]
    InputTooShort { expected: usize, actual: usize },
    #[error("length prefix {prefix} exceeds remaining input of {remaining} bytes")]
    PrefixTooLong { prefix: usize, remaining: usize },
    #[error("{actual} trailing bytes left after decoding")]
    TrailingBytes { actual: usize },
    #[error("byte {byte:#04x} is not a valid boolean")]
    InvalidBool { byte: u8 },
    #[error("input of {actual} bytes is not a whole number of {element} byte elements")]
    UnevenElements { actual: usize, element: usize },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum WriteError {
    #[error("value of {length} bytes does not fit in a length prefix")]
    PrefixOverflow { length: usize },
}
