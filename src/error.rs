use std::fmt;

#[derive(Debug)]
pub enum DrawTextError {
    /// A closing tag did not match the innermost open tag. `expected` is
    /// `None` when nothing but the implicit root was open.
    MismatchedTag {
        expected: Option<String>,
        found: String,
    },
    UnclosedTag {
        name: String,
    },
    InvalidConfiguration(String),
    Asset(String),
    Io(std::io::Error),
}

impl fmt::Display for DrawTextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawTextError::MismatchedTag {
                expected: Some(expected),
                found,
            } => write!(
                f,
                "mismatched tags in text: expected </{}>, found </{}>",
                expected, found
            ),
            DrawTextError::MismatchedTag {
                expected: None,
                found,
            } => write!(f, "mismatched tags in text: </{}> has no open tag", found),
            DrawTextError::UnclosedTag { name } => {
                write!(f, "unclosed tag in text: <{}>", name)
            }
            DrawTextError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            DrawTextError::Asset(message) => write!(f, "asset error: {}", message),
            DrawTextError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for DrawTextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrawTextError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DrawTextError {
    fn from(value: std::io::Error) -> Self {
        DrawTextError::Io(value)
    }
}
