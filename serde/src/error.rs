/// The error raised when reading from or interpreting a wire buffer fails.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SerdeErr {
    /// The reader ran out of bytes before the value was complete.
    UnexpectedEnd,
    /// A discriminant or flag byte held a value outside its legal range.
    InvalidValue,
    /// A length-prefixed string was not valid UTF-8.
    BadString,
    /// A variable-length integer kept its continuation bit set past the
    /// maximum encodable width.
    VarIntOverflow,
}

impl std::fmt::Debug for SerdeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerdeErr::UnexpectedEnd => write!(f, "buffer ended mid-value"),
            SerdeErr::InvalidValue => write!(f, "invalid wire value"),
            SerdeErr::BadString => write!(f, "string payload is not utf-8"),
            SerdeErr::VarIntOverflow => write!(f, "varint wider than 32 bits"),
        }
    }
}

impl std::fmt::Display for SerdeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for SerdeErr {}
